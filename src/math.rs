//! Math types used by the collision routines, built on `ultraviolet`'s f64 types.

use std::ops::{Deref, Mul, Neg};

pub use ultraviolet as uv;

/// Rigid transformation of a shape: rotation followed by translation.
/// Shapes are never scaled.
pub type Pose = uv::DIsometry2;
pub type Vec2 = uv::DVec2;
pub type Rotor2 = uv::DRotor2;

/// An angle in either degrees or radians.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub enum Angle {
    Rad(f64),
    Deg(f64),
}

impl Angle {
    #[inline]
    pub fn radians(self) -> f64 {
        match self {
            Angle::Rad(rad) => rad,
            Angle::Deg(deg) => deg.to_radians(),
        }
    }
}

impl Default for Angle {
    fn default() -> Self {
        Angle::Rad(0.0)
    }
}

impl From<Angle> for Rotor2 {
    #[inline]
    fn from(angle: Angle) -> Rotor2 {
        Rotor2::from_angle(angle.radians())
    }
}

/// A vector that is known to have unit length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Unit<T>(T);

impl Unit<Vec2> {
    pub fn new_normalize(v: Vec2) -> Self {
        Unit(v.normalized())
    }

    /// Wrap a vector the caller knows to be normalized already.
    pub const fn new_unchecked(v: Vec2) -> Self {
        Unit(v)
    }

    #[inline]
    pub fn into_inner(self) -> Vec2 {
        self.0
    }
}

impl Mul<Unit<Vec2>> for Rotor2 {
    type Output = Unit<Vec2>;

    fn mul(self, rhs: Unit<Vec2>) -> Self::Output {
        Unit(self * rhs.0)
    }
}

impl<T> Deref for Unit<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Neg> Neg for Unit<T> {
    type Output = Unit<T::Output>;

    fn neg(self) -> Self::Output {
        Unit(-self.0)
    }
}

/// Convenience for writing poses out by hand, in tests and config files.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct PoseBuilder {
    position: [f64; 2],
    rotation: Angle,
}

impl PoseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_position(mut self, position: impl Into<[f64; 2]>) -> Self {
        self.position = position.into();
        self
    }

    #[inline]
    pub fn with_rotation(mut self, angle: Angle) -> Self {
        self.rotation = angle;
        self
    }

    #[inline]
    pub fn build(self) -> Pose {
        let [x, y] = self.position;
        Pose::new(Vec2::new(x, y), self.rotation.into())
    }
}

impl From<PoseBuilder> for Pose {
    fn from(builder: PoseBuilder) -> Pose {
        builder.build()
    }
}

//
// vector helpers
//

#[inline]
pub fn left_normal(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

/// For an edge of a counter-clockwise polygon, this points outwards.
#[inline]
pub fn right_normal(v: Vec2) -> Vec2 {
    Vec2::new(v.y, -v.x)
}

/// The z component of the 3D cross product of two vectors on the xy plane.
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Component of a vector by axis index, 0 for x and 1 for y.
#[inline]
pub fn axis(v: Vec2, axis: usize) -> f64 {
    if axis == 0 {
        v.x
    } else {
        v.y
    }
}

#[inline]
pub fn is_finite(v: Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}

//
// pose helpers
//

/// Transform a point from world space into the local space of a pose.
#[inline]
pub fn to_local(pose: &Pose, point: Vec2) -> Vec2 {
    pose.rotation.reversed() * (point - pose.translation)
}

/// Express `pose` in the local space of `reference`.
#[inline]
pub fn relative_pose(reference: &Pose, pose: &Pose) -> Pose {
    reference.inversed() * *pose
}
