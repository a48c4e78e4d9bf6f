//! Contact manifolds and the bookkeeping that lets a solver reuse impulses across steps.

use super::config::MAX_MANIFOLD_POINTS;
use crate::math::{Pose, Vec2};

/// The features of two shapes that produced a contact point.
///
/// A point with the same id in consecutive steps is considered the same point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ContactId {
    /// The edge that defines the contact normal.
    pub reference_edge: u8,
    /// The edge most anti-parallel to the reference edge.
    pub incident_edge: u8,
    /// The vertex of the incident edge that was clipped.
    pub incident_vertex: u8,
    /// 1 if the reference edge is on the second shape.
    pub flip: u8,
}

impl ContactId {
    /// All four features packed in one integer for quick comparison,
    /// `reference_edge` in the lowest byte.
    #[inline]
    pub fn key(&self) -> u32 {
        u32::from_le_bytes([
            self.reference_edge,
            self.incident_edge,
            self.incident_vertex,
            self.flip,
        ])
    }

    pub fn from_key(key: u32) -> Self {
        let [reference_edge, incident_edge, incident_vertex, flip] = key.to_le_bytes();
        ContactId {
            reference_edge,
            incident_edge,
            incident_vertex,
            flip,
        }
    }
}

/// One point of a manifold.
///
/// `local_point` depends on the manifold kind:
/// - `Circles`: the local center of the second circle
/// - `FaceA`: the local center of the circle or the clip point of the second polygon
/// - `FaceB`: the clip point of the first polygon
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ManifoldPoint {
    pub local_point: Vec2,
    /// Non-penetration impulse from the solver, kept for warm starting.
    pub normal_impulse: f64,
    /// Friction impulse from the solver, kept for warm starting.
    pub tangent_impulse: f64,
    pub id: ContactId,
}

/// Which shape the manifold's reference face belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ManifoldKind {
    #[default]
    Circles,
    FaceA,
    FaceB,
}

/// Contact points between two convex shapes, expressed in the shapes' local spaces
/// so that it stays meaningful while the shapes move slightly.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Manifold {
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    pub point_count: usize,
    /// Normal of the reference face. Unused for `Circles`.
    pub local_normal: Vec2,
    /// `Circles`: center of the first circle.
    /// `FaceA` and `FaceB`: a point on the reference face.
    pub local_point: Vec2,
    pub kind: ManifoldKind,
}

impl Manifold {
    /// A manifold with no points.
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_touching(&self) -> bool {
        self.point_count > 0
    }

    #[inline]
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.point_count]
    }

    #[inline]
    pub fn points_mut(&mut self) -> &mut [ManifoldPoint] {
        &mut self.points[..self.point_count]
    }

    /// Copy impulses from points of the previous manifold with the same id.
    /// Points without a match start from zero.
    pub fn warm_start_from(&mut self, previous: &Manifold) {
        for point in self.points_mut() {
            let matching = previous
                .points()
                .iter()
                .find(|old| old.id.key() == point.id.key());
            (point.normal_impulse, point.tangent_impulse) = match matching {
                Some(old) => (old.normal_impulse, old.tangent_impulse),
                None => (0.0, 0.0),
            };
        }
    }
}

/// State of a manifold point relative to the previous step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PointState {
    /// Unused slot.
    #[default]
    Null,
    /// The point appeared in this step.
    Add,
    /// The point existed in both steps.
    Persist,
    /// The point existed in the previous step but not anymore.
    Remove,
}

/// Classify points of two consecutive manifolds by matching their ids.
///
/// The first array describes the points of `previous` (`Persist` or `Remove`),
/// the second the points of `current` (`Add` or `Persist`).
pub fn get_point_states(
    previous: &Manifold,
    current: &Manifold,
) -> (
    [PointState; MAX_MANIFOLD_POINTS],
    [PointState; MAX_MANIFOLD_POINTS],
) {
    let contains =
        |manifold: &Manifold, key: u32| manifold.points().iter().any(|p| p.id.key() == key);

    let mut states_previous = [PointState::Null; MAX_MANIFOLD_POINTS];
    for (state, point) in states_previous.iter_mut().zip(previous.points()) {
        *state = if contains(current, point.id.key()) {
            PointState::Persist
        } else {
            PointState::Remove
        };
    }

    let mut states_current = [PointState::Null; MAX_MANIFOLD_POINTS];
    for (state, point) in states_current.iter_mut().zip(current.points()) {
        *state = if contains(previous, point.id.key()) {
            PointState::Persist
        } else {
            PointState::Add
        };
    }

    (states_previous, states_current)
}

/// A manifold evaluated in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WorldManifold {
    /// Points from the first shape towards the second.
    pub normal: Vec2,
    /// Contact points, halfway between the two surfaces.
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    /// Distance between the surfaces along the normal, negative when penetrating.
    pub separations: [f64; MAX_MANIFOLD_POINTS],
    pub point_count: usize,
}

impl WorldManifold {
    pub fn new(
        manifold: &Manifold,
        pose_a: &Pose,
        radius_a: f64,
        pose_b: &Pose,
        radius_b: f64,
    ) -> Self {
        let mut world = WorldManifold {
            point_count: manifold.point_count,
            ..Default::default()
        };
        if manifold.point_count == 0 {
            return world;
        }

        match manifold.kind {
            ManifoldKind::Circles => {
                let point_a = *pose_a * manifold.local_point;
                let point_b = *pose_b * manifold.points[0].local_point;
                let d = point_b - point_a;
                let normal = if d.mag_sq() > f64::EPSILON * f64::EPSILON {
                    d.normalized()
                } else {
                    Vec2::unit_x()
                };
                let surface_a = point_a + radius_a * normal;
                let surface_b = point_b - radius_b * normal;
                world.normal = normal;
                world.points[0] = 0.5 * (surface_a + surface_b);
                world.separations[0] = (surface_b - surface_a).dot(normal);
            }
            ManifoldKind::FaceA => {
                let normal = pose_a.rotation * manifold.local_normal;
                let plane_point = *pose_a * manifold.local_point;
                for (i, point) in manifold.points().iter().enumerate() {
                    let clip_point = *pose_b * point.local_point;
                    let surface_a = clip_point
                        + (radius_a - (clip_point - plane_point).dot(normal)) * normal;
                    let surface_b = clip_point - radius_b * normal;
                    world.points[i] = 0.5 * (surface_a + surface_b);
                    world.separations[i] = (surface_b - surface_a).dot(normal);
                }
                world.normal = normal;
            }
            ManifoldKind::FaceB => {
                let normal = pose_b.rotation * manifold.local_normal;
                let plane_point = *pose_b * manifold.local_point;
                for (i, point) in manifold.points().iter().enumerate() {
                    let clip_point = *pose_a * point.local_point;
                    let surface_b = clip_point
                        + (radius_b - (clip_point - plane_point).dot(normal)) * normal;
                    let surface_a = clip_point - radius_a * normal;
                    world.points[i] = 0.5 * (surface_a + surface_b);
                    world.separations[i] = (surface_a - surface_b).dot(normal);
                }
                // reference face is on B, flip to point from A to B
                world.normal = -normal;
            }
        }
        world
    }

    #[inline]
    pub fn points(&self) -> &[Vec2] {
        &self.points[..self.point_count]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Rotor2;

    fn manifold_with_keys(keys: &[u32], impulses: &[f64]) -> Manifold {
        let mut manifold = Manifold {
            point_count: keys.len(),
            kind: ManifoldKind::FaceA,
            ..Default::default()
        };
        for (i, (&key, &impulse)) in keys.iter().zip(impulses).enumerate() {
            manifold.points[i].id = ContactId::from_key(key);
            manifold.points[i].normal_impulse = impulse;
            manifold.points[i].tangent_impulse = -impulse;
        }
        manifold
    }

    #[test]
    fn key_packing() {
        let id = ContactId {
            reference_edge: 1,
            incident_edge: 2,
            incident_vertex: 3,
            flip: 1,
        };
        assert_eq!(id.key(), 0x01_03_02_01);
        assert_eq!(ContactId::from_key(id.key()), id);
    }

    #[test]
    fn point_states() {
        let previous = manifold_with_keys(&[5, 7], &[0.0, 0.0]);
        let current = manifold_with_keys(&[7, 9], &[0.0, 0.0]);
        let (states_previous, states_current) = get_point_states(&previous, &current);
        assert_eq!(states_previous, [PointState::Remove, PointState::Persist]);
        assert_eq!(states_current, [PointState::Persist, PointState::Add]);

        let single = manifold_with_keys(&[9], &[0.0]);
        let (states_previous, states_current) = get_point_states(&Manifold::empty(), &single);
        assert_eq!(states_previous, [PointState::Null, PointState::Null]);
        assert_eq!(states_current, [PointState::Add, PointState::Null]);
    }

    #[test]
    fn warm_start_copies_matching_impulses() {
        let previous = manifold_with_keys(&[5, 7], &[1.0, 2.0]);
        let mut current = manifold_with_keys(&[7, 9], &[10.0, 10.0]);
        current.warm_start_from(&previous);
        assert_eq!(current.points[0].normal_impulse, 2.0);
        assert_eq!(current.points[0].tangent_impulse, -2.0);
        assert_eq!(current.points[1].normal_impulse, 0.0);
        assert_eq!(current.points[1].tangent_impulse, 0.0);
    }

    #[test]
    fn world_manifold_of_circles() {
        let mut manifold = Manifold {
            point_count: 1,
            kind: ManifoldKind::Circles,
            ..Default::default()
        };
        manifold.points[0].local_point = Vec2::zero();
        let pose_a = Pose::identity();
        let pose_b = Pose::new(Vec2::new(1.5, 0.0), Rotor2::identity());
        let world = WorldManifold::new(&manifold, &pose_a, 1.0, &pose_b, 1.0);
        assert_eq!(world.normal, Vec2::unit_x());
        assert!((world.points[0] - Vec2::new(0.75, 0.0)).mag() < 1e-12);
        assert!((world.separations[0] + 0.5).abs() < 1e-12);
        assert_eq!(world.points().len(), 1);
    }
}
