//! Mapping of world coordinates to the 16-bit integer range used by the broad phase.

use super::{CollisionError, AABB};
use crate::math::{self as m, Vec2};

/// The largest quantized coordinate.
pub(crate) const QUANTIZED_MAX: u16 = u16::MAX;

/// Per-axis scaling from the world box into `[0, QUANTIZED_MAX]`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Quantizer {
    world: AABB,
    scale: Vec2,
}

impl Quantizer {
    pub fn new(world: AABB) -> Result<Self, CollisionError> {
        if !world.is_valid() {
            return Err(CollisionError::InvalidGeometry("world AABB is not valid"));
        }
        let d = world.max - world.min;
        if d.x <= 0.0 || d.y <= 0.0 {
            return Err(CollisionError::InvalidGeometry("world AABB has zero area"));
        }
        Ok(Quantizer {
            world,
            scale: Vec2::new(QUANTIZED_MAX as f64 / d.x, QUANTIZED_MAX as f64 / d.y),
        })
    }

    pub fn world(&self) -> &AABB {
        &self.world
    }

    /// Quantize a point, clamping it to the world box first.
    pub fn quantize(&self, point: Vec2) -> [u16; 2] {
        let clamped = point
            .max_by_component(self.world.min)
            .min_by_component(self.world.max);
        let rel = clamped - self.world.min;
        [
            (self.scale.x * rel.x) as u16,
            (self.scale.y * rel.y) as u16,
        ]
    }

    /// Quantize the corners of an AABB into lower and upper bound values per axis.
    ///
    /// Lower values are rounded down to even and upper values up to odd,
    /// so a lower and an upper bound never compare equal
    /// and the low bit tells which kind a bound is.
    pub fn quantize_aabb(&self, aabb: &AABB) -> ([u16; 2], [u16; 2]) {
        let lower = self.quantize(aabb.min);
        let upper = self.quantize(aabb.max);
        (
            [lower[0] & (QUANTIZED_MAX - 1), lower[1] & (QUANTIZED_MAX - 1)],
            [upper[0] | 1, upper[1] | 1],
        )
    }

    /// World coordinate of a quantized value on the given axis.
    pub fn dequantize(&self, value: u16, axis: usize) -> f64 {
        m::axis(self.world.min, axis) + value as f64 / m::axis(self.scale, axis)
    }

    /// World box covering quantized bounds.
    /// Upper values are extended by one integer step since quantization rounds down.
    pub fn dequantize_aabb(&self, lower: [u16; 2], upper: [u16; 2]) -> AABB {
        AABB::new(
            Vec2::new(self.dequantize(lower[0], 0), self.dequantize(lower[1], 1)),
            Vec2::new(
                self.dequantize(upper[0], 0) + 1.0 / self.scale.x,
                self.dequantize(upper[1], 1) + 1.0 / self.scale.y,
            ),
        )
    }

    /// Size of one quantization unit in world units per axis.
    ///
    /// The low bit of every bound value is spent on the bound's kind,
    /// so a unit spans two integer steps.
    pub fn step(&self) -> Vec2 {
        Vec2::new(2.0 / self.scale.x, 2.0 / self.scale.y)
    }

    /// Is the box at least partially inside the world.
    pub fn in_range(&self, aabb: &AABB) -> bool {
        let d = (aabb.min - self.world.max).max_by_component(self.world.min - aabb.max);
        d.x.max(d.y) <= 0.0
    }
}
