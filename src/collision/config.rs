//! Tuning constants for collision detection.

use super::CollisionError;

/// The maximum number of contact points between two convex shapes.
/// This is a property of 2D convex geometry rather than a tuning knob,
/// so manifolds are fixed-size arrays of this length.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Largest supported proxy capacity.
/// Bounds are addressed with 16-bit values and `u16::MAX` is reserved as a sentinel.
pub const MAX_PROXY_CAPACITY: usize = 1 << 14;

/// Tuning constants threaded into the broad phase, shapes and narrow phase.
///
/// The defaults are tuned for meters-kilograms-seconds units
/// with moving objects between 0.1 and 10 meters in size.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct CollisionConfig {
    /// Maximum number of broad phase proxies. Must be a power of two.
    pub max_proxies: usize,
    /// Maximum number of simultaneously overlapping proxy pairs.
    pub max_pairs: usize,
    /// Maximum number of vertices in a polygon shape.
    pub max_polygon_vertices: usize,
    /// A small length used as a collision tolerance.
    /// Numerically significant but visually insignificant.
    pub linear_slop: f64,
    /// Skin radius around polygons and edges.
    /// Keeps contacts alive across small separations so they can be warm started.
    pub polygon_radius: f64,
    /// Margin by which AABBs are fattened before being inserted in the broad phase,
    /// allowing small movements without touching the index.
    pub aabb_margin: f64,
    /// Tolerance for floating point comparisons in the narrow phase.
    pub epsilon: f64,
    /// Check every invariant of the broad phase index after each modification.
    /// Slow, meant for debugging.
    pub validate_index: bool,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        let linear_slop = 0.005;
        CollisionConfig {
            max_proxies: 512,
            max_pairs: 8 * 512,
            max_polygon_vertices: 8,
            linear_slop,
            polygon_radius: 2.0 * linear_slop,
            aabb_margin: 0.1,
            epsilon: f64::EPSILON,
            validate_index: false,
        }
    }
}

impl CollisionConfig {
    /// Set the proxy capacity, keeping the pair capacity at eight pairs per proxy.
    pub fn with_max_proxies(mut self, max_proxies: usize) -> Self {
        self.max_proxies = max_proxies;
        self.max_pairs = 8 * max_proxies;
        self
    }

    pub fn with_max_pairs(mut self, max_pairs: usize) -> Self {
        self.max_pairs = max_pairs;
        self
    }

    pub fn with_aabb_margin(mut self, margin: f64) -> Self {
        self.aabb_margin = margin;
        self
    }

    /// Replace the linear slop. The polygon radius is derived from it.
    pub fn with_linear_slop(mut self, slop: f64) -> Self {
        self.linear_slop = slop;
        self.polygon_radius = 2.0 * slop;
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate_index = validate;
        self
    }

    /// Check that the values are usable.
    pub fn validate(&self) -> Result<(), CollisionError> {
        if !self.max_proxies.is_power_of_two() {
            return Err(CollisionError::InvalidConfig(
                "max_proxies must be a power of two",
            ));
        }
        if self.max_proxies > MAX_PROXY_CAPACITY {
            return Err(CollisionError::InvalidConfig("max_proxies is too large"));
        }
        if self.max_pairs == 0 {
            return Err(CollisionError::InvalidConfig("max_pairs must be nonzero"));
        }
        if self.max_polygon_vertices < 3 {
            return Err(CollisionError::InvalidConfig(
                "polygons need at least three vertices",
            ));
        }
        let non_negative = |v: f64| v.is_finite() && v >= 0.0;
        if !(non_negative(self.linear_slop)
            && non_negative(self.polygon_radius)
            && non_negative(self.aabb_margin)
            && non_negative(self.epsilon))
        {
            return Err(CollisionError::InvalidConfig(
                "tolerances must be finite and non-negative",
            ));
        }
        Ok(())
    }
}
