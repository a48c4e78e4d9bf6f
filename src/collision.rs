//! Broad phase and narrow phase collision detection.

pub mod aabb;
pub use aabb::{test_overlap, Segment, AABB};

pub mod config;
pub use config::CollisionConfig;

mod quantize;
pub(crate) use quantize::Quantizer;

mod proxy;
pub use proxy::ProxyId;

mod bounds;
mod pairmanager;

pub mod broadphase;
pub use broadphase::{BroadPhase, PairCallback};

pub mod shape;
pub use shape::{Circle, Edge, Polygon, Shape, ShapeGeometry};

pub mod clip;
pub use clip::{clip_segment_to_line, ClipVertex};

pub mod manifold;
pub use manifold::{ContactId, Manifold, ManifoldKind, ManifoldPoint, PointState};

pub mod narrowphase;

pub mod pipeline;
pub use pipeline::{ColliderKey, CollisionPipeline, Contact, StepReport};

/// An error from a collision detection operation.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionError {
    /// A fixed-size table is full.
    /// Fatal for the current step; no further insertions should be attempted.
    #[error("{resource} capacity of {limit} exceeded")]
    CapacityExceeded {
        resource: &'static str,
        limit: usize,
    },
    /// A bounding box or shape was non-finite, inverted or otherwise degenerate.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(&'static str),
    /// The proxy id does not refer to an active proxy.
    #[error("proxy {0:?} is not active")]
    InvalidHandle(ProxyId),
    /// The key does not refer to a collider in the pipeline.
    #[error("collider {0:?} does not exist")]
    InvalidCollider(ColliderKey),
    /// An internal invariant of the spatial index does not hold.
    /// The index is corrupt and the simulation should not continue.
    #[error("collision index invariant violated: {0}")]
    AssertionFailure(&'static str),
    /// The configuration passed to a constructor is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}
