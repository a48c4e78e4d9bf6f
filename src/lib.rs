//! Collision detection for 2D rigid body simulation.
//!
//! The broad phase ([`BroadPhase`]) keeps a sweep-and-prune index of quantized
//! bounding boxes and reports pairs whose boxes start or stop overlapping.
//! The narrow phase ([`collision::narrowphase`]) turns an overlapping pair of convex
//! shapes into a [`Manifold`] whose points carry feature ids, so that a solver can
//! carry impulses over from one step to the next.
//! [`CollisionPipeline`] ties the two together into a per-step driver.

/// Profiling span, no-op unless the `tracy` feature is enabled
/// and a Tracy client is running.
macro_rules! tracy_span {
    ($name:literal) => {
        tracy_client::Client::running()
            .map(|client| client.span(tracy_client::span_location!($name), 0))
    };
}

pub mod math;
pub use math::{uv, Angle, Pose, PoseBuilder, Rotor2, Unit, Vec2};

pub mod collision;
pub use collision::{
    broadphase::{BroadPhase, PairCallback, ProxyId},
    config::CollisionConfig,
    manifold::{get_point_states, ContactId, Manifold, ManifoldPoint, PointState, WorldManifold},
    narrowphase::collide,
    pipeline::{ColliderKey, CollisionPipeline, Contact, StepReport},
    shape::{Circle, Edge, MassData, Polygon, SegmentCollide, Shape, ShapeGeometry},
    CollisionError, Segment, AABB,
};
