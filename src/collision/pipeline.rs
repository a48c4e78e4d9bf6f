//! Step driver tying the broad phase and narrow phase together.
//!
//! Colliders are kept in an arena and each one owns a broad phase proxy with a fattened box.
//! Every step, proxies whose shapes have left their fattened boxes are moved,
//! and every pair the broad phase reports as overlapping goes through the narrow phase.

use std::collections::HashMap;

use thunderdome as td;

use super::{
    broadphase::{BroadPhase, PairCallback},
    config::MAX_MANIFOLD_POINTS,
    manifold::{get_point_states, Manifold, PointState},
    narrowphase::collide,
    shape::{Shape, ShapeGeometry},
    CollisionConfig, CollisionError, ProxyId, AABB,
};
use crate::math::{self as m, Pose};

/// Key type to look up a collider stored in the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColliderKey(td::Index);

impl ColliderKey {
    /// Get the underlying [`thunderdome::Index`][thunderdome::Index] of this key.
    /// Useful for creating your own mappings from colliders to other things.
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

struct Collider {
    shape: Shape,
    pose: Pose,
    fat_aabb: AABB,
    proxy: ProxyId,
}

/// The narrow phase state of a pair of colliders whose fattened boxes overlap.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Contact {
    pub manifold: Manifold,
    /// States of the manifold's points relative to the previous step.
    pub point_states: [PointState; MAX_MANIFOLD_POINTS],
}

impl Contact {
    #[inline]
    pub fn is_touching(&self) -> bool {
        self.manifold.is_touching()
    }
}

/// What happened during a [`CollisionPipeline::step`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepReport {
    /// Pairs that have manifold points now but had none in the previous step.
    pub began: Vec<[ColliderKey; 2]>,
    /// Pairs that had manifold points in the previous step but not anymore,
    /// including pairs where one collider was removed since the last step.
    pub ended: Vec<[ColliderKey; 2]>,
    /// Number of colliders that left their fattened boxes and were moved in the broad phase.
    pub moved_proxies: usize,
}

/// Broad phase callback keeping a contact for every overlapping pair.
#[derive(Default)]
struct ContactTracker {
    contacts: HashMap<[ColliderKey; 2], Contact>,
    // touching contacts removed by the broad phase, reported on the next step
    ended: Vec<[ColliderKey; 2]>,
}

impl PairCallback<ColliderKey> for ContactTracker {
    type PairData = ();

    fn pair_added(&mut self, a: &ColliderKey, b: &ColliderKey) {
        self.contacts.insert([*a, *b], Contact::default());
    }

    fn pair_removed(&mut self, a: &ColliderKey, b: &ColliderKey, _: Option<()>) {
        if let Some(contact) = self.contacts.remove(&[*a, *b]) {
            if contact.is_touching() {
                log::trace!("contact ended by the broad phase: {:?}", [a, b]);
                self.ended.push([*a, *b]);
            }
        }
    }
}

/// Colliders, their broad phase index, and the contacts between them.
pub struct CollisionPipeline {
    config: CollisionConfig,
    colliders: td::Arena<Collider>,
    broad_phase: BroadPhase<ColliderKey, ContactTracker>,
}

impl CollisionPipeline {
    /// Create an empty pipeline whose broad phase covers `world`.
    pub fn new(world: AABB, config: CollisionConfig) -> Result<Self, CollisionError> {
        Ok(CollisionPipeline {
            config,
            colliders: td::Arena::new(),
            broad_phase: BroadPhase::new(world, config, ContactTracker::default())?,
        })
    }

    #[inline]
    pub fn config(&self) -> &CollisionConfig {
        &self.config
    }

    #[inline]
    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// Access the broad phase, e.g. for validating it.
    #[inline]
    pub fn broad_phase(&self) -> &BroadPhase<ColliderKey, impl PairCallback<ColliderKey>> {
        &self.broad_phase
    }

    /// Add a collider. Overlaps with existing colliders are picked up by the next step.
    pub fn insert_collider(
        &mut self,
        shape: impl Into<Shape>,
        pose: Pose,
    ) -> Result<ColliderKey, CollisionError> {
        check_pose(&pose)?;
        let shape = shape.into();
        let fat_aabb = shape.compute_aabb(&pose).padded(self.config.aabb_margin);

        // the proxy needs the key as user data, so the slot is taken first
        // and given back if the broad phase refuses the proxy
        let index = self.colliders.insert(Collider {
            shape,
            pose,
            fat_aabb,
            proxy: ProxyId(0),
        });
        let key = ColliderKey(index);
        match self.broad_phase.create_proxy(fat_aabb, key) {
            Ok(proxy) => {
                if let Some(collider) = self.colliders.get_mut(index) {
                    collider.proxy = proxy;
                }
                log::debug!("inserted collider {:?} with proxy {:?}", key, proxy);
                Ok(key)
            }
            Err(err) => {
                self.colliders.remove(index);
                Err(err)
            }
        }
    }

    /// Remove a collider and its contacts, returning its shape.
    pub fn remove_collider(&mut self, key: ColliderKey) -> Result<Shape, CollisionError> {
        let collider = self
            .colliders
            .get(key.0)
            .ok_or(CollisionError::InvalidCollider(key))?;
        self.broad_phase.destroy_proxy(collider.proxy)?;
        let collider = self
            .colliders
            .remove(key.0)
            .ok_or(CollisionError::InvalidCollider(key))?;
        log::debug!("removed collider {:?}", key);
        Ok(collider.shape)
    }

    pub fn shape(&self, key: ColliderKey) -> Option<&Shape> {
        self.colliders.get(key.0).map(|c| &c.shape)
    }

    pub fn pose(&self, key: ColliderKey) -> Option<&Pose> {
        self.colliders.get(key.0).map(|c| &c.pose)
    }

    /// The box the collider occupies in the broad phase.
    pub fn fat_aabb(&self, key: ColliderKey) -> Option<&AABB> {
        self.colliders.get(key.0).map(|c| &c.fat_aabb)
    }

    /// Move a collider. The broad phase and contacts are updated on the next step.
    pub fn set_pose(&mut self, key: ColliderKey, pose: Pose) -> Result<(), CollisionError> {
        check_pose(&pose)?;
        let collider = self
            .colliders
            .get_mut(key.0)
            .ok_or(CollisionError::InvalidCollider(key))?;
        collider.pose = pose;
        Ok(())
    }

    /// Bring the broad phase up to date with collider poses
    /// and recompute the manifold of every overlapping pair.
    ///
    /// Impulses of points that persist from the previous step are carried over.
    pub fn step(&mut self) -> Result<StepReport, CollisionError> {
        let _span = tracy_span!("collision step");

        let mut report = StepReport::default();

        //
        // broad phase
        //

        for (_, collider) in self.colliders.iter_mut() {
            let tight = collider.shape.compute_aabb(&collider.pose);
            if collider.fat_aabb.contains(&tight) {
                continue;
            }
            // only remembered once the broad phase has accepted it,
            // so a failed move is retried on the next step
            let fat_aabb = tight.padded(self.config.aabb_margin);
            self.broad_phase.move_proxy(collider.proxy, fat_aabb)?;
            collider.fat_aabb = fat_aabb;
            report.moved_proxies += 1;
        }

        //
        // narrow phase
        //

        let _narrow_span = tracy_span!("narrow phase");
        let tracker = self.broad_phase.callback_mut();
        report.ended.append(&mut tracker.ended);
        for (&[key_a, key_b], contact) in tracker.contacts.iter_mut() {
            let (Some(a), Some(b)) = (self.colliders.get(key_a.0), self.colliders.get(key_b.0))
            else {
                log::error!("contact {:?} refers to a removed collider", [key_a, key_b]);
                return Err(CollisionError::AssertionFailure(
                    "contact refers to a removed collider",
                ));
            };

            let previous = contact.manifold;
            let mut manifold = collide(&a.shape, &a.pose, &b.shape, &b.pose, &self.config);
            manifold.warm_start_from(&previous);
            let (_, states) = get_point_states(&previous, &manifold);

            match (previous.is_touching(), manifold.is_touching()) {
                (false, true) => {
                    log::trace!("contact began: {:?}", [key_a, key_b]);
                    report.began.push([key_a, key_b]);
                }
                (true, false) => {
                    log::trace!("contact ended: {:?}", [key_a, key_b]);
                    report.ended.push([key_a, key_b]);
                }
                _ => {}
            }

            contact.manifold = manifold;
            contact.point_states = states;
        }

        Ok(report)
    }

    /// Iterate over pairs of colliders whose fattened boxes overlap.
    /// Pairs that are close but not touching have empty manifolds.
    pub fn contacts(&self) -> impl '_ + Iterator<Item = ([ColliderKey; 2], &Contact)> {
        self.broad_phase
            .callback()
            .contacts
            .iter()
            .map(|(keys, contact)| (*keys, contact))
    }

    /// Mutable access to contacts, for a solver to store its impulses for warm starting.
    pub fn contacts_mut(&mut self) -> impl '_ + Iterator<Item = ([ColliderKey; 2], &mut Contact)> {
        self.broad_phase
            .callback_mut()
            .contacts
            .iter_mut()
            .map(|(keys, contact)| (*keys, contact))
    }

    /// Find the colliders whose fattened boxes overlap the given box.
    pub fn query_aabb(&mut self, aabb: &AABB) -> Result<Vec<ColliderKey>, CollisionError> {
        let proxies = self.broad_phase.query_aabb(aabb)?.to_vec();
        proxies
            .into_iter()
            .map(|proxy| self.broad_phase.user_data(proxy).copied())
            .collect()
    }
}

fn check_pose(pose: &Pose) -> Result<(), CollisionError> {
    let rotation = &pose.rotation;
    if m::is_finite(pose.translation) && rotation.s.is_finite() && rotation.bv.xy.is_finite() {
        Ok(())
    } else {
        Err(CollisionError::InvalidGeometry("pose is not finite"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collision::shape::{Circle, Polygon},
        math::{PoseBuilder, Vec2},
    };

    fn world() -> AABB {
        AABB::new(Vec2::new(-100.0, -100.0), Vec2::new(100.0, 100.0))
    }

    fn at(x: f64, y: f64) -> Pose {
        PoseBuilder::new().with_position([x, y]).build()
    }

    fn pipeline() -> CollisionPipeline {
        let config = CollisionConfig::default()
            .with_max_proxies(64)
            .with_validation(true);
        CollisionPipeline::new(world(), config).expect("valid config")
    }

    fn same_pair(pair: [ColliderKey; 2], a: ColliderKey, b: ColliderKey) -> bool {
        pair == [a, b] || pair == [b, a]
    }

    #[test]
    fn box_lands_and_lifts_off() {
        let mut pipeline = pipeline();
        let config = *pipeline.config();
        let ground = pipeline
            .insert_collider(
                Polygon::new_box(5.0, 0.5, &config).expect("valid box"),
                at(0.0, 0.0),
            )
            .expect("room for ground");
        let block = pipeline
            .insert_collider(
                Polygon::new_box(0.5, 0.5, &config).expect("valid box"),
                at(0.0, 3.0),
            )
            .expect("room for block");

        let report = pipeline.step().expect("step succeeds");
        assert!(report.began.is_empty());
        assert_eq!(report.moved_proxies, 0);
        assert_eq!(pipeline.contacts().count(), 0);

        // slightly sunk into the ground
        pipeline.set_pose(block, at(0.0, 0.99)).expect("block exists");
        let report = pipeline.step().expect("step succeeds");
        assert_eq!(report.moved_proxies, 1);
        assert_eq!(report.began.len(), 1);
        assert!(same_pair(report.began[0], ground, block));
        let (_, contact) = pipeline.contacts().next().expect("one contact");
        assert_eq!(contact.manifold.point_count, 2);
        assert_eq!(contact.point_states, [PointState::Add, PointState::Add]);

        // nothing moved, the same points persist
        let report = pipeline.step().expect("step succeeds");
        assert!(report.began.is_empty() && report.ended.is_empty());
        assert_eq!(report.moved_proxies, 0);
        let (_, contact) = pipeline.contacts().next().expect("one contact");
        assert_eq!(contact.point_states, [PointState::Persist, PointState::Persist]);

        // hovering just above: still within the fattened box, but no longer touching
        pipeline.set_pose(block, at(0.0, 1.05)).expect("block exists");
        let report = pipeline.step().expect("step succeeds");
        assert_eq!(report.moved_proxies, 0);
        assert_eq!(report.ended.len(), 1);
        assert!(same_pair(report.ended[0], ground, block));
        let (_, contact) = pipeline.contacts().next().expect("pair still overlaps");
        assert!(!contact.is_touching());

        pipeline.set_pose(block, at(0.0, 3.0)).expect("block exists");
        let report = pipeline.step().expect("step succeeds");
        assert_eq!(report.moved_proxies, 1);
        assert!(report.ended.is_empty());
        assert_eq!(pipeline.contacts().count(), 0);
        assert_eq!(pipeline.broad_phase().validate(), Ok(()));
    }

    #[test]
    fn removing_a_touching_collider_ends_its_contact() {
        let mut pipeline = pipeline();
        let a = pipeline
            .insert_collider(
                Circle::new(Vec2::zero(), 1.0).expect("valid circle"),
                at(0.0, 0.0),
            )
            .expect("room");
        let b = pipeline
            .insert_collider(
                Circle::new(Vec2::zero(), 1.0).expect("valid circle"),
                at(1.5, 0.0),
            )
            .expect("room");

        let report = pipeline.step().expect("step succeeds");
        assert_eq!(report.began.len(), 1);

        match pipeline.remove_collider(b) {
            Ok(Shape::Circle(circle)) => assert_eq!(circle.radius, 1.0),
            other => panic!("expected the removed circle, got {:?}", other),
        }
        assert_eq!(pipeline.collider_count(), 1);

        let report = pipeline.step().expect("step succeeds");
        assert_eq!(report.ended.len(), 1);
        assert!(same_pair(report.ended[0], a, b));
        assert_eq!(pipeline.contacts().count(), 0);
    }

    #[test]
    fn impulses_carry_over_between_steps() {
        let mut pipeline = pipeline();
        let config = *pipeline.config();
        pipeline
            .insert_collider(
                Polygon::new_box(5.0, 0.5, &config).expect("valid box"),
                at(0.0, 0.0),
            )
            .expect("room");
        let block = pipeline
            .insert_collider(
                Polygon::new_box(0.5, 0.5, &config).expect("valid box"),
                at(0.0, 0.99),
            )
            .expect("room");
        pipeline.step().expect("step succeeds");

        for (_, contact) in pipeline.contacts_mut() {
            for point in contact.manifold.points_mut() {
                point.normal_impulse = 3.0;
            }
        }

        // a small sideways slide keeps the same features in contact
        pipeline.set_pose(block, at(0.01, 0.99)).expect("block exists");
        pipeline.step().expect("step succeeds");
        let (_, contact) = pipeline.contacts().next().expect("one contact");
        assert_eq!(contact.manifold.point_count, 2);
        for point in contact.manifold.points() {
            assert_eq!(point.normal_impulse, 3.0);
        }
    }

    #[test]
    fn rejects_bad_input() {
        let mut pipeline = pipeline();
        let key = pipeline
            .insert_collider(
                Circle::new(Vec2::zero(), 0.5).expect("valid circle"),
                at(0.0, 0.0),
            )
            .expect("room");

        let nan_pose = at(f64::NAN, 0.0);
        assert!(matches!(
            pipeline.set_pose(key, nan_pose),
            Err(CollisionError::InvalidGeometry(_))
        ));
        assert!(pipeline
            .insert_collider(
                Circle::new(Vec2::zero(), 0.5).expect("valid circle"),
                nan_pose
            )
            .is_err());
        assert_eq!(pipeline.collider_count(), 1);

        pipeline.remove_collider(key).expect("collider exists");
        assert_eq!(
            pipeline.remove_collider(key),
            Err(CollisionError::InvalidCollider(key))
        );
        assert_eq!(
            pipeline.set_pose(key, at(0.0, 0.0)),
            Err(CollisionError::InvalidCollider(key))
        );
    }

    #[test]
    fn proxy_capacity_leaves_no_collider_behind() {
        let config = CollisionConfig::default().with_max_proxies(2);
        let mut pipeline = CollisionPipeline::new(world(), config).expect("valid config");
        let circle = Circle::new(Vec2::zero(), 0.5).expect("valid circle");
        for i in 0..2 {
            pipeline
                .insert_collider(circle, at(3.0 * i as f64, 0.0))
                .expect("room");
        }
        assert!(matches!(
            pipeline.insert_collider(circle, at(10.0, 0.0)),
            Err(CollisionError::CapacityExceeded { .. })
        ));
        assert_eq!(pipeline.collider_count(), 2);
    }

    #[test]
    fn query_finds_colliders() {
        let mut pipeline = pipeline();
        let circle = Circle::new(Vec2::zero(), 0.5).expect("valid circle");
        let near = pipeline.insert_collider(circle, at(0.0, 0.0)).expect("room");
        pipeline.insert_collider(circle, at(20.0, 0.0)).expect("room");

        let hits = pipeline
            .query_aabb(&AABB::new(Vec2::new(-1.0, -1.0), Vec2::new(1.0, 1.0)))
            .expect("valid query");
        assert_eq!(hits, vec![near]);
    }

    #[test]
    fn failed_move_is_retried_next_step() {
        let config = CollisionConfig::default()
            .with_max_proxies(64)
            .with_max_pairs(1)
            .with_validation(true);
        let mut pipeline = CollisionPipeline::new(world(), config).expect("valid config");
        let circle = Circle::new(Vec2::zero(), 1.0).expect("valid circle");
        let a = pipeline.insert_collider(circle, at(0.0, 0.0)).expect("room");
        let b = pipeline.insert_collider(circle, at(1.5, 0.0)).expect("room");
        let c = pipeline.insert_collider(circle, at(50.0, 0.0)).expect("room");
        let report = pipeline.step().expect("step succeeds");
        assert_eq!(report.began.len(), 1);

        // the pair table is full, so moving next to `a` fails
        pipeline.set_pose(c, at(-1.5, 0.0)).expect("c exists");
        let far_box = *pipeline.fat_aabb(c).expect("c exists");
        assert_eq!(
            pipeline.step(),
            Err(CollisionError::CapacityExceeded {
                resource: "pair table",
                limit: 1
            })
        );
        assert_eq!(pipeline.fat_aabb(c), Some(&far_box));

        pipeline.remove_collider(b).expect("b exists");
        let report = pipeline.step().expect("step succeeds");
        assert_eq!(report.moved_proxies, 1);
        assert_eq!(report.began.len(), 1);
        assert!(same_pair(report.began[0], a, c));
        assert_eq!(pipeline.contacts().filter(|(_, contact)| contact.is_touching()).count(), 1);
        let hits = pipeline
            .query_aabb(&AABB::new(Vec2::new(-2.5, -0.5), Vec2::new(-2.0, 0.5)))
            .expect("valid query");
        assert_eq!(hits, vec![c]);
    }
}
