//! Sweep-and-prune broad phase over quantized bounding boxes.
//!
//! Every proxy's box is quantized to 16-bit integers and its interval on each axis is
//! kept in a sorted array of bounds. Each bound also stores a stabbing count,
//! the number of intervals open right above it, which lets a range query find
//! intervals that started before the range without scanning from the beginning.
//!
//! Pairs of proxies whose boxes overlap on both axes are tracked in a pair table,
//! and a [`PairCallback`] is told whenever a pair starts or stops overlapping.

use super::{
    bounds::BoundArray,
    pairmanager::{PairKey, PairManager},
    proxy::ProxyPool,
    CollisionConfig, CollisionError, Quantizer, Segment, AABB,
};
use crate::math::Vec2;

pub use super::proxy::ProxyId;

/// Receiver of overlap events from the broad phase.
///
/// Events are only delivered at the end of a broad phase operation,
/// after the index has been fully updated.
pub trait PairCallback<T> {
    /// Data attached to a pair while it overlaps, e.g. a contact.
    type PairData;

    /// Called when the boxes of two proxies start overlapping.
    fn pair_added(&mut self, a: &T, b: &T) -> Self::PairData;

    /// Called when the boxes of two proxies stop overlapping
    /// or one of them is destroyed.
    fn pair_removed(&mut self, a: &T, b: &T, data: Option<Self::PairData>);
}

/// For using the broad phase purely for queries.
impl<T> PairCallback<T> for () {
    type PairData = ();

    fn pair_added(&mut self, _: &T, _: &T) {}

    fn pair_removed(&mut self, _: &T, _: &T, _: Option<()>) {}
}

/// The sweep-and-prune index.
///
/// `T` is the user data stored with each proxy and handed to the callback.
pub struct BroadPhase<T, C: PairCallback<T>> {
    config: CollisionConfig,
    quantizer: Quantizer,
    proxies: ProxyPool<T>,
    bounds: [BoundArray; 2],
    pair_manager: PairManager<C::PairData>,
    callback: C,
    time_stamp: u16,
    // scratch buffers reused between operations
    query_results: Vec<ProxyId>,
    axis_hits: Vec<ProxyId>,
    moved_partners: Vec<ProxyId>,
    sort_keys: Vec<(f64, ProxyId)>,
}

impl<T, C: PairCallback<T>> BroadPhase<T, C> {
    /// Create an empty broad phase covering `world`.
    ///
    /// Boxes outside the world are clamped to its edges,
    /// so everything outside behaves as if stacked on the border.
    pub fn new(world: AABB, config: CollisionConfig, callback: C) -> Result<Self, CollisionError> {
        config.validate()?;
        let quantizer = Quantizer::new(world)?;
        Ok(BroadPhase {
            config,
            quantizer,
            proxies: ProxyPool::new(config.max_proxies),
            bounds: [
                BoundArray::new(0, config.max_proxies),
                BoundArray::new(1, config.max_proxies),
            ],
            pair_manager: PairManager::new(config.max_pairs),
            callback,
            time_stamp: 1,
            query_results: Vec::new(),
            axis_hits: Vec::new(),
            moved_partners: Vec::new(),
            sort_keys: Vec::new(),
        })
    }

    #[inline]
    pub fn world_aabb(&self) -> &AABB {
        self.quantizer.world()
    }

    #[inline]
    pub fn config(&self) -> &CollisionConfig {
        &self.config
    }

    /// Smallest distance the index can tell apart, per axis.
    /// Stored boxes are rounded outwards to multiples of this.
    #[inline]
    pub fn quantization_step(&self) -> Vec2 {
        self.quantizer.step()
    }

    /// Is the box at least partially inside the world box.
    pub fn in_range(&self, aabb: &AABB) -> bool {
        self.quantizer.in_range(aabb)
    }

    #[inline]
    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    /// Number of overlapping pairs currently reported to the callback.
    #[inline]
    pub fn pair_count(&self) -> usize {
        self.pair_manager.len()
    }

    pub fn is_valid(&self, id: ProxyId) -> bool {
        self.proxies.get(id).is_ok()
    }

    pub fn user_data(&self, id: ProxyId) -> Result<&T, CollisionError> {
        self.proxies.get(id)?.user_data.as_ref().ok_or(
            CollisionError::AssertionFailure("active proxy without user data"),
        )
    }

    #[inline]
    pub fn callback(&self) -> &C {
        &self.callback
    }

    #[inline]
    pub fn callback_mut(&mut self) -> &mut C {
        &mut self.callback
    }

    /// Iterate over currently overlapping pairs and their data.
    pub fn pairs(&self) -> impl '_ + Iterator<Item = ([ProxyId; 2], Option<&C::PairData>)> {
        self.pair_manager
            .iter()
            .filter(|(_, pair)| pair.is_reported())
            .map(|(key, pair)| (key, pair.data()))
    }

    pub fn pair_data(&self, a: ProxyId, b: ProxyId) -> Option<&C::PairData> {
        self.pair_manager.find(a, b).and_then(|pair| pair.data())
    }

    /// The box a proxy occupies in the index, in world coordinates.
    /// Contains the box it was created or last moved with, clamped to the world.
    pub fn fat_aabb(&self, id: ProxyId) -> Result<AABB, CollisionError> {
        self.proxies.get(id)?;
        Ok(self.stored_aabb(id))
    }

    /// Add a box to the index.
    ///
    /// Pairs with every proxy it overlaps are reported to the callback before this returns.
    pub fn create_proxy(&mut self, aabb: AABB, user_data: T) -> Result<ProxyId, CollisionError> {
        let _span = tracy_span!("create proxy");

        if !aabb.is_valid() {
            return Err(CollisionError::InvalidGeometry("proxy AABB is not valid"));
        }
        if self.proxies.is_full() {
            return Err(CollisionError::CapacityExceeded {
                resource: "proxy pool",
                limit: self.proxies.capacity(),
            });
        }
        if !self.in_range(&aabb) {
            log::warn!("creating proxy outside of the world: {:?}", aabb);
        }

        let (lower, upper) = self.quantizer.quantize_aabb(&aabb);
        self.query_values(lower, upper, None);
        self.check_pair_capacity(self.query_results.len())?;

        let id = self.proxies.alloc(user_data)?;
        for (axis, bounds) in self.bounds.iter_mut().enumerate() {
            bounds.insert(id, lower[axis], upper[axis], &mut self.proxies);
        }
        for i in 0..self.query_results.len() {
            let other = self.query_results[i];
            self.pair_manager.add_buffered_pair(id, other)?;
        }
        self.commit()?;

        log::debug!(
            "created proxy {:?}, {} overlaps, {} proxies total",
            id,
            self.query_results.len(),
            self.proxies.len()
        );
        self.after_modification()?;
        Ok(id)
    }

    /// Remove a proxy, reporting the removal of all its pairs.
    /// Returns the user data it was created with.
    pub fn destroy_proxy(&mut self, id: ProxyId) -> Result<T, CollisionError> {
        let _span = tracy_span!("destroy proxy");

        self.proxies.get(id)?;

        let mut lower = [0; 2];
        let mut upper = [0; 2];
        for (axis, bounds) in self.bounds.iter_mut().enumerate() {
            (lower[axis], upper[axis]) = bounds.remove(id, &mut self.proxies);
        }
        // the proxy is out of the arrays now, so this finds exactly its partners
        self.query_values(lower, upper, None);
        for &other in &self.query_results {
            self.pair_manager.remove_buffered_pair(id, other);
        }
        self.commit()?;

        let user_data = self.proxies.free(id)?;
        log::debug!(
            "destroyed proxy {:?}, {} proxies left",
            id,
            self.proxies.len()
        );
        self.after_modification()?;
        Ok(user_data)
    }

    /// Move a proxy to a new box, reporting pairs that started or stopped overlapping.
    pub fn move_proxy(&mut self, id: ProxyId, aabb: AABB) -> Result<(), CollisionError> {
        let _span = tracy_span!("move proxy");

        if !aabb.is_valid() {
            return Err(CollisionError::InvalidGeometry("proxy AABB is not valid"));
        }
        let proxy = self.proxies.get(id)?;
        if !self.in_range(&aabb) {
            log::warn!("moving proxy {:?} outside of the world: {:?}", id, aabb);
        }

        let mut old_lower = [0; 2];
        let mut old_upper = [0; 2];
        for (axis, bounds) in self.bounds.iter().enumerate() {
            old_lower[axis] = bounds.value_at(proxy.lower_bounds[axis]);
            old_upper[axis] = bounds.value_at(proxy.upper_bounds[axis]);
        }
        let (lower, upper) = self.quantizer.quantize_aabb(&aabb);
        if (lower, upper) == (old_lower, old_upper) {
            return Ok(());
        }

        // partners at the destination, found before anything is touched
        // so that a full pair table leaves the index as it was
        self.query_values(lower, upper, Some(id));
        std::mem::swap(&mut self.query_results, &mut self.moved_partners);
        let new_pairs = self
            .moved_partners
            .iter()
            .filter(|&&other| !self.pair_manager.contains(id, other))
            .count();
        self.check_pair_capacity(new_pairs)?;

        for bounds in &mut self.bounds {
            bounds.remove(id, &mut self.proxies);
        }
        self.query_values(old_lower, old_upper, None);
        for &other in &self.query_results {
            self.pair_manager.remove_buffered_pair(id, other);
        }

        for (axis, bounds) in self.bounds.iter_mut().enumerate() {
            bounds.insert(id, lower[axis], upper[axis], &mut self.proxies);
        }
        for i in 0..self.moved_partners.len() {
            let other = self.moved_partners[i];
            self.pair_manager.add_buffered_pair(id, other)?;
        }
        self.commit()?;

        self.after_modification()
    }

    /// Find every proxy whose stored box overlaps the given box.
    ///
    /// The result is only valid until the next operation on the broad phase.
    pub fn query_aabb(&mut self, aabb: &AABB) -> Result<&[ProxyId], CollisionError> {
        let _span = tracy_span!("query aabb");

        if !aabb.is_valid() {
            return Err(CollisionError::InvalidGeometry("query AABB is not valid"));
        }
        let (lower, upper) = self.quantizer.quantize_aabb(aabb);
        self.query_values(lower, upper, None);
        Ok(&self.query_results)
    }

    /// Like [`query_aabb`][Self::query_aabb], but ordered ascending by `key`.
    /// Proxies for which `key` returns `None` are left out.
    pub fn query_aabb_sorted(
        &mut self,
        aabb: &AABB,
        mut key: impl FnMut(ProxyId, &T) -> Option<f64>,
    ) -> Result<&[ProxyId], CollisionError> {
        self.query_aabb(aabb)?;

        self.sort_keys.clear();
        for &id in &self.query_results {
            if let Some(user_data) = &self.proxies.at(id).user_data {
                if let Some(k) = key(id, user_data) {
                    self.sort_keys.push((k, id));
                }
            }
        }
        self.sort_sorted_results();
        Ok(&self.query_results)
    }

    /// Find every proxy whose stored box is hit by a segment,
    /// ordered by the fraction along the segment where it enters the box.
    ///
    /// `max_lambda` scales the segment, 1 meaning the segment as is.
    pub fn query_segment(
        &mut self,
        segment: &Segment,
        max_lambda: f64,
    ) -> Result<&[ProxyId], CollisionError> {
        let _span = tracy_span!("query segment");

        if !(max_lambda.is_finite() && max_lambda >= 0.0) {
            return Err(CollisionError::InvalidGeometry(
                "segment length scale must be finite and non-negative",
            ));
        }
        let swept = Segment::new(segment.p1, segment.point_at(max_lambda)).aabb();
        self.query_aabb(&swept)?;

        self.sort_keys.clear();
        for &id in &self.query_results {
            let stored = self.stored_aabb(id);
            if let Some(lambda) = segment.enters_aabb(&stored, max_lambda) {
                self.sort_keys.push((lambda, id));
            }
        }
        self.sort_sorted_results();
        Ok(&self.query_results)
    }

    /// Check every invariant of the index:
    /// bound ordering and back references, stabbing counts,
    /// and agreement of the pair table with the bounds.
    pub fn validate(&self) -> Result<(), CollisionError> {
        for bounds in &self.bounds {
            bounds.validate(&self.proxies)?;
        }

        for ([a, b], pair) in self.pair_manager.iter() {
            if !self.is_valid(a) || !self.is_valid(b) {
                return Err(CollisionError::AssertionFailure(
                    "pair references an inactive proxy",
                ));
            }
            if pair.is_buffered() || !pair.is_reported() {
                return Err(CollisionError::AssertionFailure(
                    "uncommitted pair outside of an operation",
                ));
            }
            if !proxies_overlap(&self.proxies, [a, b]) {
                return Err(CollisionError::AssertionFailure(
                    "pair table holds a non-overlapping pair",
                ));
            }
        }

        let active: Vec<ProxyId> = self.proxies.iter_active().map(|(id, _)| id).collect();
        for (i, &a) in active.iter().enumerate() {
            for &b in &active[i + 1..] {
                if proxies_overlap(&self.proxies, [a, b]) && !self.pair_manager.contains(a, b) {
                    return Err(CollisionError::AssertionFailure(
                        "overlapping pair missing from the pair table",
                    ));
                }
            }
        }
        Ok(())
    }

    //
    // internals
    //

    /// Two-axis query on quantized values, writing into `query_results`.
    fn query_values(&mut self, lower: [u16; 2], upper: [u16; 2], exclude: Option<ProxyId>) {
        self.query_results.clear();
        for axis in 0..2 {
            self.axis_hits.clear();
            self.bounds[axis].query(lower[axis], upper[axis], &self.proxies, &mut self.axis_hits);
            for i in 0..self.axis_hits.len() {
                let id = self.axis_hits[i];
                self.increment_overlap_count(id, exclude);
            }
        }
        self.increment_time_stamp();
    }

    /// Count one axis hit for a proxy.
    /// The second hit under the same time stamp makes it a result.
    fn increment_overlap_count(&mut self, id: ProxyId, exclude: Option<ProxyId>) {
        let stamp = self.time_stamp;
        let proxy = self.proxies.at_mut(id);
        if proxy.time_stamp < stamp {
            proxy.time_stamp = stamp;
            proxy.overlap_count = 1;
        } else {
            proxy.overlap_count = 2;
            if exclude != Some(id) {
                self.query_results.push(id);
            }
        }
    }

    fn increment_time_stamp(&mut self) {
        if self.time_stamp == u16::MAX {
            self.proxies.reset_time_stamps();
            self.time_stamp = 1;
        } else {
            self.time_stamp += 1;
        }
    }

    fn check_pair_capacity(&self, new_pairs: usize) -> Result<(), CollisionError> {
        if self.pair_manager.len() + new_pairs > self.pair_manager.capacity() {
            log::warn!(
                "pair table full ({} pairs), rejecting {} more",
                self.pair_manager.len(),
                new_pairs
            );
            return Err(CollisionError::CapacityExceeded {
                resource: "pair table",
                limit: self.pair_manager.capacity(),
            });
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), CollisionError> {
        let proxies = &self.proxies;
        self.pair_manager
            .commit(proxies, &mut self.callback, |key| proxies_overlap(proxies, key))
    }

    /// Replace the query results with the ids in `sort_keys`, sorted by key.
    fn sort_sorted_results(&mut self) {
        self.sort_keys.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.query_results.clear();
        self.query_results
            .extend(self.sort_keys.iter().map(|&(_, id)| id));
    }

    fn stored_aabb(&self, id: ProxyId) -> AABB {
        let proxy = self.proxies.at(id);
        let mut lower = [0; 2];
        let mut upper = [0; 2];
        for (axis, bounds) in self.bounds.iter().enumerate() {
            lower[axis] = bounds.value_at(proxy.lower_bounds[axis]);
            upper[axis] = bounds.value_at(proxy.upper_bounds[axis]);
        }
        self.quantizer.dequantize_aabb(lower, upper)
    }

    fn after_modification(&self) -> Result<(), CollisionError> {
        if self.config.validate_index {
            if let Err(err) = self.validate() {
                log::error!("broad phase is corrupt: {}", err);
                return Err(err);
            }
        }
        Ok(())
    }
}

/// Two-axis overlap test on bound positions.
/// Equivalent to comparing bound values because a lower and an upper value are never equal.
fn proxies_overlap<T>(proxies: &ProxyPool<T>, [a, b]: PairKey) -> bool {
    let (a, b) = (proxies.at(a), proxies.at(b));
    (0..2).all(|axis| {
        a.lower_bounds[axis] <= b.upper_bounds[axis] && b.lower_bounds[axis] <= a.upper_bounds[axis]
    })
}
