//! Sorted arrays of interval endpoints, one per axis, for sweep-and-prune.

use super::{
    proxy::{ProxyId, ProxyPool},
    CollisionError,
};

/// One endpoint of a proxy's interval on one axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Bound {
    /// Quantized coordinate. Even for lower bounds, odd for upper bounds.
    pub value: u16,
    pub proxy_id: ProxyId,
    /// Number of intervals covering the gap directly above this bound.
    pub stabbing_count: u16,
}

impl Bound {
    #[inline]
    pub fn is_lower(&self) -> bool {
        self.value & 1 == 0
    }
}

/// Bounds of every active proxy on one axis, sorted by value.
///
/// Holds exactly two bounds per active proxy, packed at the front of a
/// store reserved up front for the maximum proxy count.
#[derive(Clone, Debug)]
pub(crate) struct BoundArray {
    axis: usize,
    bounds: Vec<Bound>,
}

impl BoundArray {
    pub fn new(axis: usize, max_proxies: usize) -> Self {
        BoundArray {
            axis,
            bounds: Vec::with_capacity(2 * max_proxies),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    #[cfg(test)]
    pub fn as_slice(&self) -> &[Bound] {
        &self.bounds
    }

    #[inline]
    pub fn value_at(&self, idx: usize) -> u16 {
        self.bounds[idx].value
    }

    /// Index of the first bound whose value is not less than `value`.
    #[inline]
    pub fn search(&self, value: u16) -> usize {
        self.bounds.partition_point(|b| b.value < value)
    }

    /// Find proxies whose interval on this axis overlaps `[lower, upper]`.
    ///
    /// Pushes every such proxy to `hits` once and returns the insertion indices
    /// of `lower` and `upper`.
    pub fn query<T>(
        &self,
        lower: u16,
        upper: u16,
        proxies: &ProxyPool<T>,
        hits: &mut Vec<ProxyId>,
    ) -> (usize, usize) {
        let lower_query = self.search(lower);
        let upper_query = self.search(upper);

        // intervals starting inside the query range
        for bound in &self.bounds[lower_query..upper_query] {
            if bound.is_lower() {
                hits.push(bound.proxy_id);
            }
        }

        // intervals that started before the query range and are still open.
        // the stabbing count right below the range tells how many there are
        if lower_query > 0 {
            let mut i = lower_query - 1;
            let mut remaining = self.bounds[i].stabbing_count;
            while remaining > 0 {
                let bound = &self.bounds[i];
                if bound.is_lower() {
                    let proxy = proxies.at(bound.proxy_id);
                    if lower_query <= proxy.upper_bounds[self.axis] {
                        hits.push(bound.proxy_id);
                        remaining -= 1;
                    }
                }
                if i == 0 {
                    break;
                }
                i -= 1;
            }
        }

        (lower_query, upper_query)
    }

    /// Insert a proxy's interval and record the resulting positions in the proxy.
    pub fn insert<T>(&mut self, id: ProxyId, lower: u16, upper: u16, proxies: &mut ProxyPool<T>) {
        let lower_index = self.search(lower);
        let upper_index = self.search(upper);

        self.bounds.insert(
            upper_index,
            Bound {
                value: upper,
                proxy_id: id,
                stabbing_count: 0,
            },
        );
        self.bounds.insert(
            lower_index,
            Bound {
                value: lower,
                proxy_id: id,
                stabbing_count: 0,
            },
        );
        // the upper bound moved up by one because of the lower bound insertion
        let upper_index = upper_index + 1;

        self.bounds[lower_index].stabbing_count = if lower_index == 0 {
            0
        } else {
            self.bounds[lower_index - 1].stabbing_count
        };
        self.bounds[upper_index].stabbing_count = self.bounds[upper_index - 1].stabbing_count;

        // the new interval covers everything from its lower bound up to its upper bound
        for bound in &mut self.bounds[lower_index..upper_index] {
            bound.stabbing_count += 1;
        }

        self.reindex(lower_index, proxies);
    }

    /// Remove a proxy's interval. Returns the removed lower and upper values.
    pub fn remove<T>(&mut self, id: ProxyId, proxies: &mut ProxyPool<T>) -> (u16, u16) {
        let proxy = proxies.at(id);
        let lower_index = proxy.lower_bounds[self.axis];
        let upper_index = proxy.upper_bounds[self.axis];

        let upper = self.bounds.remove(upper_index).value;
        let lower = self.bounds.remove(lower_index).value;

        for bound in &mut self.bounds[lower_index..upper_index - 1] {
            bound.stabbing_count -= 1;
        }

        self.reindex(lower_index, proxies);
        (lower, upper)
    }

    /// Write bound positions from `start` onwards back into their proxies.
    fn reindex<T>(&self, start: usize, proxies: &mut ProxyPool<T>) {
        for (idx, bound) in self.bounds.iter().enumerate().skip(start) {
            let proxy = proxies.at_mut(bound.proxy_id);
            if bound.is_lower() {
                proxy.lower_bounds[self.axis] = idx;
            } else {
                proxy.upper_bounds[self.axis] = idx;
            }
        }
    }

    /// Check ordering, back references and stabbing counts.
    pub fn validate<T>(&self, proxies: &ProxyPool<T>) -> Result<(), CollisionError> {
        if self.len() != 2 * proxies.len() {
            return Err(CollisionError::AssertionFailure(
                "bound count does not match proxy count",
            ));
        }
        let mut stabbing_count: u16 = 0;
        for (idx, bound) in self.bounds.iter().enumerate() {
            if idx > 0 && self.bounds[idx - 1].value > bound.value {
                return Err(CollisionError::AssertionFailure("bounds out of order"));
            }
            let proxy = proxies
                .get(bound.proxy_id)
                .map_err(|_| CollisionError::AssertionFailure("bound of an inactive proxy"))?;
            if bound.is_lower() {
                if proxy.lower_bounds[self.axis] != idx {
                    return Err(CollisionError::AssertionFailure(
                        "proxy lower bound index is stale",
                    ));
                }
                stabbing_count += 1;
            } else {
                if proxy.upper_bounds[self.axis] != idx {
                    return Err(CollisionError::AssertionFailure(
                        "proxy upper bound index is stale",
                    ));
                }
                stabbing_count = stabbing_count.checked_sub(1).ok_or(
                    CollisionError::AssertionFailure("upper bound without a lower bound"),
                )?;
            }
            if bound.stabbing_count != stabbing_count {
                return Err(CollisionError::AssertionFailure("wrong stabbing count"));
            }
        }
        Ok(())
    }
}
