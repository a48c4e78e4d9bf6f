//! Bookkeeping of overlapping proxy pairs between broad phase operations.

use super::{
    broadphase::PairCallback,
    proxy::{ProxyId, ProxyPool},
    CollisionError,
};

use std::collections::HashMap;

/// Unordered pair of proxies, stored with the smaller id first.
pub(crate) type PairKey = [ProxyId; 2];

#[inline]
pub(crate) fn pair_key(a: ProxyId, b: ProxyId) -> PairKey {
    if a < b {
        [a, b]
    } else {
        [b, a]
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Pair<P> {
    /// In the buffer waiting for the next commit.
    buffered: bool,
    /// Requested to be removed at the next commit.
    removed: bool,
    /// The user has been told about this pair.
    reported: bool,
    /// Whatever the user callback returned when the pair was reported.
    data: Option<P>,
}

impl<P> Pair<P> {
    pub fn is_reported(&self) -> bool {
        self.reported
    }

    pub fn is_buffered(&self) -> bool {
        self.buffered
    }

    pub fn data(&self) -> Option<&P> {
        self.data.as_ref()
    }
}

/// Set of overlapping proxy pairs.
///
/// Add and remove requests are buffered and resolved together in [`commit`][Self::commit],
/// so a pair that is removed and re-added within one broad phase operation
/// doesn't generate any callbacks.
#[derive(Clone, Debug)]
pub(crate) struct PairManager<P> {
    pairs: HashMap<PairKey, Pair<P>>,
    buffer: Vec<PairKey>,
    max_pairs: usize,
}

impl<P> PairManager<P> {
    pub fn new(max_pairs: usize) -> Self {
        PairManager {
            pairs: HashMap::with_capacity(max_pairs),
            buffer: Vec::new(),
            max_pairs,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.max_pairs
    }

    pub fn find(&self, a: ProxyId, b: ProxyId) -> Option<&Pair<P>> {
        self.pairs.get(&pair_key(a, b))
    }

    pub fn contains(&self, a: ProxyId, b: ProxyId) -> bool {
        self.pairs.contains_key(&pair_key(a, b))
    }

    pub fn iter(&self) -> impl '_ + Iterator<Item = (PairKey, &Pair<P>)> {
        self.pairs.iter().map(|(k, p)| (*k, p))
    }

    /// Request a pair to exist after the next commit.
    pub fn add_buffered_pair(&mut self, a: ProxyId, b: ProxyId) -> Result<(), CollisionError> {
        let key = pair_key(a, b);
        if !self.pairs.contains_key(&key) && self.pairs.len() >= self.max_pairs {
            return Err(CollisionError::CapacityExceeded {
                resource: "pair table",
                limit: self.max_pairs,
            });
        }
        let pair = self.pairs.entry(key).or_insert(Pair {
            buffered: false,
            removed: false,
            reported: false,
            data: None,
        });
        if !pair.buffered {
            pair.buffered = true;
            self.buffer.push(key);
        }
        pair.removed = false;
        Ok(())
    }

    /// Request a pair to be gone after the next commit.
    /// Does nothing if the pair doesn't exist.
    pub fn remove_buffered_pair(&mut self, a: ProxyId, b: ProxyId) {
        let key = pair_key(a, b);
        let Some(pair) = self.pairs.get_mut(&key) else {
            return;
        };
        if !pair.buffered {
            pair.buffered = true;
            self.buffer.push(key);
        }
        pair.removed = true;
    }

    /// Resolve buffered requests and notify the callback of actual changes.
    ///
    /// `overlaps` confirms that a pair overlaps on both axes;
    /// pairs failing it are dropped as if they had been removed.
    pub fn commit<T, C>(
        &mut self,
        proxies: &ProxyPool<T>,
        callback: &mut C,
        overlaps: impl Fn(PairKey) -> bool,
    ) -> Result<(), CollisionError>
    where
        C: PairCallback<T, PairData = P>,
    {
        let mut buffer = std::mem::take(&mut self.buffer);
        let mut result = Ok(());
        for key in buffer.drain(..) {
            let Some(pair) = self.pairs.get_mut(&key) else {
                result = Err(CollisionError::AssertionFailure(
                    "buffered pair missing from the pair table",
                ));
                continue;
            };
            pair.buffered = false;
            let (Some(data_a), Some(data_b)) = (
                proxies.at(key[0]).user_data.as_ref(),
                proxies.at(key[1]).user_data.as_ref(),
            ) else {
                result = Err(CollisionError::AssertionFailure(
                    "pair references an inactive proxy",
                ));
                continue;
            };

            if pair.removed || !overlaps(key) {
                // a pair added and removed before a commit was never reported,
                // so the user doesn't hear about its removal either
                if pair.reported {
                    log::trace!("pair removed: {:?}", key);
                    callback.pair_removed(data_a, data_b, pair.data.take());
                }
                self.pairs.remove(&key);
            } else if !pair.reported {
                log::trace!("pair added: {:?}", key);
                pair.data = Some(callback.pair_added(data_a, data_b));
                pair.reported = true;
            }
        }
        // keep the allocation around for the next operation
        self.buffer = buffer;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log {
        added: Vec<(u32, u32)>,
        removed: Vec<(u32, u32, Option<u32>)>,
    }

    impl PairCallback<u32> for Log {
        type PairData = u32;

        fn pair_added(&mut self, a: &u32, b: &u32) -> u32 {
            self.added.push((*a, *b));
            a * 100 + b
        }

        fn pair_removed(&mut self, a: &u32, b: &u32, data: Option<u32>) {
            self.removed.push((*a, *b, data));
        }
    }

    fn pool_with(n: u32) -> (ProxyPool<u32>, Vec<ProxyId>) {
        let mut pool = ProxyPool::new(8);
        let ids = (0..n).map(|i| pool.alloc(i).unwrap()).collect();
        (pool, ids)
    }

    #[test]
    fn add_then_remove_reports_once_each() {
        let (pool, ids) = pool_with(2);
        let mut pm = PairManager::new(4);
        let mut log = Log::default();

        pm.add_buffered_pair(ids[1], ids[0]).unwrap();
        pm.add_buffered_pair(ids[0], ids[1]).unwrap();
        pm.commit(&pool, &mut log, |_| true).unwrap();
        assert_eq!(log.added, vec![(0, 1)]);
        assert!(pm.find(ids[0], ids[1]).unwrap().is_reported());
        assert_eq!(pm.find(ids[0], ids[1]).unwrap().data(), Some(&1));

        pm.remove_buffered_pair(ids[0], ids[1]);
        pm.commit(&pool, &mut log, |_| true).unwrap();
        assert_eq!(log.removed, vec![(0, 1, Some(1))]);
        assert_eq!(pm.len(), 0);
    }

    #[test]
    fn transient_changes_are_silent() {
        let (pool, ids) = pool_with(3);
        let mut pm = PairManager::new(4);
        let mut log = Log::default();

        // added and removed before a commit
        pm.add_buffered_pair(ids[0], ids[1]).unwrap();
        pm.remove_buffered_pair(ids[0], ids[1]);
        pm.commit(&pool, &mut log, |_| true).unwrap();
        assert!(log.added.is_empty() && log.removed.is_empty());
        assert_eq!(pm.len(), 0);

        // removed and re-added before a commit
        pm.add_buffered_pair(ids[1], ids[2]).unwrap();
        pm.commit(&pool, &mut log, |_| true).unwrap();
        pm.remove_buffered_pair(ids[1], ids[2]);
        pm.add_buffered_pair(ids[1], ids[2]).unwrap();
        pm.commit(&pool, &mut log, |_| true).unwrap();
        assert_eq!(log.added, vec![(1, 2)]);
        assert!(log.removed.is_empty());
        assert!(pm.contains(ids[2], ids[1]));
    }

    #[test]
    fn unconfirmed_pairs_are_dropped() {
        let (pool, ids) = pool_with(2);
        let mut pm = PairManager::new(4);
        let mut log = Log::default();
        pm.add_buffered_pair(ids[0], ids[1]).unwrap();
        pm.commit(&pool, &mut log, |_| false).unwrap();
        assert!(log.added.is_empty());
        assert_eq!(pm.len(), 0);
    }

    #[test]
    fn capacity() {
        let (_pool, ids) = pool_with(3);
        let mut pm: PairManager<u32> = PairManager::new(1);
        pm.add_buffered_pair(ids[0], ids[1]).unwrap();
        // same pair again is fine
        pm.add_buffered_pair(ids[1], ids[0]).unwrap();
        assert_eq!(
            pm.add_buffered_pair(ids[0], ids[2]),
            Err(CollisionError::CapacityExceeded {
                resource: "pair table",
                limit: 1
            })
        );
    }
}
