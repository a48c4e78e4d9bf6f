//! Fixed-capacity storage for broad phase proxies.

use super::CollisionError;

/// Overlap count marking a proxy slot that is not in use.
pub(crate) const INVALID: u16 = u16::MAX;

/// Handle to a proxy in the broad phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProxyId(pub(crate) u16);

impl ProxyId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A shape's representative in the broad phase.
#[derive(Clone, Debug)]
pub(crate) struct Proxy<T> {
    /// Positions of this proxy's lower bounds in the bound arrays, per axis.
    pub lower_bounds: [usize; 2],
    /// Positions of this proxy's upper bounds in the bound arrays, per axis.
    pub upper_bounds: [usize; 2],
    /// During a query, the number of axes this proxy was found on.
    /// `INVALID` when the slot is free.
    pub overlap_count: u16,
    /// Query stamp at which `overlap_count` was last written.
    pub time_stamp: u16,
    pub user_data: Option<T>,
    next_free: Option<u16>,
}

impl<T> Proxy<T> {
    fn free(next_free: Option<u16>) -> Self {
        Proxy {
            lower_bounds: [0; 2],
            upper_bounds: [0; 2],
            overlap_count: INVALID,
            time_stamp: 0,
            user_data: None,
            next_free,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.overlap_count != INVALID
    }
}

/// Proxies in a pre-sized array with an intrusive free list.
#[derive(Clone, Debug)]
pub(crate) struct ProxyPool<T> {
    proxies: Vec<Proxy<T>>,
    free_head: Option<u16>,
    count: usize,
}

impl<T> ProxyPool<T> {
    pub fn new(capacity: usize) -> Self {
        let proxies = (0..capacity)
            .map(|i| {
                let next = if i + 1 < capacity {
                    Some((i + 1) as u16)
                } else {
                    None
                };
                Proxy::free(next)
            })
            .collect();
        ProxyPool {
            proxies,
            free_head: if capacity > 0 { Some(0) } else { None },
            count: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_full(&self) -> bool {
        self.free_head.is_none()
    }

    /// Take a slot from the free list.
    pub fn alloc(&mut self, user_data: T) -> Result<ProxyId, CollisionError> {
        let idx = self.free_head.ok_or(CollisionError::CapacityExceeded {
            resource: "proxy pool",
            limit: self.proxies.len(),
        })?;
        let proxy = &mut self.proxies[idx as usize];
        self.free_head = proxy.next_free.take();
        proxy.overlap_count = 0;
        proxy.user_data = Some(user_data);
        self.count += 1;
        Ok(ProxyId(idx))
    }

    /// Return a slot to the free list, handing back its user data.
    pub fn free(&mut self, id: ProxyId) -> Result<T, CollisionError> {
        let proxy = self
            .proxies
            .get_mut(id.index())
            .filter(|p| p.is_valid())
            .ok_or(CollisionError::InvalidHandle(id))?;
        let user_data = proxy.user_data.take();
        *proxy = Proxy::free(self.free_head);
        self.free_head = Some(id.0);
        self.count -= 1;
        user_data.ok_or(CollisionError::AssertionFailure(
            "active proxy without user data",
        ))
    }

    /// Get an active proxy.
    pub fn get(&self, id: ProxyId) -> Result<&Proxy<T>, CollisionError> {
        self.proxies
            .get(id.index())
            .filter(|p| p.is_valid())
            .ok_or(CollisionError::InvalidHandle(id))
    }

    /// Unchecked access by id for ids read back out of the bound arrays.
    #[inline]
    pub fn at(&self, id: ProxyId) -> &Proxy<T> {
        &self.proxies[id.index()]
    }

    #[inline]
    pub fn at_mut(&mut self, id: ProxyId) -> &mut Proxy<T> {
        &mut self.proxies[id.index()]
    }

    pub fn iter_active(&self) -> impl '_ + Iterator<Item = (ProxyId, &Proxy<T>)> {
        self.proxies
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_valid())
            .map(|(i, p)| (ProxyId(i as u16), p))
    }

    /// Reset every proxy's time stamp, used when the query stamp wraps around.
    pub fn reset_time_stamps(&mut self) {
        for proxy in &mut self.proxies {
            proxy.time_stamp = 0;
        }
    }
}
