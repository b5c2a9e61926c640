//! Recency (LRU) list with a high-priority pool.
//!
//! A circular doubly-linked list threaded through the entries' own
//! `prev`/`next` fields, behind a sentinel node so the empty case needs no
//! special-casing. The list holds exactly the evictable entries of a shard:
//! in-cache, zero references, not shadowed by the hot index.
//!
//! The list is split into two segments:
//!
//! ```text
//!            eviction end                              insertion end
//!            v                                                     v
//! [sentinel] <-> L1 <-> L2 <-> ... <-> Lk <-> H1 <-> ... <-> Hm <-> [sentinel]
//!            \___ low-priority ______/ ^   \___ high-priority ___/
//!                                 low_pri
//! ```
//!
//! - Eviction always takes `sentinel.next`: the oldest low-priority entry,
//!   or the oldest high-priority entry once the low segment is empty.
//! - High-priority entries (and any entry that has seen a hit) are inserted
//!   just before the sentinel and counted against the high-priority pool;
//!   when the pool overflows its capacity, the boundary `low_pri` walks
//!   forward, demoting the oldest high-priority entries in place.
//! - Low-priority entries are inserted just after `low_pri`, becoming the
//!   newest low-priority entry.
//!
//! `remove` is idempotent: entries not on the list (hot-index residents,
//! externally referenced entries) carry null links and removing them is a
//! no-op. Erase paths rely on this.

use crate::entry::{LruEntry, MetadataChargePolicy};

pub(crate) struct LruList<V> {
    /// The sentinel. `sentinel.next` is the eviction end, `sentinel.prev`
    /// the insertion end.
    sentinel: *mut LruEntry<V>,
    /// Newest low-priority entry; the sentinel when the low segment is
    /// empty.
    low_pri: *mut LruEntry<V>,
    /// Sum of charges over entries currently on the list.
    lru_usage: usize,
    /// Sum of charges over entries in the high-priority segment.
    high_pri_pool_usage: usize,
    high_pri_pool_ratio: f64,
    high_pri_pool_capacity: usize,
    policy: MetadataChargePolicy,
}

impl<V> LruList<V> {
    pub(crate) fn new(high_pri_pool_ratio: f64, policy: MetadataChargePolicy) -> Self {
        let sentinel = LruEntry::alloc_sentinel();
        // SAFETY: freshly allocated sentinel; making the list circular.
        unsafe {
            (*sentinel).next = sentinel;
            (*sentinel).prev = sentinel;
        }
        LruList {
            sentinel,
            low_pri: sentinel,
            lru_usage: 0,
            high_pri_pool_usage: 0,
            high_pri_pool_ratio,
            high_pri_pool_capacity: 0,
            policy,
        }
    }

    #[inline]
    pub(crate) fn lru_usage(&self) -> usize {
        self.lru_usage
    }

    #[inline]
    #[allow(dead_code)]
    pub(crate) fn high_pri_pool_usage(&self) -> usize {
        self.high_pri_pool_usage
    }

    #[inline]
    pub(crate) fn high_pri_pool_ratio(&self) -> f64 {
        self.high_pri_pool_ratio
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        // SAFETY: the sentinel is always valid.
        unsafe { (*self.sentinel).next == self.sentinel }
    }

    /// The next eviction victim, or null if the list is empty.
    #[inline]
    pub(crate) fn oldest(&self) -> *mut LruEntry<V> {
        // SAFETY: the sentinel is always valid.
        let next = unsafe { (*self.sentinel).next };
        if next == self.sentinel {
            core::ptr::null_mut()
        } else {
            next
        }
    }

    /// The most recently inserted entry, or null if the list is empty.
    #[inline]
    pub(crate) fn newest(&self) -> *mut LruEntry<V> {
        // SAFETY: the sentinel is always valid.
        let prev = unsafe { (*self.sentinel).prev };
        if prev == self.sentinel {
            core::ptr::null_mut()
        } else {
            prev
        }
    }

    /// Recomputes the high-priority pool capacity for a new shard capacity
    /// or ratio. The caller follows up with [`maintain_pool_size`]
    /// (`Self::maintain_pool_size`) to demote any overflow.
    pub(crate) fn set_capacity(&mut self, capacity: usize) {
        self.high_pri_pool_capacity = (capacity as f64 * self.high_pri_pool_ratio) as usize;
    }

    pub(crate) fn set_high_pri_pool_ratio(&mut self, ratio: f64, capacity: usize) {
        self.high_pri_pool_ratio = ratio;
        self.set_capacity(capacity);
    }

    /// Detaches an entry from the list. No-op if the entry is not on it.
    ///
    /// # Safety
    ///
    /// `e` must be a live entry belonging to this shard.
    pub(crate) unsafe fn remove(&mut self, e: *mut LruEntry<V>) {
        if (*e).next.is_null() || (*e).prev.is_null() {
            return;
        }
        if self.low_pri == e {
            self.low_pri = (*e).prev;
        }
        (*(*e).next).prev = (*e).prev;
        (*(*e).prev).next = (*e).next;
        (*e).prev = core::ptr::null_mut();
        (*e).next = core::ptr::null_mut();
        let charge = (*e).total_charge(self.policy);
        debug_assert!(self.lru_usage >= charge);
        self.lru_usage -= charge;
        if (*e).in_high_pri_pool() {
            debug_assert!(self.high_pri_pool_usage >= charge);
            self.high_pri_pool_usage -= charge;
        }
    }

    /// Attaches an entry according to its priority. No-op if the entry is
    /// already on the list.
    ///
    /// # Safety
    ///
    /// `e` must be a live entry belonging to this shard, with zero
    /// references and not in the hot index.
    pub(crate) unsafe fn insert(&mut self, e: *mut LruEntry<V>) {
        if !(*e).next.is_null() || !(*e).prev.is_null() {
            return;
        }
        let charge = (*e).total_charge(self.policy);
        if self.high_pri_pool_ratio > 0.0 && ((*e).is_high_priority() || (*e).has_hit()) {
            // Head of the list, into the high-priority pool.
            (*e).next = self.sentinel;
            (*e).prev = (*self.sentinel).prev;
            (*(*e).prev).next = e;
            (*(*e).next).prev = e;
            (*e).set_in_high_pri_pool(true);
            self.high_pri_pool_usage += charge;
            self.maintain_pool_size();
        } else {
            // Head of the low-priority segment. With a zero pool ratio this
            // is also the head of the whole list.
            (*e).next = (*self.low_pri).next;
            (*e).prev = self.low_pri;
            (*(*e).prev).next = e;
            (*(*e).next).prev = e;
            (*e).set_in_high_pri_pool(false);
            self.low_pri = e;
        }
        self.lru_usage += charge;
    }

    /// Demotes the oldest high-priority entries until the pool fits its
    /// capacity again. Demotion moves the segment boundary, not the entry.
    pub(crate) fn maintain_pool_size(&mut self) {
        while self.high_pri_pool_usage > self.high_pri_pool_capacity {
            // SAFETY: the pool is non-empty (its usage is positive), so the
            // node after `low_pri` is a real entry, not the sentinel.
            unsafe {
                self.low_pri = (*self.low_pri).next;
                debug_assert!(self.low_pri != self.sentinel);
                (*self.low_pri).set_in_high_pri_pool(false);
                let charge = (*self.low_pri).total_charge(self.policy);
                debug_assert!(self.high_pri_pool_usage >= charge);
                self.high_pri_pool_usage -= charge;
            }
        }
    }

    /// Number of entries on the list. O(n); debugging and tests only.
    pub(crate) fn len(&self) -> usize {
        let mut n = 0;
        // SAFETY: walking the circular list from the sentinel back to it.
        unsafe {
            let mut p = (*self.sentinel).next;
            while p != self.sentinel {
                n += 1;
                p = (*p).next;
            }
        }
        n
    }
}

impl<V> Drop for LruList<V> {
    fn drop(&mut self) {
        // Entries are owned and freed by the shard's primary table; only
        // the sentinel belongs to the list.
        // SAFETY: the sentinel was allocated in `new` and never freed
        // elsewhere.
        unsafe {
            let s = self.sentinel;
            (*s).next = core::ptr::null_mut();
            (*s).prev = core::ptr::null_mut();
            LruEntry::free(s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Priority;

    fn make(key: &[u8], charge: usize, priority: Priority) -> *mut LruEntry<u32> {
        LruEntry::alloc(key, 0, Some(0), charge, None, priority)
    }

    unsafe fn drain_and_free(list: &mut LruList<u32>) {
        loop {
            let e = list.oldest();
            if e.is_null() {
                break;
            }
            list.remove(e);
            LruEntry::free(e);
        }
    }

    #[test]
    fn test_empty_list() {
        let list: LruList<u32> = LruList::new(0.0, MetadataChargePolicy::DontCharge);
        assert!(list.is_empty());
        assert!(list.oldest().is_null());
        assert!(list.newest().is_null());
        assert_eq!(list.lru_usage(), 0);
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn test_low_pri_order_and_usage() {
        let mut list: LruList<u32> = LruList::new(0.0, MetadataChargePolicy::DontCharge);
        list.set_capacity(10);
        let a = make(b"a", 1, Priority::Low);
        let b = make(b"b", 2, Priority::Low);
        let c = make(b"c", 3, Priority::Low);
        unsafe {
            list.insert(a);
            list.insert(b);
            list.insert(c);
        }
        assert_eq!(list.lru_usage(), 6);
        assert_eq!(list.len(), 3);
        // Oldest first: a, then b, then c.
        assert_eq!(list.oldest(), a);
        assert_eq!(list.newest(), c);
        unsafe {
            list.remove(a);
            assert_eq!(list.oldest(), b);
            assert_eq!(list.lru_usage(), 5);
            // Removing again is a no-op.
            list.remove(a);
            assert_eq!(list.lru_usage(), 5);
            LruEntry::free(a);
            drain_and_free(&mut list);
        }
    }

    #[test]
    fn test_high_pri_evicted_after_low_pri() {
        let mut list: LruList<u32> = LruList::new(0.5, MetadataChargePolicy::DontCharge);
        list.set_capacity(4);
        let h = make(b"h", 1, Priority::High);
        let l = make(b"l", 1, Priority::Low);
        unsafe {
            list.insert(h);
            list.insert(l);
        }
        // The low-priority entry is the victim even though it is newer.
        assert_eq!(list.oldest(), l);
        assert_eq!(list.high_pri_pool_usage(), 1);
        unsafe { drain_and_free(&mut list) };
    }

    #[test]
    fn test_has_hit_promotes_to_pool() {
        let mut list: LruList<u32> = LruList::new(0.5, MetadataChargePolicy::DontCharge);
        list.set_capacity(4);
        let e = make(b"e", 1, Priority::Low);
        unsafe {
            (*e).set_hit();
            list.insert(e);
            assert!((*e).in_high_pri_pool());
            drain_and_free(&mut list);
        }
    }

    #[test]
    fn test_maintain_pool_size_demotes_oldest() {
        let mut list: LruList<u32> = LruList::new(0.5, MetadataChargePolicy::DontCharge);
        list.set_capacity(4); // pool capacity 2
        let h1 = make(b"h1", 1, Priority::High);
        let h2 = make(b"h2", 1, Priority::High);
        let h3 = make(b"h3", 1, Priority::High);
        unsafe {
            list.insert(h1);
            list.insert(h2);
            assert_eq!(list.high_pri_pool_usage(), 2);
            list.insert(h3);
            // h1 (the oldest high-priority entry) was demoted in place.
            assert_eq!(list.high_pri_pool_usage(), 2);
            assert!(!(*h1).in_high_pri_pool());
            assert!((*h2).in_high_pri_pool());
            assert!((*h3).in_high_pri_pool());
            // Eviction order is unchanged: h1 is still the oldest.
            assert_eq!(list.oldest(), h1);
            drain_and_free(&mut list);
        }
    }

    #[test]
    fn test_zero_ratio_ignores_priority() {
        let mut list: LruList<u32> = LruList::new(0.0, MetadataChargePolicy::DontCharge);
        list.set_capacity(4);
        let h = make(b"h", 1, Priority::High);
        unsafe {
            list.insert(h);
            assert!(!(*h).in_high_pri_pool());
            assert_eq!(list.high_pri_pool_usage(), 0);
            drain_and_free(&mut list);
        }
    }

    #[test]
    fn test_ratio_change_demotes() {
        let mut list: LruList<u32> = LruList::new(0.5, MetadataChargePolicy::DontCharge);
        list.set_capacity(4);
        let h1 = make(b"h1", 1, Priority::High);
        let h2 = make(b"h2", 1, Priority::High);
        unsafe {
            list.insert(h1);
            list.insert(h2);
        }
        list.set_high_pri_pool_ratio(0.25, 4); // pool capacity 1
        list.maintain_pool_size();
        assert_eq!(list.high_pri_pool_usage(), 1);
        unsafe {
            assert!(!(*h1).in_high_pri_pool());
            drain_and_free(&mut list);
        }
    }
}
