//! Hot index: a read-optimized shadow of a shard's hottest entries.
//!
//! A fixed-size open-chained table that duplicates a small subset of the
//! primary table. Entries in the hot index are taken off the recency list
//! entirely; lookups that hit here run under the shard's *shared* lock and
//! touch no LRU state, so a stable working set is served without ever
//! contending on the exclusive lock. Membership is managed FIFO by
//! insertion order.
//!
//! # The reference-slot pool
//!
//! Readers cannot touch `entry.refs` (exclusive-lock domain) without
//! defeating the point, so each hot entry owns a *stamp*: an index into a
//! pool of `capacity x reader_slots` counters. Reader thread `t` accounts
//! its reference in counter `stamp * reader_slots + t`, so concurrent
//! readers of one entry land on different cache lines' worth of counters
//! and never contend. The pool balance of a stamp is the number of
//! outstanding references the hot index has handed out for that entry
//! (it may transiently go negative when a reference taken as a plain
//! `refs` increment is released through the pool; only the *sum* of the
//! two domains is meaningful).
//!
//! Removal, under the writer lock, sums the stamp's range, folds the
//! balance into `entry.refs` (saturating at zero), and frees the stamp.
//! After that point the entry is reference-counted like any other.
//!
//! # Locking
//!
//! All `&mut self` methods require the shard's writer lock on this index
//! (itself only acquired while holding the shard's exclusive lock);
//! [`HotIndex::lookup`] requires at least the shared lock. The pool itself
//! is shared separately through [`HotPool`] so that releasing a hot handle
//! needs no lock at all.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::entry::{LruEntry, NO_STAMP};

/// log2 of the hot index bucket count.
pub(crate) const HOT_INDEX_BITS: u32 = 8;
/// Number of stamps (and buckets). The index holds at most half this many
/// entries so chains stay short.
pub(crate) const HOT_INDEX_CAPACITY: usize = 1 << HOT_INDEX_BITS;

static NEXT_READER_ID: AtomicUsize = AtomicUsize::new(0);

std::thread_local! {
    /// Process-wide reader id, assigned on first use per thread.
    static READER_ID: usize = NEXT_READER_ID.fetch_add(1, Ordering::Relaxed);
}

/// The reference-slot pool backing one shard's hot index.
///
/// Kept outside the index's reader/writer lock so a release can decrement
/// its slot with no lock held.
pub(crate) struct HotPool {
    slots: Box<[AtomicI32]>,
    reader_slots: usize,
}

impl HotPool {
    pub(crate) fn new(reader_slots: usize) -> Arc<Self> {
        let slots = (0..HOT_INDEX_CAPACITY * reader_slots)
            .map(|_| AtomicI32::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Arc::new(HotPool { slots, reader_slots })
    }

    /// This thread's slot offset within a stamp's range.
    #[inline]
    fn reader_offset(&self) -> usize {
        READER_ID.with(|id| *id % self.reader_slots)
    }

    #[inline]
    fn in_range(&self, stamp: i32) -> bool {
        stamp >= 0 && (stamp as usize) < HOT_INDEX_CAPACITY
    }

    /// Accounts one reference against an entry's stamp, if it has one.
    #[inline]
    pub(crate) fn acquire(&self, stamp: i32) {
        if self.in_range(stamp) {
            let idx = stamp as usize * self.reader_slots + self.reader_offset();
            self.slots[idx].fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Releases one reference against an entry's stamp, if it still has
    /// one. A removal may have raced and already folded this stamp; the
    /// stale decrement is absorbed by the saturating fold.
    #[inline]
    pub(crate) fn release(&self, stamp: i32) {
        if self.in_range(stamp) {
            let idx = stamp as usize * self.reader_slots + self.reader_offset();
            self.slots[idx].fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Sums a stamp's range. Writer-lock callers see a stable balance.
    fn sum(&self, stamp: usize) -> i32 {
        let base = stamp * self.reader_slots;
        self.slots[base..base + self.reader_slots]
            .iter()
            .map(|s| s.load(Ordering::Acquire))
            .sum()
    }

    fn zero(&self, stamp: usize) {
        let base = stamp * self.reader_slots;
        for slot in &self.slots[base..base + self.reader_slots] {
            slot.store(0, Ordering::Release);
        }
    }

    #[cfg(test)]
    pub(crate) fn sum_for_test(&self, stamp: i32) -> i32 {
        self.sum(stamp as usize)
    }
}

pub(crate) struct HotIndex<V> {
    buckets: Box<[*mut LruEntry<V>]>,
    elems: u32,
    /// Insertion order, as owned `(key, hash)` pairs. May contain stale
    /// pairs for entries that have since been removed; eviction skips them.
    fifo: VecDeque<(Box<[u8]>, u32)>,
    pool: Arc<HotPool>,
    /// Stamp availability; a stamp is taken iff its flag is set.
    available: Box<[bool]>,
    /// Probe start for the next stamp allocation.
    stamp_cursor: usize,
    /// Inserts refused because eviction could not make room.
    pub(crate) blocked_inserts: u64,
    /// Entries evicted through the FIFO.
    pub(crate) fifo_evictions: u64,
}

// SAFETY: the raw pointers reference entries owned by the shard's primary
// table; every access is serialized by the shard's reader/writer lock
// (chains, flags, fifo) or goes through the atomic pool.
unsafe impl<V: Send> Send for HotIndex<V> {}
unsafe impl<V: Send + Sync> Sync for HotIndex<V> {}

impl<V> HotIndex<V> {
    pub(crate) fn new(pool: Arc<HotPool>) -> Self {
        HotIndex {
            buckets: vec![core::ptr::null_mut(); HOT_INDEX_CAPACITY].into_boxed_slice(),
            elems: 0,
            fifo: VecDeque::new(),
            pool,
            available: vec![false; HOT_INDEX_CAPACITY].into_boxed_slice(),
            stamp_cursor: 0,
            blocked_inserts: 0,
            fifo_evictions: 0,
        }
    }

    #[inline]
    #[allow(dead_code)]
    pub(crate) fn len(&self) -> u32 {
        self.elems
    }

    /// True once the index is at its working capacity (half the bucket
    /// count, so chains stay near length one).
    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        (self.elems >> (HOT_INDEX_BITS - 1)) > 0
    }

    #[inline]
    fn bucket(&self, hash: u32) -> usize {
        (hash & (HOT_INDEX_CAPACITY as u32 - 1)) as usize
    }

    fn find(&self, key: &[u8], hash: u32) -> *mut LruEntry<V> {
        let mut p = self.buckets[self.bucket(hash)];
        // SAFETY: chains only reference live entries, mutated exclusively
        // under the writer lock; readers hold at least the shared lock.
        unsafe {
            while !p.is_null() && ((*p).hash != hash || (*p).key.as_ref() != key) {
                p = (*p).next_hot;
            }
        }
        p
    }

    /// Shared-lock lookup. On a hit, the reference is accounted in the
    /// entry's pool slot before the pointer is returned.
    pub(crate) fn lookup(&self, key: &[u8], hash: u32) -> *mut LruEntry<V> {
        let e = self.find(key, hash);
        if !e.is_null() {
            // SAFETY: `e` is chained into this index and thus live.
            let stamp = unsafe { (*e).stamp.load(Ordering::Acquire) };
            self.pool.acquire(stamp);
        }
        e
    }

    /// Inserts an entry, evicting through the FIFO when at capacity.
    ///
    /// Returns `false` (leaving the entry untouched) when the index stayed
    /// full because every eviction candidate was pinned by outstanding
    /// references. An entry already in the index is left as-is.
    ///
    /// # Safety
    ///
    /// Writer lock held; `e` must be a live in-cache entry whose key is not
    /// chained here under a different entry.
    pub(crate) unsafe fn insert(&mut self, e: *mut LruEntry<V>) -> bool {
        if (*e).in_hot_index() {
            return true;
        }
        if self.is_full() {
            self.evict_fifo();
        }
        if self.is_full() {
            self.blocked_inserts += 1;
            return false;
        }

        let stamp = match self.allocate_stamp() {
            Some(s) => s,
            None => {
                // Cannot happen while elems < capacity/2, but never insert
                // without a stamp.
                self.blocked_inserts += 1;
                return false;
            }
        };

        let idx = self.bucket((*e).hash);
        (*e).next_hot = self.buckets[idx];
        self.buckets[idx] = e;
        self.elems += 1;
        self.fifo.push_back(((*e).key.clone(), (*e).hash));
        (*e).stamp.store(stamp as i32, Ordering::Release);
        (*e).set_in_hot_index(true);
        true
    }

    fn allocate_stamp(&mut self) -> Option<usize> {
        let mut i = self.stamp_cursor;
        for _ in 0..HOT_INDEX_CAPACITY {
            i += 1;
            if i >= HOT_INDEX_CAPACITY {
                i = 0;
            }
            if !self.available[i] {
                self.available[i] = true;
                self.stamp_cursor = i;
                return Some(i);
            }
        }
        None
    }

    /// Removes the entry for this key from the index.
    ///
    /// With `dont_force`, the entry is left in place (returning null) if
    /// the summed reference count over both domains is non-zero. Otherwise
    /// the stamp's pool balance is folded into `entry.refs`, saturating at
    /// zero if a racing release already drained a count the fold expected.
    ///
    /// # Safety
    ///
    /// Writer lock *and* the shard's exclusive lock held (the fold writes
    /// `entry.refs`).
    pub(crate) unsafe fn remove(
        &mut self,
        key: &[u8],
        hash: u32,
        dont_force: bool,
    ) -> *mut LruEntry<V> {
        let e = self.find(key, hash);
        if e.is_null() {
            return e;
        }
        let stamp = (*e).stamp.load(Ordering::Acquire);
        debug_assert!(stamp >= 0 && (stamp as usize) < HOT_INDEX_CAPACITY);
        if stamp < 0 || stamp as usize >= HOT_INDEX_CAPACITY {
            return core::ptr::null_mut();
        }
        let stamp = stamp as usize;

        let balance = self.pool.sum(stamp);
        if dont_force && balance as i64 + (*e).refs as i64 != 0 {
            return core::ptr::null_mut();
        }
        self.pool.zero(stamp);
        let folded = (*e).refs as i64 + balance as i64;
        (*e).refs = folded.max(0) as u32;
        (*e).stamp.store(NO_STAMP, Ordering::Release);
        self.available[stamp] = false;
        (*e).set_in_hot_index(false);
        self.unlink(e);
        self.elems -= 1;
        e
    }

    unsafe fn unlink(&mut self, e: *mut LruEntry<V>) {
        let idx = self.bucket((*e).hash);
        let mut slot: *mut *mut LruEntry<V> = &mut self.buckets[idx];
        while !(*slot).is_null() && *slot != e {
            slot = &mut (**slot).next_hot;
        }
        debug_assert!(!(*slot).is_null());
        if *slot == e {
            *slot = (*e).next_hot;
            (*e).next_hot = core::ptr::null_mut();
        }
    }

    /// Evicts one entry in FIFO order, skipping pinned entries and stale
    /// queue pairs; bounded by one pass over the queue.
    ///
    /// Returns the evicted entry (its references folded, out of the index)
    /// or null if nothing was evictable.
    ///
    /// # Safety
    ///
    /// Writer lock and shard exclusive lock held (see [`HotIndex::remove`]).
    pub(crate) unsafe fn evict_fifo(&mut self) -> *mut LruEntry<V> {
        let mut budget = self.fifo.len().min(HOT_INDEX_CAPACITY);
        while budget > 0 {
            budget -= 1;
            let (key, hash) = match self.fifo.pop_front() {
                Some(pair) => pair,
                None => break,
            };
            if self.find(&key, hash).is_null() {
                // Stale pair: the entry left the index some other way.
                continue;
            }
            let removed = self.remove(&key, hash, true);
            if removed.is_null() {
                // Still referenced; give it another round.
                self.fifo.push_back((key, hash));
                continue;
            }
            self.fifo_evictions += 1;
            return removed;
        }
        core::ptr::null_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Priority;

    fn make(key: &[u8], hash: u32) -> *mut LruEntry<u32> {
        let e = LruEntry::alloc(key, hash, Some(0), 1, None, Priority::Low);
        // Hot-index entries are always in the cache.
        unsafe { (*e).set_in_cache(true) };
        e
    }

    unsafe fn free(e: *mut LruEntry<u32>) {
        (*e).set_in_cache(false);
        (*e).refs = 0;
        LruEntry::free(e);
    }

    #[test]
    fn test_insert_lookup_sets_slot() {
        let pool = HotPool::new(4);
        let mut hot: HotIndex<u32> = HotIndex::new(Arc::clone(&pool));
        let e = make(b"k", 77);
        unsafe {
            assert!(hot.insert(e));
            assert!((*e).in_hot_index());
            let stamp = (*e).stamp.load(Ordering::Acquire);
            assert!(stamp >= 0);

            let found = hot.lookup(b"k", 77);
            assert_eq!(found, e);
            assert_eq!(pool.sum_for_test(stamp), 1);

            // Releasing through the pool brings the balance back to zero.
            pool.release(stamp);
            assert_eq!(pool.sum_for_test(stamp), 0);

            let removed = hot.remove(b"k", 77, false);
            assert_eq!(removed, e);
            assert!(!(*e).in_hot_index());
            assert_eq!((*e).stamp.load(Ordering::Acquire), NO_STAMP);
            free(e);
        }
    }

    #[test]
    fn test_lookup_miss() {
        let pool = HotPool::new(2);
        let hot: HotIndex<u32> = HotIndex::new(pool);
        assert!(hot.lookup(b"missing", 1).is_null());
    }

    #[test]
    fn test_remove_folds_outstanding_refs() {
        let pool = HotPool::new(4);
        let mut hot: HotIndex<u32> = HotIndex::new(Arc::clone(&pool));
        let e = make(b"k", 5);
        unsafe {
            hot.insert(e);
            // Two outstanding shared-path references.
            hot.lookup(b"k", 5);
            hot.lookup(b"k", 5);
            let stamp = (*e).stamp.load(Ordering::Acquire);
            assert_eq!(pool.sum_for_test(stamp), 2);

            // dont_force refuses while references are outstanding.
            assert!(hot.remove(b"k", 5, true).is_null());
            assert!((*e).in_hot_index());

            // Forced removal folds the balance into refs and zeroes the
            // slot range.
            let removed = hot.remove(b"k", 5, false);
            assert_eq!(removed, e);
            assert_eq!((*e).refs, 2);
            assert_eq!(pool.sum_for_test(stamp), 0);

            (*e).refs = 0;
            free(e);
        }
    }

    #[test]
    fn test_fold_saturates_on_underflow() {
        let pool = HotPool::new(4);
        let mut hot: HotIndex<u32> = HotIndex::new(Arc::clone(&pool));
        let e = make(b"k", 9);
        unsafe {
            hot.insert(e);
            // A reference taken as a plain `refs` increment before the
            // entry entered the index, released through the pool.
            let stamp = (*e).stamp.load(Ordering::Acquire);
            pool.release(stamp);
            assert_eq!(pool.sum_for_test(stamp), -1);

            let removed = hot.remove(b"k", 9, false);
            assert_eq!(removed, e);
            // refs was 0, balance -1: the fold saturates at zero.
            assert_eq!((*e).refs, 0);
            free(e);
        }
    }

    #[test]
    fn test_fifo_eviction_order() {
        let pool = HotPool::new(2);
        let mut hot: HotIndex<u32> = HotIndex::new(pool);
        let a = make(b"a", 1);
        let b = make(b"b", 2);
        unsafe {
            hot.insert(a);
            hot.insert(b);
            let evicted = hot.evict_fifo();
            assert_eq!(evicted, a, "oldest insertion is evicted first");
            assert_eq!(hot.len(), 1);
            free(a);
            let evicted = hot.evict_fifo();
            assert_eq!(evicted, b);
            assert!(hot.evict_fifo().is_null());
            free(b);
        }
    }

    #[test]
    fn test_fifo_eviction_skips_pinned() {
        let pool = HotPool::new(2);
        let mut hot: HotIndex<u32> = HotIndex::new(pool);
        let a = make(b"a", 1);
        let b = make(b"b", 2);
        unsafe {
            hot.insert(a);
            hot.insert(b);
            // Pin `a` through the pool.
            hot.lookup(b"a", 1);
            let evicted = hot.evict_fifo();
            assert_eq!(evicted, b, "pinned head is skipped");
            free(b);
            assert!((*a).in_hot_index());
            free_pinned(&mut hot, a);
        }
    }

    unsafe fn free_pinned(hot: &mut HotIndex<u32>, e: *mut LruEntry<u32>) {
        let removed = hot.remove(&(*e).key.clone(), (*e).hash, false);
        assert_eq!(removed, e);
        (*e).refs = 0;
        free(e);
    }

    #[test]
    fn test_insert_blocked_when_all_pinned() {
        let pool = HotPool::new(2);
        let mut hot: HotIndex<u32> = HotIndex::new(pool);
        let mut entries = Vec::new();
        // Fill to working capacity, pinning every entry.
        for i in 0..(HOT_INDEX_CAPACITY / 2) as u32 {
            let e = make(format!("k{i}").as_bytes(), i);
            unsafe {
                assert!(hot.insert(e));
                hot.lookup(&(*e).key.clone(), i);
            }
            entries.push(e);
        }
        assert!(hot.is_full());
        let extra = make(b"extra", 0xFFFF);
        unsafe {
            assert!(!hot.insert(extra), "insert must be refused, all pinned");
            assert!(!(*extra).in_hot_index());
            assert_eq!(hot.blocked_inserts, 1);
            free(extra);
            for e in entries {
                free_pinned(&mut hot, e);
            }
        }
    }

    #[test]
    fn test_stamp_reuse_after_removal() {
        let pool = HotPool::new(2);
        let mut hot: HotIndex<u32> = HotIndex::new(pool);
        for round in 0..3 {
            let mut entries = Vec::new();
            for i in 0..(HOT_INDEX_CAPACITY / 2) as u32 {
                let e = make(format!("r{round}k{i}").as_bytes(), i);
                unsafe { assert!(hot.insert(e)) };
                entries.push(e);
            }
            assert!(hot.is_full());
            for e in entries {
                unsafe {
                    let removed = hot.remove(&(*e).key.clone(), (*e).hash, false);
                    assert_eq!(removed, e);
                    free(e);
                }
            }
            assert_eq!(hot.len(), 0);
        }
    }
}
