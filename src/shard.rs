//! Cache shard: one partition of the cache under its own pair of locks.
//!
//! A shard binds a primary hash table, a recency list, and a hot index:
//!
//! ```text
//!  exclusive lock M                      reader/writer lock RW
//! ┌───────────────────────────────┐    ┌──────────────────────────────┐
//! │ primary table   recency list  │    │ hot index                    │
//! │ usage, capacity, controller   │    │   chains, FIFO, stamp flags  │
//! │ window counters (real+virtual)│    │   (reference-slot pool is    │
//! └───────────────────────────────┘    │    lock-free, shared)        │
//!                                      └──────────────────────────────┘
//! ```
//!
//! # Lock order
//!
//! `M` then `RW`, never the reverse. The shared read path takes only
//! `RW.read` and drops it before falling back to `M`; every hot-index
//! *mutation* happens under both `M` and `RW.write`, which is what makes
//! the reference fold in [`HotIndex::remove`] sound: while a writer holds
//! both locks, no plain `refs` mutation and no slot-pool fold can race it.
//! Releasing a hot-index reference takes no lock at all.
//!
//! # Suspension points
//!
//! Allocation, the client deleter, and secondary-cache traffic all run
//! outside the locks. Paths that evict collect their victims into a local
//! list and dispose of them after unlocking.
//!
//! # The controller
//!
//! Every `recompute_interval` primary-path hits the shard recomputes its
//! hit rate (real or virtual window, whichever saw more traffic),
//! publishes it, derives the skip/flush thresholds from the cross-shard
//! percentiles, optionally flushes the hot index back into the recency
//! list, and refills the index from the most recently used entries. A
//! shard turns its shared path on when its rate beats the average skip
//! threshold, and off again once the shared path misses more than
//! `n_supple` times in a window.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::adaptive::{percentile_threshold, AdaptiveShared, AdaptiveState};
use crate::entry::{DeleterFn, LruEntry, MetadataChargePolicy, Priority};
use crate::error::{CacheError, InsertOutcome, Result};
use crate::hot::{HotIndex, HotPool};
use crate::list::LruList;
use crate::metrics::ShardMetrics;
use crate::secondary::SecondaryCache;
use crate::table::HandleTable;

/// Everything guarded by the shard's exclusive lock.
pub(crate) struct ShardState<V> {
    capacity: usize,
    strict_capacity_limit: bool,
    /// Sum of charges over the primary table's residents. Charged when the
    /// table adopts an entry, uncharged the moment it leaves — referenced
    /// entries that outlive their table residency are no longer counted.
    usage: usize,
    policy: MetadataChargePolicy,
    table: HandleTable<V>,
    lru: LruList<V>,
    metrics: ShardMetrics,
}

// SAFETY: ShardState owns its entries exclusively; all raw-pointer access
// happens with the enclosing Mutex held.
unsafe impl<V: Send> Send for ShardState<V> {}

impl<V> ShardState<V> {
    /// Evicts recency-list entries until `usage + charge` fits, or the
    /// list runs dry. Victims are unlinked, uncharged, and handed to the
    /// caller for post-unlock disposal.
    fn evict_from_lru(&mut self, charge: usize, victims: &mut Vec<*mut LruEntry<V>>) {
        while self.usage + charge > self.capacity {
            let old = self.lru.oldest();
            if old.is_null() {
                break;
            }
            // SAFETY: recency-list entries are in-cache with no references.
            unsafe {
                debug_assert!((*old).in_cache() && !(*old).has_refs());
                self.lru.remove(old);
                let key = core::slice::from_raw_parts((*old).key.as_ptr(), (&(*old).key).len());
                self.table.remove(key, (*old).hash);
                (*old).set_in_cache(false);
                let old_charge = (*old).total_charge(self.policy);
                debug_assert!(self.usage >= old_charge);
                self.usage -= old_charge;
                self.metrics.core.evictions += 1;
                victims.push(old);
            }
        }
    }
}

impl<V> Drop for ShardState<V> {
    fn drop(&mut self) {
        // Every cached entry is reachable from the primary table, hot-index
        // residents included. Outstanding handles borrow the cache, so none
        // can exist by the time the shard drops.
        self.table.drain(|e| unsafe {
            (*e).set_in_cache(false);
            (*e).refs = 0;
            LruEntry::free(e);
        });
    }
}

pub(crate) struct CacheShard<V> {
    state: Mutex<ShardState<V>>,
    hot: RwLock<HotIndex<V>>,
    /// Lock-free view of the hot index's reference-slot pool.
    pool: Arc<HotPool>,
    adaptive: CachePadded<AdaptiveState>,
    /// Cumulative shared-path counters (the controller's window counters
    /// reset every recompute).
    shared_hits: CachePadded<AtomicU64>,
    shared_misses: CachePadded<AtomicU64>,
    shared: Arc<AdaptiveShared>,
    /// This shard's slot on the cross-shard board.
    index: usize,
    hot_mode: u32,
    flush_mode: u32,
    recompute_interval: u32,
    secondary: Option<Arc<dyn SecondaryCache<V>>>,
}

impl<V> CacheShard<V> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        capacity: usize,
        strict_capacity_limit: bool,
        high_pri_pool_ratio: f64,
        policy: MetadataChargePolicy,
        shard_bits: u32,
        index: usize,
        shared: Arc<AdaptiveShared>,
        hot_mode: u32,
        flush_mode: u32,
        recompute_interval: u32,
        reader_slots: usize,
        secondary: Option<Arc<dyn SecondaryCache<V>>>,
    ) -> Self {
        let pool = HotPool::new(reader_slots);
        let mut lru = LruList::new(high_pri_pool_ratio, policy);
        lru.set_capacity(capacity);
        CacheShard {
            state: Mutex::new(ShardState {
                capacity,
                strict_capacity_limit,
                usage: 0,
                policy,
                table: HandleTable::new(shard_bits, 32 - shard_bits),
                lru,
                metrics: ShardMetrics::default(),
            }),
            hot: RwLock::new(HotIndex::new(Arc::clone(&pool))),
            pool,
            adaptive: CachePadded::new(AdaptiveState::default()),
            shared_hits: CachePadded::new(AtomicU64::new(0)),
            shared_misses: CachePadded::new(AtomicU64::new(0)),
            shared,
            index,
            hot_mode,
            flush_mode,
            recompute_interval,
            secondary,
        }
    }

    /// Looks a key up, returning a referenced entry or null.
    ///
    /// Order of business: the hot index under the shared lock (when this
    /// shard has it enabled), then the primary table under the exclusive
    /// lock, then the secondary tier with no lock at all.
    pub(crate) fn lookup(
        &self,
        key: &[u8],
        hash: u32,
        priority: Priority,
        wait: bool,
    ) -> *mut LruEntry<V> {
        if self.hot_mode != 0
            && (self.hot_mode == 100 || self.adaptive.enabled.load(Ordering::Acquire))
        {
            let e = {
                let hot = self.hot.read();
                // A hit accounts the reference in the entry's pool slot
                // before the read lock drops.
                hot.lookup(key, hash)
            };
            self.adaptive.total_hit.fetch_add(1, Ordering::Relaxed);
            if !e.is_null() {
                self.shared_hits.fetch_add(1, Ordering::Relaxed);
                return e;
            }
            self.shared_misses.fetch_add(1, Ordering::Relaxed);
            let misses = self.adaptive.no_hit.fetch_add(1, Ordering::Relaxed) + 1;
            if self.hot_mode != 100 && misses > self.adaptive.n_supple.load(Ordering::Relaxed) {
                // Too uniform a workload for the shadow set to pay off.
                self.adaptive.enabled.store(false, Ordering::Release);
            }
        }

        let mut e;
        {
            let mut state = self.state.lock();
            e = state.table.lookup(key, hash);
            if !e.is_null() {
                // SAFETY: table residents are live; we hold M.
                unsafe {
                    debug_assert!((*e).in_cache());
                    let in_hot = (*e).in_hot_index();
                    self.adaptive.virtual_total_hit.fetch_add(1, Ordering::Relaxed);
                    if !in_hot {
                        self.adaptive.virtual_no_hit.fetch_add(1, Ordering::Relaxed);
                    }
                    state.lru.remove(e);
                    if in_hot {
                        // Keep the reference in the slot domain so release
                        // stays symmetric for hot residents.
                        self.pool.acquire((*e).stamp.load(Ordering::Acquire));
                    } else {
                        (*e).ref_();
                    }
                    (*e).set_hit();
                    state.metrics.core.hits += 1;
                    if self.hot_mode != 0 {
                        self.controller_tick(&mut state, e);
                    }
                }
            } else {
                state.metrics.core.misses += 1;
            }
        }

        if e.is_null() && self.secondary.is_some() {
            e = self.lookup_secondary(key, hash, priority, wait);
        }
        e
    }

    /// Recompute step of the adaptive controller. Runs under `M`; takes
    /// `RW.write` for the duration.
    ///
    /// # Safety
    ///
    /// `e` is the entry just returned by the primary table, referenced and
    /// off the recency list.
    unsafe fn controller_tick(&self, state: &mut ShardState<V>, e: *mut LruEntry<V>) {
        let ticks = self.adaptive.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        if ticks <= self.recompute_interval {
            return;
        }
        let mut hot = self.hot.write();
        self.adaptive.ticks.store(0, Ordering::Relaxed);

        let total = self.adaptive.total_hit.swap(0, Ordering::Relaxed);
        let no = self.adaptive.no_hit.swap(0, Ordering::Relaxed);
        let vtotal = self.adaptive.virtual_total_hit.swap(0, Ordering::Relaxed);
        let vno = self.adaptive.virtual_no_hit.swap(0, Ordering::Relaxed);
        // Whichever window saw more traffic is the better estimate.
        let hit_rate = if total > vtotal {
            100 - (no * 100 / total) as i32
        } else if vtotal > 0 {
            100 - (vno * 100 / vtotal) as i32
        } else {
            0
        };

        self.shared.publish_hit_rate(self.index, hit_rate);
        let sorted = self.shared.sorted_hit_rates();
        let skip = percentile_threshold(&sorted, self.hot_mode);
        let flush = percentile_threshold(&sorted, self.flush_mode);
        self.shared.publish_thresholds(self.index, skip, flush);

        let avg_skip = self.shared.avg_skip_threshold();
        let avg_flush = self.shared.avg_flush_threshold();
        self.adaptive.n_supple.store(
            (self.recompute_interval as u64 * avg_skip.max(0) as u64 / 100) as u32,
            Ordering::Relaxed,
        );

        if self.flush_mode != 0 && hit_rate < avg_flush {
            // The shadow set stopped paying off: drain it back into the
            // recency list. Entries pinned by outstanding references stay.
            let mut drained = 0u32;
            loop {
                let evicted = hot.evict_fifo();
                if evicted.is_null() {
                    break;
                }
                if !(*evicted).has_refs() {
                    state.lru.insert(evicted);
                }
                drained += 1;
            }
            if drained > 0 {
                state.metrics.hot.flushes += 1;
                debug!(
                    "shard {}: flushed {} hot entries (hit_rate {} < {})",
                    self.index, drained, hit_rate, avg_flush
                );
            }
        }

        // Seed with the entry that triggered the recompute, then refill
        // from the hottest end of the recency list.
        hot.insert(e);
        let mut refilled = 0u32;
        while !hot.is_full() {
            let cur = state.lru.newest();
            if cur.is_null() {
                break;
            }
            if !hot.insert(cur) {
                break;
            }
            state.lru.remove(cur);
            refilled += 1;
        }
        if refilled > 0 {
            state.metrics.hot.refills += 1;
        }

        if hit_rate > avg_skip && !self.adaptive.enabled.load(Ordering::Relaxed) {
            debug!(
                "shard {}: shared path enabled (hit_rate {} > {})",
                self.index, hit_rate, avg_skip
            );
            self.adaptive.enabled.store(true, Ordering::Release);
        }
        self.adaptive.no_hit.store(0, Ordering::Relaxed);
        self.adaptive.total_hit.store(0, Ordering::Relaxed);
    }

    /// Miss path against the secondary tier. Runs with no lock held; the
    /// returned entry is referenced, out of the primary table until
    /// promoted.
    fn lookup_secondary(
        &self,
        key: &[u8],
        hash: u32,
        priority: Priority,
        wait: bool,
    ) -> *mut LruEntry<V> {
        let secondary = match &self.secondary {
            Some(s) => s,
            None => return core::ptr::null_mut(),
        };
        let handle = match secondary.lookup(key, wait) {
            Some(h) => h,
            None => return core::ptr::null_mut(),
        };
        let e = LruEntry::alloc(key, hash, None, 0, None, priority);
        // SAFETY: freshly allocated, exclusively owned here.
        unsafe {
            (*e).set_secondary_compatible(true);
            (*e).sec_handle = Some(handle);
            (*e).refs = 1;
            if wait {
                self.promote(e);
                if (*e).value.is_none() {
                    // The tier returned a handle but the load failed.
                    (*e).refs = 0;
                    LruEntry::free(e);
                    return core::ptr::null_mut();
                }
            } else {
                (*e).set_pending(true);
            }
        }
        e
    }

    /// Installs a ready secondary-cache entry into the shard.
    ///
    /// On an insert failure under a strict limit the value stays readable
    /// through the caller's handle; it just is not charged to the cache.
    pub(crate) fn promote(&self, e: *mut LruEntry<V>) {
        // SAFETY: pending entries are exclusively owned by the handle
        // holder; nothing else can reach them.
        unsafe {
            let mut sec = match (*e).sec_handle.take() {
                Some(s) => s,
                None => return,
            };
            (*e).set_pending(false);
            match sec.take() {
                Some((value, charge)) => {
                    drop(sec);
                    (*e).value = Some(value);
                    (*e).charge = charge;
                    (*e).set_in_cache(true);
                    (*e).set_promoted(true);
                    match self.insert_entry(e, true, false) {
                        Ok(_) => {
                            // insert_entry took its own reference on top of
                            // the caller's; fold it back off.
                            let _guard = self.state.lock();
                            (*e).unref();
                        }
                        Err(_) => debug_assert!(!(*e).in_cache()),
                    }
                }
                None => {
                    let _guard = self.state.lock();
                    (*e).charge = 0;
                    (*e).set_in_cache(false);
                }
            }
        }
    }

    /// Adopts a pre-allocated entry, evicting for room.
    ///
    /// With `with_handle` the entry comes back referenced for the caller;
    /// without it the entry goes straight onto the recency list. Over
    /// capacity with a strict limit (or no handle to hand out), the entry
    /// is abandoned: freed on the spot under a strict limit when
    /// `free_on_fail`, or disposed of like an immediate eviction otherwise.
    ///
    /// # Safety
    ///
    /// `e` must be a live entry owned by the caller, marked in-cache, and
    /// not linked into any shard structure.
    pub(crate) unsafe fn insert_entry(
        &self,
        e: *mut LruEntry<V>,
        with_handle: bool,
        free_on_fail: bool,
    ) -> Result<InsertOutcome> {
        let mut victims: Vec<*mut LruEntry<V>> = Vec::new();
        let result = {
            let mut state = self.state.lock();
            let total_charge = (*e).total_charge(state.policy);
            state.evict_from_lru(total_charge, &mut victims);

            if state.usage + total_charge > state.capacity
                && (state.strict_capacity_limit || !with_handle)
            {
                (*e).set_in_cache(false);
                if !with_handle {
                    // Accept the insert as if the entry were cached and
                    // immediately evicted.
                    victims.push(e);
                    Ok(InsertOutcome::Inserted)
                } else {
                    if free_on_fail {
                        LruEntry::free(e);
                    }
                    Err(CacheError::CapacityExceeded)
                }
            } else {
                let old = state.table.insert(e);
                state.usage += total_charge;
                state.metrics.core.insertions += 1;
                state.metrics.core.bytes_inserted += total_charge as u64;
                let mut outcome = InsertOutcome::Inserted;
                if !old.is_null() {
                    outcome = InsertOutcome::Overwritten;
                    state.metrics.core.overwrites += 1;
                    debug_assert!((*old).in_cache());
                    (*old).set_in_cache(false);
                    let old_charge = (*old).total_charge(state.policy);
                    debug_assert!(state.usage >= old_charge);
                    state.usage -= old_charge;
                    if (*old).in_hot_index() {
                        // The displaced entry is hot: swap the new entry
                        // into the hot index in its place. Folding first
                        // makes any outstanding slot references visible in
                        // `refs` before the liveness check below.
                        let mut hot = self.hot.write();
                        if (*old).in_hot_index() {
                            let key =
                                core::slice::from_raw_parts((*old).key.as_ptr(), (&(*old).key).len());
                            let removed = hot.remove(key, (*old).hash, false);
                            debug_assert_eq!(removed, old);
                            state.metrics.hot.invalidations += 1;
                            hot.insert(e);
                        }
                    }
                    if !(*old).has_refs() {
                        state.lru.remove(old);
                        victims.push(old);
                    }
                }
                if with_handle {
                    if (*e).in_hot_index() {
                        self.pool.acquire((*e).stamp.load(Ordering::Acquire));
                    } else {
                        (*e).ref_();
                    }
                } else if !(*e).in_hot_index() {
                    state.lru.insert(e);
                }
                Ok(outcome)
            }
        };
        self.dispose_victims(victims);
        result
    }

    /// Demotes and frees victims, outside every lock.
    fn dispose_victims(&self, victims: Vec<*mut LruEntry<V>>) {
        for v in victims {
            // SAFETY: victims are unlinked, uncharged, and unreferenced;
            // this shard is the only owner left.
            unsafe {
                if let Some(secondary) = &self.secondary {
                    if (*v).is_secondary_compatible() && !(*v).is_promoted() {
                        if let Some(value) = (*v).value.as_ref() {
                            let _ = secondary.insert(&(*v).key, value);
                        }
                    }
                }
                LruEntry::free(v);
            }
        }
    }

    /// Drops one reference. Returns `true` iff the entry was freed.
    pub(crate) fn release(&self, e: *mut LruEntry<V>, force_erase: bool) -> bool {
        if e.is_null() {
            return false;
        }
        // SAFETY: the caller owns a reference, so the entry is live.
        unsafe {
            // Hot residents are released through the slot pool, no lock.
            if self.hot_mode != 0 && (*e).in_hot_index() {
                self.pool.release((*e).stamp.load(Ordering::Acquire));
                return false;
            }
            let mut last_reference;
            {
                let mut state = self.state.lock();
                // The entry may have entered the hot index before we got
                // the lock; the slot domain owns the reference then.
                if self.hot_mode != 0 && (*e).in_hot_index() {
                    self.pool.release((*e).stamp.load(Ordering::Acquire));
                    return false;
                }
                last_reference = (*e).unref();
                if last_reference && (*e).in_cache() {
                    if state.usage > state.capacity || force_erase {
                        // The recency list must already be empty if the
                        // shard is over capacity.
                        debug_assert!(state.lru.is_empty() || force_erase);
                        let key = core::slice::from_raw_parts((*e).key.as_ptr(), (&(*e).key).len());
                        state.table.remove(key, (*e).hash);
                        (*e).set_in_cache(false);
                        let charge = (*e).total_charge(state.policy);
                        debug_assert!(state.usage >= charge);
                        state.usage -= charge;
                    } else {
                        state.lru.insert(e);
                        last_reference = false;
                    }
                }
            }
            if last_reference {
                LruEntry::free(e);
            }
            last_reference
        }
    }

    /// Removes a key from the shard regardless of recency. Referenced
    /// entries survive until their last release.
    pub(crate) fn erase(&self, key: &[u8], hash: u32) {
        let mut victim: *mut LruEntry<V> = core::ptr::null_mut();
        {
            let mut state = self.state.lock();
            let e = state.table.remove(key, hash);
            if !e.is_null() {
                // SAFETY: we hold M; the entry just left the table.
                unsafe {
                    debug_assert!((*e).in_cache());
                    (*e).set_in_cache(false);
                    let charge = (*e).total_charge(state.policy);
                    debug_assert!(state.usage >= charge);
                    state.usage -= charge;
                    if (*e).in_hot_index() {
                        let mut hot = self.hot.write();
                        if (*e).in_hot_index() {
                            let removed = hot.remove(key, hash, false);
                            debug_assert_eq!(removed, e);
                            state.metrics.hot.invalidations += 1;
                        }
                    }
                    if !(*e).has_refs() {
                        state.lru.remove(e);
                        victim = e;
                    }
                }
            }
        }
        if !victim.is_null() {
            // SAFETY: unreferenced, unlinked, uncharged.
            unsafe { LruEntry::free(victim) };
        }
    }

    /// Removes every entry that no caller currently references.
    pub(crate) fn erase_unref_entries(&self) {
        let mut victims: Vec<*mut LruEntry<V>> = Vec::new();
        {
            let mut state = self.state.lock();
            // Hot residents first: they are not on the recency list.
            if self.hot_mode != 0 {
                let mut hot = self.hot.write();
                loop {
                    // SAFETY: both locks held, as the fold requires.
                    let e = unsafe { hot.evict_fifo() };
                    if e.is_null() {
                        break;
                    }
                    unsafe {
                        debug_assert!(!(*e).has_refs());
                        let key = core::slice::from_raw_parts((*e).key.as_ptr(), (&(*e).key).len());
                        state.table.remove(key, (*e).hash);
                        (*e).set_in_cache(false);
                        let charge = (*e).total_charge(state.policy);
                        debug_assert!(state.usage >= charge);
                        state.usage -= charge;
                        victims.push(e);
                    }
                }
            }
            loop {
                let old = state.lru.oldest();
                if old.is_null() {
                    break;
                }
                // SAFETY: recency-list entries are in-cache, unreferenced.
                unsafe {
                    debug_assert!((*old).in_cache() && !(*old).has_refs());
                    state.lru.remove(old);
                    let key = core::slice::from_raw_parts((*old).key.as_ptr(), (&(*old).key).len());
                    state.table.remove(key, (*old).hash);
                    (*old).set_in_cache(false);
                    let charge = (*old).total_charge(state.policy);
                    debug_assert!(state.usage >= charge);
                    state.usage -= charge;
                    victims.push(old);
                }
            }
        }
        for v in victims {
            // SAFETY: unreferenced, unlinked, uncharged.
            unsafe { LruEntry::free(v) };
        }
    }

    /// One locked chunk of table iteration. The cursor is a hash-prefix
    /// resumption point; `u32::MAX` signals completion.
    pub(crate) fn apply_to_some_entries<F>(
        &self,
        f: &mut F,
        average_entries_per_lock: u32,
        cursor: &mut u32,
    ) where
        F: FnMut(&[u8], &V, usize, Option<DeleterFn<V>>),
    {
        let state = self.state.lock();
        let length_bits = state.table.length_bits();
        let length = 1u32 << length_bits;
        let per_lock = average_entries_per_lock.max(1);
        debug_assert!(per_lock < length || *cursor == 0);

        let index_begin = (*cursor >> (32 - length_bits)) as usize;
        let mut index_end = index_begin + per_lock as usize;
        if index_end >= length as usize {
            index_end = length as usize;
            *cursor = u32::MAX;
        } else {
            *cursor = (index_end as u32) << (32 - length_bits);
        }
        state.table.apply_to_entries_range(
            |h| {
                // SAFETY: table residents are live; M is held.
                unsafe {
                    if let Some(value) = (*h).value.as_ref() {
                        f(&(*h).key, value, (*h).charge, (*h).deleter);
                    }
                }
            },
            index_begin,
            index_end,
        );
    }

    pub(crate) fn set_capacity(&self, capacity: usize) {
        let mut victims = Vec::new();
        {
            let mut state = self.state.lock();
            state.capacity = capacity;
            state.lru.set_capacity(capacity);
            state.evict_from_lru(0, &mut victims);
        }
        self.dispose_victims(victims);
    }

    pub(crate) fn set_strict_capacity_limit(&self, strict: bool) {
        self.state.lock().strict_capacity_limit = strict;
    }

    pub(crate) fn set_high_pri_pool_ratio(&self, ratio: f64) {
        let mut state = self.state.lock();
        let capacity = state.capacity;
        state.lru.set_high_pri_pool_ratio(ratio, capacity);
        state.lru.maintain_pool_size();
    }

    /// Increments the reference count of an already-referenced entry.
    pub(crate) fn ref_entry(&self, e: *mut LruEntry<V>) {
        let _guard = self.state.lock();
        // SAFETY: the caller owns a reference; M is held.
        unsafe {
            if self.hot_mode != 0 && (*e).in_hot_index() {
                self.pool.acquire((*e).stamp.load(Ordering::Acquire));
            } else {
                debug_assert!((*e).has_refs());
                (*e).ref_();
            }
        }
    }

    pub(crate) fn is_ready(&self, e: *mut LruEntry<V>) -> bool {
        let _guard = self.state.lock();
        // SAFETY: the caller owns a reference; M is held.
        unsafe {
            if (*e).is_pending() {
                (*e).sec_handle.as_ref().map(|h| h.is_ready()).unwrap_or(true)
            } else {
                true
            }
        }
    }

    pub(crate) fn usage(&self) -> usize {
        self.state.lock().usage
    }

    pub(crate) fn pinned_usage(&self) -> usize {
        let state = self.state.lock();
        debug_assert!(state.usage >= state.lru.lru_usage());
        state.usage - state.lru.lru_usage()
    }

    pub(crate) fn high_pri_pool_ratio(&self) -> f64 {
        self.state.lock().lru.high_pri_pool_ratio()
    }

    /// Entries currently on the recency list. Debugging and tests.
    pub(crate) fn lru_len(&self) -> usize {
        self.state.lock().lru.len()
    }

    pub(crate) fn metrics(&self) -> ShardMetrics {
        let mut m = self.state.lock().metrics.clone();
        {
            let hot = self.hot.read();
            m.hot.fifo_evictions = hot.fifo_evictions;
            m.hot.blocked_inserts = hot.blocked_inserts;
        }
        m.hot.shared_hits = self.shared_hits.load(Ordering::Relaxed);
        m.hot.shared_misses = self.shared_misses.load(Ordering::Relaxed);
        m
    }
}
