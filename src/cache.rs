//! The sharded cache: public API surface.
//!
//! A [`ShardedCache`] is an array of `2^shard_bits` independent shards.
//! Keys are hashed once at the boundary; the top bits of the hash pick the
//! shard and the rest index its tables. All methods take `&self` — the
//! shards synchronize internally — so the cache is shared across threads
//! behind a plain `Arc`.
//!
//! # Handles
//!
//! [`lookup`](ShardedCache::lookup) and
//! [`insert_with_handle`](ShardedCache::insert_with_handle) return a
//! [`Handle`]: a reference-counted guard keeping the entry's value alive
//! even if the entry is concurrently erased or evicted. Dropping the
//! handle releases the reference; [`ShardedCache::release`] does the same
//! while reporting whether the entry was freed, and can erase the entry
//! on the way out.
//!
//! # Example
//!
//! ```
//! use shardcache::{CacheConfig, Priority, ShardedCache};
//!
//! let cache: ShardedCache<String> =
//!     ShardedCache::new(CacheConfig::with_capacity(1 << 20)).unwrap();
//! cache
//!     .insert(b"block-1", String::from("payload"), 7, Priority::Low, None)
//!     .unwrap();
//!
//! let handle = cache.lookup(b"block-1").unwrap();
//! assert_eq!(handle.value().map(String::as_str), Some("payload"));
//! drop(handle); // releases the reference
//!
//! cache.erase(b"block-1");
//! assert!(cache.lookup(b"block-1").is_none());
//! ```

use std::collections::BTreeMap;
use std::hash::BuildHasher;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hashbrown::hash_map::DefaultHashBuilder;

use crate::adaptive::AdaptiveShared;
use crate::config::CacheConfig;
use crate::entry::{DeleterFn, LruEntry, Priority};
use crate::error::{InsertOutcome, Result};
use crate::metrics::{CacheMetrics, ShardMetrics};
use crate::secondary::{SecondaryCache, SecondaryHandle};
use crate::shard::CacheShard;

/// A reference-counted guard over a cached entry.
///
/// The entry's value stays alive for as long as the handle exists, even if
/// the entry is erased, overwritten, or evicted in the meantime. Dropping
/// the handle releases the reference.
pub struct Handle<'c, V> {
    shard: &'c CacheShard<V>,
    entry: NonNull<LruEntry<V>>,
}

// SAFETY: the entry is kept alive by the reference the handle owns; `&V`
// access is read-only and the release path is internally synchronized.
unsafe impl<V: Send + Sync> Send for Handle<'_, V> {}
unsafe impl<V: Send + Sync> Sync for Handle<'_, V> {}

impl<V> Handle<'_, V> {
    /// The cached value. `None` only for a pending secondary-cache handle
    /// that has not been resolved yet.
    #[inline]
    pub fn value(&self) -> Option<&V> {
        // SAFETY: the handle owns a reference; the value is never mutated
        // while reachable through one.
        unsafe { (*self.entry.as_ptr()).value.as_ref() }
    }

    /// The caller-attributed charge of the entry.
    #[inline]
    pub fn charge(&self) -> usize {
        unsafe { (*self.entry.as_ptr()).charge }
    }

    /// The entry's full 32-bit key hash.
    #[inline]
    pub fn hash(&self) -> u32 {
        unsafe { (*self.entry.as_ptr()).hash }
    }

    /// The entry's key bytes.
    #[inline]
    pub fn key(&self) -> &[u8] {
        unsafe { &(*self.entry.as_ptr()).key }
    }

    /// The client deleter the entry was inserted with, if any.
    #[inline]
    pub fn deleter(&self) -> Option<DeleterFn<V>> {
        unsafe { (*self.entry.as_ptr()).deleter }
    }

    #[inline]
    fn raw(&self) -> *mut LruEntry<V> {
        self.entry.as_ptr()
    }
}

impl<V> Drop for Handle<'_, V> {
    fn drop(&mut self) {
        self.shard.release(self.entry.as_ptr(), false);
    }
}

impl<V> core::fmt::Debug for Handle<'_, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Handle")
            .field("key", &self.key())
            .field("hash", &self.hash())
            .field("charge", &self.charge())
            .finish()
    }
}

/// Resumption cursor for [`ShardedCache::apply_to_some_entries`].
#[derive(Debug, Clone, Copy)]
pub struct ApplyCursor {
    shard: usize,
    state: u32,
    done: bool,
}

impl ApplyCursor {
    pub fn new() -> Self {
        ApplyCursor {
            shard: 0,
            state: 0,
            done: false,
        }
    }

    /// True once iteration has covered every shard.
    #[inline]
    pub fn done(&self) -> bool {
        self.done
    }
}

impl Default for ApplyCursor {
    fn default() -> Self {
        Self::new()
    }
}

/// A sharded, capacity-bounded in-memory cache with priority-aware LRU
/// eviction and an adaptive read-optimized hot index per shard.
///
/// See the [crate docs](crate) for the full design.
pub struct ShardedCache<V, S = DefaultHashBuilder> {
    shards: Box<[CacheShard<V>]>,
    shard_bits: u32,
    capacity: AtomicUsize,
    config: CacheConfig,
    hash_builder: S,
    secondary: Option<Arc<dyn SecondaryCache<V>>>,
}

impl<V> ShardedCache<V> {
    /// Builds a cache from a configuration.
    ///
    /// Fails with [`InvalidArgument`](crate::CacheError::InvalidArgument)
    /// when a parameter is out of range; see [`CacheConfig`].
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_secondary(config, None)
    }

    /// Builds a cache backed by a secondary tier. Evicted entries are
    /// offered to the tier, and primary misses consult it.
    pub fn with_secondary(
        config: CacheConfig,
        secondary: Option<Arc<dyn SecondaryCache<V>>>,
    ) -> Result<Self> {
        Self::with_hasher(config, secondary, DefaultHashBuilder::default())
    }
}

impl<V, S: BuildHasher> ShardedCache<V, S> {
    /// Builds a cache with a caller-chosen hasher (e.g. a seeded one for
    /// deterministic tests).
    pub fn with_hasher(
        config: CacheConfig,
        secondary: Option<Arc<dyn SecondaryCache<V>>>,
        hash_builder: S,
    ) -> Result<Self> {
        config.validate()?;
        let shard_bits = config.resolved_shard_bits();
        let num_shards = 1usize << shard_bits;
        let per_shard = (config.capacity + num_shards - 1) / num_shards;
        let shared = Arc::new(AdaptiveShared::new(num_shards));
        let shards: Vec<CacheShard<V>> = (0..num_shards)
            .map(|i| {
                CacheShard::new(
                    per_shard,
                    config.strict_capacity_limit,
                    config.high_pri_pool_ratio,
                    config.metadata_charge_policy,
                    shard_bits,
                    i,
                    Arc::clone(&shared),
                    config.hot_mode,
                    config.flush_mode,
                    config.recompute_interval,
                    config.reader_slots,
                    secondary.clone(),
                )
            })
            .collect();
        Ok(ShardedCache {
            shards: shards.into_boxed_slice(),
            shard_bits,
            capacity: AtomicUsize::new(config.capacity),
            config,
            hash_builder,
            secondary,
        })
    }

    #[inline]
    fn hash_key(&self, key: &[u8]) -> u32 {
        (self.hash_builder.hash_one(key) >> 32) as u32
    }

    /// The shard owning a hash: the top `shard_bits` bits select it.
    #[inline]
    fn shard_for(&self, hash: u32) -> &CacheShard<V> {
        let idx = if self.shard_bits == 0 {
            0
        } else {
            (hash >> (32 - self.shard_bits)) as usize
        };
        &self.shards[idx]
    }

    /// Inserts a value, evicting for room. The entry goes straight onto
    /// the recency list.
    ///
    /// Returns [`InsertOutcome::Overwritten`] when a prior entry with the
    /// same key was displaced. Under a strict capacity limit with no room
    /// left, fails with [`CapacityExceeded`](crate::CacheError::CapacityExceeded)
    /// and the value is released through its deleter.
    pub fn insert(
        &self,
        key: &[u8],
        value: V,
        charge: usize,
        priority: Priority,
        deleter: Option<DeleterFn<V>>,
    ) -> Result<InsertOutcome> {
        let hash = self.hash_key(key);
        let e = LruEntry::alloc(key, hash, Some(value), charge, deleter, priority);
        // SAFETY: freshly allocated entry, handed to exactly one shard.
        unsafe {
            (*e).set_in_cache(true);
            if self.secondary.is_some() {
                (*e).set_secondary_compatible(true);
            }
            self.shard_for(hash).insert_entry(e, false, true)
        }
    }

    /// Inserts a value and returns a referenced handle to it. The entry
    /// stays off the recency list until the handle (and any clones) are
    /// released.
    pub fn insert_with_handle(
        &self,
        key: &[u8],
        value: V,
        charge: usize,
        priority: Priority,
        deleter: Option<DeleterFn<V>>,
    ) -> Result<(InsertOutcome, Handle<'_, V>)> {
        let hash = self.hash_key(key);
        let shard = self.shard_for(hash);
        let e = LruEntry::alloc(key, hash, Some(value), charge, deleter, priority);
        // SAFETY: freshly allocated entry, handed to exactly one shard.
        unsafe {
            (*e).set_in_cache(true);
            if self.secondary.is_some() {
                (*e).set_secondary_compatible(true);
            }
            let outcome = shard.insert_entry(e, true, true)?;
            Ok((
                outcome,
                Handle {
                    shard,
                    entry: NonNull::new_unchecked(e),
                },
            ))
        }
    }

    /// Looks a key up. A hit returns a referenced handle; recency is
    /// refreshed unless the entry is served by the hot index.
    pub fn lookup(&self, key: &[u8]) -> Option<Handle<'_, V>> {
        self.lookup_with(key, Priority::Low, true)
    }

    /// Lookup with control over the secondary-tier path: `priority` is
    /// used for an entry created from the tier, and with `wait = false` a
    /// tier hit may come back pending (probe with
    /// [`is_ready`](ShardedCache::is_ready) or resolve with
    /// [`wait_all`](ShardedCache::wait_all)).
    pub fn lookup_with(&self, key: &[u8], priority: Priority, wait: bool) -> Option<Handle<'_, V>> {
        let hash = self.hash_key(key);
        let shard = self.shard_for(hash);
        let e = shard.lookup(key, hash, priority, wait);
        NonNull::new(e).map(|entry| Handle { shard, entry })
    }

    /// Releases a handle, optionally erasing the entry from the cache once
    /// the last reference is gone. Returns `true` iff this call freed the
    /// entry.
    pub fn release(&self, handle: Handle<'_, V>, force_erase: bool) -> bool {
        let shard = handle.shard;
        let entry = handle.raw();
        core::mem::forget(handle);
        shard.release(entry, force_erase)
    }

    /// Takes an additional reference on the entry behind a handle and
    /// returns it as a second handle.
    pub fn ref_handle<'c>(&self, handle: &Handle<'c, V>) -> Handle<'c, V> {
        handle.shard.ref_entry(handle.raw());
        Handle {
            shard: handle.shard,
            entry: handle.entry,
        }
    }

    /// Removes a key. Outstanding handles keep the value alive; the entry
    /// is freed on the last release.
    pub fn erase(&self, key: &[u8]) {
        let hash = self.hash_key(key);
        self.shard_for(hash).erase(key, hash);
    }

    /// Removes every entry not currently referenced by a handle.
    pub fn erase_unref_entries(&self) {
        for shard in self.shards.iter() {
            shard.erase_unref_entries();
        }
    }

    /// True unless the handle is a pending secondary-cache result that has
    /// not finished loading.
    pub fn is_ready(&self, handle: &Handle<'_, V>) -> bool {
        handle.shard.is_ready(handle.raw())
    }

    /// Resolves every pending handle in the batch against the secondary
    /// tier and installs the loaded values.
    pub fn wait_all(&self, handles: &mut [Handle<'_, V>]) {
        let secondary = match &self.secondary {
            Some(s) => s,
            None => return,
        };
        // SAFETY: pending entries are exclusively owned by their handle;
        // the handles in the batch are distinct borrows.
        let pending: Vec<*mut LruEntry<V>> = handles
            .iter()
            .map(|h| h.raw())
            .filter(|&e| unsafe { (*e).is_pending() })
            .collect();
        if pending.is_empty() {
            return;
        }
        let sec_handles: Vec<&mut dyn SecondaryHandle<V>> = pending
            .iter()
            .filter_map(|&e| unsafe {
                (*e).sec_handle
                    .as_mut()
                    .map(|b| b.as_mut() as &mut dyn SecondaryHandle<V>)
            })
            .collect();
        secondary.wait_all(sec_handles);
        for e in pending {
            let shard = self.shard_for(unsafe { (*e).hash });
            shard.promote(e);
        }
    }

    /// Adjusts the total capacity, evicting as needed. The new budget is
    /// split evenly across shards.
    pub fn set_capacity(&self, capacity: usize) {
        self.capacity.store(capacity, Ordering::Relaxed);
        let per_shard = (capacity + self.shards.len() - 1) / self.shards.len();
        for shard in self.shards.iter() {
            shard.set_capacity(per_shard);
        }
    }

    pub fn set_strict_capacity_limit(&self, strict: bool) {
        for shard in self.shards.iter() {
            shard.set_strict_capacity_limit(strict);
        }
    }

    /// Adjusts the high-priority pool ratio, demoting overflow in place.
    pub fn set_high_pri_pool_ratio(&self, ratio: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(crate::CacheError::InvalidArgument(
                "high_pri_pool_ratio must be in [0, 1]",
            ));
        }
        for shard in self.shards.iter() {
            shard.set_high_pri_pool_ratio(ratio);
        }
        Ok(())
    }

    /// Total configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Sum of charges over all entries, across shards.
    pub fn usage(&self) -> usize {
        self.shards.iter().map(|s| s.usage()).sum()
    }

    /// Charge held by entries pinned through outstanding handles or the
    /// hot index (everything not evictable right now).
    pub fn pinned_usage(&self) -> usize {
        self.shards.iter().map(|s| s.pinned_usage()).sum()
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Entries currently sitting on the recency lists. Debugging and
    /// tests.
    pub fn lru_len(&self) -> usize {
        self.shards.iter().map(|s| s.lru_len()).sum()
    }

    /// One locked chunk of iteration over the cache's entries. Chunks are
    /// bounded by `average_entries_per_lock` per shard lock acquisition;
    /// resume with the same cursor until [`ApplyCursor::done`].
    ///
    /// The cursor stays valid across concurrent inserts and resizes;
    /// entries inserted mid-iteration may or may not be visited.
    pub fn apply_to_some_entries<F>(
        &self,
        f: &mut F,
        average_entries_per_lock: u32,
        cursor: &mut ApplyCursor,
    ) where
        F: FnMut(&[u8], &V, usize, Option<DeleterFn<V>>),
    {
        if cursor.done {
            return;
        }
        self.shards[cursor.shard].apply_to_some_entries(
            f,
            average_entries_per_lock,
            &mut cursor.state,
        );
        if cursor.state == u32::MAX {
            cursor.shard += 1;
            cursor.state = 0;
            if cursor.shard >= self.shards.len() {
                cursor.done = true;
            }
        }
    }

    /// Visits every entry, in chunks.
    pub fn apply_to_all_entries<F>(&self, mut f: F, average_entries_per_lock: u32)
    where
        F: FnMut(&[u8], &V, usize, Option<DeleterFn<V>>),
    {
        let mut cursor = ApplyCursor::new();
        while !cursor.done() {
            self.apply_to_some_entries(&mut f, average_entries_per_lock, &mut cursor);
        }
    }

    /// Human-readable dump of the effective options.
    pub fn printable_options(&self) -> String {
        format!(
            "    capacity: {}\n    shard_bits: {}\n    strict_capacity_limit: {}\n    \
             high_pri_pool_ratio: {:.3}\n    hot_mode: {}\n    flush_mode: {}\n    \
             recompute_interval: {}\n    reader_slots: {}\n",
            self.capacity(),
            self.shard_bits,
            self.config.strict_capacity_limit,
            self.shards[0].high_pri_pool_ratio(),
            self.config.hot_mode,
            self.config.flush_mode,
            self.config.recompute_interval,
            self.config.reader_slots,
        )
    }
}

impl<V, S: BuildHasher> CacheMetrics for ShardedCache<V, S> {
    fn metrics(&self) -> BTreeMap<String, f64> {
        let mut total = ShardMetrics::default();
        for shard in self.shards.iter() {
            total.merge(&shard.metrics());
        }
        let mut m = total.to_btreemap();
        m.insert("usage".to_string(), self.usage() as f64);
        m.insert("pinned_usage".to_string(), self.pinned_usage() as f64);
        m.insert("capacity".to_string(), self.capacity() as f64);
        m
    }

    fn algorithm_name(&self) -> &'static str {
        "AdaptiveShardedLRU"
    }
}

impl<V, S> core::fmt::Debug for ShardedCache<V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShardedCache")
            .field("shards", &self.shards.len())
            .field("capacity", &self.capacity.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;

    fn cache(capacity: usize) -> ShardedCache<u64> {
        let config = CacheConfig {
            capacity,
            shard_bits: 0,
            hot_mode: 0,
            ..Default::default()
        };
        ShardedCache::new(config).unwrap()
    }

    #[test]
    fn test_insert_lookup_erase() {
        let c = cache(16);
        assert_eq!(
            c.insert(b"a", 1, 1, Priority::Low, None).unwrap(),
            InsertOutcome::Inserted
        );
        let h = c.lookup(b"a").unwrap();
        assert_eq!(h.value(), Some(&1));
        assert_eq!(h.charge(), 1);
        assert_eq!(h.key(), b"a");
        drop(h);
        c.erase(b"a");
        assert!(c.lookup(b"a").is_none());
        assert_eq!(c.usage(), 0);
    }

    #[test]
    fn test_overwrite_reports_outcome() {
        let c = cache(16);
        c.insert(b"k", 1, 1, Priority::Low, None).unwrap();
        assert_eq!(
            c.insert(b"k", 2, 1, Priority::Low, None).unwrap(),
            InsertOutcome::Overwritten
        );
        let h = c.lookup(b"k").unwrap();
        assert_eq!(h.value(), Some(&2));
    }

    #[test]
    fn test_strict_capacity_limit() {
        let config = CacheConfig {
            capacity: 2,
            shard_bits: 0,
            strict_capacity_limit: true,
            hot_mode: 0,
            ..Default::default()
        };
        let c: ShardedCache<u64> = ShardedCache::new(config).unwrap();
        // Pin both slots.
        let (_, h1) = c.insert_with_handle(b"a", 1, 1, Priority::Low, None).unwrap();
        let (_, h2) = c.insert_with_handle(b"b", 2, 1, Priority::Low, None).unwrap();
        let err = c
            .insert_with_handle(b"c", 3, 1, Priority::Low, None)
            .map(|_| ())
            .unwrap_err();
        assert_eq!(err, CacheError::CapacityExceeded);
        drop(h1);
        drop(h2);
        // Room again.
        assert!(c.insert_with_handle(b"c", 3, 1, Priority::Low, None).is_ok());
    }

    #[test]
    fn test_handle_pins_across_erase() {
        let c = cache(8);
        c.insert(b"k", 9, 1, Priority::Low, None).unwrap();
        let h = c.lookup(b"k").unwrap();
        c.erase(b"k");
        assert!(c.lookup(b"k").is_none());
        assert_eq!(h.value(), Some(&9));
        // The release that frees the entry reports true.
        assert!(c.release(h, false));
        assert_eq!(c.usage(), 0);
    }

    #[test]
    fn test_ref_handle_counts_references() {
        let c = cache(8);
        let (_, h1) = c.insert_with_handle(b"k", 5, 1, Priority::Low, None).unwrap();
        let h2 = c.ref_handle(&h1);
        c.erase(b"k");
        // Two references: exactly the second release frees.
        assert!(!c.release(h1, false));
        assert!(c.release(h2, false));
    }

    #[test]
    fn test_usage_tracks_charges() {
        let c = cache(100);
        c.insert(b"a", 1, 30, Priority::Low, None).unwrap();
        c.insert(b"b", 2, 20, Priority::Low, None).unwrap();
        assert_eq!(c.usage(), 50);
        assert_eq!(c.pinned_usage(), 0);
        let h = c.lookup(b"a").unwrap();
        assert_eq!(c.pinned_usage(), 30);
        drop(h);
        assert_eq!(c.pinned_usage(), 0);
        c.erase(b"a");
        assert_eq!(c.usage(), 20);
    }

    #[test]
    fn test_set_capacity_evicts() {
        let c = cache(4);
        for i in 0..4u64 {
            c.insert(format!("k{i}").as_bytes(), i, 1, Priority::Low, None)
                .unwrap();
        }
        assert_eq!(c.usage(), 4);
        c.set_capacity(2);
        assert_eq!(c.usage(), 2);
        assert_eq!(c.capacity(), 2);
    }

    #[test]
    fn test_erase_unref_entries_spares_referenced() {
        let c = cache(8);
        c.insert(b"a", 1, 1, Priority::Low, None).unwrap();
        c.insert(b"b", 2, 1, Priority::Low, None).unwrap();
        let h = c.lookup(b"a").unwrap();
        c.erase_unref_entries();
        assert!(c.lookup(b"b").is_none());
        assert_eq!(h.value(), Some(&1));
        assert_eq!(c.usage(), 1);
        drop(h);
    }

    #[test]
    fn test_apply_to_all_entries_visits_everything() {
        let c = cache(64);
        for i in 0..32u64 {
            c.insert(format!("k{i}").as_bytes(), i, 1, Priority::Low, None)
                .unwrap();
        }
        let mut seen = 0u32;
        let mut total_charge = 0usize;
        c.apply_to_all_entries(
            |_key, _value, charge, _deleter| {
                seen += 1;
                total_charge += charge;
            },
            8,
        );
        assert_eq!(seen, 32);
        assert_eq!(total_charge, 32);
    }

    #[test]
    fn test_apply_cursor_resumes() {
        let c = cache(64);
        for i in 0..16u64 {
            c.insert(format!("k{i}").as_bytes(), i, 1, Priority::Low, None)
                .unwrap();
        }
        let mut cursor = ApplyCursor::new();
        let mut seen = 0u32;
        let mut chunks = 0u32;
        while !cursor.done() {
            c.apply_to_some_entries(&mut |_, _, _, _| seen += 1, 4, &mut cursor);
            chunks += 1;
        }
        assert_eq!(seen, 16);
        assert!(chunks > 1, "iteration should take multiple chunks");
    }

    #[test]
    fn test_metrics_aggregate() {
        let c = cache(8);
        c.insert(b"a", 1, 1, Priority::Low, None).unwrap();
        let h = c.lookup(b"a").unwrap();
        drop(h);
        assert!(c.lookup(b"miss").is_none());
        let m = c.metrics();
        assert_eq!(m["hits"], 1.0);
        assert_eq!(m["misses"], 1.0);
        assert_eq!(m["insertions"], 1.0);
        assert_eq!(m["usage"], 1.0);
        assert_eq!(c.algorithm_name(), "AdaptiveShardedLRU");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CacheConfig {
            shard_bits: 25,
            ..Default::default()
        };
        assert!(ShardedCache::<u64>::new(config).is_err());
        let config = CacheConfig {
            high_pri_pool_ratio: 1.5,
            ..Default::default()
        };
        assert!(ShardedCache::<u64>::new(config).is_err());
    }

    #[test]
    fn test_multi_shard_distribution() {
        let config = CacheConfig {
            capacity: 1024,
            shard_bits: 2,
            hot_mode: 0,
            ..Default::default()
        };
        let c: ShardedCache<u64> = ShardedCache::new(config).unwrap();
        assert_eq!(c.shard_count(), 4);
        for i in 0..256u64 {
            c.insert(format!("key-{i}").as_bytes(), i, 1, Priority::Low, None)
                .unwrap();
        }
        for i in 0..256u64 {
            let h = c.lookup(format!("key-{i}").as_bytes()).unwrap();
            assert_eq!(h.value(), Some(&i));
        }
        assert_eq!(c.usage(), 256);
    }

    #[test]
    fn test_printable_options_mentions_knobs() {
        let c = cache(8);
        let s = c.printable_options();
        assert!(s.contains("high_pri_pool_ratio"));
        assert!(s.contains("hot_mode"));
    }
}
