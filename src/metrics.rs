//! Cache metrics.
//!
//! Counters are split the same way the cache itself is: core counters are
//! maintained under each shard's exclusive lock, hot-index counters either
//! under its writer lock or as shard-level atomics for the shared read
//! path. Reporting flattens everything into a `BTreeMap` so output is
//! deterministically ordered, which keeps test output and log diffs
//! stable.

use std::collections::BTreeMap;

/// Counters common to every shard, maintained under the exclusive lock.
#[derive(Debug, Default, Clone)]
pub struct CoreCacheMetrics {
    /// Primary-path lookups that found the key.
    pub hits: u64,
    /// Lookups that missed the shard entirely.
    pub misses: u64,
    /// Entries adopted by the primary table.
    pub insertions: u64,
    /// Inserts that displaced an existing entry with the same key.
    pub overwrites: u64,
    /// Entries evicted from the recency list for capacity.
    pub evictions: u64,
    /// Total charge inserted over the shard's lifetime.
    pub bytes_inserted: u64,
}

/// Hot-index counters.
#[derive(Debug, Default, Clone)]
pub struct HotIndexMetrics {
    /// Lookups served under the shared lock.
    pub shared_hits: u64,
    /// Shared-path lookups that fell through to the exclusive path.
    pub shared_misses: u64,
    /// Entries evicted from the hot index in FIFO order.
    pub fifo_evictions: u64,
    /// Hot-index inserts refused because every candidate was pinned.
    pub blocked_inserts: u64,
    /// Controller-initiated drains of the whole hot index.
    pub flushes: u64,
    /// Controller-initiated refills from the recency list.
    pub refills: u64,
    /// Hot-index entries invalidated by erase or displacement.
    pub invalidations: u64,
}

/// One shard's full counter set.
#[derive(Debug, Default, Clone)]
pub struct ShardMetrics {
    pub core: CoreCacheMetrics,
    pub hot: HotIndexMetrics,
}

impl ShardMetrics {
    /// Flattens the counters into deterministically-ordered key/value
    /// pairs.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut m = BTreeMap::new();
        m.insert("hits".to_string(), self.core.hits as f64);
        m.insert("misses".to_string(), self.core.misses as f64);
        m.insert("insertions".to_string(), self.core.insertions as f64);
        m.insert("overwrites".to_string(), self.core.overwrites as f64);
        m.insert("evictions".to_string(), self.core.evictions as f64);
        m.insert("bytes_inserted".to_string(), self.core.bytes_inserted as f64);
        m.insert("hot_shared_hits".to_string(), self.hot.shared_hits as f64);
        m.insert("hot_shared_misses".to_string(), self.hot.shared_misses as f64);
        m.insert("hot_fifo_evictions".to_string(), self.hot.fifo_evictions as f64);
        m.insert("hot_blocked_inserts".to_string(), self.hot.blocked_inserts as f64);
        m.insert("hot_flushes".to_string(), self.hot.flushes as f64);
        m.insert("hot_refills".to_string(), self.hot.refills as f64);
        m.insert("hot_invalidations".to_string(), self.hot.invalidations as f64);
        let requests = self.core.hits + self.core.misses + self.hot.shared_hits;
        m.insert("requests".to_string(), requests as f64);
        if requests > 0 {
            let hits = self.core.hits + self.hot.shared_hits;
            m.insert("hit_rate".to_string(), hits as f64 / requests as f64);
        }
        m
    }

    /// Accumulates another shard's counters into this one.
    pub fn merge(&mut self, other: &ShardMetrics) {
        self.core.hits += other.core.hits;
        self.core.misses += other.core.misses;
        self.core.insertions += other.core.insertions;
        self.core.overwrites += other.core.overwrites;
        self.core.evictions += other.core.evictions;
        self.core.bytes_inserted += other.core.bytes_inserted;
        self.hot.shared_hits += other.hot.shared_hits;
        self.hot.shared_misses += other.hot.shared_misses;
        self.hot.fifo_evictions += other.hot.fifo_evictions;
        self.hot.blocked_inserts += other.hot.blocked_inserts;
        self.hot.flushes += other.hot.flushes;
        self.hot.refills += other.hot.refills;
        self.hot.invalidations += other.hot.invalidations;
    }
}

/// Uniform metrics-reporting interface.
///
/// The `BTreeMap` keeps metric keys sorted so reports are reproducible
/// across runs.
pub trait CacheMetrics {
    /// Returns all metrics as key-value pairs in deterministic order.
    fn metrics(&self) -> BTreeMap<String, f64>;

    /// Short identifier for the eviction scheme.
    fn algorithm_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_btreemap_has_all_keys() {
        let m = ShardMetrics::default().to_btreemap();
        for key in [
            "hits",
            "misses",
            "insertions",
            "evictions",
            "hot_shared_hits",
            "hot_flushes",
            "requests",
        ] {
            assert!(m.contains_key(key), "missing {key}");
        }
        // No requests yet: no hit_rate.
        assert!(!m.contains_key("hit_rate"));
    }

    #[test]
    fn test_merge_and_hit_rate() {
        let mut a = ShardMetrics::default();
        a.core.hits = 3;
        a.core.misses = 1;
        let mut b = ShardMetrics::default();
        b.hot.shared_hits = 4;
        a.merge(&b);
        let m = a.to_btreemap();
        assert_eq!(m["requests"], 8.0);
        assert_eq!(m["hit_rate"], 7.0 / 8.0);
    }
}
