//! Adaptive controller state.
//!
//! Each shard decides for itself whether serving reads through its hot
//! index is worth it, based on observed hit rates. The signal is noisy per
//! shard, so the thresholds are medians taken *across* shards and then
//! averaged: a skewed or unstable workload moves every shard's estimate a
//! little instead of whipsawing one shard's.
//!
//! Two kinds of per-shard tallies feed the controller:
//!
//! - **real** counters, maintained on the shared-lock path while the hot
//!   index serves reads;
//! - **virtual** counters, maintained on the exclusive-lock path by
//!   checking whether the found entry is hot-index resident. These track
//!   what the hot index *would* have delivered while it is switched off,
//!   and are what allows a disabled shard to switch back on.
//!
//! Whichever tally saw more traffic in the window wins when the hit rate
//! is recomputed.

use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use crossbeam_utils::CachePadded;

/// Per-shard controller window. All counters are atomics because the real
/// tallies are bumped under the shared lock, concurrently with each other.
#[derive(Default)]
pub(crate) struct AdaptiveState {
    /// Primary-path hits since the last recompute.
    pub(crate) ticks: AtomicU32,
    /// Shared-path lookups in this window.
    pub(crate) total_hit: AtomicU32,
    /// Shared-path lookups that missed the hot index.
    pub(crate) no_hit: AtomicU32,
    /// Primary-path hits in this window.
    pub(crate) virtual_total_hit: AtomicU32,
    /// Primary-path hits on entries not resident in the hot index.
    pub(crate) virtual_no_hit: AtomicU32,
    /// Shared-path miss budget before the shard switches itself off.
    pub(crate) n_supple: AtomicU32,
    /// Whether this shard currently serves reads through its hot index.
    pub(crate) enabled: AtomicBool,
}

/// Cross-shard hit-rate board. One padded slot per shard per series, so a
/// shard publishing its numbers never bounces another shard's cache line.
pub(crate) struct AdaptiveShared {
    hit_rate: Box<[CachePadded<AtomicI32>]>,
    skip_threshold: Box<[CachePadded<AtomicI32>]>,
    flush_threshold: Box<[CachePadded<AtomicI32>]>,
}

impl AdaptiveShared {
    pub(crate) fn new(num_shards: usize) -> Self {
        let series = || {
            (0..num_shards)
                .map(|_| CachePadded::new(AtomicI32::new(0)))
                .collect::<Vec<_>>()
                .into_boxed_slice()
        };
        AdaptiveShared {
            hit_rate: series(),
            skip_threshold: series(),
            flush_threshold: series(),
        }
    }

    pub(crate) fn publish_hit_rate(&self, shard: usize, rate: i32) {
        self.hit_rate[shard].store(rate, Ordering::Relaxed);
    }

    pub(crate) fn publish_thresholds(&self, shard: usize, skip: i32, flush: i32) {
        self.skip_threshold[shard].store(skip, Ordering::Relaxed);
        self.flush_threshold[shard].store(flush, Ordering::Relaxed);
    }

    /// All shards' hit rates, ascending.
    pub(crate) fn sorted_hit_rates(&self) -> Vec<i32> {
        let mut rates: Vec<i32> = self
            .hit_rate
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
            .collect();
        rates.sort_unstable();
        rates
    }

    pub(crate) fn avg_skip_threshold(&self) -> i32 {
        avg(&self.skip_threshold)
    }

    pub(crate) fn avg_flush_threshold(&self) -> i32 {
        avg(&self.flush_threshold)
    }
}

fn avg(series: &[CachePadded<AtomicI32>]) -> i32 {
    let sum: i64 = series
        .iter()
        .map(|slot| slot.load(Ordering::Relaxed) as i64)
        .sum();
    (sum / series.len() as i64) as i32
}

/// Percentile pick over the sorted rates, pulled halfway toward the
/// configured mode so the decision still fires when every shard reports a
/// low rate.
pub(crate) fn percentile_threshold(sorted_rates: &[i32], mode: u32) -> i32 {
    debug_assert!(!sorted_rates.is_empty());
    let idx = (sorted_rates.len() - 1) * mode as usize / 100;
    (sorted_rates[idx] + mode as i32) / 2
}
