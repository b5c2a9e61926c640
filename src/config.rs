//! Cache configuration.
//!
//! One struct with public fields: construct it, tweak what you need, hand
//! it to [`ShardedCache::new`](crate::ShardedCache::new). All parameters
//! are validated at construction time; an out-of-range value is an
//! [`InvalidArgument`](crate::CacheError::InvalidArgument) error, never a
//! clamp.
//!
//! # Sizing
//!
//! `capacity` is the byte budget for cached *values* (their charges). Each
//! entry additionally costs roughly 100 bytes of bookkeeping plus the key
//! bytes; set [`MetadataChargePolicy::FullCharge`] to count that overhead
//! against the budget too.
//!
//! # Hot-index tuning
//!
//! | Field                 | 0 means           | 100 means            |
//! |-----------------------|-------------------|----------------------|
//! | `hot_mode`            | no hot index      | always enabled       |
//! | `flush_mode`          | never flush       | flush aggressively   |
//!
//! Between the extremes the values are percentiles over the shards'
//! observed hit rates; see the crate-level docs for how the controller
//! uses them.

use crate::entry::MetadataChargePolicy;
use crate::error::{CacheError, Result};

/// Configuration for a [`ShardedCache`](crate::ShardedCache).
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Total charge budget across all shards, in bytes.
    pub capacity: usize,
    /// log2 of the shard count, `< 20`. Negative selects a default from
    /// the capacity (one shard per 512 KiB, at most 6 bits).
    pub shard_bits: i32,
    /// When set, an insert that cannot make room fails instead of letting
    /// usage overshoot the capacity.
    pub strict_capacity_limit: bool,
    /// Fraction of each shard's capacity reserved for the high-priority
    /// pool, in `[0, 1]`.
    pub high_pri_pool_ratio: f64,
    /// Whether per-entry bookkeeping overhead counts against `capacity`.
    pub metadata_charge_policy: MetadataChargePolicy,
    /// Hot-index enable percentile in `[0, 100]`; 0 disables the hot index
    /// entirely, 100 forces it on for every shard.
    pub hot_mode: u32,
    /// Hot-index flush percentile in `[0, 100]`; 0 never flushes.
    pub flush_mode: u32,
    /// Primary-path hits between controller recomputes.
    pub recompute_interval: u32,
    /// Upper bound on concurrently counted reader threads; sizes the
    /// hot-index reference-slot pool. Threads beyond this share slots.
    pub reader_slots: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            capacity: 8 * 1024 * 1024,
            shard_bits: -1,
            strict_capacity_limit: false,
            high_pri_pool_ratio: 0.5,
            metadata_charge_policy: MetadataChargePolicy::DontCharge,
            hot_mode: 50,
            flush_mode: 30,
            recompute_interval: 10_000,
            reader_slots: 32,
        }
    }
}

impl CacheConfig {
    /// Convenience constructor for the common case: a capacity with
    /// everything else at its default.
    pub fn with_capacity(capacity: usize) -> Self {
        CacheConfig {
            capacity,
            ..Default::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.shard_bits >= 20 {
            return Err(CacheError::InvalidArgument("shard_bits must be < 20"));
        }
        if !(0.0..=1.0).contains(&self.high_pri_pool_ratio) {
            return Err(CacheError::InvalidArgument(
                "high_pri_pool_ratio must be in [0, 1]",
            ));
        }
        if self.hot_mode > 100 {
            return Err(CacheError::InvalidArgument("hot_mode must be in [0, 100]"));
        }
        if self.flush_mode > 100 {
            return Err(CacheError::InvalidArgument(
                "flush_mode must be in [0, 100]",
            ));
        }
        if self.recompute_interval == 0 {
            return Err(CacheError::InvalidArgument(
                "recompute_interval must be positive",
            ));
        }
        if self.reader_slots == 0 {
            return Err(CacheError::InvalidArgument(
                "reader_slots must be positive",
            ));
        }
        Ok(())
    }

    /// Shard bits to use: the explicit value, or a capacity-derived
    /// default.
    pub(crate) fn resolved_shard_bits(&self) -> u32 {
        if self.shard_bits >= 0 {
            self.shard_bits as u32
        } else {
            default_shard_bits(self.capacity)
        }
    }
}

/// Picks shard bits so every shard holds at least 512 KiB, capped at 6
/// bits (64 shards).
fn default_shard_bits(capacity: usize) -> u32 {
    const MIN_SHARD_SIZE: usize = 512 * 1024;
    let mut num_shard_bits = 0;
    let mut num_shards = capacity / MIN_SHARD_SIZE;
    loop {
        num_shards >>= 1;
        if num_shards == 0 {
            break;
        }
        num_shard_bits += 1;
        if num_shard_bits >= 6 {
            break;
        }
    }
    num_shard_bits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        assert!(CacheConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_shard_bits() {
        let cfg = CacheConfig {
            shard_bits: 20,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(CacheError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_rejects_bad_ratio() {
        for ratio in [-0.1, 1.1] {
            let cfg = CacheConfig {
                high_pri_pool_ratio: ratio,
                ..Default::default()
            };
            assert!(cfg.validate().is_err());
        }
    }

    #[test]
    fn test_rejects_bad_modes() {
        let cfg = CacheConfig {
            hot_mode: 101,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = CacheConfig {
            flush_mode: 101,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_default_shard_bits_scales_with_capacity() {
        assert_eq!(default_shard_bits(64 * 1024), 0);
        assert_eq!(default_shard_bits(512 * 1024), 0);
        assert_eq!(default_shard_bits(2 * 1024 * 1024), 2);
        // Large capacities cap out at 6 bits.
        assert_eq!(default_shard_bits(1 << 40), 6);
    }

    #[test]
    fn test_resolved_shard_bits_explicit_wins() {
        let cfg = CacheConfig {
            shard_bits: 3,
            capacity: 1 << 40,
            ..Default::default()
        };
        assert_eq!(cfg.resolved_shard_bits(), 3);
    }
}
