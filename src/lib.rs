//! Sharded in-memory block cache with an adaptive read-optimized fast
//! path.
//!
//! `shardcache` maps opaque byte keys to values with an associated byte
//! charge, enforces an overall capacity budget, and evicts with a
//! priority-aware LRU policy. Layered over each shard's LRU core is a
//! **hot index**: a small shadow table serving a stable working set under
//! a shared (read) lock, bypassing the exclusive lock and all LRU
//! bookkeeping. A per-shard feedback controller enables, refills, and
//! flushes the hot index based on hit rates observed across all shards.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ ShardedCache                hash(key) top bits pick the shard    │
//! │  ┌───────────────┐ ┌───────────────┐       ┌───────────────┐     │
//! │  │   Shard 0     │ │   Shard 1     │  ...  │   Shard N-1   │     │
//! │  │ ┌───────────┐ │ │               │       │               │     │
//! │  │ │ primary   │ │ │  exclusive lock: primary table + LRU  │     │
//! │  │ │ table+LRU │ │ │  shared lock:    hot index            │     │
//! │  │ ├───────────┤ │ │  no lock:        hot-index release    │     │
//! │  │ │ hot index │ │ │                                       │     │
//! │  │ └───────────┘ │ │                                       │     │
//! │  └───────────────┘ └───────────────┘       └───────────────┘     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A read goes: hot index (shared lock) → primary table (exclusive lock)
//! → optional secondary tier (no lock). A hot-index hit does **not**
//! refresh the entry's LRU position — the hot index itself is the recency
//! proxy for the working set it shadows. Writes insert under the
//! exclusive lock, evict from the LRU tail until the charge fits, and
//! dispose of victims (deleter, secondary-tier demotion) after unlocking.
//!
//! # Example
//!
//! ```
//! use shardcache::{CacheConfig, Priority, ShardedCache};
//!
//! let cache: ShardedCache<Vec<u8>> =
//!     ShardedCache::new(CacheConfig::with_capacity(64 * 1024 * 1024)).unwrap();
//!
//! let block = vec![0u8; 4096];
//! cache
//!     .insert(b"sst-17:block-42", block, 4096, Priority::Low, None)
//!     .unwrap();
//!
//! if let Some(handle) = cache.lookup(b"sst-17:block-42") {
//!     assert_eq!(handle.value().map(Vec::len), Some(4096));
//! }; // dropping the handle releases the reference
//! ```
//!
//! # Modules
//!
//! - [`cache`]: the sharded cache and its reference-counted [`Handle`]
//! - [`config`]: construction-time knobs
//! - [`metrics`]: deterministic counter reporting
//! - [`secondary`]: the optional overflow-tier interface
//! - [`error`]: error and insert-status types
//!
//! The internals (`entry`, `table`, `list`, `hot`, `adaptive`, `shard`)
//! maintain raw-pointer intrusive structures and are not exposed.

pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod secondary;

mod adaptive;
mod entry;
mod hot;
mod list;
mod shard;
mod table;

pub use cache::{ApplyCursor, Handle, ShardedCache};
pub use config::CacheConfig;
pub use entry::{DeleterFn, MetadataChargePolicy, Priority};
pub use error::{CacheError, InsertOutcome, Result};
pub use metrics::{CacheMetrics, CoreCacheMetrics, HotIndexMetrics, ShardMetrics};
pub use secondary::{SecondaryCache, SecondaryHandle};
