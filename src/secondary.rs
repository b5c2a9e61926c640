//! Secondary (overflow) cache interface.
//!
//! The secondary cache is an optional slower-but-larger tier behind the
//! in-memory cache. Entries evicted from a shard are offered to it, and a
//! primary-table miss consults it before reporting a miss to the caller.
//!
//! The cache never blocks inside its locks for the secondary tier: demotion
//! happens after the shard lock is dropped, and lookups against the tier run
//! with no lock held at all. A lookup may be asynchronous: with
//! `wait = false` the returned handle may be incomplete, and the caller
//! probes it via [`ShardedCache::is_ready`](crate::ShardedCache::is_ready)
//! or resolves a batch with
//! [`ShardedCache::wait_all`](crate::ShardedCache::wait_all).

use crate::error::Result;

/// An in-flight result from a secondary-cache lookup.
///
/// The handle owns whatever state the tier needs to finish producing the
/// value (an I/O buffer, a pending request, ...). Once ready, the value and
/// its charge are claimed exactly once with [`take`](SecondaryHandle::take).
pub trait SecondaryHandle<V>: Send {
    /// Returns `true` once the value can be claimed without blocking.
    fn is_ready(&self) -> bool;

    /// Blocks until the handle is ready.
    fn wait(&mut self);

    /// Claims the value and its charge. Returns `None` if the lookup
    /// ultimately failed; in that case the key is treated as a miss.
    fn take(&mut self) -> Option<(V, usize)>;
}

/// The secondary cache tier.
///
/// Implementations are shared across all shards and must be internally
/// synchronized.
pub trait SecondaryCache<V>: Send + Sync {
    /// Offers an evicted value to the tier. Failure is not fatal to the
    /// primary cache; the entry is simply dropped.
    fn insert(&self, key: &[u8], value: &V) -> Result<()>;

    /// Looks a key up in the tier. With `wait = true` the returned handle is
    /// ready; with `wait = false` it may be pending.
    fn lookup(&self, key: &[u8], wait: bool) -> Option<Box<dyn SecondaryHandle<V>>>;

    /// Resolves a batch of pending handles. The default drives each handle's
    /// [`wait`](SecondaryHandle::wait) in turn; tiers with batched I/O
    /// should override this.
    fn wait_all(&self, handles: Vec<&mut dyn SecondaryHandle<V>>) {
        for handle in handles {
            handle.wait();
        }
    }
}
