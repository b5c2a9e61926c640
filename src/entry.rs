//! Cache entry type.
//!
//! An entry is the unit of caching: one heap allocation holding the key
//! bytes, the value, its byte charge, and all of the intrusive bookkeeping
//! the shard needs to thread the entry through its structures at once:
//!
//! - `prev`/`next`: position in the shard's recency list,
//! - `next_hash`: chain pointer in the primary hash table bucket,
//! - `next_hot`: chain pointer in the hot index bucket,
//! - `stamp`: the entry's slot in the hot index reference pool.
//!
//! # Reference counting
//!
//! An entry carries two reference domains that are summed to decide its
//! fate:
//!
//! - `refs` is the plain external reference count, only touched under the
//!   shard's exclusive lock;
//! - while the entry is in the hot index, readers account their references
//!   in the per-slot counter pool instead, without the exclusive lock. The
//!   pool balance is folded back into `refs` when the entry leaves the hot
//!   index.
//!
//! An entry is freed when it is out of the cache and the summed count is
//! zero. Freeing runs the client deleter (or drops the value) and always
//! happens outside every lock.
//!
//! # Flag and stamp atomicity
//!
//! `flags` and `stamp` are read on the shared-lock path and on the lock-free
//! release path while writers mutate them under the exclusive lock, so both
//! are atomics. Everything else is guarded by the shard locks.

use core::sync::atomic::{AtomicI32, AtomicU16, Ordering};

use crate::secondary::SecondaryHandle;

/// Client-supplied destructor for a cached value.
///
/// Runs exactly once per entry, after the entry has left the cache and the
/// last reference is gone, outside all locks.
pub type DeleterFn<V> = fn(key: &[u8], value: V);

/// Insertion priority of an entry.
///
/// High-priority entries (and entries that have seen a hit) are inserted
/// into the protected prefix of the recency list and survive scans of
/// low-priority traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    /// Inserted at the head of the low-priority suffix.
    #[default]
    Low,
    /// Inserted at the head of the list, into the high-priority pool.
    High,
}

/// Controls whether per-entry bookkeeping overhead counts against the
/// cache's capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataChargePolicy {
    /// Only the caller-provided charge counts.
    #[default]
    DontCharge,
    /// The entry's own footprint (struct plus key bytes) is added to the
    /// caller-provided charge.
    FullCharge,
}

/// Entry is present in the primary hash table.
const IN_CACHE: u16 = 1 << 0;
/// Entry was inserted with [`Priority::High`].
const HIGH_PRIORITY: u16 = 1 << 1;
/// Entry currently sits in the high-priority prefix of the recency list.
const IN_HIGH_PRI_POOL: u16 = 1 << 2;
/// Entry has been looked up at least once since insertion.
const HAS_HIT: u16 = 1 << 3;
/// Entry may be demoted to the secondary cache on eviction.
const SECONDARY_COMPAT: u16 = 1 << 4;
/// Entry was promoted out of the secondary cache; never demoted back.
const PROMOTED: u16 = 1 << 5;
/// Entry's secondary-cache lookup has not completed yet.
const PENDING: u16 = 1 << 6;
/// Entry is shadowed by the hot index.
const IN_HOT_INDEX: u16 = 1 << 7;

/// Stamp value for entries that are not in the hot index.
pub(crate) const NO_STAMP: i32 = -1;

/// A single cached item.
///
/// Entries are allocated with `Box` and immediately leaked to raw pointers;
/// the shard structures link them together through the intrusive fields and
/// [`LruEntry::free`] reclaims them.
pub(crate) struct LruEntry<V> {
    /// Key bytes; identity within a shard (together with `hash`).
    pub(crate) key: Box<[u8]>,
    /// Full 32-bit key hash. The top bits select the shard, the remaining
    /// bits index the shard's tables.
    pub(crate) hash: u32,
    /// The cached value. `None` only for the recency-list sentinel and for
    /// pending secondary-cache entries that have not produced a value yet.
    pub(crate) value: Option<V>,
    /// Destructor for `value`; plain drop when absent.
    pub(crate) deleter: Option<DeleterFn<V>>,
    /// Caller-attributed byte cost of the value.
    pub(crate) charge: usize,
    /// External reference count. Exclusive-lock domain.
    pub(crate) refs: u32,
    flags: AtomicU16,
    /// Recency-list links. Both null iff the entry is not on the list.
    pub(crate) prev: *mut LruEntry<V>,
    pub(crate) next: *mut LruEntry<V>,
    /// Primary-table bucket chain.
    pub(crate) next_hash: *mut LruEntry<V>,
    /// Hot-index bucket chain.
    pub(crate) next_hot: *mut LruEntry<V>,
    /// Hot-index reference-pool slot, or [`NO_STAMP`].
    pub(crate) stamp: AtomicI32,
    /// In-flight secondary-cache lookup, while `PENDING`.
    pub(crate) sec_handle: Option<Box<dyn SecondaryHandle<V>>>,
}

impl<V> LruEntry<V> {
    /// Allocates a new entry and leaks it to a raw pointer.
    ///
    /// The entry starts with no references, off every list, and outside the
    /// cache; the inserting shard flips the in-cache flag once the primary
    /// table adopts it.
    pub(crate) fn alloc(
        key: &[u8],
        hash: u32,
        value: Option<V>,
        charge: usize,
        deleter: Option<DeleterFn<V>>,
        priority: Priority,
    ) -> *mut LruEntry<V> {
        let mut flags = 0;
        if priority == Priority::High {
            flags |= HIGH_PRIORITY;
        }
        Box::into_raw(Box::new(LruEntry {
            key: key.to_vec().into_boxed_slice(),
            hash,
            value,
            deleter,
            charge,
            refs: 0,
            flags: AtomicU16::new(flags),
            prev: core::ptr::null_mut(),
            next: core::ptr::null_mut(),
            next_hash: core::ptr::null_mut(),
            next_hot: core::ptr::null_mut(),
            stamp: AtomicI32::new(NO_STAMP),
            sec_handle: None,
        }))
    }

    /// Allocates the recency-list sentinel: an empty-key entry that only
    /// exists for its `prev`/`next` links.
    pub(crate) fn alloc_sentinel() -> *mut LruEntry<V> {
        Self::alloc(&[], 0, None, 0, None, Priority::Low)
    }

    /// Reclaims an entry, running the client deleter on its value.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`LruEntry::alloc`], be unlinked from every
    /// shard structure, and have no remaining references in either counting
    /// domain. Must be called at most once per entry, outside all locks.
    pub(crate) unsafe fn free(ptr: *mut LruEntry<V>) {
        let mut entry = Box::from_raw(ptr);
        debug_assert!(!entry.in_cache());
        debug_assert_eq!(entry.refs, 0);
        if let Some(value) = entry.value.take() {
            match entry.deleter {
                Some(deleter) => deleter(&entry.key, value),
                None => drop(value),
            }
        }
    }

    #[inline]
    pub(crate) fn ref_(&mut self) {
        self.refs += 1;
    }

    /// Drops one external reference; returns `true` if it was the last.
    #[inline]
    pub(crate) fn unref(&mut self) -> bool {
        debug_assert!(self.refs > 0);
        self.refs -= 1;
        self.refs == 0
    }

    #[inline]
    pub(crate) fn has_refs(&self) -> bool {
        self.refs > 0
    }

    /// Byte cost of this entry against the shard capacity.
    #[inline]
    pub(crate) fn total_charge(&self, policy: MetadataChargePolicy) -> usize {
        match policy {
            MetadataChargePolicy::DontCharge => self.charge,
            MetadataChargePolicy::FullCharge => {
                self.charge + core::mem::size_of::<LruEntry<V>>() + self.key.len()
            }
        }
    }

    #[inline]
    fn flag(&self, bit: u16) -> bool {
        self.flags.load(Ordering::Acquire) & bit != 0
    }

    #[inline]
    fn set_flag(&self, bit: u16, on: bool) {
        if on {
            self.flags.fetch_or(bit, Ordering::Release);
        } else {
            self.flags.fetch_and(!bit, Ordering::Release);
        }
    }

    #[inline]
    pub(crate) fn in_cache(&self) -> bool {
        self.flag(IN_CACHE)
    }

    #[inline]
    pub(crate) fn set_in_cache(&self, on: bool) {
        self.set_flag(IN_CACHE, on);
    }

    #[inline]
    pub(crate) fn is_high_priority(&self) -> bool {
        self.flag(HIGH_PRIORITY)
    }

    #[inline]
    pub(crate) fn in_high_pri_pool(&self) -> bool {
        self.flag(IN_HIGH_PRI_POOL)
    }

    #[inline]
    pub(crate) fn set_in_high_pri_pool(&self, on: bool) {
        self.set_flag(IN_HIGH_PRI_POOL, on);
    }

    #[inline]
    pub(crate) fn has_hit(&self) -> bool {
        self.flag(HAS_HIT)
    }

    #[inline]
    pub(crate) fn set_hit(&self) {
        self.set_flag(HAS_HIT, true);
    }

    #[inline]
    pub(crate) fn is_secondary_compatible(&self) -> bool {
        self.flag(SECONDARY_COMPAT)
    }

    #[inline]
    pub(crate) fn set_secondary_compatible(&self, on: bool) {
        self.set_flag(SECONDARY_COMPAT, on);
    }

    #[inline]
    pub(crate) fn is_promoted(&self) -> bool {
        self.flag(PROMOTED)
    }

    #[inline]
    pub(crate) fn set_promoted(&self, on: bool) {
        self.set_flag(PROMOTED, on);
    }

    #[inline]
    pub(crate) fn is_pending(&self) -> bool {
        self.flag(PENDING)
    }

    #[inline]
    pub(crate) fn set_pending(&self, on: bool) {
        self.set_flag(PENDING, on);
    }

    #[inline]
    pub(crate) fn in_hot_index(&self) -> bool {
        self.flag(IN_HOT_INDEX)
    }

    #[inline]
    pub(crate) fn set_in_hot_index(&self, on: bool) {
        self.set_flag(IN_HOT_INDEX, on);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    static DELETED: AtomicUsize = AtomicUsize::new(0);

    fn counting_deleter(_key: &[u8], _value: u64) {
        DELETED.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_alloc_and_free_runs_deleter_once() {
        let before = DELETED.load(Ordering::SeqCst);
        let e = LruEntry::alloc(
            b"key",
            0xDEAD_BEEF,
            Some(42u64),
            8,
            Some(counting_deleter as DeleterFn<u64>),
            Priority::Low,
        );
        unsafe {
            assert_eq!((*e).key.as_ref(), b"key");
            assert_eq!((*e).hash, 0xDEAD_BEEF);
            assert!(!(*e).in_cache());
            assert!(!(*e).has_refs());
            LruEntry::free(e);
        }
        assert_eq!(DELETED.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn test_free_without_deleter_drops_value() {
        let e: *mut LruEntry<String> = LruEntry::alloc(
            b"k",
            1,
            Some(String::from("payload")),
            7,
            None,
            Priority::High,
        );
        unsafe {
            assert!((*e).is_high_priority());
            LruEntry::free(e);
        }
    }

    #[test]
    fn test_ref_unref() {
        let e: *mut LruEntry<u32> = LruEntry::alloc(b"r", 2, Some(1), 1, None, Priority::Low);
        unsafe {
            (*e).ref_();
            (*e).ref_();
            assert!(!(*e).unref());
            assert!((*e).unref());
            assert!(!(*e).has_refs());
            LruEntry::free(e);
        }
    }

    #[test]
    fn test_flags_roundtrip() {
        let e: *mut LruEntry<u32> = LruEntry::alloc(b"f", 3, Some(1), 1, None, Priority::Low);
        unsafe {
            (*e).set_in_cache(true);
            (*e).set_hit();
            (*e).set_in_hot_index(true);
            assert!((*e).in_cache() && (*e).has_hit() && (*e).in_hot_index());
            (*e).set_in_hot_index(false);
            (*e).set_in_cache(false);
            assert!(!(*e).in_hot_index());
            assert!((*e).has_hit());
            LruEntry::free(e);
        }
    }

    #[test]
    fn test_total_charge_policies() {
        let e: *mut LruEntry<u32> = LruEntry::alloc(b"abcd", 4, Some(1), 100, None, Priority::Low);
        unsafe {
            assert_eq!((*e).total_charge(MetadataChargePolicy::DontCharge), 100);
            let full = (*e).total_charge(MetadataChargePolicy::FullCharge);
            assert_eq!(full, 100 + core::mem::size_of::<LruEntry<u32>>() + 4);
            LruEntry::free(e);
        }
    }
}
