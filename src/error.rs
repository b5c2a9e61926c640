//! Error and status types for cache operations.
//!
//! Most cache operations are infallible by design: a lookup miss is `None`,
//! not an error. The fallible surface is small:
//!
//! - constructing a cache with invalid parameters,
//! - inserting under a strict capacity limit with no room left after
//!   eviction,
//! - handing an entry to the secondary tier.

use thiserror::Error;

/// Result type alias for cache operations.
pub type Result<T> = core::result::Result<T, CacheError>;

/// Errors surfaced by the cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// An insert could not make room under a strict capacity limit.
    ///
    /// The entry (and its value) has already been released by the time the
    /// caller sees this error; no partial cache state remains.
    #[error("insert failed: cache is full and the strict capacity limit is set")]
    CapacityExceeded,

    /// A constructor or setter was given an out-of-range parameter.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The secondary cache rejected an entry.
    #[error("secondary cache rejected the entry")]
    Secondary,
}

/// Outcome of a successful insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The key was not present; a new entry was created.
    Inserted,
    /// A prior entry with the same key was displaced. Informational: the
    /// new value is in the cache and the old one has been (or is about to
    /// be) released.
    Overwritten,
}
