//! Error taxonomy for fifodb.
//!
//! One enum covers the whole surface: configuration misuse, violations of
//! the recovery walk discipline, on-disk corruption, and store backend
//! failures. [`ErrorKind`] partitions the variants into the three classes
//! that matter to callers:
//!
//! - **Misuse** — the caller (or the recovery driver) broke an API
//!   contract. Never produced by steady-state queue operations.
//! - **Corruption** — the stored state violates a queue invariant. Fatal;
//!   the queue refuses to operate on such a store.
//! - **Storage** — the underlying store reported a failure other than
//!   not-found. Not-found is never an error; it travels as `Ok(None)`.
//!
//! "Queue is full" and "queue is empty" are ordinary return values, not
//! errors, and have no variants here.

use thiserror::Error;

/// Primary error type for fifodb operations.
#[derive(Error, Debug)]
pub enum FifoError {
    // === Configuration ===
    /// The concurrent-producer bound must leave room for at least one item.
    #[error("maximum producer count must be at least 1")]
    ProducerLimitZero,

    /// The concurrent-producer bound would consume the whole id space.
    #[error("maximum producer count {limit} is too large for maximum id {max_id}: no item could remain in the queue")]
    ProducerLimitTooLarge { limit: usize, max_id: u64 },

    /// A key prefix must be at least one byte and strictly narrower than the key.
    #[error("prefix of {prefix_bytes} bytes must be at least one byte and narrower than the {key_bytes}-byte key")]
    PrefixTooWide {
        prefix_bytes: usize,
        key_bytes: usize,
    },

    /// The prefix value does not fit in the configured prefix width.
    #[error("prefix value {value:#x} does not fit in {prefix_bytes} bytes")]
    PrefixValueTooLarge { value: u64, prefix_bytes: usize },

    // === Recovery walk discipline ===
    /// The first observed id already exceeds the id space.
    #[error("starting id {head} is greater than the maximum id {max_id}")]
    StartIdAboveMax { head: u64, max_id: u64 },

    /// The recoverable-gap bound is zero or swallows the whole id space.
    #[error("recoverable gap bound {max_diff} must be nonzero and less than the maximum id {max_id}")]
    GapBoundInvalid { max_diff: u64, max_id: u64 },

    /// An id fed to the corrector is greater than the maximum id.
    #[error("id {id} is greater than the maximum id {max_id}")]
    IdAboveMax { id: u64, max_id: u64 },

    /// The tail sits at the maximum id but the sequence is not over the end.
    #[error("id {id} passes the end of the id space, but the sequence is not over the end")]
    NotOverEnd { id: u64 },

    /// Ids must be fed in strictly ascending order.
    #[error("id {id} does not advance past the current tail {tail}")]
    IdNotAdvancing { id: u64, tail: u64 },

    /// A second wraparound of the id space cannot exist.
    #[error("id {id} takes the sequence over the end for the second time")]
    SecondWraparound { id: u64 },

    /// The tail revert is only legal in the zero-crossing wraparound state.
    #[error("the tail can only be reverted when the sequence is over the end with the tail at the maximum id")]
    TailRevertOutOfPlace,

    // === Corruption ===
    /// A stored key has the wrong byte length for this queue.
    #[error("stored key is {found} bytes where {expected}-byte keys are expected")]
    KeyLengthMismatch { found: usize, expected: usize },

    /// The recovered queue exceeds the safe occupancy bound.
    #[error("queue holds {len} items, more than the safe maximum of {max_size}")]
    Overfull { len: u64, max_size: u64 },

    /// The walk met the head again without the id sequence ever wrapping.
    #[error("the walk reached the head id {id} again although the sequence never wrapped")]
    HeadMetBeforeWraparound { id: u64 },

    /// An item scheduled for relocation vanished between observation and read.
    #[error("item to relocate from id {id} is missing from the store")]
    RelocationSourceMissing { id: u64 },

    /// A seek to a key that must exist found nothing.
    #[error("failed to seek to a key that must exist")]
    SeekLostKey,

    /// The wrapped portion of the walk ran dry before meeting the head.
    #[error("the store ran out of keys before the walk met the head")]
    RecoveryWalkExhausted,

    // === Storage ===
    /// The store backend reported a failure other than not-found.
    #[error("store backend error: {detail}")]
    Backend { detail: String },

    /// I/O error from a store backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`FifoError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An API contract was broken by the caller.
    Misuse,
    /// The stored state violates a queue invariant.
    Corruption,
    /// The underlying store failed.
    Storage,
}

impl FifoError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ProducerLimitZero
            | Self::ProducerLimitTooLarge { .. }
            | Self::PrefixTooWide { .. }
            | Self::PrefixValueTooLarge { .. }
            | Self::StartIdAboveMax { .. }
            | Self::GapBoundInvalid { .. }
            | Self::IdAboveMax { .. }
            | Self::NotOverEnd { .. }
            | Self::IdNotAdvancing { .. }
            | Self::SecondWraparound { .. }
            | Self::TailRevertOutOfPlace => ErrorKind::Misuse,

            Self::KeyLengthMismatch { .. }
            | Self::Overfull { .. }
            | Self::HeadMetBeforeWraparound { .. }
            | Self::RelocationSourceMissing { .. }
            | Self::SeekLostKey
            | Self::RecoveryWalkExhausted => ErrorKind::Corruption,

            Self::Backend { .. } | Self::Io(_) => ErrorKind::Storage,
        }
    }

    /// Build a [`FifoError::Backend`] from any displayable failure.
    pub fn backend(detail: impl Into<String>) -> Self {
        Self::Backend {
            detail: detail.into(),
        }
    }
}

/// Result alias used across the fifodb crates.
pub type Result<T> = std::result::Result<T, FifoError>;
