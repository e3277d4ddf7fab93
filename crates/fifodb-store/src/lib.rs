//! Ordered key-value store contract consumed by the queue engine.
//!
//! The queue does not own a storage engine; it drives any store that can
//! offer the small surface below: point reads with a distinct not-found
//! outcome, single-key atomic writes and deletes, an atomic multi-op write
//! batch with an optional sync flag, and a forward iterator over keys in
//! lexicographic byte order.
//!
//! # Durability contract
//!
//! A write issued with [`WriteOptions::sync`] set must be on stable storage
//! when the call returns. Unsynced writes may be lost on a crash; the queue
//! engine is designed around that (a lost append tail is repaired on the
//! next open). Batched writes apply all operations or none.
//!
//! # Open traits
//!
//! [`Store`] and [`StoreIterator`] are deliberately user-implementable, so
//! an embedding can back the queue with its engine of choice. The crate
//! ships [`MemoryStore`], an ordered in-memory backend used by tests and
//! benchmarks and as the reference for the contract's semantics.

mod memory;

pub use memory::{MemoryIterator, MemoryStore};

use fifodb_error::Result;

/// Per-write knobs.
///
/// `sync` mirrors the classic LSM write option: when set, the write call
/// does not return until the data is on stable storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub sync: bool,
}

impl WriteOptions {
    /// Options for a synchronous (crash-durable) write.
    #[must_use]
    pub fn synced() -> Self {
        Self { sync: true }
    }
}

/// One operation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// An ordered group of writes applied atomically by [`Store::write`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a put of `key → value`.
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.ops.push(BatchOp::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }

    /// Queue a delete of `key`.
    pub fn delete(&mut self, key: &[u8]) {
        self.ops.push(BatchOp::Delete { key: key.to_vec() });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Consume the batch, yielding its operations in insertion order.
    #[must_use]
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// An ordered, byte-keyed, point-addressable store.
///
/// Keys compare lexicographically as byte strings. Each method is atomic
/// with respect to every other method on the same store; no broader
/// transactional guarantee is assumed.
pub trait Store: Send + Sync {
    /// Iterator handle type produced by [`Store::iter`].
    type Iter<'a>: StoreIterator + 'a
    where
        Self: 'a;

    /// Point lookup. `Ok(None)` means the key is absent; that is not an
    /// error.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Atomically set `key → value`.
    fn put(&self, key: &[u8], value: &[u8], opts: WriteOptions) -> Result<()>;

    /// Atomically remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &[u8], opts: WriteOptions) -> Result<()>;

    /// Apply every operation in `batch` atomically, in order.
    fn write(&self, batch: WriteBatch, opts: WriteOptions) -> Result<()>;

    /// Open a forward iterator. The iterator observes a state no older
    /// than the completion of every write that happened before this call.
    fn iter(&self) -> Result<Self::Iter<'_>>;
}

/// Forward-only cursor over a [`Store`] in ascending key order.
///
/// After [`seek`](StoreIterator::seek) the cursor is positioned at the
/// first key `>=` the target, or invalid if no such key exists. `key` and
/// `value` must only be called while [`valid`](StoreIterator::valid)
/// returns true.
pub trait StoreIterator {
    /// Position at the first entry whose key is `>=` `key`.
    fn seek(&mut self, key: &[u8]) -> Result<()>;

    /// Advance to the next entry in key order.
    fn next(&mut self) -> Result<()>;

    /// Whether the cursor currently points at an entry.
    fn valid(&self) -> bool;

    /// Key of the current entry.
    fn key(&self) -> &[u8];

    /// Value of the current entry.
    fn value(&self) -> &[u8];
}
