//! Crash-durable FIFO queue over an ordered key-value store.
//!
//! Items live in the store as `big-endian(id) → value` entries, where ids
//! are consecutive unsigned integers. Two atomic cursors coordinate any
//! number of in-process producers and consumers:
//!
//! - `head` — the id of the oldest item not yet consumed,
//! - `next_tail` — the id the next successful append will claim.
//!
//! An append claims an id with a CAS on `next_tail` and then writes the
//! item; a consume reads the item at `head` and then claims the slot with
//! a CAS on `head`. The claim and the item write are deliberately not
//! atomic together, which buys lock-freedom at two costs this crate pays
//! back elsewhere:
//!
//! 1. A consumer can observe a claimed-but-unwritten slot. It sees
//!    not-found, and retries until the writer catches up.
//! 2. A crash between claim and write leaves holes in the id sequence.
//!    On the next open, the recovery walk detects each hole and closes it
//!    by rewriting the following items to consecutive ids (a synced
//!    delete+put batch per rewrite).
//!
//! Ids wrap at a configurable maximum, so recovery must also tell "hole
//! torn by a crash" apart from "the live range wraps past the maximum id
//! back to zero". The discriminator is the gap size: crash holes are
//! bounded by the number of concurrent producers, the wraparound gap is
//! everything else. See [`IdCorrector`] for the walk rules.
//!
//! Multiple queues can share one store by giving each codec a distinct
//! key prefix; each queue then recovers and operates strictly inside its
//! own key range.
//!
//! ```
//! # fn main() -> fifodb::Result<()> {
//! use fifodb::{KeyCodec, KeyWidth, MemoryStore, PersistentQueue, Prefix};
//!
//! let store = MemoryStore::new();
//! let codec = KeyCodec::with_prefix(KeyWidth::U32, Prefix::new(1, 17))?;
//! let queue = PersistentQueue::open(&store, codec)?;
//!
//! assert!(queue.push(b"job one")?);
//! assert!(queue.push(b"job two")?);
//! assert_eq!(queue.top()?.as_deref(), Some(&b"job one"[..]));
//! assert_eq!(queue.poll()?.as_deref(), Some(&b"job one"[..]));
//! assert!(queue.pop()?);
//! assert!(queue.is_empty());
//! # Ok(())
//! # }
//! ```

mod codec;
mod corrector;
mod queue;
mod stats;

pub use codec::{EncodedKey, KeyCodec, KeyWidth, Prefix};
pub use corrector::IdCorrector;
pub use queue::PersistentQueue;
pub use stats::StatsSnapshot;

pub use fifodb_error::{ErrorKind, FifoError, Result};
pub use fifodb_store::{
    BatchOp, MemoryStore, Store, StoreIterator, WriteBatch, WriteOptions,
};
