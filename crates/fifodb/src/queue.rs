//! The queue engine: attach-time recovery plus the steady-state operations.
//!
//! ## Coordination protocol
//!
//! Two atomic cursors, `head` and `next_tail`, are the only shared mutable
//! state besides the store itself. A push claims the id at `next_tail`
//! with a CAS and then writes the item; pop/poll read the item at `head`,
//! claim the slot with a CAS, and then delete it. Loads of the opposite
//! cursor use acquire ordering so that a non-empty observation
//! happens-after the peer's publishing write; initial snapshots are
//! relaxed.
//!
//! Because the id claim and the item write are separate steps, a consumer
//! can catch a slot in the claimed-but-unwritten window. The store
//! answers not-found; the consumer re-reads `head` and retries without
//! claiming anything. Every retry loop yields to the scheduler once per
//! [`YIELD_AFTER`] iterations so a preempted peer can finish publishing.
//!
//! ## Recovery
//!
//! Opening a queue walks its key partition in ascending order and feeds
//! each id to an [`IdCorrector`]. Holes torn by a crash are closed by
//! rewriting the following item down to the hole (one synced delete+put
//! batch per rewrite), after which the iterator is re-created and
//! re-positioned on the rewritten key. The walk ends either at the
//! partition boundary, or — when the live range wraps past the maximum
//! id — back where its head was first seen.

use std::sync::atomic::{AtomicU64, Ordering};

use fifodb_error::{FifoError, Result};
use fifodb_store::{Store, StoreIterator, WriteBatch, WriteOptions};
use tracing::{debug, info};

use crate::codec::KeyCodec;
use crate::corrector::IdCorrector;
use crate::stats::{LocalStats, Stats, StatsSnapshot};

/// Retry-loop iterations between voluntary scheduler yields.
const YIELD_AFTER: u64 = 10;

#[derive(Clone, Copy)]
enum ConsumerOp {
    Pop,
    Poll,
}

/// Crash-durable FIFO queue over a borrowed ordered store.
///
/// All operations take `&self` and are safe to call from any number of
/// threads. The queue borrows its store; it cannot outlive the handle.
#[derive(Debug)]
pub struct PersistentQueue<'db, S: Store> {
    store: &'db S,
    codec: KeyCodec,
    /// Upper bound on producers claiming ids concurrently. Doubles as the
    /// largest crash hole recovery will close, and carves the safety
    /// margin out of the id space.
    max_thread_number: usize,
    head: AtomicU64,
    next_tail: AtomicU64,
    stats: Stats,
}

impl<'db, S: Store> PersistentQueue<'db, S> {
    /// Open the queue with a producer bound suited to the id space.
    pub fn open(store: &'db S, codec: KeyCodec) -> Result<Self> {
        let limit = if codec.max_id() > 100_000 { 100_000 } else { 10_000 };
        Self::open_with_limit(store, codec, limit)
    }

    /// Open the queue with an explicit bound on concurrent producers.
    ///
    /// The bound must be at least 1 and strictly below the codec's maximum
    /// id; small id spaces therefore require an explicit, small bound.
    pub fn open_with_limit(
        store: &'db S,
        codec: KeyCodec,
        max_thread_number: usize,
    ) -> Result<Self> {
        if max_thread_number == 0 {
            return Err(FifoError::ProducerLimitZero);
        }
        if max_thread_number as u64 >= codec.max_id() {
            return Err(FifoError::ProducerLimitTooLarge {
                limit: max_thread_number,
                max_id: codec.max_id(),
            });
        }
        let queue = Self {
            store,
            codec,
            max_thread_number,
            head: AtomicU64::new(0),
            next_tail: AtomicU64::new(0),
            stats: Stats::default(),
        };
        queue.recover()?;
        Ok(queue)
    }

    /// Append `value`. Returns `Ok(false)` when the queue is at capacity.
    pub fn push(&self, value: &[u8]) -> Result<bool> {
        let mut local = LocalStats::default();
        let mut loop_count = 0u64;
        let mut next_tail = self.next_tail.load(Ordering::Relaxed);

        loop {
            yield_pacing(&mut loop_count, &mut local);

            let new_next_tail = self.next_id(next_tail);
            let head = self.head.load(Ordering::Acquire);
            let size = self.distance(head, next_tail);
            if size + 1 >= self.max_size() {
                self.stats.merge_push(&local);
                return Ok(false);
            }

            match self.next_tail.compare_exchange(
                next_tail,
                new_next_tail,
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(current) => {
                    local.cas_repetitions += 1;
                    next_tail = current;
                }
            }
        }

        let key = self.codec.to_key(next_tail);
        self.store
            .put(key.as_bytes(), value, WriteOptions::default())?;
        self.stats.merge_push(&local);
        Ok(true)
    }

    /// Discard the oldest item. Returns `Ok(false)` when the queue is empty.
    pub fn pop(&self) -> Result<bool> {
        Ok(self.remove_head(ConsumerOp::Pop)?.is_some())
    }

    /// Remove and return the oldest item, or `Ok(None)` when empty.
    pub fn poll(&self) -> Result<Option<Vec<u8>>> {
        self.remove_head(ConsumerOp::Poll)
    }

    /// Read the oldest item without removing it, or `Ok(None)` when empty.
    pub fn top(&self) -> Result<Option<Vec<u8>>> {
        let mut local = LocalStats::default();
        let mut loop_count = 0u64;

        loop {
            let head = self.head.load(Ordering::Relaxed);
            if head == self.next_tail.load(Ordering::Acquire) {
                self.stats.merge_top(&local);
                return Ok(None);
            }
            yield_pacing(&mut loop_count, &mut local);

            match self.store.get(self.codec.to_key(head).as_bytes())? {
                Some(value) => {
                    self.stats.merge_top(&local);
                    return Ok(Some(value));
                }
                // A peer consumed this slot between our cursor load and
                // the read; take a fresh snapshot.
                None => local.get_misses += 1,
            }
        }
    }

    /// Number of claimed slots between the cursors.
    ///
    /// Concurrent pushes may be counted before their item write lands, so
    /// the value can momentarily run ahead of the settled size — but never
    /// beyond the capacity bound.
    #[must_use]
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let next_tail = self.next_tail.load(Ordering::Acquire);
        self.distance(head, next_tail) as usize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current diagnostic counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn remove_head(&self, op: ConsumerOp) -> Result<Option<Vec<u8>>> {
        let mut local = LocalStats::default();
        let mut loop_count = 0u64;
        let mut head = self.head.load(Ordering::Relaxed);

        let value = loop {
            if head == self.next_tail.load(Ordering::Acquire) {
                self.merge_consumer(op, &local);
                return Ok(None);
            }
            yield_pacing(&mut loop_count, &mut local);

            let key = self.codec.to_key(head);
            let Some(value) = self.store.get(key.as_bytes())? else {
                // Either the push that claimed this slot has not written
                // it yet, or a peer consumer deleted it first. Re-read the
                // cursor and retry without claiming anything.
                local.get_misses += 1;
                head = self.head.load(Ordering::Relaxed);
                continue;
            };

            let new_head = self.next_id(head);
            match self.head.compare_exchange(
                head,
                new_head,
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => break value,
                Err(current) => {
                    local.cas_repetitions += 1;
                    head = current;
                }
            }
        };

        self.store
            .delete(self.codec.to_key(head).as_bytes(), WriteOptions::default())?;
        self.merge_consumer(op, &local);
        Ok(Some(value))
    }

    fn merge_consumer(&self, op: ConsumerOp, local: &LocalStats) {
        match op {
            ConsumerOp::Pop => self.stats.merge_pop(local),
            ConsumerOp::Poll => self.stats.merge_poll(local),
        }
    }

    /// Rebuild the cursors from the ids surviving in this queue's key
    /// partition, closing torn-append holes along the way.
    fn recover(&self) -> Result<()> {
        let start_key = self.codec.to_key(0);
        let mut iter = self.store.iter()?;
        iter.seek(start_key.as_bytes())?;

        if !self.in_partition(&iter)? {
            self.head.store(0, Ordering::Relaxed);
            self.next_tail.store(0, Ordering::Relaxed);
            debug!(max_id = self.codec.max_id(), "opened empty queue");
            return Ok(());
        }

        let first_id = self.codec.to_id(iter.key())?;
        let mut corrector =
            IdCorrector::new(first_id, self.codec.max_id(), self.max_thread_number)?;
        let mut wrapped_scan = false;

        iter.next()?;
        loop {
            if !self.in_partition(&iter)? {
                if !corrector.is_over_end() {
                    break;
                }
                // The live range wraps: restart at the partition head to
                // walk the wrapped portion. A second restart would mean
                // the head's key is gone.
                if wrapped_scan {
                    return Err(FifoError::RecoveryWalkExhausted);
                }
                wrapped_scan = true;
                iter = self.reseek(start_key.as_bytes())?;
                continue;
            }
            let id = self.codec.to_id(iter.key())?;

            // The wrapped scan ends where the live range begins.
            if id == corrector.head() {
                if !corrector.is_over_end() {
                    return Err(FifoError::HeadMetBeforeWraparound { id });
                }
                break;
            }

            // Zero-crossing shortcut: the low keys were fully validated
            // during the first pass, so the second pass is redundant.
            if corrector.is_over_end()
                && corrector.is_tail_max()
                && id == 0
                && corrector.previous_checked_head() == Some(0)
            {
                corrector.set_tail_to_previous()?;
                break;
            }

            let next = corrector.feed_next(id)?;
            if next != id {
                self.shift_down(id, next)?;
                iter = self.reseek(self.codec.to_key(next).as_bytes())?;
            }
            iter.next()?;
        }

        self.head.store(corrector.head(), Ordering::Relaxed);
        let next_tail = if corrector.is_tail_max() {
            0
        } else {
            corrector.tail() + 1
        };
        self.next_tail.store(next_tail, Ordering::Relaxed);

        let len = self.len() as u64;
        if len > self.max_size() {
            return Err(FifoError::Overfull {
                len,
                max_size: self.max_size(),
            });
        }
        info!(head = corrector.head(), next_tail, len, "recovered queue state");
        Ok(())
    }

    /// Whether the iterator stands on a key of this queue's partition.
    /// A key of the wrong length anywhere in the scan is fatal.
    fn in_partition(&self, iter: &dyn StoreIterator) -> Result<bool> {
        if !iter.valid() {
            return Ok(false);
        }
        let key = iter.key();
        if key.len() != self.codec.key_len() {
            return Err(FifoError::KeyLengthMismatch {
                found: key.len(),
                expected: self.codec.key_len(),
            });
        }
        Ok(self.codec.covers(key))
    }

    /// Move the item at id `from` down to id `to` in one atomic, synced
    /// batch. A rewrite split across two writes could lose or duplicate
    /// the item on a crash.
    fn shift_down(&self, from: u64, to: u64) -> Result<()> {
        let from_key = self.codec.to_key(from);
        let to_key = self.codec.to_key(to);
        let value = self
            .store
            .get(from_key.as_bytes())?
            .ok_or(FifoError::RelocationSourceMissing { id: from })?;
        let mut batch = WriteBatch::new();
        batch.delete(from_key.as_bytes());
        batch.put(to_key.as_bytes(), &value);
        self.store.write(batch, WriteOptions::synced())?;
        self.stats.record_shift_down();
        debug!(from_id = from, to_id = to, "closed torn-append hole");
        Ok(())
    }

    /// Fresh iterator positioned on `key`, which must exist.
    fn reseek(&self, key: &[u8]) -> Result<S::Iter<'db>> {
        let mut iter = self.store.iter()?;
        iter.seek(key)?;
        if !iter.valid() {
            return Err(FifoError::SeekLostKey);
        }
        Ok(iter)
    }

    fn next_id(&self, id: u64) -> u64 {
        if id == self.codec.max_id() {
            0
        } else {
            id + 1
        }
    }

    /// Occupancy from `head` to `next_tail` in the circular id space.
    fn distance(&self, head: u64, next_tail: u64) -> u64 {
        if next_tail >= head {
            next_tail - head
        } else {
            (self.codec.max_id() - head) + next_tail + 1
        }
    }

    fn max_size(&self) -> u64 {
        self.codec.max_id() - self.max_thread_number as u64 + 1
    }
}

fn yield_pacing(loop_count: &mut u64, local: &mut LocalStats) {
    if *loop_count == YIELD_AFTER {
        local.yields += 1;
        *loop_count = 0;
        std::thread::yield_now();
    }
    *loop_count += 1;
}
