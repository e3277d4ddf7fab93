//! Head/tail reconstruction from the on-disk id sequence.
//!
//! After a crash, the ids surviving in the store are walked in ascending
//! key order and fed into an [`IdCorrector`], which classifies every step:
//!
//! - **Consecutive** — `id == tail + 1`. The tail advances.
//! - **Torn-append hole** — `id - tail` is small (bounded by the number of
//!   producers that can claim ids concurrently). The tail advances by one
//!   and the caller must rewrite the item from `id` down to the returned
//!   id, closing the hole.
//! - **Wraparound** — the gap is larger than any crash can tear. The walk
//!   has stepped off the end of the live range onto its head: the range
//!   wraps past the maximum id. Head and tail restart at `id` and the
//!   walk continues over the upper portion.
//!
//! The portion below the wraparound gap was already checked before the
//! gap was seen, so its head and tail are kept as
//! `previous_checked_{head,tail}`. They matter in exactly one boundary
//! case: when the upper portion ends precisely at the maximum id and the
//! lower portion starts at zero, the second pass over the low keys is
//! redundant and the tail reverts to the previously checked value via
//! [`set_tail_to_previous`](IdCorrector::set_tail_to_previous). That case
//! separates "one-element queue parked at the maximum id" from
//! "wraparound in progress".

use fifodb_error::{FifoError, Result};

/// Walk-state machine for recovering a queue's live id range.
#[derive(Debug)]
pub struct IdCorrector {
    max: u64,
    max_diff: u64,
    over_end: bool,
    head: u64,
    tail: u64,
    /// Head and tail validated before the wraparound reset, if one happened.
    previous_checked: Option<(u64, u64)>,
}

impl IdCorrector {
    /// Start a walk at the first observed id.
    ///
    /// `max` is the largest legal id; `max_diff` bounds the hole size a
    /// crash can tear (one missing id per producer in flight).
    pub fn new(head: u64, max: u64, max_diff: usize) -> Result<Self> {
        if head > max {
            return Err(FifoError::StartIdAboveMax { head, max_id: max });
        }
        let max_diff = max_diff as u64;
        if max_diff == 0 || max_diff >= max {
            return Err(FifoError::GapBoundInvalid {
                max_diff,
                max_id: max,
            });
        }
        Ok(Self {
            max,
            max_diff,
            over_end: false,
            head,
            tail: head,
            previous_checked: None,
        })
    }

    #[must_use]
    pub fn head(&self) -> u64 {
        self.head
    }

    #[must_use]
    pub fn tail(&self) -> u64 {
        self.tail
    }

    #[must_use]
    pub fn is_over_end(&self) -> bool {
        self.over_end
    }

    #[must_use]
    pub fn is_tail_max(&self) -> bool {
        self.tail == self.max
    }

    /// Head validated before the wraparound reset, if the walk wrapped.
    #[must_use]
    pub fn previous_checked_head(&self) -> Option<u64> {
        self.previous_checked.map(|(head, _)| head)
    }

    /// Tail validated before the wraparound reset, if the walk wrapped.
    #[must_use]
    pub fn previous_checked_tail(&self) -> Option<u64> {
        self.previous_checked.map(|(_, tail)| tail)
    }

    /// Classify the next id of the ascending walk.
    ///
    /// Returns the id the current item must live at. When the returned id
    /// differs from `id`, the caller must rewrite the item from key `id`
    /// down to the returned key before continuing.
    pub fn feed_next(&mut self, id: u64) -> Result<u64> {
        if id > self.max {
            return Err(FifoError::IdAboveMax {
                id,
                max_id: self.max,
            });
        }

        // The upper portion of a wrapped range ends at `max`; the walk
        // then rolls the tail over to zero and keeps going over the low
        // keys of the second pass.
        if self.tail == self.max {
            if !self.over_end {
                return Err(FifoError::NotOverEnd { id });
            }
            self.tail = 0;
            return Ok(0);
        }

        if id <= self.tail {
            return Err(FifoError::IdNotAdvancing {
                id,
                tail: self.tail,
            });
        }

        if id - self.tail <= self.max_diff {
            self.tail += 1;
            return Ok(self.tail);
        }

        // The gap is too large for a crash to have torn: the walk has
        // crossed from the live range's tail region onto its head region,
        // so the range wraps past `max`. There can be only one such gap.
        if self.over_end {
            return Err(FifoError::SecondWraparound { id });
        }
        self.over_end = true;
        self.previous_checked = Some((self.head, self.tail));
        self.head = id;
        self.tail = id;
        Ok(id)
    }

    /// Revert the tail to the value checked before the wraparound reset.
    ///
    /// Only legal when the walk is over the end with its tail at `max`:
    /// the zero-crossing case in which the low keys were fully validated
    /// during the first pass.
    pub fn set_tail_to_previous(&mut self) -> Result<()> {
        if !self.over_end || !self.is_tail_max() {
            return Err(FifoError::TailRevertOutOfPlace);
        }
        match self.previous_checked {
            Some((_, tail)) => {
                self.tail = tail;
                Ok(())
            }
            None => Err(FifoError::TailRevertOutOfPlace),
        }
    }
}
