//! Diagnostic contention counters.
//!
//! Each queue operation tallies its own retries into a stack-local
//! [`LocalStats`] and folds the tally into the shared atomics exactly once
//! on the way out, so the hot path never touches shared cache lines just
//! for accounting. All counters are relaxed and best-effort: they carry no
//! ordering guarantees and exist to answer "how contended is this queue"
//! in logs and tests.
//!
//! Every counter stays at zero for a queue that is only ever used from one
//! thread at a time.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-call tallies, merged into [`Stats`] when the operation returns.
#[derive(Debug, Default)]
pub(crate) struct LocalStats {
    /// Failed claim CAS attempts (a peer won the slot first).
    pub cas_repetitions: u64,
    /// Voluntary scheduler yields taken by the retry loop.
    pub yields: u64,
    /// Point reads that found the slot not written yet or already deleted.
    pub get_misses: u64,
}

/// Shared counters for one queue instance.
#[derive(Debug, Default)]
pub(crate) struct Stats {
    top_yield: AtomicU64,
    top_get_miss: AtomicU64,

    pop_cas_repetition: AtomicU64,
    pop_yield: AtomicU64,
    pop_get_miss: AtomicU64,

    poll_cas_repetition: AtomicU64,
    poll_yield: AtomicU64,
    poll_get_miss: AtomicU64,

    push_cas_repetition: AtomicU64,
    push_yield: AtomicU64,
    push_cas_repetition_max: AtomicU64,
    push_yield_max: AtomicU64,

    shift_down: AtomicU64,
}

impl Stats {
    pub(crate) fn merge_top(&self, local: &LocalStats) {
        if local.yields > 0 {
            self.top_yield.fetch_add(local.yields, Ordering::Relaxed);
        }
        if local.get_misses > 0 {
            self.top_get_miss
                .fetch_add(local.get_misses, Ordering::Relaxed);
        }
    }

    pub(crate) fn merge_pop(&self, local: &LocalStats) {
        if local.cas_repetitions > 0 {
            self.pop_cas_repetition
                .fetch_add(local.cas_repetitions, Ordering::Relaxed);
        }
        if local.yields > 0 {
            self.pop_yield.fetch_add(local.yields, Ordering::Relaxed);
        }
        if local.get_misses > 0 {
            self.pop_get_miss
                .fetch_add(local.get_misses, Ordering::Relaxed);
        }
    }

    pub(crate) fn merge_poll(&self, local: &LocalStats) {
        if local.cas_repetitions > 0 {
            self.poll_cas_repetition
                .fetch_add(local.cas_repetitions, Ordering::Relaxed);
        }
        if local.yields > 0 {
            self.poll_yield.fetch_add(local.yields, Ordering::Relaxed);
        }
        if local.get_misses > 0 {
            self.poll_get_miss
                .fetch_add(local.get_misses, Ordering::Relaxed);
        }
    }

    pub(crate) fn merge_push(&self, local: &LocalStats) {
        if local.cas_repetitions > 0 {
            self.push_cas_repetition
                .fetch_add(local.cas_repetitions, Ordering::Relaxed);
            self.push_cas_repetition_max
                .fetch_max(local.cas_repetitions, Ordering::Relaxed);
        }
        if local.yields > 0 {
            self.push_yield.fetch_add(local.yields, Ordering::Relaxed);
            self.push_yield_max
                .fetch_max(local.yields, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_shift_down(&self) {
        self.shift_down.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            top_yield_count: self.top_yield.load(Ordering::Relaxed),
            top_get_miss_count: self.top_get_miss.load(Ordering::Relaxed),
            pop_cas_repetition_count: self.pop_cas_repetition.load(Ordering::Relaxed),
            pop_yield_count: self.pop_yield.load(Ordering::Relaxed),
            pop_get_miss_count: self.pop_get_miss.load(Ordering::Relaxed),
            poll_cas_repetition_count: self.poll_cas_repetition.load(Ordering::Relaxed),
            poll_yield_count: self.poll_yield.load(Ordering::Relaxed),
            poll_get_miss_count: self.poll_get_miss.load(Ordering::Relaxed),
            push_cas_repetition_count: self.push_cas_repetition.load(Ordering::Relaxed),
            push_yield_count: self.push_yield.load(Ordering::Relaxed),
            push_cas_repetition_max: self.push_cas_repetition_max.load(Ordering::Relaxed),
            push_yield_max: self.push_yield_max.load(Ordering::Relaxed),
            shift_down_count: self.shift_down.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a queue's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub top_yield_count: u64,
    pub top_get_miss_count: u64,

    pub pop_cas_repetition_count: u64,
    pub pop_yield_count: u64,
    pub pop_get_miss_count: u64,

    pub poll_cas_repetition_count: u64,
    pub poll_yield_count: u64,
    pub poll_get_miss_count: u64,

    pub push_cas_repetition_count: u64,
    pub push_yield_count: u64,
    /// Largest number of claim retries any single push needed.
    pub push_cas_repetition_max: u64,
    /// Largest number of yields any single push took.
    pub push_yield_max: u64,

    /// Torn-append holes closed during recovery.
    pub shift_down_count: u64,
}
