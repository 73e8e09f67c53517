//! Cycle counters.
//!
//! Relaxed atomics updated by cycle tasks; [`CycleStats::snapshot`] gives a
//! point-in-time copy that is not guaranteed to be internally consistent
//! while cycles are running.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// Live counters shared by a consumer's cycles.
#[derive(Debug, Default)]
pub(crate) struct CycleStats {
    cycles_started: AtomicU64,
    batches_delivered: AtomicU64,
    batches_failed: AtomicU64,
    items_delivered: AtomicU64,
    items_dirtied: AtomicU64,
    extraction_faults: AtomicU64,
    last_batch_size: AtomicUsize,
}

impl CycleStats {
    /// Registers a new cycle and returns its 1-based id.
    pub(crate) fn start_cycle(&self) -> u64 {
        self.cycles_started.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_extracted(&self, items: usize) {
        self.last_batch_size.store(items, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self, items: usize) {
        self.batches_delivered.fetch_add(1, Ordering::Relaxed);
        self.items_delivered.fetch_add(items as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_handler_failure(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_extraction_fault(&self) {
        self.extraction_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dirtied(&self, items: usize) {
        self.items_dirtied.fetch_add(items as u64, Ordering::Relaxed);
    }

    pub(crate) fn last_batch_size(&self) -> usize {
        self.last_batch_size.load(Ordering::Relaxed)
    }

    pub(crate) fn snapshot(&self) -> ConsumerStats {
        ConsumerStats {
            cycles_started: self.cycles_started.load(Ordering::Relaxed),
            batches_delivered: self.batches_delivered.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            items_delivered: self.items_delivered.load(Ordering::Relaxed),
            items_dirtied: self.items_dirtied.load(Ordering::Relaxed),
            extraction_faults: self.extraction_faults.load(Ordering::Relaxed),
            last_batch_size: self.last_batch_size(),
        }
    }
}

/// Point-in-time view of a consumer's activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerStats {
    /// Cycles started by ticks or manual triggers.
    pub cycles_started: u64,
    /// Batches the handler accepted.
    pub batches_delivered: u64,
    /// Batches the handler rejected.
    pub batches_failed: u64,
    /// Items in delivered batches.
    pub items_delivered: u64,
    /// Items moved to the dirty set.
    pub items_dirtied: u64,
    /// Extractions that ended in a store, predicate or revert fault.
    pub extraction_faults: u64,
    /// Size of the most recent non-empty extracted batch.
    pub last_batch_size: usize,
}
