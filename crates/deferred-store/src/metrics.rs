//! Adapter statistics.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the adapter.
#[derive(Debug, Default)]
pub struct DeferredStats {
    /// Operations appended to the queue (iterator requests included)
    pub total_queued: AtomicU64,
    /// Queued operations replayed against the store
    pub total_replayed: AtomicU64,
    /// Operations forwarded directly while ready
    pub total_forwarded: AtomicU64,
    /// Queued operations resolved with an error instead of running
    pub total_failed: AtomicU64,
    /// Operations refused up front (queue full, unsupported method)
    pub total_rejected: AtomicU64,
    /// Deferred iterators bound to a real iterator
    pub iterators_bound: AtomicU64,
}

impl DeferredStats {
    pub(crate) fn record_queued(&self) {
        self.total_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_replayed(&self) {
        self.total_replayed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_forwarded(&self) {
        self.total_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self, count: u64) {
        self.total_failed.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.total_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_iterator_bound(&self) {
        self.iterators_bound.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_queued: self.total_queued.load(Ordering::Relaxed),
            total_replayed: self.total_replayed.load(Ordering::Relaxed),
            total_forwarded: self.total_forwarded.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            total_rejected: self.total_rejected.load(Ordering::Relaxed),
            iterators_bound: self.iterators_bound.load(Ordering::Relaxed),
        }
    }
}

/// Serializable copy of [`DeferredStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_queued: u64,
    pub total_replayed: u64,
    pub total_forwarded: u64,
    pub total_failed: u64,
    pub total_rejected: u64,
    pub iterators_bound: u64,
}
