use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreMetricsSnapshot {
    pub tx_begin_count: u64,
    pub tx_commit_count: u64,
    pub tx_rollback_count: u64,
    pub transient_retries: u64,
    pub feed_appends: u64,
    pub duplicate_deliveries: u64,
}

/// Process-local counters for one [`Store`](crate::store::Store).
#[derive(Default)]
pub struct StoreMetrics {
    tx_begin: AtomicU64,
    tx_commit: AtomicU64,
    tx_rollback: AtomicU64,
    transient_retries: AtomicU64,
    feed_appends: AtomicU64,
    duplicate_deliveries: AtomicU64,
}

impl StoreMetrics {
    pub fn snapshot(&self) -> StoreMetricsSnapshot {
        StoreMetricsSnapshot {
            tx_begin_count: self.tx_begin.load(Ordering::Relaxed),
            tx_commit_count: self.tx_commit.load(Ordering::Relaxed),
            tx_rollback_count: self.tx_rollback.load(Ordering::Relaxed),
            transient_retries: self.transient_retries.load(Ordering::Relaxed),
            feed_appends: self.feed_appends.load(Ordering::Relaxed),
            duplicate_deliveries: self.duplicate_deliveries.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.tx_begin.store(0, Ordering::Relaxed);
        self.tx_commit.store(0, Ordering::Relaxed);
        self.tx_rollback.store(0, Ordering::Relaxed);
        self.transient_retries.store(0, Ordering::Relaxed);
        self.feed_appends.store(0, Ordering::Relaxed);
        self.duplicate_deliveries.store(0, Ordering::Relaxed);
    }

    pub(crate) fn record_begin(&self) {
        self.tx_begin.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.tx_commit.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.tx_rollback.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.transient_retries.fetch_add(1, Ordering::Relaxed);
    }

    // Counted inside the transaction; a rolled back publish still shows its
    // attempted appends.
    pub(crate) fn record_feed_append(&self, appended: bool) {
        if appended {
            self.feed_appends.fetch_add(1, Ordering::Relaxed);
        } else {
            self.duplicate_deliveries.fetch_add(1, Ordering::Relaxed);
        }
    }
}
