//! Metrics registry
//!
//! Counters only, monotonic, reset on process start. Relaxed atomics; the
//! values are exact once all writers are done.

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters for one database
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    transactions_begun: AtomicU64,
    transactions_committed: AtomicU64,
    transactions_rolled_back: AtomicU64,
    queries_executed: AtomicU64,
    queries_rejected: AtomicU64,
    /// Documents pulled from table or index scans
    documents_scanned: AtomicU64,
    index_scans: AtomicU64,
    table_scans: AtomicU64,
    in_memory_sorts: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_transactions_begun(&self) {
        self.transactions_begun.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transactions_committed(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transactions_rolled_back(&self) {
        self.transactions_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_executed(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_rejected(&self) {
        self.queries_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_documents_scanned(&self, count: u64) {
        self.documents_scanned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_index_scans(&self) {
        self.index_scans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_table_scans(&self) {
        self.table_scans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_in_memory_sorts(&self) {
        self.in_memory_sorts.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            transactions_begun: self.transactions_begun.load(Ordering::Relaxed),
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_rolled_back: self.transactions_rolled_back.load(Ordering::Relaxed),
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            queries_rejected: self.queries_rejected.load(Ordering::Relaxed),
            documents_scanned: self.documents_scanned.load(Ordering::Relaxed),
            index_scans: self.index_scans.load(Ordering::Relaxed),
            table_scans: self.table_scans.load(Ordering::Relaxed),
            in_memory_sorts: self.in_memory_sorts.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub transactions_begun: u64,
    pub transactions_committed: u64,
    pub transactions_rolled_back: u64,
    pub queries_executed: u64,
    pub queries_rejected: u64,
    pub documents_scanned: u64,
    pub index_scans: u64,
    pub table_scans: u64,
    pub in_memory_sorts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_zero_values() {
        assert_eq!(MetricsRegistry::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_increment_counters() {
        let registry = MetricsRegistry::new();
        registry.increment_transactions_begun();
        registry.increment_transactions_begun();
        registry.increment_transactions_committed();
        registry.increment_index_scans();
        registry.add_documents_scanned(7);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.transactions_begun, 2);
        assert_eq!(snapshot.transactions_committed, 1);
        assert_eq!(snapshot.index_scans, 1);
        assert_eq!(snapshot.documents_scanned, 7);
        assert_eq!(snapshot.table_scans, 0);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..100 {
                        reg.increment_queries_executed();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.snapshot().queries_executed, 800);
    }
}
