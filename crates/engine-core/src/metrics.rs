use model::execution::result::{StepResult, StepStatus};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerCounters {
    items_read: AtomicU64,
    items_filtered: AtomicU64,
    items_written: AtomicU64,
    items_skipped: AtomicU64,
    chunks_committed: AtomicU64,
}

/// Step counters shared by the reader loop and every chunk worker.
#[derive(Debug, Clone, Default)]
pub struct StepCounters {
    inner: Arc<InnerCounters>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub items_read: u64,
    pub items_filtered: u64,
    pub items_written: u64,
    pub items_skipped: u64,
    pub chunks_committed: u64,
}

impl StepCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_read(&self, count: u64) {
        self.inner.items_read.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_filtered(&self, count: u64) {
        self.inner.items_filtered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_written(&self, count: u64) {
        self.inner.items_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_chunk(&self) {
        self.inner.chunks_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one skip and returns the running total including it.
    pub fn record_skip(&self) -> u64 {
        self.inner.items_skipped.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn skipped(&self) -> u64 {
        self.inner.items_skipped.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            items_read: self.inner.items_read.load(Ordering::Relaxed),
            items_filtered: self.inner.items_filtered.load(Ordering::Relaxed),
            items_written: self.inner.items_written.load(Ordering::Relaxed),
            items_skipped: self.inner.items_skipped.load(Ordering::SeqCst),
            chunks_committed: self.inner.chunks_committed.load(Ordering::Relaxed),
        }
    }
}

impl CountersSnapshot {
    pub fn into_result(self, step: &str, status: StepStatus, failure: Option<String>) -> StepResult {
        StepResult {
            step: step.to_string(),
            items_read: self.items_read,
            items_filtered: self.items_filtered,
            items_written: self.items_written,
            items_skipped: self.items_skipped,
            chunks_committed: self.chunks_committed,
            status,
            failure,
        }
    }
}
