//! Batch counters and the cooperative stop signal.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::types::ProcessingResult;

/// Counts for one batch run.
///
/// Only the scheduler's collecting loop writes these; anyone holding a clone
/// of the `Arc` may read them while the run is in progress.
#[derive(Debug, Default)]
pub struct BatchProgress {
    submitted: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    skipped_operations: AtomicUsize,
}

/// Point-in-time copy of [`BatchProgress`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub submitted: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped_operations: usize,
}

impl ProgressSnapshot {
    /// Results received so far, successful or not.
    pub fn finished(&self) -> usize {
        self.completed + self.failed
    }
}

impl BatchProgress {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn add_submitted(&self, n: usize) {
        self.submitted.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn record(&self, result: &ProcessingResult) {
        if result.is_success() {
            self.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.skipped_operations
            .fetch_add(result.skipped_operations(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped_operations: self.skipped_operations.load(Ordering::Relaxed),
        }
    }
}

/// Request to stop submitting new chunks.
///
/// Clones share the flag. Chunks already running finish normally.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
