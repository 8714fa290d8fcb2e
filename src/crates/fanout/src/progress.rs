//! Progress reporting
//!
//! The executor calls [`ProgressTracker::set_total`] once before any task
//! runs and [`ProgressTracker::on_complete`] once per finished task, both
//! from the thread that called `execute`.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Receives execution progress
pub trait ProgressTracker {
    fn set_total(&self, total: usize);

    fn on_complete(&self, success: bool);
}

/// Counts successes and failures
///
/// # Example
///
/// ```rust
/// use fanout::{ParallelTracker, ProgressTracker};
///
/// let tracker = ParallelTracker::new();
/// tracker.set_total(2);
/// tracker.on_complete(true);
/// tracker.on_complete(false);
/// assert_eq!(tracker.stats(), (1, 1, 2));
/// ```
#[derive(Debug, Default)]
pub struct ParallelTracker {
    total: AtomicUsize,
    success: AtomicUsize,
    failed: AtomicUsize,
}

impl ParallelTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(success, failed, total)`
    pub fn stats(&self) -> (usize, usize, usize) {
        (
            self.success.load(Ordering::SeqCst),
            self.failed.load(Ordering::SeqCst),
            self.total.load(Ordering::SeqCst),
        )
    }

    pub fn completed(&self) -> usize {
        self.success.load(Ordering::SeqCst) + self.failed.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.completed() >= self.total.load(Ordering::SeqCst)
    }
}

impl ProgressTracker for ParallelTracker {
    fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
    }

    fn on_complete(&self, success: bool) {
        let counter = if success { &self.success } else { &self.failed };
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_counts() {
        let tracker = ParallelTracker::new();
        tracker.set_total(3);
        assert!(!tracker.is_finished());

        tracker.on_complete(true);
        tracker.on_complete(true);
        tracker.on_complete(false);

        assert_eq!(tracker.stats(), (2, 1, 3));
        assert_eq!(tracker.completed(), 3);
        assert!(tracker.is_finished());
    }

    #[test]
    fn test_tracker_as_trait_object() {
        let tracker = ParallelTracker::new();
        let dynamic: &dyn ProgressTracker = &tracker;
        dynamic.set_total(1);
        dynamic.on_complete(false);
        assert_eq!(tracker.stats(), (0, 1, 1));
    }
}
