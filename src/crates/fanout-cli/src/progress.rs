//! Terminal progress bar for executions

use fanout::ProgressTracker;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>4}/{len:4} tasks {msg}";

/// [`ProgressTracker`] drawing an indicatif bar on stderr
pub struct ProgressBarTracker {
    bar: ProgressBar,
    label: String,
    failed: AtomicUsize,
}

impl ProgressBarTracker {
    pub fn new(label: &str) -> Self {
        let style = ProgressStyle::with_template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        let bar = ProgressBar::new(0);
        bar.set_style(style);
        bar.set_message(label.to_string());
        Self {
            bar,
            label: label.to_string(),
            failed: AtomicUsize::new(0),
        }
    }

    /// Tracker that counts but never draws
    pub fn hidden() -> Self {
        let tracker = Self::new("");
        tracker.bar.set_draw_target(ProgressDrawTarget::hidden());
        tracker
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressTracker for ProgressBarTracker {
    fn set_total(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.enable_steady_tick(Duration::from_millis(120));
    }

    fn on_complete(&self, success: bool) {
        if !success {
            let failed = self.failed.fetch_add(1, Ordering::Relaxed) + 1;
            self.bar.set_message(format!("{} ({} failed)", self.label, failed));
        }
        self.bar.inc(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let tracker = ProgressBarTracker::hidden();
        tracker.set_total(3);
        tracker.on_complete(true);
        tracker.on_complete(false);
        tracker.on_complete(false);

        assert_eq!(tracker.position(), 3);
        assert_eq!(tracker.failed(), 2);
        tracker.finish();
    }
}
