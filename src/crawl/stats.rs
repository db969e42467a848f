// src/crawl/stats.rs
// =============================================================================
// Counters for one crawl.
//
// Workers and the scheduler bump these concurrently, so they're atomics.
// CrawlSummary is a plain copy taken at the end for printing.
// =============================================================================

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct CrawlStats {
    dispatched: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    stopped: AtomicUsize,
    groups_written: AtomicUsize,
}

impl CrawlStats {
    pub fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_stopped(&self) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_groups(&self, count: usize) {
        self.groups_written.fetch_add(count, Ordering::SeqCst);
    }

    // Copies the counters into a summary
    //
    // Parameters:
    //   enqueued: ids the search loop handed over
    //   peak_running: highest number of workers that ran at once
    pub fn summary(&self, enqueued: usize, peak_running: usize) -> CrawlSummary {
        CrawlSummary {
            enqueued,
            dispatched: self.dispatched.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            stopped: self.stopped.load(Ordering::SeqCst),
            groups_written: self.groups_written.load(Ordering::SeqCst),
            peak_running,
        }
    }
}

/// Final numbers for a crawl, printed by the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    pub enqueued: usize,
    pub dispatched: usize,
    pub completed: usize,
    pub failed: usize,
    pub stopped: usize,
    pub groups_written: usize,
    pub peak_running: usize,
}
