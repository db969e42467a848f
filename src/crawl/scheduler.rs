// src/crawl/scheduler.rs
// =============================================================================
// Moves identifiers from the WorkQueue to worker tasks.
//
// Every tick the scheduler:
// 1. Claims as many queued ids as the registry has room for and spawns a
//    worker for each (the worker owns the RunningGuard for its id)
// 2. Checks whether the crawl is over: search finished, nothing queued and
//    nothing running
// 3. Waits for the next tick, a worker to finish, or cancellation
//
// The capacity invariant lives in RunningRegistry::claim_next, not here: the
// scheduler just keeps asking until the answer is Full or Empty.
//
// Rust concepts:
// - JoinSet: owns every spawned worker so we can await them all at the end
// - tokio::select!: wait on several futures, act on whichever finishes first
// - now_or_never (futures): poll a future once, without waiting
// =============================================================================

use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info};

use super::queue::{Claim, RunningRegistry, WorkQueue};
use super::worker::{self, WorkerContext};

/// How often the scheduler re-checks the queue when nothing else wakes it
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(25);

pub struct DownloadScheduler {
    queue: Arc<WorkQueue>,
    registry: Arc<RunningRegistry>,
    context: Arc<WorkerContext>,
    workers: JoinSet<()>,
    poll_interval: Duration,
}

impl DownloadScheduler {
    pub fn new(
        queue: Arc<WorkQueue>,
        registry: Arc<RunningRegistry>,
        context: Arc<WorkerContext>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            registry,
            context,
            workers: JoinSet::new(),
            poll_interval,
        }
    }

    // Spawns workers until the registry is full or the queue is empty
    //
    // Returns: how many workers were started
    fn dispatch_ready(&mut self) -> usize {
        let mut started = 0;
        let mut deferred = 0;

        loop {
            match self.registry.claim_next(&self.queue) {
                Claim::Started(guard) => {
                    debug!(id = %guard.id(), running = self.registry.len(), "Dispatching worker");
                    self.context.stats.record_dispatched();
                    self.workers.spawn(worker::download(self.context.clone(), guard));
                    started += 1;
                }
                Claim::Deferred(id) => {
                    debug!(id = %id, "Same id still running, deferred");
                    // Every queued id is a duplicate of a running one
                    deferred += 1;
                    if deferred >= self.queue.len() {
                        break;
                    }
                }
                Claim::Full | Claim::Empty => break,
            }
        }

        started
    }

    // Collects workers that have already finished, without waiting
    fn reap_finished(&mut self) {
        while let Some(Some(result)) = self.workers.join_next().now_or_never() {
            log_join(result);
        }
    }

    // The search flag is read first: once it is set, every id the search will
    // ever push is already in the queue.
    fn is_done(&self) -> bool {
        self.queue.is_search_done() && self.queue.is_empty() && self.registry.is_empty()
    }

    pub async fn run(mut self) {
        let cancel = self.context.cancel.clone();

        loop {
            if cancel.is_cancelled() {
                info!(running = self.registry.len(), "Scheduler stopping");
                break;
            }

            self.reap_finished();
            self.dispatch_ready();

            if self.is_done() {
                info!("All tasks have been completed.");
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => {}
                Some(result) = self.workers.join_next(), if !self.workers.is_empty() => {
                    log_join(result);
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        // Workers see the same token and stop at their next checkpoint
        while let Some(result) = self.workers.join_next().await {
            log_join(result);
        }
        debug!("Scheduler finished");
    }
}

fn log_join(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!(error = %e, "A download worker panicked");
        } else {
            debug!(error = %e, "A download worker was cancelled");
        }
    }
}
