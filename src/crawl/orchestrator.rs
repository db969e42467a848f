// src/crawl/orchestrator.rs
// =============================================================================
// Wires the pieces together and owns the crawl's lifecycle.
//
//   start()  force-refresh tokens, run one search round right away so the
//            queue isn't empty when downloads begin, then spawn the search
//            loop and the scheduler as two tasks
//   wait()   await both tasks and return the final summary
//   stop()   cancel, then wait; workers finish their current request and
//            exit without writing anything more
//
// The Crawler never talks to the network or the disk itself. It gets a
// Transport and a Storage, which is what lets the tests run a whole crawl
// against scripted pages and an in-memory store.
// =============================================================================

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::credentials::CredentialManager;
use super::queue::{RunningRegistry, WorkQueue};
use super::scheduler::{DownloadScheduler, DEFAULT_POLL_INTERVAL};
use super::search::{SearchLimits, SearchLoop, SearchPager};
use super::stats::{CrawlStats, CrawlSummary};
use super::worker::{WorkerContext, WorkerSettings};
use crate::config::CrawlConfig;
use crate::storage::Storage;
use crate::twitter::Transport;

pub struct Crawler {
    config: CrawlConfig,
    transport: Arc<dyn Transport>,
    storage: Arc<dyn Storage>,
    credentials: Arc<CredentialManager>,
    queue: Arc<WorkQueue>,
    registry: Arc<RunningRegistry>,
    stats: Arc<CrawlStats>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Crawler {
    pub fn new(config: CrawlConfig, transport: Arc<dyn Transport>, storage: Arc<dyn Storage>) -> Self {
        let credentials = Arc::new(CredentialManager::new(
            transport.clone(),
            config.token_refresh_interval,
        ));
        let registry = RunningRegistry::new(config.max_thread);

        Self {
            config,
            transport,
            storage,
            credentials,
            queue: Arc::new(WorkQueue::new()),
            registry,
            stats: Arc::new(CrawlStats::default()),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    // Starts the crawl in the background
    //
    // Token and bootstrap failures are logged, not returned: the search loop
    // retries them on its own schedule.
    pub async fn start(&mut self) {
        if !self.tasks.is_empty() {
            warn!("Crawler already started");
            return;
        }

        info!(
            keyword = %self.config.keyword,
            max_result = %self.config.max_result,
            max_thread = self.config.max_thread,
            "Starting crawl"
        );

        if let Err(e) = self.credentials.refresh(true).await {
            warn!(error = %e, "Initial token refresh failed, will retry");
        }

        let mut search = SearchLoop::new(
            SearchPager::new(&self.config.keyword, self.transport.clone(), self.config.dedupe),
            self.credentials.clone(),
            self.queue.clone(),
            SearchLimits {
                max_result: self.config.max_result,
                max_thread: self.config.max_thread,
                sleep: self.config.sleep,
            },
            self.cancel.clone(),
        );
        if let Err(e) = search.fetch_round().await {
            warn!(error = %e, "Initial search round failed, will retry");
        }

        let context = Arc::new(WorkerContext {
            transport: self.transport.clone(),
            storage: self.storage.clone(),
            credentials: self.credentials.clone(),
            stats: self.stats.clone(),
            settings: WorkerSettings {
                group_cap: self.config.timeline_length,
                max_groups: self.config.max_timelines,
                sleep: self.config.sleep,
                max_retries: self.config.max_retries,
            },
            cancel: self.cancel.clone(),
        });
        let scheduler = DownloadScheduler::new(
            self.queue.clone(),
            self.registry.clone(),
            context,
            DEFAULT_POLL_INTERVAL,
        );

        self.tasks.push(tokio::spawn(search.run()));
        self.tasks.push(tokio::spawn(scheduler.run()));
    }

    // Waits until the search loop and the scheduler (and so every worker)
    // have finished
    //
    // Safe to drop half-way (e.g. inside tokio::select!): a handle is only
    // removed once its task has been joined, so stop() can await the rest.
    //
    // Returns: the final numbers for this crawl
    pub async fn wait(&mut self) -> CrawlSummary {
        while let Some(handle) = self.tasks.first_mut() {
            let result = handle.await;
            self.tasks.remove(0);
            if let Err(e) = result {
                error!(error = %e, "Crawl task ended abnormally");
            }
        }

        let summary = self.summary();
        info!(
            completed = summary.completed,
            failed = summary.failed,
            stopped = summary.stopped,
            "Crawl finished"
        );
        summary
    }

    // Cancels the crawl and waits for everything to wind down
    pub async fn stop(&mut self) -> CrawlSummary {
        info!("Stopping crawl");
        self.cancel.cancel();
        self.wait().await
    }

    /// Numbers so far
    pub fn summary(&self) -> CrawlSummary {
        self.stats
            .summary(self.queue.total_enqueued(), self.registry.peak())
    }
}
