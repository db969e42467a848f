// src/crawl/worker.rs
// =============================================================================
// The per-tweet download task.
//
// What a worker does:
// 1. Fetch the first conversation page and save the record
// 2. Keep fetching the next batch of timeline groups and append them,
//    sleeping between rounds, until the conversation runs out or max_groups
//    groups have been written
// 3. Give its registry slot back (by dropping the RunningGuard)
//
// A failed page is retried on the next round, up to max_retries failures in a
// row; after that the worker gives up on this tweet. Nothing a worker does can
// fail the scheduler or another worker: all errors end here, in a log line
// and a counter.
//
// After the crawl is cancelled a worker never touches storage again.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::conversation::ConversationPager;
use super::credentials::CredentialManager;
use super::queue::RunningGuard;
use super::record::ItemRecord;
use super::stats::CrawlStats;
use crate::error::{CrawlError, Result};
use crate::limit::Cap;
use crate::storage::Storage;
use crate::twitter::Transport;

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    /// Maximum replies kept per timeline group
    pub group_cap: Cap,
    /// Maximum timeline groups written per tweet
    pub max_groups: Cap,
    pub sleep: Duration,
    pub max_retries: usize,
}

/// Everything a worker shares with the rest of the crawl
pub struct WorkerContext {
    pub transport: Arc<dyn Transport>,
    pub storage: Arc<dyn Storage>,
    pub credentials: Arc<CredentialManager>,
    pub stats: Arc<CrawlStats>,
    pub settings: WorkerSettings,
    pub cancel: CancellationToken,
}

impl WorkerContext {
    fn ensure_running(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(CrawlError::Cancelled)
        } else {
            Ok(())
        }
    }

    // Sleeps between rounds; wakes early and returns Cancelled on stop
    async fn pause(&self) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(CrawlError::Cancelled),
            _ = tokio::time::sleep(self.settings.sleep) => Ok(()),
        }
    }

    // Decides whether a failed round should be retried
    //
    // Returns: Ok(()) to retry, Err(e) to give up on this tweet
    fn check_retry(&self, id: &str, error: CrawlError, failures: &mut usize) -> Result<()> {
        if !error.is_retryable() || *failures >= self.settings.max_retries {
            return Err(error);
        }
        *failures += 1;
        warn!(id = %id, attempt = *failures, error = %error, "Page fetch failed, retrying next round");
        Ok(())
    }
}

// Downloads one tweet and its replies, then releases its registry slot
pub async fn download(context: Arc<WorkerContext>, guard: RunningGuard) {
    let id = guard.id().to_string();
    info!(id = %id, "Start download tweet");

    match crawl_conversation(&context, &id).await {
        Ok(groups) => {
            context.stats.record_completed();
            info!(id = %id, groups, "Tweet finished");
        }
        Err(CrawlError::Cancelled) => {
            context.stats.record_stopped();
            info!(id = %id, "Tweet download stopped");
        }
        Err(e) => {
            context.stats.record_failed();
            error!(id = %id, error = %e, "Giving up on tweet");
        }
    }

    drop(guard);
}

// Fetches the first page, retrying failed rounds
async fn open_conversation(context: &WorkerContext, id: &str) -> Result<(ConversationPager, ItemRecord)> {
    let mut failures = 0;
    loop {
        context.ensure_running()?;

        let attempt = match context.credentials.refresh(false).await {
            Ok(credentials) => {
                ConversationPager::fetch_first_page(
                    id,
                    context.transport.clone(),
                    context.cancel.clone(),
                    &credentials,
                    context.settings.group_cap,
                )
                .await
            }
            Err(e) => Err(e),
        };

        match attempt {
            Ok(opened) => return Ok(opened),
            Err(e) => {
                context.check_retry(id, e, &mut failures)?;
                context.pause().await?;
            }
        }
    }
}

// The worker body
//
// Returns: how many timeline groups were written for this tweet
async fn crawl_conversation(context: &WorkerContext, id: &str) -> Result<usize> {
    let settings = context.settings;

    let (mut pager, mut record) = open_conversation(context, id).await?;
    settings.max_groups.truncate(&mut record.timelines);

    context.ensure_running()?;
    context.storage.save_item(&record).await?;
    let mut written = record.timelines.len();
    context.stats.record_groups(written);

    let mut failures = 0;
    loop {
        context.ensure_running()?;
        if settings.max_groups.is_reached(written) || !pager.has_next() {
            break;
        }

        let round = match context.credentials.refresh(false).await {
            Ok(credentials) => pager.fetch_next_page(&credentials, settings.group_cap).await,
            Err(e) => Err(e),
        };

        match round {
            Ok(Some(mut groups)) => {
                failures = 0;
                settings.max_groups.truncate_after(written, &mut groups);
                if !groups.is_empty() {
                    context.ensure_running()?;
                    context.storage.append_groups(id, &groups).await?;
                    written += groups.len();
                    context.stats.record_groups(groups.len());
                }
            }
            Ok(None) => break,
            Err(e) => context.check_retry(id, e, &mut failures)?,
        }

        context.pause().await?;
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::queue::{Claim, RunningRegistry, WorkQueue};
    use crate::storage::memory::MemoryStorage;
    use crate::testing::{conversation_page, module_entry, operation_entry, tweet_entry, ScriptedTransport};

    fn context(
        transport: &Arc<ScriptedTransport>,
        storage: &Arc<MemoryStorage>,
        settings: WorkerSettings,
    ) -> Arc<WorkerContext> {
        Arc::new(WorkerContext {
            transport: transport.clone(),
            storage: storage.clone(),
            credentials: Arc::new(CredentialManager::new(transport.clone(), Duration::from_secs(300))),
            stats: Arc::new(CrawlStats::default()),
            settings,
            cancel: CancellationToken::new(),
        })
    }

    fn settings(max_groups: Cap) -> WorkerSettings {
        WorkerSettings {
            group_cap: Cap::Unbounded,
            max_groups,
            sleep: Duration::from_millis(1),
            max_retries: 2,
        }
    }

    fn claim(id: &str) -> (Arc<RunningRegistry>, RunningGuard) {
        let queue = WorkQueue::new();
        queue.push_batch(vec![id.to_string()]);
        let registry = RunningRegistry::new(1);
        match registry.claim_next(&queue) {
            Claim::Started(guard) => (registry, guard),
            other => panic!("expected a slot, got {:?}", other),
        }
    }

    // Tweet 100: two groups on the first page, one more on page 2, two on page 3
    fn script_three_pages(transport: &ScriptedTransport) {
        transport.add_item_page(
            "100",
            None,
            conversation_page(
                &[("100", "root"), ("1", "a"), ("2", "b")],
                vec![tweet_entry("100"), module_entry(&["1"], None), module_entry(&["2"], None), operation_entry("p2")],
            ),
        );
        transport.add_item_page(
            "100",
            Some("p2"),
            conversation_page(&[("3", "c")], vec![module_entry(&["3"], None), operation_entry("p3")]),
        );
        transport.add_item_page(
            "100",
            Some("p3"),
            conversation_page(&[("4", "d"), ("5", "e")], vec![module_entry(&["4"], None), module_entry(&["5"], None)]),
        );
    }

    #[tokio::test]
    async fn test_download_saves_then_appends() {
        let transport = Arc::new(ScriptedTransport::new());
        script_three_pages(&transport);
        let storage = Arc::new(MemoryStorage::new());
        let ctx = context(&transport, &storage, settings(Cap::Unbounded));
        let (registry, guard) = claim("100");

        download(ctx.clone(), guard).await;

        let record = storage.record("100").unwrap();
        assert_eq!(record.primary_text, "root");
        assert_eq!(record.timelines, vec![vec!["a"], vec!["b"], vec!["c"], vec!["d"], vec!["e"]]);
        assert_eq!(storage.writes(), vec!["100", "100", "100"]);
        assert!(registry.is_empty());
        assert_eq!(ctx.stats.summary(1, 1).completed, 1);
    }

    #[tokio::test]
    async fn test_max_groups_caps_written_groups() {
        let transport = Arc::new(ScriptedTransport::new());
        script_three_pages(&transport);
        let storage = Arc::new(MemoryStorage::new());
        let ctx = context(&transport, &storage, settings(Cap::AtMost(3)));
        let (_registry, guard) = claim("100");

        download(ctx, guard).await;

        let record = storage.record("100").unwrap();
        assert_eq!(record.timelines, vec![vec!["a"], vec!["b"], vec!["c"]]);
        // Page 3 was never requested once the cap was hit
        assert_eq!(transport.item_calls("100"), 2);
    }

    #[tokio::test]
    async fn test_first_batch_trimmed_to_max_groups() {
        let transport = Arc::new(ScriptedTransport::new());
        script_three_pages(&transport);
        let storage = Arc::new(MemoryStorage::new());
        let ctx = context(&transport, &storage, settings(Cap::AtMost(1)));
        let (_registry, guard) = claim("100");

        download(ctx, guard).await;

        assert_eq!(storage.record("100").unwrap().timelines, vec![vec!["a"]]);
        assert_eq!(storage.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        script_three_pages(&transport);
        transport.fail_item_page("100", None, 1);
        transport.fail_item_page("100", Some("p2"), 2);
        let storage = Arc::new(MemoryStorage::new());
        let ctx = context(&transport, &storage, settings(Cap::Unbounded));
        let (_registry, guard) = claim("100");

        download(ctx.clone(), guard).await;

        assert_eq!(storage.record("100").unwrap().timelines.len(), 5);
        assert_eq!(ctx.stats.summary(1, 1).completed, 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.fail_item_page("100", None, 10);
        let storage = Arc::new(MemoryStorage::new());
        let ctx = context(&transport, &storage, settings(Cap::Unbounded));
        let (registry, guard) = claim("100");

        download(ctx.clone(), guard).await;

        // First attempt plus two retries
        assert_eq!(transport.item_calls("100"), 3);
        assert_eq!(storage.record_count(), 0);
        assert_eq!(ctx.stats.summary(1, 1).failed, 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_no_writes_after_cancel() {
        let transport = Arc::new(ScriptedTransport::new());
        script_three_pages(&transport);
        let storage = Arc::new(MemoryStorage::new());
        let ctx = context(&transport, &storage, settings(Cap::Unbounded));
        ctx.cancel.cancel();
        let (registry, guard) = claim("100");

        download(ctx.clone(), guard).await;

        assert!(storage.writes().is_empty());
        assert_eq!(transport.item_calls("100"), 0);
        assert_eq!(ctx.stats.summary(1, 1).stopped, 1);
        assert!(registry.is_empty());
    }
}
