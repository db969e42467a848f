// src/crawl/search.rs
// =============================================================================
// Discovers tweet ids for the keyword.
//
// SearchPager walks the search endpoint page by page. Every page has:
// - item entries, each holding one tweet id
// - cursor entries: "scroll:..." points at the next (older) page,
//   "refresh:..." at newer results (we only remember it)
//
// SearchLoop drives the pager on a timer and feeds ids into the WorkQueue
// until max_result ids have been enqueued, the results run out, or the crawl
// is cancelled.
//
// Duplicates: the endpoint can return the same id on two pages. By default
// we pass it through like any other id (the scheduler makes sure two workers
// never run on it at once). With `dedupe` enabled the pager keeps a seen-set
// and drops repeats before they count against max_result.
// =============================================================================

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::credentials::CredentialManager;
use super::queue::WorkQueue;
use crate::error::Result;
use crate::limit::Cap;
use crate::twitter::payload::{CursorValue, RawPage};
use crate::twitter::{CredentialSet, Transport};

const SCROLL_PREFIX: &str = "scroll:";
const REFRESH_PREFIX: &str = "refresh:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorKind {
    Scroll,
    Refresh,
}

// Works out which way a search cursor points.
// The value prefix is what the web client relies on; cursorType is a fallback.
fn cursor_kind(cursor: &CursorValue) -> Option<CursorKind> {
    if cursor.value.starts_with(SCROLL_PREFIX) {
        return Some(CursorKind::Scroll);
    }
    if cursor.value.starts_with(REFRESH_PREFIX) {
        return Some(CursorKind::Refresh);
    }
    match cursor.cursor_type.as_deref() {
        Some("Bottom") => Some(CursorKind::Scroll),
        Some("Top") => Some(CursorKind::Refresh),
        _ => None,
    }
}

/// What one search page contained
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SearchBatch {
    pub ids: Vec<String>,
    pub scroll_cursor: Option<String>,
    pub refresh_cursor: Option<String>,
}

// Pulls tweet ids and cursors out of one search page, in page order
pub fn parse_search_page(page: &RawPage) -> SearchBatch {
    let mut batch = SearchBatch::default();

    for entry in page.entries() {
        let content = &entry.content;

        let cursor = if let Some(item) = &content.item {
            if let Some(tweet) = &item.content.tweet {
                batch.ids.push(tweet.id.clone());
                continue;
            }
            item.content.timeline_cursor.as_ref()
        } else {
            content.operation.as_ref().map(|op| &op.cursor)
        };

        match cursor.and_then(|c| cursor_kind(c).map(|kind| (kind, c))) {
            Some((CursorKind::Scroll, c)) => batch.scroll_cursor = Some(c.value.clone()),
            Some((CursorKind::Refresh, c)) => batch.refresh_cursor = Some(c.value.clone()),
            None => debug!(entry = %entry.entry_id, "Skipping search entry"),
        }
    }

    batch
}

pub struct SearchPager {
    keyword: String,
    transport: Arc<dyn Transport>,
    next_cursor: Option<String>,
    previous_cursor: Option<String>,
    discovered: usize,
    exhausted: bool,
    seen: Option<HashSet<String>>,
}

impl SearchPager {
    // Parameters:
    //   keyword: what to search for
    //   transport: where pages come from
    //   dedupe: drop ids this pager already returned
    pub fn new(keyword: &str, transport: Arc<dyn Transport>, dedupe: bool) -> Self {
        Self {
            keyword: keyword.to_string(),
            transport,
            next_cursor: None,
            previous_cursor: None,
            discovered: 0,
            exhausted: false,
            seen: dedupe.then(HashSet::new),
        }
    }

    // Fetches the next search page and returns its ids in page order
    //
    // The scroll cursor only ever moves forward. A page without one, or one
    // that hands back the cursor we just used, means there are no more
    // results and the pager is exhausted.
    pub async fn next_batch(&mut self, credentials: &CredentialSet) -> Result<Vec<String>> {
        let page = self
            .transport
            .search_page(&self.keyword, credentials, self.next_cursor.as_deref())
            .await?;
        let batch = parse_search_page(&page);

        match batch.scroll_cursor {
            Some(cursor) if self.next_cursor.as_ref() != Some(&cursor) => {
                self.next_cursor = Some(cursor);
            }
            _ => {
                info!(keyword = %self.keyword, "No further search results");
                self.exhausted = true;
            }
        }
        if batch.refresh_cursor.is_some() {
            self.previous_cursor = batch.refresh_cursor;
        }

        let ids = match self.seen.as_mut() {
            Some(seen) => batch
                .ids
                .into_iter()
                .filter(|id| seen.insert(id.clone()))
                .collect(),
            None => batch.ids,
        };

        self.discovered += ids.len();
        Ok(ids)
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn discovered(&self) -> usize {
        self.discovered
    }

    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    pub fn previous_cursor(&self) -> Option<&str> {
        self.previous_cursor.as_deref()
    }
}

/// Settings the search loop needs from the crawl configuration
#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub max_result: Cap,
    pub max_thread: usize,
    pub sleep: Duration,
}

pub struct SearchLoop {
    pager: SearchPager,
    credentials: Arc<CredentialManager>,
    queue: Arc<WorkQueue>,
    limits: SearchLimits,
    cancel: CancellationToken,
}

impl SearchLoop {
    pub fn new(
        pager: SearchPager,
        credentials: Arc<CredentialManager>,
        queue: Arc<WorkQueue>,
        limits: SearchLimits,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            pager,
            credentials,
            queue,
            limits,
            cancel,
        }
    }

    fn is_finished(&self) -> bool {
        self.limits.max_result.is_reached(self.queue.total_enqueued()) || self.pager.is_exhausted()
    }

    // One search round: refresh tokens, fetch a page, trim to max_result and
    // enqueue.
    //
    // The round is skipped while more than max_thread ids are already waiting,
    // so search never runs far ahead of the downloads.
    //
    // Returns: how many ids were enqueued
    pub async fn fetch_round(&mut self) -> Result<usize> {
        if self.is_finished() || self.queue.len() > self.limits.max_thread {
            return Ok(0);
        }

        let credentials = self.credentials.refresh(false).await?;
        let mut ids = self.pager.next_batch(&credentials).await?;
        self.limits
            .max_result
            .truncate_after(self.queue.total_enqueued(), &mut ids);

        let count = ids.len();
        self.queue.push_batch(ids);
        info!(
            count,
            total = self.queue.total_enqueued(),
            cursor = self.pager.next_cursor().unwrap_or(""),
            "Fetched search results"
        );
        Ok(count)
    }

    // Runs rounds until max_result is reached, results run out, or the crawl
    // is cancelled. Always marks the search as done on the way out so the
    // scheduler can finish.
    pub async fn run(mut self) {
        loop {
            if self.cancel.is_cancelled() {
                debug!("Search loop cancelled");
                break;
            }
            if self.limits.max_result.is_reached(self.queue.total_enqueued()) {
                info!("Reached max_result. Stop searching.");
                break;
            }
            if self.pager.is_exhausted() {
                break;
            }

            if let Err(e) = self.fetch_round().await {
                warn!(error = %e, "Search round failed, retrying next round");
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {}
                _ = tokio::time::sleep(self.limits.sleep) => {}
            }
        }

        info!(
            discovered = self.pager.discovered(),
            enqueued = self.queue.total_enqueued(),
            previous_cursor = self.pager.previous_cursor().unwrap_or(""),
            "Search finished"
        );
        self.queue.mark_search_done();
    }
}
