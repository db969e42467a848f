// src/testing.rs
// =============================================================================
// Test helpers shared by every module's tests (compiled only for `cargo test`).
//
// - ScriptedTransport: a Transport that serves pages from a script instead of
//   the network, counts calls, can be told to fail, and tracks how many
//   conversation requests are in flight at once
// - *_entry / *_page builders: small JSON fragments in the API's page shape
// =============================================================================

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{CrawlError, Result};
use crate::twitter::payload::RawPage;
use crate::twitter::{CredentialSet, Transport};

type PageKey = (String, Option<String>);

#[derive(Default)]
pub struct ScriptedTransport {
    credential_calls: AtomicUsize,
    fail_credentials: AtomicBool,

    search_pages: Mutex<HashMap<Option<String>, RawPage>>,
    search_calls: AtomicUsize,

    item_pages: Mutex<HashMap<PageKey, RawPage>>,
    item_failures: Mutex<HashMap<PageKey, VecDeque<CrawlError>>>,
    item_calls: Mutex<HashMap<String, usize>>,
    item_delay: Mutex<Duration>,

    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    running_ids: Mutex<HashSet<String>>,
    overlapped: AtomicBool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fixed, freshly issued credential set
    pub fn credentials(&self) -> CredentialSet {
        CredentialSet {
            access_token: "AAAAAAAAAAAAAAAAAAAAAtest".to_string(),
            csrf_token: "0123456789abcdef0123456789abcdef".to_string(),
            guest_token: "1234567890".to_string(),
            issued_at: Instant::now(),
        }
    }

    pub fn credential_calls(&self) -> usize {
        self.credential_calls.load(Ordering::SeqCst)
    }

    pub fn fail_credentials(&self, fail: bool) {
        self.fail_credentials.store(fail, Ordering::SeqCst);
    }

    // Search pages are keyed by the cursor they're requested with; an
    // unscripted cursor gets an empty page (which ends the search).
    pub fn add_search_page(&self, cursor: Option<&str>, page: RawPage) {
        self.search_pages
            .lock()
            .unwrap()
            .insert(cursor.map(String::from), page);
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    // An unscripted first page holds just the tweet itself, with text
    // "text of <id>"; an unscripted cursor gets an empty page.
    pub fn add_item_page(&self, id: &str, cursor: Option<&str>, page: RawPage) {
        self.item_pages
            .lock()
            .unwrap()
            .insert(key(id, cursor), page);
    }

    /// The next `times` requests for this page fail with a transport error
    pub fn fail_item_page(&self, id: &str, cursor: Option<&str>, times: usize) {
        for _ in 0..times {
            self.fail_item_page_with(
                id,
                cursor,
                CrawlError::Transport {
                    status: Some(503),
                    message: "scripted failure".to_string(),
                },
            );
        }
    }

    /// The next request for this page fails with `error`
    pub fn fail_item_page_with(&self, id: &str, cursor: Option<&str>, error: CrawlError) {
        self.item_failures
            .lock()
            .unwrap()
            .entry(key(id, cursor))
            .or_default()
            .push_back(error);
    }

    /// Every conversation request made for `id`, failed ones included
    pub fn item_calls(&self, id: &str) -> usize {
        self.item_calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    /// Makes every conversation request take at least `delay`
    pub fn set_item_delay(&self, delay: Duration) {
        *self.item_delay.lock().unwrap() = delay;
    }

    /// Most conversation requests that were ever in flight at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Whether two requests for the same id were ever in flight together
    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }

    fn enter(&self, id: &str) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.running_ids.lock().unwrap().insert(id.to_string()) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
    }

    fn leave(&self, id: &str) {
        self.running_ids.lock().unwrap().remove(id);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn scripted_item_page(&self, id: &str, cursor: Option<&str>) -> Result<RawPage> {
        let page_key = key(id, cursor);

        if let Some(error) = self
            .item_failures
            .lock()
            .unwrap()
            .get_mut(&page_key)
            .and_then(|queue| queue.pop_front())
        {
            return Err(error);
        }

        if let Some(page) = self.item_pages.lock().unwrap().get(&page_key) {
            return Ok(page.clone());
        }

        Ok(match cursor {
            None => {
                let text = format!("text of {}", id);
                conversation_page(&[(id, text.as_str())], vec![tweet_entry(id)])
            }
            Some(_) => RawPage::default(),
        })
    }
}

fn key(id: &str, cursor: Option<&str>) -> PageKey {
    (id.to_string(), cursor.map(String::from))
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn acquire_credentials(&self) -> Result<CredentialSet> {
        self.credential_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_credentials.load(Ordering::SeqCst) {
            return Err(CrawlError::CredentialFetch("scripted failure".to_string()));
        }
        Ok(self.credentials())
    }

    async fn search_page(
        &self,
        _keyword: &str,
        _credentials: &CredentialSet,
        cursor: Option<&str>,
    ) -> Result<RawPage> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let pages = self.search_pages.lock().unwrap();
        Ok(pages
            .get(&cursor.map(String::from))
            .cloned()
            .unwrap_or_default())
    }

    async fn item_page(
        &self,
        id: &str,
        _credentials: &CredentialSet,
        cursor: Option<&str>,
    ) -> Result<RawPage> {
        *self
            .item_calls
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default() += 1;

        self.enter(id);
        let delay = *self.item_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let result = self.scripted_item_page(id, cursor);
        self.leave(id);

        result
    }
}

// -----------------------------------------------------------------------------
// Page builders
// -----------------------------------------------------------------------------

/// An entry holding a single tweet
pub fn tweet_entry(id: &str) -> Value {
    json!({
        "entryId": format!("tweet-{}", id),
        "content": { "item": { "content": { "tweet": { "id": id } } } }
    })
}

/// A timeline module with these tweets, optionally ending in an inner cursor
pub fn module_entry(ids: &[&str], inner_cursor: Option<&str>) -> Value {
    let mut items: Vec<Value> = ids
        .iter()
        .map(|id| json!({ "item": { "content": { "tweet": { "id": id } } } }))
        .collect();
    if let Some(cursor) = inner_cursor {
        items.push(json!({
            "item": {
                "content": {
                    "timelineCursor": { "value": cursor, "cursorType": "ShowMoreThreads" }
                }
            }
        }));
    }

    json!({
        "entryId": format!("conversationThread-{}", ids.first().copied().unwrap_or("empty")),
        "content": { "timelineModule": { "items": items } }
    })
}

/// A top-level "more threads" cursor entry
pub fn operation_entry(cursor: &str) -> Value {
    json!({
        "entryId": "cursor-bottom",
        "content": { "operation": { "cursor": { "value": cursor, "cursorType": "Bottom" } } }
    })
}

fn page(texts: &[(&str, &str)], entries: Vec<Value>) -> RawPage {
    let tweets: serde_json::Map<String, Value> = texts
        .iter()
        .map(|(id, text)| (id.to_string(), json!({ "full_text": text })))
        .collect();

    let body = json!({
        "globalObjects": { "tweets": tweets },
        "timeline": { "instructions": [ { "addEntries": { "entries": entries } } ] }
    });
    serde_json::from_value(body).unwrap()
}

/// A conversation page with these tweet texts and entries
pub fn conversation_page(texts: &[(&str, &str)], entries: Vec<Value>) -> RawPage {
    page(texts, entries)
}

/// A search page listing `ids`, with optional scroll and refresh cursors
pub fn search_page(ids: &[&str], scroll: Option<&str>, refresh: Option<&str>) -> RawPage {
    let texts: Vec<(&str, &str)> = ids.iter().map(|id| (*id, "search hit")).collect();
    let mut entries: Vec<Value> = ids.iter().map(|id| tweet_entry(id)).collect();

    if let Some(cursor) = refresh {
        entries.push(json!({
            "entryId": "sq-cursor-top",
            "content": { "operation": { "cursor": { "value": cursor, "cursorType": "Top" } } }
        }));
    }
    if let Some(cursor) = scroll {
        entries.push(json!({
            "entryId": "sq-cursor-bottom",
            "content": { "operation": { "cursor": { "value": cursor, "cursorType": "Bottom" } } }
        }));
    }

    page(&texts, entries)
}
