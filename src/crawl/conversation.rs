// src/crawl/conversation.rs
// =============================================================================
// Walks the reply tree of one tweet.
//
// A conversation page is a list of entries. Each entry is one of:
//
//   1. the tweet itself          -> its text becomes the record's primary text
//   2. a timeline module         -> one thread of replies ("timeline group");
//                                   it may end in an INNER cursor, meaning the
//                                   thread has more replies than shown
//   3. an operation cursor       -> a TOP-LEVEL cursor, meaning there are more
//                                   threads after this page
//
// The two cursor kinds are plain strings; we only know which is which from
// where they appear on the page.
//
// For every module we follow its inner cursor right away, appending the new
// replies to the same group, until the thread ends or the group is as long as
// the group-length cap allows. The top-level cursor is kept, and the caller
// asks for the next batch of groups with fetch_next_page().
//
// Cancellation is checked before every request, so a stop request interrupts
// a long walk between pages instead of waiting for the whole tree.
//
// Cursors can come back around (A -> B -> A). Each walk remembers the cursors
// it has fetched and stops at the first one it has already seen.
// =============================================================================

use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::record::{ItemRecord, TimelineGroup};
use super::text_index::TextIndex;
use crate::error::{CrawlError, Result};
use crate::limit::Cap;
use crate::twitter::payload::{RawPage, TimelineModule};
use crate::twitter::{CredentialSet, Transport};

// A group as read off the page, before its inner cursor was followed
#[derive(Debug, Default, PartialEq, Eq)]
struct PendingGroup {
    texts: TimelineGroup,
    inner_cursor: Option<String>,
}

// Everything one page contributed
#[derive(Debug, Default)]
struct ParsedPage {
    primary_text: Option<String>,
    groups: Vec<PendingGroup>,
    top_cursor: Option<String>,
}

pub struct ConversationPager {
    id: String,
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
    index: TextIndex,
    cursor: Option<String>,
    // Top-level cursors already fetched
    fetched: HashSet<String>,
    exhausted: bool,
}

impl ConversationPager {
    // Fetches the first page of tweet `id` and starts a pager for the rest
    //
    // Parameters:
    //   id: the tweet to crawl
    //   transport: where pages come from
    //   cancel: checked before every request
    //   credentials: tokens for this round
    //   group_cap: maximum replies kept per timeline group
    //
    // Returns: the pager (holding the top-level cursor, if any) and the
    // record with the primary text and the first batch of groups
    pub async fn fetch_first_page(
        id: &str,
        transport: Arc<dyn Transport>,
        cancel: CancellationToken,
        credentials: &CredentialSet,
        group_cap: Cap,
    ) -> Result<(Self, ItemRecord)> {
        let mut pager = Self {
            id: id.to_string(),
            transport,
            cancel,
            index: TextIndex::new(),
            cursor: None,
            fetched: HashSet::new(),
            exhausted: false,
        };

        let page = pager.fetch(credentials, None).await?;
        let (primary_text, groups) = pager.process_page(&page, credentials, group_cap).await?;

        let primary_text = primary_text.unwrap_or_else(|| pager.index.resolve(&pager.id));
        let record = ItemRecord {
            id: pager.id.clone(),
            primary_text,
            timelines: groups,
        };

        Ok((pager, record))
    }

    // Fetches the next batch of groups at the held top-level cursor
    //
    // Returns:
    //   Ok(None) once there is no cursor left; it stays None from then on
    //   Ok(Some(groups)) otherwise (possibly empty)
    //   Err(..) if the page couldn't be fetched; the cursor is kept, so
    //   calling again retries the same page
    pub async fn fetch_next_page(
        &mut self,
        credentials: &CredentialSet,
        group_cap: Cap,
    ) -> Result<Option<Vec<TimelineGroup>>> {
        if self.exhausted {
            return Ok(None);
        }
        let cursor = match self.cursor.clone() {
            Some(cursor) => cursor,
            None => {
                self.exhausted = true;
                return Ok(None);
            }
        };

        let page = self.fetch(credentials, Some(&cursor)).await?;
        self.fetched.insert(cursor);
        let (_, groups) = self.process_page(&page, credentials, group_cap).await?;

        Ok(Some(groups))
    }

    /// Whether fetch_next_page() would fetch anything
    pub fn has_next(&self) -> bool {
        !self.exhausted && self.cursor.is_some()
    }

    async fn fetch(&self, credentials: &CredentialSet, cursor: Option<&str>) -> Result<RawPage> {
        if self.cancel.is_cancelled() {
            return Err(CrawlError::Cancelled);
        }
        debug!(id = %self.id, cursor = cursor.unwrap_or(""), "Fetching conversation page");
        self.transport.item_page(&self.id, credentials, cursor).await
    }

    // Parses a page, completes every group on it, then moves the top-level
    // cursor forward.
    //
    // A page whose top-level cursor was already fetched ends the walk.
    async fn process_page(
        &mut self,
        page: &RawPage,
        credentials: &CredentialSet,
        group_cap: Cap,
    ) -> Result<(Option<String>, Vec<TimelineGroup>)> {
        let parsed = self.parse_entries(page);

        let mut groups = Vec::with_capacity(parsed.groups.len());
        for pending in parsed.groups {
            groups.push(self.complete_group(pending, credentials, group_cap).await?);
        }

        self.cursor = parsed.top_cursor.filter(|next| {
            let repeated = self.fetched.contains(next);
            if repeated {
                debug!(id = %self.id, cursor = %next, "Top-level cursor repeated, ending walk");
            }
            !repeated
        });

        debug!(
            id = %self.id,
            groups = groups.len(),
            known_texts = self.index.len(),
            more = self.cursor.is_some(),
            "Conversation page parsed"
        );
        Ok((parsed.primary_text, groups))
    }

    // Reads the entries of one page (first or later) into a ParsedPage
    fn parse_entries(&mut self, page: &RawPage) -> ParsedPage {
        self.index.merge(&page.global_objects.tweets);
        let mut parsed = ParsedPage::default();

        for entry in page.entries() {
            let content = &entry.content;

            if let Some(item) = &content.item {
                if let Some(tweet) = &item.content.tweet {
                    if tweet.id == self.id {
                        parsed.primary_text = Some(self.index.resolve(&tweet.id));
                    } else {
                        debug!(id = %self.id, other = %tweet.id, "Skipping context tweet");
                    }
                } else if let Some(cursor) = &item.content.timeline_cursor {
                    parsed.top_cursor = Some(cursor.value.clone());
                }
            } else if let Some(module) = &content.timeline_module {
                parsed.groups.push(self.read_module(module));
            } else if let Some(operation) = &content.operation {
                // "Top" cursors point back up the thread, not at more replies
                if operation.cursor.cursor_type.as_deref() != Some("Top") {
                    parsed.top_cursor = Some(operation.cursor.value.clone());
                }
            } else {
                debug!(entry = %entry.entry_id, "Skipping unknown entry");
            }
        }

        parsed
    }

    // Resolves the tweets of one module into text, remembering its cursor
    fn read_module(&self, module: &TimelineModule) -> PendingGroup {
        let mut group = PendingGroup::default();
        for item in &module.items {
            let content = &item.item.content;
            if let Some(tweet) = &content.tweet {
                group.texts.push(self.index.resolve(&tweet.id));
            } else if let Some(cursor) = &content.timeline_cursor {
                group.inner_cursor = Some(cursor.value.clone());
            }
        }
        group
    }

    // Follows a group's inner cursor until the thread ends or the group has
    // reached the cap, then truncates to exactly the cap.
    //
    // A failed continuation request ends the group with what we have; the
    // rest of the page is still worth keeping. So does an inner cursor this
    // group has already fetched.
    async fn complete_group(
        &mut self,
        pending: PendingGroup,
        credentials: &CredentialSet,
        group_cap: Cap,
    ) -> Result<TimelineGroup> {
        let PendingGroup {
            mut texts,
            mut inner_cursor,
        } = pending;
        let mut followed = HashSet::new();

        while let Some(cursor) = inner_cursor.take() {
            if group_cap.is_reached(texts.len()) {
                break;
            }

            let page = match self.fetch(credentials, Some(&cursor)).await {
                Ok(page) => page,
                Err(CrawlError::Cancelled) => return Err(CrawlError::Cancelled),
                Err(e) => {
                    warn!(id = %self.id, cursor = %cursor, error = %e, "Thread continuation failed, keeping partial group");
                    break;
                }
            };

            followed.insert(cursor);
            inner_cursor = self.absorb_continuation(&mut texts, &page).filter(|next| {
                let repeated = followed.contains(next);
                if repeated {
                    debug!(id = %self.id, cursor = %next, "Thread cursor repeated, closing group");
                }
                !repeated
            });
        }

        group_cap.truncate(&mut texts);
        Ok(texts)
    }

    // Merges a continuation page into the index and appends its replies to
    // `group`.
    //
    // Returns: the next inner cursor, if the thread goes on
    fn absorb_continuation(&mut self, group: &mut TimelineGroup, page: &RawPage) -> Option<String> {
        self.index.merge(&page.global_objects.tweets);
        let mut next_cursor = None;

        for entry in page.entries() {
            let content = &entry.content;
            if let Some(module) = &content.timeline_module {
                let more = self.read_module(module);
                group.extend(more.texts);
                if more.inner_cursor.is_some() {
                    next_cursor = more.inner_cursor;
                }
            } else if let Some(tweet) = content.item.as_ref().and_then(|i| i.content.tweet.as_ref()) {
                if tweet.id != self.id {
                    group.push(self.index.resolve(&tweet.id));
                }
            }
        }

        next_cursor
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why a loop instead of recursion for inner cursors?
//    - A long thread can have many continuation pages
//    - `while let Some(cursor) = inner_cursor.take()` keeps one page in memory
//      at a time and makes the cap check an ordinary loop condition
//
// 2. Why is fetch_first_page a constructor?
//    - A pager without a first page has nothing to page through
//    - Returning (pager, record) means there is no "not started yet" state
//      to check in fetch_next_page
// -----------------------------------------------------------------------------
