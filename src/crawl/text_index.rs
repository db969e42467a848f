// src/crawl/text_index.rs
// =============================================================================
// Maps tweet ids to their text for one conversation crawl.
//
// Every page carries a "globalObjects.tweets" table next to its entries; the
// entries only reference tweets by id. We merge each page's table into this
// index and resolve ids against it. It only ever grows, and it is dropped
// together with the conversation it belongs to.
// =============================================================================

use std::collections::HashMap;

use crate::twitter::payload::RawTweet;

/// Text used when an entry references a tweet the page didn't include
pub const MISSING_TEXT: &str = "[unavailable]";

#[derive(Debug, Default)]
pub struct TextIndex {
    texts: HashMap<String, String>,
}

impl TextIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // Adds every tweet with a body from one page's tweet table.
    // Later pages overwrite earlier text for the same id.
    pub fn merge(&mut self, tweets: &HashMap<String, RawTweet>) {
        for (id, tweet) in tweets {
            if let Some(body) = tweet.body() {
                self.texts.insert(id.clone(), body.to_string());
            }
        }
    }

    /// Text for `id`, or [`MISSING_TEXT`] if we never saw it
    pub fn resolve(&self, id: &str) -> String {
        self.texts
            .get(id)
            .cloned()
            .unwrap_or_else(|| MISSING_TEXT.to_string())
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }
}
