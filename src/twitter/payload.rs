// src/twitter/payload.rs
// =============================================================================
// Typed view of the JSON pages returned by the search and conversation
// endpoints.
//
// Both endpoints share the same layout:
//
//   {
//     "globalObjects": { "tweets": { "<id>": { "full_text": "..." } } },
//     "timeline": {
//       "instructions": [
//         { "addEntries":   { "entries": [ <entry>, ... ] } },
//         { "replaceEntry": { "entry": <entry> } }
//       ]
//     }
//   }
//
// and each entry's "content" holds exactly one of:
//   - "item":           a single tweet (or a bare cursor)
//   - "timelineModule": a group of tweets, possibly ending in a cursor
//   - "operation":      a cursor for the next page
//
// Fields we don't care about are ignored by serde. Fields that are missing get
// defaults so a sparse page still parses; only a page that isn't this shape at
// all is rejected.
// =============================================================================

use serde::Deserialize;
use std::collections::HashMap;

use crate::error::CrawlError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPage {
    #[serde(rename = "globalObjects", default)]
    pub global_objects: GlobalObjects,
    #[serde(default)]
    pub timeline: Timeline,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalObjects {
    #[serde(default)]
    pub tweets: HashMap<String, RawTweet>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTweet {
    pub full_text: Option<String>,
    pub text: Option<String>,
}

impl RawTweet {
    /// Extended text when present, otherwise the short form
    pub fn body(&self) -> Option<&str> {
        self.full_text.as_deref().or(self.text.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Instruction {
    #[serde(rename = "addEntries")]
    pub add_entries: Option<AddEntries>,
    #[serde(rename = "replaceEntry")]
    pub replace_entry: Option<ReplaceEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddEntries {
    #[serde(default)]
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceEntry {
    pub entry: Entry,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    #[serde(rename = "entryId", default)]
    pub entry_id: String,
    #[serde(default)]
    pub content: EntryContent,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryContent {
    pub item: Option<ItemWrapper>,
    #[serde(rename = "timelineModule")]
    pub timeline_module: Option<TimelineModule>,
    pub operation: Option<Operation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemWrapper {
    #[serde(default)]
    pub content: ItemContent,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemContent {
    pub tweet: Option<TweetRef>,
    #[serde(rename = "timelineCursor")]
    pub timeline_cursor: Option<CursorValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TweetRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimelineModule {
    #[serde(default)]
    pub items: Vec<ModuleItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleItem {
    #[serde(default)]
    pub item: ItemWrapper,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    pub cursor: CursorValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CursorValue {
    pub value: String,
    #[serde(rename = "cursorType")]
    pub cursor_type: Option<String>,
}

impl RawPage {
    // Parses a response body into a page
    //
    // Returns: PayloadShape error if the body isn't a page at all
    pub fn from_json(body: &str) -> Result<Self, CrawlError> {
        serde_json::from_str(body).map_err(|e| CrawlError::PayloadShape(e.to_string()))
    }

    /// Every entry on the page, in instruction order
    ///
    /// `addEntries` entries come first within their instruction; a
    /// `replaceEntry` contributes its single entry.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.timeline.instructions.iter().flat_map(|instruction| {
            let added = instruction
                .add_entries
                .iter()
                .flat_map(|add| add.entries.iter());
            let replaced = instruction.replace_entry.iter().map(|r| &r.entry);
            added.chain(replaced)
        })
    }
}
