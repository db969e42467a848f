// src/storage/mod.rs
// =============================================================================
// Where crawled records end up.
//
// The crawler only needs two operations:
// - save_item: write a fresh record after the first conversation page
// - append_groups: add more timeline groups to a record that already exists
//
// Submodules:
// - json: one pretty-printed JSON file per tweet (used by the CLI)
// - memory: in-memory store that records every write (tests only)
// =============================================================================

mod json;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;

use crate::crawl::{ItemRecord, TimelineGroup};
use crate::error::Result;

pub use json::JsonStorage;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Writes `record`, replacing any earlier record with the same id
    async fn save_item(&self, record: &ItemRecord) -> Result<()>;

    /// Appends `groups` to the stored record `id`
    ///
    /// Fails if no record with that id was saved before.
    async fn append_groups(&self, id: &str, groups: &[TimelineGroup]) -> Result<()>;
}
