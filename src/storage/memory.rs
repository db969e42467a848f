// src/storage/memory.rs
// In-memory Storage for tests: keeps records in a map and logs every write.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::Storage;
use crate::crawl::{ItemRecord, TimelineGroup};
use crate::error::{CrawlError, Result};

#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<HashMap<String, ItemRecord>>,
    writes: Mutex<Vec<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, id: &str) -> Option<ItemRecord> {
        self.records.lock().unwrap().get(id).cloned()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Ids of every write, in the order they happened
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save_item(&self, record: &ItemRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        self.writes.lock().unwrap().push(record.id.clone());
        Ok(())
    }

    async fn append_groups(&self, id: &str, groups: &[TimelineGroup]) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(id)
            .ok_or_else(|| CrawlError::Storage(format!("cannot append to {}: record not found", id)))?;
        record.timelines.extend(groups.iter().cloned());
        self.writes.lock().unwrap().push(id.to_string());
        Ok(())
    }
}
