// src/storage/json.rs
// =============================================================================
// Stores each record as <folder>/<id>.json.
//
// Appending reads the file, extends "timelines" and writes it back. Writes go
// to a temporary file next to the target and are renamed over it, so a crash
// mid-write leaves the old record intact instead of half a JSON document.
//
// Only one worker ever handles a given id at a time, so there is no locking
// per file.
// =============================================================================

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::Storage;
use crate::crawl::{ItemRecord, TimelineGroup};
use crate::error::{CrawlError, Result};

pub struct JsonStorage {
    folder: PathBuf,
}

impl JsonStorage {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.folder.join(format!("{}.json", id))
    }

    // Serializes and atomically replaces the file at `path`
    async fn write_record(&self, path: &Path, record: &ItemRecord) -> Result<()> {
        fs::create_dir_all(&self.folder).await?;

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| CrawlError::Storage(format!("serialize {}: {}", record.id, e)))?;

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json).await?;
        fs::rename(&tmp_path, path).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for JsonStorage {
    async fn save_item(&self, record: &ItemRecord) -> Result<()> {
        let path = self.record_path(&record.id);
        self.write_record(&path, record).await?;
        debug!(id = %record.id, path = %path.display(), "Saved record");
        Ok(())
    }

    async fn append_groups(&self, id: &str, groups: &[TimelineGroup]) -> Result<()> {
        let path = self.record_path(id);

        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CrawlError::Storage(format!(
                    "cannot append to {}: record not found",
                    id
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let mut record: ItemRecord = serde_json::from_str(&json)
            .map_err(|e| CrawlError::Storage(format!("corrupt record {}: {}", id, e)))?;
        record.timelines.extend(groups.iter().cloned());

        self.write_record(&path, &record).await?;
        debug!(id = %id, added = groups.len(), total = record.timelines.len(), "Appended groups");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> ItemRecord {
        ItemRecord {
            id: id.to_string(),
            primary_text: "root".to_string(),
            timelines: vec![vec!["a".to_string()]],
        }
    }

    #[tokio::test]
    async fn test_save_creates_folder_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("nested/data");
        let storage = JsonStorage::new(&folder);

        storage.save_item(&record("42")).await.unwrap();

        let json = std::fs::read_to_string(folder.join("42.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["id"], "42");
        assert_eq!(value["primaryText"], "root");
        assert_eq!(value["timelines"], serde_json::json!([["a"]]));
    }

    #[tokio::test]
    async fn test_append_extends_timelines_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path());

        storage.save_item(&record("42")).await.unwrap();
        storage
            .append_groups("42", &[vec!["b".to_string()], vec!["c".to_string(), "d".to_string()]])
            .await
            .unwrap();

        let json = std::fs::read_to_string(dir.path().join("42.json")).unwrap();
        let stored: ItemRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(stored.timelines, vec![vec!["a"], vec!["b"], vec!["c", "d"]]);
        assert!(!dir.path().join("42.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_append_without_record_fails() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path());

        let result = storage.append_groups("missing", &[vec!["x".to_string()]]).await;
        assert!(matches!(result, Err(CrawlError::Storage(_))));
    }
}
