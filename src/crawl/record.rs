// src/crawl/record.rs
// Output records: one per crawled tweet.

use serde::{Deserialize, Serialize};

/// One thread of replies, as resolved text in discovery order
pub type TimelineGroup = Vec<String>;

/// Everything collected for one identifier
///
/// Stored as `{"id": ..., "primaryText": ..., "timelines": [[...], ...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    pub id: String,
    pub primary_text: String,
    #[serde(default)]
    pub timelines: Vec<TimelineGroup>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_shape() {
        let record = ItemRecord {
            id: "42".to_string(),
            primary_text: "hello".to_string(),
            timelines: vec![vec!["a".to_string(), "b".to_string()]],
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "id": "42", "primaryText": "hello", "timelines": [["a", "b"]] })
        );
    }
}
