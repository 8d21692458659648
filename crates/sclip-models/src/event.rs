//! Persisted stream rows: streamers, events and rolling contexts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A streamer row, used to resolve the display name for prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Streamer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
}

/// A single described moment of the stream, in absolute stream seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub start_secs: i64,
    pub end_secs: i64,
    pub description: String,
    pub stream_id: i64,
    pub stream_context_id: i64,
}

/// One rolling-narrative row per processed segment, newest last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub stream_id: i64,
    pub context: String,
    pub last_tail: String,
}

impl StreamContext {
    /// Build an unsaved context row for a stream.
    pub fn new(stream_id: i64, context: impl Into<String>, last_tail: impl Into<String>) -> Self {
        Self {
            id: None,
            created_at: None,
            stream_id,
            context: context.into(),
            last_tail: last_tail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsaved_rows_omit_generated_columns() {
        let ctx = StreamContext::new(3, "mid-match", "clutch win");
        let json = serde_json::to_value(&ctx).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("created_at").is_none());
        assert_eq!(json["stream_id"], 3);
        assert_eq!(json["last_tail"], "clutch win");
    }
}
