//! Replays a saved getPlexts response from disk
//!
//! Each fetch returns the oldest `page_size` rows at or after the requested
//! timestamp, so successive cycles walk the file the way they would walk the
//! live feed.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::path::Path;

use super::{decode_batch, FeedSource, RawRecord};
use crate::error::CollectError;

pub struct ReplayFeed {
    label: String,
    rows: Vec<Value>,
    page_size: usize,
}

impl ReplayFeed {
    pub fn open(path: &Path, page_size: usize) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay file {}", path.display()))?;
        let body: Value = serde_json::from_str(&content)
            .with_context(|| format!("Replay file {} is not JSON", path.display()))?;
        let rows = decode_batch(&body)?;
        Ok(Self::from_rows(path, rows, page_size))
    }

    pub fn from_rows(path: &Path, mut rows: Vec<Value>, page_size: usize) -> Self {
        rows.sort_by_key(row_timestamp);
        Self {
            label: format!("replay:{}", path.display()),
            rows,
            page_size: page_size.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn row_timestamp(row: &Value) -> i64 {
    RawRecord::from_value(row)
        .map(|r| r.timestamp_ms)
        .unwrap_or(i64::MIN)
}

impl FeedSource for ReplayFeed {
    fn description(&self) -> &str {
        &self.label
    }

    fn fetch(&self, since_ms: i64) -> Result<Value, CollectError> {
        let page: Vec<Value> = self
            .rows
            .iter()
            .filter(|row| row_timestamp(row) >= since_ms)
            .take(self.page_size)
            .cloned()
            .collect();
        Ok(json!({ "result": page }))
    }
}
