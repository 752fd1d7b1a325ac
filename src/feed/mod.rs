//! Feed source trait and raw record decoding
//!
//! A feed source answers "what happened since T?" with the raw response body.
//! Two sources are provided:
//! - IntelFeed: the live HTTP endpoint
//! - ReplayFeed: a saved response body on disk

mod intel;
mod replay;

pub use intel::IntelFeed;
pub use replay::ReplayFeed;

use serde_json::Value;
use tracing::warn;

use crate::config::Credentials;
use crate::error::CollectError;

/// One activity-feed row: `[guid, timestamp_ms, payload]`
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub guid: String,
    pub timestamp_ms: i64,
    pub payload: Value,
}

impl RawRecord {
    pub fn from_value(value: &Value) -> Option<Self> {
        let row = value.as_array()?;
        Some(Self {
            guid: row.first()?.as_str()?.to_string(),
            timestamp_ms: row.get(1)?.as_i64()?,
            payload: row.get(2)?.clone(),
        })
    }
}

/// Source of raw activity records
pub trait FeedSource {
    /// Human-readable description
    fn description(&self) -> &str;

    /// Request records newer than `since_ms`. Returns the raw response body;
    /// the caller checks its shape.
    fn fetch(&self, since_ms: i64) -> Result<Value, CollectError>;
}

/// Precondition checked before every cycle
pub trait SessionGate {
    fn session_valid(&self) -> bool;
}

impl SessionGate for Credentials {
    fn session_valid(&self) -> bool {
        self.valid && !self.sacsid.trim().is_empty() && !self.csrf_token.trim().is_empty()
    }
}

/// Gate that is always open, for sources that need no session
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

impl SessionGate for OpenGate {
    fn session_valid(&self) -> bool {
        true
    }
}

/// Pull the record rows out of a response body.
/// A body without a `result` array is malformed and aborts the cycle.
pub fn decode_batch(body: &Value) -> Result<Vec<Value>, CollectError> {
    match body.get("result").and_then(|r| r.as_array()) {
        Some(rows) => Ok(rows.clone()),
        None => Err(CollectError::MalformedResponse {
            raw: body.to_string(),
        }),
    }
}

/// Decode rows, skipping any that are not `[guid, timestamp, payload]`
pub fn decode_records(rows: &[Value]) -> Vec<RawRecord> {
    rows.iter()
        .filter_map(|row| {
            let record = RawRecord::from_value(row);
            if record.is_none() {
                warn!(row = %row, "skipping malformed feed row");
            }
            record
        })
        .collect()
}
