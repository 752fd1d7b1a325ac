//! Lower-bound timestamp for the next feed request

use chrono::Utc;
use tracing::warn;

use crate::config::PollConfig;
use crate::store::StateStore;

/// Tracks how far back the next fetch should reach.
///
/// The result is the largest of:
/// - newest stored action + 1 (several records can share a timestamp; asking
///   for exactly that timestamp again would return the same page forever)
/// - the highest record timestamp seen by this tracker, seeded with a fixed
///   historical floor
/// - now minus the lookback window
#[derive(Debug, Clone)]
pub struct WatermarkTracker {
    high_watermark: i64,
    lookback_ms: i64,
}

impl WatermarkTracker {
    pub fn new(floor_ms: i64, lookback_ms: i64) -> Self {
        Self {
            high_watermark: floor_ms,
            lookback_ms,
        }
    }

    pub fn from_config(config: &PollConfig) -> Self {
        Self::new(config.floor_timestamp_ms, config.lookback_ms())
    }

    /// Record a fetched record's timestamp, whatever becomes of the record
    pub fn observe(&mut self, timestamp_ms: i64) {
        if timestamp_ms > self.high_watermark {
            self.high_watermark = timestamp_ms;
        }
    }

    pub fn high_watermark(&self) -> i64 {
        self.high_watermark
    }

    pub fn next_since(&self, store: &StateStore) -> i64 {
        let latest = match store.latest_action_timestamp() {
            Ok(ts) => ts,
            Err(e) => {
                warn!(error = %e, "latest action lookup failed, using lookback window");
                None
            }
        };
        self.since_at(latest, Utc::now().timestamp_millis())
    }

    /// Pure form of [`next_since`](Self::next_since)
    pub fn since_at(&self, latest_action_ms: Option<i64>, now_ms: i64) -> i64 {
        let lookback = now_ms - self.lookback_ms;
        let candidate = latest_action_ms.map_or(lookback, |ts| ts + 1);
        candidate.max(self.high_watermark).max(lookback)
    }
}
