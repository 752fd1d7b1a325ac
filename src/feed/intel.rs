//! Live Intel feed
//!
//! POSTs a getPlexts request for the configured box. The session cookie and
//! CSRF token are read from config; keeping them fresh is somebody else's job.

use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::FeedSource;
use crate::config::{Credentials, FeedConfig};
use crate::error::CollectError;
use crate::geofence::Geofence;

pub struct IntelFeed {
    url: String,
    tab: String,
    credentials: Credentials,
    bounds: Geofence,
    client: reqwest::blocking::Client,
}

impl IntelFeed {
    pub fn new(
        config: &FeedConfig,
        credentials: &Credentials,
        bounds: Geofence,
    ) -> Result<Self, CollectError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            url: config.url.clone(),
            tab: config.tab.clone(),
            credentials: credentials.clone(),
            bounds,
            client,
        })
    }

    fn request_body(&self, since_ms: i64) -> Value {
        json!({
            "minLatE6": self.bounds.min_lat_e6,
            "minLngE6": self.bounds.min_lng_e6,
            "maxLatE6": self.bounds.max_lat_e6,
            "maxLngE6": self.bounds.max_lng_e6,
            "minTimestampMs": since_ms,
            "maxTimestampMs": -1,
            "tab": self.tab,
            "v": self.credentials.payload_version,
        })
    }
}

impl FeedSource for IntelFeed {
    fn description(&self) -> &str {
        &self.url
    }

    fn fetch(&self, since_ms: i64) -> Result<Value, CollectError> {
        let cookie = format!(
            "SACSID={}; csrftoken={}",
            self.credentials.sacsid, self.credentials.csrf_token
        );

        debug!(url = %self.url, since_ms, "requesting plexts");
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::COOKIE, cookie)
            .header("X-CSRFToken", &self.credentials.csrf_token)
            .header(reqwest::header::REFERER, "https://intel.ingress.com/intel")
            .json(&self.request_body(since_ms))
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(CollectError::Transport(format!("HTTP {}: {}", status, text)));
        }

        serde_json::from_str(&text).map_err(|e| CollectError::Decode(e.to_string()))
    }
}
