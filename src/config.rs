//! Configuration management with YAML support

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub credentials: Credentials,

    #[serde(default)]
    pub geofence: GeofenceConfig,

    #[serde(default)]
    pub poll: PollConfig,

    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// Where and how the activity feed is requested
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_url")]
    pub url: String,

    #[serde(default = "default_feed_tab")]
    pub tab: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Records handed out per fetch when replaying a saved response
    #[serde(default = "default_replay_page_size")]
    pub replay_page_size: usize,
}

/// Session credential for the feed. Refreshed by an external job; this
/// crate only reads it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub sacsid: String,

    #[serde(default)]
    pub csrf_token: String,

    #[serde(default)]
    pub payload_version: String,

    #[serde(default)]
    pub valid: bool,
}

/// Inclusive region of interest, in micro-degrees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeofenceConfig {
    #[serde(default = "default_min_lat")]
    pub min_lat_e6: i64,

    #[serde(default = "default_max_lat")]
    pub max_lat_e6: i64,

    #[serde(default = "default_min_lng")]
    pub min_lng_e6: i64,

    #[serde(default = "default_max_lng")]
    pub max_lng_e6: i64,
}

/// Poll loop tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Fetches allowed in one invocation chain
    #[serde(default = "default_recursion_cap")]
    pub recursion_cap: u32,

    /// A batch at least this large triggers an immediate follow-up fetch
    #[serde(default = "default_batch_threshold")]
    pub batch_threshold: usize,

    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,

    /// Historical lower bound for the watermark
    #[serde(default = "default_floor_timestamp_ms")]
    pub floor_timestamp_ms: i64,
}

/// Behaviour switches for the state applier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Chat messages are recognized but not written unless enabled
    #[serde(default)]
    pub persist_messages: bool,

    /// When false a player's first-seen team is kept forever
    #[serde(default)]
    pub update_player_team: bool,

    #[serde(default = "default_message_max_chars")]
    pub message_max_chars: usize,
}

// Default value functions
fn default_database_path() -> String {
    "~/.local/share/plextwatch/plextwatch.db".to_string()
}

fn default_feed_url() -> String {
    "https://intel.ingress.com/r/getPlexts".to_string()
}

fn default_feed_tab() -> String {
    "all".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_replay_page_size() -> usize {
    50
}

fn default_min_lat() -> i64 {
    -90_000_000
}

fn default_max_lat() -> i64 {
    90_000_000
}

fn default_min_lng() -> i64 {
    -180_000_000
}

fn default_max_lng() -> i64 {
    180_000_000
}

fn default_recursion_cap() -> u32 {
    8
}

fn default_batch_threshold() -> usize {
    50
}

fn default_lookback_hours() -> i64 {
    24
}

fn default_floor_timestamp_ms() -> i64 {
    1_406_513_783_823
}

fn default_message_max_chars() -> usize {
    512
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            tab: default_feed_tab(),
            timeout_secs: default_timeout_secs(),
            replay_page_size: default_replay_page_size(),
        }
    }
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            min_lat_e6: default_min_lat(),
            max_lat_e6: default_max_lat(),
            min_lng_e6: default_min_lng(),
            max_lng_e6: default_max_lng(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            recursion_cap: default_recursion_cap(),
            batch_threshold: default_batch_threshold(),
            lookback_hours: default_lookback_hours(),
            floor_timestamp_ms: default_floor_timestamp_ms(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            persist_messages: false,
            update_player_team: false,
            message_max_chars: default_message_max_chars(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./plextwatch.yaml (current directory)
    /// 3. ~/.config/plextwatch/plextwatch.yaml
    pub fn load(path: &str) -> Result<Self> {
        let search_paths = vec![
            shellexpand::tilde(path).to_string(),
            "plextwatch.yaml".to_string(),
            shellexpand::tilde("~/.config/plextwatch/plextwatch.yaml").to_string(),
        ];

        for search_path in &search_paths {
            if std::path::Path::new(search_path).exists() {
                let content = std::fs::read_to_string(search_path)
                    .with_context(|| format!("Failed to read config {}", search_path))?;
                let config: Config = serde_yaml::from_str(&content)
                    .with_context(|| format!("Invalid config {}", search_path))?;
                return Ok(config);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    /// Get the database path, expanding ~ to home directory
    pub fn database_path(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.database.path).to_string();
        PathBuf::from(expanded)
    }
}

impl PollConfig {
    /// Lookback window in milliseconds
    pub fn lookback_ms(&self) -> i64 {
        self.lookback_hours.saturating_mul(60 * 60 * 1000)
    }
}
