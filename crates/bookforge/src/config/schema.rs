use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::generation::ProviderConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Where rendered documents are stored.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    pub generation: GenerationConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    /// Capacity of the event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_database_path() -> PathBuf {
    crate::db::default_database_path().unwrap_or_else(|| PathBuf::from("bookforge.db"))
}

fn default_storage_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".bookforge").join("documents"))
        .unwrap_or_else(|| PathBuf::from("documents"))
}

fn default_event_capacity() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Providers in rotation order.
    pub providers: Vec<ProviderConfig>,

    /// Base backoff delay after a fully throttled pass, in milliseconds.
    /// Doubles on every further pass.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Per-request timeout towards a provider, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Minimum seconds between the starts of two render tasks.
    #[serde(default = "default_min_spacing_secs")]
    pub min_spacing_secs: u64,

    /// Seconds between polls of an empty render queue.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_min_spacing_secs() -> u64 {
    5
}

fn default_poll_interval_secs() -> u64 {
    2
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            min_spacing_secs: default_min_spacing_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}
