// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::infra::errors::RoundtableError;
use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub broadcast: BroadcastConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Execution-loop settings for the sequence executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-call provider timeout, independent of inter-retry backoff.
    pub call_timeout_secs: u64,
    /// Retries after the first attempt on transient failures.
    pub max_retries: u32,
    /// Backoff delays in milliseconds, one per retry attempt.
    pub retry_backoff_ms: Vec<u64>,
    /// Token cap passed through to the provider gateway.
    pub max_tokens: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: 60,
            max_retries: 2,
            retry_backoff_ms: vec![1_000, 3_000],
            max_tokens: 2_048,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Bounded per-subscriber queue; overflow drops the oldest buffered update.
    pub subscriber_capacity: usize,
    /// Heartbeat interval for subscription handles, in seconds.
    pub heartbeat_secs: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: 64,
            heartbeat_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 7310,
            token: None,
        }
    }
}

/// Provider endpoints and rate overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Base URL per provider id for the OpenAI-compatible gateway.
    #[serde(default)]
    pub endpoints: HashMap<String, String>,
    /// USD per 1K tokens, overriding the built-in rate table.
    #[serde(default)]
    pub rates_per_1k: HashMap<String, f64>,
}

impl Config {
    /// Load from the default location, falling back to defaults when absent.
    pub fn load() -> Result<Self, RoundtableError> {
        let path = paths::config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, RoundtableError> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| RoundtableError::Config(e.to_string()))
    }
}
