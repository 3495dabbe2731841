//! Application configuration.

use casewatch_cache::CacheConfig;
use casewatch_dashboard::{DashboardConfig, IntervalConfig};
use casewatch_live::LiveConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Default config path when neither the CLI nor the environment names one.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment variable overriding the config path.
pub const CONFIG_ENV: &str = "CASEWATCH_CONFIG";

/// Forensics backend REST settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL; resource paths such as `/api/cases` are appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Client-level timeout for a single request (ms).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend REST API.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Per-resource refresh intervals.
    #[serde(default)]
    pub intervals: IntervalConfig,
    /// Live push channel.
    #[serde(default)]
    pub live: LiveConfig,
    /// Dashboard layout and frame server.
    #[serde(default)]
    pub dashboard: DashboardConfig,
    /// Polling cache tuning.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &str) -> AppResult<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        if self.backend.base_url.trim().is_empty() {
            return Err(AppError::Config("backend.base_url must not be empty".to_string()));
        }
        if self.live.enabled
            && !(self.live.url.starts_with("ws://") || self.live.url.starts_with("wss://"))
        {
            return Err(AppError::Config(format!(
                "live.url must be a ws:// or wss:// URL, got {}",
                self.live.url
            )));
        }
        Ok(())
    }
}
