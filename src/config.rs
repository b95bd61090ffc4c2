// src/config.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::time::Duration;
use tracing::{debug, info};

use crate::types::analysis::DEFAULT_MAX_UPLOAD_BYTES;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_CONFIG_FILE: &str = "cvscan.yaml";

/// Client settings for one environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub health_stale_seconds: u64,
    pub history_stale_seconds: u64,
    pub health_retries: u32,
    pub retry_delay_ms: u64,
    pub max_upload_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 30,
            health_stale_seconds: 30,
            history_stale_seconds: 5 * 60,
            health_retries: 1,
            retry_delay_ms: 1000,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    local: ClientConfig,
    production: ClientConfig,
}

impl ClientConfig {
    /// Load configuration for the current environment.
    ///
    /// The file named by `CVSCAN_CONFIG` (default `cvscan.yaml`) is optional;
    /// without it the built-in defaults apply. `API_BASE_URL` always wins.
    pub fn load() -> Result<Self> {
        let environment = Self::get_environment();
        info!("Loading configuration for environment: {}", environment);

        let config_path = std::env::var("CVSCAN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        let config = if config_path.exists() {
            Self::load_from_file(&config_path, &environment)?
        } else {
            debug!("{} not found, using defaults", config_path.display());
            Self::default()
        };

        let config = match std::env::var("API_BASE_URL") {
            Ok(url) if !url.trim().is_empty() => config.with_base_url(url),
            _ => config,
        };

        Ok(config.normalized())
    }

    fn get_environment() -> String {
        std::env::var("CVSCAN_ENV")
            .or_else(|_| std::env::var("ENVIRONMENT"))
            .or_else(|_| std::env::var("ENV"))
            .unwrap_or_else(|_| "local".to_string())
    }

    pub fn load_from_file(path: &Path, environment: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Self::from_yaml_str(&content, environment)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Pick the `local` or `production` section of a YAML document
    pub fn from_yaml_str(content: &str, environment: &str) -> Result<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(content)?;

        let env_config = match environment {
            "production" => config_file.production,
            _ => config_file.local,
        };

        Ok(env_config.normalized())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self.normalized()
    }

    fn normalized(mut self) -> Self {
        self.base_url = self.base_url.trim().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn health_stale_time(&self) -> Duration {
        Duration::from_secs(self.health_stale_seconds)
    }

    pub fn history_stale_time(&self) -> Duration {
        Duration::from_secs(self.history_stale_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
