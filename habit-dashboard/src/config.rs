//! Dashboard configuration

use anyhow::Context;
use habit_store_client::StoreConfig;
use habit_tracker::FailurePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub store: StoreSettings,
}

/// Hosted backend connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project URL
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Public API key of the project
    #[serde(default)]
    pub api_key: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Session cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// File holding the access token between runs
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSettings {
    /// "keep-local" or "revert"
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_backend_url() -> String { "http://localhost:54321".to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_cache_path() -> PathBuf { PathBuf::from(".habit-dashboard/session.json") }

impl Config {
    /// Read `path`, or fall back to defaults when it does not exist
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Client settings, carrying a cached access token if there is one
    pub fn store_config(&self, access_token: Option<String>) -> StoreConfig {
        StoreConfig {
            base_url: self.backend.url.clone(),
            api_key: self.backend.api_key.clone(),
            access_token,
            timeout_secs: self.backend.timeout_secs,
        }
    }
}
