//! Taskboard
//!
//! Client-side state layer for a project and task board API:
//! - Typed remote client that unwraps the `{success, data, error}` envelope
//! - Optimistic stores with background confirmation and guarded rollback
//! - A dense per-column order index for drag and drop reordering
//! - Filter state and last-good collections persisted between sessions

pub mod api;
pub mod events;
pub mod models;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use api::{HttpClient, RemoteClient};
use events::EventBus;
use store::{JsonFileStore, KeyValueStore, ProjectStore, TaskStore};

/// Base URL used when neither YAML nor the environment set one
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Request timeout used when neither YAML nor the environment set one
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub api: ApiYamlConfig,
    pub cache: CacheYamlConfig,
}

/// Remote API section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiYamlConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiYamlConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Local cache section. Without a `dir`, the platform data directory is used.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CacheYamlConfig {
    pub dir: Option<PathBuf>,
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub timeout: Duration,
    pub cache_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let timeout_secs = std::env::var("TASKBOARD_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(yaml.api.timeout_secs);

        Ok(Self {
            api_url: std::env::var("TASKBOARD_API_URL").unwrap_or(yaml.api.base_url),
            timeout: Duration::from_secs(timeout_secs),
            cache_dir: std::env::var("TASKBOARD_CACHE_DIR")
                .map(PathBuf::from)
                .ok()
                .or(yaml.cache.dir)
                .unwrap_or_else(JsonFileStore::default_dir),
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

/// Every store of the application, sharing one client, cache and event bus.
///
/// Built once at startup and passed by reference to whatever needs it.
#[derive(Clone)]
pub struct Stores {
    pub projects: ProjectStore,
    pub tasks: TaskStore,
    pub events: EventBus,
}

impl Stores {
    pub fn new(remote: Arc<dyn RemoteClient>, cache: Arc<dyn KeyValueStore>, events: EventBus) -> Self {
        Self {
            projects: ProjectStore::new(remote.clone(), cache.clone(), events.clone()),
            tasks: TaskStore::new(remote, cache, events.clone()),
            events,
        }
    }

    /// Connect to the configured server and restore persisted state
    pub fn connect(config: &Config) -> Result<Self> {
        let remote = Arc::new(HttpClient::new(&config.api_url, config.timeout)?);
        let cache = Arc::new(JsonFileStore::new(&config.cache_dir));
        let stores = Self::new(remote, cache, EventBus::default());
        stores.initialize();
        Ok(stores)
    }

    /// Restore cached collections and saved filters
    pub fn initialize(&self) {
        self.projects.initialize();
        self.tasks.initialize();
    }

    /// Wait for every background confirmation of every store
    pub async fn settle(&self) {
        self.projects.settle().await;
        self.tasks.settle().await;
    }
}

// ============================================================================
// Tests
// ============================================================================
