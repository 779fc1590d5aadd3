//! Application configuration.
//!
//! Layered, lowest precedence first: built-in defaults, `config.yaml`,
//! the `.env` file in the data directory, process environment, CLI flags.

use crate::error::{AppError, AppResult};
use crate::sync::BacklinkPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const YOUTUBE_API_KEY_VAR: &str = "YOUTUBE_API_KEY";
pub const PLACES_API_KEY_VAR: &str = "GOOGLE_PLACES_API_KEY";

const DEFAULT_YOUTUBE_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
const DEFAULT_PLACES_BASE_URL: &str = "https://places.googleapis.com/v1";
const DEFAULT_AVATAR_URL: &str = "https://via.placeholder.com/48";
const UNKNOWN_CHANNEL_NAME: &str = "Unknown";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    /// Defaults to `<data_dir>/foodie_map.db`.
    pub database_path: Option<PathBuf>,
    #[serde(skip_serializing)]
    pub youtube_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub places_api_key: Option<String>,
    pub youtube_base_url: String,
    pub places_base_url: String,
    pub request_timeout_secs: u64,
    /// Page size for the "latest videos" listing; only the newest is used.
    pub video_search_limit: u32,
    /// Shown for videos whose reviewer cannot be found.
    pub default_avatar_url: String,
    pub unknown_channel_name: String,
    pub backlink_policy: BacklinkPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_path: None,
            youtube_api_key: None,
            places_api_key: None,
            youtube_base_url: DEFAULT_YOUTUBE_BASE_URL.to_string(),
            places_base_url: DEFAULT_PLACES_BASE_URL.to_string(),
            request_timeout_secs: 30,
            video_search_limit: 5,
            default_avatar_url: DEFAULT_AVATAR_URL.to_string(),
            unknown_channel_name: UNKNOWN_CHANNEL_NAME.to_string(),
            backlink_policy: BacklinkPolicy::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("foodie-map")
}

impl AppConfig {
    /// Load configuration from every source.
    ///
    /// An explicit `config_path` must exist; the implicit
    /// `<data_dir>/config.yaml` is optional.
    pub fn load(config_path: Option<&Path>, db_override: Option<PathBuf>) -> AppResult<Self> {
        let mut config = match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    AppError::Config(format!("Failed to read config {}: {}", path.display(), e))
                })?;
                Self::from_yaml(&content)?
            }
            None => {
                let implicit = default_data_dir().join("config.yaml");
                match std::fs::read_to_string(&implicit) {
                    Ok(content) => Self::from_yaml(&content)?,
                    Err(_) => Self::default(),
                }
            }
        };

        let data_dir = config.data_dir.clone();
        config.apply_env(|key| crate::load_env_value(&data_dir, key));
        config.apply_env(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()));

        if let Some(path) = db_override {
            config.database_path = Some(path);
        }

        log::info!(
            "Config loaded: data_dir={}, youtube_key={}, places_key={}",
            config.data_dir.display(),
            config.youtube_api_key.is_some(),
            config.places_api_key.is_some()
        );

        Ok(config)
    }

    pub fn from_yaml(content: &str) -> AppResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Override API keys from a key lookup (an `.env` file or the environment).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(YOUTUBE_API_KEY_VAR) {
            self.youtube_api_key = Some(key);
        }
        if let Some(key) = lookup(PLACES_API_KEY_VAR) {
            self.places_api_key = Some(key);
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("foodie_map.db"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
