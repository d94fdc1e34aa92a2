use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::engine::channel::{ChannelSet, Timing};
use crate::engine::scheduler::SchedulerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid [channels] section: {0}")]
    Channels(String),
}

/// Top-level configuration, loaded from announcer.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AnnouncerConfig {
    pub api: ApiSection,
    pub storage: StorageSection,
    pub channels: ChannelsSection,
    pub timing: Timing,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    /// Published-announcements endpoint.
    pub url: String,
    /// Give up on the initial fetch after this many seconds. Unset means wait
    /// as long as the request takes.
    pub fetch_timeout_secs: Option<u64>,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/api/announcements/published".into(),
            fetch_timeout_secs: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// JSON file holding client state such as dismissed announcements.
    /// Unset means nothing is persisted.
    pub path: Option<PathBuf>,
    /// Maximum size of the state file in bytes.
    pub quota_bytes: Option<usize>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("announcer-state.json")),
            quota_bytes: Some(5 * 1024 * 1024),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ChannelsSection {
    /// Channels to present. Banner is supported but off unless listed.
    pub enabled: Vec<String>,
}

impl Default for ChannelsSection {
    fn default() -> Self {
        Self {
            enabled: vec!["modal".into(), "popup".into(), "notification".into()],
        }
    }
}

impl AnnouncerConfig {
    /// Load config from a TOML file. Falls back to defaults if the file doesn't exist.
    /// Environment variables override TOML values.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_string(),
                source,
            })?;
            Self::parse(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_string(),
                source,
            })?
        } else {
            info!("No config file found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_overrides();
        config.enabled_channels()?;
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ANNOUNCER_API_URL") {
            self.api.url = v;
        }
        if let Ok(v) = std::env::var("ANNOUNCER_FETCH_TIMEOUT_SECS")
            && let Ok(secs) = v.parse()
        {
            self.api.fetch_timeout_secs = Some(secs);
        }
        if let Ok(v) = std::env::var("ANNOUNCER_STATE_FILE") {
            self.storage.path = if v.is_empty() {
                None
            } else {
                Some(PathBuf::from(v))
            };
        }
        if let Ok(v) = std::env::var("ANNOUNCER_STORAGE_QUOTA_BYTES")
            && let Ok(bytes) = v.parse()
        {
            self.storage.quota_bytes = Some(bytes);
        }
        if let Ok(v) = std::env::var("ANNOUNCER_CHANNELS") {
            self.channels.enabled = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
    }

    pub fn enabled_channels(&self) -> Result<ChannelSet, ConfigError> {
        ChannelSet::from_names(&self.channels.enabled).map_err(ConfigError::Channels)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.api
            .fetch_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Convert into the scheduler's runtime settings.
    pub fn to_scheduler_config(&self) -> Result<SchedulerConfig, ConfigError> {
        Ok(SchedulerConfig {
            enabled: self.enabled_channels()?,
            timing: self.timing.clone(),
        })
    }
}
