//! Application-level configuration loading: storage location, quotas, poll
//! periods and the remote service endpoint.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DisplayFromStr, PickFirst, serde_as};
use tracing::{info, warn};

use crate::{
    dao::{local_store::DEFAULT_QUOTA_BYTES, models::CollectionKey},
    state::{ContextSettings, DEFAULT_WORKFLOW_POLL},
};

/// Default location on disk where the daemon looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ARENA_SYNC_CONFIG_PATH";
/// Default directory holding the persisted keys.
const DEFAULT_DATA_DIR: &str = "data";
/// Default period of the background refresh from the remote service.
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Directory of the file medium; `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// Soft ceiling of a single serialized value.
    pub quota_bytes: usize,
    /// Safety-net poll period of workflow trackers.
    pub workflow_poll: Duration,
    /// Period of the background refresh; `None` disables it.
    pub refresh_interval: Option<Duration>,
    /// Base URL of the remote service; `None` runs offline.
    pub remote_base_url: Option<String>,
    /// Collections refreshed from the remote service.
    pub remote_collections: Vec<CollectionKey>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        remote = app_config.remote_base_url.as_deref().unwrap_or("offline"),
                        collections = app_config.remote_collections.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Settings handed to every sync context opened by the daemon.
    pub fn context_settings(&self) -> ContextSettings {
        ContextSettings {
            quota_bytes: self.quota_bytes,
            workflow_poll: self.workflow_poll,
            remote_collections: self.remote_collections.clone(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: Some(PathBuf::from(DEFAULT_DATA_DIR)),
            quota_bytes: DEFAULT_QUOTA_BYTES,
            workflow_poll: DEFAULT_WORKFLOW_POLL,
            refresh_interval: Some(DEFAULT_REFRESH_INTERVAL),
            remote_base_url: None,
            remote_collections: CollectionKey::ALL.to_vec(),
        }
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    data_dir: Option<String>,
    in_memory: bool,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    quota_bytes: usize,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    workflow_poll_ms: u64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    refresh_interval_secs: u64,
    remote_base_url: Option<String>,
    remote_collections: Option<Vec<CollectionKey>>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            in_memory: false,
            quota_bytes: DEFAULT_QUOTA_BYTES,
            workflow_poll_ms: DEFAULT_WORKFLOW_POLL.as_millis() as u64,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL.as_secs(),
            remote_base_url: None,
            remote_collections: None,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let data_dir = if value.in_memory {
            None
        } else {
            Some(PathBuf::from(
                value.data_dir.as_deref().unwrap_or(DEFAULT_DATA_DIR),
            ))
        };

        Self {
            data_dir,
            quota_bytes: value.quota_bytes,
            workflow_poll: Duration::from_millis(value.workflow_poll_ms.max(1)),
            refresh_interval: (value.refresh_interval_secs > 0)
                .then(|| Duration::from_secs(value.refresh_interval_secs)),
            remote_base_url: value
                .remote_base_url
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            remote_collections: value
                .remote_collections
                .unwrap_or_else(|| CollectionKey::ALL.to_vec()),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> AppConfig {
        serde_json::from_str::<RawConfig>(json).unwrap().into()
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse("{}");
        assert_eq!(config.data_dir, Some(PathBuf::from(DEFAULT_DATA_DIR)));
        assert_eq!(config.quota_bytes, DEFAULT_QUOTA_BYTES);
        assert_eq!(config.workflow_poll, DEFAULT_WORKFLOW_POLL);
        assert_eq!(config.remote_base_url, None);
        assert_eq!(config.remote_collections.len(), CollectionKey::ALL.len());
    }

    #[test]
    fn values_are_read_from_numbers_or_strings() {
        let config = parse(
            r#"{
                "in_memory": true,
                "quota_bytes": "1024",
                "workflow_poll_ms": 500,
                "refresh_interval_secs": 0,
                "remote_base_url": " https://api.example.test/ ",
                "remote_collections": ["players", "communityRequests"]
            }"#,
        );
        assert_eq!(config.data_dir, None);
        assert_eq!(config.quota_bytes, 1024);
        assert_eq!(config.workflow_poll, Duration::from_millis(500));
        assert_eq!(config.refresh_interval, None);
        assert_eq!(
            config.remote_base_url.as_deref(),
            Some("https://api.example.test")
        );
        assert_eq!(
            config.remote_collections,
            vec![CollectionKey::Players, CollectionKey::CommunityRequests]
        );
    }
}
