//! Robot configuration – reads `~/.ftl-robot/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ftl_middleware::LinkSettings;
use ftl_middleware::link::{
    DEFAULT_CONNECT_RETRY, DEFAULT_NODE_NAME, DEFAULT_PUBLISH_INTERVAL, DEFAULT_ROSBRIDGE_URL,
};
use ftl_runtime::telemetry::DEFAULT_LOG_LEVEL;
use ftl_runtime::{LogFormat, LogSettings};
use ftl_types::RobotError;

/// Environment variable pointing at an alternative config file.
pub const CONFIG_PATH_ENV: &str = "FTL_CONFIG";

/// Persisted robot configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Hardware profile used when none is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Link used when none is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    /// WebSocket URL of the rosbridge server.
    #[serde(default = "default_rosbridge_url")]
    pub rosbridge_url: String,

    /// Node name presented to the bus.
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// How often queued input updates are published.
    #[serde(default = "default_publish_interval_ms")]
    pub publish_interval_ms: u64,

    /// `EnvFilter` directive; `RUST_LOG` still wins.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_rosbridge_url() -> String {
    DEFAULT_ROSBRIDGE_URL.to_string()
}
fn default_node_name() -> String {
    DEFAULT_NODE_NAME.to_string()
}
fn default_publish_interval_ms() -> u64 {
    DEFAULT_PUBLISH_INTERVAL.as_millis() as u64
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: None,
            link: None,
            rosbridge_url: default_rosbridge_url(),
            node_name: default_node_name(),
            publish_interval_ms: default_publish_interval_ms(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            node_name: self.node_name.clone(),
            rosbridge_url: self.rosbridge_url.clone(),
            publish_interval: Duration::from_millis(self.publish_interval_ms.max(1)),
            connect_retry: DEFAULT_CONNECT_RETRY,
        }
    }

    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            level: self.log_level.clone(),
            format: self.log_format,
        }
    }
}

/// Return the config path: `$FTL_CONFIG` if set, else
/// `~/.ftl-robot/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
        && !path.is_empty()
    {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".ftl-robot").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, RobotError> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, RobotError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        RobotError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| RobotError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `FTL_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `FTL_ROSBRIDGE_URL` | `rosbridge_url` |
/// | `FTL_NODE_NAME` | `node_name` |
/// | `FTL_LOG_LEVEL` | `log_level` |
/// | `FTL_PUBLISH_INTERVAL_MS` | `publish_interval_ms` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("FTL_ROSBRIDGE_URL") {
        cfg.rosbridge_url = v;
    }
    if let Ok(v) = std::env::var("FTL_NODE_NAME") {
        cfg.node_name = v;
    }
    if let Ok(v) = std::env::var("FTL_LOG_LEVEL") {
        cfg.log_level = v;
    }
    if let Ok(v) = std::env::var("FTL_PUBLISH_INTERVAL_MS")
        && let Ok(ms) = v.parse::<u64>()
        && ms > 0
    {
        cfg.publish_interval_ms = ms;
    }
}
