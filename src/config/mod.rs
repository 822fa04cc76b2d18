//! Configuration management module
//!
//! Provides centralized configuration including:
//! - File paths under `$HOME/.ping-watch/` (log file, settings, `.env`)
//! - Monitor settings from an optional JSON file
//! - Bot token resolution (environment, `.env` in the working dir, `~/.ping-watch/.env`)
//!
//! The token is never logged.

use crate::tasks::MonitorSettings;
use crate::transport::TransportKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Startup configuration failures. All of them are fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is not set (environment, ./.env or ~/.ping-watch/.env)")]
    MissingToken(&'static str),

    #[error("Failed to read settings file {path:?}: {source}")]
    ReadSettings {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse settings file {path:?}: {source}")]
    ParseSettings {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

/// Configuration manager
pub struct Config;

impl Config {
    /// Base directory: `$HOME/.ping-watch`, or a temp directory if HOME is not available.
    pub fn base_dir() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".ping-watch");
        }
        std::env::temp_dir().join("ping-watch")
    }

    /// Get the log file path: `$HOME/.ping-watch/debug.log`
    pub fn log_file_path() -> PathBuf {
        Self::base_dir().join("debug.log")
    }

    /// Ensure the log directory exists
    pub fn ensure_log_directory() -> std::io::Result<()> {
        let log_path = Self::log_file_path();
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Default settings file: `$HOME/.ping-watch/config.json`
    pub fn settings_file_path() -> PathBuf {
        Self::base_dir().join("config.json")
    }

    pub fn version() -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}

/// Monitor settings file. Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub poll_interval_secs: u64,
    pub report_interval_secs: u64,
    pub probe_timeout_secs: u64,
    pub alert_on_recovery: bool,
    pub accept_invalid_certs: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30 * 60,
            report_interval_secs: 30 * 60,
            probe_timeout_secs: crate::monitors::website::DEFAULT_TIMEOUT_SECS,
            alert_on_recovery: true,
            accept_invalid_certs: false,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from the default location when `None`.
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Config::settings_file_path(), false),
        };

        if !explicit && !path.exists() {
            debug!("Config: No settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadSettings {
            path: path.clone(),
            source,
        })?;
        let settings = Self::from_json(&content).map_err(|source| ConfigError::ParseSettings {
            path: path.clone(),
            source,
        })?;
        settings.validate()?;
        info!("Config: Loaded settings from {:?}", path);
        Ok(settings)
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("pollIntervalSecs", self.poll_interval_secs),
            ("reportIntervalSecs", self.report_interval_secs),
            ("probeTimeoutSecs", self.probe_timeout_secs),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(ConfigError::InvalidSetting {
                    name,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            report_interval: Duration::from_secs(self.report_interval_secs),
            alert_on_recovery: self.alert_on_recovery,
        }
    }
}

/// Read `key` from a `.env`-style file (`KEY=value` lines, optional quotes).
fn token_from_env_file(path: &Path, key: &str) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    parse_env_value(&content, key)
}

fn parse_env_value(content: &str, key: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.starts_with('#'))
        .map(|l| l.strip_prefix("export ").unwrap_or(l))
        .filter_map(|l| l.split_once('='))
        .find(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|v| !v.is_empty())
}

/// Get the bot token for `kind`: environment, then `./.env`, then `~/.ping-watch/.env`.
pub fn resolve_token(kind: TransportKind) -> Result<String, ConfigError> {
    let key = kind.token_key();
    let mut candidates = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(".env"));
    }
    candidates.push(Config::base_dir().join(".env"));
    lookup_token(key, std::env::var(key).ok(), &candidates)
}

/// A blank env value counts as unset; files are tried in order.
fn lookup_token(
    key: &'static str,
    env_value: Option<String>,
    candidates: &[PathBuf],
) -> Result<String, ConfigError> {
    if let Some(t) = env_value {
        let t = t.trim().to_string();
        if !t.is_empty() {
            info!("Config: Token from {} env", key);
            return Ok(t);
        }
    }

    for path in candidates {
        if path.is_file() {
            if let Some(t) = token_from_env_file(path, key) {
                info!("Config: Token from {:?}", path);
                return Ok(t);
            }
        }
    }
    Err(ConfigError::MissingToken(key))
}
