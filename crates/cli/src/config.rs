//! Configuration system for the cyberfarm CLI
//!
//! Reads config from ~/.config/cyberfarm/config.toml. Every key is optional.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid server url {url:?}: {reason}")]
    ServerUrl { url: String, reason: String },
}

/// Default pacing mode for `cyberfarm run`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Auto,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL serving `/api/bootstrap` and `/ws/run`
    pub url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub mode: RunMode,
    /// Overrides the server's pacing interval
    pub exec_interval_ms: Option<u64>,
}

/// Full CLI configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub run: RunConfig,
}

impl Config {
    /// Load from the default path; a missing file yields defaults
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_path(&path)
    }

    /// Get default config path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cyberfarm")
            .join("config.toml")
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Bootstrap and run-channel URLs for one server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub bootstrap: Url,
    pub run: Url,
}

impl Endpoints {
    /// Derive both endpoints from an `http(s)://` base URL
    pub fn from_base(base: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::ServerUrl {
            url: base.to_string(),
            reason,
        };
        let base = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
        let ws_scheme = match base.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => return Err(invalid(format!("unsupported scheme {other}"))),
        };

        let bootstrap = base.join("/api/bootstrap").map_err(|e| invalid(e.to_string()))?;
        let mut run = base.join("/ws/run").map_err(|e| invalid(e.to_string()))?;
        run.set_scheme(ws_scheme)
            .map_err(|()| invalid("cannot switch to a websocket scheme".to_string()))?;

        Ok(Self { bootstrap, run })
    }
}
