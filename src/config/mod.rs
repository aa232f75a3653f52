//! Configuration module for the bridge server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//!
//! # Example
//! ```rust,no_run
//! use gemini_live_bridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

mod env;
mod yaml;

pub use yaml::YamlConfig;

use crate::core::bridge::BridgeConfig;

/// Session time limit applied on shared hosting.
pub const HOSTED_SESSION_TIME_LIMIT_SECONDS: u64 = 180;

/// Concurrent peer limit applied on shared hosting.
pub const HOSTED_MAX_CONCURRENT_PEERS: usize = 2;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,

    #[error("{0} mode is not supported")]
    UnsupportedMode(String),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// How the server is meant to be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Browser UI peers
    #[default]
    Ui,
    /// Telephone access (not supported)
    Phone,
}

impl RunMode {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_uppercase().as_str() {
            "UI" => Ok(RunMode::Ui),
            "PHONE" => Ok(RunMode::Phone),
            _ => Err(ConfigError::InvalidValue {
                key: "MODE".to_string(),
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Ui => write!(f, "UI"),
            RunMode::Phone => write!(f, "PHONE"),
        }
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the bridge server:
/// - Listener settings (host, port, share)
/// - Gemini credentials and model
/// - Per-peer limits
/// - Bridge pacing
/// - Security settings (CORS)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    pub mode: RunMode,
    /// Bind all interfaces so the UI is reachable from other machines
    pub share: bool,
    /// Running on a shared hosting platform (`SYSTEM=spaces`)
    pub hosted: bool,

    // Gemini settings
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_version: String,

    // Per-peer limits
    /// Explicit session time limit; falls back to the hosted default
    pub session_time_limit_seconds: Option<u64>,
    /// Explicit peer limit; falls back to the hosted default
    pub max_concurrent_peers: Option<usize>,
    /// Close a peer after this long without inbound messages
    pub idle_timeout_seconds: u64,

    // Bridge pacing
    pub video_send_interval_ms: u64,
    pub emit_timeout_ms: u64,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (same-origin only)
    pub cors_allowed_origins: Option<String>,
}

impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.gemini_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// The `.env` file is loaded in `main.rs` before this is called.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = env::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;

        let mut config = env::load_from_env()?;
        config.apply_yaml(yaml_config)?;
        config.validate()?;

        Ok(config)
    }

    fn apply_yaml(&mut self, yaml: YamlConfig) -> Result<(), ConfigError> {
        if let Some(server) = yaml.server {
            if let Some(host) = server.host {
                self.host = host;
            }
            if let Some(port) = server.port {
                self.port = port;
            }
            if let Some(mode) = server.mode {
                self.mode = RunMode::parse(&mode)?;
            }
            if let Some(share) = server.share {
                self.share = share;
            }
            if let Some(hosted) = server.hosted {
                self.hosted = hosted;
            }
        }

        if let Some(gemini) = yaml.gemini {
            if let Some(api_key) = gemini.api_key {
                self.gemini_api_key = Some(api_key);
            }
            if let Some(model) = gemini.model {
                self.gemini_model = model;
            }
            if let Some(api_version) = gemini.api_version {
                self.gemini_api_version = api_version;
            }
        }

        if let Some(limits) = yaml.limits {
            if limits.session_time_limit_seconds.is_some() {
                self.session_time_limit_seconds = limits.session_time_limit_seconds;
            }
            if limits.max_concurrent_peers.is_some() {
                self.max_concurrent_peers = limits.max_concurrent_peers;
            }
            if let Some(idle) = limits.idle_timeout_seconds {
                self.idle_timeout_seconds = idle;
            }
        }

        if let Some(bridge) = yaml.bridge {
            if let Some(interval) = bridge.video_send_interval_ms {
                self.video_send_interval_ms = interval;
            }
            if let Some(timeout) = bridge.emit_timeout_ms {
                self.emit_timeout_ms = timeout;
            }
        }

        if let Some(security) = yaml.security
            && security.cors_allowed_origins.is_some()
        {
            self.cors_allowed_origins = security.cors_allowed_origins;
        }

        Ok(())
    }

    /// Check the merged configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode == RunMode::Phone {
            return Err(ConfigError::UnsupportedMode(self.mode.to_string()));
        }
        if self
            .gemini_api_key
            .as_deref()
            .is_none_or(|k| k.trim().is_empty())
        {
            return Err(ConfigError::MissingApiKey);
        }
        if self.emit_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "EMIT_TIMEOUT_MS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.idle_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "IDLE_TIMEOUT_SECONDS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.max_concurrent_peers == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "MAX_CONCURRENT_PEERS".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Get the Gemini API key
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.gemini_api_key
            .as_deref()
            .ok_or(ConfigError::MissingApiKey)
    }

    /// Host the listener binds to; sharing binds all interfaces
    pub fn bind_host(&self) -> &str {
        if self.share { "0.0.0.0" } else { &self.host }
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_host(), self.port)
    }

    /// Effective per-peer session time limit
    pub fn session_time_limit(&self) -> Option<Duration> {
        self.session_time_limit_seconds
            .or(self.hosted.then_some(HOSTED_SESSION_TIME_LIMIT_SECONDS))
            .map(Duration::from_secs)
    }

    /// Effective concurrent peer limit
    pub fn peer_limit(&self) -> Option<usize> {
        self.max_concurrent_peers
            .or(self.hosted.then_some(HOSTED_MAX_CONCURRENT_PEERS))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    /// Bridge parameters derived from this configuration
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            model: self.gemini_model.clone(),
            video_send_interval: Duration::from_millis(self.video_send_interval_ms),
            emit_timeout: Duration::from_millis(self.emit_timeout_ms),
            ..BridgeConfig::default()
        }
    }
}
