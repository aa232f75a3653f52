use serde::Deserialize;
use std::path::Path;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 7860
///   mode: "UI"
///   share: false
///   hosted: false
///
/// gemini:
///   api_key: "your-gemini-key"
///   model: "gemini-2.0-flash-exp"
///   api_version: "v1alpha"
///
/// limits:
///   session_time_limit_seconds: 180
///   max_concurrent_peers: 2
///   idle_timeout_seconds: 60
///
/// bridge:
///   video_send_interval_ms: 1000
///   emit_timeout_ms: 10
///
/// security:
///   cors_allowed_origins: "https://example.com"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub gemini: Option<GeminiYaml>,
    pub limits: Option<LimitsYaml>,
    pub bridge: Option<BridgeYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// `UI` or `PHONE`
    pub mode: Option<String>,
    pub share: Option<bool>,
    /// Running on a shared hosting platform
    pub hosted: Option<bool>,
}

/// Gemini Live credentials and model selection from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeminiYaml {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub api_version: Option<String>,
}

/// Per-peer limits from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LimitsYaml {
    pub session_time_limit_seconds: Option<u64>,
    pub max_concurrent_peers: Option<usize>,
    pub idle_timeout_seconds: Option<u64>,
}

/// Bridge pacing from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BridgeYaml {
    pub video_send_interval_ms: Option<u64>,
    pub emit_timeout_ms: Option<u64>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::parse(&contents)
    }

    /// Parse YAML configuration from a string
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not a mapping
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }
}
