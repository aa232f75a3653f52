use std::env;
use std::str::FromStr;

use super::{ConfigError, RunMode, ServerConfig};
use crate::core::live::{DEFAULT_API_VERSION, DEFAULT_MODEL};

pub(super) const DEFAULT_HOST: &str = "127.0.0.1";
pub(super) const DEFAULT_PORT: u16 = 7860;
pub(super) const DEFAULT_IDLE_TIMEOUT_SECONDS: u64 = 60;
pub(super) const DEFAULT_VIDEO_SEND_INTERVAL_MS: u64 = 1000;
pub(super) const DEFAULT_EMIT_TIMEOUT_MS: u64 = 10;

/// Read a variable, treating empty values as unset.
fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        None => Ok(None),
    }
}

/// Parse a boolean flag (`true/false`, `1/0`, `yes/no`, `on/off`).
pub(super) fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn bool_var(key: &str) -> Result<Option<bool>, ConfigError> {
    var(key).map(|v| parse_bool(key, &v)).transpose()
}

/// Build a configuration from environment variables and defaults.
pub(super) fn load_from_env() -> Result<ServerConfig, ConfigError> {
    let mode = match var("MODE") {
        Some(value) => RunMode::parse(&value)?,
        None => RunMode::Ui,
    };

    Ok(ServerConfig {
        host: var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: parse_var("PORT")?.unwrap_or(DEFAULT_PORT),
        mode,
        share: bool_var("SHARE")?.unwrap_or(false),
        hosted: var("SYSTEM").is_some_and(|s| s.eq_ignore_ascii_case("spaces")),

        gemini_api_key: var("GEMINI_API_KEY"),
        gemini_model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        gemini_api_version: var("GEMINI_API_VERSION")
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),

        session_time_limit_seconds: parse_var("SESSION_TIME_LIMIT_SECONDS")?,
        max_concurrent_peers: parse_var("MAX_CONCURRENT_PEERS")?,
        idle_timeout_seconds: parse_var("IDLE_TIMEOUT_SECONDS")?
            .unwrap_or(DEFAULT_IDLE_TIMEOUT_SECONDS),

        video_send_interval_ms: parse_var("VIDEO_SEND_INTERVAL_MS")?
            .unwrap_or(DEFAULT_VIDEO_SEND_INTERVAL_MS),
        emit_timeout_ms: parse_var("EMIT_TIMEOUT_MS")?.unwrap_or(DEFAULT_EMIT_TIMEOUT_MS),

        cors_allowed_origins: var("CORS_ALLOWED_ORIGINS"),
    })
}
