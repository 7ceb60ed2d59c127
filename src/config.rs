//! Runtime configuration loaded from environment variables.
//!
//! Every knob has a default, so an empty environment yields a working local
//! setup. Unparseable values fall back to the default rather than failing.

use std::path::PathBuf;
use std::time::Duration;

use crate::transport::ReconnectPolicy;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
const DEFAULT_TYPING_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_AUTOSAVE_MS: u64 = 5_000;
const DEFAULT_PROGRESS_PATH: &str = "edulive-progress.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid API base URL (expected http, https, ws or wss): {0}")]
    InvalidBaseUrl(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct RealtimeConfig {
    /// REST base URL, e.g. `https://api.example.com`. The WebSocket base is
    /// derived from it.
    pub api_base_url: String,
    pub reconnect: ReconnectPolicy,
    /// How long a typing indicator survives without a fresh typing frame.
    pub typing_timeout: Duration,
    /// Minimum spacing between debounced progress writes.
    pub autosave_interval: Duration,
    /// Location of the file-backed progress store.
    pub progress_path: PathBuf,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            reconnect: ReconnectPolicy::default(),
            typing_timeout: Duration::from_millis(DEFAULT_TYPING_TIMEOUT_MS),
            autosave_interval: Duration::from_millis(DEFAULT_AUTOSAVE_MS),
            progress_path: PathBuf::from(DEFAULT_PROGRESS_PATH),
        }
    }
}

impl RealtimeConfig {
    /// Load configuration from environment variables.
    ///
    /// - `EDU_API_BASE_URL`
    /// - `EDU_WS_MAX_RECONNECT_ATTEMPTS`, `EDU_WS_BASE_DELAY_MS`, `EDU_WS_MAX_DELAY_MS`
    /// - `EDU_TYPING_TIMEOUT_MS`
    /// - `EDU_PROGRESS_AUTOSAVE_MS`
    /// - `EDU_PROGRESS_PATH`
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse_or = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };

        let max_attempts = lookup("EDU_WS_MAX_RECONNECT_ATTEMPTS")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_RECONNECT_ATTEMPTS);

        Self {
            api_base_url: lookup("EDU_API_BASE_URL")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned()),
            reconnect: ReconnectPolicy {
                max_attempts,
                base_delay: Duration::from_millis(parse_or("EDU_WS_BASE_DELAY_MS", DEFAULT_BASE_DELAY_MS)),
                max_delay: Duration::from_millis(parse_or("EDU_WS_MAX_DELAY_MS", DEFAULT_MAX_DELAY_MS)),
            },
            typing_timeout: Duration::from_millis(parse_or("EDU_TYPING_TIMEOUT_MS", DEFAULT_TYPING_TIMEOUT_MS)),
            autosave_interval: Duration::from_millis(parse_or("EDU_PROGRESS_AUTOSAVE_MS", DEFAULT_AUTOSAVE_MS)),
            progress_path: lookup("EDU_PROGRESS_PATH")
                .filter(|s| !s.is_empty())
                .map_or_else(|| PathBuf::from(DEFAULT_PROGRESS_PATH), PathBuf::from),
        }
    }

    /// WebSocket base URL derived from [`Self::api_base_url`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] for unsupported schemes.
    pub fn ws_base_url(&self) -> Result<String, ConfigError> {
        ws_base_url(&self.api_base_url)
    }
}

/// Convert an HTTP(S) base URL into its WebSocket counterpart.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidBaseUrl`] unless the scheme is `http`,
/// `https`, `ws` or `wss`.
pub fn ws_base_url(api_base: &str) -> Result<String, ConfigError> {
    let trimmed = api_base.trim().trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("https://") {
        return Ok(format!("wss://{rest}"));
    }
    if let Some(rest) = trimmed.strip_prefix("http://") {
        return Ok(format!("ws://{rest}"));
    }
    if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        return Ok(trimmed.to_owned());
    }

    Err(ConfigError::InvalidBaseUrl(api_base.to_owned()))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
