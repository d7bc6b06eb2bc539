//! Configuration management for studbot services.
//!
//! Both services read a single JSON configuration file at
//! `~/.studbot/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Explicit config file values
//! 2. Environment variables (STUDBOT_* prefix)
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `STUDBOT_BACKEND_URL` → backend.url
//! - `STUDBOT_BYTES_LIMIT` → backend.bytes_limit
//! - `STUDBOT_RETRY_SECS` → backend.retry_secs
//! - `STUDBOT_REPLY_TIMEOUT_SECS` → backend.reply_timeout_secs
//! - `STUDBOT_CHUNK_LIMIT` → relay.chunk_limit
//! - `STUDBOT_CONTEXT_BUDGET` → relay.context_budget
//! - `STUDBOT_TRANSCRIPT_PATH` → relay.transcript_path
//! - `STUDBOT_LOG_LEVEL` → observability.log_level
//! - `STUDBOT_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".studbot"),
        |dirs| dirs.home_dir().join(".studbot"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Default prompt template handed to the backend.
///
/// `{history}` is replaced with the joined question/answer log for the
/// user and `{question}` with the incoming question. The trailing
/// `###Answer: ` cue is part of the template on purpose; the model
/// continues from it.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
###Instruction: You are StudassBot, a friendly, helpful, and efficient assistant \
for students at the Faculty of Information Technology. You help students with \
programming questions, particularly Java, by guiding them in the right direction \
instead of handing out direct solutions. Explain in simple terms where possible, \
encourage students to ask questions, and give short and concise answers without \
sacrificing quality. You are only allowed to answer in English or Norwegian.
{history}
###Question: {question}
###Answer: ";

// ============================================================================
// Backend Configuration
// ============================================================================

/// Settings for the single persistent backend connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// WebSocket address of the inference backend.
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Byte ceiling for a single frame, applied symmetrically to sends
    /// and receives.
    #[serde(default = "default_bytes_limit")]
    pub bytes_limit: usize,

    /// Fixed delay between reconnection attempts, in seconds.
    #[serde(default = "default_retry_secs")]
    pub retry_secs: u64,

    /// Optional bound on waiting for a correlated reply, in seconds.
    ///
    /// `null` (the default) preserves the unbounded wait: a backend that
    /// never answers leaves that user's pending slot blocked until
    /// restart. Setting a value releases the slot and surfaces a timeout
    /// failure instead.
    #[serde(default)]
    pub reply_timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            bytes_limit: default_bytes_limit(),
            retry_secs: default_retry_secs(),
            reply_timeout_secs: None,
        }
    }
}

impl BackendConfig {
    /// Socket address portion of the backend URL, for binding the
    /// backend server to the same endpoint the relay dials.
    pub fn bind_addr(&self) -> &str {
        self.url
            .trim_start_matches("ws://")
            .trim_start_matches("wss://")
            .trim_end_matches('/')
    }
}

fn default_backend_url() -> String {
    "ws://127.0.0.1:8899".into()
}

const fn default_bytes_limit() -> usize {
    65_536
}

const fn default_retry_secs() -> u64 {
    15
}

// ============================================================================
// Relay Configuration
// ============================================================================

/// Settings for prompt composition and reply delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Per-message character limit toward the chat client.
    #[serde(default = "default_chunk_limit")]
    pub chunk_limit: usize,

    /// Maximum character length of a composed prompt.
    #[serde(default = "default_context_budget")]
    pub context_budget: usize,

    /// Prompt template with `{history}` and `{question}` slots.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Flat file receiving one record per completed exchange.
    #[serde(default = "default_transcript_path")]
    pub transcript_path: PathBuf,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            chunk_limit: default_chunk_limit(),
            context_budget: default_context_budget(),
            system_prompt: default_system_prompt(),
            transcript_path: default_transcript_path(),
        }
    }
}

const fn default_chunk_limit() -> usize {
    2000
}

const fn default_context_budget() -> usize {
    1024
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}

fn default_transcript_path() -> PathBuf {
    PathBuf::from("messages.log")
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Base log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format: "pretty" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Top-level Configuration
// ============================================================================

/// Unified configuration for studbot services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path, falling back to
    /// defaults when no file exists, then apply environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut config: Self = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("STUDBOT_BACKEND_URL") {
            self.backend.url = url;
        }
        if let Some(limit) = env_parse("STUDBOT_BYTES_LIMIT") {
            self.backend.bytes_limit = limit;
        }
        if let Some(secs) = env_parse("STUDBOT_RETRY_SECS") {
            self.backend.retry_secs = secs;
        }
        if let Some(secs) = env_parse("STUDBOT_REPLY_TIMEOUT_SECS") {
            self.backend.reply_timeout_secs = Some(secs);
        }
        if let Some(limit) = env_parse("STUDBOT_CHUNK_LIMIT") {
            self.relay.chunk_limit = limit;
        }
        if let Some(budget) = env_parse("STUDBOT_CONTEXT_BUDGET") {
            self.relay.context_budget = budget;
        }
        if let Ok(path) = std::env::var("STUDBOT_TRANSCRIPT_PATH") {
            self.relay.transcript_path = PathBuf::from(path);
        }
        if let Ok(level) = std::env::var("STUDBOT_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("STUDBOT_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend.url, "ws://127.0.0.1:8899");
        assert_eq!(config.backend.bytes_limit, 65_536);
        assert_eq!(config.backend.retry_secs, 15);
        assert!(config.backend.reply_timeout_secs.is_none());
        assert_eq!(config.relay.chunk_limit, 2000);
        assert_eq!(config.relay.context_budget, 1024);
        assert!(config.relay.system_prompt.contains("{history}"));
        assert!(config.relay.system_prompt.contains("{question}"));
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_from(tmp.path().join("missing.json")).unwrap();
        assert_eq!(config.relay.chunk_limit, 2000);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(
            &path,
            r#"{"backend": {"url": "ws://10.0.0.5:9000"}, "relay": {"context_budget": 500}}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.backend.url, "ws://10.0.0.5:9000");
        assert_eq!(config.backend.bytes_limit, 65_536);
        assert_eq!(config.relay.context_budget, 500);
        assert_eq!(config.relay.chunk_limit, 2000);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_bind_addr_strips_scheme() {
        let backend = BackendConfig {
            url: "ws://127.0.0.1:8899".into(),
            ..Default::default()
        };
        assert_eq!(backend.bind_addr(), "127.0.0.1:8899");

        let backend = BackendConfig {
            url: "wss://example.org:443/".into(),
            ..Default::default()
        };
        assert_eq!(backend.bind_addr(), "example.org:443");
    }
}
