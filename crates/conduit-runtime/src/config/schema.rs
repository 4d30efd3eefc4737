//! Configuration schema (spec §6 "Environment / config").
//!
//! Grounded on the teacher's figment-based layered schema, narrowed to the
//! option set spec §6 actually recognizes: one account, one adapter (whose
//! `kind` selects which fields apply), and logging. The teacher's
//! `adapters: HashMap<String, Value>` escape hatch and multi-bot `BotConfig`
//! list are dropped — this SDK's `Bot` owns exactly one `Session` (§4.8), so
//! there is exactly one adapter section, not a registry of them.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::error::{ConfigError, ConfigResult};

/// Root configuration (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConduitConfig {
    /// The bot's QQ number.
    pub account: i64,

    /// The single adapter this process drives.
    pub adapter: AdapterConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Default for ConduitConfig {
    fn default() -> Self {
        Self { account: 0, adapter: AdapterConfig::default(), logging: LoggingConfig::default() }
    }
}

impl ConduitConfig {
    /// Validates cross-field invariants the schema itself can't express
    /// (spec §6, §4.7's shared-verify-key rule for composite adapters).
    pub fn validate(&self) -> ConfigResult<()> {
        if self.account <= 0 {
            return Err(ConfigError::missing_field("account"));
        }
        self.adapter.validate()
    }
}

/// Which transport this process drives, and that transport's options
/// (spec §6 "adapter kind").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AdapterConfig {
    HttpPoll(HttpPollConfig),
    Websocket(WebSocketConfig),
    Webhook(WebHookConfig),
    Composite(CompositeConfig),
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self::HttpPoll(HttpPollConfig::default())
    }
}

impl AdapterConfig {
    fn validate(&self) -> ConfigResult<()> {
        match self {
            Self::HttpPoll(c) => c.validate(),
            Self::Websocket(c) => c.validate(),
            Self::Webhook(c) => c.validate(),
            Self::Composite(c) => c.validate(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_poll_interval() -> f64 {
    1.0
}

fn default_sync_id() -> String {
    "-1".to_string()
}

fn default_heartbeat_secs() -> u64 {
    60
}

fn default_route() -> String {
    "/".to_string()
}

fn default_true() -> bool {
    true
}

/// HTTP-poll adapter options (spec §4.4, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpPollConfig {
    pub verify_key: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub single_mode: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: f64,
}

impl Default for HttpPollConfig {
    fn default() -> Self {
        Self { verify_key: None, host: default_host(), port: 8080, single_mode: false, poll_interval_secs: default_poll_interval() }
    }
}

impl HttpPollConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs.max(0.0))
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        if self.poll_interval_secs <= 0.0 {
            return Err(ConfigError::validation("poll-interval must be greater than 0"));
        }
        Ok(())
    }
}

/// WebSocket adapter options (spec §4.5, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketConfig {
    pub verify_key: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    #[serde(default = "default_sync_id")]
    pub sync_id: String,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_interval_secs: u64,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self { verify_key: None, host: default_host(), port: 8080, sync_id: default_sync_id(), heartbeat_interval_secs: default_heartbeat_secs() }
    }
}

impl WebSocketConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        if self.sync_id.is_empty() {
            return Err(ConfigError::missing_field("sync-id"));
        }
        Ok(())
    }
}

/// WebHook adapter options (spec §4.6, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebHookConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    #[serde(default = "default_route")]
    pub route: String,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
    #[serde(default = "default_true")]
    pub enable_quick_response: bool,
}

impl Default for WebHookConfig {
    fn default() -> Self {
        Self { host: default_host(), port: 8080, route: default_route(), extra_headers: HashMap::new(), enable_quick_response: true }
    }
}

impl WebHookConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        if !self.route.starts_with('/') {
            return Err(ConfigError::validation("route must start with '/'"));
        }
        Ok(())
    }
}

/// Composite adapter options (spec §4.7): an api-channel and an
/// event-channel, each itself one of the other three kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeConfig {
    pub api_channel: Box<AdapterConfig>,
    pub event_channel: Box<AdapterConfig>,
}

impl CompositeConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.api_channel.validate()?;
        self.event_channel.validate()?;
        if verify_key_of(&self.api_channel) != verify_key_of(&self.event_channel) {
            return Err(ConfigError::validation(
                "composite adapter's api-channel and event-channel must share one verify-key",
            ));
        }
        Ok(())
    }
}

fn verify_key_of(adapter: &AdapterConfig) -> Option<&str> {
    match adapter {
        AdapterConfig::HttpPoll(c) => c.verify_key.as_deref(),
        AdapterConfig::Websocket(c) => c.verify_key.as_deref(),
        AdapterConfig::Webhook(_) => None,
        AdapterConfig::Composite(_) => None,
    }
}

// =============================================================================
// Logging configuration
// =============================================================================

/// Logging configuration, kept close to the teacher's `tracing-subscriber`
/// builder shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    pub timestamps: bool,
    pub file_location: bool,

    /// Module-specific log level overrides, e.g. `{"conduit_transport": "debug"}`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,

    /// Log file path (only used when output is "file").
    pub file_path: Option<std::path::PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            output: LogOutput::Stdout,
            timestamps: true,
            file_location: false,
            filters: HashMap::new(),
            file_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_except_account() {
        let config = ConduitConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::MissingField { .. })));
    }

    #[test]
    fn composite_requires_matching_verify_key() {
        let config = CompositeConfig {
            api_channel: Box::new(AdapterConfig::HttpPoll(HttpPollConfig { verify_key: Some("a".into()), ..Default::default() })),
            event_channel: Box::new(AdapterConfig::Websocket(WebSocketConfig { verify_key: Some("b".into()), ..Default::default() })),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn composite_accepts_matching_verify_key() {
        let config = CompositeConfig {
            api_channel: Box::new(AdapterConfig::HttpPoll(HttpPollConfig { verify_key: Some("shared".into()), ..Default::default() })),
            event_channel: Box::new(AdapterConfig::Websocket(WebSocketConfig { verify_key: Some("shared".into()), ..Default::default() })),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn adapter_kind_tag_round_trips() {
        let value = serde_json::json!({"kind": "websocket", "host": "example.com", "port": 8080});
        let config: AdapterConfig = serde_json::from_value(value).unwrap();
        assert!(matches!(config, AdapterConfig::Websocket(_)));
    }
}
