//! Layered configuration for a Conduit process (spec §6).
//!
//! One account, one adapter (of four kinds), and logging — see
//! [`schema::ConduitConfig`]. Loaded from a TOML/YAML file plus
//! `CONDUIT_`-prefixed environment overrides via [`loader::load_config`].

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, load_config, load_config_from_file};
pub use schema::{
    AdapterConfig, CompositeConfig, ConduitConfig, HttpPollConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, WebHookConfig,
    WebSocketConfig,
};
