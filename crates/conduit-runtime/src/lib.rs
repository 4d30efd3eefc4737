//! Conduit Runtime: the `Bot` facade, layered configuration, and logging
//! setup for a single gateway account (spec §4.8, §6).
//!
//! This crate wires `conduit-core`'s session/event machinery and
//! `conduit-framework`'s command proxies into one entry point, [`Bot`], and
//! supplies the ambient concerns a real process needs around it: a
//! figment-based config schema ([`config`]) and a `tracing`-based logging
//! setup ([`logging`]). It does not know about any one gateway's concrete
//! event/command catalog — that lives in an adapter crate such as
//! `conduit-adapter-gateway`, built on top of the generic [`Bot`] here.

pub mod bot;
pub mod config;
pub mod error;
pub mod logging;

pub use bot::Bot;
pub use config::{ConduitConfig, ConfigError, ConfigLoader, ConfigResult, load_config, load_config_from_file};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};

// Re-exported so downstream crates can log without a direct `tracing`
// dependency of their own.
pub use tracing;
pub use tracing_subscriber;

/// Commonly used logging macros and types, for a single `use conduit_runtime::prelude::*`.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
