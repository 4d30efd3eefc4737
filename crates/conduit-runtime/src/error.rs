//! Runtime error types: wraps [`conduit_core::Error`] and
//! [`crate::config::ConfigError`] behind one boundary for `bot.rs` and
//! `main`-level callers.

use thiserror::Error;

/// Errors surfaced by the bot facade, beyond the two crates it wraps.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Core(#[from] conduit_core::Error),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("{0}")]
    Other(String),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
