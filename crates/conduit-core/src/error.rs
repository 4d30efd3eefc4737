//! Error taxonomy (spec §7).
//!
//! Grounded on `examples/original_source/mirai/exceptions.py`: the gateway's
//! numeric response codes map to a fixed set of canonical messages, and a
//! handful of client-side failure modes (timeouts, transport errors, bad
//! local configuration) round out the taxonomy a real SDK needs.

use thiserror::Error;

/// Canonical message for a gateway domain response code, matching
/// `examples/original_source/mirai/exceptions.py`'s `API_ERROR_FMT`.
pub fn canonical_message(code: i64) -> Option<&'static str> {
    Some(match code {
        0 => "success",
        1 => "wrong verify key",
        2 => "no such bot",
        3 => "session invalid or does not exist",
        4 => "session not authenticated or not activated",
        5 => "the target of the message to send does not exist",
        6 => "no such file",
        10 => "the bot does not have permission for this operation",
        20 => "the bot is muted",
        30 => "message too long",
        400 => "bad parameters",
        500 => "internal gateway error",
        _ => return None,
    })
}

/// The crate-wide error type (spec §7).
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying transport (HTTP or WebSocket connection) failed.
    #[error("network transport error: {0}")]
    NetworkTransport(String),

    /// A call or connection attempt did not complete within its deadline.
    #[error("timed out waiting for {0}")]
    Timeout(String),

    /// The gateway responded with a non-zero `code`. `msg` is the gateway's
    /// own message if canonical_message has no entry for `code` (forward
    /// compatibility with codes this crate doesn't recognize).
    #[error("gateway error {code}: {msg}")]
    GatewayDomain { code: i64, msg: String },

    /// Arguments supplied to a command or adapter method were invalid.
    #[error("bad parameters: {0}")]
    BadParameters(String),

    /// An operation required configuration (e.g. a verify key, a host) that
    /// was not supplied.
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// The requested operation has no meaning for the adapter kind in use
    /// (e.g. calling `call_api` before a session exists for a WebHook
    /// adapter in push-only mode).
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The command was issued with a `Method` the adapter cannot service
    /// (e.g. a `MULTIPART` call against a WebSocket adapter).
    #[error("adapter does not support method {0:?} for this command")]
    WrongMethod(crate::command::Method),

    /// The session has already transitioned to `Closed` and can no longer
    /// service calls or emit events.
    #[error("session is closed")]
    SessionClosed,

    /// The resource or capability named was not available (e.g. no Session
    /// currently bound to a Bot).
    #[error("not available: {0}")]
    NotAvailable(String),
}

impl Error {
    /// Builds a [`Error::GatewayDomain`] from a response code, using the
    /// canonical message when known and falling back to the gateway's own
    /// `msg` field otherwise.
    pub fn gateway_domain(code: i64, msg: impl Into<String>) -> Self {
        let msg = canonical_message(code)
            .map(str::to_string)
            .unwrap_or_else(|| msg.into());
        Error::GatewayDomain { code, msg }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_messages_cover_spec_codes() {
        for code in [0, 1, 2, 3, 4, 5, 6, 10, 20, 30, 400, 500] {
            assert!(canonical_message(code).is_some(), "missing message for {code}");
        }
        assert!(canonical_message(999).is_none());
    }

    #[test]
    fn gateway_domain_prefers_canonical_message() {
        let err = Error::gateway_domain(1, "whatever the gateway said");
        match err {
            Error::GatewayDomain { code, msg } => {
                assert_eq!(code, 1);
                assert_eq!(msg, "wrong verify key");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn gateway_domain_falls_back_for_unknown_code() {
        let err = Error::gateway_domain(9999, "custom gateway message");
        match err {
            Error::GatewayDomain { code, msg } => {
                assert_eq!(code, 9999);
                assert_eq!(msg, "custom gateway message");
            }
            _ => panic!("wrong variant"),
        }
    }
}
