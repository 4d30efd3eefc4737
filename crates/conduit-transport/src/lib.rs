//! # Conduit Transport
//!
//! The four [`conduit_core::Adapter`] implementations spec §4.4-§4.7
//! describe: long-polling HTTP, client-initiated WebSocket, server-initiated
//! WebHook, and a composite that splits command/event traffic across two
//! inner adapters.
//!
//! Each adapter is feature-gated so a deployment only pulls in the HTTP
//! client, WebSocket client, or web server stack it actually uses.
//!
//! | Feature | Adapter | Crate pulled in |
//! |---|---|---|
//! | `http-poll` | [`http_poll::HttpPollAdapter`] | `reqwest` |
//! | `websocket` | [`websocket::WebSocketAdapter`] | `tokio-tungstenite` |
//! | `webhook` | [`webhook::WebHookAdapter`] | `axum` |
//!
//! [`compose::CompositeAdapter`] is always available; it only depends on the
//! [`conduit_core::Adapter`] trait, not on any one transport's crate.

#[cfg(feature = "http-poll")]
pub mod http_poll;

#[cfg(feature = "websocket")]
pub mod websocket;

#[cfg(feature = "webhook")]
pub mod webhook;

pub mod compose;

/// Applies spec §6's host scheme auto-prepend rule: `//host` becomes
/// `http://host`, a bare host becomes `http://host`, and an explicit
/// `https://` scheme is rejected for adapters that don't support TLS
/// termination at this layer (HTTP-poll, WebSocket).
pub fn normalize_host(host: &str, allow_tls: bool) -> conduit_core::Result<String> {
    if let Some(rest) = host.strip_prefix("//") {
        return Ok(format!("http://{rest}"));
    }
    if host.starts_with("http://") {
        return Ok(host.to_string());
    }
    if host.starts_with("https://") {
        return if allow_tls {
            Ok(host.to_string())
        } else {
            Err(conduit_core::Error::BadParameters(
                "https:// is not accepted for this adapter's host".into(),
            ))
        };
    }
    Ok(format!("http://{host}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_slash_becomes_http() {
        assert_eq!(normalize_host("//localhost:8080", false).unwrap(), "http://localhost:8080");
    }

    #[test]
    fn bare_host_becomes_http() {
        assert_eq!(normalize_host("localhost:8080", false).unwrap(), "http://localhost:8080");
    }

    #[test]
    fn https_rejected_when_disallowed() {
        assert!(normalize_host("https://localhost:8080", false).is_err());
    }
}
