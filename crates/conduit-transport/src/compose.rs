//! Composite adapter: splits command traffic and event traffic across two
//! inner adapters sharing one set of credentials (spec §4.7).
//!
//! Grounded on `examples/original_source/mirai/adapters/base.py`'s
//! `ComposeAdapter`, which wires an "api-channel" (e.g. HTTP-poll, for
//! reliable request/response calls) and an "event-channel" (e.g. WebHook,
//! for low-latency push) behind one `Adapter` surface.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use conduit_core::adapter::{AccountId, Adapter, BoxedAdapter, EventSink};
use conduit_core::command::Method;
use conduit_core::error::{Error, Result};

/// Binds an `api-channel` adapter (serves [`Adapter::call_api`]) and an
/// `event-channel` adapter (serves [`Adapter::run`]) behind one identity.
/// Both inner adapters must share the same verify-key (spec §4.7 invariant);
/// this is the caller's responsibility to arrange, since the key itself is
/// opaque to this adapter once the inner adapters are constructed.
pub struct CompositeAdapter {
    api_channel: BoxedAdapter,
    event_channel: BoxedAdapter,
}

impl CompositeAdapter {
    pub fn new(api_channel: BoxedAdapter, event_channel: BoxedAdapter) -> Self {
        Self { api_channel, event_channel }
    }
}

#[async_trait]
impl Adapter for CompositeAdapter {
    fn kind(&self) -> &'static str {
        self.api_channel.kind()
    }

    async fn login(&self, qq: AccountId) -> Result<()> {
        self.api_channel.login(qq).await?;
        self.event_channel.login(qq).await?;
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        let api_result = self.api_channel.logout().await;
        let event_result = self.event_channel.logout().await;
        api_result.and(event_result)
    }

    async fn call_api(&self, name: &str, method: Method, params: std::collections::BTreeMap<String, Value>) -> Result<Option<Value>> {
        self.api_channel.call_api(name, method, params).await
    }

    async fn run(self: Arc<Self>, sink: EventSink) -> Result<()> {
        self.event_channel.clone().run(sink).await
    }
}

/// Validates spec §4.7's shared-verify-key invariant before constructing a
/// [`CompositeAdapter`], given each channel's own verify-key as configured.
pub fn check_shared_verify_key(api_key: Option<&str>, event_key: Option<&str>) -> Result<()> {
    if api_key != event_key {
        return Err(Error::BadParameters("composite adapter's api-channel and event-channel must share one verify-key".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::adapter::{AccountId, EventSink};
    use conduit_core::command::Method;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn matching_verify_keys_are_accepted() {
        assert!(check_shared_verify_key(Some("k"), Some("k")).is_ok());
        assert!(check_shared_verify_key(None, None).is_ok());
    }

    #[test]
    fn mismatched_verify_keys_are_rejected() {
        assert!(matches!(check_shared_verify_key(Some("a"), Some("b")), Err(Error::BadParameters(_))));
        assert!(matches!(check_shared_verify_key(Some("a"), None), Err(Error::BadParameters(_))));
    }

    struct CountingAdapter {
        name: &'static str,
        logins: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Adapter for CountingAdapter {
        fn kind(&self) -> &'static str {
            self.name
        }
        async fn login(&self, _qq: AccountId) -> Result<()> {
            self.logins.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn logout(&self) -> Result<()> {
            Ok(())
        }
        async fn call_api(&self, name: &str, _method: Method, _params: BTreeMap<String, Value>) -> Result<Option<Value>> {
            Ok(Some(serde_json::json!({ "handled_by": self.name, "name": name })))
        }
        async fn run(self: Arc<Self>, _sink: EventSink) -> Result<()> {
            std::future::pending().await
        }
    }

    /// spec §4.7: `login` authenticates both inner adapters, and `kind`/
    /// `call_api` delegate to the api-channel only.
    #[tokio::test]
    async fn login_authenticates_both_channels_and_call_api_uses_the_api_channel() {
        let api_logins = Arc::new(AtomicUsize::new(0));
        let event_logins = Arc::new(AtomicUsize::new(0));
        let composite = CompositeAdapter::new(
            Arc::new(CountingAdapter { name: "api", logins: api_logins.clone() }),
            Arc::new(CountingAdapter { name: "event", logins: event_logins.clone() }),
        );

        composite.login(1).await.unwrap();
        assert_eq!(api_logins.load(Ordering::SeqCst), 1);
        assert_eq!(event_logins.load(Ordering::SeqCst), 1);

        assert_eq!(composite.kind(), "api");

        let response = composite.call_api("ping", Method::Get, BTreeMap::new()).await.unwrap().unwrap();
        assert_eq!(response.get("handled_by").and_then(Value::as_str), Some("api"));
    }
}
