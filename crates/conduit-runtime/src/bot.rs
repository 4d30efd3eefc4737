//! The bot facade (spec §4.8).
//!
//! Grounded on `examples/original_source/mirai/bot.py`'s `SimpleMirai`/`Mirai`
//! (owns one adapter, one bus, `on`/`call_api`/`run`). The convenience
//! send/lookup/allow-decline-ignore methods spec §4.8 and §6 describe are
//! gateway-specific (they need concrete command/event types this crate does
//! not know about) and live as an extension trait in
//! `conduit-adapter-gateway::bot_ext` instead; this crate provides the
//! generic mechanics every adapter kind shares: one `Session`, one
//! `EventBus`, handler registration, and lifecycle control.

use std::sync::Arc;

use conduit_core::adapter::{AccountId, BoxedAdapter};
use conduit_core::event::{EventBus, FromEvent, SubscriptionId};
use conduit_core::session::{Session, SessionState};
use conduit_framework::command::{Get, Paired, Set, Upload};
use conduit_framework::handler::On;
use tokio::signal;
use tracing::info;

use crate::error::RuntimeResult;

/// Owns one [`Session`] and one [`EventBus`] for a single account (spec
/// §4.8). Generic over adapter kind; the same facade drives HTTP-poll,
/// WebSocket, WebHook, or Composite sessions.
pub struct Bot {
    session: Arc<Session>,
    bus: Arc<EventBus>,
    adapter: Arc<BoxedAdapter>,
}

impl Bot {
    /// Builds a bot around a not-yet-authenticated adapter, subscribing its
    /// one bus up front so `startup`'s "at least one subscribed bus"
    /// invariant (spec §4.2) is always satisfied.
    pub fn new(qq: AccountId, adapter: BoxedAdapter) -> Self {
        let session = Session::new(qq, adapter.clone());
        let bus = Arc::new(EventBus::new());
        session.subscribe_bus(bus.clone());
        Self { session, bus, adapter: Arc::new(adapter) }
    }

    pub fn qq(&self) -> AccountId {
        self.session.qq()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// The adapter handle command proxies bind against (spec §4.1's
    /// `Get`/`Set`/`Paired` proxies all need one).
    pub fn adapter_handle(&self) -> Arc<BoxedAdapter> {
        self.adapter.clone()
    }

    /// A read-style command proxy, e.g. `bot.command::<FriendList>()`.
    pub fn command<C>(&self) -> Get<C>
    where
        C: conduit_core::command::Command + serde::de::DeserializeOwned,
    {
        Get::new(self.adapter_handle())
    }

    /// A write-style command proxy.
    pub fn command_set<C>(&self) -> Set<C>
    where
        C: conduit_core::command::Command + serde::de::DeserializeOwned,
    {
        Set::new(self.adapter_handle())
    }

    /// A multipart upload command proxy (spec §4.1/§4.4).
    pub fn command_upload<C>(&self) -> Upload<C>
    where
        C: conduit_core::command::Command + serde::de::DeserializeOwned,
    {
        Upload::new(self.adapter_handle())
    }

    /// A paired read/write command proxy (spec §4.1 "Paired proxy").
    pub fn command_paired<CGet, CSet>(&self) -> Paired<CGet, CSet>
    where
        CGet: conduit_core::command::Command + serde::de::DeserializeOwned,
        CSet: conduit_core::command::Command + serde::de::DeserializeOwned,
    {
        Paired::new(self.adapter_handle())
    }

    /// Registers a handler for event type `E` (spec §4.3 `subscribe`, §6
    /// `bot.on`).
    pub fn on<E: FromEvent>(&self) -> On<'_, E> {
        conduit_framework::handler::on(&self.bus)
    }

    pub fn unsubscribe(&self, event_name: &'static str, id: SubscriptionId) {
        self.bus.unsubscribe(event_name, id);
    }

    /// Authenticates and launches background event ingestion (spec §4.8
    /// `startup`). Returns once ingestion has been scheduled, not once it
    /// finishes — use [`Bot::background`] or [`Bot::run`] to drive it.
    pub async fn startup(&self) -> RuntimeResult<()> {
        self.session.authenticate().await?;
        self.session.start()?;
        info!(qq = self.qq(), "bot started up");
        Ok(())
    }

    /// Runs [`Bot::startup`] then waits for ctrl-c before shutting down
    /// (spec §6 `bot.run`'s ASGI-less default: this process is its own
    /// front-end rather than hosting a separate ASGI server).
    pub async fn run(&self) -> RuntimeResult<()> {
        self.startup().await?;
        self.background().await
    }

    /// Waits for ctrl-c, then shuts the session down cooperatively (spec §5
    /// "Cancellation semantics"). Call after `startup`.
    pub async fn background(&self) -> RuntimeResult<()> {
        match signal::ctrl_c().await {
            Ok(()) => info!("received ctrl-c, shutting down"),
            Err(e) => tracing::warn!(error = %e, "failed to listen for ctrl-c, shutting down anyway"),
        }
        self.shutdown().await
    }

    /// Cancels background ingestion and logs out (spec §4.8 `shutdown`).
    /// Idempotent.
    pub async fn shutdown(&self) -> RuntimeResult<()> {
        self.session.shutdown().await?;
        Ok(())
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot").field("qq", &self.qq()).field("state", &self.state()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conduit_core::adapter::EventSink;
    use conduit_core::command::Method;
    use conduit_core::error::Result;
    use conduit_core::event::{BoxedEvent, HandlerOutcome, NamedEvent};
    use serde_json::Value;
    use std::any::Any;
    use std::collections::BTreeMap;

    struct NoopAdapter;

    #[async_trait]
    impl conduit_core::adapter::Adapter for NoopAdapter {
        fn kind(&self) -> &'static str {
            "noop"
        }
        async fn login(&self, _qq: AccountId) -> Result<()> {
            Ok(())
        }
        async fn logout(&self) -> Result<()> {
            Ok(())
        }
        async fn call_api(&self, _name: &str, _method: Method, _params: BTreeMap<String, Value>) -> Result<Option<Value>> {
            Ok(None)
        }
        async fn run(self: std::sync::Arc<Self>, _sink: EventSink) -> Result<()> {
            std::future::pending().await
        }
    }

    #[derive(Debug, Clone)]
    struct Ping;

    impl conduit_core::event::Event for Ping {
        fn event_name(&self) -> &'static str {
            "Ping"
        }
        fn type_chain(&self) -> &'static [&'static str] {
            &["Ping"]
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl NamedEvent for Ping {
        const NAME: &'static str = "Ping";
    }

    impl FromEvent for Ping {
        fn from_event(root: &dyn conduit_core::event::Event) -> Option<Self> {
            root.as_any().downcast_ref::<Ping>().cloned()
        }
    }

    #[tokio::test]
    async fn startup_requires_no_manual_subscribe() {
        let bot = Bot::new(123, Arc::new(NoopAdapter));
        assert_eq!(bot.state(), SessionState::Created);
        bot.startup().await.unwrap();
        assert_eq!(bot.state(), SessionState::Running);
    }

    #[tokio::test]
    async fn on_registers_against_the_bots_own_bus() {
        let bot = Bot::new(123, Arc::new(NoopAdapter));
        let hit = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let hit2 = hit.clone();
        bot.on::<Ping>().handle(move |_: Ping| {
            let hit = hit2.clone();
            async move {
                hit.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(HandlerOutcome::cont())
            }
        });
        bot.bus().emit(BoxedEvent::new(Ping)).await;
        assert!(hit.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let bot = Bot::new(123, Arc::new(NoopAdapter));
        bot.startup().await.unwrap();
        bot.shutdown().await.unwrap();
        bot.shutdown().await.unwrap();
        assert_eq!(bot.state(), SessionState::Closed);
    }
}
