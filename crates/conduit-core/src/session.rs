//! The authenticated, adapter-owning connection for one account (spec §3
//! "Session", §4.2).
//!
//! Grounded on `examples/original_source/mirai/adapters/base.py`'s
//! `Adapter.run`/`_before_run` (bus-before-run invariant, cooperative
//! lifecycle) restated as the explicit state machine spec §4.2 calls for —
//! the original has no such enum, tracking readiness only via
//! `self.session` being non-empty.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::adapter::{AccountId, BoxedAdapter};
use crate::command::Method;
use crate::error::{Error, Result};
use crate::event::{BoxedEvent, EventBus};
use serde_json::Value;
use std::collections::BTreeMap;

/// `Created → Authenticated → Running ⇄ [transient-reconnect] → Closed`
/// (spec §4.2 "State machine").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Created = 0,
    Authenticated = 1,
    Running = 2,
    Closed = 3,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Created,
            1 => SessionState::Authenticated,
            2 => SessionState::Running,
            _ => SessionState::Closed,
        }
    }
}

/// A logical, authenticated connection for one account over one adapter
/// (spec §3 "Session").
pub struct Session {
    qq: AccountId,
    adapter: BoxedAdapter,
    buses: Mutex<Vec<Arc<EventBus>>>,
    state: AtomicU8,
    background: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl Session {
    /// A session in `Created` state, not yet authenticated.
    pub fn new(qq: AccountId, adapter: BoxedAdapter) -> Arc<Self> {
        Arc::new(Self {
            qq,
            adapter,
            buses: Mutex::new(Vec::new()),
            state: AtomicU8::new(SessionState::Created as u8),
            background: Mutex::new(None),
        })
    }

    pub fn qq(&self) -> AccountId {
        self.qq
    }

    pub fn adapter(&self) -> &BoxedAdapter {
        &self.adapter
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Subscribes a bus; events this session ingests fan out to every
    /// subscribed bus (spec data model "subscriptions: set<bus>").
    pub fn subscribe_bus(&self, bus: Arc<EventBus>) {
        let mut buses = self.buses.lock();
        if !buses.iter().any(|b| Arc::ptr_eq(b, &bus)) {
            buses.push(bus);
        }
    }

    pub fn unsubscribe_bus(&self, bus: &Arc<EventBus>) {
        self.buses.lock().retain(|b| !Arc::ptr_eq(b, bus));
    }

    /// Authenticates against the adapter, transitioning `Created →
    /// Authenticated`.
    pub async fn authenticate(self: &Arc<Self>) -> Result<()> {
        self.adapter.login(self.qq).await?;
        self.set_state(SessionState::Authenticated);
        Ok(())
    }

    /// Launches background event ingestion (spec §4.2 `start`). Requires at
    /// least one subscribed bus; fails with `NotConfigured` otherwise
    /// (spec invariant "Every active session has at least one subscribed
    /// bus before background ingestion starts").
    pub fn start(self: &Arc<Self>) -> Result<()> {
        if self.buses.lock().is_empty() {
            return Err(Error::NotConfigured("session has no subscribed event bus".into()));
        }
        if self.state() == SessionState::Closed {
            return Err(Error::SessionClosed);
        }

        let this = self.clone();
        let handle = tokio::spawn(async move {
            let sink_session = this.clone();
            let sink: crate::adapter::EventSink = Arc::new(move |event: BoxedEvent| {
                let session = sink_session.clone();
                Box::pin(async move { session.emit(event).await })
            });
            this.adapter.clone().run(sink).await
        });
        *self.background.lock() = Some(handle);
        self.set_state(SessionState::Running);
        Ok(())
    }

    /// Forwards a command call to the adapter (spec §4.2 `call_api`).
    pub async fn call_api(&self, name: &str, method: Method, params: BTreeMap<String, Value>) -> Result<Option<Value>> {
        if self.state() == SessionState::Closed {
            return Err(Error::SessionClosed);
        }
        self.adapter.call_api(name, method, params).await
    }

    /// Fans `event` out to every subscribed bus concurrently, returning the
    /// union of their quick-response futures (spec §4.2 `emit`).
    pub async fn emit(&self, event: BoxedEvent) -> Vec<tokio::task::JoinHandle<serde_json::Value>> {
        let buses: Vec<Arc<EventBus>> = self.buses.lock().iter().cloned().collect();
        let mut results = Vec::new();
        let futures = buses.into_iter().map(|bus| {
            let event = event.clone();
            async move { bus.emit(event).await }
        });
        for handles in futures::future::join_all(futures).await {
            results.extend(handles);
        }
        results
    }

    /// Cancels background ingestion cooperatively and releases the
    /// transport-level session, transitioning to `Closed` (spec §4.2
    /// `shutdown`). Idempotent (spec §5 "Cancellation semantics").
    pub async fn shutdown(self: &Arc<Self>) -> Result<()> {
        if self.state() == SessionState::Closed {
            return Ok(());
        }
        let handle = self.background.lock().take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
        let result = self.adapter.logout().await;
        self.set_state(SessionState::Closed);
        result
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("qq", &self.qq).field("state", &self.state()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::EventSink;
    use async_trait::async_trait;

    struct StubAdapter;

    #[async_trait]
    impl crate::adapter::Adapter for StubAdapter {
        fn kind(&self) -> &'static str {
            "stub"
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
        async fn run(self: Arc<Self>, _sink: EventSink) -> Result<()> {
            std::future::pending().await
        }
    }

    /// Spec invariant: "Every active session has at least one subscribed
    /// bus before background ingestion starts."
    #[tokio::test]
    async fn start_without_a_subscribed_bus_fails_with_not_configured() {
        let session = Session::new(1, Arc::new(StubAdapter));
        assert!(matches!(session.start(), Err(Error::NotConfigured(_))));
        assert_eq!(session.state(), SessionState::Created);
    }

    #[tokio::test]
    async fn full_lifecycle_transitions_through_every_state() {
        let session = Session::new(1, Arc::new(StubAdapter));
        session.subscribe_bus(Arc::new(EventBus::new()));
        assert_eq!(session.state(), SessionState::Created);

        session.authenticate().await.unwrap();
        assert_eq!(session.state(), SessionState::Authenticated);

        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Running);

        session.shutdown().await.unwrap();
        assert_eq!(session.state(), SessionState::Closed);
    }

    /// `shutdown` is idempotent (spec §5 "Cancellation semantics") and a
    /// closed session rejects further operations with `SessionClosed`.
    #[tokio::test]
    async fn shutdown_is_idempotent_and_closed_session_rejects_calls() {
        let session = Session::new(1, Arc::new(StubAdapter));
        session.subscribe_bus(Arc::new(EventBus::new()));
        session.start().unwrap();

        session.shutdown().await.unwrap();
        session.shutdown().await.unwrap();
        assert_eq!(session.state(), SessionState::Closed);

        assert!(matches!(session.start(), Err(Error::SessionClosed)));
        assert!(matches!(session.call_api("foo", Method::Get, BTreeMap::new()).await, Err(Error::SessionClosed)));
    }

    /// `emit` fans an event out to every subscribed bus concurrently (spec
    /// §4.2 `emit`).
    #[tokio::test]
    async fn emit_fans_out_to_every_subscribed_bus() {
        use crate::event::{BoxedEvent, Event, HandlerOutcome, NamedEvent};
        use std::any::Any;
        use std::sync::atomic::{AtomicUsize, Ordering};

        #[derive(Debug, Clone)]
        struct Ping;
        impl Event for Ping {
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
        impl crate::event::FromEvent for Ping {
            fn from_event(root: &dyn Event) -> Option<Self> {
                root.as_any().downcast_ref::<Ping>().cloned()
            }
        }

        let session = Session::new(1, Arc::new(StubAdapter));
        let bus_a = Arc::new(EventBus::new());
        let bus_b = Arc::new(EventBus::new());
        let hits = Arc::new(AtomicUsize::new(0));

        for bus in [&bus_a, &bus_b] {
            let h = hits.clone();
            bus.subscribe::<Ping, _, _>(0, move |_: Ping| {
                let h = h.clone();
                async move {
                    h.fetch_add(1, Ordering::SeqCst);
                    Ok(HandlerOutcome::cont())
                }
            });
            session.subscribe_bus(bus.clone());
        }

        session.emit(BoxedEvent::new(Ping)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
