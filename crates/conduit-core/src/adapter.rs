//! The transport contract every adapter implements (spec §4.4-§4.7).
//!
//! Grounded on `examples/original_source/mirai/adapters/base.py`'s
//! `Adapter`/`ApiProvider` (login/logout/call_api/run, bus registration) and
//! `mirai/api_provider.py`'s `Method`. The Python `ApiProvider.__getattr__`
//! dynamic-dispatch sugar is replaced per Design Note 1 — callers go through
//! `conduit-framework`'s generated command proxies, which call
//! [`Adapter::call_api`] directly.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::command::Method;
use crate::error::Result;
use crate::event::BoxedEvent;

/// A single gateway account id (spec's `qq`).
pub type AccountId = i64;

/// The transport-specific implementation of the command and event
/// contracts (GLOSSARY "Adapter").
///
/// Implementors are the HTTP-poll, WebSocket, WebHook, and Compose adapters
/// in `conduit-transport`. `call_api` takes already-bound parameters (see
/// `conduit-core::command::Command::to_params`); adapters are not aware of
/// the command catalog's types.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// A short tag for logging/diagnostics (e.g. `"http-poll"`).
    fn kind(&self) -> &'static str;

    /// Authenticates and, for multi-bot gateways, binds the account (spec
    /// §4.4 `verify`/`bind`, §4.5 `login`).
    async fn login(&self, qq: AccountId) -> Result<()>;

    /// Releases the session, if the gateway distinguishes logout from
    /// connection teardown (spec §4.2 `shutdown`'s "transport-level
    /// logout if applicable").
    async fn logout(&self) -> Result<()>;

    /// Issues one command call (spec §4.1 `Command::call`'s transport leg).
    /// Returns `Ok(None)` for `TimeoutException`-style soft timeouts on
    /// adapters that model them that way (HTTP-poll, spec §4.4); other
    /// adapters return `Err(Error::Timeout(..))` instead (WebSocket, spec
    /// §4.5).
    async fn call_api(&self, name: &str, method: Method, params: BTreeMap<String, Value>) -> Result<Option<Value>>;

    /// Starts background event ingestion, emitting every received event via
    /// `sink` (spec §4.4/§4.5's receiver loops). Returns once ingestion is
    /// cancelled or the transport closes fatally.
    ///
    /// Takes `self: Arc<Self>`, not `&self`: the HTTP-poll adapter needs to
    /// spawn each poll tick as its own detached task (spec §4.4 "Individual
    /// polls run as detached tasks so a slow server response never stalls
    /// the poll cadence"), which requires a `'static` owned handle rather
    /// than a borrow tied to this call's stack frame.
    async fn run(self: Arc<Self>, sink: EventSink) -> Result<()>;
}

/// The quick-response futures an `emit` produced (spec §4.3 step 4),
/// returned through [`EventSink`] so a push-based adapter (WebHook) can await
/// them and write the result back as its HTTP response body.
pub type QuickResponses = Vec<JoinHandle<Value>>;

/// A shared handle adapters push inbound events through, resolving once the
/// event's handlers have run. Decoupled from `Session`/`EventBus` directly so
/// an adapter crate need not depend on the runtime crate that owns bot
/// wiring. Poll-based adapters (HTTP-poll, WebSocket) typically spawn the
/// returned future and discard its result; the WebHook adapter awaits it
/// inline to drain any quick response before replying (spec §4.6).
pub type EventSink = Arc<dyn Fn(BoxedEvent) -> Pin<Box<dyn Future<Output = QuickResponses> + Send>> + Send + Sync>;

/// A handle to a running adapter's background task, returned by
/// [`Adapter::run`] callers so `Session::shutdown` can cancel it
/// cooperatively (spec §4.2, §5 "Cancellation semantics").
pub type BoxedAdapter = Arc<dyn Adapter>;
