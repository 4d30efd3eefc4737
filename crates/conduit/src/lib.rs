//! # Conduit
//!
//! A client-side SDK for instant-messaging gateway bots (spec's "minimal
//! core, pluggable transports" framing). One account, one [`Bot`], one
//! event bus; the transport (HTTP-poll, WebSocket, WebHook, or Composite)
//! is an implementation detail behind `conduit_core::Adapter`.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐     ┌─────────┐     ┌───────────┐
//! │  Adapter   │────▶│ Session │────▶│ EventBus  │──▶ handlers
//! │ (Transport)│◀────│         │     │ (priority,│
//! └────────────┘     └─────────┘     │ hierarchy)│
//!                          ▲          └───────────┘
//!                          │
//!                        Bot (facade)
//! ```
//!
//! - **Adapter** (`conduit-transport`): one transport implementation —
//!   HTTP-poll, WebSocket, WebHook, or Composite.
//! - **Session** (`conduit-core`): the authenticated, adapter-owning
//!   connection; the state machine and `call_api`/`emit` plumbing.
//! - **EventBus** (`conduit-core`): priority-ordered, hierarchical,
//!   type-polymorphic dispatch, with quick-response support.
//! - **Bot** (`conduit-runtime`): the facade gluing a `Session` and an
//!   `EventBus` together, plus lifecycle (`startup`/`background`/`shutdown`)
//!   and command proxy construction.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use conduit::prelude::*;
//! use conduit_core::event::HandlerOutcome;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = conduit_runtime::load_config()?;
//!     conduit_runtime::logging::init_from_config(&config.logging);
//!
//!     // An adapter crate (e.g. conduit-adapter-gateway) builds the
//!     // concrete Adapter for config.adapter and supplies its event parser.
//!     let adapter: BoxedAdapter = my_adapter_crate::from_config(&config.adapter)?;
//!     let bot = Bot::new(config.account, adapter);
//!
//!     bot.on::<MyMessageEvent>().handle(|event| async move {
//!         info!("received: {:?}", event);
//!         Ok(HandlerOutcome::cont())
//!     });
//!
//!     bot.run().await?;
//!     Ok(())
//! }
//! ```

pub use conduit_core;
pub use conduit_framework;
pub use conduit_runtime;

/// Commonly used types for building bots.
pub mod prelude {
    pub use conduit_core::{
        Adapter, BoxedAdapter, Command, Error as ConduitError, Event, EventBus, FromEvent, MessageChain, MessageComponent,
        Result as ConduitResult, Session, SessionState,
    };
    pub use conduit_framework::{Get, Paired, On, Set, on};
    pub use conduit_runtime::{Bot, ConduitConfig};
    pub use tracing::{debug, error, info, instrument, warn};
}
