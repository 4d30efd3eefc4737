//! # Conduit Gateway Adapter
//!
//! The concrete event/command catalog for a mirai-api-http-shaped gateway,
//! built on top of `conduit-core`'s generic `Adapter`/`Session`/`EventBus`
//! and `conduit-runtime`'s [`conduit_runtime::Bot`] facade. The transport
//! itself (HTTP-poll, WebSocket, WebHook, Composite) lives in
//! `conduit-transport`; this crate supplies what rides on top of it: the
//! event hierarchy, the command catalog, and the bot facade's
//! send/lookup/allow/decline/ignore convenience methods.
//!
//! ## Layout
//!
//! - [`model::entities`] — contacts and groups (`Friend`, `Group`,
//!   `GroupMember`, `Client`).
//! - [`model::event`] — the event hierarchy's concrete variants.
//! - [`model::api`] — the command catalog.
//! - [`bot_ext`] — [`bot_ext::GatewayBotExt`], the extension trait adding
//!   gateway-specific verbs to `conduit_runtime::Bot`.

pub mod bot_ext;
pub mod model;

pub use bot_ext::GatewayBotExt;
pub use model::{api::*, entities::*, event::*};
