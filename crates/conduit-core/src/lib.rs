//! # Conduit Core
//!
//! The foundational types the rest of the Conduit workspace builds on: the
//! command envelope, the event hierarchy and its bus, the session state
//! machine, the adapter contract, the error taxonomy, and the message
//! chain. See `spec.md` §3-§4 for the data model and component design these
//! types implement.
//!
//! `conduit-framework` builds the ergonomic command proxies and handler
//! registration sugar on top of this crate; `conduit-transport` implements
//! [`Adapter`] for each transport kind; `conduit-runtime` wires a `Bot`
//! facade around a [`Session`].

pub mod adapter;
pub mod command;
pub mod error;
pub mod event;
pub mod message;
pub mod session;

pub use adapter::{Adapter, AccountId, BoxedAdapter, EventSink, QuickResponses};
pub use command::{Command, CommandInfo, Method, Response};
pub use error::{Error, Result};
pub use event::{
    BoxedEvent, ControlFlow, Event, EventBus, EventParser, ErrorSink, FromEvent, HandlerError,
    HandlerOutcome, HandlerResult, NamedEvent, QuickResponseFuture, SubscriptionId, UnknownEvent,
};
pub use message::{MessageChain, MessageComponent, mirai_code};
pub use session::{Session, SessionState};

/// Prelude for common imports.
pub mod prelude {
    pub use super::adapter::*;
    pub use super::command::*;
    pub use super::error::*;
    pub use super::event::*;
    pub use super::message::*;
    pub use super::session::*;
}
