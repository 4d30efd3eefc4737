//! Procedural macros for the Conduit bot framework.
//!
//! This crate provides:
//!
//! - `#[derive(Event)]` — implements `conduit_core::event::{Event, NamedEvent,
//!   FromEvent}` from a static name and ancestor chain.
//! - `#[derive(Command)]` — implements `conduit_core::command::Command` from
//!   a struct's field order (Design Note 1: replaces the dynamic attribute
//!   dispatch the original's `ApiMetaclass` builds at runtime).
//!
//! ```rust,ignore
//! use conduit_macros::{Command, Event};
//!
//! #[derive(Clone, Serialize, Deserialize, Event)]
//! #[event(name = "FriendMessage", chain = "FriendMessage, MessageEvent, Event")]
//! pub struct FriendMessage {
//!     pub sender: Friend,
//!     pub message_chain: MessageChain,
//!     #[event(raw_json)]
//!     #[serde(skip)]
//!     raw: Option<std::sync::Arc<str>>,
//! }
//!
//! #[derive(Serialize, Deserialize, Command)]
//! #[command(name = "sendFriendMessage", alias = "send_friend_message", response = "SendMessageResponse")]
//! pub struct SendFriendMessage {
//!     pub target: i64,
//!     pub message_chain: MessageChain,
//! }
//! ```

mod command;
mod event;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives `Event`, `NamedEvent`, and `FromEvent` for a concrete event
/// struct.
///
/// # Container attribute `#[event(…)]`
///
/// - `name = "…"` — the event's wire/dispatch name.
/// - `chain = "Self, Parent, ..., Event"` — the full ancestor chain, nearest
///   first, matching how the event bus walks registrations per type.
///
/// # Field attribute `#[event(raw_json)]`
///
/// Marks an `Option<Arc<str>>` field holding the event's original JSON, used
/// by `FromEvent` to re-parse into an ancestor type when no exact downcast
/// matches.
#[proc_macro_derive(Event, attributes(event))]
pub fn derive_event(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match event::derive_event(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Derives `Command` for a struct, generating `CommandInfo` from its field
/// declaration order.
///
/// # Container attribute `#[command(…)]`
///
/// - `name = "…"` — the wire command name.
/// - `alias = "…"` — the snake_case method alias (defaults to `name`
///   converted to snake_case).
/// - `response = "…"` — the associated `Command::Response` type name.
///
/// # Field attribute `#[command(skip)]`
///
/// Excludes a field from `parameter_names` (and therefore from positional
/// binding).
#[proc_macro_derive(Command, attributes(command))]
pub fn derive_command(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match command::derive_command(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
