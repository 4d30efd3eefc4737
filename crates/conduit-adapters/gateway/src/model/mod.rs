//! Concrete data models for a mirai-api-http-shaped gateway: contacts and
//! groups ([`entities`]), the event hierarchy ([`event`]), and the command
//! catalog ([`api`]). Message chains themselves live in
//! `conduit_core::message`; this module only adds the gateway-specific
//! shapes built on top of them.

pub mod api;
pub mod entities;
pub mod event;

pub use api::*;
pub use entities::*;
pub use event::*;
