//! # Conduit Framework
//!
//! Ergonomic surface built on top of `conduit-core`: the command proxies
//! (spec §4.1's `get`/`set`/paired forms) and handler-registration sugar
//! (spec §4.3's `subscribe`, §6's `bot.on`). Neither layer adds new
//! semantics over `conduit-core`'s `Command`/`EventBus` — they exist purely
//! to make call sites read the way spec §6's condensed public surface
//! describes.

pub mod command;
pub mod handler;

pub use command::{Get, Paired, Partial, Set, Upload};
pub use handler::{On, Subscriptions, on};
