//! Conduit Framework Echo Bot Example
//!
//! Loads a gateway connection from config (`conduit.toml`, or
//! `CONDUIT_`-prefixed environment variables) and echoes every friend or
//! group message it receives back to its source.
//!
//! # Running the Example
//!
//! ```bash
//! cargo run --package echo-bot
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use conduit::conduit_core::event::HandlerOutcome;
use conduit::conduit_runtime::config::AdapterConfig;
use conduit::conduit_runtime::{self, RuntimeError, RuntimeResult};
use conduit::prelude::*;
use conduit_adapter_gateway::{FriendMessage, GatewayBotExt, GroupMessage, event_parser};
use conduit_transport::compose::{CompositeAdapter, check_shared_verify_key};
use conduit_transport::http_poll::HttpPollAdapter;
use conduit_transport::webhook::WebHookAdapter;
use conduit_transport::websocket::WebSocketAdapter;
use conduit_transport::normalize_host;

/// Builds the concrete [`BoxedAdapter`] a loaded [`AdapterConfig`] describes,
/// wiring the gateway's event parser in at every leaf.
fn build_adapter(config: &AdapterConfig) -> RuntimeResult<BoxedAdapter> {
    match config {
        AdapterConfig::HttpPoll(c) => {
            let base_url = normalize_host(&format!("{}:{}", c.host, c.port), false)?;
            let adapter = HttpPollAdapter::new(base_url, c.verify_key.clone(), c.single_mode, c.poll_interval(), event_parser())?;
            Ok(Arc::new(adapter))
        }
        AdapterConfig::Websocket(c) => {
            let host = normalize_host(&format!("{}:{}", c.host, c.port), false)?;
            let adapter = WebSocketAdapter::new(host, c.verify_key.clone(), c.sync_id.clone(), c.heartbeat_interval(), event_parser());
            Ok(Arc::new(adapter))
        }
        AdapterConfig::Webhook(c) => {
            let bind: SocketAddr = format!("{}:{}", c.host, c.port)
                .parse()
                .map_err(|e| RuntimeError::Other(format!("invalid webhook bind address: {e}")))?;
            let extra_headers = c.extra_headers.clone().into_iter().collect();
            let adapter = WebHookAdapter::new(bind, c.route.clone(), extra_headers, c.enable_quick_response, event_parser());
            Ok(Arc::new(adapter))
        }
        AdapterConfig::Composite(c) => {
            check_shared_verify_key(verify_key_of(&c.api_channel), verify_key_of(&c.event_channel))?;
            let api_channel = build_adapter(&c.api_channel)?;
            let event_channel = build_adapter(&c.event_channel)?;
            Ok(Arc::new(CompositeAdapter::new(api_channel, event_channel)))
        }
    }
}

fn verify_key_of(config: &AdapterConfig) -> Option<&str> {
    match config {
        AdapterConfig::HttpPoll(c) => c.verify_key.as_deref(),
        AdapterConfig::Websocket(c) => c.verify_key.as_deref(),
        AdapterConfig::Webhook(_) | AdapterConfig::Composite(_) => None,
    }
}

#[tokio::main]
async fn main() -> RuntimeResult<()> {
    let config = conduit_runtime::load_config()?;
    conduit_runtime::logging::init_from_config(&config.logging);

    let adapter = build_adapter(&config.adapter)?;
    let bot = Arc::new(Bot::new(config.account, adapter));

    bot.on::<FriendMessage>().handle(|event: FriendMessage| async move {
        info!(from = event.sender.id, text = %event.message_chain.as_mirai_code(), "friend message");
        Ok(HandlerOutcome::cont())
    });

    let echo_bot = bot.clone();
    bot.on::<GroupMessage>().handle(move |event: GroupMessage| {
        let bot = echo_bot.clone();
        async move {
            let group_id = event.group().id;
            info!(group = group_id, from = event.sender.id, text = %event.message_chain.as_mirai_code(), "group message");
            if let Err(e) = bot.send_group_message(group_id, event.message_chain.clone()).await {
                error!(error = %e, "failed to echo group message");
            }
            Ok(HandlerOutcome::cont())
        }
    });

    bot.run().await
}
