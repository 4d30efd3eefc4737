//! Client-initiated WebSocket adapter (spec §4.5).
//!
//! Grounded on `examples/original_source/mirai/adapters/websocket.py`'s
//! `WebSocketAdapter`: one duplex connection, a locally incrementing
//! `sync_id` correlating requests to responses, a distinguished sync-id
//! tagging event frames, and a single receiver loop. The original's
//! `_recv_dict: defaultdict(list)` plus busy-poll (`await asyncio.sleep(0)`
//! until an entry appears) is replaced with a `pending: Map<sync-id,
//! oneshot::Sender>` the receiver loop resolves directly — still one writer
//! (the receiver task) and one set of readers (command callers), matching
//! spec §5's "single-task-access" invariant without the busy loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};
use tracing::{error, info, warn};

use conduit_core::adapter::{AccountId, Adapter, EventSink};
use conduit_core::command::Method;
use conduit_core::error::{Error, Result};
use conduit_core::event::EventParser;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = futures::stream::SplitSink<WsStream, Message>;
type WsSource = futures::stream::SplitStream<WsStream>;
type Waiters = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value>>>>>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// WebSocket transport (spec §4.5).
pub struct WebSocketAdapter {
    host: String,
    verify_key: Option<String>,
    event_sync_id: String,
    heartbeat_interval: Duration,
    parser: EventParser,
    local_sync_id: AtomicI64,
    session: Mutex<Option<String>>,
    sink: AsyncMutex<Option<WsSink>>,
    source: AsyncMutex<Option<WsSource>>,
    waiters: Waiters,
    last_send: Arc<Mutex<Instant>>,
    request_timeout: Duration,
}

impl WebSocketAdapter {
    pub fn new(
        host: impl Into<String>,
        verify_key: Option<String>,
        event_sync_id: impl Into<String>,
        heartbeat_interval: Duration,
        parser: EventParser,
    ) -> Self {
        Self {
            host: host.into(),
            verify_key,
            event_sync_id: event_sync_id.into(),
            heartbeat_interval,
            parser,
            local_sync_id: AtomicI64::new(rand_offset()),
            session: Mutex::new(None),
            sink: AsyncMutex::new(None),
            source: AsyncMutex::new(None),
            waiters: Arc::new(Mutex::new(HashMap::new())),
            last_send: Arc::new(Mutex::new(Instant::now())),
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    async fn send_frame(&self, frame: Value) -> Result<()> {
        let text = serde_json::to_string(&frame).map_err(|e| Error::BadParameters(e.to_string()))?;
        let mut guard = self.sink.lock().await;
        let Some(sink) = guard.as_mut() else {
            return Err(Error::NotConfigured("websocket adapter is not connected".into()));
        };
        sink.send(Message::text(text)).await.map_err(|e| Error::NetworkTransport(e.to_string()))?;
        *self.last_send.lock() = Instant::now();
        Ok(())
    }

    /// Keep-alive frame sent when idle past `heartbeat_interval` (spec §4.5
    /// "Heartbeat"). SPEC_FULL.md resolves the §9 open question in favor of
    /// the `about` command: every known gateway build tolerates it, unlike
    /// the bare-`{}` variant.
    async fn send_heartbeat(&self) -> Result<()> {
        let sync_id = self.local_sync_id.fetch_add(1, Ordering::SeqCst).to_string();
        let frame = serde_json::json!({ "syncId": sync_id, "command": "about", "content": {} });
        self.send_frame(frame).await
    }
}

/// Awaits the response for one in-flight sync-id, enforcing spec §4.5's
/// receive timeout (default 600s) and the P7 cleanup invariant: a timed-out
/// or disconnected wait always removes its own entry from `waiters` so the
/// correlation map never leaks a dead entry.
async fn await_response(waiters: &Waiters, sync_id: String, rx: oneshot::Receiver<Result<Value>>, timeout: Duration) -> Result<Option<Value>> {
    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(result)) => result.map(Some),
        Ok(Err(_)) => {
            waiters.lock().remove(&sync_id);
            Err(Error::NetworkTransport("websocket receiver dropped the pending request".into()))
        }
        Err(_) => {
            waiters.lock().remove(&sync_id);
            Err(Error::Timeout(sync_id))
        }
    }
}

fn rand_offset() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.subsec_nanos()).unwrap_or(0);
    1000 + (nanos as i64 % 1_000_000)
}

#[async_trait]
impl Adapter for WebSocketAdapter {
    fn kind(&self) -> &'static str {
        "websocket"
    }

    async fn login(&self, qq: AccountId) -> Result<()> {
        let mut request = self.host.as_str().into_client_request().map_err(|e| Error::NetworkTransport(e.to_string()))?;
        let headers = request.headers_mut();
        if let Some(key) = &self.verify_key {
            headers.insert("verifyKey", HeaderValue::from_str(key).map_err(|e| Error::BadParameters(e.to_string()))?);
        }
        headers.insert("qq", HeaderValue::from_str(&qq.to_string()).map_err(|e| Error::BadParameters(e.to_string()))?);
        if let Some(session) = self.session.lock().clone() {
            headers.insert("sessionKey", HeaderValue::from_str(&session).map_err(|e| Error::BadParameters(e.to_string()))?);
        }

        let (stream, _) = tokio_tungstenite::connect_async(request).await.map_err(|e| Error::NetworkTransport(e.to_string()))?;
        let (sink, mut source) = stream.split();

        // The first inbound frame, with an empty syncId, carries the session
        // token (spec §4.5 "Authentication").
        let Some(Ok(Message::Text(text))) = source.next().await else {
            return Err(Error::NetworkTransport("websocket closed before verify frame".into()));
        };
        let frame: Value = serde_json::from_str(&text).map_err(|e| Error::NetworkTransport(e.to_string()))?;
        let session = frame
            .get("data")
            .and_then(|d| d.get("session"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::NetworkTransport("verify frame missing data.session".into()))?
            .to_string();
        *self.session.lock() = Some(session);

        *self.sink.lock().await = Some(sink);
        *self.source.lock().await = Some(source);

        info!(qq, "websocket adapter logged in");
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.close().await;
        }
        self.source.lock().await.take();
        Ok(())
    }

    async fn call_api(&self, name: &str, method: Method, params: std::collections::BTreeMap<String, Value>) -> Result<Option<Value>> {
        if method == Method::Multipart {
            return Err(Error::UnsupportedOperation("multipart uploads are not supported over the websocket adapter".into()));
        }

        let sync_id = self.local_sync_id.fetch_add(1, Ordering::SeqCst).to_string();
        let mut frame = serde_json::json!({
            "syncId": sync_id,
            "command": name.replace('/', "_"),
            "content": Value::Object(params.into_iter().collect()),
        });
        match method {
            Method::RestGet => frame["subCommand"] = Value::from("get"),
            Method::RestSet => frame["subCommand"] = Value::from("update"),
            _ => {}
        }

        let (tx, rx) = oneshot::channel();
        self.waiters.lock().insert(sync_id.clone(), tx);

        if let Err(e) = self.send_frame(frame).await {
            self.waiters.lock().remove(&sync_id);
            return Err(e);
        }

        await_response(&self.waiters, sync_id, rx, self.request_timeout).await
    }

    async fn run(self: Arc<Self>, sink: EventSink) -> Result<()> {
        let Some(mut source) = self.source.lock().await.take() else {
            return Err(Error::NotConfigured("websocket adapter has not logged in".into()));
        };

        let heartbeat_last_send = self.last_send.clone();
        let heartbeat_interval = self.heartbeat_interval;
        // The heartbeat needs to call back into `self` to send a frame;
        // since `run` only borrows `&self`, it runs on this same task via
        // `tokio::select!` rather than a detached spawn.
        let mut heartbeat_task = tokio::time::interval(heartbeat_interval);

        loop {
            tokio::select! {
                _ = heartbeat_task.tick() => {
                    let idle = heartbeat_last_send.lock().elapsed() >= heartbeat_interval;
                    if idle {
                        if let Err(e) = self.send_heartbeat().await {
                            warn!(error = %e, "heartbeat send failed");
                        }
                    }
                }
                frame = source.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => self.handle_frame(&text, &sink),
                        Some(Ok(Message::Close(frame))) => {
                            warn!(?frame, "websocket closed by gateway");
                            return Err(Error::NetworkTransport("websocket connection closed".into()));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(Error::NetworkTransport(e.to_string())),
                        None => return Err(Error::NetworkTransport("websocket stream ended".into())),
                    }
                }
            }
        }
    }
}

impl WebSocketAdapter {
    fn handle_frame(&self, text: &str, sink: &EventSink) {
        let frame: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "malformed websocket frame");
                return;
            }
        };
        let Some(sync_id) = frame.get("syncId").and_then(Value::as_str) else { return };
        let data = frame.get("data").cloned().unwrap_or(Value::Null);
        let domain_error = data.get("code").and_then(Value::as_i64).filter(|c| *c != 0).map(|code| {
            let msg = data.get("msg").and_then(Value::as_str).unwrap_or_default();
            Error::gateway_domain(code, msg)
        });

        if sync_id == self.event_sync_id {
            match domain_error {
                Some(e) => error!(error = %e, "event frame carried a domain error"),
                // Scheduled on a tracked task group rather than awaited
                // inline (spec §4.5 "the loop schedules session.emit(...) on
                // a tracked task group").
                None => drop(tokio::spawn(sink((self.parser)(data)))),
            }
            return;
        }

        if let Some(waiter) = self.waiters.lock().remove(sync_id) {
            let result = match domain_error {
                Some(e) => Err(e),
                None => Ok(data),
            };
            let _ = waiter.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::event::{BoxedEvent, UnknownEvent};

    fn test_adapter() -> WebSocketAdapter {
        let parser: EventParser = Arc::new(|v| BoxedEvent::new(UnknownEvent::new("Event", v.to_string().into())));
        WebSocketAdapter::new("ws://localhost/all", None, "-1", Duration::from_secs(60), parser)
    }

    fn noop_sink() -> EventSink {
        let sink: EventSink = Arc::new(|_event: BoxedEvent| Box::pin(async { Vec::new() }));
        sink
    }

    /// S4 (WebSocket correlation): two concurrently in-flight commands each
    /// resolve to their own response regardless of reply order.
    #[tokio::test]
    async fn handle_frame_routes_each_response_to_its_own_waiter() {
        let adapter = test_adapter();
        let (tx_a, rx_a) = oneshot::channel();
        let (tx_b, rx_b) = oneshot::channel();
        adapter.waiters.lock().insert("1001".to_string(), tx_a);
        adapter.waiters.lock().insert("1002".to_string(), tx_b);

        let sink = noop_sink();
        // Delivered out of order relative to issue order.
        adapter.handle_frame(r#"{"syncId":"1002","data":{"code":0,"data":"B"}}"#, &sink);
        adapter.handle_frame(r#"{"syncId":"1001","data":{"code":0,"data":"A"}}"#, &sink);

        assert_eq!(rx_a.await.unwrap().unwrap().get("data").and_then(Value::as_str), Some("A"));
        assert_eq!(rx_b.await.unwrap().unwrap().get("data").and_then(Value::as_str), Some("B"));
        assert!(adapter.waiters.lock().is_empty());
    }

    /// A non-zero `code` inside `data` fails the waiter with `GatewayDomain`
    /// instead of resolving it with the payload (spec §4.5).
    #[tokio::test]
    async fn handle_frame_resolves_domain_errors_as_failures() {
        let adapter = test_adapter();
        let (tx, rx) = oneshot::channel();
        adapter.waiters.lock().insert("7".to_string(), tx);

        adapter.handle_frame(r#"{"syncId":"7","data":{"code":10,"msg":"no permission"}}"#, &noop_sink());

        match rx.await.unwrap() {
            Err(Error::GatewayDomain { code, .. }) => assert_eq!(code, 10),
            other => panic!("expected a GatewayDomain failure, got {other:?}"),
        }
    }

    /// A frame with no matching waiter (already timed out, or a stray
    /// duplicate) is dropped rather than panicking.
    #[tokio::test]
    async fn handle_frame_ignores_unknown_sync_id() {
        let adapter = test_adapter();
        adapter.handle_frame(r#"{"syncId":"999","data":{"code":0,"data":"x"}}"#, &noop_sink());
        assert!(adapter.waiters.lock().is_empty());
    }

    /// P6 (sync-id uniqueness): sequential allocations never repeat.
    #[test]
    fn local_sync_id_is_monotonically_unique() {
        let adapter = test_adapter();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            let id = adapter.local_sync_id.fetch_add(1, Ordering::SeqCst);
            assert!(seen.insert(id), "sync id {id} was issued twice");
        }
    }

    /// P7 (timeout cleanup) / S6: a request that times out fails with
    /// `Timeout` and leaves no entry in the correlation map.
    #[tokio::test]
    async fn await_response_times_out_and_cleans_up_the_waiter() {
        let waiters: Waiters = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = oneshot::channel::<Result<Value>>();
        waiters.lock().insert("42".to_string(), tx);

        let result = await_response(&waiters, "42".to_string(), rx, Duration::from_millis(20)).await;

        assert!(matches!(result, Err(Error::Timeout(id)) if id == "42"));
        assert!(waiters.lock().is_empty());
    }

    /// A response delivered before the deadline resolves normally and still
    /// leaves the map clean (the success path removes the waiter in
    /// `handle_frame`, not in `await_response`).
    #[tokio::test]
    async fn await_response_resolves_before_timeout() {
        let waiters: Waiters = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Ok(serde_json::json!({"ok": true})));

        let result = await_response(&waiters, "1".to_string(), rx, Duration::from_secs(5)).await;
        assert_eq!(result.unwrap().unwrap().get("ok").and_then(Value::as_bool), Some(true));
    }
}
