//! Command proxies: ergonomic call-sites over `conduit_core::Command` (spec
//! §4.1 "Proxy forms").
//!
//! Grounded on `examples/original_source/mirai/models/api.py`'s
//! `ApiModel.Proxy`/`ApiGet.Proxy`/`ApiPost.Proxy`/`ApiRest.Proxy`+`Partial`.
//! The Python version is handed out by `Mirai.__getattr__`; here
//! `conduit-macros`' `#[derive(Command)]` instead generates one typed
//! accessor method per command on the bot facade (Design Note 1), each
//! returning the matching proxy type below.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use conduit_core::adapter::BoxedAdapter;
use conduit_core::command::{Command, Method};
use conduit_core::error::{Error, Result};
use serde_json::Value;

/// Issues one bound call against `adapter`, parsing the response the way
/// `conduit_core::command::Response` describes (spec §4.1 `call`).
async fn call<C: Command>(adapter: &BoxedAdapter, command: &C, method: Method) -> Result<C::Response> {
    let params = command.to_params()?;
    let info = C::info();
    let raw = adapter.call_api(info.name, method, params).await?;
    match raw {
        None => Err(Error::Timeout(info.name.to_string())),
        Some(value) => conduit_core::command::Response::from_raw(value).into_typed(),
    }
}

fn bind<C: Command>(positional: Vec<Value>, kwargs: BTreeMap<String, Value>) -> Result<C>
where
    C: serde::de::DeserializeOwned,
{
    let bound = C::bind_positional(kwargs, positional)?;
    serde_json::from_value(Value::Object(bound.into_iter().collect())).map_err(|e| Error::BadParameters(e.to_string()))
}

/// A read-style proxy (spec §4.1 "Read-style proxy"): exposes `get`, fails
/// `set` with `WrongMethod`.
pub struct Get<C> {
    adapter: Arc<BoxedAdapter>,
    _marker: PhantomData<C>,
}

impl<C> Get<C>
where
    C: Command + serde::de::DeserializeOwned,
{
    pub fn new(adapter: Arc<BoxedAdapter>) -> Self {
        Self { adapter, _marker: PhantomData }
    }

    /// Calls with the read method, binding positional args to the
    /// command's declared fields (spec §4.1 positional binding rule).
    pub async fn get_positional(&self, positional: Vec<Value>) -> Result<C::Response> {
        let command: C = bind(positional, BTreeMap::new())?;
        call(&self.adapter, &command, Method::Get).await
    }

    pub async fn get(&self, kwargs: BTreeMap<String, Value>) -> Result<C::Response> {
        let command: C = bind(Vec::new(), kwargs)?;
        call(&self.adapter, &command, Method::Get).await
    }

    /// Always fails: a read-style proxy forbids `set` (spec §4.1).
    pub async fn set(&self, _kwargs: BTreeMap<String, Value>) -> Result<C::Response> {
        Err(Error::WrongMethod(Method::Set))
    }
}

/// A write-style proxy (spec §4.1 "Write-style proxy"): exposes `set`,
/// fails `get` with `WrongMethod`.
pub struct Set<C> {
    adapter: Arc<BoxedAdapter>,
    _marker: PhantomData<C>,
}

impl<C> Set<C>
where
    C: Command + serde::de::DeserializeOwned,
{
    pub fn new(adapter: Arc<BoxedAdapter>) -> Self {
        Self { adapter, _marker: PhantomData }
    }

    pub async fn set_positional(&self, positional: Vec<Value>) -> Result<C::Response> {
        let command: C = bind(positional, BTreeMap::new())?;
        call(&self.adapter, &command, Method::Set).await
    }

    pub async fn set(&self, kwargs: BTreeMap<String, Value>) -> Result<C::Response> {
        let command: C = bind(Vec::new(), kwargs)?;
        call(&self.adapter, &command, Method::Set).await
    }

    /// Always fails: a write-style proxy forbids `get` (spec §4.1).
    pub async fn get(&self, _kwargs: BTreeMap<String, Value>) -> Result<C::Response> {
        Err(Error::WrongMethod(Method::Get))
    }
}

/// A multipart upload proxy (spec §4.1/§4.4: file-upload commands dispatch
/// via `Method::Multipart` rather than `Set`'s plain `POST`).
pub struct Upload<C> {
    adapter: Arc<BoxedAdapter>,
    _marker: PhantomData<C>,
}

impl<C> Upload<C>
where
    C: Command + serde::de::DeserializeOwned,
{
    pub fn new(adapter: Arc<BoxedAdapter>) -> Self {
        Self { adapter, _marker: PhantomData }
    }

    pub async fn upload(&self, kwargs: BTreeMap<String, Value>) -> Result<C::Response> {
        let command: C = bind(Vec::new(), kwargs)?;
        call(&self.adapter, &command, Method::Multipart).await
    }
}

/// A paired proxy (spec §4.1 "Paired proxy"): `p(common_args…)` yields a
/// `Partial` exposing both `get` (read method, primary response) and `set`
/// (write method, possibly a different response shape).
pub struct Paired<CGet, CSet> {
    adapter: Arc<BoxedAdapter>,
    _marker: PhantomData<(CGet, CSet)>,
}

impl<CGet, CSet> Paired<CGet, CSet>
where
    CGet: Command + serde::de::DeserializeOwned,
    CSet: Command + serde::de::DeserializeOwned,
{
    pub fn new(adapter: Arc<BoxedAdapter>) -> Self {
        Self { adapter, _marker: PhantomData }
    }

    /// Partially applies the common arguments shared by the `get`/`set`
    /// halves (spec §4.1 `p(common-args…)`).
    pub fn with_common(&self, common: BTreeMap<String, Value>) -> Partial<CGet, CSet> {
        Partial { adapter: self.adapter.clone(), common, _marker: PhantomData }
    }
}

/// The partially-applied pair returned by [`Paired::with_common`].
pub struct Partial<CGet, CSet> {
    adapter: Arc<BoxedAdapter>,
    common: BTreeMap<String, Value>,
    _marker: PhantomData<(CGet, CSet)>,
}

impl<CGet, CSet> Partial<CGet, CSet>
where
    CGet: Command + serde::de::DeserializeOwned,
    CSet: Command + serde::de::DeserializeOwned,
{
    pub async fn get(&self) -> Result<CGet::Response> {
        let command: CGet = bind(Vec::new(), self.common.clone())?;
        call(&self.adapter, &command, Method::RestGet).await
    }

    pub async fn set(&self, extra: BTreeMap<String, Value>) -> Result<CSet::Response> {
        let mut kwargs = self.common.clone();
        kwargs.extend(extra);
        let command: CSet = bind(Vec::new(), kwargs)?;
        call(&self.adapter, &command, Method::RestSet).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conduit_core::adapter::{AccountId, Adapter, EventSink};
    use serde::{Deserialize, Serialize};

    struct FakeAdapter {
        response: Value,
    }

    #[async_trait]
    impl Adapter for FakeAdapter {
        fn kind(&self) -> &'static str {
            "fake"
        }
        async fn login(&self, _qq: AccountId) -> Result<()> {
            Ok(())
        }
        async fn logout(&self) -> Result<()> {
            Ok(())
        }
        async fn call_api(&self, _name: &str, _method: Method, _params: BTreeMap<String, Value>) -> Result<Option<Value>> {
            Ok(Some(self.response.clone()))
        }
        async fn run(self: std::sync::Arc<Self>, _sink: EventSink) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Serialize, Deserialize)]
    struct SendFriendMessage {
        target: i64,
        #[serde(rename = "messageChain")]
        message_chain: Vec<Value>,
    }

    #[derive(Deserialize)]
    struct SendFriendMessageResponse {
        #[serde(rename = "messageId")]
        message_id: i64,
    }

    impl Command for SendFriendMessage {
        type Response = SendFriendMessageResponse;
        fn info() -> conduit_core::command::CommandInfo {
            conduit_core::command::CommandInfo {
                name: "sendFriendMessage",
                alias: "send_friend_message",
                parameter_names: &["target", "message_chain"],
            }
        }
    }

    #[tokio::test]
    async fn get_proxy_returns_typed_response() {
        let adapter: BoxedAdapter =
            Arc::new(FakeAdapter { response: serde_json::json!({"code": 0, "msg": "", "messageId": 7}) });
        let proxy = Get::<SendFriendMessage>::new(Arc::new(adapter));
        let response = proxy
            .get_positional(vec![serde_json::json!(22222222), serde_json::json!([{"type": "Plain", "text": "hi"}])])
            .await
            .unwrap();
        assert_eq!(response.message_id, 7);
    }

    #[tokio::test]
    async fn get_proxy_forbids_set() {
        let adapter: BoxedAdapter = Arc::new(FakeAdapter { response: serde_json::json!({}) });
        let proxy = Get::<SendFriendMessage>::new(Arc::new(adapter));
        let err = proxy.set(BTreeMap::new()).await.unwrap_err();
        assert!(matches!(err, Error::WrongMethod(Method::Set)));
    }

    #[tokio::test]
    async fn gateway_error_propagates() {
        let adapter: BoxedAdapter =
            Arc::new(FakeAdapter { response: serde_json::json!({"code": 10, "msg": "no permission"}) });
        let proxy = Get::<SendFriendMessage>::new(Arc::new(adapter));
        let err = proxy
            .get_positional(vec![serde_json::json!(22222222), serde_json::json!([])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::GatewayDomain { code: 10, .. }));
    }
}
