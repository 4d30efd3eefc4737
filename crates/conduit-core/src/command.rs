//! The command envelope (spec §3 "Command", §4.1).
//!
//! Grounded on `examples/original_source/mirai/models/api.py`'s `ApiModel`
//! (positional-to-named argument binding, `Info.parameter_names`,
//! `ApiResponse.parse_obj`'s bare-payload wrapping) and
//! `mirai/api_provider.py`'s `Method` enum. The dynamic attribute dispatch
//! that file builds on top (`ApiMetaclass`, `__getattr__`-based proxies) is
//! replaced per Design Note 1: `conduit-macros`' `#[derive(Command)]`
//! generates the `CommandInfo` a hand-written `impl Command for Foo` would
//! otherwise have to spell out by hand, and `conduit-framework`'s proxy
//! types (`Get`/`Set`/`Paired`) stand in for `ApiModel.Proxy`.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

/// The dispatch method a command prefers (spec §3 "preferred dispatch
/// method").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// A read-style call (`GET` on HTTP-poll, `subCommand: "get"` on
    /// WebSocket).
    Get,
    /// A write-style call (`POST` on HTTP-poll, `subCommand: "update"` on
    /// WebSocket).
    Set,
    /// A RESTful call's `GET` half — same wire shape as [`Method::Get`] but
    /// distinguished so a paired command can be typed.
    RestGet,
    /// A RESTful call's `POST` half.
    RestSet,
    /// A multipart file upload. WebSocket adapters reject this
    /// (`Error::UnsupportedOperation`, spec §4.5).
    Multipart,
}

/// Static metadata about a concrete command, generated by
/// `#[derive(Command)]` from the struct's field order (spec §3 "ordered
/// list of field names for positional-argument binding").
#[derive(Debug, Clone, Copy)]
pub struct CommandInfo {
    /// The gateway's wire name, e.g. `"sendFriendMessage"`.
    pub name: &'static str,
    /// The snake_case alias the command is also indexable by.
    pub alias: &'static str,
    /// Declared field names, in declaration order, used for positional
    /// argument binding (spec §4.1).
    pub parameter_names: &'static [&'static str],
}

/// `{code, msg, data}` as the gateway returns it (spec §3 "Response").
///
/// A bare payload (no top-level `code`/`msg`) is wrapped into a zero-code
/// envelope by [`Response::from_raw`], matching `ApiResponse.parse_obj`.
#[derive(Debug, Clone)]
pub struct Response {
    pub code: i64,
    pub msg: String,
    pub data: Option<Value>,
}

impl Response {
    /// Parses a raw gateway map, treating an absent `code`/`msg` pair as a
    /// bare payload (spec §3).
    pub fn from_raw(mut raw: Value) -> Self {
        if let Value::Object(map) = &raw {
            if map.contains_key("code") && map.contains_key("msg") {
                let code = map.get("code").and_then(Value::as_i64).unwrap_or(0);
                let msg = map.get("msg").and_then(Value::as_str).unwrap_or_default().to_string();
                let data = map.get("data").cloned();
                return Self { code, msg, data };
            }
        }
        Self { code: 0, msg: String::new(), data: raw.take().into() }
    }

    /// Parses `data` into `T`, failing with `GatewayDomain` if `code != 0`
    /// (spec invariant: "A response with non-zero code never yields a
    /// typed data to the caller").
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T> {
        if self.code != 0 {
            return Err(Error::gateway_domain(self.code, self.msg));
        }
        let data = self.data.unwrap_or(Value::Null);
        serde_json::from_value(data).map_err(|e| Error::BadParameters(e.to_string()))
    }
}

/// A command: a typed wire envelope with positional-argument binding and a
/// typed response (spec §3 "Command", §4.1 `call`).
///
/// `#[derive(Command)]` generates [`CommandInfo`] from the struct's field
/// order; implementors provide the response type and (for the common case)
/// rely on the default JSON-map `to_params`.
pub trait Command: Serialize + Sized {
    /// The typed response shape `data` parses into.
    type Response: DeserializeOwned;

    /// This command's static metadata.
    fn info() -> CommandInfo;

    /// Serializes the command's fields (skipping nils) into a name/value
    /// map, the wire form every transport except multipart upload uses
    /// (spec §4.1). Override for commands with non-JSON bodies (e.g. file
    /// upload commands read a local file and emit multipart form parts).
    fn to_params(&self) -> Result<BTreeMap<String, Value>> {
        let value = serde_json::to_value(self).map_err(|e| Error::BadParameters(e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(Error::BadParameters("command must serialize to a JSON object".into()));
        };
        Ok(map.into_iter().filter(|(_, v)| !v.is_null()).collect())
    }

    /// Binds positional arguments to the declared field list, raising on
    /// overlap with `kwargs` or surplus positionals (spec §4.1's
    /// positional-to-named binding rule; P2).
    fn bind_positional(mut kwargs: BTreeMap<String, Value>, positional: Vec<Value>) -> Result<BTreeMap<String, Value>> {
        let fields = Self::info().parameter_names;
        if positional.len() > fields.len() {
            return Err(Error::BadParameters(format!(
                "`{}` takes {} positional argument(s), got {}",
                Self::info().alias,
                fields.len(),
                positional.len()
            )));
        }
        for (name, value) in fields.iter().zip(positional) {
            if kwargs.contains_key(*name) {
                return Err(Error::BadParameters(format!(
                    "`{}`: named argument `{name}` duplicates a positional argument",
                    Self::info().alias
                )));
            }
            kwargs.insert((*name).to_string(), value);
        }
        Ok(kwargs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize)]
    struct Ping {
        target: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    }

    #[derive(Deserialize)]
    struct PingResponse {
        #[allow(dead_code)]
        pong: bool,
    }

    impl Command for Ping {
        type Response = PingResponse;
        fn info() -> CommandInfo {
            CommandInfo { name: "ping", alias: "ping", parameter_names: &["target", "note"] }
        }
    }

    #[test]
    fn to_params_skips_nulls() {
        let params = Ping { target: 1, note: None }.to_params().unwrap();
        assert_eq!(params.len(), 1);
        assert!(params.contains_key("target"));
    }

    #[test]
    fn response_wraps_bare_payload() {
        let response = Response::from_raw(serde_json::json!({"pong": true}));
        assert_eq!(response.code, 0);
        assert!(response.data.is_some());
    }

    #[test]
    fn nonzero_code_never_yields_typed_data() {
        let response = Response { code: 10, msg: "no permission".into(), data: None };
        let result: Result<PingResponse> = response.into_typed();
        assert!(matches!(result, Err(Error::GatewayDomain { code: 10, .. })));
    }

    #[test]
    fn bind_positional_rejects_overlap_with_kwargs() {
        let mut kwargs = BTreeMap::new();
        kwargs.insert("target".to_string(), serde_json::json!(2));
        let result = Ping::bind_positional(kwargs, vec![serde_json::json!(1)]);
        assert!(result.is_err());
    }

    #[test]
    fn bind_positional_rejects_surplus() {
        let result = Ping::bind_positional(BTreeMap::new(), vec![serde_json::json!(1), serde_json::json!("x"), serde_json::json!("y")]);
        assert!(result.is_err());
    }
}
