//! Concrete event catalog: a representative slice of the gateway's event
//! hierarchy, not the full ~40-type catalog (spec §1 excludes the closed
//! command/event catalog from the core; this crate supplies real call
//! sites for it).
//!
//! Grounded on `examples/original_source/mirai/models/events.py`. Each
//! struct's `#[event(chain = "...")]` mirrors that file's class hierarchy
//! (`FriendMessage` extends `MessageEvent` extends `Event`, etc.), and the
//! ancestor markers below (`BotEvent`, `GroupEvent`, `MessageEvent`,
//! `RequestEvent`) give the bus's hierarchical dispatch (a handler on
//! `MessageEvent` also receives `FriendMessage`) an actual subscribable
//! type at each level, matching the original's `bus.on(MessageEvent)`
//! behavior. `FriendEvent` has no marker: the original's own `FriendEvent`
//! subclasses (`FriendNickChangedEvent` and friends) aren't in this
//! catalog, and `FriendRecallEvent` extends `Event` directly in the
//! original too.

use std::sync::Arc;

use conduit_core::event::{BoxedEvent, Event as CoreEvent, EventParser, FromEvent, NamedEvent, UnknownEvent};
use conduit_core::message::MessageChain;
use conduit_macros::Event;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::model::entities::{Client, Friend, Group, GroupMember, Subject};

// ---------------------------------------------------------------------
// Bot lifecycle events
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "BotOnlineEvent", chain = "BotOnlineEvent, BotEvent, Event")]
pub struct BotOnlineEvent {
    pub qq: i64,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "BotOfflineEventActive", chain = "BotOfflineEventActive, BotEvent, Event")]
pub struct BotOfflineEventActive {
    pub qq: i64,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "BotOfflineEventForce", chain = "BotOfflineEventForce, BotEvent, Event")]
pub struct BotOfflineEventForce {
    pub qq: i64,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "BotOfflineEventDropped", chain = "BotOfflineEventDropped, BotEvent, Event")]
pub struct BotOfflineEventDropped {
    pub qq: i64,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "BotReloginEvent", chain = "BotReloginEvent, BotEvent, Event")]
pub struct BotReloginEvent {
    pub qq: i64,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

// ---------------------------------------------------------------------
// Friend / group notice events
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "FriendRecallEvent", chain = "FriendRecallEvent, Event")]
pub struct FriendRecallEvent {
    pub author_id: i64,
    pub message_id: i64,
    pub time: i64,
    /// The friend's QQ, or the bot's own, if the bot recalled it.
    pub operator: i64,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "GroupRecallEvent", chain = "GroupRecallEvent, GroupEvent, Event")]
pub struct GroupRecallEvent {
    pub author_id: i64,
    pub message_id: i64,
    pub time: i64,
    pub group: Group,
    /// `None` if the bot itself recalled the message.
    pub operator: Option<GroupMember>,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "MemberJoinEvent", chain = "MemberJoinEvent, GroupEvent, Event")]
pub struct MemberJoinEvent {
    pub member: GroupMember,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "MemberLeaveEventKick", chain = "MemberLeaveEventKick, GroupEvent, Event")]
pub struct MemberLeaveEventKick {
    pub member: GroupMember,
    pub operator: Option<GroupMember>,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "MemberLeaveEventQuit", chain = "MemberLeaveEventQuit, GroupEvent, Event")]
pub struct MemberLeaveEventQuit {
    pub member: GroupMember,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "BotMuteEvent", chain = "BotMuteEvent, GroupEvent, Event")]
pub struct BotMuteEvent {
    pub duration_seconds: i64,
    pub operator: Option<GroupMember>,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "BotUnmuteEvent", chain = "BotUnmuteEvent, GroupEvent, Event")]
pub struct BotUnmuteEvent {
    pub operator: Option<GroupMember>,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

// ---------------------------------------------------------------------
// Message events
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "FriendMessage", chain = "FriendMessage, MessageEvent, Event")]
pub struct FriendMessage {
    pub sender: Friend,
    pub message_chain: MessageChain,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "GroupMessage", chain = "GroupMessage, MessageEvent, Event")]
pub struct GroupMessage {
    pub sender: GroupMember,
    pub message_chain: MessageChain,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

impl GroupMessage {
    pub fn group(&self) -> &Group {
        &self.sender.group
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "TempMessage", chain = "TempMessage, MessageEvent, Event")]
pub struct TempMessage {
    pub sender: GroupMember,
    pub message_chain: MessageChain,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "OtherClientMessage", chain = "OtherClientMessage, MessageEvent, Event")]
pub struct OtherClientMessage {
    pub sender: Client,
    pub message_chain: MessageChain,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

// ---------------------------------------------------------------------
// Request-approval events
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "NewFriendRequestEvent", chain = "NewFriendRequestEvent, RequestEvent, Event")]
pub struct NewFriendRequestEvent {
    pub event_id: i64,
    pub from_id: i64,
    pub group_id: i64,
    pub nick: String,
    pub message: String,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "MemberJoinRequestEvent", chain = "MemberJoinRequestEvent, RequestEvent, Event")]
pub struct MemberJoinRequestEvent {
    pub event_id: i64,
    pub from_id: i64,
    pub group_id: i64,
    pub group_name: String,
    pub nick: String,
    pub message: String,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "BotInvitedJoinGroupRequestEvent", chain = "BotInvitedJoinGroupRequestEvent, RequestEvent, Event")]
pub struct BotInvitedJoinGroupRequestEvent {
    pub event_id: i64,
    pub from_id: i64,
    pub group_id: i64,
    pub group_name: String,
    pub nick: String,
    pub message: String,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

// ---------------------------------------------------------------------
// Command / nudge events
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "CommandExecutedEvent", chain = "CommandExecutedEvent, Event")]
pub struct CommandExecutedEvent {
    pub name: String,
    pub friend: Option<Friend>,
    pub member: Option<GroupMember>,
    pub args: MessageChain,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
#[event(name = "NudgeEvent", chain = "NudgeEvent, Event")]
pub struct NudgeEvent {
    pub from_id: i64,
    pub target: i64,
    pub subject: Subject,
    pub action: String,
    pub suffix: String,
    #[event(raw_json)]
    #[serde(skip)]
    pub(crate) raw: Option<Arc<str>>,
}

// ---------------------------------------------------------------------
// Ancestor marker types
// ---------------------------------------------------------------------
//
// These give each category named in a `chain = "..."` above an actual
// subscribable type: `EventBus::subscribe::<E, _, _>` buckets handlers by
// `E::NAME`, so without a type here, nothing has `NAME == "MessageEvent"`
// and a handler can never be registered at that level. `from_event` is
// built by downcasting the root to each known concrete descendant rather
// than re-parsing `raw_json`, so it also works for events constructed
// in-process without a `raw` payload (as every test here does).

#[derive(Debug, Clone)]
pub struct BotEvent {
    pub qq: i64,
}

impl NamedEvent for BotEvent {
    const NAME: &'static str = "BotEvent";
}

impl FromEvent for BotEvent {
    fn from_event(root: &dyn CoreEvent) -> Option<Self> {
        let any = root.as_any();
        if let Some(e) = any.downcast_ref::<BotOnlineEvent>() {
            return Some(Self { qq: e.qq });
        }
        if let Some(e) = any.downcast_ref::<BotOfflineEventActive>() {
            return Some(Self { qq: e.qq });
        }
        if let Some(e) = any.downcast_ref::<BotOfflineEventForce>() {
            return Some(Self { qq: e.qq });
        }
        if let Some(e) = any.downcast_ref::<BotOfflineEventDropped>() {
            return Some(Self { qq: e.qq });
        }
        if let Some(e) = any.downcast_ref::<BotReloginEvent>() {
            return Some(Self { qq: e.qq });
        }
        None
    }
}

/// The original's `GroupEvent` famously has no field of its own (its
/// `group` accessor is a dynamic fallback, not a real attribute); every
/// group-notice event here is only reachable through `type_chain`.
#[derive(Debug, Clone, Default)]
pub struct GroupEvent;

impl NamedEvent for GroupEvent {
    const NAME: &'static str = "GroupEvent";
}

impl FromEvent for GroupEvent {
    fn from_event(root: &dyn CoreEvent) -> Option<Self> {
        root.type_chain().contains(&"GroupEvent").then_some(Self)
    }
}

#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub message_chain: MessageChain,
}

impl NamedEvent for MessageEvent {
    const NAME: &'static str = "MessageEvent";
}

impl FromEvent for MessageEvent {
    fn from_event(root: &dyn CoreEvent) -> Option<Self> {
        let any = root.as_any();
        if let Some(e) = any.downcast_ref::<FriendMessage>() {
            return Some(Self { message_chain: e.message_chain.clone() });
        }
        if let Some(e) = any.downcast_ref::<GroupMessage>() {
            return Some(Self { message_chain: e.message_chain.clone() });
        }
        if let Some(e) = any.downcast_ref::<TempMessage>() {
            return Some(Self { message_chain: e.message_chain.clone() });
        }
        if let Some(e) = any.downcast_ref::<OtherClientMessage>() {
            return Some(Self { message_chain: e.message_chain.clone() });
        }
        None
    }
}

#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub event_id: i64,
    pub from_id: i64,
    pub group_id: i64,
}

impl NamedEvent for RequestEvent {
    const NAME: &'static str = "RequestEvent";
}

impl FromEvent for RequestEvent {
    fn from_event(root: &dyn CoreEvent) -> Option<Self> {
        let any = root.as_any();
        if let Some(e) = any.downcast_ref::<NewFriendRequestEvent>() {
            return Some(Self { event_id: e.event_id, from_id: e.from_id, group_id: e.group_id });
        }
        if let Some(e) = any.downcast_ref::<MemberJoinRequestEvent>() {
            return Some(Self { event_id: e.event_id, from_id: e.from_id, group_id: e.group_id });
        }
        if let Some(e) = any.downcast_ref::<BotInvitedJoinGroupRequestEvent>() {
            return Some(Self { event_id: e.event_id, from_id: e.from_id, group_id: e.group_id });
        }
        None
    }
}

// ---------------------------------------------------------------------
// Event subtype registry
// ---------------------------------------------------------------------

/// Builds the [`EventParser`] every transport adapter needs at construction
/// time (spec §4.3 "Dispatch for raw events"): reads the wire `type`
/// discriminator, deserializes into the matching concrete struct above, and
/// stamps its `raw` field with the original JSON so [`FromEvent`](conduit_core::event::FromEvent)
/// can later re-derive ancestor-typed views. A discriminator this catalog
/// doesn't carry, or one that fails to deserialize against its own shape,
/// degrades to [`UnknownEvent`] rather than dropping the event.
pub fn event_parser() -> EventParser {
    Arc::new(parse_event)
}

fn parse_event(value: Value) -> BoxedEvent {
    let type_name = value.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
    let raw: Arc<str> = Arc::from(value.to_string());

    macro_rules! try_parse {
        ($ty:ty) => {
            if type_name == <$ty as NamedEvent>::NAME {
                return match serde_json::from_value::<$ty>(value) {
                    Ok(mut event) => {
                        event.raw = Some(raw);
                        BoxedEvent::new(event)
                    }
                    Err(error) => {
                        warn!(r#type = %type_name, %error, "known event type failed to parse, degrading to UnknownEvent");
                        BoxedEvent::new(UnknownEvent::new(type_name, raw))
                    }
                };
            }
        };
    }

    try_parse!(BotOnlineEvent);
    try_parse!(BotOfflineEventActive);
    try_parse!(BotOfflineEventForce);
    try_parse!(BotOfflineEventDropped);
    try_parse!(BotReloginEvent);
    try_parse!(FriendRecallEvent);
    try_parse!(GroupRecallEvent);
    try_parse!(MemberJoinEvent);
    try_parse!(MemberLeaveEventKick);
    try_parse!(MemberLeaveEventQuit);
    try_parse!(BotMuteEvent);
    try_parse!(BotUnmuteEvent);
    try_parse!(FriendMessage);
    try_parse!(GroupMessage);
    try_parse!(TempMessage);
    try_parse!(OtherClientMessage);
    try_parse!(NewFriendRequestEvent);
    try_parse!(MemberJoinRequestEvent);
    try_parse!(BotInvitedJoinGroupRequestEvent);
    try_parse!(CommandExecutedEvent);
    try_parse!(NudgeEvent);

    warn!(r#type = %type_name, "unrecognized event type, degrading to UnknownEvent");
    BoxedEvent::new(UnknownEvent::new(type_name, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::event::{Event as _, EventBus, FromEvent, HandlerOutcome, NamedEvent};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn group_message_chain_includes_message_event_and_event() {
        let event = GroupMessage {
            sender: GroupMember {
                id: 1,
                member_name: "m".into(),
                permission: crate::model::entities::Permission::Member,
                group: Group { id: 10, name: "g".into(), permission: crate::model::entities::Permission::Member },
                special_title: String::new(),
                join_timestamp: 0,
                last_speak_timestamp: 0,
                mute_time_remaining: 0,
            },
            message_chain: MessageChain::empty(),
            raw: None,
        };
        assert_eq!(event.type_chain(), &["GroupMessage", "MessageEvent", "Event"]);
        assert_eq!(GroupMessage::NAME, "GroupMessage");
    }

    #[test]
    fn from_event_downcasts_exact_type() {
        let event = BotOnlineEvent { qq: 123, raw: None };
        let boxed = conduit_core::event::BoxedEvent::new(event.clone());
        let recovered = BotOnlineEvent::from_event(boxed.as_ref()).unwrap();
        assert_eq!(recovered.qq, 123);
    }

    #[test]
    fn parser_resolves_known_type_and_stamps_raw() {
        let value = serde_json::json!({"type": "BotOnlineEvent", "qq": 123});
        let boxed = parse_event(value);
        assert_eq!(boxed.event_name(), "BotOnlineEvent");
        let event = boxed.downcast_ref::<BotOnlineEvent>().unwrap();
        assert_eq!(event.qq, 123);
        assert!(event.raw.is_some());
    }

    #[test]
    fn parser_degrades_unrecognized_type_to_unknown_event() {
        let value = serde_json::json!({"type": "SomeFutureEvent", "foo": "bar"});
        let boxed = parse_event(value);
        assert_eq!(boxed.event_name(), "Event");
        let unknown = boxed.downcast_ref::<conduit_core::event::UnknownEvent>().unwrap();
        assert!(unknown.raw_value().contains("SomeFutureEvent"));
    }

    #[test]
    fn parser_degrades_malformed_known_type_to_unknown_event() {
        let value = serde_json::json!({"type": "BotOnlineEvent", "qq": "not-a-number"});
        let boxed = parse_event(value);
        assert_eq!(boxed.event_name(), "Event");
    }

    /// A handler on a parent category fires for every subtype, alongside a
    /// handler on the exact leaf type (spec's hierarchical dispatch
    /// guarantee): both `FriendMessage` and `MessageEvent` handlers fire
    /// exactly once for one emitted `FriendMessage`.
    #[tokio::test]
    async fn parent_and_leaf_handlers_both_fire_for_one_event() {
        let bus = EventBus::new();
        let leaf_hits = Arc::new(AtomicUsize::new(0));
        let parent_hits = Arc::new(AtomicUsize::new(0));

        let leaf_hits2 = leaf_hits.clone();
        bus.subscribe::<FriendMessage, _, _>(0, move |_: FriendMessage| {
            let hits = leaf_hits2.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(HandlerOutcome::cont())
            }
        });

        let parent_hits2 = parent_hits.clone();
        bus.subscribe::<MessageEvent, _, _>(0, move |_: MessageEvent| {
            let hits = parent_hits2.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(HandlerOutcome::cont())
            }
        });

        let friend = Friend { id: 1, nickname: Some("a".into()), remark: None };
        let event = FriendMessage { sender: friend, message_chain: MessageChain::empty(), raw: None };
        bus.emit(BoxedEvent::new(event)).await;

        assert_eq!(leaf_hits.load(Ordering::SeqCst), 1);
        assert_eq!(parent_hits.load(Ordering::SeqCst), 1);
    }
}
