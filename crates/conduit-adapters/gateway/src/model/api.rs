//! Representative command catalog: a slice of the gateway's command set,
//! enough to exercise `conduit-core`'s generic `Command`/`Response`
//! machinery and to back the bot facade's send/lookup/allow/decline/ignore
//! convenience methods — not the full "hundreds of named commands" catalog
//! (out of scope for the core, per its minimal-surface design).
//!
//! Grounded on `examples/original_source/mirai/models/api_impl.py`.

use conduit_core::error::{Error, Result};
use conduit_core::message::MessageChain;
use conduit_macros::Command;
use serde::{Deserialize, Serialize};

use crate::model::entities::{Friend, Group, GroupMember, RespOperate};
use crate::model::event::{BotInvitedJoinGroupRequestEvent, MemberJoinRequestEvent, NewFriendRequestEvent};

/// The `{messageId}` shape every send-message command returns.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResponse {
    #[serde(rename = "messageId")]
    pub message_id: i64,
}

#[derive(Debug, Clone, Serialize, Command)]
#[command(name = "sendFriendMessage", response = "SendMessageResponse")]
pub struct SendFriendMessage {
    pub target: i64,
    pub message_chain: MessageChain,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Command)]
#[command(name = "sendGroupMessage", response = "SendMessageResponse")]
pub struct SendGroupMessage {
    pub target: i64,
    pub message_chain: MessageChain,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Command)]
#[command(name = "sendTempMessage", response = "SendMessageResponse")]
pub struct SendTempMessage {
    pub qq: i64,
    pub group: i64,
    pub message_chain: MessageChain,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<i64>,
}

/// Transparent `Vec<Friend>` response, matching the original's iterable
/// `FriendList.Response`.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct FriendListResponse(pub Vec<Friend>);

#[derive(Debug, Clone, Default, Serialize, Command)]
#[command(name = "friendList", response = "FriendListResponse")]
pub struct FriendList;

#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct GroupListResponse(pub Vec<Group>);

#[derive(Debug, Clone, Default, Serialize, Command)]
#[command(name = "groupList", response = "GroupListResponse")]
pub struct GroupList;

#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct MemberListResponse(pub Vec<GroupMember>);

#[derive(Debug, Clone, Serialize, Command)]
#[command(name = "memberList", response = "MemberListResponse")]
pub struct MemberList {
    pub target: i64,
}

/// A command with no meaningful response data, for the three `Resp*`
/// fire-and-forget request-approval commands.
#[derive(Debug, Clone, Deserialize)]
pub struct Empty;

/// Responds to a [`NewFriendRequestEvent`] (spec §9: `decline`/`ignore`
/// compose with `ban` via bitwise OR on [`RespOperate`], not the original's
/// buggy `&`).
#[derive(Debug, Clone, Serialize, Command)]
#[command(name = "resp/newFriendRequestEvent", response = "Empty")]
pub struct RespNewFriendRequestEvent {
    pub event_id: i64,
    pub from_id: i64,
    pub group_id: i64,
    pub operate: u8,
    pub message: String,
}

impl RespNewFriendRequestEvent {
    pub fn from_event(event: &NewFriendRequestEvent, operate: RespOperate, message: impl Into<String>) -> Result<Self> {
        Ok(Self {
            event_id: event.event_id,
            from_id: event.from_id,
            group_id: event.group_id,
            operate: Self::operate_code(operate)?,
            message: message.into(),
        })
    }

    /// `ALLOW -> 0, DECLINE -> 1, DECLINE|BAN -> 2`.
    fn operate_code(operate: RespOperate) -> Result<u8> {
        match operate {
            RespOperate::ALLOW => Ok(0),
            RespOperate::DECLINE => Ok(1),
            op if op == RespOperate::DECLINE | RespOperate::BAN => Ok(2),
            op => Err(Error::BadParameters(format!("invalid operate for resp/newFriendRequestEvent: {op:?}"))),
        }
    }
}

/// Responds to a [`MemberJoinRequestEvent`].
#[derive(Debug, Clone, Serialize, Command)]
#[command(name = "resp/memberJoinRequestEvent", response = "Empty")]
pub struct RespMemberJoinRequestEvent {
    pub event_id: i64,
    pub from_id: i64,
    pub group_id: i64,
    pub operate: u8,
    pub message: String,
}

impl RespMemberJoinRequestEvent {
    pub fn from_event(event: &MemberJoinRequestEvent, operate: RespOperate, message: impl Into<String>) -> Result<Self> {
        Ok(Self {
            event_id: event.event_id,
            from_id: event.from_id,
            group_id: event.group_id,
            operate: Self::operate_code(operate)?,
            message: message.into(),
        })
    }

    /// `ALLOW -> 0, DECLINE -> 1, IGNORE -> 2, DECLINE|BAN -> 3, IGNORE|BAN -> 4`.
    fn operate_code(operate: RespOperate) -> Result<u8> {
        match operate {
            RespOperate::ALLOW => Ok(0),
            RespOperate::DECLINE => Ok(1),
            RespOperate::IGNORE => Ok(2),
            op if op == RespOperate::DECLINE | RespOperate::BAN => Ok(3),
            op if op == RespOperate::IGNORE | RespOperate::BAN => Ok(4),
            op => Err(Error::BadParameters(format!("invalid operate for resp/memberJoinRequestEvent: {op:?}"))),
        }
    }
}

/// Responds to a [`BotInvitedJoinGroupRequestEvent`].
#[derive(Debug, Clone, Serialize, Command)]
#[command(name = "resp/botInvitedJoinGroupRequestEvent", response = "Empty")]
pub struct RespBotInvitedJoinGroupRequestEvent {
    pub event_id: i64,
    pub from_id: i64,
    pub group_id: i64,
    pub operate: u8,
    pub message: String,
}

impl RespBotInvitedJoinGroupRequestEvent {
    pub fn from_event(event: &BotInvitedJoinGroupRequestEvent, operate: RespOperate, message: impl Into<String>) -> Result<Self> {
        Ok(Self {
            event_id: event.event_id,
            from_id: event.from_id,
            group_id: event.group_id,
            operate: Self::operate_code(operate)?,
            message: message.into(),
        })
    }

    /// `ALLOW -> 0, DECLINE -> 1`; this request type has no ignore/ban option.
    fn operate_code(operate: RespOperate) -> Result<u8> {
        match operate {
            RespOperate::ALLOW => Ok(0),
            RespOperate::DECLINE => Ok(1),
            op => Err(Error::BadParameters(format!("invalid operate for resp/botInvitedJoinGroupRequestEvent: {op:?}"))),
        }
    }
}

/// The `{img}` shape `uploadImage` returns (id/url/path, per the gateway's
/// `Image` entity).
#[derive(Debug, Clone, Deserialize)]
pub struct UploadImageResponse {
    #[serde(rename = "imageId")]
    pub image_id: String,
    pub url: String,
}

/// Uploads an image file (spec §4.1/§4.4: dispatched via
/// `Method::Multipart`, not `Method::Set`). Reading the file from disk and
/// building its multipart bytes is out of scope here (spec Non-goals); this
/// command only carries the params the transport turns into form parts.
#[derive(Debug, Clone, Serialize, Command)]
#[command(name = "uploadImage", response = "UploadImageResponse")]
pub struct UploadImage {
    #[serde(rename = "type")]
    pub kind: String,
    pub img: String,
}

/// The `{voiceId, url}` shape `uploadVoice` returns.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadVoiceResponse {
    #[serde(rename = "voiceId")]
    pub voice_id: String,
    pub url: String,
}

/// Uploads a voice file (spec §4.1/§4.4, multipart).
#[derive(Debug, Clone, Serialize, Command)]
#[command(name = "uploadVoice", response = "UploadVoiceResponse")]
pub struct UploadVoice {
    #[serde(rename = "type")]
    pub kind: String,
    pub voice: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::command::Command;

    #[test]
    fn send_friend_message_skips_absent_quote() {
        let command = SendFriendMessage { target: 1, message_chain: "hi".into(), quote: None };
        let params = command.to_params().unwrap();
        assert!(!params.contains_key("quote"));
    }

    #[test]
    fn new_friend_request_decline_and_ban_maps_to_two() {
        let event =
            NewFriendRequestEvent { event_id: 1, from_id: 2, group_id: 0, nick: "n".into(), message: "m".into(), raw: None };
        let resp = RespNewFriendRequestEvent::from_event(&event, RespOperate::DECLINE | RespOperate::BAN, "").unwrap();
        assert_eq!(resp.operate, 2);
    }

    #[test]
    fn member_join_request_ignore_and_ban_maps_to_four() {
        let event = MemberJoinRequestEvent {
            event_id: 1,
            from_id: 2,
            group_id: 3,
            group_name: "g".into(),
            nick: "n".into(),
            message: "m".into(),
            raw: None,
        };
        let resp = RespMemberJoinRequestEvent::from_event(&event, RespOperate::IGNORE | RespOperate::BAN, "").unwrap();
        assert_eq!(resp.operate, 4);
    }

    /// A combination with no meaning for this request type (spec §9: no
    /// ignore/ban option on invited-join-group responses) is rejected, not
    /// a process abort, even though `RespOperate`'s `BitOr` composes it.
    #[test]
    fn invited_join_group_rejects_unsupported_operate_instead_of_panicking() {
        let event = BotInvitedJoinGroupRequestEvent {
            event_id: 1,
            from_id: 2,
            group_id: 3,
            group_name: "g".into(),
            nick: "n".into(),
            message: "m".into(),
            raw: None,
        };
        let result = RespBotInvitedJoinGroupRequestEvent::from_event(&event, RespOperate::ALLOW | RespOperate::BAN, "");
        assert!(matches!(result, Err(conduit_core::error::Error::BadParameters(_))));
    }
}
