//! Gateway-specific convenience methods over the generic
//! [`conduit_runtime::Bot`] facade: send/lookup commands and the
//! allow/decline/ignore verbs for request-approval events.
//!
//! Grounded on `examples/original_source/mirai/bot.py`'s `Mirai` (the
//! model-layer convenience wrapper around `SimpleMirai`'s raw `call_api`)
//! and `mirai/models/api_impl.py`'s `RespEvent.from_event` classmethod
//! family. Kept as an extension trait rather than folded into
//! `conduit_runtime::Bot` itself, since `Bot` is generic over adapter kind
//! and knows nothing about this gateway's concrete command/event catalog.

use std::collections::BTreeMap;

use async_trait::async_trait;
use conduit_core::command::Command;
use conduit_core::error::Result;
use conduit_core::message::MessageChain;
use conduit_runtime::Bot;

use crate::model::api::{
    Empty, FriendList, GroupList, MemberList, RespBotInvitedJoinGroupRequestEvent, RespMemberJoinRequestEvent,
    RespNewFriendRequestEvent, SendFriendMessage, SendGroupMessage, SendMessageResponse, SendTempMessage, UploadImage,
    UploadImageResponse, UploadVoice, UploadVoiceResponse,
};
use crate::model::entities::{Friend, Group, GroupMember, RespOperate};
use crate::model::event::{BotInvitedJoinGroupRequestEvent, MemberJoinRequestEvent, NewFriendRequestEvent};

#[async_trait]
pub trait GatewayBotExt {
    async fn send_friend_message(&self, target: i64, message: impl Into<MessageChain> + Send) -> Result<SendMessageResponse>;
    async fn send_group_message(&self, target: i64, message: impl Into<MessageChain> + Send) -> Result<SendMessageResponse>;
    async fn send_temp_message(&self, qq: i64, group: i64, message: impl Into<MessageChain> + Send) -> Result<SendMessageResponse>;

    async fn friend_list(&self) -> Result<Vec<Friend>>;
    async fn group_list(&self) -> Result<Vec<Group>>;
    async fn member_list(&self, target: i64) -> Result<Vec<GroupMember>>;

    /// Uploads an image (spec §4.1/§4.4: dispatched via `Method::Multipart`).
    async fn upload_image(&self, kind: impl Into<String> + Send, img: impl Into<String> + Send) -> Result<UploadImageResponse>;
    /// Uploads a voice clip (spec §4.1/§4.4, multipart).
    async fn upload_voice(&self, kind: impl Into<String> + Send, voice: impl Into<String> + Send) -> Result<UploadVoiceResponse>;

    /// Approves a friend request.
    async fn allow_new_friend_request(&self, event: &NewFriendRequestEvent, message: &str) -> Result<()>;
    /// Declines a friend request, optionally blacklisting the requester.
    async fn decline_new_friend_request(&self, event: &NewFriendRequestEvent, ban: bool, message: &str) -> Result<()>;

    /// Approves a member's join request.
    async fn allow_member_join_request(&self, event: &MemberJoinRequestEvent, message: &str) -> Result<()>;
    /// Declines a member's join request, optionally blacklisting the requester.
    async fn decline_member_join_request(&self, event: &MemberJoinRequestEvent, ban: bool, message: &str) -> Result<()>;
    /// Ignores a member's join request, optionally blacklisting the requester.
    async fn ignore_member_join_request(&self, event: &MemberJoinRequestEvent, ban: bool, message: &str) -> Result<()>;

    /// Approves the bot's own invitation into a group.
    async fn allow_invited_join_group_request(&self, event: &BotInvitedJoinGroupRequestEvent, message: &str) -> Result<()>;
    /// Declines the bot's own invitation into a group.
    async fn decline_invited_join_group_request(&self, event: &BotInvitedJoinGroupRequestEvent, message: &str) -> Result<()>;
}

#[async_trait]
impl GatewayBotExt for Bot {
    async fn send_friend_message(&self, target: i64, message: impl Into<MessageChain> + Send) -> Result<SendMessageResponse> {
        let command = SendFriendMessage { target, message_chain: message.into(), quote: None };
        self.command_set::<SendFriendMessage>().set(command.to_params()?).await
    }

    async fn send_group_message(&self, target: i64, message: impl Into<MessageChain> + Send) -> Result<SendMessageResponse> {
        let command = SendGroupMessage { target, message_chain: message.into(), quote: None };
        self.command_set::<SendGroupMessage>().set(command.to_params()?).await
    }

    async fn send_temp_message(&self, qq: i64, group: i64, message: impl Into<MessageChain> + Send) -> Result<SendMessageResponse> {
        let command = SendTempMessage { qq, group, message_chain: message.into(), quote: None };
        self.command_set::<SendTempMessage>().set(command.to_params()?).await
    }

    async fn friend_list(&self) -> Result<Vec<Friend>> {
        Ok(self.command::<FriendList>().get(BTreeMap::new()).await?.0)
    }

    async fn group_list(&self) -> Result<Vec<Group>> {
        Ok(self.command::<GroupList>().get(BTreeMap::new()).await?.0)
    }

    async fn member_list(&self, target: i64) -> Result<Vec<GroupMember>> {
        let command = MemberList { target };
        Ok(self.command::<MemberList>().get(command.to_params()?).await?.0)
    }

    async fn upload_image(&self, kind: impl Into<String> + Send, img: impl Into<String> + Send) -> Result<UploadImageResponse> {
        let command = UploadImage { kind: kind.into(), img: img.into() };
        self.command_upload::<UploadImage>().upload(command.to_params()?).await
    }

    async fn upload_voice(&self, kind: impl Into<String> + Send, voice: impl Into<String> + Send) -> Result<UploadVoiceResponse> {
        let command = UploadVoice { kind: kind.into(), voice: voice.into() };
        self.command_upload::<UploadVoice>().upload(command.to_params()?).await
    }

    async fn allow_new_friend_request(&self, event: &NewFriendRequestEvent, message: &str) -> Result<()> {
        respond_new_friend_request(self, event, RespOperate::ALLOW, message).await
    }

    async fn decline_new_friend_request(&self, event: &NewFriendRequestEvent, ban: bool, message: &str) -> Result<()> {
        let operate = if ban { RespOperate::DECLINE | RespOperate::BAN } else { RespOperate::DECLINE };
        respond_new_friend_request(self, event, operate, message).await
    }

    async fn allow_member_join_request(&self, event: &MemberJoinRequestEvent, message: &str) -> Result<()> {
        respond_member_join_request(self, event, RespOperate::ALLOW, message).await
    }

    async fn decline_member_join_request(&self, event: &MemberJoinRequestEvent, ban: bool, message: &str) -> Result<()> {
        let operate = if ban { RespOperate::DECLINE | RespOperate::BAN } else { RespOperate::DECLINE };
        respond_member_join_request(self, event, operate, message).await
    }

    async fn ignore_member_join_request(&self, event: &MemberJoinRequestEvent, ban: bool, message: &str) -> Result<()> {
        let operate = if ban { RespOperate::IGNORE | RespOperate::BAN } else { RespOperate::IGNORE };
        respond_member_join_request(self, event, operate, message).await
    }

    async fn allow_invited_join_group_request(&self, event: &BotInvitedJoinGroupRequestEvent, message: &str) -> Result<()> {
        respond_invited_join_group_request(self, event, RespOperate::ALLOW, message).await
    }

    async fn decline_invited_join_group_request(&self, event: &BotInvitedJoinGroupRequestEvent, message: &str) -> Result<()> {
        respond_invited_join_group_request(self, event, RespOperate::DECLINE, message).await
    }
}

async fn respond_new_friend_request(bot: &Bot, event: &NewFriendRequestEvent, operate: RespOperate, message: &str) -> Result<()> {
    let command = RespNewFriendRequestEvent::from_event(event, operate, message)?;
    bot.command_set::<RespNewFriendRequestEvent>().set(command.to_params()?).await.map(|_: Empty| ())
}

async fn respond_member_join_request(bot: &Bot, event: &MemberJoinRequestEvent, operate: RespOperate, message: &str) -> Result<()> {
    let command = RespMemberJoinRequestEvent::from_event(event, operate, message)?;
    bot.command_set::<RespMemberJoinRequestEvent>().set(command.to_params()?).await.map(|_: Empty| ())
}

async fn respond_invited_join_group_request(
    bot: &Bot,
    event: &BotInvitedJoinGroupRequestEvent,
    operate: RespOperate,
    message: &str,
) -> Result<()> {
    let command = RespBotInvitedJoinGroupRequestEvent::from_event(event, operate, message)?;
    bot.command_set::<RespBotInvitedJoinGroupRequestEvent>().set(command.to_params()?).await.map(|_: Empty| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::adapter::{AccountId, Adapter, EventSink};
    use conduit_core::command::Method;
    use serde_json::Value;
    use std::sync::Arc;

    struct EchoAdapter;

    #[async_trait]
    impl Adapter for EchoAdapter {
        fn kind(&self) -> &'static str {
            "echo"
        }
        async fn login(&self, _qq: AccountId) -> Result<()> {
            Ok(())
        }
        async fn logout(&self) -> Result<()> {
            Ok(())
        }
        async fn call_api(&self, name: &str, method: Method, params: BTreeMap<String, Value>) -> Result<Option<Value>> {
            match name {
                "sendFriendMessage" | "sendGroupMessage" | "sendTempMessage" => {
                    Ok(Some(serde_json::json!({"code": 0, "msg": "", "messageId": 1})))
                }
                "friendList" => Ok(Some(serde_json::json!([{"id": 1, "nickname": "a", "remark": null}]))),
                "resp/newFriendRequestEvent" | "resp/memberJoinRequestEvent" | "resp/botInvitedJoinGroupRequestEvent" => {
                    let _ = params;
                    Ok(Some(serde_json::json!({"code": 0, "msg": ""})))
                }
                "uploadImage" => {
                    assert_eq!(method, Method::Multipart);
                    assert_eq!(params.get("type").and_then(Value::as_str), Some("friend"));
                    Ok(Some(serde_json::json!({"code": 0, "msg": "", "imageId": "{abc}.png", "url": "https://example.com/abc.png"})))
                }
                "uploadVoice" => {
                    assert_eq!(method, Method::Multipart);
                    Ok(Some(serde_json::json!({"code": 0, "msg": "", "voiceId": "{abc}.amr", "url": "https://example.com/abc.amr"})))
                }
                _ => Ok(None),
            }
        }
        async fn run(self: std::sync::Arc<Self>, _sink: EventSink) -> Result<()> {
            std::future::pending().await
        }
    }

    fn bot() -> Bot {
        Bot::new(1, Arc::new(EchoAdapter))
    }

    #[tokio::test]
    async fn send_friend_message_returns_message_id() {
        let response = bot().send_friend_message(2, "hi").await.unwrap();
        assert_eq!(response.message_id, 1);
    }

    #[tokio::test]
    async fn friend_list_returns_parsed_friends() {
        let friends = bot().friend_list().await.unwrap();
        assert_eq!(friends.len(), 1);
        assert_eq!(friends[0].id, 1);
    }

    #[tokio::test]
    async fn decline_with_ban_succeeds() {
        let event = NewFriendRequestEvent { event_id: 1, from_id: 2, group_id: 0, nick: "n".into(), message: "m".into(), raw: None };
        bot().decline_new_friend_request(&event, true, "no").await.unwrap();
    }

    /// Exercises the multipart dispatch path end to end (spec §4.4): the
    /// command reaches `call_api` tagged `Method::Multipart`, not `Set`.
    #[tokio::test]
    async fn upload_image_dispatches_via_multipart() {
        let response = bot().upload_image("friend", "/tmp/pic.png").await.unwrap();
        assert_eq!(response.image_id, "{abc}.png");
    }

    #[tokio::test]
    async fn upload_voice_dispatches_via_multipart() {
        let response = bot().upload_voice("group", "/tmp/clip.amr").await.unwrap();
        assert_eq!(response.voice_id, "{abc}.amr");
    }
}
