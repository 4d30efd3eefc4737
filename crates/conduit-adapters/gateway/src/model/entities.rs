//! Contacts and group entities: the things a message can come from, a
//! request can be filed against, or a response can target.
//!
//! Grounded on `examples/original_source/mirai/models/entities.py`.

use serde::{Deserialize, Serialize};

/// A friend contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friend {
    pub id: i64,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
}

impl Friend {
    /// The nickname, falling back to the remark (matches the original's `get_name`).
    pub fn name(&self) -> &str {
        self.nickname.as_deref().or(self.remark.as_deref()).unwrap_or_default()
    }
}

/// A group member's permission level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "MEMBER")]
    Member,
    #[serde(rename = "ADMINISTRATOR")]
    Administrator,
    #[serde(rename = "OWNER")]
    Owner,
}

/// A group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub permission: Permission,
}

/// A member of a [`Group`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: i64,
    #[serde(rename = "memberName")]
    pub member_name: String,
    pub permission: Permission,
    pub group: Group,
    #[serde(default, rename = "specialTitle")]
    pub special_title: String,
    #[serde(default, rename = "joinTimestamp")]
    pub join_timestamp: i64,
    #[serde(default, rename = "lastSpeakTimestamp")]
    pub last_speak_timestamp: i64,
    #[serde(default, rename = "muteTimeRemaining")]
    pub mute_time_remaining: i64,
}

/// A user connected from another client (used by [`crate::model::event::OtherClientMessage`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub platform: String,
}

/// The `{id, kind}` shape the gateway uses to name a message source
/// independent of the richer `Friend`/`Group` entities (spec §3's
/// `NudgeEvent.subject`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub kind: SubjectKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubjectKind {
    Friend,
    Group,
    Stranger,
}

/// The response operation a request-approval command carries (spec §9 open
/// question: decline/ignore compose with ban via bitwise OR, not `&`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RespOperate(u8);

impl RespOperate {
    pub const ALLOW: Self = Self(1);
    pub const DECLINE: Self = Self(2);
    pub const IGNORE: Self = Self(3);
    pub const BAN: Self = Self(4);

    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl std::ops::BitOr for RespOperate {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friend_name_prefers_nickname_over_remark() {
        let friend = Friend { id: 1, nickname: Some("nick".into()), remark: Some("remark".into()) };
        assert_eq!(friend.name(), "nick");
    }

    #[test]
    fn friend_name_falls_back_to_remark() {
        let friend = Friend { id: 1, nickname: None, remark: Some("remark".into()) };
        assert_eq!(friend.name(), "remark");
    }

    #[test]
    fn decline_or_ban_composes_by_bitwise_or() {
        assert_eq!((RespOperate::DECLINE | RespOperate::BAN).bits(), 0b0110);
    }
}
