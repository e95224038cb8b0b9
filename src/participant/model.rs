use serde::{Deserialize, Serialize};

use crate::user::model::UserInfo;
use crate::{conversation, user};

use super::Role;

/// One user's membership record in one conversation. The
/// (conversation_id, sub) pair is unique and upsertable, re-joining
/// reactivates the existing row instead of inserting a duplicate.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Participant {
    #[serde(rename = "_id")]
    id: String,
    pub conversation_id: conversation::Id,
    pub sub: user::Sub,
    pub role: Role,
    pub joined_at: i64,
    /// None means active; a historical row is excluded from counts and from
    /// every mutating authorization.
    pub left_at: Option<i64>,
    pub nickname: Option<String>,
    pub last_read_at: i64,
    pub muted: bool,
}

impl Participant {
    pub fn new(conversation_id: conversation::Id, sub: user::Sub, role: Role) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: mongodb::bson::oid::ObjectId::new().to_hex(),
            conversation_id,
            sub,
            role,
            joined_at: now,
            left_at: None,
            nickname: None,
            last_read_at: now,
            muted: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.left_at.is_none()
    }
}

#[derive(Serialize, Debug)]
pub struct ParticipantDto {
    pub sub: user::Sub,
    pub name: String,
    pub picture: Option<String>,
    pub role: Role,
    pub joined_at: i64,
    pub muted: bool,
}

impl ParticipantDto {
    pub fn new(p: Participant, info: UserInfo) -> Self {
        Self {
            sub: p.sub,
            // the conversation-scoped nickname wins over the profile name
            name: p.nickname.unwrap_or(info.name),
            picture: info.picture,
            role: p.role,
            joined_at: p.joined_at,
            muted: p.muted,
        }
    }
}

#[derive(Deserialize)]
pub struct AddMemberRequest {
    pub sub: user::Sub,
}

#[derive(Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Deserialize)]
pub struct TransferLeadershipRequest {
    pub sub: user::Sub,
}

#[derive(Deserialize)]
pub struct OwnSettingsRequest {
    pub nickname: Option<String>,
    pub muted: Option<bool>,
}
