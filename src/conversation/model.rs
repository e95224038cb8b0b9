use serde::{Deserialize, Serialize};

use crate::participant::model::ParticipantDto;
use crate::{message, user};

use super::{Id, Kind};

#[derive(Serialize, Deserialize, Clone)]
pub struct Conversation {
    #[serde(rename = "_id")]
    id: Id,
    pub kind: Kind,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub creator: user::Sub,
    /// Pair index for private conversations, absent for groups. Kept sorted
    /// so the unordered pair maps to one canonical value.
    pub members: Option<[user::Sub; 2]>,
    /// Scalar form of the sorted pair, backed by a unique index. Arrays are
    /// multikey-indexed in Mongo, so uniqueness needs a single value.
    pair_key: Option<String>,
    pub last_message: Option<LastMessage>,
    pub created_at: i64,
}

impl Conversation {
    pub fn pair_key(a: &user::Sub, b: &user::Sub) -> String {
        let (lo, hi) = if a.0 <= b.0 { (a, b) } else { (b, a) };
        format!("{lo}:{hi}")
    }

    pub fn private(creator: user::Sub, friend: user::Sub) -> Self {
        let pair_key = Self::pair_key(&creator, &friend);
        let mut pair = [creator.clone(), friend];
        pair.sort_by(|a, b| a.0.cmp(&b.0));

        Self {
            id: Id::random(),
            kind: Kind::Private,
            name: None,
            avatar: None,
            creator,
            members: Some(pair),
            pair_key: Some(pair_key),
            last_message: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn group(creator: user::Sub, name: String, avatar: Option<String>) -> Self {
        Self {
            id: Id::random(),
            kind: Kind::Group,
            name: Some(name),
            avatar,
            creator,
            members: None,
            pair_key: None,
            last_message: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }
}

/// Derived pointer to the most recent message. Display data only, refreshed
/// after every successful send and never treated as a source of truth.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LastMessage {
    pub id: message::Id,
    pub preview: String,
    pub sender: user::Sub,
    pub at: i64,
}

#[derive(Deserialize)]
pub struct CreatePrivateRequest {
    pub friend: user::Sub,
}

#[derive(Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub avatar: Option<String>,
    pub members: Vec<user::Sub>,
}

#[derive(Deserialize)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

/// List entry for the caller's conversation overview. For private
/// conversations `name`/`avatar` resolve to the counterpart's display data.
#[derive(Serialize, Debug)]
pub struct ConversationDto {
    pub id: Id,
    pub kind: Kind,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub last_message: Option<LastMessage>,
    pub unread_count: u64,
    pub muted: bool,
}

#[derive(Serialize, Debug)]
pub struct ConversationDetailsDto {
    pub id: Id,
    pub kind: Kind,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub creator: user::Sub,
    pub members: Vec<ParticipantDto>,
    pub created_at: i64,
}
