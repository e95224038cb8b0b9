use std::fmt::Display;

use serde::Serialize;

use crate::conversation::Kind;
use crate::{conversation, message, user};

/// Per-user pub/sub channels.
pub enum Subject<'a> {
    Notifications(&'a user::Sub),
}

impl Display for Subject<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subject::Notifications(sub) => write!(f, "noti:{sub}"),
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewMessage,
    MessageEdited,
    MessageRecalled,
    MemberAdded,
    MemberRemoved,
    MemberLeft,
    RoleChanged,
    LeadershipTransferred,
    GroupUpdated,
    ConversationBlocked,
    ConversationDeleted,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Conversation,
    Message,
}

/// What lands on a recipient's channel. Carries a reference instead of the
/// full entity so stale payloads cannot leak recalled content.
#[derive(Serialize, Clone, Debug)]
pub struct Notification {
    pub kind: NotificationKind,
    pub content: String,
    pub reference_id: String,
    pub reference_kind: ReferenceKind,
}

impl Notification {
    pub fn conversation(kind: NotificationKind, content: String, id: &conversation::Id) -> Self {
        Self {
            kind,
            content,
            reference_id: id.0.clone(),
            reference_kind: ReferenceKind::Conversation,
        }
    }

    pub fn message(kind: NotificationKind, content: String, id: &message::Id) -> Self {
        Self {
            kind,
            content,
            reference_id: id.0.clone(),
            reference_kind: ReferenceKind::Message,
        }
    }
}

/// Partial refresh of a mirrored conversation; only present fields are
/// written, absent ones keep their mirrored value.
#[derive(Default, Clone, Debug)]
pub struct MirrorUpdate {
    pub kind: Option<Kind>,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub members: Option<Vec<user::Sub>>,
    pub last_message_id: Option<message::Id>,
    pub last_message_preview: Option<String>,
    pub last_message_sender: Option<user::Sub>,
    pub last_message_at: Option<i64>,
}

impl MirrorUpdate {
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();

        if let Some(kind) = &self.kind {
            fields.push(("kind", kind.as_str().to_owned()));
        }
        if let Some(name) = &self.name {
            fields.push(("name", name.clone()));
        }
        if let Some(avatar) = &self.avatar {
            fields.push(("avatar", avatar.clone()));
        }
        if let Some(members) = &self.members {
            let members = members.iter().map(|m| m.to_string()).collect::<Vec<_>>();
            if let Ok(raw) = serde_json::to_string(&members) {
                fields.push(("members", raw));
            }
        }
        if let Some(id) = &self.last_message_id {
            fields.push(("last_message_id", id.0.clone()));
        }
        if let Some(preview) = &self.last_message_preview {
            fields.push(("last_message_preview", preview.clone()));
        }
        if let Some(sender) = &self.last_message_sender {
            fields.push(("last_message_sender", sender.to_string()));
        }
        if let Some(at) = self.last_message_at {
            fields.push(("last_message_at", at.to_string()));
        }

        fields
    }
}
