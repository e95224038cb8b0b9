use serde::{Deserialize, Serialize};

use crate::{conversation, user};

use super::Id;

/// Fixed placeholder rendered for a recalled message, whatever bytes the
/// store still holds.
pub const RECALLED_PLACEHOLDER: &str = "message recalled";

/// Fixed display string for a shared post; the post body is never inlined.
pub const SHARED_POST_PREVIEW: &str = "shared a post";

const PREVIEW_MAX_CHARS: usize = 80;

/// Message payload as a tagged union. The tag is immutable after creation,
/// a recall empties the payload but keeps the variant.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Content {
    Text {
        text: String,
    },
    Image {
        #[serde(default)]
        caption: Option<String>,
        media_urls: Vec<String>,
    },
    File {
        file_url: String,
        file_name: String,
        #[serde(default)]
        file_size: Option<i64>,
    },
    System {
        text: String,
    },
    SharePost {
        post_id: String,
        #[serde(default)]
        caption: Option<String>,
    },
}

impl Content {
    pub fn kind(&self) -> &'static str {
        match self {
            Content::Text { .. } => "text",
            Content::Image { .. } => "image",
            Content::File { .. } => "file",
            Content::System { .. } => "system",
            Content::SharePost { .. } => "share_post",
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text { text } | Content::System { text } => text.trim().is_empty(),
            Content::Image { media_urls, .. } => media_urls.is_empty(),
            Content::File { file_url, .. } => file_url.is_empty(),
            Content::SharePost { post_id, .. } => post_id.is_empty(),
        }
    }

    /// Same variant, payload wiped. Used by recall, which is irreversible.
    pub fn cleared(&self) -> Content {
        match self {
            Content::Text { .. } => Content::Text {
                text: String::new(),
            },
            Content::Image { .. } => Content::Image {
                caption: None,
                media_urls: Vec::new(),
            },
            Content::File { .. } => Content::File {
                file_url: String::new(),
                file_name: String::new(),
                file_size: None,
            },
            Content::System { .. } => Content::System {
                text: String::new(),
            },
            Content::SharePost { .. } => Content::SharePost {
                post_id: String::new(),
                caption: None,
            },
        }
    }

    pub fn preview(&self) -> String {
        match self {
            Content::Text { text } | Content::System { text } => truncate(text),
            Content::Image { caption, .. } => match caption {
                Some(caption) if !caption.is_empty() => truncate(caption),
                _ => "[image]".into(),
            },
            Content::File { file_name, .. } => format!("[file] {file_name}"),
            Content::SharePost { .. } => SHARED_POST_PREVIEW.into(),
        }
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= PREVIEW_MAX_CHARS {
        return text.to_owned();
    }

    let mut out = text.chars().take(PREVIEW_MAX_CHARS).collect::<String>();
    out.push('…');
    out
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    #[serde(rename = "_id")]
    id: Id,
    pub conversation_id: conversation::Id,
    pub sender: user::Sub,
    pub content: Content,
    pub reply_to: Option<Id>,
    pub created_at: i64,
    pub edited_at: Option<i64>,
    pub recalled_at: Option<i64>,
    /// Delete-for-me: subs that hid this message from their own view.
    #[serde(default)]
    pub deleted_for: Vec<user::Sub>,
}

impl Message {
    pub fn new(
        conversation_id: conversation::Id,
        sender: user::Sub,
        content: Content,
        reply_to: Option<Id>,
    ) -> Self {
        Self {
            id: Id::random(),
            conversation_id,
            sender,
            content,
            reply_to,
            created_at: chrono::Utc::now().timestamp_millis(),
            edited_at: None,
            recalled_at: None,
            deleted_for: Vec::new(),
        }
    }

    pub fn system(conversation_id: conversation::Id, sender: user::Sub, text: String) -> Self {
        Self::new(conversation_id, sender, Content::System { text }, None)
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn is_recalled(&self) -> bool {
        self.recalled_at.is_some()
    }

    /// What a reader may see of this message in one line.
    pub fn display_preview(&self) -> String {
        if self.is_recalled() {
            return RECALLED_PLACEHOLDER.into();
        }
        self.content.preview()
    }
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub conversation_id: conversation::Id,
    pub content: Content,
    pub reply_to: Option<Id>,
}

#[derive(Deserialize)]
pub struct SharePostRequest {
    pub conversation_id: conversation::Id,
    pub post_id: String,
    pub caption: Option<String>,
}

#[derive(Deserialize)]
pub struct EditMessageRequest {
    pub text: String,
}

#[derive(Serialize, Clone, Debug)]
pub struct ReplyPreview {
    pub id: Id,
    pub sender: user::Sub,
    pub preview: String,
}

#[derive(Serialize, Clone, Debug)]
pub struct MessageDto {
    pub id: Id,
    pub conversation_id: conversation::Id,
    pub sender: user::Sub,
    pub sender_name: String,
    /// Absent once the message is recalled; clients render the placeholder
    /// carried in `preview` instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    pub preview: String,
    pub recalled: bool,
    pub edited: bool,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ReplyPreview>,
}
