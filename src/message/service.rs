use std::sync::Arc;

use async_trait::async_trait;
use log::error;

use crate::conversation::model::LastMessage;
use crate::event::model::{Notification, NotificationKind};
use crate::user::model::UserInfo;
use crate::{conversation, event, participant, user};

use super::model::{
    Content, EditMessageRequest, Message, MessageDto, RECALLED_PLACEHOLDER, ReplyPreview,
    SendMessageRequest, SharePostRequest,
};
use super::{Id, Repository, Result};

const DEFAULT_PAGE_SIZE: usize = 50;

#[async_trait]
pub trait MessageService {
    async fn send(&self, sender: &user::Sub, req: SendMessageRequest) -> Result<MessageDto>;

    async fn share_post(&self, sender: &user::Sub, req: SharePostRequest) -> Result<MessageDto>;

    async fn edit(&self, id: &Id, actor: &user::Sub, req: EditMessageRequest) -> Result<()>;

    async fn recall(&self, id: &Id, actor: &user::Sub) -> Result<()>;

    async fn delete_for_me(&self, id: &Id, actor: &user::Sub) -> Result<()>;

    /// Chronological page of the conversation, also advancing the caller's
    /// read marker.
    async fn find_by_conversation(
        &self,
        conversation_id: &conversation::Id,
        reader: &user::Sub,
        limit: Option<usize>,
        before: Option<i64>,
    ) -> Result<Vec<MessageDto>>;
}

#[derive(Clone)]
pub struct MessageServiceImpl {
    repo: Repository,
    participants: participant::Service,
    conversations: conversation::Service,
    users: user::Client,
    events: event::Service,
}

impl MessageServiceImpl {
    pub fn new(
        repo: Repository,
        participants: participant::Service,
        conversations: conversation::Service,
        users: user::Client,
        events: event::Service,
    ) -> Self {
        Self {
            repo,
            participants,
            conversations,
            users,
            events,
        }
    }
}

#[async_trait]
impl MessageService for MessageServiceImpl {
    async fn send(&self, sender: &user::Sub, req: SendMessageRequest) -> Result<MessageDto> {
        if let Content::System { .. } = req.content {
            return Err(super::Error::SystemReserved);
        }

        self.deliver(sender, req.conversation_id, req.content, req.reply_to)
            .await
    }

    async fn share_post(&self, sender: &user::Sub, req: SharePostRequest) -> Result<MessageDto> {
        let content = Content::SharePost {
            post_id: req.post_id,
            caption: req.caption,
        };

        self.deliver(sender, req.conversation_id, content, None)
            .await
    }

    async fn edit(&self, id: &Id, actor: &user::Sub, req: EditMessageRequest) -> Result<()> {
        let msg = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(super::Error::NotFound(Some(id.clone())))?;

        self.participants
            .require_active(&msg.conversation_id, actor)
            .await?;

        if msg.sender != *actor {
            return Err(super::Error::NotSender);
        }
        if msg.is_recalled() {
            return Err(super::Error::Recalled);
        }
        if !matches!(msg.content, Content::Text { .. }) {
            return Err(super::Error::NotEditable);
        }
        if req.text.trim().is_empty() {
            return Err(super::Error::EmptyContent);
        }

        let at = chrono::Utc::now().timestamp_millis();
        if !self.repo.set_edited(id, actor, &req.text, at).await? {
            // a concurrent recall won the race
            return Err(super::Error::Recalled);
        }

        self.dispatch(
            &msg.conversation_id,
            actor,
            Notification::message(
                NotificationKind::MessageEdited,
                "message edited".into(),
                id,
            ),
        );

        Ok(())
    }

    async fn recall(&self, id: &Id, actor: &user::Sub) -> Result<()> {
        let msg = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(super::Error::NotFound(Some(id.clone())))?;

        self.participants
            .require_active(&msg.conversation_id, actor)
            .await?;

        if msg.sender != *actor {
            return Err(super::Error::NotSender);
        }
        if msg.is_recalled() {
            return Err(super::Error::Recalled);
        }

        let at = chrono::Utc::now().timestamp_millis();
        let cleared = msg.content.cleared();
        if !self.repo.set_recalled(id, actor, &cleared, at).await? {
            return Err(super::Error::Recalled);
        }

        self.dispatch(
            &msg.conversation_id,
            actor,
            Notification::message(
                NotificationKind::MessageRecalled,
                RECALLED_PLACEHOLDER.into(),
                id,
            ),
        );

        Ok(())
    }

    async fn delete_for_me(&self, id: &Id, actor: &user::Sub) -> Result<()> {
        let msg = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(super::Error::NotFound(Some(id.clone())))?;

        self.participants
            .require_active(&msg.conversation_id, actor)
            .await?;

        if !self.repo.add_deleted_for(id, actor).await? {
            return Err(super::Error::NotFound(Some(id.clone())));
        }

        Ok(())
    }

    async fn find_by_conversation(
        &self,
        conversation_id: &conversation::Id,
        reader: &user::Sub,
        limit: Option<usize>,
        before: Option<i64>,
    ) -> Result<Vec<MessageDto>> {
        self.participants
            .require_active(conversation_id, reader)
            .await?;

        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
        let mut page = self
            .repo
            .find_by_conversation(conversation_id, reader, limit as i64, before)
            .await?;
        page.reverse();

        let mut dtos = Vec::with_capacity(page.len());
        for msg in &page {
            dtos.push(self.to_dto(msg).await?);
        }

        // reading the page is what marks the conversation read
        self.conversations.mark_read(conversation_id, reader).await?;

        Ok(dtos)
    }
}

impl MessageServiceImpl {
    async fn deliver(
        &self,
        sender: &user::Sub,
        conversation_id: conversation::Id,
        content: Content,
        reply_to: Option<Id>,
    ) -> Result<MessageDto> {
        if content.is_empty() {
            return Err(super::Error::EmptyContent);
        }

        self.participants
            .require_active(&conversation_id, sender)
            .await?;

        if let Some(target) = &reply_to {
            let target = self
                .repo
                .find_by_id(target)
                .await?
                .ok_or(super::Error::InvalidReply)?;
            if target.conversation_id != conversation_id {
                return Err(super::Error::InvalidReply);
            }
        }

        let msg = Message::new(conversation_id.clone(), sender.clone(), content, reply_to);
        self.repo.insert(&msg).await?;

        // the cache refresh shares the send's fate; fan-out does not
        self.conversations
            .update_last_message(
                &conversation_id,
                LastMessage {
                    id: msg.id().clone(),
                    preview: msg.display_preview(),
                    sender: sender.clone(),
                    at: msg.created_at,
                },
            )
            .await?;

        let sender_name = self.display_name(sender).await;
        self.dispatch(
            &conversation_id,
            sender,
            Notification::message(
                NotificationKind::NewMessage,
                format!("{sender_name}: {}", msg.display_preview()),
                msg.id(),
            ),
        );

        let dto = self.to_dto(&msg).await?;
        Ok(dto)
    }

    async fn to_dto(&self, msg: &Message) -> Result<MessageDto> {
        let sender_name = self.display_name(&msg.sender).await;

        let reply_to = match &msg.reply_to {
            Some(target_id) => {
                self.repo
                    .find_by_id(target_id)
                    .await?
                    .map(|target| ReplyPreview {
                        id: target.id().clone(),
                        sender: target.sender.clone(),
                        preview: target.display_preview(),
                    })
            }
            None => None,
        };

        Ok(MessageDto {
            id: msg.id().clone(),
            conversation_id: msg.conversation_id.clone(),
            sender: msg.sender.clone(),
            sender_name,
            content: if msg.is_recalled() {
                None
            } else {
                Some(msg.content.clone())
            },
            preview: msg.display_preview(),
            recalled: msg.is_recalled(),
            edited: msg.edited_at.is_some(),
            created_at: msg.created_at,
            reply_to,
        })
    }

    async fn display_name(&self, sub: &user::Sub) -> String {
        self.users
            .find_user_info(sub)
            .await
            .unwrap_or(UserInfo::placeholder(sub))
            .name
    }

    /// Best-effort fan-out; a delivery failure never fails the mutation.
    fn dispatch(&self, id: &conversation::Id, except: &user::Sub, noti: Notification) {
        let participants = Arc::clone(&self.participants);
        let events = Arc::clone(&self.events);
        let id = id.clone();
        let except = except.clone();

        tokio::spawn(async move {
            let recipients = match participants.fanout_recipients(&id, &except).await {
                Ok(recipients) => recipients,
                Err(e) => {
                    error!("failed to resolve fan-out recipients for {id}: {e}");
                    return;
                }
            };

            events.notify(recipients, noti).await;
        });
    }
}
