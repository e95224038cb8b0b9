use std::sync::Arc;

use async_trait::async_trait;

use crate::event::model::{MirrorUpdate, Notification, NotificationKind};
use crate::participant::model::{Participant, ParticipantDto};
use crate::participant::{self, Role};
use crate::user::model::UserInfo;
use crate::{event, message, user};

use super::model::{
    Conversation, ConversationDetailsDto, ConversationDto, CreateGroupRequest, LastMessage,
    UpdateGroupRequest,
};
use super::{Id, Kind, Repository, Result};

#[async_trait]
pub trait ConversationService {
    async fn create_private(&self, creator: &user::Sub, friend: &user::Sub) -> Result<Id>;

    async fn create_group(&self, creator: &user::Sub, req: CreateGroupRequest) -> Result<Id>;

    async fn update_group(
        &self,
        id: &Id,
        actor: &user::Sub,
        changes: UpdateGroupRequest,
    ) -> Result<()>;

    async fn delete(&self, id: &Id, actor: &user::Sub) -> Result<()>;

    /// Refreshes the derived last-message cache. Called once per successful
    /// send, last writer wins.
    async fn update_last_message(&self, id: &Id, last: LastMessage) -> Result<()>;

    async fn mark_read(&self, id: &Id, sub: &user::Sub) -> Result<()>;

    async fn find_all(&self, sub: &user::Sub) -> Result<Vec<ConversationDto>>;

    async fn find_by_id(&self, id: &Id, sub: &user::Sub) -> Result<ConversationDetailsDto>;
}

#[derive(Clone)]
pub struct ConversationServiceImpl {
    repo: Repository,
    participants: participant::Repository,
    participant_service: participant::Service,
    messages: message::Repository,
    users: user::Client,
    events: event::Service,
}

impl ConversationServiceImpl {
    pub fn new(
        repo: Repository,
        participants: participant::Repository,
        participant_service: participant::Service,
        messages: message::Repository,
        users: user::Client,
        events: event::Service,
    ) -> Self {
        Self {
            repo,
            participants,
            participant_service,
            messages,
            users,
            events,
        }
    }
}

#[async_trait]
impl ConversationService for ConversationServiceImpl {
    async fn create_private(&self, creator: &user::Sub, friend: &user::Sub) -> Result<Id> {
        if creator.eq(friend) {
            return Err(super::Error::SelfPair);
        }

        // a private conversation is never duplicated, blocked ones included
        if let Some(existing) = self.repo.find_private_by_pair(creator, friend).await? {
            return Ok(existing.id().clone());
        }

        let friends = self.users.are_friends(creator, friend).await?;
        if !friends {
            return Err(super::Error::NotFriends(creator.clone(), friend.clone()));
        }

        let conversation = Conversation::private(creator.clone(), friend.clone());
        let id = conversation.id().clone();

        if let Err(e) = self.repo.insert(&conversation).await {
            // a concurrent create for the same pair won the unique index
            if let Some(existing) = self.repo.find_private_by_pair(creator, friend).await? {
                return Ok(existing.id().clone());
            }
            return Err(e.into());
        }
        self.participants
            .insert_many(&[
                Participant::new(id.clone(), creator.clone(), Role::Member),
                Participant::new(id.clone(), friend.clone(), Role::Member),
            ])
            .await?;

        let events = Arc::clone(&self.events);
        let update = MirrorUpdate {
            kind: Some(Kind::Private),
            members: Some(vec![creator.clone(), friend.clone()]),
            ..MirrorUpdate::default()
        };
        let mirror_id = id.clone();
        tokio::spawn(async move {
            events.mirror_conversation(mirror_id, update).await;
        });

        Ok(id)
    }

    async fn create_group(&self, creator: &user::Sub, req: CreateGroupRequest) -> Result<Id> {
        let conversation = Conversation::group(creator.clone(), req.name.clone(), req.avatar);
        let id = conversation.id().clone();

        let mut rows = vec![Participant::new(id.clone(), creator.clone(), Role::Leader)];
        let mut recipients = Vec::new();
        for sub in req.members {
            if sub.eq(creator) || recipients.contains(&sub) {
                continue;
            }
            rows.push(Participant::new(id.clone(), sub.clone(), Role::Member));
            recipients.push(sub);
        }

        self.repo.insert(&conversation).await?;
        self.participants.insert_many(&rows).await?;

        let creator_name = self.display_name(creator).await;
        let members = rows.iter().map(|p| p.sub.clone()).collect::<Vec<_>>();

        let events = Arc::clone(&self.events);
        let noti = Notification::conversation(
            NotificationKind::MemberAdded,
            format!("{creator_name} added you to {}", req.name),
            &id,
        );
        let update = MirrorUpdate {
            kind: Some(Kind::Group),
            name: Some(req.name),
            members: Some(members),
            ..MirrorUpdate::default()
        };
        let mirror_id = id.clone();
        tokio::spawn(async move {
            events.notify(recipients, noti).await;
            events.mirror_conversation(mirror_id, update).await;
        });

        Ok(id)
    }

    async fn update_group(
        &self,
        id: &Id,
        actor: &user::Sub,
        changes: UpdateGroupRequest,
    ) -> Result<()> {
        let conversation = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(super::Error::NotFound(Some(id.clone())))?;

        if conversation.kind != Kind::Group {
            return Err(super::Error::NotGroup);
        }

        self.participant_service
            .require_role(id, actor, &[Role::Leader, Role::Admin])
            .await?;

        self.repo
            .update_info(id, changes.name.as_deref(), changes.avatar.as_deref())
            .await?;

        let recipients = self
            .participant_service
            .fanout_recipients(id, actor)
            .await
            .unwrap_or_default();

        let events = Arc::clone(&self.events);
        let noti = Notification::conversation(
            NotificationKind::GroupUpdated,
            "group info updated".into(),
            id,
        );
        let update = MirrorUpdate {
            name: changes.name,
            avatar: changes.avatar,
            ..MirrorUpdate::default()
        };
        let mirror_id = id.clone();
        tokio::spawn(async move {
            events.notify(recipients, noti).await;
            events.mirror_conversation(mirror_id, update).await;
        });

        Ok(())
    }

    async fn delete(&self, id: &Id, actor: &user::Sub) -> Result<()> {
        let conversation = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(super::Error::NotFound(Some(id.clone())))?;

        match conversation.kind {
            Kind::Group => {
                self.participant_service
                    .require_role(id, actor, &[Role::Leader])
                    .await?;
            }
            Kind::Private => {
                // either party may delete, a blocked membership still counts
                self.participants
                    .find(id, actor)
                    .await?
                    .ok_or(super::Error::NotMember)?;
            }
        }

        let recipients = self
            .participant_service
            .fanout_recipients(id, actor)
            .await
            .unwrap_or_default();

        self.messages.delete_by_conversation(id).await?;
        self.participants.delete_by_conversation(id).await?;
        self.repo.delete(id).await?;

        let events = Arc::clone(&self.events);
        let noti = Notification::conversation(
            NotificationKind::ConversationDeleted,
            "conversation deleted".into(),
            id,
        );
        tokio::spawn(async move {
            events.notify(recipients, noti).await;
        });

        Ok(())
    }

    async fn update_last_message(&self, id: &Id, last: LastMessage) -> Result<()> {
        self.repo.update_last_message(id, &last).await?;

        let events = Arc::clone(&self.events);
        let update = MirrorUpdate {
            last_message_id: Some(last.id),
            last_message_preview: Some(last.preview),
            last_message_sender: Some(last.sender),
            last_message_at: Some(last.at),
            ..MirrorUpdate::default()
        };
        let mirror_id = id.clone();
        tokio::spawn(async move {
            events.mirror_conversation(mirror_id, update).await;
        });

        Ok(())
    }

    async fn mark_read(&self, id: &Id, sub: &user::Sub) -> Result<()> {
        let marked = self
            .participants
            .set_last_read(id, sub, chrono::Utc::now().timestamp_millis())
            .await?;

        if !marked {
            return Err(super::Error::NotMember);
        }

        Ok(())
    }

    async fn find_all(&self, sub: &user::Sub) -> Result<Vec<ConversationDto>> {
        let rows = self.participants.find_active_by_sub(sub).await?;
        let ids = rows
            .iter()
            .map(|p| p.conversation_id.clone())
            .collect::<Vec<_>>();

        let conversations = self.repo.find_by_ids(&ids).await?;

        let mut dtos = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(conversation) = conversations
                .iter()
                .find(|c| c.id() == &row.conversation_id)
            else {
                continue;
            };

            let unread_count = self
                .messages
                .count_created_after(&row.conversation_id, row.last_read_at)
                .await?;

            let (name, avatar) = self.display_info(conversation, sub).await;

            dtos.push(ConversationDto {
                id: conversation.id().clone(),
                kind: conversation.kind,
                name,
                avatar,
                last_message: conversation.last_message.clone(),
                unread_count,
                muted: row.muted,
            });
        }

        // newest activity first
        dtos.sort_by_key(|dto| {
            std::cmp::Reverse(dto.last_message.as_ref().map(|l| l.at).unwrap_or_default())
        });

        Ok(dtos)
    }

    async fn find_by_id(&self, id: &Id, sub: &user::Sub) -> Result<ConversationDetailsDto> {
        let conversation = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(super::Error::NotFound(Some(id.clone())))?;

        self.participant_service.require_active(id, sub).await?;

        let mut members = Vec::new();
        for p in self.participants.find_active_by_conversation(id).await? {
            let info = self
                .users
                .find_user_info(&p.sub)
                .await
                .unwrap_or(UserInfo::placeholder(&p.sub));
            members.push(ParticipantDto::new(p, info));
        }

        Ok(ConversationDetailsDto {
            id: conversation.id().clone(),
            kind: conversation.kind,
            name: conversation.name,
            avatar: conversation.avatar,
            creator: conversation.creator,
            members,
            created_at: conversation.created_at,
        })
    }
}

impl ConversationServiceImpl {
    async fn display_name(&self, sub: &user::Sub) -> String {
        self.users
            .find_user_info(sub)
            .await
            .unwrap_or(UserInfo::placeholder(sub))
            .name
    }

    /// Group conversations show their own metadata, private ones show the
    /// counterpart's display data.
    async fn display_info(
        &self,
        conversation: &Conversation,
        sub: &user::Sub,
    ) -> (Option<String>, Option<String>) {
        match conversation.kind {
            Kind::Group => (conversation.name.clone(), conversation.avatar.clone()),
            Kind::Private => {
                let counterpart = conversation
                    .members
                    .as_ref()
                    .and_then(|pair| pair.iter().find(|m| *m != sub));

                match counterpart {
                    Some(other) => {
                        let info = self
                            .users
                            .find_user_info(other)
                            .await
                            .unwrap_or(UserInfo::placeholder(other));
                        (Some(info.name), info.picture)
                    }
                    None => (None, None),
                }
            }
        }
    }
}
