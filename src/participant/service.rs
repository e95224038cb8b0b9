use std::sync::Arc;

use async_trait::async_trait;
use log::error;

use crate::conversation::Kind;
use crate::event::model::{MirrorUpdate, Notification, NotificationKind};
use crate::message::model::Message;
use crate::user::model::UserInfo;
use crate::{conversation, event, message, user};

use super::model::Participant;
use super::{Repository, Result, Role};

/// The sole gate to every conversation mutation: role and activity are
/// re-checked at call time, never trusted from an earlier read.
#[async_trait]
pub trait ParticipantService {
    async fn add_member(
        &self,
        id: &conversation::Id,
        actor: &user::Sub,
        target: user::Sub,
    ) -> Result<()>;

    async fn remove_member(
        &self,
        id: &conversation::Id,
        actor: &user::Sub,
        target: &user::Sub,
    ) -> Result<()>;

    async fn leave(&self, id: &conversation::Id, sub: &user::Sub) -> Result<()>;

    async fn update_role(
        &self,
        id: &conversation::Id,
        actor: &user::Sub,
        target: &user::Sub,
        new_role: Role,
    ) -> Result<()>;

    async fn transfer_leadership(
        &self,
        id: &conversation::Id,
        actor: &user::Sub,
        new_leader: &user::Sub,
    ) -> Result<()>;

    async fn block(&self, id: &conversation::Id, actor: &user::Sub) -> Result<()>;

    async fn set_nickname(
        &self,
        id: &conversation::Id,
        sub: &user::Sub,
        nickname: Option<String>,
    ) -> Result<()>;

    async fn set_muted(&self, id: &conversation::Id, sub: &user::Sub, muted: bool) -> Result<()>;

    async fn require_active(
        &self,
        id: &conversation::Id,
        sub: &user::Sub,
    ) -> Result<Participant>;

    async fn require_role(
        &self,
        id: &conversation::Id,
        sub: &user::Sub,
        allowed: &[Role],
    ) -> Result<Participant>;

    /// Everyone who should see a fan-out event: active, not muted, not the
    /// acting user.
    async fn fanout_recipients(
        &self,
        id: &conversation::Id,
        except: &user::Sub,
    ) -> Result<Vec<user::Sub>>;
}

#[derive(Clone)]
pub struct ParticipantServiceImpl {
    repo: Repository,
    conversations: conversation::Repository,
    messages: message::Repository,
    users: user::Client,
    events: event::Service,
}

impl ParticipantServiceImpl {
    pub fn new(
        repo: Repository,
        conversations: conversation::Repository,
        messages: message::Repository,
        users: user::Client,
        events: event::Service,
    ) -> Self {
        Self {
            repo,
            conversations,
            messages,
            users,
            events,
        }
    }
}

#[async_trait]
impl ParticipantService for ParticipantServiceImpl {
    async fn add_member(
        &self,
        id: &conversation::Id,
        actor: &user::Sub,
        target: user::Sub,
    ) -> Result<()> {
        self.require_group(id).await?;
        self.require_role(id, actor, &[Role::Leader, Role::Admin])
            .await?;

        match self.repo.find(id, &target).await? {
            Some(row) if row.is_active() => return Err(super::Error::AlreadyMember(target)),
            Some(_) => {
                if !self.repo.reactivate(id, &target).await? {
                    return Err(super::Error::AlreadyMember(target));
                }
            }
            None => {
                self.repo
                    .insert_many(&[Participant::new(
                        id.clone(),
                        target.clone(),
                        Role::Member,
                    )])
                    .await?;
            }
        }

        let actor_name = self.display_name(actor).await;
        let target_name = self.display_name(&target).await;

        self.messages
            .insert(&Message::system(
                id.clone(),
                actor.clone(),
                format!("{target_name} joined the conversation"),
            ))
            .await?;

        self.dispatch(
            id,
            actor,
            Notification::conversation(
                NotificationKind::MemberAdded,
                format!("{actor_name} added {target_name}"),
                id,
            ),
        );

        Ok(())
    }

    async fn remove_member(
        &self,
        id: &conversation::Id,
        actor: &user::Sub,
        target: &user::Sub,
    ) -> Result<()> {
        self.require_group(id).await?;
        let actor_row = self
            .require_role(id, actor, &[Role::Leader, Role::Admin])
            .await?;
        let target_row = self
            .repo
            .find_active(id, target)
            .await?
            .ok_or(super::Error::NotMember(target.clone()))?;

        match target_row.role {
            Role::Leader => return Err(super::Error::LeaderImmune),
            // an admin is only removable by the leader, not by a peer admin
            Role::Admin if actor_row.role != Role::Leader => {
                return Err(super::Error::InsufficientRole);
            }
            _ => {}
        }

        if !self.repo.set_left(id, target).await? {
            return Err(super::Error::NotMember(target.clone()));
        }

        let actor_name = self.display_name(actor).await;
        let target_name = self.display_name(target).await;

        self.messages
            .insert(&Message::system(
                id.clone(),
                actor.clone(),
                format!("{target_name} was removed from the conversation"),
            ))
            .await?;

        self.dispatch(
            id,
            actor,
            Notification::conversation(
                NotificationKind::MemberRemoved,
                format!("{actor_name} removed {target_name}"),
                id,
            ),
        );

        Ok(())
    }

    async fn leave(&self, id: &conversation::Id, sub: &user::Sub) -> Result<()> {
        self.require_group(id).await?;
        let row = self.require_active(id, sub).await?;

        if row.role == Role::Leader {
            return Err(super::Error::LeaderMustTransfer);
        }

        if !self.repo.set_left(id, sub).await? {
            return Err(super::Error::NotMember(sub.clone()));
        }

        let name = self.display_name(sub).await;

        self.messages
            .insert(&Message::system(
                id.clone(),
                sub.clone(),
                format!("{name} left the conversation"),
            ))
            .await?;

        self.dispatch(
            id,
            sub,
            Notification::conversation(
                NotificationKind::MemberLeft,
                format!("{name} left the conversation"),
                id,
            ),
        );

        Ok(())
    }

    async fn update_role(
        &self,
        id: &conversation::Id,
        actor: &user::Sub,
        target: &user::Sub,
        new_role: Role,
    ) -> Result<()> {
        self.require_group(id).await?;
        self.require_role(id, actor, &[Role::Leader]).await?;

        // leadership moves only through transfer_leadership
        if new_role == Role::Leader || target.eq(actor) {
            return Err(super::Error::RoleNotAssignable);
        }

        self.repo
            .find_active(id, target)
            .await?
            .ok_or(super::Error::NotMember(target.clone()))?;

        if !self.repo.set_role(id, target, new_role).await? {
            return Err(super::Error::NotMember(target.clone()));
        }

        let target_name = self.display_name(target).await;
        let descr = match new_role {
            Role::Admin => format!("{target_name} is now an admin"),
            _ => format!("{target_name} is now a member"),
        };

        self.messages
            .insert(&Message::system(id.clone(), actor.clone(), descr.clone()))
            .await?;

        self.dispatch(
            id,
            actor,
            Notification::conversation(NotificationKind::RoleChanged, descr, id),
        );

        Ok(())
    }

    async fn transfer_leadership(
        &self,
        id: &conversation::Id,
        actor: &user::Sub,
        new_leader: &user::Sub,
    ) -> Result<()> {
        self.require_group(id).await?;

        if actor.eq(new_leader) {
            return Err(super::Error::SelfTransfer);
        }

        self.require_role(id, actor, &[Role::Leader]).await?;
        self.repo
            .find_active(id, new_leader)
            .await?
            .ok_or(super::Error::NotMember(new_leader.clone()))?;

        // the conditional demotion is the linearization point: a concurrent
        // transfer that wins it leaves this caller with a Conflict
        if !self.repo.demote_leader(id, actor).await? {
            return Err(super::Error::TransferConflict);
        }

        if !self.repo.set_role(id, new_leader, Role::Leader).await? {
            // the target went inactive in between, restore the old leader
            self.repo.set_role(id, actor, Role::Leader).await?;
            return Err(super::Error::NotMember(new_leader.clone()));
        }

        let name = self.display_name(new_leader).await;

        self.messages
            .insert(&Message::system(
                id.clone(),
                actor.clone(),
                format!("{name} is now the group leader"),
            ))
            .await?;

        self.dispatch(
            id,
            actor,
            Notification::conversation(
                NotificationKind::LeadershipTransferred,
                format!("{name} is now the group leader"),
                id,
            ),
        );

        Ok(())
    }

    async fn block(&self, id: &conversation::Id, actor: &user::Sub) -> Result<()> {
        let conversation = self
            .conversations
            .find_by_id(id)
            .await?
            .ok_or(super::Error::ConversationNotFound(id.clone()))?;

        if conversation.kind != Kind::Private {
            return Err(super::Error::NotPrivate);
        }

        self.require_active(id, actor).await?;

        // recipients must be resolved before the freeze empties the roster
        let rows = self.repo.find_active_by_conversation(id).await?;

        // both sides end simultaneously; history stays readable
        self.repo.end_all(id).await?;

        let name = self.display_name(actor).await;
        let noti = Notification::conversation(
            NotificationKind::ConversationBlocked,
            format!("{name} blocked the conversation"),
            id,
        );

        let events = Arc::clone(&self.events);
        let id = id.clone();
        let except = actor.clone();
        tokio::spawn(async move {
            let recipients = rows
                .into_iter()
                .filter(|p| !p.muted && p.sub != except)
                .map(|p| p.sub)
                .collect::<Vec<_>>();

            events.notify(recipients, noti).await;
            events
                .mirror_conversation(
                    id,
                    MirrorUpdate {
                        members: Some(Vec::new()),
                        ..MirrorUpdate::default()
                    },
                )
                .await;
        });

        Ok(())
    }

    async fn set_nickname(
        &self,
        id: &conversation::Id,
        sub: &user::Sub,
        nickname: Option<String>,
    ) -> Result<()> {
        if !self.repo.set_nickname(id, sub, nickname.as_deref()).await? {
            return Err(super::Error::NotMember(sub.clone()));
        }
        Ok(())
    }

    async fn set_muted(&self, id: &conversation::Id, sub: &user::Sub, muted: bool) -> Result<()> {
        if !self.repo.set_muted(id, sub, muted).await? {
            return Err(super::Error::NotMember(sub.clone()));
        }
        Ok(())
    }

    async fn require_active(
        &self,
        id: &conversation::Id,
        sub: &user::Sub,
    ) -> Result<Participant> {
        self.repo
            .find_active(id, sub)
            .await?
            .ok_or(super::Error::NotMember(sub.clone()))
    }

    async fn require_role(
        &self,
        id: &conversation::Id,
        sub: &user::Sub,
        allowed: &[Role],
    ) -> Result<Participant> {
        let row = self.require_active(id, sub).await?;

        if !allowed.contains(&row.role) {
            return Err(super::Error::InsufficientRole);
        }

        Ok(row)
    }

    async fn fanout_recipients(
        &self,
        id: &conversation::Id,
        except: &user::Sub,
    ) -> Result<Vec<user::Sub>> {
        let rows = self.repo.find_active_by_conversation(id).await?;

        Ok(rows
            .into_iter()
            .filter(|p| !p.muted && !p.sub.eq(except))
            .map(|p| p.sub)
            .collect())
    }
}

impl ParticipantServiceImpl {
    async fn require_group(&self, id: &conversation::Id) -> Result<()> {
        let conversation = self
            .conversations
            .find_by_id(id)
            .await?
            .ok_or(super::Error::ConversationNotFound(id.clone()))?;

        if conversation.kind != Kind::Group {
            return Err(super::Error::NotGroup);
        }

        Ok(())
    }

    async fn display_name(&self, sub: &user::Sub) -> String {
        self.users
            .find_user_info(sub)
            .await
            .unwrap_or(UserInfo::placeholder(sub))
            .name
    }

    /// Fire-and-forget fan-out plus a member-list refresh of the mirror.
    /// Failures degrade delivery, never the membership mutation itself.
    fn dispatch(&self, id: &conversation::Id, except: &user::Sub, noti: Notification) {
        let repo = Arc::clone(&self.repo);
        let events = Arc::clone(&self.events);
        let id = id.clone();
        let except = except.clone();

        tokio::spawn(async move {
            let rows = match repo.find_active_by_conversation(&id).await {
                Ok(rows) => rows,
                Err(e) => {
                    error!("failed to resolve fan-out recipients for {id}: {e}");
                    return;
                }
            };

            let members = rows.iter().map(|p| p.sub.clone()).collect::<Vec<_>>();
            let recipients = rows
                .into_iter()
                .filter(|p| !p.muted && p.sub != except)
                .map(|p| p.sub)
                .collect::<Vec<_>>();

            events.notify(recipients, noti).await;
            events
                .mirror_conversation(
                    id,
                    MirrorUpdate {
                        members: Some(members),
                        ..MirrorUpdate::default()
                    },
                )
                .await;
        });
    }
}
