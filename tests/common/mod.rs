use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mongodb::error::Result;

use conversation_service::conversation::model::{Conversation, LastMessage};
use conversation_service::conversation::repository::ConversationRepository;
use conversation_service::conversation::service::ConversationServiceImpl;
use conversation_service::event::model::{MirrorUpdate, Notification};
use conversation_service::event::service::EventService;
use conversation_service::message::model::{Content, Message};
use conversation_service::message::repository::MessageRepository;
use conversation_service::message::service::MessageServiceImpl;
use conversation_service::participant::model::Participant;
use conversation_service::participant::repository::ParticipantRepository;
use conversation_service::participant::service::ParticipantServiceImpl;
use conversation_service::user::client::UserClient;
use conversation_service::user::model::UserInfo;
use conversation_service::{conversation, message, participant, user};

pub fn sub(s: &str) -> user::Sub {
    user::Sub(s.into())
}

pub fn text(t: &str) -> Content {
    Content::Text { text: t.into() }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Lets background delivery tasks run to completion on the current-thread
/// test runtime.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

#[derive(Default)]
pub struct InMemoryConversations {
    pub rows: Mutex<Vec<Conversation>>,
}

#[async_trait]
impl ConversationRepository for InMemoryConversations {
    async fn insert(&self, c: &Conversation) -> Result<()> {
        self.rows.lock().unwrap().push(c.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &conversation::Id) -> Result<Option<Conversation>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|c| c.id() == id).cloned())
    }

    async fn find_by_ids(&self, ids: &[conversation::Id]) -> Result<Vec<Conversation>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|c| ids.contains(c.id()))
            .cloned()
            .collect())
    }

    async fn find_private_by_pair(
        &self,
        a: &user::Sub,
        b: &user::Sub,
    ) -> Result<Option<Conversation>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|c| {
                c.kind == conversation::Kind::Private
                    && c.members
                        .as_ref()
                        .is_some_and(|pair| pair.contains(a) && pair.contains(b))
            })
            .cloned())
    }

    async fn update_info(
        &self,
        id: &conversation::Id,
        name: Option<&str>,
        avatar: Option<&str>,
    ) -> Result<bool> {
        if name.is_none() && avatar.is_none() {
            return Ok(false);
        }

        let mut rows = self.rows.lock().unwrap();
        let Some(c) = rows.iter_mut().find(|c| c.id() == id) else {
            return Ok(false);
        };

        if let Some(name) = name {
            c.name = Some(name.to_owned());
        }
        if let Some(avatar) = avatar {
            c.avatar = Some(avatar.to_owned());
        }
        Ok(true)
    }

    async fn update_last_message(
        &self,
        id: &conversation::Id,
        last: &LastMessage,
    ) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(c) = rows.iter_mut().find(|c| c.id() == id) {
            c.last_message = Some(last.clone());
        }
        Ok(())
    }

    async fn delete(&self, id: &conversation::Id) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|c| c.id() != id);
        Ok(rows.len() < before)
    }
}

#[derive(Default)]
pub struct InMemoryParticipants {
    pub rows: Mutex<Vec<Participant>>,
}

#[async_trait]
impl ParticipantRepository for InMemoryParticipants {
    async fn insert_many(&self, rows: &[Participant]) -> Result<()> {
        self.rows.lock().unwrap().extend_from_slice(rows);
        Ok(())
    }

    async fn find(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
    ) -> Result<Option<Participant>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|p| &p.conversation_id == conversation_id && &p.sub == sub)
            .cloned())
    }

    async fn find_active(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
    ) -> Result<Option<Participant>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|p| &p.conversation_id == conversation_id && &p.sub == sub && p.is_active())
            .cloned())
    }

    async fn find_active_by_conversation(
        &self,
        conversation_id: &conversation::Id,
    ) -> Result<Vec<Participant>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|p| &p.conversation_id == conversation_id && p.is_active())
            .cloned()
            .collect())
    }

    async fn find_active_by_sub(&self, sub: &user::Sub) -> Result<Vec<Participant>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|p| &p.sub == sub && p.is_active())
            .cloned()
            .collect())
    }

    async fn reactivate(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
    ) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(p) = rows
            .iter_mut()
            .find(|p| &p.conversation_id == conversation_id && &p.sub == sub && !p.is_active())
        else {
            return Ok(false);
        };

        p.role = participant::Role::Member;
        p.left_at = None;
        p.joined_at = now();
        Ok(true)
    }

    async fn set_left(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
    ) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(p) = rows
            .iter_mut()
            .find(|p| &p.conversation_id == conversation_id && &p.sub == sub && p.is_active())
        else {
            return Ok(false);
        };

        p.left_at = Some(now());
        Ok(true)
    }

    async fn end_all(&self, conversation_id: &conversation::Id) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut ended = 0;
        for p in rows
            .iter_mut()
            .filter(|p| &p.conversation_id == conversation_id && p.is_active())
        {
            p.left_at = Some(now());
            ended += 1;
        }
        Ok(ended)
    }

    async fn set_role(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
        role: participant::Role,
    ) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(p) = rows
            .iter_mut()
            .find(|p| &p.conversation_id == conversation_id && &p.sub == sub && p.is_active())
        else {
            return Ok(false);
        };

        p.role = role;
        Ok(true)
    }

    async fn demote_leader(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
    ) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(p) = rows.iter_mut().find(|p| {
            &p.conversation_id == conversation_id
                && &p.sub == sub
                && p.role == participant::Role::Leader
                && p.is_active()
        }) else {
            return Ok(false);
        };

        p.role = participant::Role::Admin;
        Ok(true)
    }

    async fn set_last_read(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
        at: i64,
    ) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(p) = rows
            .iter_mut()
            .find(|p| &p.conversation_id == conversation_id && &p.sub == sub && p.is_active())
        else {
            return Ok(false);
        };

        p.last_read_at = at;
        Ok(true)
    }

    async fn set_nickname(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
        nickname: Option<&str>,
    ) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(p) = rows
            .iter_mut()
            .find(|p| &p.conversation_id == conversation_id && &p.sub == sub && p.is_active())
        else {
            return Ok(false);
        };

        p.nickname = nickname.map(str::to_owned);
        Ok(true)
    }

    async fn set_muted(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
        muted: bool,
    ) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(p) = rows
            .iter_mut()
            .find(|p| &p.conversation_id == conversation_id && &p.sub == sub && p.is_active())
        else {
            return Ok(false);
        };

        p.muted = muted;
        Ok(true)
    }

    async fn delete_by_conversation(&self, conversation_id: &conversation::Id) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|p| &p.conversation_id != conversation_id);
        Ok((before - rows.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryMessages {
    pub rows: Mutex<Vec<Message>>,
}

#[async_trait]
impl MessageRepository for InMemoryMessages {
    async fn insert(&self, msg: &Message) -> Result<()> {
        self.rows.lock().unwrap().push(msg.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &message::Id) -> Result<Option<Message>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|m| m.id() == id).cloned())
    }

    async fn find_by_conversation(
        &self,
        conversation_id: &conversation::Id,
        reader: &user::Sub,
        limit: i64,
        before: Option<i64>,
    ) -> Result<Vec<Message>> {
        let rows = self.rows.lock().unwrap();
        let mut page = rows
            .iter()
            .filter(|m| {
                &m.conversation_id == conversation_id
                    && !m.deleted_for.contains(reader)
                    && before.is_none_or(|before| m.created_at < before)
            })
            .cloned()
            .collect::<Vec<_>>();

        page.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.id().0.cmp(&a.id().0))
        });
        page.truncate(limit as usize);
        Ok(page)
    }

    async fn set_edited(
        &self,
        id: &message::Id,
        sender: &user::Sub,
        new_text: &str,
        at: i64,
    ) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(m) = rows.iter_mut().find(|m| {
            m.id() == id
                && &m.sender == sender
                && !m.is_recalled()
                && matches!(m.content, Content::Text { .. })
        }) else {
            return Ok(false);
        };

        if let Content::Text { text } = &mut m.content {
            *text = new_text.to_owned();
        }
        m.edited_at = Some(at);
        Ok(true)
    }

    async fn set_recalled(
        &self,
        id: &message::Id,
        sender: &user::Sub,
        cleared: &Content,
        at: i64,
    ) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(m) = rows
            .iter_mut()
            .find(|m| m.id() == id && &m.sender == sender && !m.is_recalled())
        else {
            return Ok(false);
        };

        m.content = cleared.clone();
        m.recalled_at = Some(at);
        Ok(true)
    }

    async fn add_deleted_for(&self, id: &message::Id, sub: &user::Sub) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(m) = rows.iter_mut().find(|m| m.id() == id) else {
            return Ok(false);
        };

        if !m.deleted_for.contains(sub) {
            m.deleted_for.push(sub.clone());
        }
        Ok(true)
    }

    async fn count_created_after(
        &self,
        conversation_id: &conversation::Id,
        after: i64,
    ) -> Result<u64> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|m| &m.conversation_id == conversation_id && m.created_at > after)
            .count() as u64)
    }

    async fn delete_by_conversation(&self, conversation_id: &conversation::Id) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|m| &m.conversation_id != conversation_id);
        Ok((before - rows.len()) as u64)
    }
}

/// Profile service stub: every sub resolves, the display name is the sub
/// itself, and friendships are whatever the test declared.
#[derive(Default)]
pub struct FakeUserClient {
    pub friends: Mutex<Vec<(user::Sub, user::Sub)>>,
}

impl FakeUserClient {
    pub fn befriend(&self, a: &user::Sub, b: &user::Sub) {
        self.friends.lock().unwrap().push((a.clone(), b.clone()));
    }
}

#[async_trait]
impl UserClient for FakeUserClient {
    async fn find_user_info(&self, sub: &user::Sub) -> Option<UserInfo> {
        Some(UserInfo {
            sub: sub.clone(),
            name: sub.to_string(),
            picture: None,
        })
    }

    async fn are_friends(
        &self,
        me: &user::Sub,
        other: &user::Sub,
    ) -> std::result::Result<bool, user::Error> {
        let friends = self.friends.lock().unwrap();
        Ok(friends
            .iter()
            .any(|(a, b)| (a == me && b == other) || (a == other && b == me)))
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    pub notifications: Mutex<Vec<(Vec<user::Sub>, Notification)>>,
    pub mirrors: Mutex<Vec<(conversation::Id, MirrorUpdate)>>,
}

#[async_trait]
impl EventService for RecordingEvents {
    async fn notify(&self, recipients: Vec<user::Sub>, noti: Notification) {
        self.notifications.lock().unwrap().push((recipients, noti));
    }

    async fn mirror_conversation(&self, id: conversation::Id, update: MirrorUpdate) {
        self.mirrors.lock().unwrap().push((id, update));
    }
}

/// Event sink that blows up on every delivery. Mutations must still succeed
/// with this wired in.
pub struct PanickingEvents;

#[async_trait]
impl EventService for PanickingEvents {
    async fn notify(&self, _recipients: Vec<user::Sub>, _noti: Notification) {
        panic!("delivery channel down");
    }

    async fn mirror_conversation(&self, _id: conversation::Id, _update: MirrorUpdate) {
        panic!("mirror down");
    }
}

pub struct Harness {
    pub conversations: conversation::Service,
    pub participants: participant::Service,
    pub messages: message::Service,

    pub conversation_repo: Arc<InMemoryConversations>,
    pub participant_repo: Arc<InMemoryParticipants>,
    pub message_repo: Arc<InMemoryMessages>,
    pub users: Arc<FakeUserClient>,
    pub events: Arc<RecordingEvents>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_events(Arc::new(RecordingEvents::default()))
    }

    pub fn with_panicking_events() -> Self {
        let events = Arc::new(RecordingEvents::default());
        let mut harness = Self::with_events(events);
        harness.rewire_events(Arc::new(PanickingEvents));
        harness
    }

    fn with_events(events: Arc<RecordingEvents>) -> Self {
        let conversation_repo = Arc::new(InMemoryConversations::default());
        let participant_repo = Arc::new(InMemoryParticipants::default());
        let message_repo = Arc::new(InMemoryMessages::default());
        let users = Arc::new(FakeUserClient::default());

        let event_service: conversation_service::event::Service = events.clone();
        let (conversations, participants, messages) = wire(
            Arc::clone(&conversation_repo),
            Arc::clone(&participant_repo),
            Arc::clone(&message_repo),
            Arc::clone(&users),
            event_service,
        );

        Self {
            conversations,
            participants,
            messages,
            conversation_repo,
            participant_repo,
            message_repo,
            users,
            events,
        }
    }

    fn rewire_events(&mut self, events: conversation_service::event::Service) {
        let (conversations, participants, messages) = wire(
            Arc::clone(&self.conversation_repo),
            Arc::clone(&self.participant_repo),
            Arc::clone(&self.message_repo),
            Arc::clone(&self.users),
            events,
        );
        self.conversations = conversations;
        self.participants = participants;
        self.messages = messages;
    }
}

fn wire(
    conversation_repo: Arc<InMemoryConversations>,
    participant_repo: Arc<InMemoryParticipants>,
    message_repo: Arc<InMemoryMessages>,
    users: Arc<FakeUserClient>,
    events: conversation_service::event::Service,
) -> (
    conversation::Service,
    participant::Service,
    message::Service,
) {
    let users: user::Client = users;
    let conversation_repo: conversation::Repository = conversation_repo;
    let participant_repo: participant::Repository = participant_repo;
    let message_repo: message::Repository = message_repo;

    let participants: participant::Service = Arc::new(ParticipantServiceImpl::new(
        Arc::clone(&participant_repo),
        Arc::clone(&conversation_repo),
        Arc::clone(&message_repo),
        Arc::clone(&users),
        Arc::clone(&events),
    ));

    let conversations: conversation::Service = Arc::new(ConversationServiceImpl::new(
        conversation_repo,
        participant_repo,
        Arc::clone(&participants),
        Arc::clone(&message_repo),
        Arc::clone(&users),
        Arc::clone(&events),
    ));

    let messages: message::Service = Arc::new(MessageServiceImpl::new(
        message_repo,
        Arc::clone(&participants),
        Arc::clone(&conversations),
        users,
        events,
    ));

    (conversations, participants, messages)
}
