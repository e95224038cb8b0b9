use std::sync::Arc;

use axum::extract::FromRef;

use crate::conversation::repository::MongoConversationRepository;
use crate::conversation::service::ConversationServiceImpl;
use crate::event::service::RedisEventService;
use crate::integration::{self, cache};
use crate::message::repository::MongoMessageRepository;
use crate::message::service::MessageServiceImpl;
use crate::participant::repository::MongoParticipantRepository;
use crate::participant::service::ParticipantServiceImpl;
use crate::user::client::HttpUserClient;
use crate::{conversation, message, participant, user};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub conversation_service: conversation::Service,
    pub participant_service: participant::Service,
    pub message_service: message::Service,
}

impl AppState {
    pub async fn init(config: &integration::Config) -> integration::Result<Self> {
        let database = config.mongo.connect();
        let redis = cache::Redis::new(config.redis.connect().await?);
        let http = integration::init_http_client();

        let users: user::Client = Arc::new(HttpUserClient::new(
            config.users.clone(),
            http,
            redis.clone(),
        ));
        let events: crate::event::Service = Arc::new(RedisEventService::new(redis));

        let conversations = MongoConversationRepository::new(&database);
        conversations.create_indexes().await?;
        let conversation_repo: conversation::Repository = Arc::new(conversations);
        let participant_repo: participant::Repository =
            Arc::new(MongoParticipantRepository::new(&database));
        let message_repo: message::Repository = Arc::new(MongoMessageRepository::new(&database));

        let participant_service: participant::Service = Arc::new(ParticipantServiceImpl::new(
            Arc::clone(&participant_repo),
            Arc::clone(&conversation_repo),
            Arc::clone(&message_repo),
            Arc::clone(&users),
            Arc::clone(&events),
        ));

        let conversation_service: conversation::Service = Arc::new(ConversationServiceImpl::new(
            Arc::clone(&conversation_repo),
            Arc::clone(&participant_repo),
            Arc::clone(&participant_service),
            Arc::clone(&message_repo),
            Arc::clone(&users),
            Arc::clone(&events),
        ));

        let message_service: message::Service = Arc::new(MessageServiceImpl::new(
            message_repo,
            Arc::clone(&participant_service),
            Arc::clone(&conversation_service),
            users,
            events,
        ));

        Ok(Self {
            conversation_service,
            participant_service,
            message_service,
        })
    }
}
