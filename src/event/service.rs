use async_trait::async_trait;
use log::warn;

use crate::conversation;
use crate::integration::cache;
use crate::user;

use super::model::{MirrorUpdate, Notification, Subject};

/// Delivery side effects only. Implementations are infallible by contract,
/// a failed delivery is logged and dropped.
#[async_trait]
pub trait EventService {
    async fn notify(&self, recipients: Vec<user::Sub>, noti: Notification);

    async fn mirror_conversation(&self, id: conversation::Id, update: MirrorUpdate);
}

#[derive(Clone)]
pub struct RedisEventService {
    redis: cache::Redis,
}

impl RedisEventService {
    pub fn new(redis: cache::Redis) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl EventService for RedisEventService {
    async fn notify(&self, recipients: Vec<user::Sub>, noti: Notification) {
        let payload = match serde_json::to_vec(&noti) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("failed to serialize notification: {e}");
                return;
            }
        };

        for recipient in recipients {
            let channel = Subject::Notifications(&recipient).to_string();
            self.redis.publish(&channel, payload.clone()).await;
        }
    }

    async fn mirror_conversation(&self, id: conversation::Id, update: MirrorUpdate) {
        self.redis
            .hset_fields(&cache::Key::Conversation(id), &update.fields())
            .await;
    }
}
