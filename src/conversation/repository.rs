use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Database, IndexModel, error::Result};

use crate::user;

use super::model::{Conversation, LastMessage};
use super::{Id, Kind};

const CONVERSATIONS_COLLECTION: &str = "conversations";

#[async_trait]
pub trait ConversationRepository {
    async fn insert(&self, c: &Conversation) -> Result<()>;

    async fn find_by_id(&self, id: &Id) -> Result<Option<Conversation>>;

    async fn find_by_ids(&self, ids: &[Id]) -> Result<Vec<Conversation>>;

    /// Pair lookup for private conversations, order-insensitive. Blocked
    /// pairs are matched as well, a private conversation is never duplicated.
    async fn find_private_by_pair(
        &self,
        a: &user::Sub,
        b: &user::Sub,
    ) -> Result<Option<Conversation>>;

    async fn update_info(&self, id: &Id, name: Option<&str>, avatar: Option<&str>)
    -> Result<bool>;

    /// Unconditional overwrite of the cached last-message fields.
    async fn update_last_message(&self, id: &Id, last: &LastMessage) -> Result<()>;

    async fn delete(&self, id: &Id) -> Result<bool>;
}

pub struct MongoConversationRepository {
    col: mongodb::Collection<Conversation>,
}

impl MongoConversationRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            col: db.collection(CONVERSATIONS_COLLECTION),
        }
    }

    /// One document per private pair, enforced at the storage layer so
    /// concurrent creates cannot both insert.
    pub async fn create_indexes(&self) -> Result<()> {
        let options = IndexOptions::builder()
            .unique(true)
            .partial_filter_expression(doc! { "kind": Kind::Private })
            .build();
        let index = IndexModel::builder()
            .keys(doc! { "pair_key": 1 })
            .options(options)
            .build();

        self.col.create_index(index).await?;
        Ok(())
    }
}

#[async_trait]
impl ConversationRepository for MongoConversationRepository {
    async fn insert(&self, c: &Conversation) -> Result<()> {
        self.col.insert_one(c).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &Id) -> Result<Option<Conversation>> {
        self.col.find_one(doc! { "_id": id }).await
    }

    async fn find_by_ids(&self, ids: &[Id]) -> Result<Vec<Conversation>> {
        let cursor = self
            .col
            .find(doc! { "_id": { "$in": ids.to_vec() } })
            .await?;

        cursor.try_collect().await
    }

    async fn find_private_by_pair(
        &self,
        a: &user::Sub,
        b: &user::Sub,
    ) -> Result<Option<Conversation>> {
        self.col
            .find_one(doc! { "pair_key": Conversation::pair_key(a, b) })
            .await
    }

    async fn update_info(
        &self,
        id: &Id,
        name: Option<&str>,
        avatar: Option<&str>,
    ) -> Result<bool> {
        let mut changes = doc! {};
        if let Some(name) = name {
            changes.insert("name", name);
        }
        if let Some(avatar) = avatar {
            changes.insert("avatar", avatar);
        }
        if changes.is_empty() {
            return Ok(false);
        }

        let res = self
            .col
            .update_one(doc! { "_id": id }, doc! { "$set": changes })
            .await?;

        Ok(res.modified_count > 0)
    }

    async fn update_last_message(&self, id: &Id, last: &LastMessage) -> Result<()> {
        let last = mongodb::bson::to_bson(last)?;
        self.col
            .update_one(doc! { "_id": id }, doc! { "$set": { "last_message": last } })
            .await?;

        Ok(())
    }

    async fn delete(&self, id: &Id) -> Result<bool> {
        let res = self.col.delete_one(doc! { "_id": id }).await?;
        Ok(res.deleted_count > 0)
    }
}
