use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, doc};
use mongodb::{Database, error::Result};

use crate::{conversation, user};

use super::Id;
use super::model::{Content, Message};

const MESSAGES_COLLECTION: &str = "messages";

#[async_trait]
pub trait MessageRepository {
    async fn insert(&self, msg: &Message) -> Result<()>;

    async fn find_by_id(&self, id: &Id) -> Result<Option<Message>>;

    /// Newest-first page of the conversation history, excluding messages the
    /// reader deleted for themselves. Ties on `created_at` fall back to the
    /// natural id order.
    async fn find_by_conversation(
        &self,
        conversation_id: &conversation::Id,
        reader: &user::Sub,
        limit: i64,
        before: Option<i64>,
    ) -> Result<Vec<Message>>;

    /// Conditional edit: applies only while the message is an unrecalled
    /// text message owned by `sender`.
    async fn set_edited(&self, id: &Id, sender: &user::Sub, text: &str, at: i64)
    -> Result<bool>;

    /// Conditional recall: wipes the payload exactly once.
    async fn set_recalled(
        &self,
        id: &Id,
        sender: &user::Sub,
        cleared: &Content,
        at: i64,
    ) -> Result<bool>;

    async fn add_deleted_for(&self, id: &Id, sub: &user::Sub) -> Result<bool>;

    async fn count_created_after(
        &self,
        conversation_id: &conversation::Id,
        after: i64,
    ) -> Result<u64>;

    async fn delete_by_conversation(&self, conversation_id: &conversation::Id) -> Result<u64>;
}

pub struct MongoMessageRepository {
    col: mongodb::Collection<Message>,
}

impl MongoMessageRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            col: db.collection(MESSAGES_COLLECTION),
        }
    }
}

#[async_trait]
impl MessageRepository for MongoMessageRepository {
    async fn insert(&self, msg: &Message) -> Result<()> {
        self.col.insert_one(msg).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &Id) -> Result<Option<Message>> {
        self.col.find_one(doc! { "_id": id }).await
    }

    async fn find_by_conversation(
        &self,
        conversation_id: &conversation::Id,
        reader: &user::Sub,
        limit: i64,
        before: Option<i64>,
    ) -> Result<Vec<Message>> {
        let mut filter = doc! {
            "conversation_id": conversation_id,
            "deleted_for": { "$ne": reader },
        };
        if let Some(before) = before {
            filter.insert("created_at", doc! { "$lt": before });
        }

        let cursor = self
            .col
            .find(filter)
            .sort(doc! { "created_at": -1, "_id": -1 })
            .limit(limit)
            .await?;

        cursor.try_collect().await
    }

    async fn set_edited(
        &self,
        id: &Id,
        sender: &user::Sub,
        text: &str,
        at: i64,
    ) -> Result<bool> {
        let res = self
            .col
            .update_one(
                doc! {
                    "_id": id,
                    "sender": sender,
                    "content.kind": "text",
                    "recalled_at": Bson::Null
                },
                doc! { "$set": { "content.text": text, "edited_at": at } },
            )
            .await?;

        Ok(res.modified_count > 0)
    }

    async fn set_recalled(
        &self,
        id: &Id,
        sender: &user::Sub,
        cleared: &Content,
        at: i64,
    ) -> Result<bool> {
        let cleared = mongodb::bson::to_bson(cleared)?;
        let res = self
            .col
            .update_one(
                doc! {
                    "_id": id,
                    "sender": sender,
                    "recalled_at": Bson::Null
                },
                doc! { "$set": { "content": cleared, "recalled_at": at } },
            )
            .await?;

        Ok(res.modified_count > 0)
    }

    async fn add_deleted_for(&self, id: &Id, sub: &user::Sub) -> Result<bool> {
        let res = self
            .col
            .update_one(
                doc! { "_id": id },
                doc! { "$addToSet": { "deleted_for": sub } },
            )
            .await?;

        Ok(res.matched_count > 0)
    }

    async fn count_created_after(
        &self,
        conversation_id: &conversation::Id,
        after: i64,
    ) -> Result<u64> {
        self.col
            .count_documents(doc! {
                "conversation_id": conversation_id,
                "created_at": { "$gt": after }
            })
            .await
    }

    async fn delete_by_conversation(&self, conversation_id: &conversation::Id) -> Result<u64> {
        let res = self
            .col
            .delete_many(doc! { "conversation_id": conversation_id })
            .await?;

        Ok(res.deleted_count)
    }
}
