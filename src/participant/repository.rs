use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, doc};
use mongodb::{Database, error::Result};

use crate::{conversation, user};

use super::Role;
use super::model::Participant;

const PARTICIPANTS_COLLECTION: &str = "participants";

/// Canonical active-member set. All role and membership transitions are
/// conditional single-document updates; `false` from a mutation means the
/// precondition did not hold at write time (stale caller or lost race).
#[async_trait]
pub trait ParticipantRepository {
    async fn insert_many(&self, rows: &[Participant]) -> Result<()>;

    async fn find(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
    ) -> Result<Option<Participant>>;

    async fn find_active(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
    ) -> Result<Option<Participant>>;

    async fn find_active_by_conversation(
        &self,
        conversation_id: &conversation::Id,
    ) -> Result<Vec<Participant>>;

    async fn find_active_by_sub(&self, sub: &user::Sub) -> Result<Vec<Participant>>;

    /// Re-joins a previously left row: role reset to Member, `left_at`
    /// cleared. Applies only to inactive rows.
    async fn reactivate(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
    ) -> Result<bool>;

    async fn set_left(&self, conversation_id: &conversation::Id, sub: &user::Sub)
    -> Result<bool>;

    /// Ends every active membership at once. Backs the private-conversation
    /// block, which freezes both sides simultaneously.
    async fn end_all(&self, conversation_id: &conversation::Id) -> Result<u64>;

    async fn set_role(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
        role: Role,
    ) -> Result<bool>;

    /// Compare-and-swap demotion of the current leader. The `role: leader`
    /// condition makes this the linearization point of a leadership
    /// transfer: of any number of concurrent transfers, at most one can
    /// observe `true`.
    async fn demote_leader(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
    ) -> Result<bool>;

    async fn set_last_read(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
        at: i64,
    ) -> Result<bool>;

    async fn set_nickname(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
        nickname: Option<&str>,
    ) -> Result<bool>;

    async fn set_muted(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
        muted: bool,
    ) -> Result<bool>;

    async fn delete_by_conversation(&self, conversation_id: &conversation::Id) -> Result<u64>;
}

pub struct MongoParticipantRepository {
    col: mongodb::Collection<Participant>,
}

impl MongoParticipantRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            col: db.collection(PARTICIPANTS_COLLECTION),
        }
    }
}

#[async_trait]
impl ParticipantRepository for MongoParticipantRepository {
    async fn insert_many(&self, rows: &[Participant]) -> Result<()> {
        self.col.insert_many(rows).await?;
        Ok(())
    }

    async fn find(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
    ) -> Result<Option<Participant>> {
        self.col
            .find_one(doc! { "conversation_id": conversation_id, "sub": sub })
            .await
    }

    async fn find_active(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
    ) -> Result<Option<Participant>> {
        self.col
            .find_one(doc! {
                "conversation_id": conversation_id,
                "sub": sub,
                "left_at": Bson::Null
            })
            .await
    }

    async fn find_active_by_conversation(
        &self,
        conversation_id: &conversation::Id,
    ) -> Result<Vec<Participant>> {
        let cursor = self
            .col
            .find(doc! { "conversation_id": conversation_id, "left_at": Bson::Null })
            .await?;

        cursor.try_collect().await
    }

    async fn find_active_by_sub(&self, sub: &user::Sub) -> Result<Vec<Participant>> {
        let cursor = self
            .col
            .find(doc! { "sub": sub, "left_at": Bson::Null })
            .await?;

        cursor.try_collect().await
    }

    async fn reactivate(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
    ) -> Result<bool> {
        let res = self
            .col
            .update_one(
                doc! {
                    "conversation_id": conversation_id,
                    "sub": sub,
                    "left_at": { "$ne": Bson::Null }
                },
                doc! { "$set": {
                    "role": Role::Member,
                    "left_at": Bson::Null,
                    "joined_at": chrono::Utc::now().timestamp_millis(),
                }},
            )
            .await?;

        Ok(res.modified_count > 0)
    }

    async fn set_left(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
    ) -> Result<bool> {
        let res = self
            .col
            .update_one(
                doc! {
                    "conversation_id": conversation_id,
                    "sub": sub,
                    "left_at": Bson::Null
                },
                doc! { "$set": { "left_at": chrono::Utc::now().timestamp_millis() } },
            )
            .await?;

        Ok(res.modified_count > 0)
    }

    async fn end_all(&self, conversation_id: &conversation::Id) -> Result<u64> {
        let res = self
            .col
            .update_many(
                doc! { "conversation_id": conversation_id, "left_at": Bson::Null },
                doc! { "$set": { "left_at": chrono::Utc::now().timestamp_millis() } },
            )
            .await?;

        Ok(res.modified_count)
    }

    async fn set_role(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
        role: Role,
    ) -> Result<bool> {
        let res = self
            .col
            .update_one(
                doc! {
                    "conversation_id": conversation_id,
                    "sub": sub,
                    "left_at": Bson::Null
                },
                doc! { "$set": { "role": role } },
            )
            .await?;

        Ok(res.modified_count > 0)
    }

    async fn demote_leader(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
    ) -> Result<bool> {
        let res = self
            .col
            .update_one(
                doc! {
                    "conversation_id": conversation_id,
                    "sub": sub,
                    "role": Role::Leader,
                    "left_at": Bson::Null
                },
                doc! { "$set": { "role": Role::Admin } },
            )
            .await?;

        Ok(res.modified_count > 0)
    }

    async fn set_last_read(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
        at: i64,
    ) -> Result<bool> {
        let res = self
            .col
            .update_one(
                doc! {
                    "conversation_id": conversation_id,
                    "sub": sub,
                    "left_at": Bson::Null
                },
                doc! { "$set": { "last_read_at": at } },
            )
            .await?;

        Ok(res.matched_count > 0)
    }

    async fn set_nickname(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
        nickname: Option<&str>,
    ) -> Result<bool> {
        let nickname = nickname.map(|n| Bson::String(n.to_owned())).unwrap_or(Bson::Null);
        let res = self
            .col
            .update_one(
                doc! {
                    "conversation_id": conversation_id,
                    "sub": sub,
                    "left_at": Bson::Null
                },
                doc! { "$set": { "nickname": nickname } },
            )
            .await?;

        Ok(res.matched_count > 0)
    }

    async fn set_muted(
        &self,
        conversation_id: &conversation::Id,
        sub: &user::Sub,
        muted: bool,
    ) -> Result<bool> {
        let res = self
            .col
            .update_one(
                doc! {
                    "conversation_id": conversation_id,
                    "sub": sub,
                    "left_at": Bson::Null
                },
                doc! { "$set": { "muted": muted } },
            )
            .await?;

        Ok(res.matched_count > 0)
    }

    async fn delete_by_conversation(&self, conversation_id: &conversation::Id) -> Result<u64> {
        let res = self
            .col
            .delete_many(doc! { "conversation_id": conversation_id })
            .await?;

        Ok(res.deleted_count)
    }
}
