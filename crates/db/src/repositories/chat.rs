//! Chat repository for database operations.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::entities::{chat_messages, zones};
use dropzone_core::chat::{ChatError, ChatMessage, ChatRepository as ChatRepoTrait};
use dropzone_core::zone::Zone;

use super::zone_to_domain;

/// Chat repository implementation.
#[derive(Debug, Clone)]
pub struct ChatRepository {
    db: DatabaseConnection,
}

impl ChatRepository {
    /// Create a new chat repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl ChatRepoTrait for ChatRepository {
    async fn find_zone(&self, zone_id: Uuid) -> Result<Option<Zone>, ChatError> {
        let model = zones::Entity::find_by_id(zone_id)
            .one(&self.db)
            .await
            .map_err(|e| ChatError::repository(e.to_string()))?;

        Ok(model.map(zone_to_domain))
    }

    async fn insert_message(
        &self,
        zone_id: Uuid,
        username: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<ChatMessage, ChatError> {
        let active_model = chat_messages::ActiveModel {
            id: Set(Uuid::new_v4()),
            zone_id: Set(zone_id),
            username: Set(username.to_string()),
            body: Set(body.to_string()),
            created_at: Set(now.into()),
        };

        let model = active_model
            .insert(&self.db)
            .await
            .map_err(|e| ChatError::repository(e.to_string()))?;

        Ok(message_to_domain(model))
    }

    async fn list_messages(
        &self,
        zone_id: Uuid,
        limit: u64,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        // Most recent `limit` messages, returned oldest first.
        let mut models = chat_messages::Entity::find()
            .filter(chat_messages::Column::ZoneId.eq(zone_id))
            .order_by_desc(chat_messages::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(|e| ChatError::repository(e.to_string()))?;
        models.reverse();

        Ok(models.into_iter().map(message_to_domain).collect())
    }
}

/// Convert a chat message row to the domain model.
fn message_to_domain(model: chat_messages::Model) -> ChatMessage {
    ChatMessage {
        id: model.id,
        username: model.username,
        body: model.body,
        created_at: model.created_at.into(),
    }
}
