//! Cleanup repository for database operations.

use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::entities::{chat_messages, files, upload_batches, user_sessions, zones};
use dropzone_core::cleanup::{CleanupError, CleanupRepository as CleanupRepoTrait};

/// Cleanup repository implementation.
#[derive(Debug, Clone)]
pub struct CleanupRepository {
    db: DatabaseConnection,
}

impl CleanupRepository {
    /// Create a new cleanup repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl CleanupRepoTrait for CleanupRepository {
    async fn reapable_zone_ids(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, CleanupError> {
        let models = zones::Entity::find()
            .filter(
                Condition::any()
                    .add(zones::Column::ExpiresAt.lt(now))
                    .add(zones::Column::IsDeleted.eq(true)),
            )
            .all(&self.db)
            .await
            .map_err(|e| CleanupError::repository(e.to_string()))?;

        Ok(models.into_iter().map(|z| z.id).collect())
    }

    async fn file_storage_keys(&self, zone_id: Uuid) -> Result<Vec<String>, CleanupError> {
        let models = files::Entity::find()
            .filter(files::Column::ZoneId.eq(zone_id))
            .all(&self.db)
            .await
            .map_err(|e| CleanupError::repository(e.to_string()))?;

        Ok(models.into_iter().map(|f| f.storage_key).collect())
    }

    async fn purge_zone_records(&self, zone_id: Uuid) -> Result<(), CleanupError> {
        // Children first, zone row last. Each delete of zero rows is a
        // no-op, which keeps a second cleanup of the same zone harmless.
        files::Entity::delete_many()
            .filter(files::Column::ZoneId.eq(zone_id))
            .exec(&self.db)
            .await
            .map_err(|e| CleanupError::repository(e.to_string()))?;

        upload_batches::Entity::delete_many()
            .filter(upload_batches::Column::ZoneId.eq(zone_id))
            .exec(&self.db)
            .await
            .map_err(|e| CleanupError::repository(e.to_string()))?;

        chat_messages::Entity::delete_many()
            .filter(chat_messages::Column::ZoneId.eq(zone_id))
            .exec(&self.db)
            .await
            .map_err(|e| CleanupError::repository(e.to_string()))?;

        user_sessions::Entity::delete_many()
            .filter(user_sessions::Column::ZoneId.eq(zone_id))
            .exec(&self.db)
            .await
            .map_err(|e| CleanupError::repository(e.to_string()))?;

        zones::Entity::delete_by_id(zone_id)
            .exec(&self.db)
            .await
            .map_err(|e| CleanupError::repository(e.to_string()))?;

        Ok(())
    }
}
