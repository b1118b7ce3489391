//! Zone repository for database operations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::entities::{files, upload_batches, user_sessions, zones};
use dropzone_core::upload::{BatchWithFiles, FileRecord};
use dropzone_core::zone::{
    NewZone, UserSession, Zone, ZoneError, ZoneRepository as ZoneRepoTrait,
};

use super::{file_to_domain, zone_to_domain};

/// Zone repository implementation.
#[derive(Debug, Clone)]
pub struct ZoneRepository {
    db: DatabaseConnection,
}

impl ZoneRepository {
    /// Create a new zone repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl ZoneRepoTrait for ZoneRepository {
    async fn insert_zone(&self, input: NewZone) -> Result<Zone, ZoneError> {
        let active_model = zones::ActiveModel {
            id: Set(input.id),
            name: Set(input.name),
            password_hash: Set(input.password_hash),
            owner_username: Set(input.owner_username),
            owner_token_hash: Set(input.owner_token_hash),
            created_at: Set(input.created_at.into()),
            expires_at: Set(input.expires_at.into()),
            uploads_locked: Set(false),
            is_deleted: Set(false),
        };

        let model = active_model
            .insert(&self.db)
            .await
            .map_err(|e| ZoneError::repository(e.to_string()))?;

        Ok(zone_to_domain(model))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Zone>, ZoneError> {
        let model = zones::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| ZoneError::repository(e.to_string()))?;

        Ok(model.map(zone_to_domain))
    }

    async fn find_latest_by_name(&self, name: &str) -> Result<Option<Zone>, ZoneError> {
        // Names are not unique; collisions resolve to the newest zone.
        let model = zones::Entity::find()
            .filter(zones::Column::Name.eq(name))
            .filter(zones::Column::IsDeleted.eq(false))
            .order_by_desc(zones::Column::CreatedAt)
            .one(&self.db)
            .await
            .map_err(|e| ZoneError::repository(e.to_string()))?;

        Ok(model.map(zone_to_domain))
    }

    async fn set_uploads_locked(&self, id: Uuid, locked: bool) -> Result<(), ZoneError> {
        zones::ActiveModel {
            id: Set(id),
            uploads_locked: Set(locked),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .map_err(|e| ZoneError::repository(e.to_string()))?;

        Ok(())
    }

    async fn extend_expiry_if_unchanged(
        &self,
        id: Uuid,
        expected: DateTime<Utc>,
        new_expiry: DateTime<Utc>,
    ) -> Result<bool, ZoneError> {
        // Conditional update: only applies while the persisted expiry still
        // equals the value the caller read, so concurrent extends cannot
        // overshoot the lifetime cap.
        let result = zones::Entity::update_many()
            .col_expr(zones::Column::ExpiresAt, Expr::value(new_expiry))
            .filter(zones::Column::Id.eq(id))
            .filter(zones::Column::ExpiresAt.eq(expected))
            .exec(&self.db)
            .await
            .map_err(|e| ZoneError::repository(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    async fn find_session(
        &self,
        zone_id: Uuid,
        username: &str,
    ) -> Result<Option<UserSession>, ZoneError> {
        let model = user_sessions::Entity::find()
            .filter(user_sessions::Column::ZoneId.eq(zone_id))
            .filter(user_sessions::Column::Username.eq(username))
            .one(&self.db)
            .await
            .map_err(|e| ZoneError::repository(e.to_string()))?;

        Ok(model.map(session_to_domain))
    }

    async fn insert_session(
        &self,
        zone_id: Uuid,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<UserSession, ZoneError> {
        let active_model = user_sessions::ActiveModel {
            id: Set(Uuid::new_v4()),
            zone_id: Set(zone_id),
            username: Set(username.to_string()),
            joined_at: Set(now.into()),
            last_seen_at: Set(now.into()),
            is_kicked: Set(false),
        };

        let model = active_model
            .insert(&self.db)
            .await
            .map_err(|e| ZoneError::repository(e.to_string()))?;

        Ok(session_to_domain(model))
    }

    async fn touch_session(&self, session_id: Uuid, now: DateTime<Utc>) -> Result<(), ZoneError> {
        user_sessions::ActiveModel {
            id: Set(session_id),
            last_seen_at: Set(now.into()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .map_err(|e| ZoneError::repository(e.to_string()))?;

        Ok(())
    }

    async fn mark_session_kicked(&self, session_id: Uuid) -> Result<(), ZoneError> {
        user_sessions::ActiveModel {
            id: Set(session_id),
            is_kicked: Set(true),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .map_err(|e| ZoneError::repository(e.to_string()))?;

        Ok(())
    }

    async fn list_batches(&self, zone_id: Uuid) -> Result<Vec<BatchWithFiles>, ZoneError> {
        let batch_models = upload_batches::Entity::find()
            .filter(upload_batches::Column::ZoneId.eq(zone_id))
            .order_by_asc(upload_batches::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| ZoneError::repository(e.to_string()))?;

        let file_models = files::Entity::find()
            .filter(files::Column::ZoneId.eq(zone_id))
            .order_by_asc(files::Column::UploadedAt)
            .all(&self.db)
            .await
            .map_err(|e| ZoneError::repository(e.to_string()))?;

        let mut files_by_batch: HashMap<Uuid, Vec<FileRecord>> = HashMap::new();
        for model in file_models {
            files_by_batch
                .entry(model.batch_id)
                .or_default()
                .push(file_to_domain(model));
        }

        Ok(batch_models
            .into_iter()
            .map(|batch| {
                let batch_files = files_by_batch.remove(&batch.id).unwrap_or_default();
                BatchWithFiles {
                    id: batch.id,
                    zone_id: batch.zone_id,
                    uploader_username: batch.uploader_username,
                    message: batch.message,
                    created_at: batch.created_at.into(),
                    files: batch_files,
                }
            })
            .collect())
    }
}

/// Convert a session row to the domain model.
fn session_to_domain(model: user_sessions::Model) -> UserSession {
    UserSession {
        id: model.id,
        zone_id: model.zone_id,
        username: model.username,
        joined_at: model.joined_at.into(),
        last_seen_at: model.last_seen_at.into(),
        is_kicked: model.is_kicked,
    }
}
