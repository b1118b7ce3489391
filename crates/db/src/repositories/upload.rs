//! Upload repository for database operations.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::entities::{files, upload_batches, zones};
use dropzone_core::upload::{
    BatchWithFiles, CreateBatchInput, FileRecord, UploadError,
    UploadRepository as UploadRepoTrait,
};
use dropzone_core::zone::Zone;

use super::{file_to_domain, zone_to_domain};

/// Upload repository implementation.
#[derive(Debug, Clone)]
pub struct UploadRepository {
    db: DatabaseConnection,
}

impl UploadRepository {
    /// Create a new upload repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl UploadRepoTrait for UploadRepository {
    async fn find_zone(&self, zone_id: Uuid) -> Result<Option<Zone>, UploadError> {
        let model = zones::Entity::find_by_id(zone_id)
            .one(&self.db)
            .await
            .map_err(|e| UploadError::repository(e.to_string()))?;

        Ok(model.map(zone_to_domain))
    }

    async fn create_batch(&self, input: CreateBatchInput) -> Result<BatchWithFiles, UploadError> {
        // One transaction for the batch row and every file row: readers
        // never observe a batch with only some of its files.
        let result = self
            .db
            .transaction::<_, BatchWithFiles, DbErr>(move |txn| {
                Box::pin(async move {
                    let batch = upload_batches::ActiveModel {
                        id: Set(input.batch_id),
                        zone_id: Set(input.zone_id),
                        uploader_username: Set(input.uploader_username.clone()),
                        message: Set(input.message.clone()),
                        created_at: Set(input.created_at.into()),
                    }
                    .insert(txn)
                    .await?;

                    let mut file_records: Vec<FileRecord> =
                        Vec::with_capacity(input.files.len());
                    for file in input.files {
                        let model = files::ActiveModel {
                            id: Set(file.file_id),
                            zone_id: Set(input.zone_id),
                            batch_id: Set(input.batch_id),
                            original_name: Set(file.original_name),
                            mime_type: Set(file.mime_type),
                            size_bytes: Set(file.size_bytes),
                            uploaded_by: Set(input.uploader_username.clone()),
                            uploaded_at: Set(input.created_at.into()),
                            storage_key: Set(file.storage_key),
                        }
                        .insert(txn)
                        .await?;
                        file_records.push(file_to_domain(model));
                    }

                    Ok(BatchWithFiles {
                        id: batch.id,
                        zone_id: batch.zone_id,
                        uploader_username: batch.uploader_username,
                        message: batch.message,
                        created_at: batch.created_at.into(),
                        files: file_records,
                    })
                })
            })
            .await
            .map_err(|e| UploadError::repository(e.to_string()))?;

        Ok(result)
    }

    async fn find_file(
        &self,
        zone_id: Uuid,
        file_id: Uuid,
    ) -> Result<Option<FileRecord>, UploadError> {
        let model = files::Entity::find_by_id(file_id)
            .filter(files::Column::ZoneId.eq(zone_id))
            .one(&self.db)
            .await
            .map_err(|e| UploadError::repository(e.to_string()))?;

        Ok(model.map(file_to_domain))
    }
}
