//! Upload service implementation.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use super::error::UploadError;
use super::types::{
    BatchWithFiles, CreateBatchInput, CreateFileInput, Disposition, DownloadDescriptor,
    DownloadTarget, SubmitUploadInput,
};
use crate::presence::{EventSink, ZoneEvent};
use crate::storage::{StorageError, StorageService};
use crate::upload::FileRecord;
use crate::zone::Zone;

/// Maximum number of files accepted in one submission.
pub const MAX_FILES_PER_BATCH: usize = 10;

/// Repository trait for upload persistence.
///
/// This trait is implemented by the db crate to provide actual database
/// operations.
pub trait UploadRepository: Send + Sync {
    /// Find a zone by id, including soft-deleted and expired ones.
    fn find_zone(
        &self,
        zone_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Zone>, UploadError>> + Send;

    /// Commit a batch and all of its file records atomically.
    ///
    /// Readers must never observe the batch without all of its files.
    fn create_batch(
        &self,
        input: CreateBatchInput,
    ) -> impl std::future::Future<Output = Result<BatchWithFiles, UploadError>> + Send;

    /// Find a file record scoped to a zone.
    fn find_file(
        &self,
        zone_id: Uuid,
        file_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<FileRecord>, UploadError>> + Send;
}

/// Upload service: batch validation, blob transfer, and downloads.
pub struct UploadService<R: UploadRepository> {
    storage: Arc<StorageService>,
    repo: Arc<R>,
    events: Arc<dyn EventSink>,
}

impl<R: UploadRepository> UploadService<R> {
    /// Create a new upload service.
    #[must_use]
    pub fn new(storage: Arc<StorageService>, repo: Arc<R>, events: Arc<dyn EventSink>) -> Self {
        Self {
            storage,
            repo,
            events,
        }
    }

    /// Submit an upload batch to a zone.
    ///
    /// Preconditions are checked in order, each with a distinct failure:
    /// the zone must exist (`ZoneNotFound`), must not be expired
    /// (`Expired`), and must not have uploads locked (`Locked`). Every file
    /// is validated before any blob leaves this process, so one bad file
    /// rejects the whole submission with nothing persisted.
    ///
    /// Blobs are transferred to the storage gateway first; the batch and
    /// its file records then commit in a single transaction, and the batch
    /// payload is broadcast to the zone's channel. If anything fails after
    /// a blob was stored, the already-stored blobs are deleted again.
    ///
    /// # Errors
    ///
    /// See above; also `Storage` / `Repository` for infrastructure
    /// failures.
    pub async fn submit_upload(
        &self,
        input: SubmitUploadInput,
    ) -> Result<BatchWithFiles, UploadError> {
        let username = input.uploader_username.trim();
        if username.is_empty() {
            return Err(UploadError::MissingField("username"));
        }
        if input.files.is_empty() {
            return Err(UploadError::NoFiles);
        }
        if input.files.len() > MAX_FILES_PER_BATCH {
            return Err(UploadError::TooManyFiles {
                max: MAX_FILES_PER_BATCH,
            });
        }

        let zone = self
            .repo
            .find_zone(input.zone_id)
            .await?
            .filter(|z| !z.is_deleted)
            .ok_or(UploadError::ZoneNotFound)?;
        if zone.is_expired_at(Utc::now()) {
            return Err(UploadError::Expired);
        }
        if zone.uploads_locked {
            return Err(UploadError::Locked);
        }

        for file in &input.files {
            self.storage
                .validate_upload(&file.content_type, file.bytes.len() as u64)
                .map_err(|e| match e {
                    StorageError::FileTooLarge { size, max } => UploadError::TooLarge {
                        name: file.original_name.clone(),
                        size,
                        max,
                    },
                    StorageError::InvalidMimeType { mime_type } => UploadError::InvalidFile {
                        name: file.original_name.clone(),
                        mime_type,
                    },
                    other => UploadError::Storage(other),
                })?;
        }

        let batch_id = Uuid::new_v4();
        let now = Utc::now();
        let message = input
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from);

        // Blobs before records: a record must never reference a blob that
        // was not durably stored.
        let mut stored: Vec<CreateFileInput> = Vec::with_capacity(input.files.len());
        for file in &input.files {
            let file_id = Uuid::new_v4();
            let key = StorageService::generate_storage_key(
                zone.id,
                batch_id,
                file_id,
                &file.original_name,
            );
            if let Err(e) = self
                .storage
                .put(&key, &file.content_type, file.bytes.clone())
                .await
            {
                self.reclaim_blobs(&stored).await;
                return Err(UploadError::Storage(e));
            }
            stored.push(CreateFileInput {
                file_id,
                original_name: file.original_name.clone(),
                mime_type: file.content_type.clone(),
                size_bytes: file.bytes.len() as i64,
                storage_key: key,
            });
        }

        let batch = match self
            .repo
            .create_batch(CreateBatchInput {
                batch_id,
                zone_id: zone.id,
                uploader_username: username.to_string(),
                message,
                created_at: now,
                files: stored.clone(),
            })
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                self.reclaim_blobs(&stored).await;
                return Err(e);
            }
        };

        // Broadcast only after the commit: nobody hears about a batch that
        // does not fully exist.
        self.events
            .publish(zone.id, ZoneEvent::ZoneUploadBatch(batch.clone()));

        Ok(batch)
    }

    /// Build a download descriptor for a file in a zone.
    ///
    /// Zone existence and non-expiry are re-validated on every call: files
    /// stop being servable the instant their zone expires, even while the
    /// blob still exists at the gateway.
    ///
    /// # Errors
    ///
    /// `ZoneNotFound`, `Expired`, `FileNotFound`, or `Storage`.
    pub async fn download_descriptor(
        &self,
        zone_id: Uuid,
        file_id: Uuid,
        inline: bool,
    ) -> Result<DownloadDescriptor, UploadError> {
        let zone = self
            .repo
            .find_zone(zone_id)
            .await?
            .filter(|z| !z.is_deleted)
            .ok_or(UploadError::ZoneNotFound)?;
        if zone.is_expired_at(Utc::now()) {
            return Err(UploadError::Expired);
        }

        let file = self
            .repo
            .find_file(zone.id, file_id)
            .await?
            .ok_or(UploadError::FileNotFound)?;

        let target = match self
            .storage
            .presign_download(&file.storage_key, &file.original_name, inline)
            .await?
        {
            Some(presigned) => DownloadTarget::Redirect { url: presigned.url },
            // Provider cannot presign (local fs): stream through us.
            None => DownloadTarget::Stream {
                storage_key: file.storage_key.clone(),
            },
        };

        Ok(DownloadDescriptor {
            file,
            disposition: if inline {
                Disposition::Inline
            } else {
                Disposition::Attachment
            },
            target,
        })
    }

    /// Delete blobs stored for a batch that will never commit.
    async fn reclaim_blobs(&self, stored: &[CreateFileInput]) {
        for file in stored {
            if let Err(e) = self.storage.delete(&file.storage_key).await {
                warn!(
                    key = %file.storage_key,
                    error = %e,
                    "Failed to reclaim blob for aborted batch"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StorageConfig, StorageProvider};
    use bytes::Bytes;
    use chrono::Duration;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::upload::IncomingFile;

    /// Mock repository for testing.
    #[derive(Default)]
    struct MockUploadRepository {
        zones: Mutex<HashMap<Uuid, Zone>>,
        batches: Mutex<Vec<BatchWithFiles>>,
        fail_create: AtomicBool,
    }

    impl MockUploadRepository {
        fn with_zone(zone: Zone) -> Self {
            let repo = Self::default();
            repo.zones.lock().unwrap().insert(zone.id, zone);
            repo
        }

        fn batch_count(&self) -> usize {
            self.batches.lock().unwrap().len()
        }
    }

    impl UploadRepository for MockUploadRepository {
        async fn find_zone(&self, zone_id: Uuid) -> Result<Option<Zone>, UploadError> {
            Ok(self.zones.lock().unwrap().get(&zone_id).cloned())
        }

        async fn create_batch(
            &self,
            input: CreateBatchInput,
        ) -> Result<BatchWithFiles, UploadError> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(UploadError::repository("simulated insert failure"));
            }
            let batch = BatchWithFiles {
                id: input.batch_id,
                zone_id: input.zone_id,
                uploader_username: input.uploader_username,
                message: input.message,
                created_at: input.created_at,
                files: input
                    .files
                    .into_iter()
                    .map(|f| FileRecord {
                        id: f.file_id,
                        original_name: f.original_name,
                        mime_type: f.mime_type,
                        size_bytes: f.size_bytes,
                        uploaded_by: "uploader".to_string(),
                        uploaded_at: input.created_at,
                        storage_key: f.storage_key,
                    })
                    .collect(),
            };
            self.batches.lock().unwrap().push(batch.clone());
            Ok(batch)
        }

        async fn find_file(
            &self,
            zone_id: Uuid,
            file_id: Uuid,
        ) -> Result<Option<FileRecord>, UploadError> {
            Ok(self
                .batches
                .lock()
                .unwrap()
                .iter()
                .filter(|b| b.zone_id == zone_id)
                .flat_map(|b| b.files.iter())
                .find(|f| f.id == file_id)
                .cloned())
        }
    }

    /// Event sink that records every published event.
    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(Uuid, ZoneEvent)>>,
    }

    impl EventSink for RecordingSink {
        fn publish(&self, zone_id: Uuid, event: ZoneEvent) {
            self.events.lock().unwrap().push((zone_id, event));
        }
    }

    fn live_zone() -> Zone {
        let now = Utc::now();
        Zone {
            id: Uuid::new_v4(),
            name: "demo".to_string(),
            password_hash: String::new(),
            owner_username: "alice".to_string(),
            owner_token_hash: String::new(),
            created_at: now,
            expires_at: now + Duration::hours(2),
            uploads_locked: false,
            is_deleted: false,
        }
    }

    fn temp_storage() -> (Arc<StorageService>, std::path::PathBuf) {
        let root = std::env::temp_dir().join(format!("dropzone-upload-{}", Uuid::new_v4()));
        let config = StorageConfig::new(StorageProvider::local_fs(&root));
        (
            Arc::new(StorageService::from_config(config).expect("storage should initialize")),
            root,
        )
    }

    fn pdf_file(name: &str, size: usize) -> IncomingFile {
        IncomingFile {
            original_name: name.to_string(),
            content_type: "application/pdf".to_string(),
            bytes: Bytes::from(vec![0u8; size]),
        }
    }

    fn submit_input(zone_id: Uuid, files: Vec<IncomingFile>) -> SubmitUploadInput {
        SubmitUploadInput {
            zone_id,
            uploader_username: "bob".to_string(),
            message: Some("  here you go  ".to_string()),
            files,
        }
    }

    #[tokio::test]
    async fn test_submit_upload_success_broadcasts_batch() {
        let zone = live_zone();
        let (storage, root) = temp_storage();
        let repo = Arc::new(MockUploadRepository::with_zone(zone.clone()));
        let sink = Arc::new(RecordingSink::default());
        let service = UploadService::new(storage.clone(), repo.clone(), sink.clone());

        let batch = service
            .submit_upload(submit_input(
                zone.id,
                vec![pdf_file("a.pdf", 16), pdf_file("b.pdf", 32)],
            ))
            .await
            .expect("upload should succeed");

        assert_eq!(batch.files.len(), 2);
        assert_eq!(batch.message.as_deref(), Some("here you go"));
        assert_eq!(repo.batch_count(), 1);

        // Blobs were durably stored under the recorded keys.
        for file in &batch.files {
            assert!(storage.exists(&file.storage_key).await);
        }

        let events = sink.events.lock().unwrap();
        assert!(events.iter().any(|(zone_id, event)| {
            *zone_id == zone.id && matches!(event, ZoneEvent::ZoneUploadBatch(b) if b.id == batch.id)
        }));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_submit_upload_zone_not_found() {
        let (storage, _root) = temp_storage();
        let repo = Arc::new(MockUploadRepository::default());
        let service = UploadService::new(storage, repo, Arc::new(RecordingSink::default()));

        let result = service
            .submit_upload(submit_input(Uuid::new_v4(), vec![pdf_file("a.pdf", 16)]))
            .await;
        assert!(matches!(result, Err(UploadError::ZoneNotFound)));
    }

    #[tokio::test]
    async fn test_submit_upload_expired_zone_creates_nothing() {
        let mut zone = live_zone();
        zone.expires_at = Utc::now() - Duration::hours(1);
        let (storage, _root) = temp_storage();
        let repo = Arc::new(MockUploadRepository::with_zone(zone.clone()));
        let service = UploadService::new(storage, repo.clone(), Arc::new(RecordingSink::default()));

        let result = service
            .submit_upload(submit_input(zone.id, vec![pdf_file("a.pdf", 16)]))
            .await;
        assert!(matches!(result, Err(UploadError::Expired)));
        assert_eq!(repo.batch_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_upload_locked_zone_creates_nothing() {
        let mut zone = live_zone();
        zone.uploads_locked = true;
        let (storage, _root) = temp_storage();
        let repo = Arc::new(MockUploadRepository::with_zone(zone.clone()));
        let sink = Arc::new(RecordingSink::default());
        let service = UploadService::new(storage, repo.clone(), sink.clone());

        let result = service
            .submit_upload(submit_input(zone.id, vec![pdf_file("a.pdf", 16)]))
            .await;
        assert!(matches!(result, Err(UploadError::Locked)));
        assert_eq!(repo.batch_count(), 0);
        assert!(sink.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_one_oversized_file_fails_the_whole_batch() {
        let zone = live_zone();
        let root = std::env::temp_dir().join(format!("dropzone-upload-{}", Uuid::new_v4()));
        let config =
            StorageConfig::new(StorageProvider::local_fs(&root)).with_max_file_size(1024);
        let storage = Arc::new(StorageService::from_config(config).unwrap());
        let repo = Arc::new(MockUploadRepository::with_zone(zone.clone()));
        let sink = Arc::new(RecordingSink::default());
        let service = UploadService::new(storage, repo.clone(), sink.clone());

        let mut files: Vec<IncomingFile> = (0..5).map(|i| pdf_file(&format!("ok{i}.pdf"), 64)).collect();
        files.push(pdf_file("huge.pdf", 4096));

        let result = service.submit_upload(submit_input(zone.id, files)).await;
        match result {
            Err(UploadError::TooLarge { name, .. }) => assert_eq!(name, "huge.pdf"),
            other => panic!("expected TooLarge, got {other:?}"),
        }

        // Nothing persisted, nothing broadcast, no blobs written.
        assert_eq!(repo.batch_count(), 0);
        assert!(sink.events.lock().unwrap().is_empty());
        assert!(!root.exists() || std::fs::read_dir(&root).unwrap().next().is_none());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_disallowed_mime_type_fails_the_whole_batch() {
        let zone = live_zone();
        let (storage, _root) = temp_storage();
        let repo = Arc::new(MockUploadRepository::with_zone(zone.clone()));
        let service = UploadService::new(storage, repo.clone(), Arc::new(RecordingSink::default()));

        let files = vec![
            pdf_file("fine.pdf", 16),
            IncomingFile {
                original_name: "evil.exe".to_string(),
                content_type: "application/x-executable".to_string(),
                bytes: Bytes::from_static(b"MZ"),
            },
        ];

        let result = service.submit_upload(submit_input(zone.id, files)).await;
        assert!(matches!(result, Err(UploadError::InvalidFile { .. })));
        assert_eq!(repo.batch_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_and_oversized_submissions_rejected() {
        let zone = live_zone();
        let (storage, _root) = temp_storage();
        let repo = Arc::new(MockUploadRepository::with_zone(zone.clone()));
        let service = UploadService::new(storage, repo, Arc::new(RecordingSink::default()));

        let result = service.submit_upload(submit_input(zone.id, vec![])).await;
        assert!(matches!(result, Err(UploadError::NoFiles)));

        let too_many: Vec<IncomingFile> = (0..=MAX_FILES_PER_BATCH)
            .map(|i| pdf_file(&format!("f{i}.pdf"), 8))
            .collect();
        let result = service.submit_upload(submit_input(zone.id, too_many)).await;
        assert!(matches!(result, Err(UploadError::TooManyFiles { .. })));
    }

    #[tokio::test]
    async fn test_failed_record_commit_reclaims_blobs() {
        let zone = live_zone();
        let (storage, root) = temp_storage();
        let repo = Arc::new(MockUploadRepository::with_zone(zone.clone()));
        repo.fail_create.store(true, Ordering::SeqCst);
        let sink = Arc::new(RecordingSink::default());
        let service = UploadService::new(storage.clone(), repo.clone(), sink.clone());

        let result = service
            .submit_upload(submit_input(zone.id, vec![pdf_file("a.pdf", 16)]))
            .await;
        assert!(matches!(result, Err(UploadError::Repository(_))));
        assert_eq!(repo.batch_count(), 0);
        assert!(sink.events.lock().unwrap().is_empty());

        // The compensating delete removed the blob that was already stored.
        assert_eq!(count_files(&root), 0);

        let _ = std::fs::remove_dir_all(&root);
    }

    fn count_files(dir: &std::path::Path) -> usize {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return 0;
        };
        entries
            .flatten()
            .map(|entry| {
                let path = entry.path();
                if path.is_dir() { count_files(&path) } else { 1 }
            })
            .sum()
    }

    #[tokio::test]
    async fn test_download_descriptor_streams_on_local_fs() {
        let zone = live_zone();
        let (storage, root) = temp_storage();
        let repo = Arc::new(MockUploadRepository::with_zone(zone.clone()));
        let service = UploadService::new(
            storage.clone(),
            repo.clone(),
            Arc::new(RecordingSink::default()),
        );

        let batch = service
            .submit_upload(submit_input(zone.id, vec![pdf_file("a.pdf", 16)]))
            .await
            .unwrap();
        let file_id = batch.files[0].id;

        let descriptor = service
            .download_descriptor(zone.id, file_id, false)
            .await
            .expect("descriptor should resolve");
        assert_eq!(descriptor.disposition, Disposition::Attachment);
        assert!(matches!(descriptor.target, DownloadTarget::Stream { .. }));

        let inline = service
            .download_descriptor(zone.id, file_id, true)
            .await
            .unwrap();
        assert_eq!(inline.disposition, Disposition::Inline);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_download_descriptor_rejects_expired_zone_and_unknown_file() {
        let zone = live_zone();
        let (storage, _root) = temp_storage();
        let repo = Arc::new(MockUploadRepository::with_zone(zone.clone()));
        let service = UploadService::new(storage, repo.clone(), Arc::new(RecordingSink::default()));

        let result = service
            .download_descriptor(zone.id, Uuid::new_v4(), false)
            .await;
        assert!(matches!(result, Err(UploadError::FileNotFound)));

        // The instant the zone expires, its files stop being servable.
        repo.zones.lock().unwrap().get_mut(&zone.id).unwrap().expires_at =
            Utc::now() - Duration::minutes(1);
        let result = service
            .download_descriptor(zone.id, Uuid::new_v4(), false)
            .await;
        assert!(matches!(result, Err(UploadError::Expired)));
    }
}
