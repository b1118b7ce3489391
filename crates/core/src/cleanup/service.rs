//! Cascading delete and the expiry sweep.
//!
//! The same cleanup routine serves both paths: the periodic reaper and an
//! explicit owner delete. Both may race on the same zone; every step is
//! idempotent, so the loser of the race simply finds nothing left to do.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::storage::StorageService;

/// Cleanup operation errors.
#[derive(Debug, Error)]
pub enum CleanupError {
    /// Repository operation failed.
    #[error("repository error: {0}")]
    Repository(String),
}

impl CleanupError {
    /// Create a repository error.
    #[must_use]
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }
}

/// Repository trait for cleanup persistence.
pub trait CleanupRepository: Send + Sync {
    /// Ids of all zones past their expiry or flagged soft-deleted.
    fn reapable_zone_ids(
        &self,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<Uuid>, CleanupError>> + Send;

    /// Storage keys of every file record owned by the zone.
    fn file_storage_keys(
        &self,
        zone_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<String>, CleanupError>> + Send;

    /// Hard-delete all rows scoped to the zone, then the zone row itself.
    ///
    /// Deleting an already-purged zone must succeed (zero rows affected).
    fn purge_zone_records(
        &self,
        zone_id: Uuid,
    ) -> impl std::future::Future<Output = Result<(), CleanupError>> + Send;
}

/// Cleanup service: cascading delete of a zone and everything it owns.
pub struct CleanupService<R: CleanupRepository> {
    storage: Arc<StorageService>,
    repo: Arc<R>,
}

impl<R: CleanupRepository> CleanupService<R> {
    /// Create a new cleanup service.
    #[must_use]
    pub fn new(storage: Arc<StorageService>, repo: Arc<R>) -> Self {
        Self { storage, repo }
    }

    /// Hard-delete a zone: blobs first, then all dependent rows, then the
    /// zone row. Idempotent; a second call finds nothing left to delete.
    ///
    /// Blob deletion is best-effort: an already-gone blob is success, and a
    /// transient gateway failure is logged without blocking record
    /// deletion. An orphaned blob is the accepted lesser failure compared
    /// to the zone's metadata staying alive.
    ///
    /// # Errors
    ///
    /// `Repository` if the database purge fails.
    pub async fn cleanup_zone(&self, zone_id: Uuid) -> Result<(), CleanupError> {
        let keys = self.repo.file_storage_keys(zone_id).await?;

        for key in &keys {
            if let Err(e) = self.storage.delete(key).await {
                warn!(
                    zone_id = %zone_id,
                    key = %key,
                    error = %e,
                    "Failed to delete blob during zone cleanup"
                );
            }
        }

        self.repo.purge_zone_records(zone_id).await?;

        info!(zone_id = %zone_id, blobs = keys.len(), "Zone cleanup complete");
        Ok(())
    }

    /// Find and purge every expired or soft-deleted zone.
    ///
    /// Per-zone failures are caught and logged so one bad zone does not
    /// block the rest of the sweep. Returns the number of zones purged.
    ///
    /// # Errors
    ///
    /// `Repository` only if the reapable-zone query itself fails.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, CleanupError> {
        let zone_ids = self.repo.reapable_zone_ids(now).await?;
        if zone_ids.is_empty() {
            return Ok(0);
        }

        info!(count = zone_ids.len(), "Sweeping expired and deleted zones");

        let mut reaped = 0;
        for zone_id in zone_ids {
            match self.cleanup_zone(zone_id).await {
                Ok(()) => reaped += 1,
                Err(e) => {
                    error!(zone_id = %zone_id, error = %e, "Zone cleanup failed; continuing sweep");
                }
            }
        }

        Ok(reaped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StorageConfig, StorageProvider};
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockCleanupRepository {
        /// zone id -> storage keys of its files.
        zones: Mutex<HashMap<Uuid, Vec<String>>>,
        /// Zones whose purge should fail, to exercise sweep isolation.
        failing: Mutex<Vec<Uuid>>,
        purges: Mutex<Vec<Uuid>>,
    }

    impl CleanupRepository for MockCleanupRepository {
        async fn reapable_zone_ids(&self, _now: DateTime<Utc>) -> Result<Vec<Uuid>, CleanupError> {
            let mut ids: Vec<Uuid> = self.zones.lock().unwrap().keys().copied().collect();
            ids.sort();
            Ok(ids)
        }

        async fn file_storage_keys(&self, zone_id: Uuid) -> Result<Vec<String>, CleanupError> {
            Ok(self
                .zones
                .lock()
                .unwrap()
                .get(&zone_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn purge_zone_records(&self, zone_id: Uuid) -> Result<(), CleanupError> {
            if self.failing.lock().unwrap().contains(&zone_id) {
                return Err(CleanupError::repository("simulated purge failure"));
            }
            // Purging an absent zone is a no-op, not an error.
            self.zones.lock().unwrap().remove(&zone_id);
            self.purges.lock().unwrap().push(zone_id);
            Ok(())
        }
    }

    fn temp_storage() -> (Arc<StorageService>, std::path::PathBuf) {
        let root = std::env::temp_dir().join(format!("dropzone-cleanup-{}", Uuid::new_v4()));
        let config = StorageConfig::new(StorageProvider::local_fs(&root));
        (
            Arc::new(StorageService::from_config(config).expect("storage should initialize")),
            root,
        )
    }

    #[tokio::test]
    async fn test_cleanup_zone_deletes_blobs_and_records() {
        let (storage, root) = temp_storage();
        let repo = Arc::new(MockCleanupRepository::default());
        let zone_id = Uuid::new_v4();

        let key = format!("{zone_id}/batch/file/a.pdf");
        storage
            .put(&key, "application/pdf", Bytes::from_static(b"bytes"))
            .await
            .unwrap();
        repo.zones.lock().unwrap().insert(zone_id, vec![key.clone()]);

        let service = CleanupService::new(storage.clone(), repo.clone());
        service.cleanup_zone(zone_id).await.unwrap();

        assert!(!storage.exists(&key).await);
        assert!(repo.zones.lock().unwrap().is_empty());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_cleanup_zone_is_idempotent() {
        let (storage, _root) = temp_storage();
        let repo = Arc::new(MockCleanupRepository::default());
        let zone_id = Uuid::new_v4();
        repo.zones.lock().unwrap().insert(zone_id, vec![]);

        let service = CleanupService::new(storage, repo.clone());
        service.cleanup_zone(zone_id).await.unwrap();
        // Second run finds nothing: still success.
        service.cleanup_zone(zone_id).await.unwrap();

        assert_eq!(repo.purges.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_already_gone_blobs() {
        let (storage, _root) = temp_storage();
        let repo = Arc::new(MockCleanupRepository::default());
        let zone_id = Uuid::new_v4();
        repo.zones
            .lock()
            .unwrap()
            .insert(zone_id, vec!["never/stored/blob.pdf".to_string()]);

        let service = CleanupService::new(storage, repo);
        service.cleanup_zone(zone_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_continues_past_failing_zone() {
        let (storage, _root) = temp_storage();
        let repo = Arc::new(MockCleanupRepository::default());
        let bad = Uuid::new_v4();
        let good_a = Uuid::new_v4();
        let good_b = Uuid::new_v4();
        {
            let mut zones = repo.zones.lock().unwrap();
            zones.insert(bad, vec![]);
            zones.insert(good_a, vec![]);
            zones.insert(good_b, vec![]);
        }
        repo.failing.lock().unwrap().push(bad);

        let service = CleanupService::new(storage, repo.clone());
        let reaped = service.sweep(Utc::now()).await.unwrap();

        // The failing zone is skipped; the others are purged.
        assert_eq!(reaped, 2);
        let remaining: Vec<Uuid> = repo.zones.lock().unwrap().keys().copied().collect();
        assert_eq!(remaining, vec![bad]);
    }

    #[tokio::test]
    async fn test_sweep_with_nothing_to_do() {
        let (storage, _root) = temp_storage();
        let repo = Arc::new(MockCleanupRepository::default());
        let service = CleanupService::new(storage, repo);
        assert_eq!(service.sweep(Utc::now()).await.unwrap(), 0);
    }
}
