//! Storage service implementation using Apache OpenDAL.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use opendal::{ErrorKind, Operator, services};
use uuid::Uuid;

use super::config::{StorageConfig, StorageProvider};
use super::error::StorageError;

/// Presigned URL for downloading a blob directly from the provider.
#[derive(Debug, Clone)]
pub struct PresignedUrl {
    /// The presigned URL.
    pub url: String,
    /// When the URL expires.
    pub expires_at: DateTime<Utc>,
}

/// Storage service for zone file blobs.
pub struct StorageService {
    operator: Operator,
    config: StorageConfig,
}

impl StorageService {
    /// Create a new storage service from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage provider cannot be initialized.
    pub fn from_config(config: StorageConfig) -> Result<Self, StorageError> {
        let operator = Self::create_operator(&config.provider)?;
        Ok(Self { operator, config })
    }

    /// Create OpenDAL operator from provider config.
    fn create_operator(provider: &StorageProvider) -> Result<Operator, StorageError> {
        match provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
            } => {
                let builder = services::S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key)
                    .region(region);

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
                    .pipe(Ok)
            }
            StorageProvider::AzureBlob {
                account,
                access_key,
                container,
            } => {
                let builder = services::Azblob::default()
                    .account_name(account)
                    .account_key(access_key)
                    .container(container);

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
                    .pipe(Ok)
            }
            StorageProvider::LocalFs { root } => {
                let builder = services::Fs::default().root(
                    root.to_str()
                        .ok_or_else(|| StorageError::configuration("invalid path"))?,
                );

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
                    .pipe(Ok)
            }
        }
    }

    /// Validate an incoming file against config constraints.
    ///
    /// # Errors
    ///
    /// Returns an error if file size or MIME type is invalid.
    pub fn validate_upload(&self, content_type: &str, size: u64) -> Result<(), StorageError> {
        // Check file size
        if size > self.config.max_file_size {
            return Err(StorageError::file_too_large(
                size,
                self.config.max_file_size,
            ));
        }

        // Check MIME type
        if !self.config.is_mime_type_allowed(content_type) {
            return Err(StorageError::invalid_mime_type(content_type));
        }

        Ok(())
    }

    /// Generate the opaque storage key for a file blob.
    ///
    /// Format: `{zone_id}/{batch_id}/{file_id}/{sanitized_filename}`
    #[must_use]
    pub fn generate_storage_key(
        zone_id: Uuid,
        batch_id: Uuid,
        file_id: Uuid,
        filename: &str,
    ) -> String {
        let sanitized_filename = sanitize_filename(filename);
        format!("{zone_id}/{batch_id}/{file_id}/{sanitized_filename}")
    }

    /// Store a blob under the given key.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn put(
        &self,
        key: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<(), StorageError> {
        self.operator
            .write_with(key, bytes)
            .content_type(content_type)
            .await
            .map(|_| ())
            .map_err(StorageError::from)
    }

    /// Read a blob's bytes.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the blob does not exist.
    pub async fn read(&self, key: &str) -> Result<Bytes, StorageError> {
        let buffer = self.operator.read(key).await.map_err(StorageError::from)?;
        Ok(buffer.to_bytes())
    }

    /// Generate a presigned download URL, if the provider supports presigning.
    ///
    /// Returns `Ok(None)` for providers without presign support (local fs);
    /// the caller is expected to stream the blob itself in that case.
    ///
    /// # Errors
    ///
    /// Returns an error if presigning fails for another reason.
    pub async fn presign_download(
        &self,
        key: &str,
        filename: &str,
        inline: bool,
    ) -> Result<Option<PresignedUrl>, StorageError> {
        let ttl = Duration::from_secs(self.config.presign_download_ttl_secs);

        let request = self.operator.presign_read_with(key, ttl);
        let request = if inline {
            request
        } else {
            request.override_content_disposition(&attachment_disposition(filename))
        };

        match request.await {
            Ok(presigned) => Ok(Some(PresignedUrl {
                url: presigned.uri().to_string(),
                expires_at: Utc::now()
                    + chrono::Duration::seconds(
                        i64::try_from(self.config.presign_download_ttl_secs).unwrap_or(i64::MAX),
                    ),
            })),
            Err(e) if e.kind() == ErrorKind::Unsupported => Ok(None),
            Err(e) => Err(StorageError::from(e)),
        }
    }

    /// Delete a blob. Idempotent: an already-gone blob is success.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures other than "not found".
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self.operator.delete(key).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::from(e)),
        }
    }

    /// Check if a blob exists in storage.
    pub async fn exists(&self, key: &str) -> bool {
        self.operator.stat(key).await.is_ok()
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }
}

/// Content-Disposition value that forces a download with the original name.
fn attachment_disposition(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", sanitize_filename(filename))
}

/// Sanitize filename for storage keys and header values.
///
/// Only allows ASCII alphanumeric characters, dots, hyphens, and underscores.
fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Extension trait for pipe operator.
trait Pipe: Sized {
    fn pipe<F, R>(self, f: F) -> R
    where
        F: FnOnce(Self) -> R,
    {
        f(self)
    }
}

impl<T> Pipe for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("notes.pdf"), "notes.pdf");
        assert_eq!(sanitize_filename("my file (1).pdf"), "my_file__1_.pdf");
        assert_eq!(sanitize_filename("test@#$%.doc"), "test____.doc");
        assert_eq!(sanitize_filename("日本語.pdf"), "___.pdf");
    }

    #[test]
    fn test_generate_storage_key() {
        let zone_id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").expect("valid uuid");
        let batch_id = Uuid::parse_str("6ba7b810-9dad-11d1-80b4-00c04fd430c8").expect("valid uuid");
        let file_id = Uuid::parse_str("6ba7b811-9dad-11d1-80b4-00c04fd430c8").expect("valid uuid");

        let key = StorageService::generate_storage_key(zone_id, batch_id, file_id, "notes.pdf");

        let parts: Vec<&str> = key.split('/').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], zone_id.to_string());
        assert_eq!(parts[1], batch_id.to_string());
        assert_eq!(parts[2], file_id.to_string());
        assert_eq!(parts[3], "notes.pdf");
    }

    #[test]
    fn test_validate_upload_size() {
        let config =
            StorageConfig::new(StorageProvider::local_fs("./test")).with_max_file_size(1024);
        let service = StorageService::from_config(config).expect("should create service");

        // Valid size
        assert!(service.validate_upload("application/pdf", 512).is_ok());

        // Too large
        let err = service
            .validate_upload("application/pdf", 2048)
            .unwrap_err();
        assert!(matches!(err, StorageError::FileTooLarge { .. }));
    }

    #[test]
    fn test_validate_upload_mime_type() {
        let config = StorageConfig::new(StorageProvider::local_fs("./test"));
        let service = StorageService::from_config(config).expect("should create service");

        // Valid MIME type
        assert!(service.validate_upload("application/pdf", 1024).is_ok());
        assert!(service.validate_upload("video/mp4", 1024).is_ok());

        // Invalid MIME type
        let err = service
            .validate_upload("application/x-executable", 1024)
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidMimeType { .. }));
    }

    #[tokio::test]
    async fn test_put_read_delete_roundtrip_local_fs() {
        let root = std::env::temp_dir().join(format!("dropzone-storage-{}", Uuid::new_v4()));
        let config = StorageConfig::new(StorageProvider::local_fs(&root));
        let service = StorageService::from_config(config).expect("should create service");

        let key =
            StorageService::generate_storage_key(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), "a.pdf");

        service
            .put(&key, "application/pdf", Bytes::from_static(b"pdf bytes"))
            .await
            .expect("put should succeed");
        assert!(service.exists(&key).await);

        let bytes = service.read(&key).await.expect("read should succeed");
        assert_eq!(&bytes[..], b"pdf bytes");

        service.delete(&key).await.expect("delete should succeed");
        assert!(!service.exists(&key).await);

        // Idempotent: deleting an already-gone blob is success.
        service
            .delete(&key)
            .await
            .expect("second delete should succeed");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_presign_unsupported_on_local_fs() {
        let root = std::env::temp_dir().join(format!("dropzone-storage-{}", Uuid::new_v4()));
        let config = StorageConfig::new(StorageProvider::local_fs(&root));
        let service = StorageService::from_config(config).expect("should create service");

        let presigned = service
            .presign_download("some/key", "a.pdf", false)
            .await
            .expect("presign should not error");
        assert!(presigned.is_none());
    }
}
