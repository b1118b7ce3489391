//! Upload types and data structures.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One file carried by a multipart submission, bytes included.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    /// Original filename from the client.
    pub original_name: String,
    /// Declared MIME type.
    pub content_type: String,
    /// File content.
    pub bytes: Bytes,
}

/// Input for submitting an upload batch.
#[derive(Debug, Clone)]
pub struct SubmitUploadInput {
    /// Target zone.
    pub zone_id: Uuid,
    /// Display name of the uploader.
    pub uploader_username: String,
    /// Optional message attached to the batch.
    pub message: Option<String>,
    /// Files in this submission.
    pub files: Vec<IncomingFile>,
}

/// File metadata as stored and served to clients.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    /// Unique identifier.
    pub id: Uuid,
    /// Original filename.
    pub original_name: String,
    /// MIME type.
    pub mime_type: String,
    /// File size in bytes.
    pub size_bytes: i64,
    /// Display name of the uploader.
    pub uploaded_by: String,
    /// Upload timestamp.
    pub uploaded_at: DateTime<Utc>,
    /// Opaque storage gateway handle; internal, never serialized.
    #[serde(skip)]
    pub storage_key: String,
}

/// An upload batch with its files, as served to clients and broadcast to
/// the zone's channel.
#[derive(Debug, Clone, Serialize)]
pub struct BatchWithFiles {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning zone.
    pub zone_id: Uuid,
    /// Display name of the uploader.
    pub uploader_username: String,
    /// Optional message attached to the batch.
    pub message: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Files in this batch.
    pub files: Vec<FileRecord>,
}

/// Repository insert payload for one file of a batch.
#[derive(Debug, Clone)]
pub struct CreateFileInput {
    /// File identifier.
    pub file_id: Uuid,
    /// Original filename.
    pub original_name: String,
    /// MIME type.
    pub mime_type: String,
    /// File size in bytes.
    pub size_bytes: i64,
    /// Opaque storage gateway handle.
    pub storage_key: String,
}

/// Repository insert payload for a batch and all of its files.
///
/// The repository must commit the batch and every file atomically; a
/// partially visible batch is never acceptable.
#[derive(Debug, Clone)]
pub struct CreateBatchInput {
    /// Batch identifier.
    pub batch_id: Uuid,
    /// Owning zone.
    pub zone_id: Uuid,
    /// Display name of the uploader.
    pub uploader_username: String,
    /// Optional message attached to the batch.
    pub message: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Files in this batch.
    pub files: Vec<CreateFileInput>,
}

/// How the client asked for the file to be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Render in the browser (preview).
    Inline,
    /// Force a download with the original filename.
    Attachment,
}

/// Where the HTTP layer should send the client for the bytes.
#[derive(Debug, Clone)]
pub enum DownloadTarget {
    /// Redirect to a provider-signed URL.
    Redirect {
        /// The presigned URL.
        url: String,
    },
    /// Stream the blob through this process.
    Stream {
        /// Storage key to read.
        storage_key: String,
    },
}

/// Everything the HTTP layer needs to serve a file download.
#[derive(Debug, Clone)]
pub struct DownloadDescriptor {
    /// The file's metadata.
    pub file: FileRecord,
    /// Requested presentation.
    pub disposition: Disposition,
    /// Redirect or stream.
    pub target: DownloadTarget,
}
