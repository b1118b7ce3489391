//! Upload error types.

use thiserror::Error;

use crate::storage::StorageError;

/// Upload operation errors.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Zone does not exist or is soft-deleted.
    #[error("zone not found")]
    ZoneNotFound,

    /// Zone is past its expiry.
    #[error("zone has expired")]
    Expired,

    /// Uploads are locked for the zone; downloads stay allowed.
    #[error("uploads are locked in this zone")]
    Locked,

    /// A required field was empty.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// The submission carried no files.
    #[error("no files uploaded")]
    NoFiles,

    /// Too many files in one submission.
    #[error("at most {max} files per upload")]
    TooManyFiles {
        /// Maximum files per batch.
        max: usize,
    },

    /// A file's MIME type is not on the allow-list. Fails the whole batch.
    #[error("file '{name}' has disallowed type '{mime_type}'")]
    InvalidFile {
        /// Offending file's original name.
        name: String,
        /// Its declared MIME type.
        mime_type: String,
    },

    /// A file exceeds the size ceiling. Fails the whole batch.
    #[error("file '{name}' is {size} bytes, exceeding the maximum of {max} bytes")]
    TooLarge {
        /// Offending file's original name.
        name: String,
        /// Its size in bytes.
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },

    /// No such file in this zone.
    #[error("file not found in this zone")]
    FileNotFound,

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Repository operation failed.
    #[error("repository error: {0}")]
    Repository(String),
}

impl UploadError {
    /// Create a repository error.
    #[must_use]
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }
}
