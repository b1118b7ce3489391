//! Repository implementations of the core traits.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the
//! application.

pub mod chat;
pub mod cleanup;
pub mod upload;
pub mod zone;

pub use chat::ChatRepository;
pub use cleanup::CleanupRepository;
pub use upload::UploadRepository;
pub use zone::ZoneRepository;

use crate::entities::{files, zones};
use dropzone_core::upload::FileRecord;
use dropzone_core::zone::Zone;

/// Convert a zone row to the domain model.
pub(crate) fn zone_to_domain(model: zones::Model) -> Zone {
    Zone {
        id: model.id,
        name: model.name,
        password_hash: model.password_hash,
        owner_username: model.owner_username,
        owner_token_hash: model.owner_token_hash,
        created_at: model.created_at.into(),
        expires_at: model.expires_at.into(),
        uploads_locked: model.uploads_locked,
        is_deleted: model.is_deleted,
    }
}

/// Convert a file row to the domain model.
pub(crate) fn file_to_domain(model: files::Model) -> FileRecord {
    FileRecord {
        id: model.id,
        original_name: model.original_name,
        mime_type: model.mime_type,
        size_bytes: model.size_bytes,
        uploaded_by: model.uploaded_by,
        uploaded_at: model.uploaded_at.into(),
        storage_key: model.storage_key,
    }
}
