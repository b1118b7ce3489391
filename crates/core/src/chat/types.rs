//! Chat types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// A zone-scoped chat message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Unique identifier.
    pub id: Uuid,
    /// Display name of the sender.
    pub username: String,
    /// Message text.
    pub body: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Chat operation errors.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Zone does not exist or is soft-deleted.
    #[error("zone not found")]
    ZoneNotFound,

    /// Zone is past its expiry.
    #[error("zone has expired")]
    Expired,

    /// A required field was empty.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Repository operation failed.
    #[error("repository error: {0}")]
    Repository(String),
}

impl ChatError {
    /// Create a repository error.
    #[must_use]
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }
}
