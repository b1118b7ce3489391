//! Zone error types.

use thiserror::Error;

/// Zone operation errors.
#[derive(Debug, Error)]
pub enum ZoneError {
    /// Zone does not exist or is soft-deleted.
    #[error("zone not found")]
    NotFound,

    /// Zone is past its expiry.
    #[error("zone has expired")]
    Expired,

    /// Password mismatch. Deliberately does not reveal which factor failed.
    #[error("invalid password")]
    Unauthorized,

    /// The requesting username was kicked from the zone.
    #[error("removed from this zone by the owner")]
    Kicked,

    /// Capability token mismatch on an owner-only action.
    #[error("not authorized (owner only)")]
    NotOwner,

    /// A required field was empty.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Duration or extension hours out of range.
    #[error("duration must be between {min} and {max} hours")]
    InvalidDuration {
        /// Minimum allowed hours.
        min: i64,
        /// Maximum allowed hours.
        max: i64,
    },

    /// The requested extension would breach the maximum total lifetime.
    #[error("extension exceeds the maximum total lifetime; {remaining_minutes} minute(s) remaining")]
    LifetimeLimitExceeded {
        /// Remaining extension allowance, in whole minutes.
        remaining_minutes: i64,
    },

    /// The owner cannot be kicked from their own zone.
    #[error("owner cannot be kicked")]
    CannotKickOwner,

    /// No session exists for the target username.
    #[error("user session not found in this zone")]
    SessionNotFound,

    /// Concurrent expiry updates kept conflicting.
    #[error("conflicting concurrent update")]
    Conflict,

    /// Password hashing or verification failed.
    #[error("password processing failed: {0}")]
    Password(String),

    /// Repository operation failed.
    #[error("repository error: {0}")]
    Repository(String),
}

impl ZoneError {
    /// Create a repository error.
    #[must_use]
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }
}
