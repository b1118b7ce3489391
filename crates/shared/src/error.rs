//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad input shape or range.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Authentication failed (wrong password).
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Access denied (capability mismatch or kicked user).
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Zone lifetime has elapsed.
    #[error("Gone: {0}")]
    Expired(String),

    /// Uploads are locked for the zone.
    #[error("Locked: {0}")]
    Locked(String),

    /// File content type is not on the allow-list.
    #[error("Invalid file: {0}")]
    InvalidFile(String),

    /// File exceeds the size ceiling.
    #[error("File too large: {0}")]
    FileTooLarge(String),

    /// Extension would breach the maximum total lifetime.
    #[error("Lifetime limit exceeded: {message}")]
    LifetimeLimitExceeded {
        /// Human-readable message.
        message: String,
        /// Remaining extension allowance, in whole minutes.
        remaining_minutes: i64,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Object storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_)
            | Self::InvalidFile(_)
            | Self::FileTooLarge(_)
            | Self::LifetimeLimitExceeded { .. } => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Expired(_) => 410,
            Self::Locked(_) => 423,
            Self::Database(_) | Self::Storage(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidFile(_) => "INVALID_FILE_TYPE",
            Self::FileTooLarge(_) => "FILE_TOO_LARGE",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Expired(_) => "EXPIRED",
            Self::Locked(_) => "UPLOADS_LOCKED",
            Self::LifetimeLimitExceeded { .. } => "LIFETIME_LIMIT_EXCEEDED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
