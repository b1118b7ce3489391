//! Error-to-HTTP mapping.
//!
//! Core errors convert into the shared [`AppError`] taxonomy, which renders
//! as `{ "error": <code>, "message": <text> }` JSON. Server-side failures
//! are logged here and surfaced as a generic message, never exposing
//! internals.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use dropzone_core::chat::ChatError;
use dropzone_core::cleanup::CleanupError;
use dropzone_core::storage::StorageError;
use dropzone_core::upload::UploadError;
use dropzone_core::zone::ZoneError;
use dropzone_shared::AppError;

/// Wrapper rendering an [`AppError`] as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = if status.is_server_error() {
            error!(error = %self.0, "Request failed");
            "An error occurred".to_string()
        } else {
            self.0.to_string()
        };

        let mut body = json!({
            "error": self.0.error_code().to_ascii_lowercase(),
            "message": message,
        });
        if let AppError::LifetimeLimitExceeded {
            remaining_minutes, ..
        } = &self.0
        {
            body["remaining_minutes"] = json!(remaining_minutes);
        }

        (status, Json(body)).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<ZoneError> for ApiError {
    fn from(err: ZoneError) -> Self {
        let app = match err {
            ZoneError::NotFound => AppError::NotFound("Zone not found".to_string()),
            ZoneError::Expired => AppError::Expired("Zone has expired".to_string()),
            ZoneError::Unauthorized => AppError::Unauthorized("Invalid password".to_string()),
            ZoneError::Kicked => AppError::Forbidden(
                "You have been removed from this zone by the owner".to_string(),
            ),
            ZoneError::NotOwner => {
                AppError::Forbidden("Not authorized (owner only)".to_string())
            }
            ZoneError::MissingField(field) => {
                AppError::Validation(format!("{field} is required"))
            }
            ZoneError::InvalidDuration { min, max } => {
                AppError::Validation(format!("Duration must be between {min} and {max} hours"))
            }
            ZoneError::LifetimeLimitExceeded { remaining_minutes } => {
                AppError::LifetimeLimitExceeded {
                    message: lifetime_limit_message(remaining_minutes),
                    remaining_minutes,
                }
            }
            ZoneError::CannotKickOwner => {
                AppError::Validation("Owner cannot be kicked".to_string())
            }
            ZoneError::SessionNotFound => {
                AppError::NotFound("User session not found in this zone".to_string())
            }
            ZoneError::Conflict => AppError::Internal("conflicting concurrent update".to_string()),
            ZoneError::Password(msg) => AppError::Internal(msg),
            ZoneError::Repository(msg) => AppError::Database(msg),
        };
        Self(app)
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        let app = match err {
            UploadError::ZoneNotFound => AppError::NotFound("Zone not found".to_string()),
            UploadError::Expired => AppError::Expired("Zone has expired".to_string()),
            UploadError::Locked => {
                AppError::Locked("Uploads are locked in this zone".to_string())
            }
            UploadError::MissingField(field) => {
                AppError::Validation(format!("{field} is required"))
            }
            UploadError::NoFiles => AppError::Validation("No files uploaded".to_string()),
            UploadError::TooManyFiles { max } => {
                AppError::Validation(format!("At most {max} files per upload"))
            }
            err @ UploadError::InvalidFile { .. } => AppError::InvalidFile(err.to_string()),
            err @ UploadError::TooLarge { .. } => AppError::FileTooLarge(err.to_string()),
            UploadError::FileNotFound => {
                AppError::NotFound("File not found in this zone".to_string())
            }
            UploadError::Storage(err) => AppError::Storage(err.to_string()),
            UploadError::Repository(msg) => AppError::Database(msg),
        };
        Self(app)
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let app = match err {
            ChatError::ZoneNotFound => AppError::NotFound("Zone not found".to_string()),
            ChatError::Expired => AppError::Expired("Zone has expired".to_string()),
            ChatError::MissingField(field) => {
                AppError::Validation(format!("{field} is required"))
            }
            ChatError::Repository(msg) => AppError::Database(msg),
        };
        Self(app)
    }
}

impl From<CleanupError> for ApiError {
    fn from(err: CleanupError) -> Self {
        let CleanupError::Repository(msg) = err;
        Self(AppError::Database(msg))
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self(AppError::Storage(err.to_string()))
    }
}

/// Human-readable allowance message for a rejected extension.
fn lifetime_limit_message(remaining_minutes: i64) -> String {
    if remaining_minutes <= 0 {
        "This zone has already reached its maximum lifetime of 10 hours and cannot be extended further".to_string()
    } else {
        let hours = remaining_minutes / 60;
        let minutes = remaining_minutes % 60;
        match (hours, minutes) {
            (0, m) => format!("You can only extend this zone by up to {m} more minute(s)"),
            (h, 0) => format!("You can only extend this zone by up to {h} more hour(s)"),
            (h, m) => {
                format!("You can only extend this zone by up to {h} hour(s) {m} minute(s) more")
            }
        }
    }
}
