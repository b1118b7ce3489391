//! API route definitions.

use axum::Router;
use axum::http::HeaderMap;

use crate::AppState;
use crate::error::ApiError;
use dropzone_core::auth::OwnerToken;
use dropzone_shared::AppError;

pub mod chat;
pub mod health;
pub mod uploads;
pub mod ws;
pub mod zones;

/// Header carrying the owner capability token.
pub const OWNER_TOKEN_HEADER: &str = "x-owner-token";

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(zones::routes())
        .merge(uploads::routes())
        .merge(chat::routes())
        .merge(ws::routes())
}

/// Extracts the owner capability token from the request headers.
///
/// A missing or unreadable header is a capability mismatch, not a
/// validation error: the caller simply is not the owner.
pub(crate) fn owner_token(headers: &HeaderMap) -> Result<OwnerToken, ApiError> {
    headers
        .get(OWNER_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(OwnerToken::from)
        .ok_or_else(|| {
            ApiError(AppError::Forbidden(
                "Not authorized (owner only)".to_string(),
            ))
        })
}
