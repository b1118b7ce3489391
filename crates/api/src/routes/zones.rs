//! Zone lifecycle routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, patch, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::{AppState, routes::owner_token};
use dropzone_core::cleanup::CleanupService;
use dropzone_core::zone::{CreateZoneInput, ZoneService};
use dropzone_db::repositories::{CleanupRepository, ZoneRepository};

/// Creates the zone routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/zones", post(create_zone))
        .route("/zones/join", post(join_zone))
        .route("/zones/{id}", get(get_zone))
        .route("/zones/{id}/extend", patch(extend_zone))
        .route("/zones/{id}/lock", patch(set_uploads_locked))
        .route("/zones/{id}/kick-user", post(kick_user))
        .route("/zones/{id}", delete(delete_zone))
}

/// Builds a zone service bound to the request's state.
fn zone_service(state: &AppState) -> ZoneService<ZoneRepository> {
    let repo = ZoneRepository::new((*state.db).clone());
    ZoneService::new(Arc::new(repo), state.hub.clone())
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a zone.
#[derive(Debug, Deserialize)]
pub struct CreateZoneRequest {
    /// Zone display name.
    pub name: String,
    /// Zone password.
    pub password: String,
    /// Initial duration in hours (1..=5).
    pub duration_hours: i64,
    /// Display name of the creating user.
    pub username: String,
}

/// Request body for joining a zone.
#[derive(Debug, Deserialize)]
pub struct JoinZoneRequest {
    /// Zone display name.
    pub name: String,
    /// Zone password.
    pub password: String,
    /// Display name of the joining user.
    pub username: String,
}

/// Query parameters for reading a zone.
#[derive(Debug, Deserialize)]
pub struct GetZoneQuery {
    /// Optional requesting username, for the "new since last visit" marker
    /// and the kicked-user gate.
    pub username: Option<String>,
}

/// Request body for extending a zone.
#[derive(Debug, Deserialize)]
pub struct ExtendZoneRequest {
    /// Hours to add (1..=5).
    pub extra_hours: i64,
}

/// Request body for toggling the uploads lock.
#[derive(Debug, Deserialize)]
pub struct SetLockedRequest {
    /// New lock state.
    pub uploads_locked: bool,
}

/// Request body for kicking a user.
#[derive(Debug, Deserialize)]
pub struct KickUserRequest {
    /// Username to kick.
    pub username: String,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/zones` - create a zone.
///
/// Returns the zone summary and the owner capability token; the token is
/// handed out exactly once, here.
async fn create_zone(
    State(state): State<AppState>,
    Json(payload): Json<CreateZoneRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let service = zone_service(&state);

    let (zone, owner_token) = service
        .create_zone(CreateZoneInput {
            name: payload.name,
            password: payload.password,
            duration_hours: payload.duration_hours,
            owner_username: payload.username,
        })
        .await?;

    info!(zone_id = %zone.id, name = %zone.name, "Zone created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Zone created successfully",
            "zone": zone,
            "owner_token": owner_token.expose(),
        })),
    ))
}

/// POST `/zones/join` - join a zone by name, password, and username.
async fn join_zone(
    State(state): State<AppState>,
    Json(payload): Json<JoinZoneRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let service = zone_service(&state);

    let (zone, session) = service
        .join_zone(&payload.name, &payload.password, &payload.username)
        .await?;

    info!(zone_id = %zone.id, username = %session.username, "User joined zone");

    Ok(Json(json!({
        "message": "Joined zone successfully",
        "zone": zone,
        "user": {
            "username": session.username,
            "joined_at": session.joined_at,
        },
    })))
}

/// GET `/zones/{id}` - zone detail with upload batches.
async fn get_zone(
    State(state): State<AppState>,
    Path(zone_id): Path<Uuid>,
    Query(query): Query<GetZoneQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let service = zone_service(&state);
    let detail = service.get_zone(zone_id, query.username.as_deref()).await?;
    Ok(Json(detail))
}

/// PATCH `/zones/{id}/extend` - extend expiry (owner only).
async fn extend_zone(
    State(state): State<AppState>,
    Path(zone_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<ExtendZoneRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = owner_token(&headers)?;
    let service = zone_service(&state);

    let expires_at = service
        .extend_zone(zone_id, &token, payload.extra_hours)
        .await?;

    info!(zone_id = %zone_id, extra_hours = payload.extra_hours, "Zone extended");

    Ok(Json(json!({
        "message": "Zone expiry extended",
        "expires_at": expires_at,
    })))
}

/// PATCH `/zones/{id}/lock` - toggle the uploads lock (owner only).
async fn set_uploads_locked(
    State(state): State<AppState>,
    Path(zone_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<SetLockedRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = owner_token(&headers)?;
    let service = zone_service(&state);

    let locked = service
        .set_uploads_locked(zone_id, &token, payload.uploads_locked)
        .await?;

    info!(zone_id = %zone_id, locked, "Uploads lock changed");

    let message = if locked {
        "Uploads locked"
    } else {
        "Uploads unlocked"
    };
    Ok(Json(json!({
        "message": message,
        "uploads_locked": locked,
    })))
}

/// POST `/zones/{id}/kick-user` - kick a username (owner only).
async fn kick_user(
    State(state): State<AppState>,
    Path(zone_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<KickUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = owner_token(&headers)?;
    let service = zone_service(&state);

    service
        .kick_user(zone_id, &token, &payload.username)
        .await?;

    info!(zone_id = %zone_id, username = %payload.username, "User kicked from zone");

    Ok(Json(json!({
        "message": format!("User \"{}\" has been removed from this zone", payload.username),
    })))
}

/// DELETE `/zones/{id}` - delete a zone and everything it owns (owner only).
///
/// The cascading cleanup runs synchronously; it is the same routine the
/// background reaper uses, so racing with a sweep is harmless.
async fn delete_zone(
    State(state): State<AppState>,
    Path(zone_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = owner_token(&headers)?;
    let service = zone_service(&state);

    service.authorize_delete(zone_id, &token).await?;

    let cleanup = CleanupService::new(
        state.storage.clone(),
        Arc::new(CleanupRepository::new((*state.db).clone())),
    );
    cleanup.cleanup_zone(zone_id).await?;

    info!(zone_id = %zone_id, "Zone deleted by owner");

    Ok(Json(json!({ "message": "Zone deleted successfully" })))
}
