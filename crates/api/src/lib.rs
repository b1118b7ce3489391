//! HTTP API layer with Axum routes and the WebSocket channel.
//!
//! This crate provides:
//! - REST API routes for zones, uploads, downloads, and chat history
//! - The per-zone WebSocket endpoint backed by the presence hub
//! - Error-to-HTTP mapping

pub mod error;
pub mod routes;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use dropzone_core::presence::PresenceHub;
use dropzone_core::storage::StorageService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// Storage service for file blobs.
    pub storage: Arc<StorageService>,
    /// Presence hub for real-time events.
    pub hub: Arc<PresenceHub>,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
