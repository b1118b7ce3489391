//! Chat history route.
//!
//! Messages are posted over the WebSocket channel; HTTP only serves the
//! history.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;
use dropzone_core::chat::ChatService;
use dropzone_db::repositories::ChatRepository;

/// Creates the chat routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/zones/{id}/chat", get(get_chat_history))
}

/// Builds a chat service bound to the request's state.
pub(crate) fn chat_service(state: &AppState) -> ChatService<ChatRepository> {
    let repo = ChatRepository::new((*state.db).clone());
    ChatService::new(Arc::new(repo), state.hub.clone())
}

/// GET `/zones/{id}/chat` - chat history for a zone, oldest first.
async fn get_chat_history(
    State(state): State<AppState>,
    Path(zone_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let service = chat_service(&state);
    let messages = service.history(zone_id).await?;
    Ok(Json(messages))
}
