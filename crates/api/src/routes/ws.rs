//! Per-zone WebSocket channel.
//!
//! A connection joins exactly one zone's channel: it receives every event
//! the hub fans out and may post chat messages. Delivery is best-effort;
//! a client that lags or reconnects reconciles by re-fetching the zone.
//!
//! Kick enforcement is server-side: when a `user_kicked` event names this
//! connection's username, the socket is closed here regardless of whether
//! the client cooperates.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Path, Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::{AppState, routes::chat::chat_service};
use dropzone_core::presence::ZoneEvent;
use dropzone_core::zone::ZoneService;
use dropzone_db::repositories::ZoneRepository;

/// Creates the WebSocket routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/zones/{id}/ws", get(zone_ws))
}

/// Query parameters for opening a zone channel.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Display name of the connecting participant.
    pub username: String,
}

/// Messages a client may send over the channel.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
enum ClientEvent {
    /// Post a chat message to the zone.
    ChatMessage {
        /// Message text.
        body: String,
    },
}

/// GET `/zones/{id}/ws` - upgrade to the zone's real-time channel.
async fn zone_ws(
    State(state): State<AppState>,
    Path(zone_id): Path<Uuid>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    // Gate before upgrading: dead zones and kicked users never get a
    // channel in the first place.
    let repo = ZoneRepository::new((*state.db).clone());
    let service = ZoneService::new(Arc::new(repo), state.hub.clone());
    service.authorize_channel(zone_id, &query.username).await?;

    Ok(ws.on_upgrade(move |socket| handle_socket(state, zone_id, query.username, socket)))
}

/// Runs one connection's lifecycle: subscribe, relay, unsubscribe.
async fn handle_socket(state: AppState, zone_id: Uuid, username: String, socket: WebSocket) {
    let conn_id = Uuid::new_v4();
    let mut events = state.hub.subscribe(zone_id, conn_id, &username);
    info!(zone_id = %zone_id, conn_id = %conn_id, username = %username, "Channel opened");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let kicked_me = matches!(
                        &event,
                        ZoneEvent::UserKicked { username: target, .. } if *target == username
                    );

                    match serde_json::to_string(&event) {
                        Ok(text) => {
                            if sink.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "Failed to serialize event"),
                    }

                    if kicked_me {
                        // Server-side termination: the kicked client is
                        // disconnected whether or not it complies.
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        zone_id = %zone_id,
                        conn_id = %conn_id,
                        skipped,
                        "Receiver lagged; client must re-fetch the zone"
                    );
                }
                Err(RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    handle_client_event(&state, zone_id, &username, text.as_str()).await;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.hub.unsubscribe(zone_id, conn_id);
    info!(zone_id = %zone_id, conn_id = %conn_id, username = %username, "Channel closed");
}

/// Handles one inbound client message. Malformed or rejected messages are
/// dropped; the channel itself stays up.
async fn handle_client_event(state: &AppState, zone_id: Uuid, username: &str, text: &str) {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(ClientEvent::ChatMessage { body }) => {
            let service = chat_service(state);
            if let Err(e) = service.post_message(zone_id, username, &body).await {
                debug!(zone_id = %zone_id, error = %e, "Dropped chat message");
            }
        }
        Err(e) => {
            debug!(zone_id = %zone_id, error = %e, "Ignoring unrecognized client message");
        }
    }
}
