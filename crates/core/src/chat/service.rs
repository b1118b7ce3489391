//! Chat service implementation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{ChatError, ChatMessage};
use crate::presence::{EventSink, ZoneEvent};
use crate::zone::Zone;

/// Most recent messages returned by a history read.
pub const HISTORY_LIMIT: u64 = 200;

/// Repository trait for chat persistence.
pub trait ChatRepository: Send + Sync {
    /// Find a zone by id, including soft-deleted and expired ones.
    fn find_zone(
        &self,
        zone_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Zone>, ChatError>> + Send;

    /// Persist a chat message.
    fn insert_message(
        &self,
        zone_id: Uuid,
        username: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<ChatMessage, ChatError>> + Send;

    /// The most recent `limit` messages of a zone, oldest first.
    fn list_messages(
        &self,
        zone_id: Uuid,
        limit: u64,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, ChatError>> + Send;
}

/// Chat service: posting and history for a zone's channel.
pub struct ChatService<R: ChatRepository> {
    repo: Arc<R>,
    events: Arc<dyn EventSink>,
}

impl<R: ChatRepository> ChatService<R> {
    /// Create a new chat service.
    #[must_use]
    pub fn new(repo: Arc<R>, events: Arc<dyn EventSink>) -> Self {
        Self { repo, events }
    }

    /// Post a message to a zone and broadcast it.
    ///
    /// # Errors
    ///
    /// `ZoneNotFound`, `Expired`, or `MissingField` for an empty body or
    /// username.
    pub async fn post_message(
        &self,
        zone_id: Uuid,
        username: &str,
        body: &str,
    ) -> Result<ChatMessage, ChatError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ChatError::MissingField("username"));
        }
        let body = body.trim();
        if body.is_empty() {
            return Err(ChatError::MissingField("body"));
        }

        let zone = self.live_zone(zone_id).await?;
        let message = self
            .repo
            .insert_message(zone.id, username, body, Utc::now())
            .await?;

        self.events
            .publish(zone.id, ZoneEvent::ChatMessage(message.clone()));

        Ok(message)
    }

    /// Chat history for a zone, capped at [`HISTORY_LIMIT`] messages.
    ///
    /// # Errors
    ///
    /// `ZoneNotFound` or `Expired`.
    pub async fn history(&self, zone_id: Uuid) -> Result<Vec<ChatMessage>, ChatError> {
        let zone = self.live_zone(zone_id).await?;
        self.repo.list_messages(zone.id, HISTORY_LIMIT).await
    }

    async fn live_zone(&self, zone_id: Uuid) -> Result<Zone, ChatError> {
        let zone = self
            .repo
            .find_zone(zone_id)
            .await?
            .filter(|z| !z.is_deleted)
            .ok_or(ChatError::ZoneNotFound)?;
        if zone.is_expired_at(Utc::now()) {
            return Err(ChatError::Expired);
        }
        Ok(zone)
    }
}
