//! Real-time event vocabulary.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::chat::ChatMessage;
use crate::upload::BatchWithFiles;

/// An event fanned out to every connection in a zone's channel.
///
/// Serializes as `{ "event": "<name>", "data": { .. } }`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ZoneEvent {
    /// A connection joined the zone's channel.
    UserJoined {
        /// Display name of the joining participant.
        username: String,
    },
    /// A connection left the zone's channel.
    UserLeft {
        /// Display name of the departing participant.
        username: String,
    },
    /// The owner removed a participant from the zone.
    UserKicked {
        /// Zone the kick applies to.
        zone_id: Uuid,
        /// The removed participant.
        username: String,
    },
    /// The owner toggled the uploads lock.
    ZoneLockState {
        /// Zone the change applies to.
        zone_id: Uuid,
        /// New lock state.
        uploads_locked: bool,
        /// Who changed it.
        updated_by: String,
    },
    /// The owner extended the zone's expiry.
    ZoneExtended {
        /// Zone the change applies to.
        zone_id: Uuid,
        /// New expiry timestamp.
        expires_at: DateTime<Utc>,
        /// Hours added by this extension.
        extra_hours: i64,
        /// Who extended it.
        extended_by: String,
    },
    /// A new upload batch was committed.
    ZoneUploadBatch(BatchWithFiles),
    /// A chat message was posted.
    ChatMessage(ChatMessage),
}

/// Sink for zone-scoped real-time events.
///
/// Implemented by [`super::PresenceHub`] in production. Services hold the
/// sink as an explicit injected value - never ambient global state - so unit
/// tests can substitute a recording fake.
pub trait EventSink: Send + Sync {
    /// Fan an event out to every connection in the zone's channel.
    ///
    /// Best-effort: publishing to a zone with no connected participants is
    /// a no-op.
    fn publish(&self, zone_id: Uuid, event: ZoneEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_names() {
        let event = ZoneEvent::UserJoined {
            username: "alice".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "user_joined");
        assert_eq!(json["data"]["username"], "alice");

        let event = ZoneEvent::ZoneLockState {
            zone_id: Uuid::new_v4(),
            uploads_locked: true,
            updated_by: "alice".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "zone_lock_state");
        assert_eq!(json["data"]["uploads_locked"], true);

        let event = ZoneEvent::ZoneExtended {
            zone_id: Uuid::new_v4(),
            expires_at: Utc::now(),
            extra_hours: 2,
            extended_by: "alice".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "zone_extended");
        assert_eq!(json["data"]["extra_hours"], 2);
    }
}
