//! In-memory presence hub with per-zone broadcast channels.

use std::collections::HashMap;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::{EventSink, ZoneEvent};

/// Buffered events per channel before slow receivers start lagging.
const CHANNEL_CAPACITY: usize = 256;

/// One zone's channel: the broadcast sender plus connection membership.
struct ZoneChannel {
    tx: broadcast::Sender<ZoneEvent>,
    /// Connection id -> username. Membership is per physical connection,
    /// not per username; the same username may appear several times.
    members: HashMap<Uuid, String>,
}

/// Tracks connected participants per zone and relays real-time events.
///
/// Thread-safe; intended to be shared as an `Arc` between the WebSocket
/// layer and the services that publish events.
pub struct PresenceHub {
    channels: DashMap<Uuid, ZoneChannel>,
}

impl PresenceHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Registers a connection in a zone's channel and returns its event
    /// receiver. Broadcasts `user_joined` to the channel.
    pub fn subscribe(
        &self,
        zone_id: Uuid,
        conn_id: Uuid,
        username: &str,
    ) -> broadcast::Receiver<ZoneEvent> {
        let mut channel = self.channels.entry(zone_id).or_insert_with(|| ZoneChannel {
            tx: broadcast::channel(CHANNEL_CAPACITY).0,
            members: HashMap::new(),
        });
        channel.members.insert(conn_id, username.to_string());
        let rx = channel.tx.subscribe();
        let tx = channel.tx.clone();
        drop(channel);

        let _ = tx.send(ZoneEvent::UserJoined {
            username: username.to_string(),
        });
        rx
    }

    /// Removes a connection from a zone's channel, broadcasting `user_left`.
    /// The channel itself is dropped once its last connection leaves.
    pub fn unsubscribe(&self, zone_id: Uuid, conn_id: Uuid) {
        let mut departed = None;
        let mut empty = false;
        if let Some(mut channel) = self.channels.get_mut(&zone_id) {
            if let Some(username) = channel.members.remove(&conn_id) {
                departed = Some((username, channel.tx.clone()));
            }
            empty = channel.members.is_empty();
        }
        if empty {
            self.channels.remove_if(&zone_id, |_, c| c.members.is_empty());
        }
        if let Some((username, tx)) = departed {
            let _ = tx.send(ZoneEvent::UserLeft { username });
        }
    }

    /// Distinct usernames currently connected to a zone, sorted.
    #[must_use]
    pub fn roster(&self, zone_id: Uuid) -> Vec<String> {
        self.channels
            .get(&zone_id)
            .map(|channel| {
                let mut names: Vec<String> = channel.members.values().cloned().collect();
                names.sort();
                names.dedup();
                names
            })
            .unwrap_or_default()
    }

    /// Number of physical connections in a zone's channel.
    #[must_use]
    pub fn connection_count(&self, zone_id: Uuid) -> usize {
        self.channels
            .get(&zone_id)
            .map_or(0, |channel| channel.members.len())
    }
}

impl Default for PresenceHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for PresenceHub {
    fn publish(&self, zone_id: Uuid, event: ZoneEvent) {
        if let Some(channel) = self.channels.get(&zone_id) {
            // send only fails when no receiver is subscribed; lagging
            // receivers drop the oldest events (at-most-once delivery).
            let _ = channel.tx.send(event);
        }
    }
}
