//! Zone types and data structures.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::upload::BatchWithFiles;

/// Minimum initial zone duration, in hours.
pub const MIN_DURATION_HOURS: i64 = 1;
/// Maximum initial zone duration (and maximum single extension), in hours.
pub const MAX_DURATION_HOURS: i64 = 5;
/// Maximum total zone lifetime from creation to expiry, in hours.
pub const MAX_TOTAL_LIFETIME_HOURS: i64 = 10;

/// Zone domain model.
///
/// Carries the stored hashes; never serialized to clients directly - use
/// [`ZoneSummary`] / [`ZoneDetail`] for that.
#[derive(Debug, Clone)]
pub struct Zone {
    /// Unique identifier.
    pub id: Uuid,
    /// Display name. Not unique: collisions resolve to the most recently
    /// created zone on join.
    pub name: String,
    /// Argon2id hash of the zone password (PHC string).
    pub password_hash: String,
    /// Display name of the owner.
    pub owner_username: String,
    /// SHA-256 hash of the owner capability token.
    pub owner_token_hash: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Expiry timestamp.
    pub expires_at: DateTime<Utc>,
    /// Whether uploads are currently locked (downloads stay allowed).
    pub uploads_locked: bool,
    /// Soft-delete flag; a flagged zone is never served and awaits the reaper.
    pub is_deleted: bool,
}

impl Zone {
    /// Whether the zone is past its expiry at the given instant.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Total lifetime from creation to the current expiry.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.expires_at - self.created_at
    }
}

/// Client-facing zone summary.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneSummary {
    /// Zone identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Display name of the owner.
    pub owner_username: String,
    /// Expiry timestamp.
    pub expires_at: DateTime<Utc>,
    /// Whether uploads are currently locked.
    pub uploads_locked: bool,
}

impl From<&Zone> for ZoneSummary {
    fn from(zone: &Zone) -> Self {
        Self {
            id: zone.id,
            name: zone.name.clone(),
            owner_username: zone.owner_username.clone(),
            expires_at: zone.expires_at,
            uploads_locked: zone.uploads_locked,
        }
    }
}

/// Full zone view: summary plus upload history and the requester's
/// last-visit marker.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneDetail {
    /// Zone identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Display name of the owner.
    pub owner_username: String,
    /// Expiry timestamp.
    pub expires_at: DateTime<Utc>,
    /// Whether uploads are currently locked.
    pub uploads_locked: bool,
    /// The requester's previous `last_seen_at`, for client-side "new since
    /// last visit" computation. `None` when no username was supplied or the
    /// username has no session yet.
    pub user_last_seen_at: Option<DateTime<Utc>>,
    /// All upload batches with their files, oldest first.
    pub batches: Vec<BatchWithFiles>,
}

/// Input for creating a zone.
#[derive(Debug, Clone)]
pub struct CreateZoneInput {
    /// Display name.
    pub name: String,
    /// Plaintext password; hashed before storage.
    pub password: String,
    /// Initial duration in hours (1..=5).
    pub duration_hours: i64,
    /// Display name of the creating user, who becomes the owner.
    pub owner_username: String,
}

/// Repository insert payload for a new zone.
#[derive(Debug, Clone)]
pub struct NewZone {
    /// Zone identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Argon2id password hash.
    pub password_hash: String,
    /// Display name of the owner.
    pub owner_username: String,
    /// SHA-256 hash of the owner capability token.
    pub owner_token_hash: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Expiry timestamp.
    pub expires_at: DateTime<Utc>,
}

/// Per (zone, username) participation record.
///
/// Not a login session: purely a zone-scoped presence/authorization record.
#[derive(Debug, Clone)]
pub struct UserSession {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning zone.
    pub zone_id: Uuid,
    /// Participant display name.
    pub username: String,
    /// First-join timestamp.
    pub joined_at: DateTime<Utc>,
    /// Updated on zone reads; drives the "new since last visit" marker.
    pub last_seen_at: DateTime<Utc>,
    /// A kicked session permanently bars the username until the zone dies.
    pub is_kicked: bool,
}
