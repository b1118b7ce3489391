//! Zone service implementation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::error::ZoneError;
use super::types::{
    CreateZoneInput, MAX_DURATION_HOURS, MAX_TOTAL_LIFETIME_HOURS, MIN_DURATION_HOURS, NewZone,
    UserSession, Zone, ZoneDetail, ZoneSummary,
};
use crate::auth::{OwnerToken, hash_password, verify_password};
use crate::presence::{EventSink, ZoneEvent};
use crate::upload::BatchWithFiles;

/// How many times a conflicting expiry compare-and-set is retried before
/// giving up. Extensions are owner-gated and rare; sustained contention
/// means something else is wrong.
const MAX_EXTEND_ATTEMPTS: u32 = 3;

/// Repository trait for zone persistence.
///
/// This trait is implemented by the db crate to provide actual database
/// operations.
pub trait ZoneRepository: Send + Sync {
    /// Insert a new zone.
    fn insert_zone(
        &self,
        input: NewZone,
    ) -> impl std::future::Future<Output = Result<Zone, ZoneError>> + Send;

    /// Find a zone by id, including soft-deleted and expired ones.
    fn find_by_id(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Zone>, ZoneError>> + Send;

    /// Find the most recently created non-deleted zone with the given name.
    ///
    /// Zone names are not unique; collisions deliberately resolve to the
    /// newest zone.
    fn find_latest_by_name(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<Zone>, ZoneError>> + Send;

    /// Persist the uploads-locked flag.
    fn set_uploads_locked(
        &self,
        id: Uuid,
        locked: bool,
    ) -> impl std::future::Future<Output = Result<(), ZoneError>> + Send;

    /// Conditionally move the expiry forward: the update must only apply
    /// while the persisted expiry still equals `expected`. Returns whether
    /// the row was updated.
    fn extend_expiry_if_unchanged(
        &self,
        id: Uuid,
        expected: DateTime<Utc>,
        new_expiry: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool, ZoneError>> + Send;

    /// Find the session for a username within a zone.
    fn find_session(
        &self,
        zone_id: Uuid,
        username: &str,
    ) -> impl std::future::Future<Output = Result<Option<UserSession>, ZoneError>> + Send;

    /// Create a session for a username within a zone.
    fn insert_session(
        &self,
        zone_id: Uuid,
        username: &str,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<UserSession, ZoneError>> + Send;

    /// Update a session's last-seen timestamp.
    fn touch_session(
        &self,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), ZoneError>> + Send;

    /// Set a session's kicked flag.
    fn mark_session_kicked(
        &self,
        session_id: Uuid,
    ) -> impl std::future::Future<Output = Result<(), ZoneError>> + Send;

    /// All upload batches of a zone with their files, oldest first.
    fn list_batches(
        &self,
        zone_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<BatchWithFiles>, ZoneError>> + Send;
}

/// Zone service: lifecycle state machine and owner authorization.
pub struct ZoneService<R: ZoneRepository> {
    repo: Arc<R>,
    events: Arc<dyn EventSink>,
}

impl<R: ZoneRepository> ZoneService<R> {
    /// Create a new zone service.
    #[must_use]
    pub fn new(repo: Arc<R>, events: Arc<dyn EventSink>) -> Self {
        Self { repo, events }
    }

    /// Create a zone and its owner session.
    ///
    /// Returns the zone summary and the owner capability token. The raw
    /// token is handed out exactly here; only its hash is stored.
    ///
    /// # Errors
    ///
    /// `MissingField` for empty inputs, `InvalidDuration` for an
    /// out-of-range duration.
    pub async fn create_zone(
        &self,
        input: CreateZoneInput,
    ) -> Result<(ZoneSummary, OwnerToken), ZoneError> {
        let name = required(&input.name, "name")?;
        let owner = required(&input.owner_username, "username")?;
        if input.password.is_empty() {
            return Err(ZoneError::MissingField("password"));
        }
        if !(MIN_DURATION_HOURS..=MAX_DURATION_HOURS).contains(&input.duration_hours) {
            return Err(ZoneError::InvalidDuration {
                min: MIN_DURATION_HOURS,
                max: MAX_DURATION_HOURS,
            });
        }

        let password_hash =
            hash_password(&input.password).map_err(|e| ZoneError::Password(e.to_string()))?;
        let token = OwnerToken::generate();
        let now = Utc::now();

        let zone = self
            .repo
            .insert_zone(NewZone {
                id: Uuid::new_v4(),
                name: name.to_string(),
                password_hash,
                owner_username: owner.to_string(),
                owner_token_hash: token.hash(),
                created_at: now,
                expires_at: now + Duration::hours(input.duration_hours),
            })
            .await?;

        self.repo.insert_session(zone.id, owner, now).await?;

        Ok((ZoneSummary::from(&zone), token))
    }

    /// Join a zone by name, password, and username.
    ///
    /// Returns the zone summary and the (new or refreshed) user session.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Expired`, `Unauthorized` (password), or `Kicked`.
    pub async fn join_zone(
        &self,
        name: &str,
        password: &str,
        username: &str,
    ) -> Result<(ZoneSummary, UserSession), ZoneError> {
        let name = required(name, "name")?;
        let username = required(username, "username")?;
        if password.is_empty() {
            return Err(ZoneError::MissingField("password"));
        }

        let zone = self
            .repo
            .find_latest_by_name(name)
            .await?
            .ok_or(ZoneError::NotFound)?;

        if zone.is_expired_at(Utc::now()) {
            return Err(ZoneError::Expired);
        }

        let password_ok = verify_password(password, &zone.password_hash)
            .map_err(|e| ZoneError::Password(e.to_string()))?;
        if !password_ok {
            return Err(ZoneError::Unauthorized);
        }

        let now = Utc::now();
        let session = match self.repo.find_session(zone.id, username).await? {
            Some(session) if session.is_kicked => return Err(ZoneError::Kicked),
            Some(session) => {
                self.repo.touch_session(session.id, now).await?;
                UserSession {
                    last_seen_at: now,
                    ..session
                }
            }
            None => self.repo.insert_session(zone.id, username, now).await?,
        };

        Ok((ZoneSummary::from(&zone), session))
    }

    /// Full zone view, with upload batches and the requester's last-visit
    /// marker.
    ///
    /// The session's `last_seen_at` is read and then stamped to now.
    /// Concurrent readers may race on the stamp; the only consequence is a
    /// slightly stale "new since last visit" marker.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Expired`, or `Kicked` for a kicked requester.
    pub async fn get_zone(
        &self,
        zone_id: Uuid,
        username: Option<&str>,
    ) -> Result<ZoneDetail, ZoneError> {
        let zone = self.live_zone(zone_id).await?;

        let mut user_last_seen_at = None;
        if let Some(username) = username.map(str::trim).filter(|u| !u.is_empty()) {
            if let Some(session) = self.repo.find_session(zone.id, username).await? {
                if session.is_kicked {
                    return Err(ZoneError::Kicked);
                }
                user_last_seen_at = Some(session.last_seen_at);
                self.repo.touch_session(session.id, Utc::now()).await?;
            }
        }

        let batches = self.repo.list_batches(zone.id).await?;

        Ok(ZoneDetail {
            id: zone.id,
            name: zone.name,
            owner_username: zone.owner_username,
            expires_at: zone.expires_at,
            uploads_locked: zone.uploads_locked,
            user_last_seen_at,
            batches,
        })
    }

    /// Check that a username may open the zone's real-time channel.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Expired`, or `Kicked`.
    pub async fn authorize_channel(&self, zone_id: Uuid, username: &str) -> Result<(), ZoneError> {
        let zone = self.live_zone(zone_id).await?;
        if let Some(session) = self.repo.find_session(zone.id, username).await? {
            if session.is_kicked {
                return Err(ZoneError::Kicked);
            }
        }
        Ok(())
    }

    /// Toggle the uploads lock. Owner only; broadcasts the new state.
    ///
    /// # Errors
    ///
    /// `NotFound`, `NotOwner`, or `Expired`.
    pub async fn set_uploads_locked(
        &self,
        zone_id: Uuid,
        token: &OwnerToken,
        locked: bool,
    ) -> Result<bool, ZoneError> {
        let zone = self.owned_zone(zone_id, token).await?;
        if zone.is_expired_at(Utc::now()) {
            return Err(ZoneError::Expired);
        }

        self.repo.set_uploads_locked(zone.id, locked).await?;

        self.events.publish(
            zone.id,
            ZoneEvent::ZoneLockState {
                zone_id: zone.id,
                uploads_locked: locked,
                updated_by: zone.owner_username,
            },
        );

        Ok(locked)
    }

    /// Extend the zone's expiry by `extra_hours`. Owner only.
    ///
    /// The total lifetime cap is enforced against the persisted expiry via
    /// compare-and-set, so concurrent extends cannot overshoot it.
    ///
    /// # Errors
    ///
    /// `InvalidDuration`, `NotFound`, `NotOwner`, `Expired`,
    /// `LifetimeLimitExceeded` (with the remaining allowance), or
    /// `Conflict` if the retries are exhausted.
    pub async fn extend_zone(
        &self,
        zone_id: Uuid,
        token: &OwnerToken,
        extra_hours: i64,
    ) -> Result<DateTime<Utc>, ZoneError> {
        if !(MIN_DURATION_HOURS..=MAX_DURATION_HOURS).contains(&extra_hours) {
            return Err(ZoneError::InvalidDuration {
                min: MIN_DURATION_HOURS,
                max: MAX_DURATION_HOURS,
            });
        }

        let mut zone = self.owned_zone(zone_id, token).await?;
        let requested = Duration::hours(extra_hours);
        let max_total = Duration::hours(MAX_TOTAL_LIFETIME_HOURS);

        for _ in 0..MAX_EXTEND_ATTEMPTS {
            if zone.is_expired_at(Utc::now()) {
                return Err(ZoneError::Expired);
            }

            let lifetime = zone.lifetime();
            if lifetime + requested > max_total {
                let remaining = max_total - lifetime;
                return Err(ZoneError::LifetimeLimitExceeded {
                    remaining_minutes: remaining.num_minutes().max(0),
                });
            }

            let new_expiry = zone.expires_at + requested;
            if self
                .repo
                .extend_expiry_if_unchanged(zone.id, zone.expires_at, new_expiry)
                .await?
            {
                self.events.publish(
                    zone.id,
                    ZoneEvent::ZoneExtended {
                        zone_id: zone.id,
                        expires_at: new_expiry,
                        extra_hours,
                        extended_by: zone.owner_username,
                    },
                );
                return Ok(new_expiry);
            }

            // Lost the race against a concurrent extend: re-read and
            // re-check the cap against the fresh expiry.
            zone = self.owned_zone(zone_id, token).await?;
        }

        Err(ZoneError::Conflict)
    }

    /// Kick a username from the zone. Owner only; broadcasts the kick.
    ///
    /// # Errors
    ///
    /// `NotFound`, `NotOwner`, `CannotKickOwner`, or `SessionNotFound`.
    pub async fn kick_user(
        &self,
        zone_id: Uuid,
        token: &OwnerToken,
        target_username: &str,
    ) -> Result<(), ZoneError> {
        let target = required(target_username, "username")?;
        let zone = self.owned_zone(zone_id, token).await?;

        if target == zone.owner_username {
            return Err(ZoneError::CannotKickOwner);
        }

        let session = self
            .repo
            .find_session(zone.id, target)
            .await?
            .ok_or(ZoneError::SessionNotFound)?;

        self.repo.mark_session_kicked(session.id).await?;

        self.events.publish(
            zone.id,
            ZoneEvent::UserKicked {
                zone_id: zone.id,
                username: target.to_string(),
            },
        );

        Ok(())
    }

    /// Verify the capability for an explicit owner delete.
    ///
    /// Expiry is deliberately not checked: an owner may always clean up,
    /// even after the zone has lapsed. The caller runs the cascading
    /// cleanup after this succeeds.
    ///
    /// # Errors
    ///
    /// `NotFound` or `NotOwner`.
    pub async fn authorize_delete(&self, zone_id: Uuid, token: &OwnerToken) -> Result<(), ZoneError> {
        self.owned_zone(zone_id, token).await.map(|_| ())
    }

    /// Zone that exists, is not soft-deleted, and has not expired.
    async fn live_zone(&self, zone_id: Uuid) -> Result<Zone, ZoneError> {
        let zone = self
            .repo
            .find_by_id(zone_id)
            .await?
            .filter(|z| !z.is_deleted)
            .ok_or(ZoneError::NotFound)?;

        if zone.is_expired_at(Utc::now()) {
            return Err(ZoneError::Expired);
        }
        Ok(zone)
    }

    /// Zone that exists, is not soft-deleted, and whose owner token matches.
    async fn owned_zone(&self, zone_id: Uuid, token: &OwnerToken) -> Result<Zone, ZoneError> {
        let zone = self
            .repo
            .find_by_id(zone_id)
            .await?
            .filter(|z| !z.is_deleted)
            .ok_or(ZoneError::NotFound)?;

        if !token.matches_hash(&zone.owner_token_hash) {
            return Err(ZoneError::NotOwner);
        }
        Ok(zone)
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ZoneError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ZoneError::MissingField(field));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Mock repository for testing.
    #[derive(Default)]
    struct MockZoneRepository {
        zones: Mutex<HashMap<Uuid, Zone>>,
        sessions: Mutex<Vec<UserSession>>,
        /// Number of upcoming compare-and-set calls that should fail, to
        /// simulate a concurrent extend winning the race.
        cas_failures: AtomicU32,
    }

    impl MockZoneRepository {
        fn new() -> Self {
            Self::default()
        }

        fn put_zone(&self, zone: Zone) {
            self.zones.lock().unwrap().insert(zone.id, zone);
        }

        fn zone(&self, id: Uuid) -> Zone {
            self.zones.lock().unwrap().get(&id).cloned().unwrap()
        }
    }

    impl ZoneRepository for MockZoneRepository {
        async fn insert_zone(&self, input: NewZone) -> Result<Zone, ZoneError> {
            let zone = Zone {
                id: input.id,
                name: input.name,
                password_hash: input.password_hash,
                owner_username: input.owner_username,
                owner_token_hash: input.owner_token_hash,
                created_at: input.created_at,
                expires_at: input.expires_at,
                uploads_locked: false,
                is_deleted: false,
            };
            self.zones.lock().unwrap().insert(zone.id, zone.clone());
            Ok(zone)
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Zone>, ZoneError> {
            Ok(self.zones.lock().unwrap().get(&id).cloned())
        }

        async fn find_latest_by_name(&self, name: &str) -> Result<Option<Zone>, ZoneError> {
            Ok(self
                .zones
                .lock()
                .unwrap()
                .values()
                .filter(|z| z.name == name && !z.is_deleted)
                .max_by_key(|z| z.created_at)
                .cloned())
        }

        async fn set_uploads_locked(&self, id: Uuid, locked: bool) -> Result<(), ZoneError> {
            if let Some(zone) = self.zones.lock().unwrap().get_mut(&id) {
                zone.uploads_locked = locked;
            }
            Ok(())
        }

        async fn extend_expiry_if_unchanged(
            &self,
            id: Uuid,
            expected: DateTime<Utc>,
            new_expiry: DateTime<Utc>,
        ) -> Result<bool, ZoneError> {
            if self
                .cas_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Ok(false);
            }
            let mut zones = self.zones.lock().unwrap();
            let Some(zone) = zones.get_mut(&id) else {
                return Ok(false);
            };
            if zone.expires_at != expected {
                return Ok(false);
            }
            zone.expires_at = new_expiry;
            Ok(true)
        }

        async fn find_session(
            &self,
            zone_id: Uuid,
            username: &str,
        ) -> Result<Option<UserSession>, ZoneError> {
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .iter()
                .find(|s| s.zone_id == zone_id && s.username == username)
                .cloned())
        }

        async fn insert_session(
            &self,
            zone_id: Uuid,
            username: &str,
            now: DateTime<Utc>,
        ) -> Result<UserSession, ZoneError> {
            let session = UserSession {
                id: Uuid::new_v4(),
                zone_id,
                username: username.to_string(),
                joined_at: now,
                last_seen_at: now,
                is_kicked: false,
            };
            self.sessions.lock().unwrap().push(session.clone());
            Ok(session)
        }

        async fn touch_session(&self, session_id: Uuid, now: DateTime<Utc>) -> Result<(), ZoneError> {
            for session in self.sessions.lock().unwrap().iter_mut() {
                if session.id == session_id {
                    session.last_seen_at = now;
                }
            }
            Ok(())
        }

        async fn mark_session_kicked(&self, session_id: Uuid) -> Result<(), ZoneError> {
            for session in self.sessions.lock().unwrap().iter_mut() {
                if session.id == session_id {
                    session.is_kicked = true;
                }
            }
            Ok(())
        }

        async fn list_batches(&self, _zone_id: Uuid) -> Result<Vec<BatchWithFiles>, ZoneError> {
            Ok(Vec::new())
        }
    }

    /// Event sink that records every published event.
    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(Uuid, ZoneEvent)>>,
    }

    impl EventSink for RecordingSink {
        fn publish(&self, zone_id: Uuid, event: ZoneEvent) {
            self.events.lock().unwrap().push((zone_id, event));
        }
    }

    fn service_with(
        repo: Arc<MockZoneRepository>,
        sink: Arc<RecordingSink>,
    ) -> ZoneService<MockZoneRepository> {
        ZoneService::new(repo, sink)
    }

    async fn create_demo_zone(
        service: &ZoneService<MockZoneRepository>,
        duration_hours: i64,
    ) -> (ZoneSummary, OwnerToken) {
        service
            .create_zone(CreateZoneInput {
                name: "demo".to_string(),
                password: "secret123".to_string(),
                duration_hours,
                owner_username: "alice".to_string(),
            })
            .await
            .expect("zone creation should succeed")
    }

    #[tokio::test]
    async fn test_create_zone_returns_token_and_owner_session() {
        let repo = Arc::new(MockZoneRepository::new());
        let service = service_with(repo.clone(), Arc::new(RecordingSink::default()));

        let (summary, token) = create_demo_zone(&service, 1).await;

        assert_eq!(summary.name, "demo");
        assert_eq!(summary.owner_username, "alice");
        assert!(!token.expose().is_empty());

        let zone = repo.zone(summary.id);
        assert_eq!(zone.lifetime(), Duration::hours(1));
        assert!(zone.lifetime() <= Duration::hours(MAX_TOTAL_LIFETIME_HOURS));
        // Only hashes are stored.
        assert_ne!(zone.password_hash, "secret123");
        assert_eq!(zone.owner_token_hash, token.hash());

        let session = repo.find_session(zone.id, "alice").await.unwrap();
        assert!(session.is_some());
    }

    #[tokio::test]
    async fn test_create_zone_invalid_duration() {
        let service = service_with(
            Arc::new(MockZoneRepository::new()),
            Arc::new(RecordingSink::default()),
        );

        for hours in [0, -1, 6, 24] {
            let result = service
                .create_zone(CreateZoneInput {
                    name: "demo".to_string(),
                    password: "secret123".to_string(),
                    duration_hours: hours,
                    owner_username: "alice".to_string(),
                })
                .await;
            assert!(matches!(result, Err(ZoneError::InvalidDuration { .. })));
        }
    }

    #[tokio::test]
    async fn test_create_zone_missing_fields() {
        let service = service_with(
            Arc::new(MockZoneRepository::new()),
            Arc::new(RecordingSink::default()),
        );

        let result = service
            .create_zone(CreateZoneInput {
                name: "  ".to_string(),
                password: "secret123".to_string(),
                duration_hours: 1,
                owner_username: "alice".to_string(),
            })
            .await;
        assert!(matches!(result, Err(ZoneError::MissingField("name"))));

        let result = service
            .create_zone(CreateZoneInput {
                name: "demo".to_string(),
                password: String::new(),
                duration_hours: 1,
                owner_username: "alice".to_string(),
            })
            .await;
        assert!(matches!(result, Err(ZoneError::MissingField("password"))));
    }

    #[tokio::test]
    async fn test_join_zone_with_correct_and_wrong_password() {
        let repo = Arc::new(MockZoneRepository::new());
        let service = service_with(repo, Arc::new(RecordingSink::default()));

        let (summary, _token) = create_demo_zone(&service, 1).await;

        let (joined, session) = service
            .join_zone("demo", "secret123", "bob")
            .await
            .expect("join should succeed");
        assert_eq!(joined.id, summary.id);
        assert_eq!(session.username, "bob");

        let result = service.join_zone("demo", "wrong", "bob").await;
        assert!(matches!(result, Err(ZoneError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_join_zone_not_found() {
        let service = service_with(
            Arc::new(MockZoneRepository::new()),
            Arc::new(RecordingSink::default()),
        );
        let result = service.join_zone("nowhere", "pw", "bob").await;
        assert!(matches!(result, Err(ZoneError::NotFound)));
    }

    #[tokio::test]
    async fn test_join_zone_expired() {
        let repo = Arc::new(MockZoneRepository::new());
        let service = service_with(repo.clone(), Arc::new(RecordingSink::default()));

        let now = Utc::now();
        repo.put_zone(Zone {
            id: Uuid::new_v4(),
            name: "old".to_string(),
            password_hash: hash_password("pw").unwrap(),
            owner_username: "alice".to_string(),
            owner_token_hash: String::new(),
            created_at: now - Duration::hours(3),
            expires_at: now - Duration::hours(1),
            uploads_locked: false,
            is_deleted: false,
        });

        let result = service.join_zone("old", "pw", "bob").await;
        assert!(matches!(result, Err(ZoneError::Expired)));
    }

    #[tokio::test]
    async fn test_join_resolves_name_collision_to_newest_zone() {
        let repo = Arc::new(MockZoneRepository::new());
        let service = service_with(repo.clone(), Arc::new(RecordingSink::default()));

        let now = Utc::now();
        let older = Uuid::new_v4();
        let newer = Uuid::new_v4();
        for (id, age_hours, password) in [(older, 2, "oldpw"), (newer, 0, "newpw")] {
            repo.put_zone(Zone {
                id,
                name: "shared".to_string(),
                password_hash: hash_password(password).unwrap(),
                owner_username: "alice".to_string(),
                owner_token_hash: String::new(),
                created_at: now - Duration::hours(age_hours),
                expires_at: now + Duration::hours(1),
                uploads_locked: false,
                is_deleted: false,
            });
        }

        let (joined, _) = service
            .join_zone("shared", "newpw", "bob")
            .await
            .expect("join should resolve to the newest zone");
        assert_eq!(joined.id, newer);

        // The older zone's password no longer opens the name.
        let result = service.join_zone("shared", "oldpw", "bob").await;
        assert!(matches!(result, Err(ZoneError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_get_zone_stamps_last_seen() {
        let repo = Arc::new(MockZoneRepository::new());
        let service = service_with(repo, Arc::new(RecordingSink::default()));

        let (summary, _token) = create_demo_zone(&service, 2).await;
        service.join_zone("demo", "secret123", "bob").await.unwrap();

        let first = service
            .get_zone(summary.id, Some("bob"))
            .await
            .expect("get should succeed");
        let first_seen = first.user_last_seen_at.expect("session exists");

        let second = service.get_zone(summary.id, Some("bob")).await.unwrap();
        let second_seen = second.user_last_seen_at.expect("session exists");
        assert!(second_seen >= first_seen);

        // No username, no marker.
        let anonymous = service.get_zone(summary.id, None).await.unwrap();
        assert!(anonymous.user_last_seen_at.is_none());
    }

    #[tokio::test]
    async fn test_kick_then_kicked_user_is_barred() {
        let repo = Arc::new(MockZoneRepository::new());
        let sink = Arc::new(RecordingSink::default());
        let service = service_with(repo, sink.clone());

        let (summary, token) = create_demo_zone(&service, 2).await;
        service.join_zone("demo", "secret123", "bob").await.unwrap();

        service
            .kick_user(summary.id, &token, "bob")
            .await
            .expect("kick should succeed");

        // bob is out, of everything.
        assert!(matches!(
            service.get_zone(summary.id, Some("bob")).await,
            Err(ZoneError::Kicked)
        ));
        assert!(matches!(
            service.join_zone("demo", "secret123", "bob").await,
            Err(ZoneError::Kicked)
        ));
        assert!(matches!(
            service.authorize_channel(summary.id, "bob").await,
            Err(ZoneError::Kicked)
        ));

        // alice still gets in.
        assert!(service.get_zone(summary.id, Some("alice")).await.is_ok());

        let events = sink.events.lock().unwrap();
        assert!(events.iter().any(|(zone_id, event)| {
            *zone_id == summary.id
                && matches!(event, ZoneEvent::UserKicked { username, .. } if username == "bob")
        }));
    }

    #[tokio::test]
    async fn test_kick_owner_and_unknown_session() {
        let service = service_with(
            Arc::new(MockZoneRepository::new()),
            Arc::new(RecordingSink::default()),
        );
        let (summary, token) = create_demo_zone(&service, 2).await;

        assert!(matches!(
            service.kick_user(summary.id, &token, "alice").await,
            Err(ZoneError::CannotKickOwner)
        ));
        assert!(matches!(
            service.kick_user(summary.id, &token, "stranger").await,
            Err(ZoneError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_kick_requires_owner_token() {
        let service = service_with(
            Arc::new(MockZoneRepository::new()),
            Arc::new(RecordingSink::default()),
        );
        let (summary, _token) = create_demo_zone(&service, 2).await;

        let result = service
            .kick_user(summary.id, &OwnerToken::generate(), "bob")
            .await;
        assert!(matches!(result, Err(ZoneError::NotOwner)));
    }

    #[tokio::test]
    async fn test_set_uploads_locked_publishes_event() {
        let repo = Arc::new(MockZoneRepository::new());
        let sink = Arc::new(RecordingSink::default());
        let service = service_with(repo.clone(), sink.clone());

        let (summary, token) = create_demo_zone(&service, 2).await;

        let locked = service
            .set_uploads_locked(summary.id, &token, true)
            .await
            .expect("lock should succeed");
        assert!(locked);
        assert!(repo.zone(summary.id).uploads_locked);

        let events = sink.events.lock().unwrap();
        assert!(events.iter().any(|(_, event)| matches!(
            event,
            ZoneEvent::ZoneLockState { uploads_locked: true, .. }
        )));
    }

    #[tokio::test]
    async fn test_set_uploads_locked_wrong_token() {
        let service = service_with(
            Arc::new(MockZoneRepository::new()),
            Arc::new(RecordingSink::default()),
        );
        let (summary, _token) = create_demo_zone(&service, 2).await;

        let result = service
            .set_uploads_locked(summary.id, &OwnerToken::generate(), true)
            .await;
        assert!(matches!(result, Err(ZoneError::NotOwner)));
    }

    #[tokio::test]
    async fn test_extend_zone_moves_expiry_by_exactly_extra_hours() {
        let repo = Arc::new(MockZoneRepository::new());
        let sink = Arc::new(RecordingSink::default());
        let service = service_with(repo.clone(), sink.clone());

        let (summary, token) = create_demo_zone(&service, 2).await;
        let before = repo.zone(summary.id).expires_at;

        let new_expiry = service
            .extend_zone(summary.id, &token, 3)
            .await
            .expect("extend should succeed");

        assert_eq!(new_expiry, before + Duration::hours(3));
        assert_eq!(repo.zone(summary.id).expires_at, new_expiry);
        assert!(repo.zone(summary.id).lifetime() <= Duration::hours(MAX_TOTAL_LIFETIME_HOURS));

        let events = sink.events.lock().unwrap();
        assert!(events.iter().any(|(_, event)| matches!(
            event,
            ZoneEvent::ZoneExtended { extra_hours: 3, .. }
        )));
    }

    #[tokio::test]
    async fn test_extend_zone_lifetime_cap() {
        let repo = Arc::new(MockZoneRepository::new());
        let service = service_with(repo.clone(), Arc::new(RecordingSink::default()));

        // 5h initial + 4h = 9h total lifetime.
        let (summary, token) = create_demo_zone(&service, 5).await;
        service.extend_zone(summary.id, &token, 4).await.unwrap();
        assert_eq!(repo.zone(summary.id).lifetime(), Duration::hours(9));

        // 4 more hours would make 13h: rejected, 1h allowance reported.
        let result = service.extend_zone(summary.id, &token, 4).await;
        match result {
            Err(ZoneError::LifetimeLimitExceeded { remaining_minutes }) => {
                assert_eq!(remaining_minutes, 60);
            }
            other => panic!("expected LifetimeLimitExceeded, got {other:?}"),
        }

        // 1 more hour lands exactly on the cap.
        service.extend_zone(summary.id, &token, 1).await.unwrap();
        assert_eq!(
            repo.zone(summary.id).lifetime(),
            Duration::hours(MAX_TOTAL_LIFETIME_HOURS)
        );

        // And nothing further fits.
        let result = service.extend_zone(summary.id, &token, 1).await;
        match result {
            Err(ZoneError::LifetimeLimitExceeded { remaining_minutes }) => {
                assert_eq!(remaining_minutes, 0);
            }
            other => panic!("expected LifetimeLimitExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_extend_zone_invalid_hours_and_wrong_token() {
        let service = service_with(
            Arc::new(MockZoneRepository::new()),
            Arc::new(RecordingSink::default()),
        );
        let (summary, token) = create_demo_zone(&service, 2).await;

        for hours in [0, 6] {
            assert!(matches!(
                service.extend_zone(summary.id, &token, hours).await,
                Err(ZoneError::InvalidDuration { .. })
            ));
        }

        assert!(matches!(
            service
                .extend_zone(summary.id, &OwnerToken::generate(), 1)
                .await,
            Err(ZoneError::NotOwner)
        ));
    }

    #[tokio::test]
    async fn test_extend_zone_retries_after_cas_conflict() {
        let repo = Arc::new(MockZoneRepository::new());
        let service = service_with(repo.clone(), Arc::new(RecordingSink::default()));

        let (summary, token) = create_demo_zone(&service, 2).await;
        repo.cas_failures.store(1, Ordering::SeqCst);

        let new_expiry = service
            .extend_zone(summary.id, &token, 1)
            .await
            .expect("extend should succeed after one conflict");
        assert_eq!(repo.zone(summary.id).expires_at, new_expiry);
    }

    #[tokio::test]
    async fn test_extend_zone_gives_up_after_persistent_conflicts() {
        let repo = Arc::new(MockZoneRepository::new());
        let service = service_with(repo.clone(), Arc::new(RecordingSink::default()));

        let (summary, token) = create_demo_zone(&service, 2).await;
        repo.cas_failures.store(u32::MAX, Ordering::SeqCst);

        let result = service.extend_zone(summary.id, &token, 1).await;
        assert!(matches!(result, Err(ZoneError::Conflict)));
    }

    #[tokio::test]
    async fn test_authorize_delete() {
        let repo = Arc::new(MockZoneRepository::new());
        let service = service_with(repo.clone(), Arc::new(RecordingSink::default()));

        let (summary, token) = create_demo_zone(&service, 1).await;

        assert!(matches!(
            service
                .authorize_delete(summary.id, &OwnerToken::generate())
                .await,
            Err(ZoneError::NotOwner)
        ));
        service.authorize_delete(summary.id, &token).await.unwrap();

        // Deleting an already-expired zone is still allowed.
        {
            let mut zones = repo.zones.lock().unwrap();
            zones.get_mut(&summary.id).unwrap().expires_at = Utc::now() - Duration::hours(1);
        }
        service.authorize_delete(summary.id, &token).await.unwrap();
    }

    #[tokio::test]
    async fn test_soft_deleted_zone_is_not_served() {
        let repo = Arc::new(MockZoneRepository::new());
        let service = service_with(repo.clone(), Arc::new(RecordingSink::default()));

        let (summary, _token) = create_demo_zone(&service, 1).await;
        {
            let mut zones = repo.zones.lock().unwrap();
            zones.get_mut(&summary.id).unwrap().is_deleted = true;
        }

        assert!(matches!(
            service.get_zone(summary.id, None).await,
            Err(ZoneError::NotFound)
        ));
        assert!(matches!(
            service.join_zone("demo", "secret123", "bob").await,
            Err(ZoneError::NotFound)
        ));
    }
}
