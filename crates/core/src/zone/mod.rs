//! Zone lifecycle: creation, join, owner-gated mutations, expiry.

pub mod error;
pub mod service;
pub mod types;

pub use error::ZoneError;
pub use service::{ZoneRepository, ZoneService};
pub use types::{
    CreateZoneInput, MAX_DURATION_HOURS, MAX_TOTAL_LIFETIME_HOURS, MIN_DURATION_HOURS, NewZone,
    UserSession, Zone, ZoneDetail, ZoneSummary,
};
