//! Presence tracking and real-time event fan-out.
//!
//! Entirely in-memory: each zone gets a broadcast channel and a membership
//! set keyed by physical connection, so the same username may be connected
//! from several tabs at once. Presence is approximate and built for UX, not
//! security. Delivery is best-effort, at-most-once per connection; clients
//! that fall behind reconcile with a full zone re-fetch.

pub mod events;
pub mod hub;

pub use events::{EventSink, ZoneEvent};
pub use hub::PresenceHub;
