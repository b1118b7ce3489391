//! Zone-scoped chat messages.
//!
//! Persisted and broadcast over the real-time channel; no UI surfaces this
//! subsystem, it exists at the API level only.

pub mod service;
pub mod types;

pub use service::{ChatRepository, ChatService, HISTORY_LIMIT};
pub use types::{ChatError, ChatMessage};
