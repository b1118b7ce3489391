//! Cascading zone deletion and the expiry reaper.

pub mod service;

pub use service::{CleanupError, CleanupRepository, CleanupService};
