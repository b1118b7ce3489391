//! Object storage gateway for file blobs.
//!
//! Vendor-agnostic via Apache OpenDAL: S3-compatible providers, Azure Blob,
//! or the local filesystem for development. File records reference blobs only
//! through the opaque storage key produced here.

pub mod config;
pub mod error;
pub mod service;

pub use config::{StorageConfig, StorageProvider};
pub use error::StorageError;
pub use service::{PresignedUrl, StorageService};
