//! `SeaORM` entity definitions.

pub mod chat_messages;
pub mod files;
pub mod upload_batches;
pub mod user_sessions;
pub mod zones;
