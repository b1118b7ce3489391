//! Initial database migration.
//!
//! Creates the zone tables and their indexes. All child tables cascade on
//! zone deletion so the reaper's row purge can never leave orphans behind.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(ZONES_SQL).await?;
        db.execute_unprepared(UPLOAD_BATCHES_SQL).await?;
        db.execute_unprepared(FILES_SQL).await?;
        db.execute_unprepared(USER_SESSIONS_SQL).await?;
        db.execute_unprepared(CHAT_MESSAGES_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ZONES_SQL: &str = r"
CREATE TABLE zones (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    owner_username TEXT NOT NULL,
    owner_token_hash TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    expires_at TIMESTAMPTZ NOT NULL,
    uploads_locked BOOLEAN NOT NULL DEFAULT FALSE,
    is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
    CONSTRAINT zones_expiry_after_creation CHECK (expires_at > created_at)
);

-- Names are not unique; joins resolve collisions newest-first.
CREATE INDEX idx_zones_name_created ON zones (name, created_at DESC)
    WHERE is_deleted = FALSE;

-- Reaper scan.
CREATE INDEX idx_zones_expires_at ON zones (expires_at);
";

const UPLOAD_BATCHES_SQL: &str = r"
CREATE TABLE upload_batches (
    id UUID PRIMARY KEY,
    zone_id UUID NOT NULL REFERENCES zones(id) ON DELETE CASCADE,
    uploader_username TEXT NOT NULL,
    message TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_upload_batches_zone ON upload_batches (zone_id, created_at);
";

const FILES_SQL: &str = r"
CREATE TABLE files (
    id UUID PRIMARY KEY,
    zone_id UUID NOT NULL REFERENCES zones(id) ON DELETE CASCADE,
    batch_id UUID NOT NULL REFERENCES upload_batches(id) ON DELETE CASCADE,
    original_name TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    size_bytes BIGINT NOT NULL,
    uploaded_by TEXT NOT NULL,
    uploaded_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    storage_key TEXT NOT NULL
);

CREATE INDEX idx_files_zone ON files (zone_id);
CREATE INDEX idx_files_batch ON files (batch_id);
";

const USER_SESSIONS_SQL: &str = r"
CREATE TABLE user_sessions (
    id UUID PRIMARY KEY,
    zone_id UUID NOT NULL REFERENCES zones(id) ON DELETE CASCADE,
    username TEXT NOT NULL,
    joined_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    last_seen_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    is_kicked BOOLEAN NOT NULL DEFAULT FALSE,
    CONSTRAINT user_sessions_zone_username_unique UNIQUE (zone_id, username)
);
";

const CHAT_MESSAGES_SQL: &str = r"
CREATE TABLE chat_messages (
    id UUID PRIMARY KEY,
    zone_id UUID NOT NULL REFERENCES zones(id) ON DELETE CASCADE,
    username TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_chat_messages_zone ON chat_messages (zone_id, created_at);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS chat_messages CASCADE;
DROP TABLE IF EXISTS user_sessions CASCADE;
DROP TABLE IF EXISTS files CASCADE;
DROP TABLE IF EXISTS upload_batches CASCADE;
DROP TABLE IF EXISTS zones CASCADE;
";
