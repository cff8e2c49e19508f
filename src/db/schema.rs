//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    // Step 1: Create tables without indexes (for new installs)
    sqlx::query(SCHEMA_TABLES_SQL).execute(pool).await?;

    // Step 2: Create indexes (after columns exist)
    sqlx::query(SCHEMA_INDEXES_SQL).execute(pool).await?;

    Ok(())
}

/// SQL for creating tables
const SCHEMA_TABLES_SQL: &str = r#"
-- One row per share. status is the DAG described in the spec:
-- uploading -> ready -> exhausted -> expired, with ready/uploading -> expired
-- as direct shortcuts. No backward transitions.
CREATE TABLE IF NOT EXISTS files (
    id TEXT PRIMARY KEY,
    share_id TEXT NOT NULL UNIQUE,

    encrypted_filename TEXT NOT NULL,
    encrypted_mime_type TEXT NOT NULL,
    salt TEXT NOT NULL,
    pbkdf2_iterations INTEGER NOT NULL CHECK (pbkdf2_iterations > 0),

    total_size INTEGER NOT NULL CHECK (total_size > 0),
    chunk_size INTEGER NOT NULL CHECK (chunk_size > 0),
    chunk_count INTEGER NOT NULL CHECK (chunk_count > 0),

    status TEXT NOT NULL DEFAULT 'uploading'
        CHECK (status IN ('uploading', 'ready', 'exhausted', 'expired')),
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    expires_at TEXT NOT NULL,
    last_downloaded_at TEXT,

    max_downloads INTEGER NOT NULL CHECK (max_downloads > 0),
    download_count INTEGER NOT NULL DEFAULT 0 CHECK (download_count >= 0),

    uploader_ip TEXT NOT NULL,
    deletion_token_hash TEXT,

    CHECK (download_count <= max_downloads)
);

-- Zero or more ciphertext chunks per file, keyed by position. A chunk row
-- may only be created while the parent file is `uploading`; it is deleted
-- (along with its blob) only by the Expiry Sweeper.
CREATE TABLE IF NOT EXISTS chunks (
    file_id TEXT NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    chunk_index INTEGER NOT NULL CHECK (chunk_index >= 0),
    storage_path TEXT NOT NULL,
    encrypted_size INTEGER NOT NULL CHECK (encrypted_size > 0),
    chunk_hash TEXT NOT NULL,
    uploaded_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),

    PRIMARY KEY (file_id, chunk_index)
);

-- Blobs whose deletion failed during a sweep. A separate janitorial pass
-- (out of scope for this repo) retries these without re-scanning file
-- state, since the owning file row is already gone by the time a row lands
-- here.
CREATE TABLE IF NOT EXISTS orphan_blobs (
    storage_path TEXT PRIMARY KEY,
    file_id TEXT NOT NULL,
    recorded_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    last_error TEXT
);
"#;

/// SQL for creating indexes
const SCHEMA_INDEXES_SQL: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_files_share_id ON files(share_id);
CREATE INDEX IF NOT EXISTS idx_files_status_expires ON files(status, expires_at);

CREATE INDEX IF NOT EXISTS idx_chunks_file_id ON chunks(file_id);
"#;
