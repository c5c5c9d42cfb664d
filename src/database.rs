//! SQLite storage shared by the wallet pool and the session store
//!
//! One connection guarded by a mutex. All statements are short, so callers
//! hold the lock only for the duration of a single query.

use chrono::Utc;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

use crate::logger::{self, LogTag};

/// Schema version for migrations
const SCHEMA_VERSION: u32 = 1;

// =============================================================================
// SCHEMA DEFINITIONS
// =============================================================================

const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Wallet pool entries; created once, never deleted
const SCHEMA_WALLET_POOL: &str = r#"
CREATE TABLE IF NOT EXISTS wallet_pool (
    idx INTEGER PRIMARY KEY,
    public_key TEXT NOT NULL UNIQUE,
    secret_key TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Volume sessions
const SCHEMA_SESSIONS: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    target_token TEXT NOT NULL,
    quote_token TEXT NOT NULL,

    -- Wallets
    main_wallet_public TEXT NOT NULL,
    main_wallet_secret TEXT NOT NULL,
    sub_wallet_count INTEGER NOT NULL,
    address_lookup_table TEXT,

    -- Configuration
    pool_kind TEXT NOT NULL DEFAULT 'amm',
    principal_lamports INTEGER NOT NULL,
    target_volume REAL NOT NULL,

    -- Metrics
    volume_made REAL NOT NULL DEFAULT 0,
    worked_seconds INTEGER NOT NULL DEFAULT 0,
    rotation_cursor INTEGER NOT NULL DEFAULT 0,

    -- Status
    status INTEGER NOT NULL DEFAULT 0,
    run_flag INTEGER NOT NULL DEFAULT 0,

    -- Timestamps
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_sessions_run_flag ON sessions(run_flag);
"#;

/// Cloneable handle to the database
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and apply the schema
    pub fn open(path: &Path) -> Result<Self, String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| format!("Failed to open database {}: {}", path.display(), e))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = memory;
            PRAGMA busy_timeout = 30000;
        ",
        )
        .map_err(|e| format!("Failed to set pragmas: {}", e))?;

        let db = Self::from_connection(conn)?;
        logger::info(
            LogTag::System,
            &format!(
                "Database ready at {} (schema v{})",
                path.display(),
                SCHEMA_VERSION
            ),
        );
        Ok(db)
    }

    /// In-memory database, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory()
            .map_err(|e| format!("Failed to open in-memory database: {}", e))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, String> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Lock the connection for one statement or a short transaction
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

fn init_schema(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(SCHEMA_VERSION_TABLE)
        .map_err(|e| format!("Failed to create version table: {}", e))?;

    let current_version: Option<u32> = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| format!("Failed to check schema version: {}", e))?;

    if current_version.map_or(true, |v| v < SCHEMA_VERSION) {
        conn.execute_batch(SCHEMA_WALLET_POOL)
            .map_err(|e| format!("Failed to create wallet_pool table: {}", e))?;

        conn.execute_batch(SCHEMA_SESSIONS)
            .map_err(|e| format!("Failed to create sessions table: {}", e))?;

        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
            params![SCHEMA_VERSION, Utc::now().to_rfc3339()],
        )
        .map_err(|e| format!("Failed to update schema version: {}", e))?;
    }

    Ok(())
}
