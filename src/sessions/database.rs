//! SQLite-backed Session Store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use solana_sdk::signature::Signer;

use super::store::SessionStore;
use super::types::{PoolKind, Session, SessionStatus, SessionUpdate};
use crate::constants::SOL_MINT;
use crate::database::Database;
use crate::logger::{self, LogTag};
use crate::wallets::{encode_secret, resolve_wallet};

const SESSION_COLUMNS: &str = "session_id, user_id, target_token, quote_token, \
     main_wallet_public, main_wallet_secret, sub_wallet_count, address_lookup_table, \
     pool_kind, principal_lamports, target_volume, volume_made, worked_seconds, \
     rotation_cursor, status, run_flag, created_at, updated_at";

/// Fields needed to create a session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: String,
    pub target_token: String,
    pub main_wallet_secret: String,
    pub pool_kind: PoolKind,
    pub principal_lamports: u64,
    pub target_volume: f64,
    pub sub_wallet_count: usize,
}

#[derive(Clone)]
pub struct SqliteSessionStore {
    db: Database,
}

impl SqliteSessionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new session in NOT_STARTED with zeroed metrics
    pub fn create_session(&self, new: NewSession) -> Result<Session, String> {
        let main = resolve_wallet(&new.main_wallet_secret)?;
        let now = Utc::now();
        let session = Session {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: new.user_id,
            target_token: new.target_token,
            quote_token: SOL_MINT.to_string(),
            main_wallet_public: main.pubkey.to_string(),
            main_wallet_secret: encode_secret(&main.keypair),
            sub_wallet_count: new.sub_wallet_count,
            address_lookup_table: None,
            pool_kind: new.pool_kind,
            principal_lamports: new.principal_lamports,
            target_volume: new.target_volume,
            volume_made: 0.0,
            worked_seconds: 0,
            rotation_cursor: 0,
            status: SessionStatus::NotStarted,
            run_flag: false,
            created_at: now,
            updated_at: now,
        };

        self.db
            .connection()
            .execute(
                &format!(
                    "INSERT INTO sessions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                    SESSION_COLUMNS
                ),
                params![
                    session.session_id,
                    session.user_id,
                    session.target_token,
                    session.quote_token,
                    session.main_wallet_public,
                    session.main_wallet_secret,
                    session.sub_wallet_count as i64,
                    session.address_lookup_table,
                    session.pool_kind.as_str(),
                    session.principal_lamports as i64,
                    session.target_volume,
                    session.volume_made,
                    session.worked_seconds as i64,
                    session.rotation_cursor as i64,
                    session.status.code(),
                    session.run_flag,
                    session.created_at.to_rfc3339(),
                    session.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| format!("Failed to insert session: {}", e))?;

        logger::info(
            LogTag::Sessions,
            &format!(
                "Created session {} for user {} (token {}, main wallet {})",
                session.session_id,
                session.user_id,
                session.target_token,
                main.keypair.pubkey()
            ),
        );
        Ok(session)
    }

    /// All sessions, newest first; unreadable rows are logged and left out
    pub fn list_sessions(&self) -> Result<Vec<Session>, String> {
        let (sessions, _) = self.query_sessions(
            &format!(
                "SELECT {} FROM sessions ORDER BY created_at DESC",
                SESSION_COLUMNS
            ),
            Vec::new(),
        )?;
        Ok(sessions)
    }

    /// Sessions matching `sql`, plus the ids of rows that failed to parse
    fn query_sessions(
        &self,
        sql: &str,
        values: Vec<Value>,
    ) -> Result<(Vec<Session>, Vec<String>), String> {
        let conn = self.db.connection();
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| format!("Failed to prepare session query: {}", e))?;

        let rows = stmt
            .query_map(params_from_iter(values), row_to_raw)
            .map_err(|e| format!("Failed to query sessions: {}", e))?;

        let mut sessions = Vec::new();
        let mut malformed = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| format!("Failed to read session row: {}", e))?;
            let session_id = raw.session_id.clone();
            match raw.into_session() {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    logger::error(LogTag::Sessions, &format!("Skipping session row: {}", e));
                    malformed.push(session_id);
                }
            }
        }
        Ok((sessions, malformed))
    }

    /// Stop a session whose row cannot be parsed
    ///
    /// Writes the raw columns so it works whatever else in the row is broken.
    fn quarantine(&self, session_id: &str) -> Result<(), String> {
        self.db
            .connection()
            .execute(
                "UPDATE sessions SET status = ?1, run_flag = 0, updated_at = ?2 WHERE session_id = ?3",
                params![
                    SessionStatus::StoppedOtherError.code(),
                    Utc::now().to_rfc3339(),
                    session_id
                ],
            )
            .map_err(|e| format!("Failed to stop malformed session {}: {}", session_id, e))?;

        logger::warning(
            LogTag::Sessions,
            &format!(
                "Session {} marked {} (malformed row)",
                session_id,
                SessionStatus::StoppedOtherError
            ),
        );
        Ok(())
    }

    fn load_sync(&self, session_id: &str) -> Result<Session, String> {
        let raw = self
            .db
            .connection()
            .query_row(
                &format!("SELECT {} FROM sessions WHERE session_id = ?1", SESSION_COLUMNS),
                params![session_id],
                row_to_raw,
            )
            .optional()
            .map_err(|e| format!("Failed to load session {}: {}", session_id, e))?
            .ok_or_else(|| format!("Session {} not found", session_id))?;
        raw.into_session()
    }

    fn update_sync(&self, session_id: &str, update: &SessionUpdate) -> Result<(), String> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(token) = &update.target_token {
            sets.push("target_token = ?");
            values.push(Value::Text(token.clone()));
        }
        if let Some(table) = &update.address_lookup_table {
            sets.push("address_lookup_table = ?");
            values.push(match table {
                Some(address) => Value::Text(address.clone()),
                None => Value::Null,
            });
        }
        if let Some(kind) = update.pool_kind {
            sets.push("pool_kind = ?");
            values.push(Value::Text(kind.as_str().to_string()));
        }
        if let Some(amount) = update.principal_lamports {
            sets.push("principal_lamports = ?");
            values.push(Value::Integer(amount as i64));
        }
        if let Some(target) = update.target_volume {
            sets.push("target_volume = ?");
            values.push(Value::Real(target));
        }
        if let Some(count) = update.sub_wallet_count {
            sets.push("sub_wallet_count = ?");
            values.push(Value::Integer(count as i64));
        }
        if let Some(volume) = update.volume_made {
            sets.push("volume_made = ?");
            values.push(Value::Real(volume));
        }
        if let Some(seconds) = update.worked_seconds {
            sets.push("worked_seconds = ?");
            values.push(Value::Integer(seconds as i64));
        }
        if let Some(cursor) = update.rotation_cursor {
            sets.push("rotation_cursor = ?");
            values.push(Value::Integer(cursor as i64));
        }
        if let Some(status) = update.status {
            sets.push("status = ?");
            values.push(Value::Integer(status.code()));
        }
        if let Some(flag) = update.run_flag {
            sets.push("run_flag = ?");
            values.push(Value::Integer(flag as i64));
        }

        if sets.is_empty() {
            return Ok(());
        }

        sets.push("updated_at = ?");
        values.push(Value::Text(Utc::now().to_rfc3339()));
        values.push(Value::Text(session_id.to_string()));

        let sql = format!(
            "UPDATE sessions SET {} WHERE session_id = ?",
            sets.join(", ")
        );

        let changed = self
            .db
            .connection()
            .execute(&sql, params_from_iter(values))
            .map_err(|e| format!("Failed to update session {}: {}", session_id, e))?;

        if changed == 0 {
            return Err(format!("Session {} not found", session_id));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load_session(&self, session_id: &str) -> Result<Session, String> {
        self.load_sync(session_id)
    }

    async fn update_session(&self, session_id: &str, update: SessionUpdate) -> Result<(), String> {
        self.update_sync(session_id, &update)
    }

    async fn list_active_sessions(&self) -> Result<Vec<Session>, String> {
        let (sessions, malformed) = self.query_sessions(
            &format!(
                "SELECT {} FROM sessions WHERE run_flag = 1 ORDER BY created_at",
                SESSION_COLUMNS
            ),
            Vec::new(),
        )?;

        // One bad row must not hold back the healthy ones
        for session_id in malformed {
            if let Err(e) = self.quarantine(&session_id) {
                logger::error(LogTag::Sessions, &e);
            }
        }
        Ok(sessions)
    }
}

// =============================================================================
// ROW MAPPING
// =============================================================================

/// Row values before validation
struct RawSession {
    session_id: String,
    user_id: String,
    target_token: String,
    quote_token: String,
    main_wallet_public: String,
    main_wallet_secret: String,
    sub_wallet_count: i64,
    address_lookup_table: Option<String>,
    pool_kind: String,
    principal_lamports: i64,
    target_volume: f64,
    volume_made: f64,
    worked_seconds: i64,
    rotation_cursor: i64,
    status: i64,
    run_flag: bool,
    created_at: String,
    updated_at: String,
}

fn row_to_raw(row: &Row<'_>) -> rusqlite::Result<RawSession> {
    Ok(RawSession {
        session_id: row.get(0)?,
        user_id: row.get(1)?,
        target_token: row.get(2)?,
        quote_token: row.get(3)?,
        main_wallet_public: row.get(4)?,
        main_wallet_secret: row.get(5)?,
        sub_wallet_count: row.get(6)?,
        address_lookup_table: row.get(7)?,
        pool_kind: row.get(8)?,
        principal_lamports: row.get(9)?,
        target_volume: row.get(10)?,
        volume_made: row.get(11)?,
        worked_seconds: row.get(12)?,
        rotation_cursor: row.get(13)?,
        status: row.get(14)?,
        run_flag: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("Invalid timestamp '{}': {}", value, e))
}

impl RawSession {
    fn into_session(self) -> Result<Session, String> {
        let status = SessionStatus::from_code(self.status).ok_or_else(|| {
            format!(
                "Session {} has unknown status code {}",
                self.session_id, self.status
            )
        })?;
        let pool_kind = PoolKind::from_str(&self.pool_kind).ok_or_else(|| {
            format!(
                "Session {} has unknown pool kind '{}'",
                self.session_id, self.pool_kind
            )
        })?;

        Ok(Session {
            session_id: self.session_id,
            user_id: self.user_id,
            target_token: self.target_token,
            quote_token: self.quote_token,
            main_wallet_public: self.main_wallet_public,
            main_wallet_secret: self.main_wallet_secret,
            sub_wallet_count: self.sub_wallet_count.max(0) as usize,
            address_lookup_table: self.address_lookup_table.filter(|t| !t.is_empty()),
            pool_kind,
            principal_lamports: self.principal_lamports.max(0) as u64,
            target_volume: self.target_volume,
            volume_made: self.volume_made,
            worked_seconds: self.worked_seconds.max(0) as u64,
            rotation_cursor: self.rotation_cursor.max(0) as u64,
            status,
            run_flag: self.run_flag,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}
