//! Session model and status machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// STATUS
// =============================================================================

/// Why a session is (or is not) running
///
/// Discriminants are the stored status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    NotStarted = 0,
    TargetReached = 1,
    Running = 2,
    StoppedByUser = 3,
    StoppedInsufficientMainBalance = 4,
    StoppedInsufficientSubWalletBalance = 5,
    StoppedOtherError = 6,
    StoppedSimulationError = 7,
}

impl SessionStatus {
    pub fn code(&self) -> i64 {
        *self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(SessionStatus::NotStarted),
            1 => Some(SessionStatus::TargetReached),
            2 => Some(SessionStatus::Running),
            3 => Some(SessionStatus::StoppedByUser),
            4 => Some(SessionStatus::StoppedInsufficientMainBalance),
            5 => Some(SessionStatus::StoppedInsufficientSubWalletBalance),
            6 => Some(SessionStatus::StoppedOtherError),
            7 => Some(SessionStatus::StoppedSimulationError),
            _ => None,
        }
    }

    /// True for every STOPPED_* variant
    pub fn is_stopped(&self) -> bool {
        matches!(
            self,
            SessionStatus::StoppedByUser
                | SessionStatus::StoppedInsufficientMainBalance
                | SessionStatus::StoppedInsufficientSubWalletBalance
                | SessionStatus::StoppedOtherError
                | SessionStatus::StoppedSimulationError
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::TargetReached => "target_reached",
            SessionStatus::Running => "running",
            SessionStatus::StoppedByUser => "stopped_by_user",
            SessionStatus::StoppedInsufficientMainBalance => "stopped_insufficient_main_balance",
            SessionStatus::StoppedInsufficientSubWalletBalance => {
                "stopped_insufficient_subwallet_balance"
            }
            SessionStatus::StoppedOtherError => "stopped_other_error",
            SessionStatus::StoppedSimulationError => "stopped_simulation_error",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// POOL KIND
// =============================================================================

/// The three mutually exclusive swap mechanisms a session can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    /// Constant-product AMM
    Amm,
    /// CPMM pools
    Cpmm,
    /// Concentrated liquidity
    Clmm,
}

impl PoolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolKind::Amm => "amm",
            PoolKind::Cpmm => "cpmm",
            PoolKind::Clmm => "clmm",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "amm" => Some(PoolKind::Amm),
            "cpmm" => Some(PoolKind::Cpmm),
            "clmm" => Some(PoolKind::Clmm),
            _ => None,
        }
    }
}

impl std::fmt::Display for PoolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// One user's volume configuration and progress for one target token
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,

    pub target_token: String,
    pub quote_token: String,

    pub main_wallet_public: String,
    /// base58 secret of the main wallet
    pub main_wallet_secret: String,
    pub sub_wallet_count: usize,
    /// Set once by the bootstrap batch, cleared only by a token change
    pub address_lookup_table: Option<String>,

    pub pool_kind: PoolKind,
    /// Buy size per cycle, in lamports
    pub principal_lamports: u64,
    pub target_volume: f64,

    pub volume_made: f64,
    pub worked_seconds: u64,
    /// Position into the wallet pool, always < pool size
    pub rotation_cursor: u64,

    pub status: SessionStatus,
    /// Whether the loop should keep going; status records why it stopped
    pub run_flag: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn target_reached(&self) -> bool {
        self.volume_made > self.target_volume
    }

    pub fn progress_percent(&self) -> f64 {
        if self.target_volume <= 0.0 {
            return 0.0;
        }
        (self.volume_made / self.target_volume * 100.0).min(100.0)
    }
}

/// Partial session update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub target_token: Option<String>,
    /// `Some(None)` clears the reference
    pub address_lookup_table: Option<Option<String>>,
    pub pool_kind: Option<PoolKind>,
    pub principal_lamports: Option<u64>,
    pub target_volume: Option<f64>,
    pub sub_wallet_count: Option<usize>,
    pub volume_made: Option<f64>,
    pub worked_seconds: Option<u64>,
    pub rotation_cursor: Option<u64>,
    pub status: Option<SessionStatus>,
    pub run_flag: Option<bool>,
}

impl SessionUpdate {
    /// Set a status and clear the run flag
    pub fn stop(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            run_flag: Some(false),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == SessionUpdate::default()
    }

    /// Apply onto an in-memory session
    pub fn apply_to(&self, session: &mut Session) {
        if let Some(token) = &self.target_token {
            session.target_token = token.clone();
        }
        if let Some(table) = &self.address_lookup_table {
            session.address_lookup_table = table.clone();
        }
        if let Some(kind) = self.pool_kind {
            session.pool_kind = kind;
        }
        if let Some(amount) = self.principal_lamports {
            session.principal_lamports = amount;
        }
        if let Some(target) = self.target_volume {
            session.target_volume = target;
        }
        if let Some(count) = self.sub_wallet_count {
            session.sub_wallet_count = count;
        }
        if let Some(volume) = self.volume_made {
            session.volume_made = volume;
        }
        if let Some(seconds) = self.worked_seconds {
            session.worked_seconds = seconds;
        }
        if let Some(cursor) = self.rotation_cursor {
            session.rotation_cursor = cursor;
        }
        if let Some(status) = self.status {
            session.status = status;
        }
        if let Some(flag) = self.run_flag {
            session.run_flag = flag;
        }
        session.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_round_trip() {
        for code in 0..8 {
            let status = SessionStatus::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert_eq!(SessionStatus::from_code(8), None);
        assert!(SessionStatus::StoppedSimulationError.is_stopped());
        assert!(!SessionStatus::TargetReached.is_stopped());
        assert!(!SessionStatus::Running.is_stopped());
    }

    #[test]
    fn test_pool_kind_parse() {
        assert_eq!(PoolKind::from_str("CLMM"), Some(PoolKind::Clmm));
        assert_eq!(PoolKind::from_str("orderbook"), None);
    }

    #[test]
    fn test_stop_update() {
        let update = SessionUpdate::stop(SessionStatus::StoppedByUser);
        assert_eq!(update.run_flag, Some(false));
        assert!(!update.is_empty());
        assert!(SessionUpdate::default().is_empty());
    }
}
