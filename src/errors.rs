use thiserror::Error;

#[derive(Error, Debug)]
pub enum VolumeBotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Relay error: {0}")]
    Relay(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Session store error: {0}")]
    Store(String),

    #[error("Invalid session {session_id}: {reason}")]
    InvalidSession { session_id: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Transaction build failed: {0}")]
    Build(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout error: operation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },
}

impl VolumeBotError {
    /// Errors that clear up on their own; the engine skips the iteration
    pub fn is_recoverable(&self) -> bool {
        match self {
            VolumeBotError::Rpc(_) => true,
            VolumeBotError::Relay(_) => true,
            VolumeBotError::Gateway(_) => true,
            VolumeBotError::Store(_) => true,
            VolumeBotError::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Errors that end the session with STOPPED_OTHER_ERROR
    pub fn is_critical(&self) -> bool {
        match self {
            VolumeBotError::Config(_) => true,
            VolumeBotError::Wallet(_) => true,
            VolumeBotError::InvalidSession { .. } => true,
            VolumeBotError::Database(_) => true,
            _ => false,
        }
    }

    pub fn invalid_session(session_id: &str, reason: impl Into<String>) -> Self {
        VolumeBotError::InvalidSession {
            session_id: session_id.to_string(),
            reason: reason.into(),
        }
    }
}

pub type VolumeBotResult<T> = Result<T, VolumeBotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(VolumeBotError::Rpc("down".into()).is_recoverable());
        assert!(!VolumeBotError::Rpc("down".into()).is_critical());
        assert!(VolumeBotError::invalid_session("s1", "bad key").is_critical());
        assert!(VolumeBotError::Timeout { seconds: 20 }.is_recoverable());
        assert!(!VolumeBotError::Build("bad".into()).is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = VolumeBotError::invalid_session("s1", "empty main wallet");
        assert_eq!(err.to_string(), "Invalid session s1: empty main wallet");
    }
}
