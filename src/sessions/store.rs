//! Session Store contract consumed by the engine and the scheduler

use async_trait::async_trait;

use super::types::{Session, SessionUpdate};

/// Single source of truth for session state
///
/// The engine reads before each iteration and writes after it. At most one
/// loop drives a given session, so writes are last-writer-wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_session(&self, session_id: &str) -> Result<Session, String>;

    async fn update_session(&self, session_id: &str, update: SessionUpdate) -> Result<(), String>;

    /// Sessions whose run flag is set
    async fn list_active_sessions(&self) -> Result<Vec<Session>, String>;
}
