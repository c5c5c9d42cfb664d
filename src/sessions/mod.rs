//! Sessions
//!
//! - `types`: the session model and status machine
//! - `store`: the store contract the engine and scheduler consume
//! - `database`: SQLite implementation of the store
//! - `commands`: operator actions (start, stop, retarget, ...)

pub mod commands;
mod database;
mod store;
mod types;

pub use database::{NewSession, SqliteSessionStore};
pub use store::SessionStore;
pub use types::{PoolKind, Session, SessionStatus, SessionUpdate};
