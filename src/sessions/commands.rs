//! Operator commands that change a session from outside the engine loop

use std::str::FromStr;

use solana_sdk::pubkey::Pubkey;

use super::database::{NewSession, SqliteSessionStore};
use super::store::SessionStore;
use super::types::{PoolKind, Session, SessionStatus, SessionUpdate};
use crate::config::with_config;
use crate::errors::{VolumeBotError, VolumeBotResult};
use crate::logger::{self, LogTag};

fn store_err(e: String) -> VolumeBotError {
    VolumeBotError::Store(e)
}

fn validate_mint(mint: &str) -> VolumeBotResult<()> {
    Pubkey::from_str(mint)
        .map(|_| ())
        .map_err(|e| VolumeBotError::InvalidInput(format!("Invalid token mint '{}': {}", mint, e)))
}

/// Create a session using the configured defaults for target, size and window
pub fn create_session(
    store: &SqliteSessionStore,
    user_id: &str,
    main_wallet_secret: &str,
    target_token: &str,
    pool_kind: PoolKind,
) -> VolumeBotResult<Session> {
    validate_mint(target_token)?;

    let defaults = with_config(|cfg| cfg.sessions.clone());
    store
        .create_session(NewSession {
            user_id: user_id.to_string(),
            target_token: target_token.to_string(),
            main_wallet_secret: main_wallet_secret.to_string(),
            pool_kind,
            principal_lamports: defaults.default_principal_lamports,
            target_volume: defaults.default_target_volume,
            sub_wallet_count: defaults.default_sub_wallet_count,
        })
        .map_err(VolumeBotError::Wallet)
}

/// Mark a session RUNNING; the scheduler picks it up on its next tick
pub async fn start_session(store: &dyn SessionStore, session_id: &str) -> VolumeBotResult<()> {
    let session = store.load_session(session_id).await.map_err(store_err)?;

    if session.target_reached() {
        return Err(VolumeBotError::InvalidInput(format!(
            "Session {} already reached its target ({:.2} / {:.2})",
            session_id, session.volume_made, session.target_volume
        )));
    }

    store
        .update_session(
            session_id,
            SessionUpdate {
                status: Some(SessionStatus::Running),
                run_flag: Some(true),
                ..Default::default()
            },
        )
        .await
        .map_err(store_err)?;

    logger::info(LogTag::Sessions, &format!("Session {} started", session_id));
    Ok(())
}

/// Stop a session; an iteration already in flight still completes
pub async fn stop_session(store: &dyn SessionStore, session_id: &str) -> VolumeBotResult<()> {
    store
        .update_session(session_id, SessionUpdate::stop(SessionStatus::StoppedByUser))
        .await
        .map_err(store_err)?;

    logger::info(LogTag::Sessions, &format!("Session {} stopped by user", session_id));
    Ok(())
}

pub async fn set_target_volume(
    store: &dyn SessionStore,
    session_id: &str,
    target_volume: f64,
) -> VolumeBotResult<()> {
    let (min, max) = with_config(|cfg| {
        (
            cfg.sessions.min_target_volume,
            cfg.sessions.max_target_volume,
        )
    });

    if !target_volume.is_finite() || target_volume < min || target_volume > max {
        return Err(VolumeBotError::InvalidInput(format!(
            "Target volume must be between {} and {}, got {}",
            min, max, target_volume
        )));
    }

    store
        .update_session(
            session_id,
            SessionUpdate {
                target_volume: Some(target_volume),
                ..Default::default()
            },
        )
        .await
        .map_err(store_err)
}

pub async fn set_principal_amount(
    store: &dyn SessionStore,
    session_id: &str,
    principal_lamports: u64,
) -> VolumeBotResult<()> {
    if principal_lamports == 0 {
        return Err(VolumeBotError::InvalidInput(
            "Principal amount must be greater than zero".to_string(),
        ));
    }

    store
        .update_session(
            session_id,
            SessionUpdate {
                principal_lamports: Some(principal_lamports),
                ..Default::default()
            },
        )
        .await
        .map_err(store_err)
}

pub async fn set_pool_kind(
    store: &dyn SessionStore,
    session_id: &str,
    pool_kind: PoolKind,
) -> VolumeBotResult<()> {
    store
        .update_session(
            session_id,
            SessionUpdate {
                pool_kind: Some(pool_kind),
                ..Default::default()
            },
        )
        .await
        .map_err(store_err)
}

/// Switch the target token and reset progress
///
/// Clears accumulated volume, worked time, rotation cursor and the lookup
/// table reference, so the next run bootstraps again.
pub async fn assign_target_token(
    store: &dyn SessionStore,
    session_id: &str,
    target_token: &str,
) -> VolumeBotResult<()> {
    validate_mint(target_token)?;

    store
        .update_session(
            session_id,
            SessionUpdate {
                target_token: Some(target_token.to_string()),
                address_lookup_table: Some(None),
                volume_made: Some(0.0),
                worked_seconds: Some(0),
                rotation_cursor: Some(0),
                status: Some(SessionStatus::NotStarted),
                run_flag: Some(false),
                ..Default::default()
            },
        )
        .await
        .map_err(store_err)?;

    logger::info(
        LogTag::Sessions,
        &format!("Session {} now targets {}", session_id, target_token),
    );
    Ok(())
}
