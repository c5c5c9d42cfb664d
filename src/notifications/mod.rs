//! Notification sink
//!
//! Fire-and-forget messages to a session's user. Sinks log their own
//! failures and never report them back to the caller.

#[cfg(feature = "telegram")]
mod telegram;

#[cfg(feature = "telegram")]
pub use telegram::TelegramNotifier;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::with_config;
use crate::logger::{self, LogTag};
use crate::sessions::{Session, SessionStatus};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: &str, message: &str);
}

/// Writes notifications to the log only
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user_id: &str, message: &str) {
        logger::info(LogTag::Notify, &format!("[user {}] {}", user_id, message));
    }
}

/// Sink selected by `[notifications]`
pub fn notifier_from_config() -> Arc<dyn Notifier> {
    let (enabled, token, api_base) = with_config(|cfg| {
        (
            cfg.notifications.telegram_enabled,
            cfg.notifications.telegram_bot_token.clone(),
            cfg.notifications.telegram_api_base.clone(),
        )
    });

    #[cfg(feature = "telegram")]
    {
        if enabled {
            match TelegramNotifier::new(&api_base, &token) {
                Ok(notifier) => return Arc::new(notifier),
                Err(e) => {
                    logger::warning(
                        LogTag::Notify,
                        &format!("Telegram disabled, falling back to log sink: {}", e),
                    );
                }
            }
        }
    }

    #[cfg(not(feature = "telegram"))]
    {
        let _ = (token, api_base);
        if enabled {
            logger::warning(
                LogTag::Notify,
                "telegram_enabled is set but the binary was built without the telegram feature",
            );
        }
    }

    Arc::new(LogNotifier)
}

/// User-facing text for a session that stopped or finished
pub fn status_message(session: &Session, status: SessionStatus) -> String {
    let token = &session.target_token;
    match status {
        SessionStatus::TargetReached => format!(
            "Target volume reached for {}: {:.2} / {:.2}",
            token, session.volume_made, session.target_volume
        ),
        SessionStatus::StoppedInsufficientMainBalance => format!(
            "Volume bot stopped for {}: main wallet {} has less than the principal amount",
            token, session.main_wallet_public
        ),
        SessionStatus::StoppedInsufficientSubWalletBalance => format!(
            "Volume bot stopped for {}: a sub-wallet ran out of funds",
            token
        ),
        SessionStatus::StoppedSimulationError => format!(
            "Volume bot stopped for {}: transactions keep failing simulation, check the pool",
            token
        ),
        SessionStatus::StoppedOtherError => format!(
            "Volume bot stopped for {} after an unexpected error",
            token
        ),
        SessionStatus::StoppedByUser => format!("Volume bot stopped for {}", token),
        SessionStatus::Running => format!("Volume bot running for {}", token),
        SessionStatus::NotStarted => format!("Volume bot idle for {}", token),
    }
}
