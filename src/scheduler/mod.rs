//! Scheduler
//!
//! Every `interval_secs` the scheduler lists sessions with the run flag set
//! and launches a loop for each one not already registered. Loops release
//! their registry slot when they exit.

mod registry;

pub use registry::{LoopGuard, LoopRegistry};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::engine::VolumeEngine;
use crate::logger::{self, LogTag};
use crate::sessions::{SessionStatus, SessionStore};

pub struct Scheduler {
    engine: Arc<VolumeEngine>,
    store: Arc<dyn SessionStore>,
    registry: LoopRegistry,
    interval: Duration,
}

impl Scheduler {
    pub fn new(engine: Arc<VolumeEngine>, store: Arc<dyn SessionStore>, interval: Duration) -> Self {
        Self {
            engine,
            store,
            registry: LoopRegistry::new(),
            interval,
        }
    }

    pub fn registry(&self) -> &LoopRegistry {
        &self.registry
    }

    /// Launch one control loop for `session_id`
    ///
    /// None when a loop for that session is already running.
    pub fn run_once(&self, session_id: &str) -> Option<JoinHandle<SessionStatus>> {
        let guard = self.registry.try_acquire(session_id)?;
        let engine = Arc::clone(&self.engine);

        logger::info(
            LogTag::Scheduler,
            &format!("Launching loop for session {}", session_id),
        );

        Some(tokio::spawn(async move {
            let status = engine.run_loop(guard.session_id()).await;
            drop(guard);
            status
        }))
    }

    /// One scheduling pass; returns the loops it launched
    pub async fn tick(&self) -> Vec<JoinHandle<SessionStatus>> {
        let sessions = match self.store.list_active_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                logger::warning(
                    LogTag::Scheduler,
                    &format!("Failed to list active sessions: {}", e),
                );
                return Vec::new();
            }
        };

        let launched: Vec<_> = sessions
            .iter()
            .filter_map(|session| self.run_once(&session.session_id))
            .collect();

        logger::debug(
            LogTag::Scheduler,
            &format!(
                "Tick: {} active sessions, {} launched, {} loops running",
                sessions.len(),
                launched.len(),
                self.registry.active_count()
            ),
        );

        launched
    }

    /// Tick until `shutdown` fires
    ///
    /// Loops already launched are left to the runtime; they stop at their
    /// next iteration boundary once the process exits or their flag clears.
    pub async fn run(&self, shutdown: Arc<Notify>) {
        logger::info(
            LogTag::Scheduler,
            &format!("Scheduler started (interval {}s)", self.interval.as_secs()),
        );

        loop {
            self.tick().await;

            tokio::select! {
                _ = shutdown.notified() => {
                    logger::info(
                        LogTag::Scheduler,
                        &format!(
                            "Scheduler shutting down with {} loops running",
                            self.registry.active_count()
                        ),
                    );
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GatewayConfig, RelayConfig, RpcConfig};
    use crate::database::Database;
    use crate::engine::EngineSettings;
    use crate::gateway::JupiterGateway;
    use crate::notifications::LogNotifier;
    use crate::relay::{FixedTipRouter, JitoRelay};
    use crate::rpc::SolanaRpc;
    use crate::sessions::{NewSession, PoolKind, SessionUpdate, SqliteSessionStore};
    use crate::wallets::{encode_secret, WalletPool};
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::signature::Keypair;

    /// Scheduler over an in-memory store; network collaborators point nowhere
    fn scheduler() -> (Scheduler, SqliteSessionStore) {
        let (scheduler, store, _db) = scheduler_with_db();
        (scheduler, store)
    }

    fn scheduler_with_db() -> (Scheduler, SqliteSessionStore, Database) {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteSessionStore::new(db.clone());

        let engine = VolumeEngine::new(
            Arc::new(store.clone()),
            Arc::new(SolanaRpc::new(&RpcConfig {
                url: "http://127.0.0.1:9".to_string(),
                ..RpcConfig::default()
            })),
            Arc::new(JupiterGateway::new(GatewayConfig::default()).unwrap()),
            Arc::new(JitoRelay::new(RelayConfig::default(), Box::new(FixedTipRouter(None))).unwrap()),
            Arc::new(LogNotifier),
            Arc::new(WalletPool::new(db.clone(), 100)),
            EngineSettings {
                idle_delay: Duration::ZERO,
                ..EngineSettings::default()
            },
        );

        (
            Scheduler::new(Arc::new(engine), Arc::new(store.clone()), Duration::from_millis(10)),
            store,
            db,
        )
    }

    /// A running session that has already passed its target, so its loop
    /// finishes without touching the network
    async fn finished_session(store: &SqliteSessionStore) -> String {
        let session = store
            .create_session(NewSession {
                user_id: "1".to_string(),
                target_token: Pubkey::new_unique().to_string(),
                main_wallet_secret: encode_secret(&Keypair::new()),
                pool_kind: PoolKind::Cpmm,
                principal_lamports: 1_000,
                target_volume: 100.0,
                sub_wallet_count: 4,
            })
            .unwrap();
        store
            .update_session(
                &session.session_id,
                SessionUpdate {
                    volume_made: Some(200.0),
                    status: Some(SessionStatus::Running),
                    run_flag: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        session.session_id
    }

    #[tokio::test]
    async fn test_tick_launches_and_loops_deregister() {
        let (scheduler, store) = scheduler();
        let id = finished_session(&store).await;

        let handles = scheduler.tick().await;
        assert_eq!(handles.len(), 1);
        for handle in handles {
            assert_eq!(handle.await.unwrap(), SessionStatus::TargetReached);
        }

        assert!(!scheduler.registry().is_active(&id));
        let session = store.load_session(&id).await.unwrap();
        assert!(!session.run_flag);

        // flag cleared, nothing left to launch
        assert!(scheduler.tick().await.is_empty());
    }

    #[tokio::test]
    async fn test_registered_session_is_not_relaunched() {
        let (scheduler, store) = scheduler();
        let id = finished_session(&store).await;

        let held = scheduler.registry().try_acquire(&id).unwrap();
        assert!(scheduler.tick().await.is_empty());
        assert!(scheduler.run_once(&id).is_none());

        drop(held);
        let handle = scheduler.run_once(&id).unwrap();
        assert_eq!(handle.await.unwrap(), SessionStatus::TargetReached);
    }

    /// A running session whose stored status code is unknown
    async fn unreadable_session(store: &SqliteSessionStore, db: &Database) -> String {
        let id = finished_session(store).await;
        db.connection()
            .execute(
                "UPDATE sessions SET status = 42 WHERE session_id = ?1",
                rusqlite::params![id],
            )
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_unreadable_session_does_not_block_others() {
        let (scheduler, store, db) = scheduler_with_db();
        let healthy = finished_session(&store).await;
        let broken = unreadable_session(&store, &db).await;

        let handles = scheduler.tick().await;
        assert_eq!(handles.len(), 1);
        for handle in handles {
            assert_eq!(handle.await.unwrap(), SessionStatus::TargetReached);
        }

        assert!(!store.load_session(&healthy).await.unwrap().run_flag);
        let stopped = store.load_session(&broken).await.unwrap();
        assert_eq!(stopped.status, SessionStatus::StoppedOtherError);
        assert!(!stopped.run_flag);
        assert!(scheduler.tick().await.is_empty());
    }

    #[tokio::test]
    async fn test_loop_on_unreadable_session_records_stop() {
        let (scheduler, store, db) = scheduler_with_db();
        let broken = unreadable_session(&store, &db).await;

        let handle = scheduler.run_once(&broken).unwrap();
        assert_eq!(handle.await.unwrap(), SessionStatus::StoppedOtherError);

        let stopped = store.load_session(&broken).await.unwrap();
        assert_eq!(stopped.status, SessionStatus::StoppedOtherError);
        assert!(!stopped.run_flag);
        assert!(!scheduler.registry().is_active(&broken));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (scheduler, _store) = scheduler();
        let shutdown = Arc::new(Notify::new());

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.notify_one();
        });

        tokio::time::timeout(Duration::from_secs(5), scheduler.run(shutdown))
            .await
            .unwrap();
    }
}
