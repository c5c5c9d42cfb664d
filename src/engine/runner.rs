use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use solana_sdk::address_lookup_table::AddressLookupTableAccount;
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address;
use tokio::time::sleep;

use super::bootstrap::bootstrap_session;
use super::distribution::{distributable_amount, draw_amounts, per_wallet_base, raw_volume};
use super::operations::{build_operation_set, OperationSet};
use super::sweep::{self, SweepReport};
use super::{EngineSettings, IterationOutcome, LoopState};
use crate::errors::{VolumeBotError, VolumeBotResult};
use crate::gateway::{PoolRef, SwapGateway};
use crate::logger::{self, LogTag};
use crate::notifications::{status_message, Notifier};
use crate::relay::{AtomicBatch, BatchRelay};
use crate::rpc::ChainClient;
use crate::sessions::{Session, SessionStatus, SessionStore, SessionUpdate};
use crate::wallets::{resolve_wallet, short_address, ResolvedWallet, WalletPool};

/// Whole seconds elapsed since `started`, rounded
fn elapsed_seconds(started: Instant) -> u64 {
    started.elapsed().as_secs_f64().round() as u64
}

pub struct VolumeEngine {
    store: Arc<dyn SessionStore>,
    chain: Arc<dyn ChainClient>,
    gateway: Arc<dyn SwapGateway>,
    relay: Arc<dyn BatchRelay>,
    notifier: Arc<dyn Notifier>,
    pool: Arc<WalletPool>,
    settings: EngineSettings,
}

impl VolumeEngine {
    pub fn new(
        store: Arc<dyn SessionStore>,
        chain: Arc<dyn ChainClient>,
        gateway: Arc<dyn SwapGateway>,
        relay: Arc<dyn BatchRelay>,
        notifier: Arc<dyn Notifier>,
        pool: Arc<WalletPool>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            chain,
            gateway,
            relay,
            notifier,
            pool,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // =========================================================================
    // LOOP
    // =========================================================================

    /// Iterate until the session finishes; returns the final status
    ///
    /// A cleared run flag is observed at the top of the next iteration, so an
    /// iteration already in flight always runs through submission.
    pub async fn run_loop(&self, session_id: &str) -> SessionStatus {
        let mut state = LoopState::default();

        logger::info(LogTag::Engine, &format!("Session {} loop started", session_id));

        loop {
            let outcome = self.run_iteration(session_id, &mut state).await;
            state.iterations += 1;

            match &outcome {
                IterationOutcome::Finished(status) => {
                    logger::info(
                        LogTag::Engine,
                        &format!(
                            "Session {} loop finished after {} iterations: {}",
                            session_id, state.iterations, status
                        ),
                    );
                    return *status;
                }
                IterationOutcome::Traded { status, .. } if outcome.is_terminal() => {
                    logger::info(
                        LogTag::Engine,
                        &format!(
                            "Session {} loop finished after {} iterations: {}",
                            session_id, state.iterations, status
                        ),
                    );
                    return *status;
                }
                IterationOutcome::Skipped(reason) => {
                    logger::warning(
                        LogTag::Engine,
                        &format!("Session {} iteration skipped: {}", session_id, reason),
                    );
                }
                other => {
                    logger::debug(
                        LogTag::Engine,
                        &format!("Session {} iteration: {:?}", session_id, other),
                    );
                }
            }

            sleep(self.settings.idle_delay).await;
        }
    }

    // =========================================================================
    // ITERATION
    // =========================================================================

    /// One pass of the control loop; never returns an error
    pub async fn run_iteration(&self, session_id: &str, state: &mut LoopState) -> IterationOutcome {
        let started = Instant::now();

        let session = match self.store.load_session(session_id).await {
            Ok(session) => session,
            Err(e) => {
                logger::error(
                    LogTag::Engine,
                    &format!("Failed to load session {}: {}", session_id, e),
                );
                if let Err(e) = self
                    .store
                    .update_session(session_id, SessionUpdate::stop(SessionStatus::StoppedOtherError))
                    .await
                {
                    logger::error(
                        LogTag::Engine,
                        &format!(
                            "Failed to record {} for session {}: {}",
                            SessionStatus::StoppedOtherError,
                            session_id,
                            e
                        ),
                    );
                }
                return IterationOutcome::Finished(SessionStatus::StoppedOtherError);
            }
        };

        if !session.run_flag {
            return IterationOutcome::Finished(session.status);
        }

        if session.target_reached() {
            logger::info(
                LogTag::Engine,
                &format!(
                    "Session {} reached its target ({:.2} / {:.2})",
                    session_id, session.volume_made, session.target_volume
                ),
            );
            return self.finish(&session, SessionStatus::TargetReached).await;
        }

        if session.status == SessionStatus::TargetReached {
            return self.finish(&session, SessionStatus::TargetReached).await;
        }

        let (main, pool) = match session_keys(&session) {
            Ok(keys) => keys,
            Err(e) if e.is_critical() => {
                logger::error(LogTag::Engine, &e.to_string());
                return self.finish(&session, SessionStatus::StoppedOtherError).await;
            }
            Err(e) => {
                self.record_progress(&session, started, SessionUpdate::default())
                    .await;
                return IterationOutcome::Skipped(e.to_string());
            }
        };

        let balance = match self.chain.get_balance(&main.pubkey).await {
            Ok(balance) => balance,
            Err(e) => {
                self.record_progress(&session, started, SessionUpdate::default())
                    .await;
                return IterationOutcome::Skipped(e);
            }
        };

        if balance < session.principal_lamports {
            logger::warning(
                LogTag::Engine,
                &format!(
                    "Session {}: main balance {} below principal {}",
                    session_id, balance, session.principal_lamports
                ),
            );
            return self
                .finish(&session, SessionStatus::StoppedInsufficientMainBalance)
                .await;
        }

        let lookup_table = match &session.address_lookup_table {
            None => return self.bootstrap(&session, &main, pool, started).await,
            Some(address) => match Pubkey::from_str(address) {
                Ok(table) => table,
                Err(e) => {
                    logger::error(
                        LogTag::Engine,
                        &format!("Session {} has a malformed lookup table {}: {}", session_id, address, e),
                    );
                    return self.finish(&session, SessionStatus::StoppedOtherError).await;
                }
            },
        };

        let sets = self.build_sets(&session, &main, pool, balance).await;
        if sets.is_empty() {
            logger::debug(
                LogTag::Engine,
                &format!("Session {}: nothing to trade this iteration", session_id),
            );
            self.record_progress(&session, started, SessionUpdate::default())
                .await;
            return IterationOutcome::Idle;
        }

        let blockhash = match self.chain.get_latest_blockhash().await {
            Ok(hash) => hash,
            Err(e) => {
                self.record_progress(&session, started, SessionUpdate::default())
                    .await;
                return IterationOutcome::Skipped(e);
            }
        };

        let session_table = match self.chain.get_lookup_table(&lookup_table).await {
            Ok(table) => table,
            Err(e) => {
                self.record_progress(&session, started, SessionUpdate::default())
                    .await;
                return IterationOutcome::Skipped(e);
            }
        };
        let route_tables = self.resolve_route_tables(&sets).await;

        // Stamp, sign and simulate each set on its own
        let mut transactions = Vec::with_capacity(sets.len());
        let mut traded_amounts = Vec::with_capacity(sets.len());
        for set in &sets {
            let mut tables = vec![session_table.clone()];
            tables.extend(
                set.route_tables
                    .iter()
                    .filter_map(|key| route_tables.get(key).cloned()),
            );

            let tx = match set.seal(&main.keypair, &tables, blockhash) {
                Ok(tx) => tx,
                Err(e) => {
                    logger::warning(LogTag::Engine, &e);
                    continue;
                }
            };

            match self.chain.simulate_transaction(&tx).await {
                Ok(()) => {
                    transactions.push(tx);
                    traded_amounts.push(set.amount);
                }
                Err(e) => {
                    logger::warning(
                        LogTag::Engine,
                        &format!(
                            "Session {}: set for wallet #{} failed simulation: {}",
                            session_id, set.wallet.index, e
                        ),
                    );
                }
            }
        }

        if transactions.is_empty() {
            state.consecutive_simulation_failures += 1;
            let consecutive = state.consecutive_simulation_failures;
            logger::warning(
                LogTag::Engine,
                &format!(
                    "Session {}: all {} sets failed simulation ({}/{})",
                    session_id,
                    sets.len(),
                    consecutive,
                    self.settings.max_consecutive_simulation_failures
                ),
            );

            if consecutive >= self.settings.max_consecutive_simulation_failures {
                return self
                    .finish(&session, SessionStatus::StoppedSimulationError)
                    .await;
            }
            self.record_progress(&session, started, SessionUpdate::default())
                .await;
            return IterationOutcome::SimulationFailed { consecutive };
        }
        state.consecutive_simulation_failures = 0;

        let participants = transactions.len();
        let landed = self
            .relay
            .submit_atomic(&main.keypair, AtomicBatch::new(transactions, blockhash))
            .await;

        if !landed {
            logger::warning(
                LogTag::Engine,
                &format!(
                    "Session {}: batch of {} sets did not land, metrics unchanged",
                    session_id, participants
                ),
            );
            self.record_progress(&session, started, SessionUpdate::default())
                .await;
            return IterationOutcome::SubmitFailed;
        }

        let volume_added = raw_volume(&traded_amounts) * self.settings.volume_unit_rate;
        let volume_made = session.volume_made + volume_added;
        let rotation_cursor = (session.rotation_cursor + participants as u64) % self.pool.pool_size();

        let mut update = SessionUpdate {
            volume_made: Some(volume_made),
            rotation_cursor: Some(rotation_cursor),
            ..Default::default()
        };
        let status = if volume_made > session.target_volume {
            update.status = Some(SessionStatus::TargetReached);
            update.run_flag = Some(false);
            SessionStatus::TargetReached
        } else {
            session.status
        };

        let mut updated = session.clone();
        update.apply_to(&mut updated);
        self.record_progress(&session, started, update).await;

        logger::info(
            LogTag::Engine,
            &format!(
                "Session {}: {} wallets traded, +{:.2} volume ({:.2} / {:.2}, {:.1}%)",
                session_id,
                participants,
                volume_added,
                volume_made,
                session.target_volume,
                updated.progress_percent()
            ),
        );

        if status == SessionStatus::TargetReached {
            self.notifier
                .notify(&updated.user_id, &status_message(&updated, status))
                .await;
        }

        IterationOutcome::Traded {
            participants,
            volume_added,
            status,
        }
    }

    // =========================================================================
    // FUND RECOVERY
    // =========================================================================

    /// Return what `count` pool wallets from `start` hold to the session's main wallet
    pub async fn sweep_session(
        &self,
        session_id: &str,
        start: u64,
        count: usize,
    ) -> VolumeBotResult<SweepReport> {
        let session = self
            .store
            .load_session(session_id)
            .await
            .map_err(VolumeBotError::Store)?;
        let (main, pool) = session_keys(&session)?;
        let wallets = self.pool.get_window(start, count, false);

        let report = sweep::sweep_wallets(
            self.chain.as_ref(),
            self.relay.as_ref(),
            &main.keypair,
            wallets,
            &pool.target_mint,
            self.settings.max_wallets_per_bundle,
        )
        .await?;

        logger::info(
            LogTag::Engine,
            &format!(
                "Session {}: swept {}/{} wallets, {} lamports and {} tokens back, {} failed",
                session_id, report.swept, report.scanned, report.lamports, report.tokens, report.failed
            ),
        );
        Ok(report)
    }

    /// Send `lamports` (everything above `reserve` when None) from the session's main wallet
    pub async fn withdraw(
        &self,
        session_id: &str,
        destination: &Pubkey,
        lamports: Option<u64>,
        reserve: u64,
    ) -> VolumeBotResult<u64> {
        let session = self
            .store
            .load_session(session_id)
            .await
            .map_err(VolumeBotError::Store)?;
        let (main, _) = session_keys(&session)?;

        sweep::withdraw(
            self.chain.as_ref(),
            self.relay.as_ref(),
            &main.keypair,
            destination,
            lamports,
            reserve,
        )
        .await
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    /// Window, amounts and quotes for every wallet that gets a non-zero amount
    async fn build_sets(
        &self,
        session: &Session,
        main: &ResolvedWallet,
        pool: PoolRef,
        balance: u64,
    ) -> Vec<OperationSet> {
        let window_size = session
            .sub_wallet_count
            .min(self.settings.max_wallets_per_bundle);
        let start = session.rotation_cursor % self.pool.pool_size();
        let wallets = self.pool.get_window(start, window_size, false);

        let distributable = distributable_amount(
            balance,
            session.principal_lamports,
            self.settings.reserve_margin_ratio,
        );
        let base = per_wallet_base(distributable, wallets.len());
        let amounts = {
            let mut rng = rand::thread_rng();
            draw_amounts(
                base,
                wallets.len(),
                self.settings.amount_factor_min,
                self.settings.amount_factor_max,
                &mut rng,
            )
        };

        logger::debug(
            LogTag::Engine,
            &format!(
                "Session {}: window #{}+{}, distributable {}, base {}",
                session.session_id,
                start,
                wallets.len(),
                distributable,
                base
            ),
        );

        // Quotes for the whole window go out together; order follows the window
        let tasks = wallets
            .into_iter()
            .zip(amounts)
            .filter(|(_, amount)| *amount > 0)
            .map(|(wallet, amount)| async move {
                let residual = self.residual_tokens(&wallet.pubkey(), &pool.target_mint).await;
                build_operation_set(
                    self.gateway.as_ref(),
                    pool,
                    &main.pubkey,
                    wallet,
                    amount,
                    residual,
                    self.settings.compute_budget,
                )
                .await
            });

        futures::future::join_all(tasks)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Target tokens a sub-wallet already holds; zero when unreadable or disabled
    async fn residual_tokens(&self, owner: &Pubkey, mint: &Pubkey) -> u64 {
        if !self.settings.sell_residual_tokens {
            return 0;
        }
        let account = get_associated_token_address(owner, mint);
        match self.chain.get_token_account(&account).await {
            Ok(amount) => amount.unwrap_or(0),
            Err(e) => {
                logger::debug(
                    LogTag::Engine,
                    &format!("Token balance of {} unavailable: {}", short_address(owner), e),
                );
                0
            }
        }
    }

    /// Fetch every lookup table the swap routes reference; unreadable ones are left out
    async fn resolve_route_tables(
        &self,
        sets: &[OperationSet],
    ) -> HashMap<Pubkey, AddressLookupTableAccount> {
        let mut tables = HashMap::new();
        for key in sets.iter().flat_map(|set| set.route_tables.iter()) {
            if tables.contains_key(key) {
                continue;
            }
            match self.chain.get_lookup_table(key).await {
                Ok(table) => {
                    tables.insert(*key, table);
                }
                Err(e) => {
                    logger::warning(
                        LogTag::Engine,
                        &format!("Route lookup table {} unavailable: {}", key, e),
                    );
                }
            }
        }
        tables
    }

    async fn bootstrap(
        &self,
        session: &Session,
        main: &ResolvedWallet,
        pool: PoolRef,
        started: Instant,
    ) -> IterationOutcome {
        match bootstrap_session(
            self.chain.as_ref(),
            self.gateway.as_ref(),
            self.relay.as_ref(),
            &main.keypair,
            pool,
            session.principal_lamports,
            self.settings.lookup_table_max_addresses,
        )
        .await
        {
            Ok(table) => {
                logger::info(
                    LogTag::Engine,
                    &format!("Session {} bootstrapped with lookup table {}", session.session_id, table),
                );
                self.record_progress(
                    session,
                    started,
                    SessionUpdate {
                        address_lookup_table: Some(Some(table.to_string())),
                        ..Default::default()
                    },
                )
                .await;
                IterationOutcome::Bootstrapped
            }
            Err(e) => {
                self.record_progress(session, started, SessionUpdate::default())
                    .await;
                IterationOutcome::Skipped(format!("bootstrap failed: {}", e))
            }
        }
    }

    /// Persist `update` plus the time spent in this iteration
    async fn record_progress(&self, session: &Session, started: Instant, mut update: SessionUpdate) {
        update.worked_seconds = Some(session.worked_seconds + elapsed_seconds(started));
        if let Err(e) = self.store.update_session(&session.session_id, update).await {
            logger::error(
                LogTag::Engine,
                &format!("Failed to persist progress for session {}: {}", session.session_id, e),
            );
        }
    }

    /// Record a terminal status, clear the run flag and tell the user
    async fn finish(&self, session: &Session, status: SessionStatus) -> IterationOutcome {
        if let Err(e) = self
            .store
            .update_session(&session.session_id, SessionUpdate::stop(status))
            .await
        {
            logger::error(
                LogTag::Engine,
                &format!("Failed to record {} for session {}: {}", status, session.session_id, e),
            );
        }

        self.notifier
            .notify(&session.user_id, &status_message(session, status))
            .await;

        IterationOutcome::Finished(status)
    }
}

/// Main wallet and pool of a session; any failure here is an invalid session
fn session_keys(session: &Session) -> VolumeBotResult<(ResolvedWallet, PoolRef)> {
    let invalid = |reason: String| VolumeBotError::invalid_session(&session.session_id, reason);

    let main = resolve_wallet(&session.main_wallet_secret)
        .map_err(|e| invalid(format!("unusable main wallet: {}", e)))?;
    let target_mint = Pubkey::from_str(&session.target_token)
        .map_err(|e| invalid(format!("invalid target token {}: {}", session.target_token, e)))?;
    let quote_mint = Pubkey::from_str(&session.quote_token)
        .map_err(|e| invalid(format!("invalid quote token {}: {}", session.quote_token, e)))?;

    Ok((
        main,
        PoolRef {
            kind: session.pool_kind,
            target_mint,
            quote_mint,
        },
    ))
}
