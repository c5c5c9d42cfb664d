//! Volume Orchestration Engine
//!
//! Drives one session at a time through repeated iterations: pick a window
//! of sub-wallets, spread the main wallet's spare balance across it, build a
//! buy+sell set per wallet, simulate, and hand the survivors to the relay as
//! one atomic batch.
//!
//! - `distribution`: amount math
//! - `operations`: per-wallet operation sets
//! - `bootstrap`: token account and lookup table creation
//! - `runner`: the iteration and the loop around it
//! - `sweep`: fund recovery from sub-wallets and withdrawal from main

mod bootstrap;
mod distribution;
mod operations;
mod runner;
mod sweep;


pub use bootstrap::{bootstrap_instructions, bootstrap_session, lookup_table_addresses};
pub use distribution::{
    distributable_amount, draw_amounts, per_wallet_base, raw_volume, reserve_margin,
};
pub use operations::{build_operation_set, ComputeBudget, OperationSet};
pub use runner::VolumeEngine;
pub use sweep::{read_holdings, sweep_instructions, sweep_wallets, withdraw, SweepReport, WalletHoldings};

use std::time::Duration;

use crate::config::{with_config, EngineConfig};
use crate::sessions::SessionStatus;

/// Engine tunables, copied out of the config once per loop
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_wallets_per_bundle: usize,
    pub amount_factor_min: f64,
    pub amount_factor_max: f64,
    pub reserve_margin_ratio: f64,
    pub volume_unit_rate: f64,
    pub idle_delay: Duration,
    pub max_consecutive_simulation_failures: u32,
    pub lookup_table_max_addresses: usize,
    pub compute_budget: ComputeBudget,
    pub sell_residual_tokens: bool,
}

impl EngineSettings {
    pub fn from_config(engine: &EngineConfig) -> Self {
        Self {
            max_wallets_per_bundle: engine.max_wallets_per_bundle,
            amount_factor_min: engine.amount_factor_min,
            amount_factor_max: engine.amount_factor_max,
            reserve_margin_ratio: engine.reserve_margin_ratio,
            volume_unit_rate: engine.volume_unit_rate,
            idle_delay: Duration::from_millis(engine.idle_delay_ms),
            max_consecutive_simulation_failures: engine.max_consecutive_simulation_failures,
            lookup_table_max_addresses: engine.lookup_table_max_addresses,
            compute_budget: ComputeBudget {
                unit_limit: engine.compute_unit_limit,
                unit_price_micro_lamports: engine.compute_unit_price_micro_lamports,
            },
            sell_residual_tokens: engine.sell_residual_tokens,
        }
    }

    pub fn current() -> Self {
        with_config(|cfg| Self::from_config(&cfg.engine))
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// What one iteration did
#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    /// A batch landed and the session metrics advanced
    Traded {
        participants: usize,
        volume_added: f64,
        status: SessionStatus,
    },
    /// The bootstrap batch landed; trading starts next iteration
    Bootstrapped,
    /// Nothing worth trading this time
    Idle,
    /// Every operation set failed simulation
    SimulationFailed { consecutive: u32 },
    /// The relay did not land the batch
    SubmitFailed,
    /// A transient error cut the iteration short
    Skipped(String),
    /// The loop must exit with this status
    Finished(SessionStatus),
}

impl IterationOutcome {
    pub fn is_terminal(&self) -> bool {
        match self {
            IterationOutcome::Finished(_) => true,
            IterationOutcome::Traded { status, .. } => *status == SessionStatus::TargetReached,
            _ => false,
        }
    }
}

/// State carried between iterations of one loop
#[derive(Debug, Default)]
pub struct LoopState {
    pub consecutive_simulation_failures: u32,
    pub iterations: u64,
}
