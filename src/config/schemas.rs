/// Configuration schemas, each section defined once with its defaults
///
/// Sections map one-to-one onto TOML tables in `data/config.toml`.
use crate::config_struct;
use crate::constants::{
    MAX_BUNDLE_TRANSACTIONS, MAX_TARGET_VOLUME, MAX_WALLET_POOL_SIZE, MIN_TARGET_VOLUME,
};

// ============================================================================
// RPC CONFIGURATION
// ============================================================================

config_struct! {
    /// Solana RPC endpoint
    pub struct RpcConfig {
        url: String = "https://api.mainnet-beta.solana.com".to_string(),
        /// processed | confirmed | finalized
        commitment: String = "confirmed".to_string(),
        timeout_secs: u64 = 30,
    }
}

// ============================================================================
// ENGINE CONFIGURATION
// ============================================================================

config_struct! {
    /// Volume engine tunables
    pub struct EngineConfig {
        /// Size of the wallet address space
        wallet_pool_size: u64 = MAX_WALLET_POOL_SIZE,
        /// Upper bound on operation sets per atomic batch
        max_wallets_per_bundle: usize = 4,
        /// Random factor range applied to each per-wallet amount
        amount_factor_min: f64 = 0.8,
        amount_factor_max: f64 = 0.9,
        /// Reserve kept on the main wallet, as a fraction of one principal
        reserve_margin_ratio: f64 = 0.05,
        /// Multiplier from SOL traded to volume units
        volume_unit_rate: f64 = 180.0,
        /// Pause between iterations
        idle_delay_ms: u64 = 2_000,
        /// Iterations in a row with zero simulated sets before the session stops
        max_consecutive_simulation_failures: u32 = 5,
        /// Cap on addresses written to a new lookup table; keeps the
        /// bootstrap transaction under the packet size limit
        lookup_table_max_addresses: usize = 20,
        /// Compute budget applied to every operation set
        compute_unit_limit: u32 = 600_000,
        compute_unit_price_micro_lamports: u64 = 50_000,
        /// Sell whatever target tokens a sub-wallet already holds along with each buy
        sell_residual_tokens: bool = true,
    }
}

// ============================================================================
// RELAY CONFIGURATION
// ============================================================================

config_struct! {
    /// Block-engine bundle relay
    pub struct RelayConfig {
        block_engine_url: String = "https://mainnet.block-engine.jito.wtf".to_string(),
        tip_lamports: u64 = 10_000,
        /// Optional auth keys rotated into the x-jito-auth header
        auth_keys: Vec<String> = Vec::new(),
        /// random | round_robin
        route_strategy: String = "random".to_string(),
        max_bundle_transactions: usize = 5,
        poll_interval_ms: u64 = 1_000,
        poll_max_attempts: u32 = 30,
        submit_max_attempts: u32 = 3,
        submit_retry_delay_ms: u64 = 500,
        request_timeout_secs: u64 = 20,
        /// base64 | base58
        encoding: String = "base64".to_string(),
    }
}

impl RelayConfig {
    /// Transactions per bundle, tip included; the block engine never takes more than five
    pub fn bundle_limit(&self) -> usize {
        self.max_bundle_transactions.min(MAX_BUNDLE_TRANSACTIONS)
    }
}

// ============================================================================
// GATEWAY CONFIGURATION
// ============================================================================

config_struct! {
    /// Quote and swap-instruction API
    pub struct GatewayConfig {
        api_base: String = "https://api.jup.ag".to_string(),
        api_key: String = String::new(),
        slippage_bps: u16 = 100,
        timeout_secs: u64 = 15,
    }
}

// ============================================================================
// SCHEDULER CONFIGURATION
// ============================================================================

config_struct! {
    pub struct SchedulerConfig {
        interval_secs: u64 = 30,
    }
}

// ============================================================================
// NOTIFICATIONS CONFIGURATION
// ============================================================================

config_struct! {
    /// Where user-facing status messages go
    pub struct NotificationsConfig {
        telegram_enabled: bool = false,
        telegram_bot_token: String = String::new(),
        telegram_api_base: String = "https://api.telegram.org".to_string(),
    }
}

// ============================================================================
// SESSION DEFAULTS
// ============================================================================

config_struct! {
    /// Defaults applied to newly created sessions
    pub struct SessionsConfig {
        default_target_volume: f64 = 1_000_000.0,
        default_sub_wallet_count: usize = 4,
        default_principal_lamports: u64 = 10_000_000,
        min_target_volume: f64 = MIN_TARGET_VOLUME,
        max_target_volume: f64 = MAX_TARGET_VOLUME,
    }
}

// ============================================================================
// ROOT
// ============================================================================

config_struct! {
    /// Root configuration
    pub struct Config {
        /// Operator main wallet (base58 or [u8; 64] array), used by `--create`
        main_wallet_private: String = String::new(),
        rpc: RpcConfig = RpcConfig::default(),
        engine: EngineConfig = EngineConfig::default(),
        relay: RelayConfig = RelayConfig::default(),
        gateway: GatewayConfig = GatewayConfig::default(),
        scheduler: SchedulerConfig = SchedulerConfig::default(),
        notifications: NotificationsConfig = NotificationsConfig::default(),
        sessions: SessionsConfig = SessionsConfig::default(),
    }
}

impl Config {
    /// Rejects values the engine cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.engine.wallet_pool_size == 0 || self.engine.wallet_pool_size > MAX_WALLET_POOL_SIZE
        {
            return Err(format!(
                "engine.wallet_pool_size must be in 1..={}",
                MAX_WALLET_POOL_SIZE
            ));
        }
        if self.engine.amount_factor_min <= 0.0
            || self.engine.amount_factor_min > self.engine.amount_factor_max
            || self.engine.amount_factor_max > 1.0
        {
            return Err("engine.amount_factor_min/max must satisfy 0 < min <= max <= 1".to_string());
        }
        if self.engine.reserve_margin_ratio < 0.0 {
            return Err("engine.reserve_margin_ratio must not be negative".to_string());
        }
        if self.engine.max_wallets_per_bundle == 0
            || self.engine.max_wallets_per_bundle + 1 > self.relay.bundle_limit()
        {
            return Err(format!(
                "engine.max_wallets_per_bundle must leave room for the tip (relay cap {})",
                self.relay.bundle_limit()
            ));
        }
        if self.relay.poll_max_attempts == 0 || self.relay.submit_max_attempts == 0 {
            return Err("relay attempt counts must be at least 1".to_string());
        }
        if self.sessions.default_sub_wallet_count == 0 {
            return Err("sessions.default_sub_wallet_count must be at least 1".to_string());
        }
        Ok(())
    }
}
