/// Global constants used across VolumeBot
///
/// Values here are protocol facts or storage codes, not tunables.
/// Anything an operator may want to change belongs in `config::schemas`.

// ============================================================================
// SOLANA BLOCKCHAIN CONSTANTS
// ============================================================================

/// Wrapped SOL mint, the fixed quote asset of every session
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Number of decimal places for SOL
pub const SOL_DECIMALS: u8 = 9;

/// Lamports per SOL (10^9)
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Base fee charged per transaction signature
pub const SIGNATURE_FEE_LAMPORTS: u64 = 5_000;

// ============================================================================
// SESSION LIMITS
// ============================================================================

/// Lowest target volume an operator may set
pub const MIN_TARGET_VOLUME: f64 = 100.0;

/// Highest target volume an operator may set
pub const MAX_TARGET_VOLUME: f64 = 100_000_000.0;

/// Upper bound on the wallet pool address space
pub const MAX_WALLET_POOL_SIZE: u64 = 10_000;

// ============================================================================
// RELAY CONSTANTS
// ============================================================================

/// Block-engine bundle endpoint path, appended to the configured base URL
pub const BUNDLE_API_PATH: &str = "/api/v1/bundles";

/// Hard cap on transactions per bundle, tip included
pub const MAX_BUNDLE_TRANSACTIONS: usize = 5;

/// Public tip accounts accepted by the block engine
pub const RELAY_TIP_ACCOUNTS: [&str; 8] = [
    "96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5",
    "HFqU5x63VTqvQss8hp11i4wVV8bD44PvwucfZ2bU7gRe",
    "Cw8CFyM9FkoMi7K7Crf6HNQqf4uEMzpKw6QNghXLvLkY",
    "ADaUMid9yfUytqMBgopwjb2DTLSokTSzL1zt6iGPaS49",
    "DfXygSm4jCyNCybVYYK6DwvWqjKee8pbDmJGcLWNDXjh",
    "ADuUkR4vqLUMWXxW9gh6D6L8pMSawimctcNZ5pGwDcEt",
    "DttWaMuVvTiduZRnguLF7jNxTgiMBZ1hyAumKUiL2KRL",
    "3AVi9Tg9Uo68tJfuvoKvqKNWKkC5wPdSSdeBnizKZ6jT",
];

/// Converts lamports to SOL for display
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}
