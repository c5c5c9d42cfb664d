//! Wallet Pool
//!
//! A fixed address space of disposable sub-wallets, indexed `0..pool_size`.
//! Entries are generated lazily on first request and persisted; after that
//! the same index always yields the same keypair.

use rusqlite::{params, OptionalExtension};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};

use super::keys::{encode_secret, resolve_wallet};
use crate::database::Database;
use crate::logger::{self, LogTag};

/// One pool entry
pub struct PoolWallet {
    pub index: u64,
    pub keypair: Keypair,
}

impl PoolWallet {
    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

impl std::fmt::Debug for PoolWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolWallet")
            .field("index", &self.index)
            .field("pubkey", &self.pubkey())
            .finish()
    }
}

/// Indices covered by a window request
///
/// Forward windows are clamped to the pool; indices past the end are dropped
/// rather than wrapped. Reverse windows count down from `pool_size - 1`.
pub fn window_indices(pool_size: u64, start: u64, count: usize, reverse: bool) -> Vec<u64> {
    let count = count as u64;
    if reverse {
        (0..count.min(pool_size))
            .map(|offset| pool_size - 1 - offset)
            .collect()
    } else {
        (start..start.saturating_add(count))
            .take_while(|idx| *idx < pool_size)
            .collect()
    }
}

pub struct WalletPool {
    db: Database,
    pool_size: u64,
}

impl WalletPool {
    pub fn new(db: Database, pool_size: u64) -> Self {
        Self { db, pool_size }
    }

    pub fn pool_size(&self) -> u64 {
        self.pool_size
    }

    /// Ordered window of wallets
    ///
    /// An index whose entry cannot be loaded or persisted is skipped, so the
    /// result may be shorter than `count`.
    pub fn get_window(&self, start: u64, count: usize, reverse: bool) -> Vec<PoolWallet> {
        let indices = window_indices(self.pool_size, start, count, reverse);
        let mut wallets = Vec::with_capacity(indices.len());

        for index in indices {
            match self.load_or_create(index) {
                Ok(wallet) => wallets.push(wallet),
                Err(e) => {
                    logger::warning(
                        LogTag::Wallets,
                        &format!("Skipping pool wallet #{}: {}", index, e),
                    );
                }
            }
        }

        wallets
    }

    /// Load the entry at `index`, generating and persisting it when absent
    ///
    /// Insert-or-ignore followed by a re-read keeps concurrent callers on the
    /// same keypair.
    fn load_or_create(&self, index: u64) -> Result<PoolWallet, String> {
        let conn = self.db.connection();

        let existing: Option<String> = conn
            .query_row(
                "SELECT secret_key FROM wallet_pool WHERE idx = ?1",
                params![index as i64],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| format!("Failed to read pool entry: {}", e))?;

        let secret = match existing {
            Some(secret) => secret,
            None => {
                let keypair = Keypair::new();
                conn.execute(
                    "INSERT OR IGNORE INTO wallet_pool (idx, public_key, secret_key) VALUES (?1, ?2, ?3)",
                    params![
                        index as i64,
                        keypair.pubkey().to_string(),
                        encode_secret(&keypair)
                    ],
                )
                .map_err(|e| format!("Failed to persist pool entry: {}", e))?;

                logger::debug(
                    LogTag::Wallets,
                    &format!("Generated pool wallet #{} {}", index, keypair.pubkey()),
                );

                conn.query_row(
                    "SELECT secret_key FROM wallet_pool WHERE idx = ?1",
                    params![index as i64],
                    |row| row.get(0),
                )
                .map_err(|e| format!("Failed to re-read pool entry: {}", e))?
            }
        };

        let resolved = resolve_wallet(&secret)?;
        Ok(PoolWallet {
            index,
            keypair: resolved.keypair,
        })
    }

    /// Make sure the first `count` entries exist; returns how many were created
    pub fn ensure_generated(&self, count: u64) -> Result<u64, String> {
        let target = count.min(self.pool_size);
        let before = self.persisted_count()?;

        for index in 0..target {
            self.load_or_create(index)?;
        }

        let after = self.persisted_count()?;
        let created = after.saturating_sub(before);
        if created > 0 {
            logger::info(
                LogTag::Wallets,
                &format!("Generated {} pool wallets ({} total)", created, after),
            );
        }
        Ok(created)
    }

    /// Number of entries stored so far
    pub fn persisted_count(&self) -> Result<u64, String> {
        let count: i64 = self
            .db
            .connection()
            .query_row("SELECT COUNT(*) FROM wallet_pool", [], |row| row.get(0))
            .map_err(|e| format!("Failed to count pool entries: {}", e))?;
        Ok(count as u64)
    }
}
