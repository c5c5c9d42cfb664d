//! Chain access
//!
//! `ChainClient` is the narrow set of RPC calls the engine and the bootstrap
//! path need. `SolanaRpc` implements it over the nonblocking Solana client;
//! tests swap in fakes.

mod client;

pub use client::SolanaRpc;

use async_trait::async_trait;
use solana_sdk::address_lookup_table::AddressLookupTableAccount;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Balance in lamports
    async fn get_balance(&self, pubkey: &Pubkey) -> Result<u64, String>;

    async fn get_latest_blockhash(&self) -> Result<Hash, String>;

    async fn get_slot(&self) -> Result<u64, String>;

    /// Ok when the simulation ran clean; Err carries the failure and logs
    async fn simulate_transaction(&self, transaction: &VersionedTransaction) -> Result<(), String>;

    /// Fetch and decode an address lookup table
    async fn get_lookup_table(&self, address: &Pubkey) -> Result<AddressLookupTableAccount, String>;

    /// Raw amount held by an SPL token account; None when the account does not exist
    async fn get_token_account(&self, address: &Pubkey) -> Result<Option<u64>, String>;
}
