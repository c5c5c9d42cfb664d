use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSimulateTransactionConfig;
use solana_sdk::address_lookup_table::state::AddressLookupTable;
use solana_sdk::address_lookup_table::AddressLookupTableAccount;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;
use std::time::Duration;

use super::ChainClient;
use crate::config::{with_config, RpcConfig};
use crate::logger::{self, LogTag};

/// Number of simulation log lines kept in error messages
const SIMULATION_LOG_TAIL: usize = 6;

fn commitment_from_str(value: &str) -> CommitmentConfig {
    match value.to_lowercase().as_str() {
        "processed" => CommitmentConfig::processed(),
        "finalized" => CommitmentConfig::finalized(),
        _ => CommitmentConfig::confirmed(),
    }
}

pub struct SolanaRpc {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl SolanaRpc {
    pub fn new(config: &RpcConfig) -> Self {
        let commitment = commitment_from_str(&config.commitment);
        Self {
            client: RpcClient::new_with_timeout_and_commitment(
                config.url.clone(),
                Duration::from_secs(config.timeout_secs),
                commitment,
            ),
            commitment,
        }
    }

    /// Client for the configured endpoint
    pub fn from_config() -> Self {
        Self::new(&with_config(|cfg| cfg.rpc.clone()))
    }
}

#[async_trait]
impl ChainClient for SolanaRpc {
    async fn get_balance(&self, pubkey: &Pubkey) -> Result<u64, String> {
        self.client
            .get_balance(pubkey)
            .await
            .map_err(|e| format!("getBalance failed for {}: {}", pubkey, e))
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, String> {
        self.client
            .get_latest_blockhash()
            .await
            .map_err(|e| format!("getLatestBlockhash failed: {}", e))
    }

    async fn get_slot(&self) -> Result<u64, String> {
        self.client
            .get_slot()
            .await
            .map_err(|e| format!("getSlot failed: {}", e))
    }

    async fn simulate_transaction(&self, transaction: &VersionedTransaction) -> Result<(), String> {
        let response = self
            .client
            .simulate_transaction_with_config(
                transaction,
                RpcSimulateTransactionConfig {
                    sig_verify: false,
                    replace_recent_blockhash: false,
                    commitment: Some(self.commitment),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| format!("simulateTransaction failed: {}", e))?;

        let result = response.value;
        match result.err {
            None => {
                logger::verbose(
                    LogTag::Rpc,
                    &format!(
                        "Simulation ok, {} compute units",
                        result.units_consumed.unwrap_or(0)
                    ),
                );
                Ok(())
            }
            Some(err) => {
                let logs = result.logs.unwrap_or_default();
                let tail_start = logs.len().saturating_sub(SIMULATION_LOG_TAIL);
                Err(format!("{:?} | {}", err, logs[tail_start..].join(" | ")))
            }
        }
    }

    async fn get_lookup_table(&self, address: &Pubkey) -> Result<AddressLookupTableAccount, String> {
        let account = self
            .client
            .get_account(address)
            .await
            .map_err(|e| format!("getAccount failed for lookup table {}: {}", address, e))?;

        let table = AddressLookupTable::deserialize(&account.data)
            .map_err(|e| format!("Invalid lookup table {}: {}", address, e))?;

        Ok(AddressLookupTableAccount {
            key: *address,
            addresses: table.addresses.to_vec(),
        })
    }

    async fn get_token_account(&self, address: &Pubkey) -> Result<Option<u64>, String> {
        let response = self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await
            .map_err(|e| format!("getAccount failed for token account {}: {}", address, e))?;

        match response.value {
            None => Ok(None),
            Some(account) => spl_token::state::Account::unpack(&account.data)
                .map(|state| Some(state.amount))
                .map_err(|e| format!("Invalid token account {}: {}", address, e)),
        }
    }
}
