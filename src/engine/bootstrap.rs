//! One-time session bootstrap
//!
//! Creates the main wallet's token account for the target mint and a lookup
//! table holding the accounts the pool's swap legs touch. Runs once per
//! target token; no volume is produced by it.

use solana_sdk::address_lookup_table::instruction::{create_lookup_table, extend_lookup_table};
use solana_sdk::instruction::Instruction;
use solana_sdk::message::{v0, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::VersionedTransaction;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;

use crate::gateway::{PoolRef, SwapDirection, SwapGateway, SwapRequest};
use crate::logger::{self, LogTag};
use crate::relay::{AtomicBatch, BatchRelay};
use crate::rpc::ChainClient;

/// Addresses to store in the table: the non-signer accounts of a sample buy,
/// minus the main wallet, capped at `max_addresses`
pub fn lookup_table_addresses(
    route_accounts: &[Pubkey],
    main: &Pubkey,
    max_addresses: usize,
) -> Vec<Pubkey> {
    let mut addresses: Vec<Pubkey> = Vec::new();
    for account in route_accounts {
        if account != main && !addresses.contains(account) {
            addresses.push(*account);
        }
        if addresses.len() >= max_addresses {
            break;
        }
    }
    addresses
}

/// Instructions of the bootstrap transaction and the new table address
pub fn bootstrap_instructions(
    main: &Pubkey,
    target_mint: &Pubkey,
    recent_slot: u64,
    addresses: Vec<Pubkey>,
) -> (Vec<Instruction>, Pubkey) {
    let ata_ix = create_associated_token_account_idempotent(main, main, target_mint, &spl_token::id());
    let (create_ix, table) = create_lookup_table(*main, *main, recent_slot);

    let mut instructions = vec![ata_ix, create_ix];
    if !addresses.is_empty() {
        instructions.push(extend_lookup_table(table, *main, Some(*main), addresses));
    }
    (instructions, table)
}

/// Build and submit the bootstrap batch
///
/// Returns the new table address only once the batch landed.
pub async fn bootstrap_session(
    chain: &dyn ChainClient,
    gateway: &dyn SwapGateway,
    relay: &dyn BatchRelay,
    main: &Keypair,
    pool: PoolRef,
    sample_amount: u64,
    max_addresses: usize,
) -> Result<Pubkey, String> {
    let main_pubkey = main.pubkey();

    let sample = gateway
        .quote_and_build(&SwapRequest {
            direction: SwapDirection::Buy,
            amount: sample_amount.max(1),
            pool,
            owner: main_pubkey,
            payer: main_pubkey,
        })
        .await
        .ok_or_else(|| format!("No route for {} to seed the lookup table", pool.target_mint))?;

    let addresses = lookup_table_addresses(&sample.non_signer_accounts(), &main_pubkey, max_addresses);

    let slot = chain.get_slot().await?;
    let (instructions, table) =
        bootstrap_instructions(&main_pubkey, &pool.target_mint, slot, addresses.clone());

    let blockhash = chain.get_latest_blockhash().await?;
    let message = v0::Message::try_compile(&main_pubkey, &instructions, &[], blockhash)
        .map_err(|e| format!("Failed to compile bootstrap transaction: {}", e))?;
    let tx = VersionedTransaction::try_new(VersionedMessage::V0(message), &[main])
        .map_err(|e| format!("Failed to sign bootstrap transaction: {}", e))?;

    logger::info(
        LogTag::Engine,
        &format!(
            "Bootstrapping {}: token account + lookup table {} with {} addresses",
            pool.target_mint,
            table,
            addresses.len()
        ),
    );

    if relay
        .submit_atomic(main, AtomicBatch::new(vec![tx], blockhash))
        .await
    {
        Ok(table)
    } else {
        Err(format!("Bootstrap batch for {} did not land", pool.target_mint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::address_lookup_table::program::id as lookup_table_program;

    #[test]
    fn test_addresses_dedup_and_cap() {
        let main = Pubkey::new_unique();
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let c = Pubkey::new_unique();

        let picked = lookup_table_addresses(&[a, main, a, b, c], &main, 2);
        assert_eq!(picked, vec![a, b]);
    }

    #[test]
    fn test_bootstrap_instruction_layout() {
        let main = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let (ixs, table) = bootstrap_instructions(&main, &mint, 1234, vec![Pubkey::new_unique()]);

        assert_eq!(ixs.len(), 3);
        assert_eq!(ixs[0].program_id, spl_associated_token_account::id());
        assert_eq!(ixs[1].program_id, lookup_table_program());
        assert_eq!(ixs[2].program_id, lookup_table_program());

        let (_, expected) = create_lookup_table(main, main, 1234);
        assert_eq!(table, expected);
    }

    #[test]
    fn test_no_extension_without_addresses() {
        let main = Pubkey::new_unique();
        let (ixs, _) = bootstrap_instructions(&main, &Pubkey::new_unique(), 1, vec![]);
        assert_eq!(ixs.len(), 2);
    }
}
