//! Fund recovery
//!
//! Sweeping hands back everything a window of sub-wallets holds: target
//! tokens move to the main wallet's token account, emptied token accounts
//! are closed with their rent going to main, and the remaining lamports
//! follow. Withdrawal sends the main wallet's spare balance to an outside
//! address. Both go through the relay like any other batch.

use std::str::FromStr;

use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::{v0, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::system_instruction;
use solana_sdk::transaction::VersionedTransaction;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use spl_token::instruction::{close_account, transfer};

use crate::constants::SOL_MINT;
use crate::errors::{VolumeBotError, VolumeBotResult};
use crate::logger::{self, LogTag};
use crate::relay::{AtomicBatch, BatchRelay};
use crate::rpc::ChainClient;
use crate::wallets::{short_address, PoolWallet};

/// What a sub-wallet holds, read right before sweeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalletHoldings {
    pub lamports: u64,
    /// Target-token account amount; None when the account was never opened
    pub target_tokens: Option<u64>,
    /// A wrapped SOL account is still open
    pub wrapped_sol: bool,
}

impl WalletHoldings {
    pub fn is_empty(&self) -> bool {
        self.lamports == 0 && self.target_tokens.is_none() && !self.wrapped_sol
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Wallets looked at
    pub scanned: usize,
    /// Wallets whose sweep landed
    pub swept: usize,
    /// Lamports moved back, not counting closed-account rent
    pub lamports: u64,
    /// Raw target-token amount moved back
    pub tokens: u64,
    /// Wallets that could not be read, failed simulation or whose batch did not land
    pub failed: usize,
}

fn build_error(e: impl std::fmt::Display) -> VolumeBotError {
    VolumeBotError::Build(e.to_string())
}

fn wrapped_sol_mint() -> VolumeBotResult<Pubkey> {
    Pubkey::from_str(SOL_MINT).map_err(|e| VolumeBotError::Config(format!("bad SOL mint: {}", e)))
}

/// Instructions that empty `sub` into `main`; fees are paid by main
pub fn sweep_instructions(
    main: &Pubkey,
    sub: &Pubkey,
    target_mint: &Pubkey,
    holdings: &WalletHoldings,
) -> VolumeBotResult<Vec<Instruction>> {
    let token_program = spl_token::id();
    let mut instructions = Vec::new();

    if let Some(amount) = holdings.target_tokens {
        let source = get_associated_token_address(sub, target_mint);
        if amount > 0 {
            let destination = get_associated_token_address(main, target_mint);
            instructions.push(create_associated_token_account_idempotent(
                main,
                main,
                target_mint,
                &token_program,
            ));
            instructions.push(
                transfer(&token_program, &source, &destination, sub, &[], amount).map_err(build_error)?,
            );
        }
        instructions.push(close_account(&token_program, &source, main, sub, &[]).map_err(build_error)?);
    }

    if holdings.wrapped_sol {
        let wrapped = get_associated_token_address(sub, &wrapped_sol_mint()?);
        instructions.push(close_account(&token_program, &wrapped, main, sub, &[]).map_err(build_error)?);
    }

    if holdings.lamports > 0 {
        instructions.push(system_instruction::transfer(sub, main, holdings.lamports));
    }

    Ok(instructions)
}

/// Balance and token accounts of one sub-wallet
pub async fn read_holdings(
    chain: &dyn ChainClient,
    owner: &Pubkey,
    target_mint: &Pubkey,
) -> VolumeBotResult<WalletHoldings> {
    let wrapped_mint = wrapped_sol_mint()?;

    let lamports = chain.get_balance(owner).await.map_err(VolumeBotError::Rpc)?;
    let target_tokens = chain
        .get_token_account(&get_associated_token_address(owner, target_mint))
        .await
        .map_err(VolumeBotError::Rpc)?;
    let wrapped_sol = *target_mint != wrapped_mint
        && chain
            .get_token_account(&get_associated_token_address(owner, &wrapped_mint))
            .await
            .map_err(VolumeBotError::Rpc)?
            .is_some();

    Ok(WalletHoldings {
        lamports,
        target_tokens,
        wrapped_sol,
    })
}

fn seal(
    signers: &[&Keypair],
    instructions: &[Instruction],
    blockhash: Hash,
) -> VolumeBotResult<VersionedTransaction> {
    let payer = signers[0].pubkey();
    let message =
        v0::Message::try_compile(&payer, instructions, &[], blockhash).map_err(build_error)?;
    VersionedTransaction::try_new(VersionedMessage::V0(message), signers).map_err(build_error)
}

/// Move everything `wallets` hold back to `main`
///
/// One transaction per wallet, `batch_size` transactions per batch. A wallet
/// that cannot be read or fails simulation is counted as failed and the rest
/// go ahead.
pub async fn sweep_wallets(
    chain: &dyn ChainClient,
    relay: &dyn BatchRelay,
    main: &Keypair,
    wallets: Vec<PoolWallet>,
    target_mint: &Pubkey,
    batch_size: usize,
) -> VolumeBotResult<SweepReport> {
    let main_pubkey = main.pubkey();
    let mut report = SweepReport::default();

    let mut pending = Vec::new();
    for wallet in wallets {
        report.scanned += 1;
        match read_holdings(chain, &wallet.pubkey(), target_mint).await {
            Ok(holdings) if holdings.is_empty() => {}
            Ok(holdings) => pending.push((wallet, holdings)),
            Err(e) => {
                logger::warning(
                    LogTag::Wallets,
                    &format!("Cannot read wallet #{}: {}", wallet.index, e),
                );
                report.failed += 1;
            }
        }
    }

    logger::info(
        LogTag::Wallets,
        &format!(
            "Sweeping {} of {} wallets into {}",
            pending.len(),
            report.scanned,
            short_address(&main_pubkey)
        ),
    );

    for chunk in pending.chunks(batch_size.max(1)) {
        let blockhash = chain
            .get_latest_blockhash()
            .await
            .map_err(VolumeBotError::Rpc)?;

        let mut transactions = Vec::with_capacity(chunk.len());
        let mut included = Vec::with_capacity(chunk.len());
        for (wallet, holdings) in chunk {
            let instructions =
                sweep_instructions(&main_pubkey, &wallet.pubkey(), target_mint, holdings)?;
            let tx = seal(&[main, &wallet.keypair], &instructions, blockhash)?;

            match chain.simulate_transaction(&tx).await {
                Ok(()) => {
                    transactions.push(tx);
                    included.push(*holdings);
                }
                Err(e) => {
                    logger::warning(
                        LogTag::Wallets,
                        &format!("Sweep of wallet #{} failed simulation: {}", wallet.index, e),
                    );
                    report.failed += 1;
                }
            }
        }

        if transactions.is_empty() {
            continue;
        }

        if relay
            .submit_atomic(main, AtomicBatch::new(transactions, blockhash))
            .await
        {
            for holdings in included {
                report.swept += 1;
                report.lamports += holdings.lamports;
                report.tokens += holdings.target_tokens.unwrap_or(0);
            }
        } else {
            logger::warning(
                LogTag::Wallets,
                &format!("Sweep batch of {} wallets did not land", included.len()),
            );
            report.failed += included.len();
        }
    }

    Ok(report)
}

/// Send `lamports` (or everything above `reserve`) from `main` to `destination`
///
/// `reserve` stays behind to pay the batch's fees and tip. Returns the amount sent.
pub async fn withdraw(
    chain: &dyn ChainClient,
    relay: &dyn BatchRelay,
    main: &Keypair,
    destination: &Pubkey,
    lamports: Option<u64>,
    reserve: u64,
) -> VolumeBotResult<u64> {
    let main_pubkey = main.pubkey();
    let balance = chain
        .get_balance(&main_pubkey)
        .await
        .map_err(VolumeBotError::Rpc)?;
    let available = balance.saturating_sub(reserve);
    let amount = lamports.unwrap_or(available);

    if amount == 0 || amount > available {
        return Err(VolumeBotError::InvalidInput(format!(
            "cannot withdraw {} lamports: main wallet holds {}, {} kept for fees",
            amount, balance, reserve
        )));
    }

    let blockhash = chain
        .get_latest_blockhash()
        .await
        .map_err(VolumeBotError::Rpc)?;
    let tx = seal(
        &[main],
        &[system_instruction::transfer(&main_pubkey, destination, amount)],
        blockhash,
    )?;
    chain
        .simulate_transaction(&tx)
        .await
        .map_err(VolumeBotError::Rpc)?;

    if !relay
        .submit_atomic(main, AtomicBatch::new(vec![tx], blockhash))
        .await
    {
        return Err(VolumeBotError::Relay(format!(
            "withdrawal of {} lamports to {} did not land",
            amount, destination
        )));
    }

    logger::info(
        LogTag::Wallets,
        &format!("Withdrew {} lamports to {}", amount, destination),
    );
    Ok(amount)
}
