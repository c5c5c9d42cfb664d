//! Per-wallet operation sets
//!
//! One set moves funds from the main wallet to a sub-wallet, buys, sells the
//! bought amount back (plus any tokens the wallet already held) and returns
//! the proceeds, all in a single transaction signed by both wallets.

use solana_sdk::address_lookup_table::AddressLookupTableAccount;
use solana_sdk::compute_budget::ComputeBudgetInstruction;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::{v0, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::system_instruction;
use solana_sdk::transaction::VersionedTransaction;

use crate::gateway::{PoolRef, SwapDirection, SwapGateway, SwapRequest};
use crate::logger::{self, LogTag};
use crate::wallets::{short_address, PoolWallet};

/// Compute budget prepended to each set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeBudget {
    pub unit_limit: u32,
    pub unit_price_micro_lamports: u64,
}

impl ComputeBudget {
    pub fn instructions(&self) -> Vec<Instruction> {
        let mut ixs = Vec::with_capacity(2);
        if self.unit_limit > 0 {
            ixs.push(ComputeBudgetInstruction::set_compute_unit_limit(
                self.unit_limit,
            ));
        }
        if self.unit_price_micro_lamports > 0 {
            ixs.push(ComputeBudgetInstruction::set_compute_unit_price(
                self.unit_price_micro_lamports,
            ));
        }
        ixs
    }
}

/// Instructions for one sub-wallet, not yet stamped or signed
pub struct OperationSet {
    pub wallet: PoolWallet,
    /// Lamports funded into the sub-wallet and bought with
    pub amount: u64,
    /// Lamports guaranteed back from the sell leg
    pub returned: u64,
    pub instructions: Vec<Instruction>,
    /// Lookup tables the swap routes asked for
    pub route_tables: Vec<Pubkey>,
}

/// Quote both legs for `wallet` and assemble its set
///
/// `residual` is the target-token balance the wallet held before this set;
/// the sell leg clears it along with the fresh buy. None when either leg has
/// no route; the wallet sits out this iteration.
pub async fn build_operation_set(
    gateway: &dyn SwapGateway,
    pool: PoolRef,
    main: &Pubkey,
    wallet: PoolWallet,
    amount: u64,
    residual: u64,
    budget: ComputeBudget,
) -> Option<OperationSet> {
    let sub = wallet.pubkey();

    let buy = gateway
        .quote_and_build(&SwapRequest {
            direction: SwapDirection::Buy,
            amount,
            pool,
            owner: sub,
            payer: *main,
        })
        .await;
    let Some(buy) = buy else {
        logger::debug(
            LogTag::Engine,
            &format!("No buy route for wallet #{} ({})", wallet.index, short_address(&sub)),
        );
        return None;
    };

    let sell = gateway
        .quote_and_build(&SwapRequest {
            direction: SwapDirection::Sell,
            amount: buy.min_out.saturating_add(residual),
            pool,
            owner: sub,
            payer: *main,
        })
        .await;
    let Some(sell) = sell else {
        logger::debug(
            LogTag::Engine,
            &format!("No sell route for wallet #{} ({})", wallet.index, short_address(&sub)),
        );
        return None;
    };

    let mut instructions = budget.instructions();
    instructions.push(system_instruction::transfer(main, &sub, amount));
    instructions.extend(buy.instructions);
    instructions.extend(sell.instructions);
    instructions.push(system_instruction::transfer(&sub, main, sell.min_out));

    let mut route_tables = buy.lookup_tables;
    for table in sell.lookup_tables {
        if !route_tables.contains(&table) {
            route_tables.push(table);
        }
    }

    Some(OperationSet {
        wallet,
        amount,
        returned: sell.min_out,
        instructions,
        route_tables,
    })
}

impl OperationSet {
    /// Compile against `tables` with `blockhash` and sign with main and sub
    pub fn seal(
        &self,
        main: &Keypair,
        tables: &[AddressLookupTableAccount],
        blockhash: Hash,
    ) -> Result<VersionedTransaction, String> {
        let message = v0::Message::try_compile(&main.pubkey(), &self.instructions, tables, blockhash)
            .map_err(|e| format!("Failed to compile set for wallet #{}: {}", self.wallet.index, e))?;

        VersionedTransaction::try_new(
            VersionedMessage::V0(message),
            &[main, &self.wallet.keypair],
        )
        .map_err(|e| format!("Failed to sign set for wallet #{}: {}", self.wallet.index, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::SwapLeg;
    use crate::sessions::PoolKind;
    use async_trait::async_trait;
    use solana_sdk::instruction::AccountMeta;

    struct FixedGateway {
        pool_account: Pubkey,
        sell_available: bool,
    }

    #[async_trait]
    impl SwapGateway for FixedGateway {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn quote_and_build(&self, request: &SwapRequest) -> Option<SwapLeg> {
            if request.direction == SwapDirection::Sell && !self.sell_available {
                return None;
            }
            Some(SwapLeg {
                instructions: vec![Instruction::new_with_bytes(
                    Pubkey::new_unique(),
                    &request.amount.to_le_bytes(),
                    vec![
                        AccountMeta::new(request.owner, true),
                        AccountMeta::new(self.pool_account, false),
                    ],
                )],
                min_out: request.amount / 2,
                out_amount: request.amount,
                lookup_tables: vec![],
            })
        }
    }

    fn pool() -> PoolRef {
        PoolRef {
            kind: PoolKind::Amm,
            target_mint: Pubkey::new_unique(),
            quote_mint: Pubkey::new_unique(),
        }
    }

    fn budget() -> ComputeBudget {
        ComputeBudget {
            unit_limit: 600_000,
            unit_price_micro_lamports: 50_000,
        }
    }

    #[test]
    fn test_zero_budget_adds_nothing() {
        let budget = ComputeBudget {
            unit_limit: 0,
            unit_price_micro_lamports: 0,
        };
        assert!(budget.instructions().is_empty());
    }

    #[tokio::test]
    async fn test_set_layout() {
        let gateway = FixedGateway {
            pool_account: Pubkey::new_unique(),
            sell_available: true,
        };
        let main = Keypair::new();
        let wallet = PoolWallet {
            index: 3,
            keypair: Keypair::new(),
        };
        let sub = wallet.pubkey();

        let set = build_operation_set(&gateway, pool(), &main.pubkey(), wallet, 1_000, 0, budget())
            .await
            .unwrap();

        // budget x2, fund, buy, sell, return
        assert_eq!(set.instructions.len(), 6);
        assert_eq!(
            set.instructions[2],
            system_instruction::transfer(&main.pubkey(), &sub, 1_000)
        );
        // sell leg quotes the buy leg's minimum output
        assert_eq!(set.instructions[4].data, 500u64.to_le_bytes().to_vec());
        assert_eq!(set.returned, 250);
        assert_eq!(
            set.instructions[5],
            system_instruction::transfer(&sub, &main.pubkey(), 250)
        );
    }

    #[tokio::test]
    async fn test_sell_leg_clears_held_tokens() {
        let gateway = FixedGateway {
            pool_account: Pubkey::new_unique(),
            sell_available: true,
        };
        let main = Keypair::new();
        let wallet = PoolWallet {
            index: 5,
            keypair: Keypair::new(),
        };

        let set = build_operation_set(&gateway, pool(), &main.pubkey(), wallet, 1_000, 300, budget())
            .await
            .unwrap();

        // 500 from the buy plus 300 already held
        assert_eq!(set.instructions[4].data, 800u64.to_le_bytes().to_vec());
        assert_eq!(set.returned, 400);
    }

    #[tokio::test]
    async fn test_missing_leg_drops_wallet() {
        let gateway = FixedGateway {
            pool_account: Pubkey::new_unique(),
            sell_available: false,
        };
        let main = Keypair::new();
        let wallet = PoolWallet {
            index: 0,
            keypair: Keypair::new(),
        };
        assert!(
            build_operation_set(&gateway, pool(), &main.pubkey(), wallet, 1_000, 0, budget())
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_seal_signs_with_both_wallets() {
        let gateway = FixedGateway {
            pool_account: Pubkey::new_unique(),
            sell_available: true,
        };
        let main = Keypair::new();
        let wallet = PoolWallet {
            index: 1,
            keypair: Keypair::new(),
        };
        let sub = wallet.pubkey();
        let set = build_operation_set(&gateway, pool(), &main.pubkey(), wallet, 2_000, 0, budget())
            .await
            .unwrap();

        let blockhash = Hash::new_unique();
        let tx = set.seal(&main, &[], blockhash).unwrap();
        assert_eq!(tx.signatures.len(), 2);
        assert_eq!(tx.message.recent_blockhash(), &blockhash);
        let keys = tx.message.static_account_keys();
        assert_eq!(keys[0], main.pubkey());
        assert!(keys[..2].contains(&sub));
        assert!(tx.verify_with_results().iter().all(|ok| *ok));
    }
}
