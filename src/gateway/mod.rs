//! Quote/Execute Gateway
//!
//! Given a pool reference and an input amount, a gateway returns the
//! instructions for one swap leg plus its minimum output. Pool math lives
//! behind this boundary; the engine only consumes the result.

mod jupiter;

pub use jupiter::JupiterGateway;

use async_trait::async_trait;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;

use crate::sessions::PoolKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    /// Quote asset in, target token out
    Buy,
    /// Target token in, quote asset out
    Sell,
}

impl SwapDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapDirection::Buy => "buy",
            SwapDirection::Sell => "sell",
        }
    }
}

/// Which pool a session trades against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolRef {
    pub kind: PoolKind,
    pub target_mint: Pubkey,
    pub quote_mint: Pubkey,
}

impl PoolRef {
    /// (input mint, output mint) for a direction
    pub fn mints_for(&self, direction: SwapDirection) -> (Pubkey, Pubkey) {
        match direction {
            SwapDirection::Buy => (self.quote_mint, self.target_mint),
            SwapDirection::Sell => (self.target_mint, self.quote_mint),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub direction: SwapDirection,
    /// Input amount in base units of the input mint
    pub amount: u64,
    pub pool: PoolRef,
    /// Wallet whose tokens are swapped
    pub owner: Pubkey,
    /// Wallet paying rent for any accounts the swap creates
    pub payer: Pubkey,
}

/// One executable swap leg
#[derive(Debug, Clone)]
pub struct SwapLeg {
    /// Setup, swap and cleanup instructions, without compute budget
    pub instructions: Vec<Instruction>,
    /// Output guaranteed after slippage
    pub min_out: u64,
    /// Expected output
    pub out_amount: u64,
    /// Lookup tables the route expects
    pub lookup_tables: Vec<Pubkey>,
}

impl SwapLeg {
    /// Accounts referenced by the leg that never sign
    pub fn non_signer_accounts(&self) -> Vec<Pubkey> {
        let mut seen = Vec::new();
        for ix in &self.instructions {
            if !seen.contains(&ix.program_id) {
                seen.push(ix.program_id);
            }
            for meta in &ix.accounts {
                if !meta.is_signer && !seen.contains(&meta.pubkey) {
                    seen.push(meta.pubkey);
                }
            }
        }
        seen
    }
}

#[async_trait]
pub trait SwapGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// None when the pool is unsupported or liquidity data is unavailable;
    /// callers skip the wallet rather than abort.
    async fn quote_and_build(&self, request: &SwapRequest) -> Option<SwapLeg>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::instruction::AccountMeta;

    #[test]
    fn test_mints_for_direction() {
        let pool = PoolRef {
            kind: PoolKind::Amm,
            target_mint: Pubkey::new_unique(),
            quote_mint: Pubkey::new_unique(),
        };
        assert_eq!(pool.mints_for(SwapDirection::Buy), (pool.quote_mint, pool.target_mint));
        assert_eq!(pool.mints_for(SwapDirection::Sell), (pool.target_mint, pool.quote_mint));
    }

    #[test]
    fn test_non_signer_accounts_are_distinct() {
        let program = Pubkey::new_unique();
        let signer = Pubkey::new_unique();
        let shared = Pubkey::new_unique();
        let leg = SwapLeg {
            instructions: vec![
                Instruction::new_with_bytes(
                    program,
                    &[1],
                    vec![AccountMeta::new(signer, true), AccountMeta::new(shared, false)],
                ),
                Instruction::new_with_bytes(program, &[2], vec![AccountMeta::new_readonly(shared, false)]),
            ],
            min_out: 1,
            out_amount: 1,
            lookup_tables: vec![],
        };
        assert_eq!(leg.non_signer_accounts(), vec![program, shared]);
    }
}
