//! Key encoding helpers for pool entries and session wallets

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};

use crate::config::parse_keypair;

/// A wallet reference resolved into its public id and signing credential
pub struct ResolvedWallet {
    pub pubkey: Pubkey,
    pub keypair: Keypair,
}

/// Resolve a stored secret (base58 or byte array) into a signer
pub fn resolve_wallet(secret: &str) -> Result<ResolvedWallet, String> {
    let keypair = parse_keypair(secret)?;
    Ok(ResolvedWallet {
        pubkey: keypair.pubkey(),
        keypair,
    })
}

/// Encode a keypair for storage
pub fn encode_secret(keypair: &Keypair) -> String {
    bs58::encode(keypair.to_bytes()).into_string()
}

/// First characters of an address, for log lines
pub fn short_address(pubkey: &Pubkey) -> String {
    let full = pubkey.to_string();
    full.chars().take(8).collect()
}
