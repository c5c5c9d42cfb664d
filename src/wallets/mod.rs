//! Wallets
//!
//! - `pool`: the persisted, indexable pool of disposable sub-wallets
//! - `keys`: secret encoding and wallet reference resolution

mod keys;
mod pool;

pub use keys::{encode_secret, resolve_wallet, short_address, ResolvedWallet};
pub use pool::{window_indices, PoolWallet, WalletPool};
