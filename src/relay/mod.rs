//! Batch Relay Client
//!
//! - `types`: block-engine JSON-RPC payloads and the typed submit outcome
//! - `tip`: tip route and auth key selection strategies
//! - `client`: `BatchRelay` contract and the Jito implementation

mod client;
mod tip;
mod types;

pub use client::{build_tip_transaction, encode_transactions, AtomicBatch, BatchRelay, JitoRelay};
pub use tip::{
    default_tip_accounts, tip_router_for, AuthKeyRotation, FixedTipRouter, RandomTipRouter,
    RoundRobinTipRouter, TipRouter,
};
pub use types::{BundleEncoding, BundleState, SubmitOutcome};
