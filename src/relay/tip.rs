//! Tip route selection
//!
//! Each batch pays its tip to one of the relay's tip accounts. The choice is
//! a strategy object so tests can pin it.

use rand::seq::SliceRandom;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::constants::RELAY_TIP_ACCOUNTS;

pub trait TipRouter: Send + Sync {
    /// Next tip destination; None when no route is available
    fn next(&self) -> Option<Pubkey>;
}

/// The public tip accounts, skipping any that fail to parse
pub fn default_tip_accounts() -> Vec<Pubkey> {
    RELAY_TIP_ACCOUNTS
        .iter()
        .filter_map(|a| Pubkey::from_str(a).ok())
        .collect()
}

pub struct RandomTipRouter {
    routes: Vec<Pubkey>,
}

impl RandomTipRouter {
    pub fn new(routes: Vec<Pubkey>) -> Self {
        Self { routes }
    }
}

impl TipRouter for RandomTipRouter {
    fn next(&self) -> Option<Pubkey> {
        self.routes.choose(&mut rand::thread_rng()).copied()
    }
}

pub struct RoundRobinTipRouter {
    routes: Vec<Pubkey>,
    cursor: AtomicUsize,
}

impl RoundRobinTipRouter {
    pub fn new(routes: Vec<Pubkey>) -> Self {
        Self {
            routes,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl TipRouter for RoundRobinTipRouter {
    fn next(&self) -> Option<Pubkey> {
        if self.routes.is_empty() {
            return None;
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % self.routes.len();
        Some(self.routes[i])
    }
}

/// Always the same route (or none)
pub struct FixedTipRouter(pub Option<Pubkey>);

impl TipRouter for FixedTipRouter {
    fn next(&self) -> Option<Pubkey> {
        self.0
    }
}

/// Router named by `relay.route_strategy`
pub fn tip_router_for(strategy: &str) -> Box<dyn TipRouter> {
    let routes = default_tip_accounts();
    match strategy {
        "round_robin" => Box::new(RoundRobinTipRouter::new(routes)),
        _ => Box::new(RandomTipRouter::new(routes)),
    }
}

/// Round-robin rotation over relay auth keys
pub struct AuthKeyRotation {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl AuthKeyRotation {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys: keys.into_iter().filter(|k| !k.trim().is_empty()).collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn next(&self) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        Some(self.keys[i].as_str())
    }
}
