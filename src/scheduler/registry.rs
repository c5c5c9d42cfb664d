//! Active-loop registry
//!
//! Keyed by session id. Check-and-set happens under one lock, so two ticks
//! racing for the same session cannot both launch a loop.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct Claims {
    /// session id -> generation of the live claim
    active: HashMap<String, u64>,
    next_generation: u64,
}

#[derive(Clone, Default)]
pub struct LoopRegistry {
    claims: Arc<Mutex<Claims>>,
}

impl LoopRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `session_id`; None when a loop already holds it
    ///
    /// The claim is released when the returned guard drops.
    pub fn try_acquire(&self, session_id: &str) -> Option<LoopGuard> {
        let mut claims = self.claims.lock();
        if claims.active.contains_key(session_id) {
            return None;
        }
        claims.next_generation += 1;
        let generation = claims.next_generation;
        claims.active.insert(session_id.to_string(), generation);

        Some(LoopGuard {
            registry: self.clone(),
            session_id: session_id.to_string(),
            generation,
        })
    }

    /// Drop whatever claim is held on `session_id`
    ///
    /// Returns false when the id was not registered. A guard from the
    /// dropped claim no longer affects the slot.
    pub fn release(&self, session_id: &str) -> bool {
        self.claims.lock().active.remove(session_id).is_some()
    }

    fn release_claim(&self, session_id: &str, generation: u64) {
        let mut claims = self.claims.lock();
        if claims.active.get(session_id) == Some(&generation) {
            claims.active.remove(session_id);
        }
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.claims.lock().active.contains_key(session_id)
    }

    pub fn active_count(&self) -> usize {
        self.claims.lock().active.len()
    }

    pub fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.claims.lock().active.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// RAII claim on one session's loop slot
pub struct LoopGuard {
    registry: LoopRegistry,
    session_id: String,
    generation: u64,
}

impl LoopGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        self.registry
            .release_claim(&self.session_id, self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_refused() {
        let registry = LoopRegistry::new();
        let guard = registry.try_acquire("a").unwrap();
        assert_eq!(guard.session_id(), "a");
        assert!(registry.try_acquire("a").is_none());
        assert!(registry.try_acquire("b").is_some());
    }

    #[test]
    fn test_guard_drop_releases() {
        let registry = LoopRegistry::new();
        {
            let _guard = registry.try_acquire("a").unwrap();
            assert!(registry.is_active("a"));
        }
        assert!(!registry.is_active("a"));
        assert!(registry.try_acquire("a").is_some());
    }

    #[test]
    fn test_explicit_release() {
        let registry = LoopRegistry::new();
        let guard = registry.try_acquire("a").unwrap();
        assert!(registry.release("a"));
        assert!(!registry.release("a"));
        drop(guard);
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_stale_guard_keeps_newer_claim() {
        let registry = LoopRegistry::new();
        let stale = registry.try_acquire("a").unwrap();
        assert!(registry.release("a"));

        let current = registry.try_acquire("a").unwrap();
        drop(stale);

        assert!(registry.is_active("a"));
        assert!(registry.try_acquire("a").is_none());

        drop(current);
        assert!(!registry.is_active("a"));
    }

    #[test]
    fn test_concurrent_claims_yield_one_winner() {
        let registry = LoopRegistry::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                // winners leak their guard so the claim outlives the thread
                std::thread::spawn(move || {
                    registry
                        .try_acquire("shared")
                        .map(std::mem::forget)
                        .is_some()
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(registry.active_ids(), vec!["shared".to_string()]);
    }
}
