//! Per-session bookkeeping shared between the pool handle and its worker.
//!
//! Each slot guards its own state with a short lock; nothing here is held
//! across a network call.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::application::limiter::{RateLimits, SendRateLimiter};
use crate::domain::PeerId;

#[derive(Debug, Clone, Copy)]
struct CachedBalance {
    /// `None` records a failed query.
    value: Option<u64>,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct SlotState {
    alive: bool,
    unusable_until: Option<Instant>,
    balance: Option<CachedBalance>,
}

#[derive(Debug, Clone, Copy)]
struct CachedPeer {
    peer: PeerId,
    expires_at: Instant,
}

/// One messaging account in the pool.
#[derive(Debug)]
pub struct SessionSlot {
    name: String,
    limiter: SendRateLimiter,
    state: Mutex<SlotState>,
    peers: DashMap<String, CachedPeer>,
}

impl SessionSlot {
    pub fn new(name: impl Into<String>, limits: RateLimits) -> Self {
        Self {
            name: name.into(),
            limiter: SendRateLimiter::new(limits),
            state: Mutex::new(SlotState::default()),
            peers: DashMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn limiter(&self) -> &SendRateLimiter {
        &self.limiter
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.state.lock().alive
    }

    pub fn set_alive(&self, alive: bool) {
        self.state.lock().alive = alive;
    }

    /// Alive and past any cooldown.
    #[must_use]
    pub fn is_usable_at(&self, now: Instant) -> bool {
        let state = self.state.lock();
        state.alive && state.unusable_until.map_or(true, |until| now >= until)
    }

    /// Extend the cooldown to `now + duration`; a shorter cooldown never
    /// replaces a longer one.
    pub fn extend_cooldown(&self, duration: Duration, now: Instant) -> Instant {
        let until = now + duration;
        let mut state = self.state.lock();
        let until = state.unusable_until.map_or(until, |current| current.max(until));
        state.unusable_until = Some(until);
        until
    }

    #[must_use]
    pub fn cooldown_until(&self) -> Option<Instant> {
        self.state.lock().unusable_until
    }

    /// Fresh cached balance. The outer `None` means "not cached"; the inner
    /// `None` means a recent query failed.
    #[must_use]
    pub fn cached_balance(&self, now: Instant) -> Option<Option<u64>> {
        self.state
            .lock()
            .balance
            .filter(|cached| now < cached.expires_at)
            .map(|cached| cached.value)
    }

    pub fn store_balance(&self, value: Option<u64>, ttl: Duration, now: Instant) {
        self.state.lock().balance = Some(CachedBalance {
            value,
            expires_at: now + ttl,
        });
    }

    #[must_use]
    pub fn cached_peer(&self, username: &str, now: Instant) -> Option<PeerId> {
        let key = username.to_ascii_lowercase();
        let hit = self.peers.get(&key).map(|entry| *entry.value());
        match hit {
            Some(cached) if now < cached.expires_at => Some(cached.peer),
            Some(_) => {
                self.peers.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn store_peer(&self, username: &str, peer: PeerId, ttl: Duration, now: Instant) {
        self.peers.insert(
            username.to_ascii_lowercase(),
            CachedPeer {
                peer,
                expires_at: now + ttl,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> SessionSlot {
        let slot = SessionSlot::new("stars", RateLimits::unlimited());
        slot.set_alive(true);
        slot
    }

    #[test]
    fn test_dead_slot_is_not_usable() {
        let slot = SessionSlot::new("stars", RateLimits::unlimited());
        assert!(!slot.is_usable_at(Instant::now()));
    }

    #[test]
    fn test_cooldown_blocks_until_expiry() {
        let slot = slot();
        let t0 = Instant::now();
        slot.extend_cooldown(Duration::from_secs(30), t0);
        assert!(!slot.is_usable_at(t0));
        assert!(!slot.is_usable_at(t0 + Duration::from_millis(29_999)));
        assert!(slot.is_usable_at(t0 + Duration::from_secs(30)));
    }

    #[test]
    fn test_cooldown_is_monotonic() {
        let slot = slot();
        let t0 = Instant::now();
        slot.extend_cooldown(Duration::from_secs(60), t0);
        let until = slot.extend_cooldown(Duration::from_secs(5), t0 + Duration::from_secs(1));
        assert_eq!(until, t0 + Duration::from_secs(60));
        assert_eq!(slot.cooldown_until(), Some(t0 + Duration::from_secs(60)));
    }

    #[test]
    fn test_balance_cache_expires() {
        let slot = slot();
        let t0 = Instant::now();
        assert_eq!(slot.cached_balance(t0), None);
        slot.store_balance(Some(100), Duration::from_secs(10), t0);
        assert_eq!(slot.cached_balance(t0 + Duration::from_secs(9)), Some(Some(100)));
        assert_eq!(slot.cached_balance(t0 + Duration::from_secs(10)), None);
        slot.store_balance(None, Duration::from_secs(3), t0 + Duration::from_secs(10));
        assert_eq!(slot.cached_balance(t0 + Duration::from_secs(11)), Some(None));
    }

    #[test]
    fn test_peer_cache_is_case_insensitive_and_expires() {
        let slot = slot();
        let t0 = Instant::now();
        slot.store_peer("Alice_01", PeerId::new(7), Duration::from_secs(60), t0);
        assert_eq!(slot.cached_peer("alice_01", t0), Some(PeerId::new(7)));
        assert_eq!(slot.cached_peer("alice_01", t0 + Duration::from_secs(60)), None);
    }
}
