//! Recovery policy for classified send failures.
//!
//! After every failover walk the policy applies the session-side effects
//! of each failure (cooldowns, limiter pauses, health re-checks) and tells
//! the delivery loop what the failure means for the order.

use std::time::Instant;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::application::session::{FailoverOutcome, SessionPool};
use crate::domain::FailureCategory;
use crate::infrastructure::config::recovery::RecoveryConfig;

/// What a failed unit means for the rest of the delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitEffect {
    /// Stop the whole delivery loop.
    Stop,
    /// Stop only the remaining units of this recipient.
    SkipRecipient,
    /// Count the unit as failed and continue.
    Fail,
}

impl UnitEffect {
    #[must_use]
    pub const fn for_category(category: FailureCategory) -> Self {
        match category {
            FailureCategory::UsernameNotFound => Self::SkipRecipient,
            FailureCategory::Other => Self::Fail,
            FailureCategory::BalanceLow
            | FailureCategory::Flood
            | FailureCategory::SpamBlock
            | FailureCategory::Network => Self::Stop,
        }
    }
}

/// Follow-up work the caller owns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryActions {
    /// Deactivate listings because of a flood wait.
    pub deactivate_lots: bool,
}

/// Applies session effects of send failures.
#[derive(Debug)]
pub struct RecoveryPolicy {
    config: RecoveryConfig,
    last_flood_deactivation: Mutex<Option<Instant>>,
}

impl RecoveryPolicy {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            last_flood_deactivation: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    pub fn apply(&self, pool: &SessionPool, outcome: &FailoverOutcome) -> RecoveryActions {
        self.apply_at(pool, outcome, Instant::now())
    }

    pub fn apply_at(
        &self,
        pool: &SessionPool,
        outcome: &FailoverOutcome,
        now: Instant,
    ) -> RecoveryActions {
        let mut actions = RecoveryActions::default();
        let mut network = false;

        for failed in &outcome.failures {
            let idx = failed.session;
            match failed.category {
                FailureCategory::Flood => {
                    let wait = failed
                        .failure
                        .retry_after()
                        .unwrap_or_else(|| self.config.flood_fallback())
                        + self.config.flood_extra();
                    warn!(
                        session = pool.name(idx),
                        wait_secs = wait.as_secs_f64(),
                        "Flood wait, pausing session"
                    );
                    pool.mark_unusable_at(idx, wait, now);
                    pool.pause_sends(idx, wait);
                    if self.config.deactivate_on_flood && self.take_flood_deactivation(now) {
                        actions.deactivate_lots = true;
                    }
                }
                FailureCategory::SpamBlock => {
                    warn!(session = pool.name(idx), "Spam block, long session cooldown");
                    pool.mark_unusable_at(idx, self.config.spam_block_pause(), now);
                }
                FailureCategory::Network => {
                    pool.mark_unusable_at(idx, self.config.network_pause(), now);
                    network = true;
                }
                FailureCategory::BalanceLow
                | FailureCategory::UsernameNotFound
                | FailureCategory::Other => {}
            }
        }

        if network {
            info!("Network failure, re-checking session health");
            pool.recheck_all();
        }
        actions
    }

    /// Claim the flood deactivation slot if the cooldown window has passed.
    fn take_flood_deactivation(&self, now: Instant) -> bool {
        let mut last = self.last_flood_deactivation.lock();
        let ready = last.map_or(true, |at| {
            now.saturating_duration_since(at) >= self.config.flood_deactivate_cooldown()
        });
        if ready {
            *last = Some(now);
        }
        ready
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::application::limiter::RateLimits;
    use crate::application::session::SessionFailure;
    use crate::domain::SendFailure;
    use crate::infrastructure::config::session::SessionConfig;
    use crate::port::MessengerClient;
    use crate::testkit::messenger::ScriptedMessenger;

    fn pool(names: &[&str]) -> SessionPool {
        let clients: Vec<Arc<dyn MessengerClient>> = names
            .iter()
            .map(|name| Arc::new(ScriptedMessenger::new(*name)) as Arc<dyn MessengerClient>)
            .collect();
        let config = SessionConfig {
            auto_switch: true,
            ..SessionConfig::default()
        };
        SessionPool::start(clients, &config, RateLimits::unlimited()).unwrap()
    }

    fn outcome(category: FailureCategory, failure: SendFailure) -> FailoverOutcome {
        FailoverOutcome {
            delivered_by: None,
            failures: vec![SessionFailure {
                session: 0,
                category,
                failure,
            }],
        }
    }

    #[test]
    fn test_unit_effects() {
        assert_eq!(
            UnitEffect::for_category(FailureCategory::Flood),
            UnitEffect::Stop
        );
        assert_eq!(
            UnitEffect::for_category(FailureCategory::BalanceLow),
            UnitEffect::Stop
        );
        assert_eq!(
            UnitEffect::for_category(FailureCategory::UsernameNotFound),
            UnitEffect::SkipRecipient
        );
        assert_eq!(
            UnitEffect::for_category(FailureCategory::Other),
            UnitEffect::Fail
        );
    }

    #[test]
    fn test_flood_cools_down_for_wait_plus_extra() {
        let pool = pool(&["stars"]);
        let policy = RecoveryPolicy::new(RecoveryConfig::default());
        let now = Instant::now();
        let failure = SendFailure::RateLimited {
            retry_after: Some(Duration::from_secs(30)),
        };

        policy.apply_at(&pool, &outcome(FailureCategory::Flood, failure), now);

        let until = pool.cooldown_until(0).unwrap();
        assert!(until >= now + Duration::from_millis(30_300));
        assert!(!pool.is_usable_at(0, now + Duration::from_secs(30)));
        assert!(pool.is_usable_at(0, now + Duration::from_secs(31)));
        assert!(pool.slot(0).unwrap().limiter().paused_until().is_some());
    }

    #[test]
    fn test_flood_without_wait_uses_fallback() {
        let pool = pool(&["stars"]);
        let policy = RecoveryPolicy::new(RecoveryConfig::default());
        let now = Instant::now();

        policy.apply_at(
            &pool,
            &outcome(
                FailureCategory::Flood,
                SendFailure::RateLimited { retry_after: None },
            ),
            now,
        );

        assert!(!pool.is_usable_at(0, now + Duration::from_secs(59)));
    }

    #[test]
    fn test_spam_block_uses_long_pause() {
        let pool = pool(&["stars"]);
        let policy = RecoveryPolicy::new(RecoveryConfig::default());
        let now = Instant::now();

        policy.apply_at(
            &pool,
            &outcome(FailureCategory::SpamBlock, SendFailure::PeerRejected),
            now,
        );

        assert!(!pool.is_usable_at(0, now + Duration::from_secs(21_599)));
        assert!(pool.is_usable_at(0, now + Duration::from_secs(21_600)));
    }

    #[test]
    fn test_network_pauses_and_rechecks() {
        let pool = pool(&["stars"]);
        let policy = RecoveryPolicy::new(RecoveryConfig::default());
        let now = Instant::now();

        policy.apply_at(
            &pool,
            &outcome(FailureCategory::Network, SendFailure::Timeout),
            now,
        );

        assert!(!pool.is_usable_at(0, now + Duration::from_secs(2)));
        assert!(pool.is_alive(0));
    }

    #[test]
    fn test_flood_deactivation_is_throttled() {
        let pool = pool(&["stars"]);
        let policy = RecoveryPolicy::new(RecoveryConfig {
            deactivate_on_flood: true,
            ..RecoveryConfig::default()
        });
        let flood = outcome(
            FailureCategory::Flood,
            SendFailure::RateLimited {
                retry_after: Some(Duration::from_secs(1)),
            },
        );
        let t0 = Instant::now();

        assert!(policy.apply_at(&pool, &flood, t0).deactivate_lots);
        assert!(
            !policy
                .apply_at(&pool, &flood, t0 + Duration::from_secs(60))
                .deactivate_lots
        );
        assert!(
            policy
                .apply_at(&pool, &flood, t0 + Duration::from_secs(900))
                .deactivate_lots
        );
    }

    #[test]
    fn test_terminal_categories_leave_session_alone() {
        let pool = pool(&["stars"]);
        let policy = RecoveryPolicy::new(RecoveryConfig::default());

        policy.apply(
            &pool,
            &outcome(FailureCategory::UsernameNotFound, SendFailure::RecipientNotFound),
        );

        assert_eq!(pool.cooldown_until(0), None);
    }
}
