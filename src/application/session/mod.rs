//! Messaging session pool.
//!
//! Owns every messaging account and the worker runtime that drives them.
//! The pool handle is synchronous: each call submits a request to the worker
//! and blocks on the reply with a deadline, so the order thread never runs
//! async code itself. A missed deadline is reported as a recoverable
//! [`SendFailure::Timeout`], never as a panic or hang.

mod slot;
mod worker;

use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub use slot::SessionSlot;
use worker::{Request, WorkerSettings};

use crate::application::limiter::RateLimits;
use crate::domain::{FailureCategory, GiftId, Handle, SendFailure};
use crate::error::SessionError;
use crate::infrastructure::config::session::{SessionConfig, SessionTimeouts};
use crate::port::MessengerClient;

/// One failed attempt inside a failover walk.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionFailure {
    pub session: usize,
    pub category: FailureCategory,
    pub failure: SendFailure,
}

/// Result of [`SessionPool::send_with_failover`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailoverOutcome {
    /// Session that delivered the gift, if any.
    pub delivered_by: Option<usize>,
    /// Failures in the order they happened.
    pub failures: Vec<SessionFailure>,
}

impl FailoverOutcome {
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        self.delivered_by.is_some()
    }

    /// The failure that ended the walk.
    #[must_use]
    pub fn last_failure(&self) -> Option<&SessionFailure> {
        self.failures.last()
    }
}

/// Session chosen for an order's balance precheck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalancePick {
    pub session: usize,
    /// Balance observed for that session; `None` when it could not be read.
    pub balance: Option<u64>,
}

/// Pool of messaging accounts behind a single-threaded worker runtime.
pub struct SessionPool {
    slots: Arc<Vec<SessionSlot>>,
    tx: mpsc::UnboundedSender<Request>,
    worker: Mutex<Option<JoinHandle<()>>>,
    active: Mutex<usize>,
    primary: String,
    failover: bool,
    balance_aware: bool,
    balance_ttl: Duration,
    unknown_balance_ttl: Duration,
    timeouts: SessionTimeouts,
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("sessions", &self.slots.len())
            .field("active", &*self.active.lock())
            .field("failover", &self.failover)
            .finish_non_exhaustive()
    }
}

impl SessionPool {
    /// Start the worker, probe every session and take a balance snapshot.
    ///
    /// Sessions failing the probe are kept but marked dead. Fails only when
    /// no session is alive.
    pub fn start(
        clients: Vec<Arc<dyn MessengerClient>>,
        config: &SessionConfig,
        limits: RateLimits,
    ) -> Result<Self, SessionError> {
        if clients.is_empty() {
            return Err(SessionError::NoSessions);
        }

        let slots: Arc<Vec<SessionSlot>> = Arc::new(
            clients
                .iter()
                .map(|client| SessionSlot::new(client.name(), limits))
                .collect(),
        );
        let timeouts = config.timeouts.clone();
        let settings = WorkerSettings {
            ping: timeouts.ping(),
            restart: timeouts.restart(),
            restart_pause: timeouts.restart_pause(),
            send: timeouts.send(),
            balance: timeouts.balance(),
            username_ttl: config.username_ttl(),
        };
        let (tx, handle) = worker::spawn(clients, Arc::clone(&slots), settings)?;

        let pool = Self {
            slots,
            tx,
            worker: Mutex::new(Some(handle)),
            active: Mutex::new(0),
            primary: config.primary.clone(),
            failover: config.auto_switch,
            balance_aware: config.auto_select_for_precheck && config.auto_switch,
            balance_ttl: config.balance_ttl(),
            unknown_balance_ttl: config.unknown_balance_ttl(),
            timeouts,
        };

        for idx in 0..pool.len() {
            pool.probe(idx);
        }
        let Some(active) = pool.preferred_alive() else {
            pool.shutdown();
            return Err(SessionError::NoAliveSessions);
        };
        pool.set_active(active);

        for idx in pool.alive_sessions() {
            let balance = pool.get_balance(idx);
            info!(
                session = pool.name(idx),
                balance = ?balance,
                active = idx == active,
                "Session ready"
            );
        }
        Ok(pool)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn name(&self, idx: usize) -> &str {
        self.slots.get(idx).map_or("?", SessionSlot::name)
    }

    #[must_use]
    pub fn slot(&self, idx: usize) -> Option<&SessionSlot> {
        self.slots.get(idx)
    }

    #[must_use]
    pub fn get_active(&self) -> usize {
        *self.active.lock()
    }

    pub fn set_active(&self, idx: usize) {
        if idx >= self.len() {
            return;
        }
        let mut active = self.active.lock();
        if *active != idx {
            info!(from = self.name(*active), to = self.name(idx), "Active session switched");
            *active = idx;
        }
    }

    /// Active session first, then the rest in configuration order.
    #[must_use]
    pub fn try_order(&self) -> Vec<usize> {
        let active = self.get_active();
        std::iter::once(active)
            .chain((0..self.len()).filter(|idx| *idx != active))
            .collect()
    }

    #[must_use]
    pub fn is_alive(&self, idx: usize) -> bool {
        self.slots.get(idx).is_some_and(SessionSlot::is_alive)
    }

    #[must_use]
    pub fn is_usable(&self, idx: usize) -> bool {
        self.is_usable_at(idx, Instant::now())
    }

    #[must_use]
    pub fn is_usable_at(&self, idx: usize, now: Instant) -> bool {
        self.slots.get(idx).is_some_and(|slot| slot.is_usable_at(now))
    }

    /// Exclude a session from sends for `duration`. Never shortens an
    /// existing cooldown.
    pub fn mark_unusable(&self, idx: usize, duration: Duration) -> Option<Instant> {
        self.mark_unusable_at(idx, duration, Instant::now())
    }

    pub fn mark_unusable_at(&self, idx: usize, duration: Duration, now: Instant) -> Option<Instant> {
        let slot = self.slots.get(idx)?;
        let until = slot.extend_cooldown(duration, now);
        warn!(
            session = slot.name(),
            cooldown_secs = until.saturating_duration_since(now).as_secs_f64(),
            "Session cooling down"
        );
        Some(until)
    }

    #[must_use]
    pub fn cooldown_until(&self, idx: usize) -> Option<Instant> {
        self.slots.get(idx).and_then(SessionSlot::cooldown_until)
    }

    /// Pause the session's limiter so queued sends also wait.
    pub fn pause_sends(&self, idx: usize, duration: Duration) {
        if let Some(slot) = self.slots.get(idx) {
            slot.limiter().pause(duration);
        }
    }

    // -------------------------------------------------------------------------
    // Health
    // -------------------------------------------------------------------------

    fn probe(&self, idx: usize) -> bool {
        let deadline = self.timeouts.restart();
        self.call("probe", deadline, |reply| Request::Probe { idx, reply })
            .unwrap_or_else(|err| {
                warn!(session = self.name(idx), error = %err, "Session probe failed");
                false
            })
    }

    /// Identity call against the session.
    pub fn ping(&self, idx: usize) -> bool {
        let deadline = self.timeouts.ping();
        self.call("ping", deadline, |reply| Request::Ping { idx, reply })
            .unwrap_or(false)
    }

    /// Stop, pause, re-authorize and start the session. A failed restart
    /// marks it dead.
    pub fn restart(&self, idx: usize) -> bool {
        let deadline = self.timeouts.restart();
        match self.call("restart", deadline, |reply| Request::Restart { idx, reply }) {
            Ok(alive) => alive,
            Err(err) => {
                warn!(session = self.name(idx), error = %err, "Session restart did not finish");
                if let Some(slot) = self.slots.get(idx) {
                    slot.set_alive(false);
                }
                false
            }
        }
    }

    /// Ping, and restart when the ping fails.
    pub fn ensure_alive(&self, idx: usize) -> bool {
        if self.ping(idx) {
            if let Some(slot) = self.slots.get(idx) {
                slot.set_alive(true);
            }
            return true;
        }
        debug!(session = self.name(idx), "Ping failed, restarting session");
        self.restart(idx)
    }

    /// Re-check every session and move the active pointer off a dead one.
    /// Returns the number of alive sessions.
    pub fn recheck_all(&self) -> usize {
        let alive = (0..self.len()).filter(|idx| self.ensure_alive(*idx)).count();
        if !self.is_alive(self.get_active()) {
            if let Some(idx) = self.preferred_alive() {
                self.set_active(idx);
            }
        }
        info!(alive, total = self.len(), "Session health re-check complete");
        alive
    }

    fn alive_sessions(&self) -> Vec<usize> {
        (0..self.len()).filter(|idx| self.is_alive(*idx)).collect()
    }

    fn preferred_alive(&self) -> Option<usize> {
        let primary = (0..self.len()).find(|idx| self.name(*idx) == self.primary);
        primary
            .filter(|idx| self.is_alive(*idx))
            .or_else(|| self.alive_sessions().first().copied())
    }

    // -------------------------------------------------------------------------
    // Balance and sends
    // -------------------------------------------------------------------------

    /// Stars balance of a session, served from cache while fresh. A failed
    /// query is remembered as unknown for a short time.
    pub fn get_balance(&self, idx: usize) -> Option<u64> {
        let slot = self.slots.get(idx)?;
        let now = Instant::now();
        if let Some(cached) = slot.cached_balance(now) {
            return cached;
        }
        let deadline = self.timeouts.balance();
        let value = match self.call("balance", deadline, |reply| Request::Balance { idx, reply }) {
            Ok(Ok(balance)) => Some(balance),
            Ok(Err(failure)) => {
                warn!(session = slot.name(), %failure, "Balance query failed");
                None
            }
            Err(err) => {
                warn!(session = slot.name(), error = %err, "Balance query did not finish");
                None
            }
        };
        let ttl = if value.is_some() {
            self.balance_ttl
        } else {
            self.unknown_balance_ttl
        };
        slot.store_balance(value, ttl, Instant::now());
        value
    }

    /// One throttled send on one session.
    pub fn send_once(
        &self,
        idx: usize,
        recipient: &Handle,
        gift: GiftId,
        hide_name: bool,
    ) -> Result<(), SendFailure> {
        let deadline = self.timeouts.send();
        let recipient = recipient.clone();
        match self.call("send", deadline, |reply| Request::Send {
            idx,
            recipient,
            gift,
            hide_name,
            reply,
        }) {
            Ok(result) => result,
            Err(SessionError::Timeout { .. }) => Err(SendFailure::Timeout),
            Err(_) => Err(SendFailure::Unavailable),
        }
    }

    /// Send one gift, walking the try order when failover is enabled.
    ///
    /// Unusable sessions are skipped. Success pins the delivering session as
    /// active. Only transient categories move on to the next candidate.
    pub fn send_with_failover(
        &self,
        recipient: &Handle,
        gift: GiftId,
        hide_name: bool,
    ) -> FailoverOutcome {
        let candidates = if self.failover {
            self.try_order()
        } else {
            vec![self.get_active()]
        };

        let mut outcome = FailoverOutcome::default();
        for idx in candidates {
            if !self.is_usable(idx) {
                debug!(session = self.name(idx), "Skipping unusable session");
                continue;
            }
            match self.send_once(idx, recipient, gift, hide_name) {
                Ok(()) => {
                    debug!(session = self.name(idx), %recipient, %gift, "Gift sent");
                    self.set_active(idx);
                    outcome.delivered_by = Some(idx);
                    return outcome;
                }
                Err(failure) => {
                    let category = failure.category();
                    warn!(
                        session = self.name(idx),
                        %recipient,
                        %gift,
                        %category,
                        %failure,
                        "Gift send failed"
                    );
                    outcome.failures.push(SessionFailure {
                        session: idx,
                        category,
                        failure,
                    });
                    if !(self.failover && category.is_transient()) {
                        return outcome;
                    }
                }
            }
        }

        if outcome.failures.is_empty() {
            outcome.failures.push(SessionFailure {
                session: self.get_active(),
                category: FailureCategory::Network,
                failure: SendFailure::Unavailable,
            });
        }
        outcome
    }

    /// Session to use for an order needing `need` stars.
    ///
    /// With balance-aware selection, the first usable session in try order
    /// that covers `need` wins, else the one with the highest observed
    /// balance, else the active session. Without it the active session is
    /// always returned.
    pub fn pick_for_required_balance(&self, need: u64) -> BalancePick {
        let active = self.get_active();
        if !self.balance_aware {
            return BalancePick {
                session: active,
                balance: self.get_balance(active),
            };
        }

        let mut best: Option<BalancePick> = None;
        for idx in self.try_order() {
            if !self.is_usable(idx) {
                continue;
            }
            let Some(balance) = self.get_balance(idx) else {
                continue;
            };
            if balance >= need {
                return BalancePick {
                    session: idx,
                    balance: Some(balance),
                };
            }
            if best.map_or(true, |pick| pick.balance < Some(balance)) {
                best = Some(BalancePick {
                    session: idx,
                    balance: Some(balance),
                });
            }
        }

        best.unwrap_or_else(|| BalancePick {
            session: active,
            balance: self.get_balance(active),
        })
    }

    /// Stop every session and join the worker thread.
    pub fn shutdown(&self) {
        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        let deadline = self.timeouts.restart();
        if let Err(err) = self.call("shutdown", deadline, |reply| Request::Shutdown { reply }) {
            warn!(error = %err, "Session worker did not acknowledge shutdown");
            return;
        }
        if handle.join().is_err() {
            warn!("Session worker panicked");
        }
        info!("Session pool stopped");
    }

    fn call<T>(
        &self,
        op: &'static str,
        deadline: Duration,
        request: impl FnOnce(SyncSender<T>) -> Request,
    ) -> Result<T, SessionError> {
        let (reply, rx) = sync_channel(1);
        self.tx
            .send(request(reply))
            .map_err(|_| SessionError::WorkerGone)?;
        rx.recv_timeout(deadline).map_err(|err| match err {
            RecvTimeoutError::Timeout => SessionError::Timeout {
                op,
                timeout_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
            },
            RecvTimeoutError::Disconnected => SessionError::WorkerGone,
        })
    }
}

impl Drop for SessionPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::messenger::ScriptedMessenger;

    fn config(auto_switch: bool) -> SessionConfig {
        SessionConfig {
            sessions: vec!["stars".into(), "backup".into()],
            auto_switch,
            ..SessionConfig::default()
        }
    }

    fn start(
        clients: Vec<Arc<ScriptedMessenger>>,
        config: &SessionConfig,
    ) -> Result<SessionPool, SessionError> {
        let clients = clients
            .into_iter()
            .map(|client| client as Arc<dyn MessengerClient>)
            .collect();
        SessionPool::start(clients, config, RateLimits::unlimited())
    }

    fn alice() -> Handle {
        Handle::parse("@alice_01").unwrap()
    }

    #[test]
    fn test_start_requires_sessions() {
        assert!(matches!(
            start(Vec::new(), &config(false)),
            Err(SessionError::NoSessions)
        ));
    }

    #[test]
    fn test_start_fails_when_none_alive() {
        let dead = Arc::new(ScriptedMessenger::new("stars").unauthorized());
        assert!(matches!(
            start(vec![dead], &config(false)),
            Err(SessionError::NoAliveSessions)
        ));
    }

    #[test]
    fn test_dead_primary_falls_back_to_first_alive() {
        let primary = Arc::new(ScriptedMessenger::new("stars").unauthorized());
        let backup = Arc::new(ScriptedMessenger::new("backup").with_balance(10));
        let pool = start(vec![primary, backup], &config(true)).unwrap();
        assert_eq!(pool.get_active(), 1);
        assert!(!pool.is_alive(0));
        assert_eq!(pool.try_order(), vec![1, 0]);
    }

    #[test]
    fn test_send_pins_delivering_session() {
        let primary = Arc::new(ScriptedMessenger::new("stars"));
        primary.push_send(Err(SendFailure::RateLimited {
            retry_after: Some(Duration::from_secs(30)),
        }));
        let backup = Arc::new(ScriptedMessenger::new("backup"));
        let pool = start(vec![primary, Arc::clone(&backup)], &config(true)).unwrap();

        let outcome = pool.send_with_failover(&alice(), GiftId::new(1), false);
        assert_eq!(outcome.delivered_by, Some(1));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].category, FailureCategory::Flood);
        assert_eq!(pool.get_active(), 1);
        assert_eq!(backup.sent().len(), 1);
    }

    #[test]
    fn test_without_failover_only_active_is_tried() {
        let primary = Arc::new(ScriptedMessenger::new("stars"));
        primary.push_send(Err(SendFailure::Network("reset".into())));
        let backup = Arc::new(ScriptedMessenger::new("backup"));
        let pool = start(vec![primary, Arc::clone(&backup)], &config(false)).unwrap();

        let outcome = pool.send_with_failover(&alice(), GiftId::new(1), false);
        assert!(!outcome.is_delivered());
        assert_eq!(outcome.last_failure().unwrap().category, FailureCategory::Network);
        assert!(backup.sent().is_empty());
    }

    #[test]
    fn test_terminal_category_stops_walk() {
        let primary = Arc::new(ScriptedMessenger::new("stars"));
        primary.push_send(Err(SendFailure::RecipientNotFound));
        let backup = Arc::new(ScriptedMessenger::new("backup"));
        let pool = start(vec![primary, Arc::clone(&backup)], &config(true)).unwrap();

        let outcome = pool.send_with_failover(&alice(), GiftId::new(1), false);
        assert_eq!(
            outcome.last_failure().unwrap().category,
            FailureCategory::UsernameNotFound
        );
        assert!(backup.sent().is_empty());
    }

    #[test]
    fn test_cooling_session_is_skipped() {
        let primary = Arc::new(ScriptedMessenger::new("stars"));
        let backup = Arc::new(ScriptedMessenger::new("backup"));
        let pool = start(vec![Arc::clone(&primary), Arc::clone(&backup)], &config(true)).unwrap();

        pool.mark_unusable(0, Duration::from_secs(60));
        let outcome = pool.send_with_failover(&alice(), GiftId::new(1), false);
        assert_eq!(outcome.delivered_by, Some(1));
        assert!(primary.sent().is_empty());
    }

    #[test]
    fn test_no_usable_session_reports_unavailable() {
        let primary = Arc::new(ScriptedMessenger::new("stars"));
        let pool = start(vec![primary], &config(false)).unwrap();
        pool.mark_unusable(0, Duration::from_secs(60));

        let outcome = pool.send_with_failover(&alice(), GiftId::new(1), false);
        assert_eq!(
            outcome.last_failure().unwrap().failure,
            SendFailure::Unavailable
        );
    }

    #[test]
    fn test_pick_prefers_first_covering_session() {
        let primary = Arc::new(ScriptedMessenger::new("stars").with_balance(10));
        let backup = Arc::new(ScriptedMessenger::new("backup").with_balance(500));
        let pool = start(vec![primary, backup], &config(true)).unwrap();

        assert_eq!(
            pool.pick_for_required_balance(100),
            BalancePick {
                session: 1,
                balance: Some(500)
            }
        );
        assert_eq!(pool.pick_for_required_balance(5).session, 0);
    }

    #[test]
    fn test_pick_falls_back_to_highest_balance() {
        let primary = Arc::new(ScriptedMessenger::new("stars").with_balance(10));
        let backup = Arc::new(ScriptedMessenger::new("backup").with_balance(40));
        let pool = start(vec![primary, backup], &config(true)).unwrap();

        assert_eq!(
            pool.pick_for_required_balance(1000),
            BalancePick {
                session: 1,
                balance: Some(40)
            }
        );
    }

    #[test]
    fn test_pick_without_balance_awareness_uses_active() {
        let primary = Arc::new(ScriptedMessenger::new("stars").with_balance(10));
        let backup = Arc::new(ScriptedMessenger::new("backup").with_balance(500));
        let pool = start(vec![primary, backup], &config(false)).unwrap();

        assert_eq!(
            pool.pick_for_required_balance(100),
            BalancePick {
                session: 0,
                balance: Some(10)
            }
        );
    }

    #[test]
    fn test_failed_balance_is_unknown() {
        let primary = Arc::new(ScriptedMessenger::new("stars").without_balance());
        let pool = start(vec![primary], &config(false)).unwrap();
        assert_eq!(pool.get_balance(0), None);
    }

    #[test]
    fn test_restart_failure_marks_dead() {
        let primary = Arc::new(ScriptedMessenger::new("stars"));
        let pool = start(vec![Arc::clone(&primary)], &config(false)).unwrap();

        primary.set_authorized(false);
        assert!(!pool.ensure_alive(0));
        assert!(!pool.is_alive(0));

        primary.set_authorized(true);
        assert_eq!(pool.recheck_all(), 1);
        assert!(pool.is_alive(0));
    }
}
