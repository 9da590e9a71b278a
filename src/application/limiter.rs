//! Per-session send rate limiter.
//!
//! Combines four constraints into a single required delay:
//!
//! - a pause set after platform flood responses,
//! - a minimum gap between any two sends,
//! - a minimum gap between two sends to the same recipient,
//! - a sliding-window cap on the number of sends.
//!
//! A reservation is checked and committed inside one critical section, so
//! concurrent callers on the same session can never both pass the same slot.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;
use tracing::trace;

/// Limits applied by a [`SendRateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub min_delay: Duration,
    pub per_recipient_delay: Duration,
    pub burst_window: Duration,
    pub burst_max: usize,
    /// Upper bound of the random jitter added to non-zero waits.
    pub jitter: Duration,
}

impl RateLimits {
    /// No throttling at all.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            min_delay: Duration::ZERO,
            per_recipient_delay: Duration::ZERO,
            burst_window: Duration::ZERO,
            burst_max: usize::MAX,
            jitter: Duration::ZERO,
        }
    }
}

#[derive(Debug, Default)]
struct LimiterState {
    last_send: Option<Instant>,
    last_by_recipient: HashMap<String, Instant>,
    recent: VecDeque<Instant>,
    paused_until: Option<Instant>,
}

/// Throttle for a single session.
#[derive(Debug)]
pub struct SendRateLimiter {
    limits: RateLimits,
    state: Mutex<LimiterState>,
}

fn remaining(until: Instant, now: Instant) -> Duration {
    until.saturating_duration_since(now)
}

impl SendRateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            state: Mutex::new(LimiterState::default()),
        }
    }

    #[must_use]
    pub const fn limits(&self) -> &RateLimits {
        &self.limits
    }

    /// Block sends for at least `duration`. Never shortens an existing pause.
    pub fn pause(&self, duration: Duration) {
        self.pause_at(duration, Instant::now());
    }

    pub fn pause_at(&self, duration: Duration, now: Instant) {
        let until = now + duration;
        let mut state = self.state.lock();
        state.paused_until = Some(state.paused_until.map_or(until, |current| current.max(until)));
    }

    #[must_use]
    pub fn paused_until(&self) -> Option<Instant> {
        self.state.lock().paused_until
    }

    /// Try to reserve a send slot for `recipient` at `now`.
    ///
    /// On success the reservation is recorded. Otherwise returns the delay
    /// still required; nothing is recorded.
    pub fn try_reserve(&self, recipient: &str, now: Instant) -> Result<(), Duration> {
        let limits = &self.limits;
        let mut state = self.state.lock();

        let window_start = now.checked_sub(limits.burst_window);
        while let Some(&oldest) = state.recent.front() {
            match window_start {
                Some(start) if oldest <= start => {
                    state.recent.pop_front();
                }
                _ => break,
            }
        }

        let mut delay = Duration::ZERO;
        if let Some(until) = state.paused_until {
            delay = delay.max(remaining(until, now));
        }
        if let Some(last) = state.last_send {
            delay = delay.max(remaining(last + limits.min_delay, now));
        }
        if let Some(last) = state.last_by_recipient.get(recipient) {
            delay = delay.max(remaining(*last + limits.per_recipient_delay, now));
        }
        if state.recent.len() >= limits.burst_max {
            if let Some(&oldest) = state.recent.front() {
                delay = delay.max(remaining(oldest + limits.burst_window, now));
            }
        }

        if !delay.is_zero() {
            return Err(delay);
        }

        state.last_send = Some(now);
        state.last_by_recipient.insert(recipient.to_string(), now);
        state.recent.push_back(now);
        if state.paused_until.is_some_and(|until| until <= now) {
            state.paused_until = None;
        }
        let per_recipient = limits.per_recipient_delay;
        state
            .last_by_recipient
            .retain(|_, last| now.saturating_duration_since(*last) < per_recipient || *last == now);
        Ok(())
    }

    /// Wait until a send to `recipient` is allowed, then reserve it.
    pub async fn wait(&self, recipient: &str) {
        loop {
            match self.try_reserve(recipient, Instant::now()) {
                Ok(()) => return,
                Err(delay) => {
                    let delay = delay + self.jitter();
                    trace!(recipient, delay_ms = delay.as_millis() as u64, "Throttling send");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn jitter(&self) -> Duration {
        if self.limits.jitter.is_zero() {
            return Duration::ZERO;
        }
        let max = self.limits.jitter.as_secs_f64();
        Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..=max))
    }
}
