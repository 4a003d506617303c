//! Sliding-window ping limiter with escalating lockout
//!
//! Every accepted ping is recorded with its timestamp. Once `MAX_PINGS` pings
//! land inside `PING_WINDOW`, the limiter locks out further attempts for a
//! duration taken from `LOCKOUT_DURATIONS_SECS`. The lockout is lifted by a
//! one-shot timer owned by the caller, identified by the id handed out here.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Sliding window length
pub const PING_WINDOW: Duration = Duration::from_millis(5000);

/// Pings within the window that trigger a lockout
pub const MAX_PINGS: usize = 6;

/// Lockout duration per escalation tier
pub const LOCKOUT_DURATIONS_SECS: [u64; 5] = [6, 12, 16, 20, 24];

/// Outcome of a single ping attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// Counted and allowed
    Allowed,
    /// Counted and allowed, but it crossed the threshold: subsequent attempts
    /// are rejected until the lockout timer with this id fires.
    AllowedAndLockedOut { id: Uuid, duration: Duration },
    /// Rejected because a lockout is active; nothing was recorded
    Rejected,
}

impl Attempt {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Attempt::Rejected)
    }
}

#[derive(Debug, Clone, Copy)]
struct Lockout {
    id: Uuid,
    duration: Duration,
}

/// Lockout length for a threshold crossing preceded by `prior` retained pings.
///
/// The tier grows with the cumulative retained count and saturates at the
/// last table entry.
pub fn lockout_duration_for(prior: usize) -> Duration {
    let tier = (prior / MAX_PINGS).min(LOCKOUT_DURATIONS_SECS.len() - 1);
    Duration::from_secs(LOCKOUT_DURATIONS_SECS[tier])
}

#[derive(Debug, Default)]
pub struct RateLimiter {
    /// Accepted ping timestamps, oldest first
    pings: VecDeque<Instant>,
    lockout: Option<Lockout>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to record a ping at `now`.
    ///
    /// Stale pings are evicted before anything else so they never count
    /// toward the threshold.
    pub fn attempt(&mut self, now: Instant) -> Attempt {
        self.evict(now);

        if self.lockout.is_some() {
            log::debug!("Ping rejected: lockout active");
            return Attempt::Rejected;
        }

        let prior = self.pings.len();
        self.pings.push_back(now);

        if self.pings.len() >= MAX_PINGS {
            let lockout = Lockout {
                id: Uuid::new_v4(),
                duration: lockout_duration_for(prior),
            };
            log::info!(
                "Rate limit reached ({} pings in {:?}), locking out for {:?}",
                self.pings.len(),
                PING_WINDOW,
                lockout.duration
            );
            self.lockout = Some(lockout);
            return Attempt::AllowedAndLockedOut {
                id: lockout.id,
                duration: lockout.duration,
            };
        }

        Attempt::Allowed
    }

    /// Lift the lockout armed with `id`. Returns false for stale ids.
    pub fn release(&mut self, id: Uuid) -> bool {
        match self.lockout {
            Some(lockout) if lockout.id == id => {
                log::info!("Lockout expired after {:?}", lockout.duration);
                self.lockout = None;
                true
            }
            _ => {
                log::debug!("Ignoring stale lockout timer {}", id);
                false
            }
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lockout.is_some()
    }

    /// Timer id of the active lockout, if any
    pub fn lockout_id(&self) -> Option<Uuid> {
        self.lockout.map(|l| l.id)
    }

    /// Duration of the active lockout, if any
    pub fn lockout_duration(&self) -> Option<Duration> {
        self.lockout.map(|l| l.duration)
    }

    /// Number of pings retained as of `now`
    pub fn retained(&mut self, now: Instant) -> usize {
        self.evict(now);
        self.pings.len()
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&oldest) = self.pings.front() {
            if now.saturating_duration_since(oldest) < PING_WINDOW {
                break;
            }
            self.pings.pop_front();
        }
    }
}
