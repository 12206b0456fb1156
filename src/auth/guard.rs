use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;

use crate::auth::clock::Clock;

pub const MAX_ATTEMPTS: u32 = 5;
pub const LOCKOUT_WINDOW: Duration = Duration::from_secs(30 * 60);
pub const MAX_TRACKED_IDENTITIES: usize = 100_000;

#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub lockout_window: Duration,
    /// Table size above which the least recently touched unlocked records
    /// are evicted.
    pub max_records: usize,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        LockoutPolicy {
            max_attempts: MAX_ATTEMPTS,
            lockout_window: LOCKOUT_WINDOW,
            max_records: MAX_TRACKED_IDENTITIES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Too many failed login attempts")]
pub struct LockedOut {
    pub retry_after: Duration,
}

/// Observable state of one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Clear,
    Accumulating { failures: u32 },
    Locked { failures: u32, retry_after: Duration },
}

#[derive(Debug, Clone)]
struct AttemptRecord {
    failure_count: u32,
    // None whenever failure_count is 0
    last_failure_at: Option<Instant>,
    touched_at: Instant,
}

impl AttemptRecord {
    fn new(now: Instant) -> Self {
        AttemptRecord {
            failure_count: 0,
            last_failure_at: None,
            touched_at: now,
        }
    }

    fn clear(&mut self) {
        self.failure_count = 0;
        self.last_failure_at = None;
    }
}

/// Per-identity failed login bookkeeping.
///
/// Each identity's record sits behind its own dashmap entry lock, so
/// concurrent attempts on one identity are serialized while different
/// identities only share a shard at most. Records are in-memory and are
/// lost on restart. The table is capped at `max_records`; locked identities
/// are never evicted to make room.
pub struct LoginGuard {
    attempts: DashMap<String, AttemptRecord>,
    policy: LockoutPolicy,
    clock: Arc<dyn Clock>,
}

impl LoginGuard {
    #[cfg(test)]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_policy(LockoutPolicy::default(), clock)
    }

    pub fn with_policy(policy: LockoutPolicy, clock: Arc<dyn Clock>) -> Self {
        LoginGuard {
            attempts: DashMap::new(),
            policy,
            clock,
        }
    }

    /// Rejects the identity while a lockout is active. Does not count as an
    /// attempt; an expired lockout is cleared on the way through.
    pub fn check(&self, identity: &str) -> Result<(), LockedOut> {
        let now = self.clock.now();
        let Some(mut record) = self.attempts.get_mut(identity) else {
            return Ok(());
        };

        if let Some(retry_after) = self.remaining_lockout(&record, now) {
            return Err(LockedOut { retry_after });
        }
        if record.failure_count >= self.policy.max_attempts {
            tracing::debug!("Lockout for {} expired, clearing", identity);
            record.clear();
        }
        Ok(())
    }

    /// Records the outcome of a credential check.
    ///
    /// A success clears the identity. A failure increments the counter and
    /// fails with [`LockedOut`] once the threshold is reached. When the
    /// previous lockout window has fully elapsed the counter starts over, so
    /// the failure counts as the first of a fresh window.
    pub fn record_attempt(&self, identity: &str, success: bool) -> Result<(), LockedOut> {
        let result = self.apply_attempt(identity, success);
        if self.attempts.len() > self.policy.max_records {
            let evicted = self.evict_overflow();
            tracing::debug!("Login guard over capacity, evicted {} records", evicted);
        }
        result
    }

    fn apply_attempt(&self, identity: &str, success: bool) -> Result<(), LockedOut> {
        let now = self.clock.now();
        let mut entry = self
            .attempts
            .entry(identity.to_string())
            .or_insert_with(|| AttemptRecord::new(now));
        let record = entry.value_mut();
        record.touched_at = now;

        if success {
            record.clear();
            return Ok(());
        }

        // Compare against the previous failure, before it is overwritten
        if record.failure_count >= self.policy.max_attempts
            && self.remaining_lockout(record, now).is_none()
        {
            record.clear();
        }

        record.failure_count += 1;
        record.last_failure_at = Some(now);

        if record.failure_count >= self.policy.max_attempts {
            tracing::warn!(
                "Login lockout for {} ({} consecutive failures)",
                identity,
                record.failure_count
            );
            return Err(LockedOut {
                retry_after: self.policy.lockout_window,
            });
        }
        Ok(())
    }

    pub fn status(&self, identity: &str) -> AttemptState {
        let now = self.clock.now();
        let Some(record) = self.attempts.get(identity) else {
            return AttemptState::Clear;
        };

        match record.failure_count {
            0 => AttemptState::Clear,
            n if n < self.policy.max_attempts => AttemptState::Accumulating { failures: n },
            n => match self.remaining_lockout(&record, now) {
                Some(retry_after) => AttemptState::Locked {
                    failures: n,
                    retry_after,
                },
                None => AttemptState::Clear,
            },
        }
    }

    #[cfg(test)]
    pub fn failure_count(&self, identity: &str) -> u32 {
        self.attempts
            .get(identity)
            .map(|r| r.failure_count)
            .unwrap_or(0)
    }

    /// Drops records that no longer affect any decision: cleared records
    /// untouched for longer than `grace`, and lockouts that have expired.
    /// Then trims the table back under `max_records`. Returns how many were
    /// removed.
    pub fn sweep(&self, grace: Duration) -> usize {
        let now = self.clock.now();
        let before = self.attempts.len();
        self.attempts.retain(|_, record| {
            if record.failure_count == 0 {
                return now.saturating_duration_since(record.touched_at) < grace;
            }
            record.failure_count < self.policy.max_attempts
                || self.remaining_lockout(record, now).is_some()
        });
        let expired = before.saturating_sub(self.attempts.len());
        if self.attempts.len() > self.policy.max_records {
            return expired + self.evict_overflow();
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    /// Evicts unlocked records, least recently touched first, until the table
    /// is a tenth below `max_records`.
    fn evict_overflow(&self) -> usize {
        let target = self.policy.max_records - self.policy.max_records / 10;
        let excess = self.attempts.len().saturating_sub(target);
        if excess == 0 {
            return 0;
        }

        let now = self.clock.now();
        let mut candidates: Vec<(String, Instant)> = self
            .attempts
            .iter()
            .filter(|entry| self.remaining_lockout(entry.value(), now).is_none())
            .map(|entry| (entry.key().clone(), entry.touched_at))
            .collect();
        candidates.sort_by_key(|(_, touched_at)| *touched_at);

        let mut evicted = 0;
        for (identity, touched_at) in candidates {
            if evicted == excess {
                break;
            }
            // skip records touched again since the scan
            let removed = self.attempts.remove_if(&identity, |_, record| {
                record.touched_at == touched_at && self.remaining_lockout(record, now).is_none()
            });
            if removed.is_some() {
                evicted += 1;
            }
        }
        evicted
    }

    fn remaining_lockout(&self, record: &AttemptRecord, now: Instant) -> Option<Duration> {
        if record.failure_count < self.policy.max_attempts {
            return None;
        }
        let elapsed = now.saturating_duration_since(record.last_failure_at?);
        self.policy
            .lockout_window
            .checked_sub(elapsed)
            .filter(|remaining| !remaining.is_zero())
    }
}
