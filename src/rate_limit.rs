//! Per-source attempt ceiling and temporary bans.
//!
//! State is process-local: concurrent workers each keep their own counters,
//! so the aggregate call rate against a source is the ceiling times the
//! number of workers.

use chrono::{DateTime, Duration, Utc};

/// Limits shared by every remote source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    /// A source is permitted while its attempt count is at most this value.
    pub ceiling: u32,
    pub ban_duration: Duration,
}

impl RateLimits {
    pub fn new(ceiling: u32, ban_minutes: i64) -> Self {
        Self {
            ceiling,
            ban_duration: Duration::minutes(ban_minutes),
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self::new(40, 10)
    }
}

/// Attempt counter and ban deadline for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderState {
    pub call_count: u32,
    pub banned_until: Option<DateTime<Utc>>,
}

impl ProviderState {
    /// Whether an attempt may be made at `now`.
    pub fn permits(&self, limits: &RateLimits, now: DateTime<Utc>) -> bool {
        if self.call_count > limits.ceiling {
            return false;
        }
        match self.banned_until {
            Some(until) => now >= until,
            None => true,
        }
    }

    pub fn record_attempt(&mut self) {
        self.call_count = self.call_count.saturating_add(1);
    }

    /// Ban the source until `now + ban_duration`.
    pub fn ban(&mut self, limits: &RateLimits, now: DateTime<Utc>) {
        self.banned_until = Some(now + limits.ban_duration);
    }

    pub fn is_banned(&self, now: DateTime<Utc>) -> bool {
        self.banned_until.is_some_and(|until| now < until)
    }
}
