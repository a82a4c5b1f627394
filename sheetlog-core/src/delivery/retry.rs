//! Tiered retry schedule for connectivity probes
//!
//! Retries never stop. The probe interval is picked from the time elapsed
//! since the first failure of the current streak:
//!
//! | elapsed        | interval |
//! |----------------|----------|
//! | 0 - 15 min     | 1 s      |
//! | 15 - 30 min    | 3 s      |
//! | 30 min onwards | 60 s     |
//!
//! The tier is recomputed on every retry, so a long outage escalates on its
//! own without extra bookkeeping.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::RetryConfig;

/// Retry interval regime
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RetryTier {
    /// Aggressive probing for the common short outage
    Rapid,
    Moderate,
    /// Long outage, probe once a minute
    Background,
}

impl RetryTier {
    /// 1-based tier number shown to the user
    pub fn number(&self) -> u8 {
        match self {
            RetryTier::Rapid => 1,
            RetryTier::Moderate => 2,
            RetryTier::Background => 3,
        }
    }
}

impl fmt::Display for RetryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Maps elapsed failure-streak time to a tier and probe interval
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    tier1_interval: Duration,
    tier1_duration: Duration,
    tier2_interval: Duration,
    tier2_duration: Duration,
    tier3_interval: Duration,
}

impl RetrySchedule {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            tier1_interval: Duration::from_millis(config.tier1_interval_ms),
            tier1_duration: Duration::from_millis(config.tier1_duration_ms),
            tier2_interval: Duration::from_millis(config.tier2_interval_ms),
            tier2_duration: Duration::from_millis(config.tier2_duration_ms),
            tier3_interval: Duration::from_millis(config.tier3_interval_ms),
        }
    }

    pub fn tier_for(&self, elapsed: Duration) -> RetryTier {
        if elapsed < self.tier1_duration {
            RetryTier::Rapid
        } else if elapsed < self.tier1_duration.saturating_add(self.tier2_duration) {
            RetryTier::Moderate
        } else {
            RetryTier::Background
        }
    }

    pub fn interval_for(&self, tier: RetryTier) -> Duration {
        match tier {
            RetryTier::Rapid => self.tier1_interval,
            RetryTier::Moderate => self.tier2_interval,
            RetryTier::Background => self.tier3_interval,
        }
    }

    pub fn next_delay(&self, elapsed: Duration) -> Duration {
        self.interval_for(self.tier_for(elapsed))
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}

/// Progress of the current failure streak
///
/// Both fields read as zero/unset whenever the collector is reachable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    pub retry_count: u32,
    pub streak_start: Option<Instant>,
}

/// What to do after a failed probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// Retry number within the streak, starting at 1
    pub attempt: u32,
    pub tier: RetryTier,
    pub delay: Duration,
}

impl RetryState {
    /// Record a failed probe and pick the next delay.
    pub fn record_failure(&mut self, now: Instant, schedule: &RetrySchedule) -> RetryDecision {
        let start = *self.streak_start.get_or_insert(now);
        self.retry_count = self.retry_count.saturating_add(1);

        let elapsed = now.saturating_duration_since(start);
        let tier = schedule.tier_for(elapsed);
        RetryDecision {
            attempt: self.retry_count,
            tier,
            delay: schedule.interval_for(tier),
        }
    }

    /// Tier of the streak as of `now`, if one is running
    pub fn current_tier(&self, now: Instant, schedule: &RetrySchedule) -> Option<RetryTier> {
        self.streak_start
            .map(|start| schedule.tier_for(now.saturating_duration_since(start)))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
