//! Check-in governor.
//!
//! Counts how many blocks in a row were advanced by the scheduler alone.
//! Once the count reaches the threshold, the next natural completion opens a
//! grace period instead of arming auto-continue. If nobody answers before
//! the grace period ends, the block after the completed one is skipped (when
//! it is still current and untouched) and the count starts over.
//!
//! ## Lifecycle
//!
//! ```text
//! autonomous advance -> count += 1
//! user action        -> count = 0, grace cleared
//! completion && count >= threshold -> grace(started_at, completed block)
//! now - started_at >= grace_secs   -> expired, count = 0
//! ```

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::block::BlockClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInSettings {
    /// Consecutive autonomous advances before a check-in is required.
    pub threshold: u32,
    pub grace_secs: u32,
}

impl Default for CheckInSettings {
    fn default() -> Self {
        Self {
            threshold: 3,
            grace_secs: 30,
        }
    }
}

/// Window in which the user must confirm they are still there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GracePeriod {
    pub started_at: DateTime<Utc>,
    pub grace_secs: u32,
    /// Block whose completion opened the grace period.
    pub completed_date: NaiveDate,
    pub completed_block: u8,
}

impl GracePeriod {
    /// The only block an unanswered check-in may skip.
    pub fn follow_up_block(&self) -> (NaiveDate, u8) {
        BlockClock::next_block(self.completed_date, self.completed_block)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.started_at + Duration::seconds(self.grace_secs as i64)
    }

    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        let since = (now - self.started_at).num_seconds().max(0);
        (self.grace_secs as i64 - since).max(0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckInGovernor {
    settings: CheckInSettings,
    #[serde(default)]
    consecutive_autonomous: u32,
    #[serde(default)]
    grace: Option<GracePeriod>,
}

impl CheckInGovernor {
    pub fn new(settings: CheckInSettings) -> Self {
        Self {
            settings,
            consecutive_autonomous: 0,
            grace: None,
        }
    }

    pub fn settings(&self) -> CheckInSettings {
        self.settings
    }

    pub fn set_settings(&mut self, settings: CheckInSettings) {
        self.settings = settings;
    }

    pub fn consecutive_autonomous(&self) -> u32 {
        self.consecutive_autonomous
    }

    /// The scheduler advanced a block on its own.
    pub fn record_autonomous_advance(&mut self) {
        self.consecutive_autonomous += 1;
        debug!(
            consecutive_autonomous = self.consecutive_autonomous,
            "autonomous advance recorded"
        );
    }

    /// Any explicit user transition.
    pub fn record_user_action(&mut self) {
        if self.consecutive_autonomous > 0 || self.grace.is_some() {
            debug!("user action resets check-in governor");
        }
        self.consecutive_autonomous = 0;
        self.grace = None;
    }

    /// Whether the next natural completion must ask for a check-in.
    pub fn requires_check_in(&self) -> bool {
        self.settings.threshold > 0 && self.consecutive_autonomous >= self.settings.threshold
    }

    /// Open the grace period at the completion instant of `block_index`.
    pub fn enter_grace(
        &mut self,
        at: DateTime<Utc>,
        date: NaiveDate,
        block_index: u8,
    ) -> GracePeriod {
        let grace = GracePeriod {
            started_at: at,
            grace_secs: self.settings.grace_secs,
            completed_date: date,
            completed_block: block_index,
        };
        info!(
            consecutive_autonomous = self.consecutive_autonomous,
            completed_block = block_index,
            expires_at = %grace.expires_at(),
            "check-in required"
        );
        self.grace = Some(grace);
        grace
    }

    pub fn grace(&self) -> Option<&GracePeriod> {
        self.grace.as_ref()
    }

    pub fn in_grace(&self) -> bool {
        self.grace.is_some()
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        self.grace.as_ref().map(|g| g.remaining_secs(now))
    }

    /// Returns the grace period once it expired, resetting the counter.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<GracePeriod> {
        let grace = self.grace?;
        if grace.remaining_secs(now) > 0 {
            return None;
        }
        self.grace = None;
        self.consecutive_autonomous = 0;
        info!("check-in grace period expired");
        Some(grace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, m, s).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn threshold_reached_after_three_autonomous_advances() {
        let mut governor = CheckInGovernor::default();
        governor.record_autonomous_advance();
        governor.record_autonomous_advance();
        assert!(!governor.requires_check_in());
        governor.record_autonomous_advance();
        assert!(governor.requires_check_in());
    }

    #[test]
    fn user_action_resets_count_and_grace() {
        let mut governor = CheckInGovernor::default();
        for _ in 0..3 {
            governor.record_autonomous_advance();
        }
        governor.enter_grace(at(20, 0), date(), 27);
        governor.record_user_action();
        assert_eq!(governor.consecutive_autonomous(), 0);
        assert!(!governor.in_grace());
        assert!(governor.poll(at(25, 0)).is_none());
    }

    #[test]
    fn grace_expires_after_thirty_seconds() {
        let mut governor = CheckInGovernor::default();
        for _ in 0..3 {
            governor.record_autonomous_advance();
        }
        let grace = governor.enter_grace(at(20, 0), date(), 27);
        assert_eq!(grace.expires_at(), at(20, 30));
        assert_eq!(grace.follow_up_block(), (date(), 28));
        assert_eq!(governor.remaining(at(20, 12)), Some(18));
        assert!(governor.poll(at(20, 29)).is_none());
        assert_eq!(governor.poll(at(20, 30)), Some(grace));
        assert_eq!(governor.consecutive_autonomous(), 0);
        assert!(!governor.requires_check_in());
    }

    #[test]
    fn follow_up_of_last_block_is_first_block_of_next_day() {
        let mut governor = CheckInGovernor::default();
        let grace = governor.enter_grace(at(20, 0), date(), 71);
        let next_day = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        assert_eq!(grace.follow_up_block(), (next_day, 0));
    }

    #[test]
    fn zero_threshold_never_requires_check_in() {
        let mut governor = CheckInGovernor::new(CheckInSettings {
            threshold: 0,
            grace_secs: 30,
        });
        governor.record_autonomous_advance();
        assert!(!governor.requires_check_in());
    }
}
