//! Auto-continue countdowns.
//!
//! After a natural completion the scheduler waits a short moment and then
//! advances the timer by itself, issuing the same intent a user would. Both
//! countdowns are anchored to the completion instant, never decremented.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionOutcome, Intent};
use crate::block::{BlockClock, SegmentKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoContinueKind {
    /// A work block ended; keep working in the next block.
    ContinueWorking,
    /// A break ended; get back to work.
    BreakOver,
}

impl AutoContinueKind {
    pub fn intent(self) -> Intent {
        match self {
            AutoContinueKind::ContinueWorking => Intent::Continue,
            AutoContinueKind::BreakOver => Intent::BackToWork,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoContinueSettings {
    pub enabled: bool,
    pub continue_secs: u32,
    pub break_over_secs: u32,
}

impl Default for AutoContinueSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            continue_secs: 25,
            break_over_secs: 30,
        }
    }
}

impl AutoContinueSettings {
    pub fn duration_for(&self, kind: AutoContinueKind) -> u32 {
        match kind {
            AutoContinueKind::ContinueWorking => self.continue_secs,
            AutoContinueKind::BreakOver => self.break_over_secs,
        }
    }
}

/// An armed countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAdvance {
    pub kind: AutoContinueKind,
    pub fired_at: DateTime<Utc>,
    pub duration_secs: u32,
    /// Block whose completion armed the countdown.
    pub completed_date: NaiveDate,
    pub completed_block: u8,
}

impl PendingAdvance {
    pub fn fires_at(&self) -> DateTime<Utc> {
        self.fired_at + Duration::seconds(self.duration_secs as i64)
    }

    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        let since = (now - self.fired_at).num_seconds().max(0);
        (self.duration_secs as i64 - since).max(0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoContinueScheduler {
    settings: AutoContinueSettings,
    #[serde(default)]
    pending: Option<PendingAdvance>,
}

impl AutoContinueScheduler {
    pub fn new(settings: AutoContinueSettings) -> Self {
        Self {
            settings,
            pending: None,
        }
    }

    pub fn settings(&self) -> AutoContinueSettings {
        self.settings
    }

    /// Replace settings. Disabling drops an armed countdown.
    pub fn set_settings(&mut self, settings: AutoContinueSettings) {
        self.settings = settings;
        if !settings.enabled {
            self.pending = None;
        }
    }

    /// Which countdown a completion arms, if any. Only natural completions
    /// qualify.
    pub fn kind_for(outcome: &CompletionOutcome) -> Option<AutoContinueKind> {
        match outcome {
            CompletionOutcome::Natural {
                mode: SegmentKind::Work,
            } => Some(AutoContinueKind::ContinueWorking),
            CompletionOutcome::Natural {
                mode: SegmentKind::Break,
            } => Some(AutoContinueKind::BreakOver),
            CompletionOutcome::PausedExpiry | CompletionOutcome::Stopped { .. } => None,
        }
    }

    /// Arm the countdown for a completion at `completed_at`. Returns the
    /// armed countdown, or `None` when disabled or the outcome does not
    /// qualify.
    pub fn arm(
        &mut self,
        outcome: &CompletionOutcome,
        completed_date: NaiveDate,
        completed_block: u8,
        completed_at: DateTime<Utc>,
    ) -> Option<&PendingAdvance> {
        if !self.settings.enabled {
            return None;
        }
        let kind = Self::kind_for(outcome)?;
        self.pending = Some(PendingAdvance {
            kind,
            fired_at: completed_at,
            duration_secs: self.settings.duration_for(kind),
            completed_date,
            completed_block,
        });
        self.pending.as_ref()
    }

    /// Drop the armed countdown and return it.
    pub fn cancel(&mut self) -> Option<PendingAdvance> {
        self.pending.take()
    }

    pub fn pending(&self) -> Option<&PendingAdvance> {
        self.pending.as_ref()
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        self.pending.as_ref().map(|p| p.remaining_secs(now))
    }

    /// Yield the intent once the countdown ran out. A countdown whose next
    /// block is no longer the current one is discarded.
    pub fn poll(&mut self, now: DateTime<Utc>, clock: &BlockClock) -> Option<(AutoContinueKind, Intent)> {
        let pending = self.pending.as_ref()?;
        if pending.remaining_secs(now) > 0 {
            return None;
        }
        let pending = self.pending.take()?;
        let expected = BlockClock::next_block(pending.completed_date, pending.completed_block);
        let position = clock.locate(now);
        if (position.date, position.block_index) != expected {
            debug!(
                kind = ?pending.kind,
                completed_block = pending.completed_block,
                current_block = position.block_index,
                "discarding stale auto-continue"
            );
            return None;
        }
        debug!(kind = ?pending.kind, "auto-continue fired");
        Some((pending.kind, pending.kind.intent()))
    }
}
