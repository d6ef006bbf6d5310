//! Snapshot cadence and crash recovery.
//!
//! The engine writes its in-flight run onto the block at every segment
//! boundary. The manager adds the periodic snapshot while a run is active
//! and, after a restart or suspension, turns a leftover snapshot back into
//! either a live session or a finished run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::TimerEngine;
use crate::block::Block;
use crate::error::TransitionError;
use crate::events::Event;

/// What `recover` did with a block's snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    /// The block is still current; the session runs (or stays paused) again.
    Restored(Event),
    /// The block ended while the process was away; the run was finalized.
    Completed(Event),
    /// The block carried no snapshot.
    Nothing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryManager {
    interval_secs: u32,
    #[serde(default)]
    last_captured_at: Option<DateTime<Utc>>,
}

impl Default for RecoveryManager {
    fn default() -> Self {
        Self::new(15)
    }
}

impl RecoveryManager {
    pub fn new(interval_secs: u32) -> Self {
        Self {
            interval_secs: interval_secs.max(1),
            last_captured_at: None,
        }
    }

    pub fn interval_secs(&self) -> u32 {
        self.interval_secs
    }

    pub fn set_interval_secs(&mut self, interval_secs: u32) {
        self.interval_secs = interval_secs.max(1);
    }

    /// Whether the periodic snapshot is due at `now`.
    pub fn due(&self, now: DateTime<Utc>) -> bool {
        match self.last_captured_at {
            None => true,
            Some(last) => {
                let since = (now - last).num_seconds();
                // A clock stepped backwards also forces a capture.
                since < 0 || since >= self.interval_secs as i64
            }
        }
    }

    pub fn note_captured(&mut self, at: DateTime<Utc>) {
        self.last_captured_at = Some(at);
    }

    /// Refresh the engine's snapshot if the interval elapsed.
    pub fn capture_if_due(&mut self, engine: &mut TimerEngine, now: DateTime<Utc>) -> Option<Event> {
        if !engine.state().is_running() || !self.due(now) {
            return None;
        }
        let event = engine.refresh_snapshot(now)?;
        self.note_captured(now);
        Some(event)
    }

    /// Resolve the snapshot on a freshly fetched block.
    pub fn recover(
        &mut self,
        engine: &mut TimerEngine,
        block: Block,
        now: DateTime<Utc>,
    ) -> Result<RecoveryOutcome, TransitionError> {
        let Some(snapshot) = block.active_run.as_ref() else {
            debug!(block_index = block.block_index, "no snapshot to recover");
            return Ok(RecoveryOutcome::Nothing);
        };
        let block_end = engine.block_clock().block_end(block.date, block.block_index);
        info!(
            block_index = block.block_index,
            run_id = %snapshot.run_id,
            paused = snapshot.is_paused(),
            expired = now >= block_end,
            "recovering timer snapshot"
        );
        if now >= block_end {
            let event = engine.complete_from_snapshot(block, now)?;
            self.last_captured_at = None;
            Ok(RecoveryOutcome::Completed(event))
        } else {
            let event = engine.restore(block, now)?;
            self.note_captured(now);
            Ok(RecoveryOutcome::Restored(event))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockClock, BlockStatus};
    use crate::timer::{CompletionOutcome, Origin, TimerState};
    use chrono::{NaiveDate, TimeZone};

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, s).unwrap()
    }

    fn block27() -> Block {
        Block::idle("u", NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), 27)
    }

    #[test]
    fn periodic_capture_respects_interval() {
        let mut manager = RecoveryManager::new(15);
        let mut engine = TimerEngine::new(BlockClock::utc());
        engine
            .start(block27(), at(9, 0, 0), None, None, Origin::User)
            .unwrap();
        assert!(manager.capture_if_due(&mut engine, at(9, 0, 5)).is_some());
        assert!(manager.capture_if_due(&mut engine, at(9, 0, 10)).is_none());
        assert!(manager.capture_if_due(&mut engine, at(9, 0, 20)).is_some());
        let snapshot = engine.block().unwrap().active_run.clone().unwrap();
        assert_eq!(snapshot.captured_at, at(9, 0, 20));
        assert_eq!(snapshot.cursor(), 20);
    }

    #[test]
    fn block_without_snapshot_is_nothing() {
        let mut manager = RecoveryManager::default();
        let mut engine = TimerEngine::new(BlockClock::utc());
        let outcome = manager.recover(&mut engine, block27(), at(9, 5, 0)).unwrap();
        assert_eq!(outcome, RecoveryOutcome::Nothing);
        assert_eq!(engine.state(), TimerState::Idle);
    }

    #[test]
    fn paused_snapshot_past_boundary_credits_until_pause() {
        let mut engine = TimerEngine::new(BlockClock::utc());
        engine
            .start(block27(), at(9, 0, 0), None, None, Origin::User)
            .unwrap();
        engine.pause(at(9, 4, 0)).unwrap();
        let persisted = engine.block().unwrap().clone();

        let mut fresh = TimerEngine::new(BlockClock::utc());
        let mut manager = RecoveryManager::default();
        let outcome = manager.recover(&mut fresh, persisted, at(10, 0, 0)).unwrap();
        match outcome {
            RecoveryOutcome::Completed(Event::TimerCompleted {
                outcome,
                used_seconds,
                ..
            }) => {
                assert_eq!(outcome, CompletionOutcome::PausedExpiry);
                assert_eq!(used_seconds, 240);
            }
            other => panic!("unexpected {other:?}"),
        }
        let block = fresh.block().unwrap();
        assert!(block.active_run.is_none());
        assert_eq!(block.status, BlockStatus::Idle);
    }

    #[test]
    fn paused_snapshot_before_boundary_restores_paused() {
        let mut engine = TimerEngine::new(BlockClock::utc());
        engine
            .start(block27(), at(9, 0, 0), None, None, Origin::User)
            .unwrap();
        engine.pause(at(9, 4, 0)).unwrap();
        let persisted = engine.block().unwrap().clone();

        let mut fresh = TimerEngine::new(BlockClock::utc());
        let mut manager = RecoveryManager::default();
        let outcome = manager.recover(&mut fresh, persisted, at(9, 10, 0)).unwrap();
        assert!(matches!(
            outcome,
            RecoveryOutcome::Restored(Event::TimerRecovered { paused: true, .. })
        ));
        assert_eq!(fresh.state(), TimerState::Paused);
        assert_eq!(fresh.time_left_secs(at(9, 10, 0)), Some(960));
    }
}
