//! Block timer state machine.
//!
//! The engine is wall-clock based and has no internal thread: the caller
//! passes `now` into every command and calls `tick()` periodically. All
//! remaining-time values are derived from the block's absolute end instant,
//! so missed ticks or a suspended process never introduce drift.
//!
//! ## State Transitions
//!
//! ```text
//! Idle/Completed/Skipped -> RunningWork <-> RunningBreak
//! Running* -> Paused -> Running* | Completed (paused expiry)
//! Running* | Paused -> Completed (boundary or stop)
//! Idle/Completed -> Skipped
//! ```
//!
//! A pause ends the current run at the pause instant. Resuming starts a new
//! run whose scale factor is locked against the real time left, so the fill
//! still reaches 100% exactly at the boundary.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::Origin;
use crate::block::{
    ActiveRunSnapshot, Block, BlockClock, BlockSegment, BlockStatus, LockRefused, Run,
    ScaleFactor, SegmentKind, SegmentLedger,
};
use crate::error::TransitionError;
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    Idle,
    RunningWork,
    RunningBreak,
    Paused,
    Completed,
    Skipped,
}

impl TimerState {
    fn running(mode: SegmentKind) -> Self {
        match mode {
            SegmentKind::Work => TimerState::RunningWork,
            SegmentKind::Break => TimerState::RunningBreak,
        }
    }

    pub fn is_running(self) -> bool {
        matches!(self, TimerState::RunningWork | TimerState::RunningBreak)
    }

    /// A run is in flight (running or paused).
    pub fn has_session(self) -> bool {
        self.is_running() || self == TimerState::Paused
    }
}

/// How a timer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompletionOutcome {
    /// The countdown reached the block boundary while running.
    Natural { mode: SegmentKind },
    /// The boundary passed while paused; the user must act.
    PausedExpiry,
    /// The user stopped early.
    Stopped { mark_complete: bool },
}

impl CompletionOutcome {
    pub fn allows_auto_continue(&self) -> bool {
        matches!(self, CompletionOutcome::Natural { .. })
    }
}

/// The last finished timer, kept so "continue" can carry the work context
/// into the next block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub date: NaiveDate,
    pub block_index: u8,
    pub run_id: Option<String>,
    pub outcome: CompletionOutcome,
    pub at: DateTime<Utc>,
    pub last_work_category: Option<String>,
    pub last_work_label: Option<String>,
}

/// The run currently accumulating segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveRun {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub start_elapsed: u32,
    scale_factor: ScaleFactor,
    pub ledger: SegmentLedger,
}

impl ActiveRun {
    fn new(
        started_at: DateTime<Utc>,
        start_elapsed: u32,
        scale_factor: ScaleFactor,
        mode: SegmentKind,
        category: Option<String>,
        label: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at,
            start_elapsed,
            scale_factor,
            ledger: SegmentLedger::open(start_elapsed, mode, category, label),
        }
    }

    /// Rebuild from a snapshot, keeping its locked factor.
    fn from_snapshot(snapshot: &ActiveRunSnapshot) -> Self {
        let (category, label) = work_context(snapshot.mode, &snapshot.category, &snapshot.label);
        let mut ledger =
            SegmentLedger::from_segments(snapshot.start_elapsed, &snapshot.segments, snapshot.mode);
        let cursor = ledger.cursor();
        ledger.append_or_extend(snapshot.mode, category, label, cursor);
        Self {
            id: snapshot.run_id.clone(),
            started_at: snapshot.started_at,
            start_elapsed: snapshot.start_elapsed,
            scale_factor: snapshot.scale_factor,
            ledger,
        }
    }

    pub fn scale_factor(&self) -> ScaleFactor {
        self.scale_factor
    }

    fn finish(mut self, ended_at: DateTime<Utc>, at_elapsed: u32) -> Run {
        let segments = self.ledger.close(at_elapsed);
        Run {
            id: self.id,
            started_at: self.started_at,
            ended_at: Some(ended_at),
            start_elapsed: self.start_elapsed,
            scale_factor: self.scale_factor,
            segments,
        }
    }
}

fn work_context(
    mode: SegmentKind,
    category: &Option<String>,
    label: &Option<String>,
) -> (Option<String>, Option<String>) {
    match mode {
        SegmentKind::Work => (category.clone(), label.clone()),
        SegmentKind::Break => (None, None),
    }
}

/// Ephemeral state of the timer bound to one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSession {
    pub date: NaiveDate,
    pub block_index: u8,
    pub block_end: DateTime<Utc>,
    pub mode: SegmentKind,
    pub category: Option<String>,
    pub label: Option<String>,
    /// Restored by "back to work".
    pub last_work_category: Option<String>,
    pub last_work_label: Option<String>,
    pub paused_at: Option<DateTime<Utc>>,
    pub seconds_used_at_pause: Option<u32>,
    pub time_left_at_pause: Option<i64>,
    pub run: ActiveRun,
}

impl TimerSession {
    fn snapshot(&self, at_elapsed: u32, now: DateTime<Utc>) -> ActiveRunSnapshot {
        ActiveRunSnapshot {
            run_id: self.run.id.clone(),
            started_at: self.run.started_at,
            start_elapsed: self.run.start_elapsed,
            scale_factor: self.run.scale_factor,
            segments: self.run.ledger.segments_at(at_elapsed),
            mode: self.mode,
            category: self.category.clone(),
            label: self.label.clone(),
            last_work_category: self.last_work_category.clone(),
            last_work_label: self.last_work_label.clone(),
            paused_at: self.paused_at,
            captured_at: now,
        }
    }
}

/// Core timer engine.
///
/// Operates on wall-clock deltas -- no internal thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEngine {
    clock: BlockClock,
    state: TimerState,
    #[serde(default)]
    session: Option<TimerSession>,
    /// Block bound to the session, or the last block the engine touched.
    #[serde(default)]
    block: Option<Block>,
    #[serde(default)]
    last_completion: Option<Completion>,
}

impl TimerEngine {
    pub fn new(clock: BlockClock) -> Self {
        Self {
            clock,
            state: TimerState::Idle,
            session: None,
            block: None,
            last_completion: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn block_clock(&self) -> BlockClock {
        self.clock
    }

    pub fn session(&self) -> Option<&TimerSession> {
        self.session.as_ref()
    }

    pub fn block(&self) -> Option<&Block> {
        self.block.as_ref()
    }

    /// Caller-side edits on the bound block (status, plan, note, flags).
    pub fn block_mut(&mut self) -> Option<&mut Block> {
        self.block.as_mut()
    }

    pub fn last_completion(&self) -> Option<&Completion> {
        self.last_completion.as_ref()
    }

    /// Countdown shown to the user. Frozen while paused.
    pub fn time_left_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        let session = self.session.as_ref()?;
        match session.time_left_at_pause {
            Some(frozen) if self.state == TimerState::Paused => Some(frozen),
            _ => Some((session.block_end - now).num_seconds().max(0)),
        }
    }

    /// Seconds into the active block the ledger has reached (or would reach
    /// at `now` while running).
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<u32> {
        let session = self.session.as_ref()?;
        Some(self.ledger_position(session, now))
    }

    /// Normalized segments of the in-flight run, extended to `now`.
    pub fn live_segments(&self, now: DateTime<Utc>) -> Vec<BlockSegment> {
        match self.session.as_ref() {
            Some(session) => session
                .run
                .ledger
                .segments_at(self.ledger_position(session, now)),
            None => Vec::new(),
        }
    }

    fn ledger_position(&self, session: &TimerSession, now: DateTime<Utc>) -> u32 {
        if session.paused_at.is_some() {
            session.run.ledger.cursor()
        } else {
            self.clock
                .elapsed_in(session.date, session.block_index, now)
                .max(session.run.ledger.cursor())
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a run on `block`, which must be the block containing `now`.
    /// Category and label default to what the block was planned for.
    pub fn start(
        &mut self,
        mut block: Block,
        now: DateTime<Utc>,
        category: Option<String>,
        label: Option<String>,
        origin: Origin,
    ) -> Result<Event, TransitionError> {
        if self.state.has_session() {
            return Err(self.reject("start"));
        }
        let position = self.clock.locate(now);
        if block.date != position.date {
            return Err(rejected(TransitionError::WrongDate {
                requested: block.date,
                current: position.date,
            }));
        }
        if block.block_index != position.block_index {
            return Err(rejected(TransitionError::WrongBlock {
                requested: block.block_index,
                current: position.block_index,
            }));
        }
        if block.status == BlockStatus::Skipped {
            return Err(rejected(TransitionError::BlockSkipped {
                block_index: block.block_index,
            }));
        }
        if let Some(stale) = block.active_run.take() {
            warn!(
                block_index = block.block_index,
                run_id = %stale.run_id,
                "finalizing leftover snapshot before starting a new run"
            );
            let ended_at = stale.paused_at.unwrap_or(stale.captured_at);
            block.finalize_run(stale.into_run(ended_at));
        }

        let remaining = self
            .clock
            .remaining_seconds(position.date, position.block_index, now);
        let factor = ScaleFactor::lock(block.previous_visual_proportion(), remaining)
            .map_err(|refused| lock_refused(refused, block.block_index))?;

        let category = category.or_else(|| block.category.clone());
        let label = label.or_else(|| block.label.clone());
        let run = ActiveRun::new(
            now,
            position.elapsed,
            factor,
            SegmentKind::Work,
            category.clone(),
            label.clone(),
        );
        let run_id = run.id.clone();

        self.session = Some(TimerSession {
            date: position.date,
            block_index: position.block_index,
            block_end: self.clock.block_end(position.date, position.block_index),
            mode: SegmentKind::Work,
            category: category.clone(),
            label: label.clone(),
            last_work_category: category.clone(),
            last_work_label: label.clone(),
            paused_at: None,
            seconds_used_at_pause: None,
            time_left_at_pause: None,
            run,
        });
        self.block = Some(block);
        self.state = TimerState::RunningWork;
        self.refresh_snapshot(now);

        info!(
            block_index = position.block_index,
            run_id = %run_id,
            scale_factor = factor.value(),
            remaining,
            ?origin,
            "timer started"
        );
        Ok(Event::TimerStarted {
            date: position.date,
            block_index: position.block_index,
            run_id,
            category,
            label,
            scale_factor: factor.value(),
            remaining_secs: remaining,
            origin,
            at: now,
        })
    }

    pub fn switch_to_break(&mut self, now: DateTime<Utc>) -> Result<Event, TransitionError> {
        self.switch_mode(now, SegmentKind::Break, "switch_to_break")
    }

    /// Back to work with the last-used work category and label.
    pub fn switch_to_work(&mut self, now: DateTime<Utc>) -> Result<Event, TransitionError> {
        self.switch_mode(now, SegmentKind::Work, "switch_to_work")
    }

    fn switch_mode(
        &mut self,
        now: DateTime<Utc>,
        mode: SegmentKind,
        action: &'static str,
    ) -> Result<Event, TransitionError> {
        if !self.state.is_running() {
            return Err(self.reject(action));
        }
        let clock = self.clock;
        let session = self
            .session
            .as_mut()
            .ok_or(TransitionError::NoActiveSession)?;
        let elapsed = clock.elapsed_in(session.date, session.block_index, now);
        let (category, label) =
            work_context(mode, &session.last_work_category, &session.last_work_label);
        session
            .run
            .ledger
            .append_or_extend(mode, category.clone(), label.clone(), elapsed);
        session.mode = mode;
        session.category = category;
        session.label = label;
        let block_index = session.block_index;
        let elapsed = session.run.ledger.cursor();

        self.state = TimerState::running(mode);
        self.refresh_snapshot(now);
        info!(block_index, ?mode, elapsed, "timer mode switched");
        Ok(Event::ModeSwitched {
            block_index,
            mode,
            elapsed,
            at: now,
        })
    }

    /// Change what the user is working on without stopping the timer.
    pub fn set_work_context(
        &mut self,
        now: DateTime<Utc>,
        category: Option<String>,
        label: Option<String>,
    ) -> Result<Event, TransitionError> {
        if !self.state.is_running() {
            return Err(self.reject("set_work_context"));
        }
        let clock = self.clock;
        let session = self
            .session
            .as_mut()
            .ok_or(TransitionError::NoActiveSession)?;
        session.last_work_category = category.clone();
        session.last_work_label = label.clone();
        if session.mode == SegmentKind::Work {
            let elapsed = clock.elapsed_in(session.date, session.block_index, now);
            session.run.ledger.append_or_extend(
                SegmentKind::Work,
                category.clone(),
                label.clone(),
                elapsed,
            );
            session.category = category.clone();
            session.label = label.clone();
        }
        let block_index = session.block_index;
        self.refresh_snapshot(now);
        Ok(Event::WorkContextChanged {
            block_index,
            category,
            label,
            at: now,
        })
    }

    /// Freeze the countdown. The current segment is closed before returning;
    /// the block boundary keeps approaching in real time.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<Event, TransitionError> {
        if !self.state.is_running() {
            return Err(self.reject("pause"));
        }
        let finished: u32 = self
            .block
            .as_ref()
            .map(|b| b.runs.iter().map(Run::used_seconds).sum())
            .unwrap_or(0);
        let clock = self.clock;
        let session = self
            .session
            .as_mut()
            .ok_or(TransitionError::NoActiveSession)?;
        let elapsed = clock.elapsed_in(session.date, session.block_index, now);
        session.run.ledger.extend_to(elapsed);
        let time_left = (session.block_end - now).num_seconds().max(0);
        let used = finished + session.run.ledger.covered_seconds();
        session.paused_at = Some(now);
        session.time_left_at_pause = Some(time_left);
        session.seconds_used_at_pause = Some(used);
        let block_index = session.block_index;

        self.state = TimerState::Paused;
        self.refresh_snapshot(now);
        info!(block_index, seconds_used_at_pause = used, time_left, "timer paused");
        Ok(Event::TimerPaused {
            block_index,
            seconds_used_at_pause: used,
            time_left_secs: time_left,
            at: now,
        })
    }

    /// Resume after a pause. The paused run is finalized at the pause
    /// instant; if the boundary already passed the timer completes with a
    /// paused-expiry outcome instead of resuming.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<Event, TransitionError> {
        if self.state != TimerState::Paused {
            return Err(rejected(TransitionError::NotPaused));
        }
        let Some(mut session) = self.session.take() else {
            return Err(rejected(TransitionError::NoActiveSession));
        };
        let paused_at = session.paused_at.unwrap_or(now);
        let cursor = session.run.ledger.cursor();
        let paused_run = session.run.clone().finish(paused_at, cursor);
        let paused_run_id = paused_run.id.clone();
        if let Some(block) = self.block.as_mut() {
            block.finalize_run(paused_run);
        }

        let remaining = self
            .clock
            .remaining_seconds(session.date, session.block_index, now);
        if remaining <= 0 {
            info!(
                block_index = session.block_index,
                "boundary passed while paused"
            );
            return Ok(self.conclude(
                &session,
                Some(paused_run_id),
                CompletionOutcome::PausedExpiry,
                paused_at,
            ));
        }

        let previous = self
            .block
            .as_ref()
            .map(Block::previous_visual_proportion)
            .unwrap_or(0.0);
        let factor = match ScaleFactor::lock(previous, remaining) {
            Ok(factor) => factor,
            Err(_) => {
                let mode = session.mode;
                return Ok(self.conclude(
                    &session,
                    Some(paused_run_id),
                    CompletionOutcome::Natural { mode },
                    paused_at,
                ));
            }
        };

        let elapsed = self
            .clock
            .elapsed_in(session.date, session.block_index, now);
        let (category, label) = work_context(session.mode, &session.category, &session.label);
        session.run = ActiveRun::new(now, elapsed, factor, session.mode, category, label);
        session.paused_at = None;
        session.time_left_at_pause = None;
        session.seconds_used_at_pause = None;
        let run_id = session.run.id.clone();
        let block_index = session.block_index;
        self.state = TimerState::running(session.mode);
        self.session = Some(session);
        self.refresh_snapshot(now);

        info!(
            block_index,
            run_id = %run_id,
            scale_factor = factor.value(),
            remaining,
            "timer resumed"
        );
        Ok(Event::TimerResumed {
            block_index,
            run_id,
            scale_factor: factor.value(),
            remaining_secs: remaining,
            at: now,
        })
    }

    /// The countdown reached zero. Legal while running once the boundary
    /// passed, or while paused past the boundary.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<Event, TransitionError> {
        let Some(session) = self.session.as_ref() else {
            return Err(self.reject("complete"));
        };
        let remaining = (session.block_end - now).num_seconds();
        if remaining > 0 {
            return Err(rejected(TransitionError::NotYetEnded {
                block_index: session.block_index,
                remaining_secs: remaining,
            }));
        }
        let outcome = match self.state {
            TimerState::RunningWork | TimerState::RunningBreak => CompletionOutcome::Natural {
                mode: session.mode,
            },
            TimerState::Paused => CompletionOutcome::PausedExpiry,
            _ => return Err(self.reject("complete")),
        };
        self.finish(now, outcome)
    }

    /// User-initiated early termination at the current elapsed time.
    pub fn stop(&mut self, now: DateTime<Utc>, mark_complete: bool) -> Result<Event, TransitionError> {
        if !self.state.has_session() {
            return Err(self.reject("stop"));
        }
        self.finish(now, CompletionOutcome::Stopped { mark_complete })
    }

    /// Mark a block skipped. Only legal with no run in flight and no
    /// recorded time on the block.
    pub fn skip(
        &mut self,
        mut block: Block,
        now: DateTime<Utc>,
        origin: Origin,
    ) -> Result<Event, TransitionError> {
        if self.state.has_session() {
            return Err(self.reject("skip"));
        }
        block.set_status(BlockStatus::Skipped).map_err(rejected)?;
        let event = Event::BlockSkipped {
            date: block.date,
            block_index: block.block_index,
            origin,
            at: now,
        };
        info!(block_index = block.block_index, ?origin, "block skipped");
        self.block = Some(block);
        self.state = TimerState::Skipped;
        Ok(event)
    }

    /// Call periodically. Returns the completion event once the boundary
    /// passed. A paused timer stays frozen until then and expires with it.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if !self.state.has_session() {
            return None;
        }
        let session = self.session.as_ref()?;
        if now < session.block_end {
            return None;
        }
        let outcome = match self.state {
            TimerState::Paused => CompletionOutcome::PausedExpiry,
            _ => CompletionOutcome::Natural { mode: session.mode },
        };
        self.finish(now, outcome).ok()
    }

    /// Write the in-flight run onto the bound block.
    pub fn refresh_snapshot(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let session = self.session.as_ref()?;
        let position = self.ledger_position(session, now);
        let snapshot = session.snapshot(position, now);
        let run_id = snapshot.run_id.clone();
        let block_index = session.block_index;
        let block = self.block.as_mut()?;
        block.set_snapshot(snapshot);
        debug!(block_index, run_id = %run_id, "snapshot refreshed");
        Some(Event::SnapshotSaved {
            block_index,
            run_id,
            at: now,
        })
    }

    /// Restore a session from the snapshot on `block`. The snapshot's locked
    /// factor is reused; the countdown is recomputed from the clock.
    pub fn restore(&mut self, block: Block, now: DateTime<Utc>) -> Result<Event, TransitionError> {
        if self.state.has_session() {
            return Err(self.reject("restore"));
        }
        let Some(snapshot) = block.active_run.clone() else {
            return Err(rejected(TransitionError::NoActiveSession));
        };
        let block_end = self.clock.block_end(block.date, block.block_index);
        if now >= block_end {
            return Err(rejected(TransitionError::BlockEnded {
                block_index: block.block_index,
            }));
        }

        let run = ActiveRun::from_snapshot(&snapshot);
        let finished: u32 = block.runs.iter().map(Run::used_seconds).sum();
        let paused = snapshot.paused_at.is_some();
        let session = TimerSession {
            date: block.date,
            block_index: block.block_index,
            block_end,
            mode: snapshot.mode,
            category: snapshot.category.clone(),
            label: snapshot.label.clone(),
            last_work_category: snapshot.last_work_category.clone(),
            last_work_label: snapshot.last_work_label.clone(),
            paused_at: snapshot.paused_at,
            seconds_used_at_pause: paused.then(|| finished + run.ledger.covered_seconds()),
            time_left_at_pause: snapshot
                .paused_at
                .map(|p| (block_end - p).num_seconds().max(0)),
            run,
        };
        let event = Event::TimerRecovered {
            date: block.date,
            block_index: block.block_index,
            run_id: snapshot.run_id.clone(),
            paused,
            at: now,
        };
        self.state = if paused {
            TimerState::Paused
        } else {
            TimerState::running(snapshot.mode)
        };
        self.session = Some(session);
        self.block = Some(block);
        self.refresh_snapshot(now);
        info!(run_id = %snapshot.run_id, paused, "timer restored from snapshot");
        Ok(event)
    }

    /// Finalize a snapshot whose block ended while the process was away.
    /// Running snapshots are credited up to the boundary, paused ones up to
    /// the pause instant. Time between the last capture and the boundary is
    /// credited in the snapshot's mode.
    pub fn complete_from_snapshot(
        &mut self,
        mut block: Block,
        now: DateTime<Utc>,
    ) -> Result<Event, TransitionError> {
        if self.state.has_session() {
            return Err(self.reject("complete_from_snapshot"));
        }
        let Some(snapshot) = block.active_run.clone() else {
            return Err(rejected(TransitionError::NoActiveSession));
        };
        let block_end = self.clock.block_end(block.date, block.block_index);
        if now < block_end {
            return Err(rejected(TransitionError::NotYetEnded {
                block_index: block.block_index,
                remaining_secs: (block_end - now).num_seconds(),
            }));
        }

        let run = ActiveRun::from_snapshot(&snapshot);
        let (outcome, ended_at, at_elapsed) = match snapshot.paused_at {
            Some(paused_at) => (
                CompletionOutcome::PausedExpiry,
                paused_at,
                run.ledger.cursor(),
            ),
            None => (
                CompletionOutcome::Natural {
                    mode: snapshot.mode,
                },
                block_end,
                crate::block::BLOCK_SECONDS,
            ),
        };
        let finished = run.finish(ended_at, at_elapsed);
        let run_id = finished.id.clone();
        block.finalize_run(finished);

        let session = TimerSession {
            date: block.date,
            block_index: block.block_index,
            block_end,
            mode: snapshot.mode,
            category: snapshot.category.clone(),
            label: snapshot.label.clone(),
            last_work_category: snapshot.last_work_category.clone(),
            last_work_label: snapshot.last_work_label.clone(),
            paused_at: snapshot.paused_at,
            seconds_used_at_pause: None,
            time_left_at_pause: None,
            run: ActiveRun::from_snapshot(&snapshot),
        };
        self.block = Some(block);
        Ok(self.conclude(&session, Some(run_id), outcome, ended_at))
    }

    /// Adopt user edits from a freshly fetched copy of the bound block.
    pub fn refresh_block(&mut self, remote: Block) {
        if let Some(block) = self.block.as_mut() {
            if block.key() == remote.key() {
                block.merge_remote(remote);
            }
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn finish(
        &mut self,
        now: DateTime<Utc>,
        outcome: CompletionOutcome,
    ) -> Result<Event, TransitionError> {
        let Some(session) = self.session.take() else {
            return Err(rejected(TransitionError::NoActiveSession));
        };
        let (ended_at, at_elapsed) = match session.paused_at {
            Some(paused_at) => (paused_at, session.run.ledger.cursor()),
            None => (
                now.min(session.block_end),
                self.clock
                    .elapsed_in(session.date, session.block_index, now)
                    .max(session.run.ledger.cursor()),
            ),
        };
        let run = session.run.clone().finish(ended_at, at_elapsed);
        let run_id = run.id.clone();
        if let Some(block) = self.block.as_mut() {
            block.finalize_run(run);
        }
        Ok(self.conclude(&session, Some(run_id), outcome, ended_at))
    }

    fn conclude(
        &mut self,
        session: &TimerSession,
        run_id: Option<String>,
        outcome: CompletionOutcome,
        at: DateTime<Utc>,
    ) -> Event {
        self.session = None;
        self.state = TimerState::Completed;
        let used_seconds = self.block.as_ref().map(|b| b.used_seconds).unwrap_or(0);
        self.last_completion = Some(Completion {
            date: session.date,
            block_index: session.block_index,
            run_id: run_id.clone(),
            outcome,
            at,
            last_work_category: session.last_work_category.clone(),
            last_work_label: session.last_work_label.clone(),
        });
        info!(
            block_index = session.block_index,
            ?outcome,
            used_seconds,
            "timer completed"
        );
        Event::TimerCompleted {
            date: session.date,
            block_index: session.block_index,
            run_id,
            outcome,
            used_seconds,
            at,
        }
    }

    fn reject(&self, action: &'static str) -> TransitionError {
        rejected(TransitionError::InvalidState {
            action,
            state: self.state,
        })
    }
}

fn rejected(err: TransitionError) -> TransitionError {
    warn!(%err, "transition rejected");
    err
}

fn lock_refused(refused: LockRefused, block_index: u8) -> TransitionError {
    rejected(match refused {
        LockRefused::BlockEnded => TransitionError::BlockEnded { block_index },
        LockRefused::AlreadyFilled => TransitionError::BlockFilled { block_index },
    })
}
