//! Day tracker: the single owner wiring the timer engine, the schedulers and
//! a block store together.
//!
//! The tracker is the caller the engine defers to. It decides block status
//! after a completion, persists every block the engine touches, retries
//! failed writes with the same run id, and routes scheduler and governor
//! output back into the engine as intents.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::block::{
    block_fill, display_number, displayed_fill, normalize, run_proportion, Block, BlockClock,
    BlockFill, BlockKey, BlockSegment, BlockStatus, DayBlocks, SegmentKind, BLOCKS_PER_DAY,
};
use crate::error::{CoreError, Result, TransitionError};
use crate::events::{Event, EventSink};
use crate::storage::{BlockStore, Config};
use crate::timer::{
    AutoContinueKind, AutoContinueScheduler, AutoContinueSettings, CheckInGovernor,
    CheckInSettings, Completion, CompletionOutcome, Intent, Origin, RecoveryManager,
    RecoveryOutcome, TimerEngine, TimerState,
};

#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub user_id: String,
    pub day_start_hour: u8,
    pub clock: BlockClock,
    pub auto_continue: AutoContinueSettings,
    pub check_in: CheckInSettings,
    pub snapshot_interval_secs: u32,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            user_id: "local".to_string(),
            day_start_hour: 6,
            clock: BlockClock::utc(),
            auto_continue: AutoContinueSettings::default(),
            check_in: CheckInSettings::default(),
            snapshot_interval_secs: 15,
        }
    }
}

impl TrackerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            user_id: config.user_id.clone(),
            day_start_hour: config.day.day_start_hour,
            clock: config.block_clock(),
            auto_continue: config.auto_continue_settings(),
            check_in: config.check_in_settings(),
            snapshot_interval_secs: config.recovery.snapshot_interval_secs,
        }
    }
}

/// Everything the tracker needs to pick up where it left off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerState {
    pub engine: TimerEngine,
    #[serde(default)]
    pub scheduler: AutoContinueScheduler,
    #[serde(default)]
    pub governor: CheckInGovernor,
    #[serde(default)]
    pub recovery: RecoveryManager,
    /// Blocks whose last write failed.
    #[serde(default)]
    pub pending_writes: Vec<Block>,
}

/// Summary of the in-flight run for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub date: NaiveDate,
    pub block_index: u8,
    pub mode: SegmentKind,
    pub category: Option<String>,
    pub label: Option<String>,
    pub run_id: String,
    pub scale_factor: f64,
    pub paused: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoContinueView {
    pub kind: AutoContinueKind,
    pub remaining_secs: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckInView {
    pub consecutive_autonomous: u32,
    pub remaining_secs: i64,
}

/// Published view of the timer, recomputed on demand.
#[derive(Debug, Clone, Serialize)]
pub struct TimerView {
    pub state: TimerState,
    /// Block containing `now`.
    pub date: NaiveDate,
    pub block_index: u8,
    pub display_number: u8,
    pub session: Option<SessionView>,
    pub time_left_secs: Option<i64>,
    /// Normalized segments of the shown block, live run included.
    pub segments: Vec<BlockSegment>,
    pub fill: BlockFill,
    /// `fill` with the sliver floor applied to the live segment.
    pub displayed_fill: BlockFill,
    pub status: BlockStatus,
    pub auto_continue: Option<AutoContinueView>,
    pub check_in: Option<CheckInView>,
    pub last_completion: Option<Completion>,
}

pub struct DayTracker<S: BlockStore> {
    store: S,
    settings: TrackerSettings,
    engine: TimerEngine,
    scheduler: AutoContinueScheduler,
    governor: CheckInGovernor,
    recovery: RecoveryManager,
    pending: BTreeMap<BlockKey, Block>,
    sinks: Vec<Box<dyn EventSink>>,
}

impl<S: BlockStore> DayTracker<S> {
    pub fn new(store: S, settings: TrackerSettings) -> Self {
        Self {
            engine: TimerEngine::new(settings.clock),
            scheduler: AutoContinueScheduler::new(settings.auto_continue),
            governor: CheckInGovernor::new(settings.check_in),
            recovery: RecoveryManager::new(settings.snapshot_interval_secs),
            pending: BTreeMap::new(),
            sinks: Vec::new(),
            store,
            settings,
        }
    }

    /// Resume from a saved state. Current settings override the saved ones.
    pub fn with_state(store: S, settings: TrackerSettings, state: TrackerState) -> Self {
        let TrackerState {
            mut engine,
            mut scheduler,
            mut governor,
            mut recovery,
            pending_writes,
        } = state;
        if engine.block_clock() != settings.clock && !engine.state().has_session() {
            debug!("block clock changed; starting with a fresh engine");
            engine = TimerEngine::new(settings.clock);
        }
        scheduler.set_settings(settings.auto_continue);
        governor.set_settings(settings.check_in);
        recovery.set_interval_secs(settings.snapshot_interval_secs);
        Self {
            engine,
            scheduler,
            governor,
            recovery,
            pending: pending_writes.into_iter().map(|b| (b.key(), b)).collect(),
            sinks: Vec::new(),
            store,
            settings,
        }
    }

    pub fn state(&self) -> TrackerState {
        TrackerState {
            engine: self.engine.clone(),
            scheduler: self.scheduler.clone(),
            governor: self.governor.clone(),
            recovery: self.recovery.clone(),
            pending_writes: self.pending.values().cloned().collect(),
        }
    }

    pub fn subscribe(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn scheduler(&self) -> &AutoContinueScheduler {
        &self.scheduler
    }

    pub fn governor(&self) -> &CheckInGovernor {
        &self.governor
    }

    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    fn clock(&self) -> BlockClock {
        self.settings.clock
    }

    fn user_id(&self) -> &str {
        &self.settings.user_id
    }

    // ── Intents ──────────────────────────────────────────────────────

    /// Apply an intent. Autonomous intents travel the same path as user
    /// ones; only the governor bookkeeping differs.
    pub fn dispatch(&mut self, intent: Intent, origin: Origin, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        let outcome = self.apply(intent, origin, now, &mut events);
        self.publish(&events);
        outcome.map(|()| events)
    }

    fn apply(
        &mut self,
        intent: Intent,
        origin: Origin,
        now: DateTime<Utc>,
        events: &mut Vec<Event>,
    ) -> Result<()> {
        debug!(intent = intent.name(), ?origin, "dispatching intent");
        let is_advance = matches!(intent, Intent::Continue | Intent::BackToWork);
        let event = match intent {
            Intent::Start { category, label } => self.start_current(now, category, label, origin)?,
            Intent::Continue | Intent::BackToWork => {
                let (category, label) = self
                    .engine
                    .last_completion()
                    .map(|c| (c.last_work_category.clone(), c.last_work_label.clone()))
                    .unwrap_or((None, None));
                self.start_current(now, category, label, origin)?
            }
            Intent::SwitchToBreak => self.engine.switch_to_break(now)?,
            Intent::SwitchToWork => self.engine.switch_to_work(now)?,
            Intent::SetWorkContext { category, label } => {
                self.engine.set_work_context(now, category, label)?
            }
            Intent::Pause => self.engine.pause(now)?,
            Intent::Resume => {
                if let Some(session) = self.engine.session() {
                    let (date, index) = (session.date, session.block_index);
                    if let Some(remote) = self.store.fetch_block(self.user_id(), date, index)? {
                        self.engine.refresh_block(remote);
                    }
                }
                self.engine.resume(now)?
            }
            Intent::Stop { mark_complete } => self.engine.stop(now, mark_complete)?,
            Intent::Skip { block_index } => self.skip(block_index, origin, now)?,
        };

        if origin == Origin::User {
            self.governor.record_user_action();
            if let Some(cancelled) = self.scheduler.cancel() {
                events.push(Event::AutoContinueCancelled {
                    kind: cancelled.kind,
                    at: now,
                });
            }
        } else if is_advance {
            self.governor.record_autonomous_advance();
        }

        self.absorb(event, events);
        if self.engine.state().has_session() {
            self.recovery.note_captured(now);
        }
        self.persist_engine_block(now, events);
        Ok(())
    }

    fn start_current(
        &mut self,
        now: DateTime<Utc>,
        category: Option<String>,
        label: Option<String>,
        origin: Origin,
    ) -> Result<Event> {
        let position = self.clock().locate(now);
        let block = self.load_block(position.date, position.block_index)?;
        Ok(self.engine.start(block, now, category, label, origin)?)
    }

    fn skip(&mut self, block_index: Option<u8>, origin: Origin, now: DateTime<Utc>) -> Result<Event> {
        let position = self.clock().locate(now);
        let index = block_index.unwrap_or(position.block_index);
        if index >= BLOCKS_PER_DAY {
            return Err(TransitionError::BlockOutOfRange(index).into());
        }
        let block = self.load_block(position.date, index)?;
        Ok(self.engine.skip(block, now, origin)?)
    }

    // ── Ticks ────────────────────────────────────────────────────────

    /// Periodic wake-up. Completes the timer at the boundary, takes the
    /// periodic snapshot, expires grace periods and fires auto-continue.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let mut events = Vec::new();

        if let Some(event) = self.engine.tick(now) {
            self.absorb(event, &mut events);
            self.persist_engine_block(now, &mut events);
        }

        if let Some(event) = self.recovery.capture_if_due(&mut self.engine, now) {
            events.push(event);
            self.persist_engine_block(now, &mut events);
        }

        if let Some(grace) = self.governor.poll(now) {
            self.expire_check_in(grace.follow_up_block(), now, &mut events);
        }

        let clock = self.clock();
        if let Some((kind, intent)) = self.scheduler.poll(now, &clock) {
            events.push(Event::AutoContinueFired { kind, at: now });
            if let Err(err) = self.apply(intent, Origin::Autonomous, now, &mut events) {
                warn!(%err, ?kind, "auto-continue could not start the next block");
            }
        }

        if !self.pending.is_empty() {
            if let Err(err) = self.retry_pending() {
                debug!(%err, "pending block writes still failing");
            }
        }

        self.publish(&events);
        events
    }

    /// Skip `target` if it is still the current block and nobody touched it.
    /// A wake-up past `target` skips nothing.
    fn expire_check_in(
        &mut self,
        target: (NaiveDate, u8),
        now: DateTime<Utc>,
        events: &mut Vec<Event>,
    ) {
        let (date, block_index) = target;
        let position = self.clock().locate(now);
        let current = (position.date, position.block_index) == target;
        if !current {
            debug!(
                block_index,
                now_block = position.block_index,
                "check-in expired after its block ended"
            );
        }
        let mut skipped = false;
        if current && !self.engine.state().has_session() {
            match self.load_block(date, block_index) {
                Ok(block) if block.used_seconds == 0 && block.status != BlockStatus::Skipped => {
                    match self.engine.skip(block, now, Origin::Autonomous) {
                        Ok(event) => {
                            events.push(event);
                            skipped = true;
                            self.persist_engine_block(now, events);
                        }
                        Err(err) => debug!(%err, "check-in expiry left block untouched"),
                    }
                }
                Ok(_) => {}
                Err(err) => warn!(%err, "could not load block for check-in expiry"),
            }
        }
        events.push(Event::CheckInExpired {
            block_index,
            skipped,
            at: now,
        });
    }

    /// Decide block status and what happens next after a completion.
    fn absorb(&mut self, event: Event, events: &mut Vec<Event>) {
        let completion = match &event {
            Event::TimerCompleted {
                date,
                block_index,
                outcome,
                at,
                ..
            } => Some((*date, *block_index, *outcome, *at)),
            _ => None,
        };
        events.push(event);
        let Some((date, block_index, outcome, at)) = completion else {
            return;
        };

        let counts_as_done = matches!(
            outcome,
            CompletionOutcome::Natural { .. } | CompletionOutcome::Stopped { mark_complete: true }
        );
        if counts_as_done {
            if let Some(block) = self.engine.block_mut() {
                if block.mark_done_if_used() {
                    debug!(block_index, "block marked done");
                }
            }
        }

        if !outcome.allows_auto_continue() {
            return;
        }
        if self.governor.requires_check_in() {
            let grace = self.governor.enter_grace(at, date, block_index);
            events.push(Event::CheckInRequired {
                consecutive_autonomous: self.governor.consecutive_autonomous(),
                expires_at: grace.expires_at(),
            });
        } else if let Some(pending) = self.scheduler.arm(&outcome, date, block_index, at) {
            info!(kind = ?pending.kind, fires_at = %pending.fires_at(), "auto-continue armed");
            events.push(Event::AutoContinueArmed {
                kind: pending.kind,
                fires_at: pending.fires_at(),
            });
        }
    }

    // ── Recovery ─────────────────────────────────────────────────────

    /// Resolve snapshots left in the store by a previous process. Looks at
    /// today and yesterday, oldest first.
    pub fn recover(&mut self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        if self.engine.state().has_session() {
            return Ok(events);
        }
        let today = self.clock().date_of(now);
        let yesterday = today - Duration::days(1);

        let mut candidates = Vec::new();
        for date in [yesterday, today] {
            candidates.extend(
                self.store
                    .fetch_day(self.user_id(), date)?
                    .into_iter()
                    .filter(|b| b.active_run.is_some()),
            );
        }

        for block in candidates {
            let (date, block_index) = (block.date, block.block_index);
            match self.recovery.recover(&mut self.engine, block.clone(), now) {
                Ok(RecoveryOutcome::Completed(event)) => {
                    events.push(Event::BoundaryCrossedInBackground {
                        date,
                        block_index,
                        at: now,
                    });
                    self.absorb(event, &mut events);
                    self.persist_engine_block(now, &mut events);
                }
                Ok(RecoveryOutcome::Restored(event)) => {
                    events.push(event);
                    self.persist_engine_block(now, &mut events);
                }
                Ok(RecoveryOutcome::Nothing) => {}
                Err(err) => {
                    warn!(%err, block_index, "snapshot could not be recovered; folding it into runs");
                    self.fold_snapshot(block, now, &mut events);
                }
            }
        }

        self.publish(&events);
        Ok(events)
    }

    fn fold_snapshot(&mut self, mut block: Block, now: DateTime<Utc>, events: &mut Vec<Event>) {
        if let Some(snapshot) = block.active_run.take() {
            let ended_at = snapshot.paused_at.unwrap_or(snapshot.captured_at);
            block.finalize_run(snapshot.into_run(ended_at));
            self.persist(block, now, events);
        }
    }

    // ── Persistence ──────────────────────────────────────────────────

    fn load_block(&self, date: NaiveDate, block_index: u8) -> Result<Block> {
        let key = BlockKey {
            user_id: self.user_id().to_string(),
            date,
            block_index,
        };
        if let Some(pending) = self.pending.get(&key) {
            return Ok(pending.clone());
        }
        Ok(self
            .store
            .fetch_block(self.user_id(), date, block_index)?
            .unwrap_or_else(|| Block::idle(self.user_id(), date, block_index)))
    }

    fn persist_engine_block(&mut self, now: DateTime<Utc>, events: &mut Vec<Event>) {
        if let Some(block) = self.engine.block().cloned() {
            self.persist(block, now, events);
        }
    }

    fn persist(&mut self, block: Block, now: DateTime<Utc>, events: &mut Vec<Event>) {
        let key = block.key();
        match self.store.upsert(&block) {
            Ok(()) => {
                self.pending.remove(&key);
            }
            Err(err) => {
                let run_id = latest_run_id(&block);
                warn!(
                    %err,
                    date = %block.date,
                    block_index = block.block_index,
                    run_id = ?run_id,
                    "block write failed; keeping it for retry"
                );
                events.push(Event::PersistenceFailed {
                    date: block.date,
                    block_index: block.block_index,
                    run_id,
                    message: err.to_string(),
                    at: now,
                });
                self.pending.insert(key, block);
            }
        }
    }

    fn retry_pending(&mut self) -> Result<()> {
        let mut first_failure = None;
        let keys: Vec<BlockKey> = self.pending.keys().cloned().collect();
        for key in keys {
            let Some(block) = self.pending.get(&key) else {
                continue;
            };
            match self.store.upsert(block) {
                Ok(()) => {
                    debug!(block_index = key.block_index, "pending block write succeeded");
                    self.pending.remove(&key);
                }
                Err(err) => {
                    if first_failure.is_none() {
                        first_failure = Some(CoreError::Persistence {
                            date: block.date,
                            block_index: block.block_index,
                            run_id: latest_run_id(block),
                            message: err.to_string(),
                        });
                    }
                }
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Retry every failed write. The same block content (and run ids) is
    /// written again, so retries are idempotent.
    pub fn flush(&mut self) -> Result<()> {
        self.retry_pending()
    }

    // ── Day access and edits ─────────────────────────────────────────

    /// All 72 blocks of `date`, with unsaved and in-flight changes applied.
    pub fn day(&self, date: NaiveDate) -> Result<DayBlocks> {
        let mut fetched = self.store.fetch_day(self.user_id(), date)?;
        let overlays = self
            .pending
            .values()
            .chain(self.engine.block())
            .filter(|b| b.date == date);
        for block in overlays {
            match fetched.iter_mut().find(|b| b.block_index == block.block_index) {
                Some(existing) => *existing = block.clone(),
                None => fetched.push(block.clone()),
            }
        }
        Ok(DayBlocks::from_fetched(self.user_id(), date, fetched))
    }

    fn edit_block<F>(&mut self, date: NaiveDate, block_index: u8, now: DateTime<Utc>, edit: F) -> Result<Block>
    where
        F: FnOnce(&mut Block) -> Result<(), TransitionError>,
    {
        if block_index >= BLOCKS_PER_DAY {
            return Err(TransitionError::BlockOutOfRange(block_index).into());
        }
        let mut events = Vec::new();
        let bound = self
            .engine
            .block()
            .is_some_and(|b| b.date == date && b.block_index == block_index);
        let edited = if bound {
            match self.engine.block_mut() {
                Some(block) => {
                    edit(block)?;
                    block.clone()
                }
                None => return Err(TransitionError::NoActiveSession.into()),
            }
        } else {
            let mut block = self.load_block(date, block_index)?;
            edit(&mut block)?;
            block
        };
        self.persist(edited.clone(), now, &mut events);
        self.publish(&events);
        Ok(edited)
    }

    /// Assign a category and label; an idle block becomes planned.
    pub fn plan_block(
        &mut self,
        date: NaiveDate,
        block_index: u8,
        category: Option<String>,
        label: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Block> {
        self.edit_block(date, block_index, now, |block| {
            block.plan(category, label);
            Ok(())
        })
    }

    pub fn set_note(&mut self, date: NaiveDate, block_index: u8, note: Option<String>, now: DateTime<Utc>) -> Result<Block> {
        self.edit_block(date, block_index, now, |block| {
            block.note = note;
            Ok(())
        })
    }

    pub fn set_muted(&mut self, date: NaiveDate, block_index: u8, muted: bool, now: DateTime<Utc>) -> Result<Block> {
        self.edit_block(date, block_index, now, |block| {
            block.muted = muted;
            Ok(())
        })
    }

    pub fn set_activated(
        &mut self,
        date: NaiveDate,
        block_index: u8,
        activated: bool,
        now: DateTime<Utc>,
    ) -> Result<Block> {
        self.edit_block(date, block_index, now, |block| {
            block.activated = activated;
            Ok(())
        })
    }

    /// Direct status edit. Skipping a block with recorded time or an
    /// in-flight run is refused.
    pub fn set_status(
        &mut self,
        date: NaiveDate,
        block_index: u8,
        status: BlockStatus,
        now: DateTime<Utc>,
    ) -> Result<Block> {
        let state = self.engine.state();
        self.edit_block(date, block_index, now, |block| {
            if status == BlockStatus::Skipped && block.active_run.is_some() {
                return Err(TransitionError::InvalidState {
                    action: "skip",
                    state,
                });
            }
            block.set_status(status)
        })
    }

    /// Clear everything the timer recorded on `date`. Refused while a run
    /// on that date is in flight.
    pub fn reset_day(&mut self, date: NaiveDate, now: DateTime<Utc>) -> Result<Vec<Event>> {
        if self
            .engine
            .session()
            .is_some_and(|session| session.date == date)
        {
            return Err(TransitionError::InvalidState {
                action: "reset_day",
                state: self.engine.state(),
            }
            .into());
        }

        let mut events = Vec::new();
        for mut block in self.store.fetch_day(self.user_id(), date)? {
            block.reset();
            self.persist(block, now, &mut events);
        }
        if let Some(block) = self.engine.block_mut().filter(|b| b.date == date) {
            block.reset();
        }
        self.pending.retain(|key, _| key.date != date);
        info!(%date, "day reset");
        events.push(Event::DayReset { date, at: now });
        self.publish(&events);
        Ok(events)
    }

    // ── View ─────────────────────────────────────────────────────────

    pub fn view(&self, now: DateTime<Utc>) -> Result<TimerView> {
        let position = self.clock().locate(now);
        let state = self.engine.state();

        let (block, session_view, live) = match self.engine.session() {
            Some(session) => {
                let block = self
                    .engine
                    .block()
                    .cloned()
                    .unwrap_or_else(|| Block::idle(self.user_id(), session.date, session.block_index));
                let view = SessionView {
                    date: session.date,
                    block_index: session.block_index,
                    mode: session.mode,
                    category: session.category.clone(),
                    label: session.label.clone(),
                    run_id: session.run.id.clone(),
                    scale_factor: session.run.scale_factor().value(),
                    paused: session.paused_at.is_some(),
                };
                let live = (
                    session.run.scale_factor(),
                    self.engine.live_segments(now),
                    session.mode,
                    (now - session.run.started_at).num_seconds().max(0) as u32,
                );
                (block, Some(view), Some(live))
            }
            None => (
                self.load_block(position.date, position.block_index)?,
                None,
                None,
            ),
        };

        let finished = block
            .runs
            .iter()
            .map(|r| (r.scale_factor, r.segments.as_slice()));
        let (fill, segments, shown) = match &live {
            Some((factor, live_segments, mode, age)) => {
                let fill = block_fill(finished.chain(std::iter::once((*factor, live_segments.as_slice()))));
                let mut all: Vec<BlockSegment> = block
                    .runs
                    .iter()
                    .flat_map(|r| r.segments.iter().cloned())
                    .collect();
                all.extend(live_segments.iter().cloned());
                let current = live_segments
                    .last()
                    .filter(|s| s.kind == *mode)
                    .map(|s| run_proportion(*factor, s.seconds))
                    .unwrap_or(0.0);
                let live_kind = state.is_running().then_some(*mode);
                let shown = displayed_fill(fill, live_kind, *age, current);
                (fill, normalize(&all), shown)
            }
            None => {
                let fill = block.fill();
                (fill, block.segments.clone(), fill)
            }
        };

        Ok(TimerView {
            state,
            date: position.date,
            block_index: position.block_index,
            display_number: display_number(position.block_index, self.settings.day_start_hour),
            session: session_view,
            time_left_secs: self.engine.time_left_secs(now),
            segments,
            fill,
            displayed_fill: shown,
            status: block.status,
            auto_continue: self.scheduler.pending().map(|p| AutoContinueView {
                kind: p.kind,
                remaining_secs: p.remaining_secs(now),
            }),
            check_in: self.governor.grace().map(|g| CheckInView {
                consecutive_autonomous: self.governor.consecutive_autonomous(),
                remaining_secs: g.remaining_secs(now),
            }),
            last_completion: self.engine.last_completion().cloned(),
        })
    }

    fn publish(&self, events: &[Event]) {
        for event in events {
            for sink in &self.sinks {
                sink.emit(event);
            }
        }
    }
}

fn latest_run_id(block: &Block) -> Option<String> {
    block
        .active_run
        .as_ref()
        .map(|s| s.run_id.clone())
        .or_else(|| block.runs.last().map(|r| r.id.clone()))
}
