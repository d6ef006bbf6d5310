//! Block data model.
//!
//! A day is 72 fixed twenty-minute blocks keyed by (user, date, index).
//! Blocks are never deleted; the timer engine appends runs to them and the
//! user edits category, label, note and status.

mod clock;
mod ledger;
mod scale;

pub use clock::{
    block_index_at, boundary_for, display_number, BlockClock, BlockPosition, BLOCKS_PER_DAY,
    BLOCKS_PER_HOUR, BLOCK_SECONDS,
};
pub use ledger::{normalize, total_seconds, SegmentLedger};
pub use scale::{
    block_fill, displayed_fill, run_proportion, BlockFill, LockRefused, ScaleFactor, MIN_VISIBLE_FILL,
    SLIVER_WINDOW_SECS,
};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStatus {
    #[default]
    Idle,
    Planned,
    Done,
    Skipped,
}

impl std::str::FromStr for BlockStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "idle" => Ok(BlockStatus::Idle),
            "planned" => Ok(BlockStatus::Planned),
            "done" => Ok(BlockStatus::Done),
            "skipped" => Ok(BlockStatus::Skipped),
            other => Err(format!("unknown block status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Work,
    Break,
}

/// A work or break interval inside a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSegment {
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    pub seconds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Seconds into the block at which the segment started.
    #[serde(default)]
    pub start_elapsed: u32,
}

impl BlockSegment {
    pub fn work(
        seconds: u32,
        category: Option<String>,
        label: Option<String>,
        start_elapsed: u32,
    ) -> Self {
        Self {
            kind: SegmentKind::Work,
            seconds,
            category,
            label,
            start_elapsed,
        }
    }

    pub fn rest(seconds: u32, start_elapsed: u32) -> Self {
        Self {
            kind: SegmentKind::Break,
            seconds,
            category: None,
            label: None,
            start_elapsed,
        }
    }

    /// Two segments with the same key are merged when adjacent.
    pub fn same_key(&self, other: &BlockSegment) -> bool {
        self.kind == other.kind && self.category == other.category && self.label == other.label
    }

    pub fn is_work(&self) -> bool {
        self.kind == SegmentKind::Work
    }
}

/// One timer session on one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    /// Seconds into the block when the run started.
    pub start_elapsed: u32,
    pub scale_factor: ScaleFactor,
    #[serde(default)]
    pub segments: Vec<BlockSegment>,
}

impl Run {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn used_seconds(&self) -> u32 {
        total_seconds(&self.segments, |_| true)
    }
}

/// In-flight run persisted on its block so it survives a crash or
/// suspension. Cleared when the run is finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRunSnapshot {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub start_elapsed: u32,
    pub scale_factor: ScaleFactor,
    /// Includes the unfinalized current segment, extended to `captured_at`.
    pub segments: Vec<BlockSegment>,
    pub mode: SegmentKind,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub last_work_category: Option<String>,
    #[serde(default)]
    pub last_work_label: Option<String>,
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
    pub captured_at: DateTime<Utc>,
}

impl ActiveRunSnapshot {
    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Ledger position reached when the snapshot was taken.
    pub fn cursor(&self) -> u32 {
        self.start_elapsed + total_seconds(&self.segments, |_| true)
    }

    /// Turn the snapshot into a finished run ending at `ended_at`.
    pub fn into_run(self, ended_at: DateTime<Utc>) -> Run {
        Run {
            id: self.run_id,
            started_at: self.started_at,
            ended_at: Some(ended_at),
            start_elapsed: self.start_elapsed,
            scale_factor: self.scale_factor,
            segments: normalize(&self.segments),
        }
    }
}

/// Natural key of a block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockKey {
    pub user_id: String,
    pub date: NaiveDate,
    pub block_index: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub user_id: String,
    pub date: NaiveDate,
    pub block_index: u8,
    #[serde(default)]
    pub muted: bool,
    #[serde(default = "default_true")]
    pub activated: bool,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub status: BlockStatus,
    /// Work fill, 0..=100.
    #[serde(default)]
    pub progress: f64,
    /// Break fill, 0..=100.
    #[serde(default)]
    pub break_progress: f64,
    #[serde(default)]
    pub runs: Vec<Run>,
    #[serde(default)]
    pub active_run: Option<ActiveRunSnapshot>,
    #[serde(default)]
    pub segments: Vec<BlockSegment>,
    #[serde(default)]
    pub used_seconds: u32,
}

fn default_true() -> bool {
    true
}

impl Block {
    /// Placeholder for an index that has never been written.
    pub fn idle(user_id: impl Into<String>, date: NaiveDate, block_index: u8) -> Self {
        Self {
            user_id: user_id.into(),
            date,
            block_index,
            muted: false,
            activated: true,
            category: None,
            label: None,
            note: None,
            status: BlockStatus::Idle,
            progress: 0.0,
            break_progress: 0.0,
            runs: Vec::new(),
            active_run: None,
            segments: Vec::new(),
            used_seconds: 0,
        }
    }

    pub fn key(&self) -> BlockKey {
        BlockKey {
            user_id: self.user_id.clone(),
            date: self.date,
            block_index: self.block_index,
        }
    }

    /// Change status, refusing `Skipped` once time has been recorded.
    pub fn set_status(&mut self, status: BlockStatus) -> Result<(), TransitionError> {
        if status == BlockStatus::Skipped && self.used_seconds > 0 {
            return Err(TransitionError::SkipForbidden {
                used_seconds: self.used_seconds,
                status,
            });
        }
        self.status = status;
        Ok(())
    }

    /// Assign what the block is meant for.
    pub fn plan(&mut self, category: Option<String>, label: Option<String>) {
        self.category = category;
        self.label = label;
        if matches!(self.status, BlockStatus::Idle) {
            self.status = BlockStatus::Planned;
        }
    }

    /// Mark the block done if any time was recorded. Returns whether it was.
    pub fn mark_done_if_used(&mut self) -> bool {
        if self.used_seconds > 0 {
            self.status = BlockStatus::Done;
            true
        } else {
            false
        }
    }

    /// Sum of visual proportion contributed by finished runs.
    pub fn previous_visual_proportion(&self) -> f64 {
        block_fill(self.runs.iter().map(|r| (r.scale_factor, r.segments.as_slice()))).total()
    }

    /// Fill including the in-flight snapshot, if any.
    pub fn fill(&self) -> BlockFill {
        let finished = self.runs.iter().map(|r| (r.scale_factor, r.segments.as_slice()));
        let live = self
            .active_run
            .iter()
            .map(|s| (s.scale_factor, s.segments.as_slice()));
        block_fill(finished.chain(live))
    }

    /// Store the in-flight run and refresh derived fields.
    pub fn set_snapshot(&mut self, snapshot: ActiveRunSnapshot) {
        self.active_run = Some(snapshot);
        self.recompute();
    }

    /// Append a finished run, clearing the snapshot that tracked it.
    pub fn finalize_run(&mut self, run: Run) {
        if self
            .active_run
            .as_ref()
            .is_some_and(|snapshot| snapshot.run_id == run.id)
        {
            self.active_run = None;
        }
        if let Some(existing) = self.runs.iter_mut().find(|r| r.id == run.id) {
            *existing = run;
        } else {
            self.runs.push(run);
        }
        self.recompute();
    }

    /// Re-derive segments, used seconds and progress from runs.
    pub fn recompute(&mut self) {
        let mut all: Vec<BlockSegment> = self
            .runs
            .iter()
            .flat_map(|r| r.segments.iter().cloned())
            .collect();
        if let Some(snapshot) = &self.active_run {
            all.extend(snapshot.segments.iter().cloned());
        }
        self.segments = normalize(&all);
        self.used_seconds = total_seconds(&self.segments, |_| true);
        let fill = self.fill();
        self.progress = fill.work * 100.0;
        self.break_progress = fill.rest * 100.0;
    }

    /// Take user-edited fields from a freshly fetched copy and add runs
    /// written elsewhere. Runs already known locally are kept as they are.
    pub fn merge_remote(&mut self, remote: Block) {
        self.category = remote.category;
        self.label = remote.label;
        self.note = remote.note;
        self.muted = remote.muted;
        self.activated = remote.activated;
        for run in remote.runs {
            if !self.runs.iter().any(|r| r.id == run.id) {
                self.runs.push(run);
            }
        }
        self.runs.sort_by_key(|r| r.started_at);
        self.recompute();
        if remote.status != self.status && self.set_status(remote.status).is_err() {
            tracing::debug!(
                block_index = self.block_index,
                "ignoring remote skipped status on a block with recorded time"
            );
        }
    }

    /// Clear everything the timer recorded but keep identity and flags.
    pub fn reset(&mut self) {
        self.status = BlockStatus::Idle;
        self.runs.clear();
        self.active_run = None;
        self.segments.clear();
        self.used_seconds = 0;
        self.progress = 0.0;
        self.break_progress = 0.0;
    }

    pub fn worked_seconds(&self) -> u32 {
        total_seconds(&self.segments, BlockSegment::is_work)
    }

    pub fn break_seconds(&self) -> u32 {
        total_seconds(&self.segments, |s| !s.is_work())
    }
}

/// All 72 blocks of one day, in index order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayBlocks {
    pub date: NaiveDate,
    pub blocks: Vec<Block>,
}

impl DayBlocks {
    /// Build a full day from whatever the store returned, synthesizing idle
    /// placeholders for missing indices.
    pub fn from_fetched(user_id: &str, date: NaiveDate, fetched: Vec<Block>) -> Self {
        let mut blocks: Vec<Block> = (0..BLOCKS_PER_DAY)
            .map(|index| Block::idle(user_id, date, index))
            .collect();
        for block in fetched {
            if block.date == date && block.block_index < BLOCKS_PER_DAY {
                let index = block.block_index as usize;
                blocks[index] = block;
            }
        }
        Self { date, blocks }
    }

    pub fn get(&self, index: u8) -> Option<&Block> {
        self.blocks.get(index as usize)
    }

    pub fn get_mut(&mut self, index: u8) -> Option<&mut Block> {
        self.blocks.get_mut(index as usize)
    }

    /// Blocks ordered by day-relative display number (1..=72).
    pub fn in_display_order(&self, day_start_hour: u8) -> Vec<(u8, &Block)> {
        let mut ordered: Vec<(u8, &Block)> = self
            .blocks
            .iter()
            .map(|b| (display_number(b.block_index, day_start_hour), b))
            .collect();
        ordered.sort_by_key(|(number, _)| *number);
        ordered
    }

    pub fn worked_seconds(&self) -> u32 {
        self.blocks.iter().map(Block::worked_seconds).sum()
    }

    pub fn break_seconds(&self) -> u32 {
        self.blocks.iter().map(Block::break_seconds).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn run_with(id: &str, factor: f64, segments: Vec<BlockSegment>) -> Run {
        Run {
            id: id.into(),
            started_at: Utc::now(),
            ended_at: Some(Utc::now()),
            start_elapsed: 0,
            scale_factor: ScaleFactor::from_raw(factor),
            segments,
        }
    }

    #[test]
    fn skipped_is_refused_once_time_is_recorded() {
        let mut block = Block::idle("u", date(), 10);
        block.finalize_run(run_with(
            "r1",
            1.0 / 1200.0,
            vec![BlockSegment::work(50, None, None, 0)],
        ));
        assert_eq!(block.used_seconds, 50);
        let err = block.set_status(BlockStatus::Skipped).unwrap_err();
        assert_eq!(
            err,
            TransitionError::SkipForbidden {
                used_seconds: 50,
                status: BlockStatus::Skipped
            }
        );
        assert_eq!(block.status, BlockStatus::Idle);
    }

    #[test]
    fn finalize_clears_matching_snapshot_and_merges_segments() {
        let mut block = Block::idle("u", date(), 3);
        block.set_snapshot(ActiveRunSnapshot {
            run_id: "r1".into(),
            started_at: Utc::now(),
            start_elapsed: 0,
            scale_factor: ScaleFactor::from_raw(1.0 / 1200.0),
            segments: vec![BlockSegment::work(30, Some("deep".into()), None, 0)],
            mode: SegmentKind::Work,
            category: Some("deep".into()),
            label: None,
            last_work_category: Some("deep".into()),
            last_work_label: None,
            paused_at: None,
            captured_at: Utc::now(),
        });
        assert_eq!(block.used_seconds, 30);

        block.finalize_run(run_with(
            "r1",
            1.0 / 1200.0,
            vec![BlockSegment::work(60, Some("deep".into()), None, 0)],
        ));
        assert!(block.active_run.is_none());
        assert_eq!(block.runs.len(), 1);
        assert_eq!(block.used_seconds, 60);
        assert!((block.progress - 5.0).abs() < 1e-9);
    }

    #[test]
    fn status_is_independent_of_fill() {
        let mut block = Block::idle("u", date(), 4);
        block.finalize_run(run_with(
            "r1",
            1.0 / 1200.0,
            vec![BlockSegment::work(1200, None, None, 0)],
        ));
        assert_eq!(block.progress, 100.0);
        assert_eq!(block.status, BlockStatus::Idle);
        assert!(block.mark_done_if_used());
        assert_eq!(block.status, BlockStatus::Done);
    }

    #[test]
    fn reset_preserves_identity() {
        let mut block = Block::idle("u", date(), 7);
        block.plan(Some("writing".into()), Some("draft".into()));
        block.muted = true;
        block.finalize_run(run_with("r1", 0.001, vec![BlockSegment::rest(10, 0)]));
        block.reset();
        assert_eq!(block.block_index, 7);
        assert!(block.muted);
        assert_eq!(block.category.as_deref(), Some("writing"));
        assert_eq!(block.status, BlockStatus::Idle);
        assert_eq!(block.used_seconds, 0);
        assert!(block.runs.is_empty());
    }

    #[test]
    fn day_synthesizes_missing_blocks() {
        let mut stored = Block::idle("u", date(), 5);
        stored.note = Some("standup".into());
        let day = DayBlocks::from_fetched("u", date(), vec![stored]);
        assert_eq!(day.blocks.len(), 72);
        assert_eq!(day.get(5).unwrap().note.as_deref(), Some("standup"));
        assert_eq!(day.get(6).unwrap().status, BlockStatus::Idle);
    }

    #[test]
    fn display_order_starts_at_day_start_hour() {
        let day = DayBlocks::from_fetched("u", date(), Vec::new());
        let ordered = day.in_display_order(6);
        assert_eq!(ordered[0].0, 1);
        assert_eq!(ordered[0].1.block_index, 18);
        assert_eq!(ordered[71].1.block_index, 17);
    }

    #[test]
    fn block_serializes_with_type_field_for_segments() {
        let mut block = Block::idle("u", date(), 0);
        block.finalize_run(run_with(
            "r1",
            0.001,
            vec![BlockSegment::work(5, Some("a".into()), None, 0)],
        ));
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["date"], "2026-03-02");
        assert_eq!(json["blockIndex"], 0);
        assert_eq!(json["segments"][0]["type"], "work");
        assert_eq!(json["usedSeconds"], 5);
    }
}
