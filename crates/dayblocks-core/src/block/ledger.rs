//! Segment ledger for one run.
//!
//! Offsets are seconds into the block. The ledger covers
//! `[run_start, cursor)` with no gaps and no overlaps; the last segment is
//! the open one and always ends at the cursor.

use serde::{Deserialize, Serialize};

use super::{BlockSegment, SegmentKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentLedger {
    run_start: u32,
    cursor: u32,
    segments: Vec<BlockSegment>,
}

impl SegmentLedger {
    /// Start a ledger with an open segment at `run_start`.
    pub fn open(
        run_start: u32,
        kind: SegmentKind,
        category: Option<String>,
        label: Option<String>,
    ) -> Self {
        Self {
            run_start,
            cursor: run_start,
            segments: vec![new_segment(kind, category, label, run_start)],
        }
    }

    /// Rebuild a ledger from persisted segments; the last one becomes open.
    pub fn from_segments(run_start: u32, segments: &[BlockSegment], fallback: SegmentKind) -> Self {
        let segments = normalize(segments);
        let mut cursor = run_start;
        let mut rebuilt = Vec::with_capacity(segments.len());
        for mut segment in segments {
            // Re-lay segments back to back so coverage stays exact even if
            // the stored offsets drifted.
            segment.start_elapsed = cursor;
            cursor += segment.seconds;
            rebuilt.push(segment);
        }
        if rebuilt.is_empty() {
            rebuilt.push(new_segment(fallback, None, None, run_start));
        }
        Self {
            run_start,
            cursor,
            segments: rebuilt,
        }
    }

    pub fn run_start(&self) -> u32 {
        self.run_start
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Seconds covered so far.
    pub fn covered_seconds(&self) -> u32 {
        self.cursor - self.run_start
    }

    pub fn open_segment(&self) -> Option<&BlockSegment> {
        self.segments.last()
    }

    /// Extend the open segment up to `at_elapsed`. Earlier offsets are
    /// clamped to the cursor.
    pub fn extend_to(&mut self, at_elapsed: u32) {
        let at = at_elapsed.max(self.cursor);
        if let Some(open) = self.segments.last_mut() {
            open.seconds += at - self.cursor;
        }
        self.cursor = at;
    }

    /// Close the open segment at `at_elapsed` and open one with the given
    /// key, unless the key matches the open segment, in which case it is
    /// simply extended. Returns true when a new segment was opened.
    pub fn append_or_extend(
        &mut self,
        kind: SegmentKind,
        category: Option<String>,
        label: Option<String>,
        at_elapsed: u32,
    ) -> bool {
        self.extend_to(at_elapsed);
        let next = new_segment(kind, category, label, self.cursor);
        if self.segments.last().is_some_and(|open| open.same_key(&next)) {
            return false;
        }
        if self.segments.last().is_some_and(|open| open.seconds == 0) {
            self.segments.pop();
            // The segment before the empty one may already carry this key.
            if self.segments.last().is_some_and(|prev| prev.same_key(&next)) {
                return true;
            }
        }
        self.segments.push(next);
        true
    }

    /// Normalized segments as they would look if closed at `at_elapsed`,
    /// without mutating the ledger.
    pub fn segments_at(&self, at_elapsed: u32) -> Vec<BlockSegment> {
        let mut view = self.clone();
        view.extend_to(at_elapsed);
        normalize(&view.segments)
    }

    /// Close the open segment at `at_elapsed` and return the finalized list.
    pub fn close(&mut self, at_elapsed: u32) -> Vec<BlockSegment> {
        self.extend_to(at_elapsed);
        normalize(&self.segments)
    }
}

fn new_segment(
    kind: SegmentKind,
    category: Option<String>,
    label: Option<String>,
    start_elapsed: u32,
) -> BlockSegment {
    match kind {
        SegmentKind::Work => BlockSegment::work(0, category, label, start_elapsed),
        SegmentKind::Break => BlockSegment::rest(0, start_elapsed),
    }
}

/// Drop zero-length entries and merge adjacent entries with the same key.
/// Order is preserved; applying it twice changes nothing.
pub fn normalize(segments: &[BlockSegment]) -> Vec<BlockSegment> {
    let mut out: Vec<BlockSegment> = Vec::with_capacity(segments.len());
    for segment in segments.iter().filter(|s| s.seconds > 0) {
        match out.last_mut() {
            Some(last) if last.same_key(segment) => last.seconds += segment.seconds,
            _ => out.push(segment.clone()),
        }
    }
    out
}

/// Sum of durations of segments matching `predicate`.
pub fn total_seconds<F>(segments: &[BlockSegment], predicate: F) -> u32
where
    F: Fn(&BlockSegment) -> bool,
{
    segments
        .iter()
        .filter(|s| predicate(s))
        .map(|s| s.seconds)
        .sum()
}
