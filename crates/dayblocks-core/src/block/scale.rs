//! Real seconds to visual fill.
//!
//! Each run locks a factor when it starts so that the block's cumulative
//! fill reaches exactly 1.0 when the block's wall-clock boundary passes,
//! no matter how many runs touched the block.

use serde::{Deserialize, Serialize};

use super::{BlockSegment, SegmentKind};

/// Minimum rendered width of the live segment early in a run.
pub const MIN_VISIBLE_FILL: f64 = 0.01;
/// How long after a run starts the minimum width applies.
pub const SLIVER_WINDOW_SECS: u32 = 60;

const FILL_EPSILON: f64 = 1e-9;

/// Run-local multiplier converting real seconds to visual proportion.
///
/// There is no setter: a factor is fixed for the lifetime of the run that
/// locked it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScaleFactor(f64);

/// Why a factor could not be locked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LockRefused {
    /// The block boundary is now or in the past.
    BlockEnded,
    /// Previous runs already filled the block.
    AlreadyFilled,
}

impl ScaleFactor {
    /// `(1 - previous) / remaining`.
    pub fn lock(previous_visual_proportion: f64, remaining_real_seconds: i64) -> Result<Self, LockRefused> {
        if remaining_real_seconds <= 0 {
            return Err(LockRefused::BlockEnded);
        }
        let left = 1.0 - previous_visual_proportion.clamp(0.0, 1.0);
        if left <= FILL_EPSILON {
            return Err(LockRefused::AlreadyFilled);
        }
        Ok(Self(left / remaining_real_seconds as f64))
    }

    /// Wrap a stored value.
    pub fn from_raw(value: f64) -> Self {
        Self(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Visual proportion contributed by `seconds` under `factor`.
pub fn run_proportion(factor: ScaleFactor, seconds: u32) -> f64 {
    factor.0 * seconds as f64
}

/// Work and break fill of a block, each 0..=1, summing to at most 1.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockFill {
    pub work: f64,
    #[serde(rename = "break")]
    pub rest: f64,
}

impl BlockFill {
    pub fn total(&self) -> f64 {
        let total = self.work + self.rest;
        if (1.0 - total).abs() < FILL_EPSILON {
            1.0
        } else {
            total.min(1.0)
        }
    }
}

/// Sum fill over runs, clamping to 1.0 and snapping float noise at the top
/// so a naturally completed block reads exactly 1.0.
pub fn block_fill<'a, I>(runs: I) -> BlockFill
where
    I: IntoIterator<Item = (ScaleFactor, &'a [BlockSegment])>,
{
    let mut work = 0.0;
    let mut rest = 0.0;
    for (factor, segments) in runs {
        for segment in segments {
            let proportion = run_proportion(factor, segment.seconds);
            match segment.kind {
                SegmentKind::Work => work += proportion,
                SegmentKind::Break => rest += proportion,
            }
        }
    }

    let work = work.min(1.0);
    let mut rest = rest.min(1.0 - work).max(0.0);
    let total = work + rest;
    if (1.0 - total).abs() < FILL_EPSILON {
        if rest > 0.0 {
            rest = 1.0 - work;
        } else {
            return BlockFill { work: 1.0, rest: 0.0 };
        }
    }
    BlockFill { work, rest }
}

/// Fill as shown to the user: the ledger value, except that during the
/// first seconds of a run the live segment is widened to a visible sliver.
pub fn displayed_fill(fill: BlockFill, live_kind: Option<SegmentKind>, run_age_secs: u32, live_proportion: f64) -> BlockFill {
    let Some(kind) = live_kind else {
        return fill;
    };
    if run_age_secs >= SLIVER_WINDOW_SECS || live_proportion >= MIN_VISIBLE_FILL {
        return fill;
    }
    let room = (1.0 - fill.total()).max(0.0);
    let extra = (MIN_VISIBLE_FILL - live_proportion).min(room);
    match kind {
        SegmentKind::Work => BlockFill {
            work: fill.work + extra,
            rest: fill.rest,
        },
        SegmentKind::Break => BlockFill {
            work: fill.work,
            rest: fill.rest + extra,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_block_factor() {
        let factor = ScaleFactor::lock(0.0, 1200).unwrap();
        assert!((factor.value() - 1.0 / 1200.0).abs() < 1e-15);
    }

    #[test]
    fn factor_times_remaining_is_what_is_left() {
        for (previous, remaining) in [(0.0, 1200), (0.25, 900), (1.0 / 3.0, 700), (0.9, 5)] {
            let factor = ScaleFactor::lock(previous, remaining).unwrap();
            let filled = factor.value() * remaining as f64;
            assert!((filled - (1.0 - previous)).abs() < 1e-12);
        }
    }

    #[test]
    fn lock_refuses_ended_or_filled_blocks() {
        assert_eq!(ScaleFactor::lock(0.0, 0), Err(LockRefused::BlockEnded));
        assert_eq!(ScaleFactor::lock(0.5, -10), Err(LockRefused::BlockEnded));
        assert_eq!(ScaleFactor::lock(1.0, 100), Err(LockRefused::AlreadyFilled));
    }

    #[test]
    fn fill_reaches_exactly_one_after_pause_and_resume() {
        let first = ScaleFactor::lock(0.0, 1200).unwrap();
        let first_segments = vec![BlockSegment::work(400, None, None, 0)];
        let previous = block_fill([(first, first_segments.as_slice())]).total();
        let second = ScaleFactor::lock(previous, 700).unwrap();
        assert!((second.value() - 0.000_952_38).abs() < 1e-8);
        let second_segments = vec![BlockSegment::work(700, None, None, 500)];

        let fill = block_fill([
            (first, first_segments.as_slice()),
            (second, second_segments.as_slice()),
        ]);
        assert_eq!(fill.total(), 1.0);
        assert_eq!(fill.work, 1.0);
    }

    #[test]
    fn mixed_fill_snaps_break_part() {
        let factor = ScaleFactor::lock(0.0, 1200).unwrap();
        let segments = vec![
            BlockSegment::work(700, None, None, 0),
            BlockSegment::rest(500, 700),
        ];
        let fill = block_fill([(factor, segments.as_slice())]);
        assert_eq!(fill.total(), 1.0);
        assert!(fill.rest > 0.41 && fill.rest < 0.42);
    }

    #[test]
    fn fill_never_exceeds_one() {
        let factor = ScaleFactor::from_raw(0.01);
        let segments = vec![BlockSegment::work(500, None, None, 0)];
        let fill = block_fill([(factor, segments.as_slice())]);
        assert_eq!(fill.total(), 1.0);
    }

    #[test]
    fn sliver_only_during_first_minute() {
        let fill = BlockFill { work: 0.5, rest: 0.0 };
        let early = displayed_fill(fill, Some(SegmentKind::Work), 5, 0.001);
        assert!((early.work - 0.509).abs() < 1e-12);
        let late = displayed_fill(fill, Some(SegmentKind::Work), 61, 0.001);
        assert_eq!(late, fill);
        let idle = displayed_fill(fill, None, 5, 0.0);
        assert_eq!(idle, fill);
    }

    #[test]
    fn sliver_is_capped_at_full() {
        let fill = BlockFill { work: 0.995, rest: 0.0 };
        let shown = displayed_fill(fill, Some(SegmentKind::Break), 1, 0.0);
        assert!(shown.total() <= 1.0 + 1e-12);
    }
}
