//! Wall-clock to block mapping.
//!
//! The free functions are pure arithmetic on local time of day. `BlockClock`
//! adds the user's UTC offset so absolute instants can be located in a
//! (date, block) pair and block boundaries turned back into instants.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, Offset, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

pub const BLOCKS_PER_DAY: u8 = 72;
pub const BLOCKS_PER_HOUR: u8 = 3;
/// Length of a block in seconds.
pub const BLOCK_SECONDS: u32 = 20 * 60;

/// Block index (0..72) containing the given local time of day.
pub fn block_index_at(time: NaiveTime) -> u8 {
    (time.num_seconds_from_midnight() / BLOCK_SECONDS) as u8
}

/// `[start, end)` of a block as seconds from local midnight.
pub fn boundary_for(index: u8) -> (u32, u32) {
    let start = index as u32 * BLOCK_SECONDS;
    (start, start + BLOCK_SECONDS)
}

/// Day-ordered number (1..=72) of a block, where block 1 is the first block
/// of `day_start_hour`. Wraps past midnight.
pub fn display_number(index: u8, day_start_hour: u8) -> u8 {
    let day_start_block = (day_start_hour % 24) as u16 * BLOCKS_PER_HOUR as u16;
    let total = BLOCKS_PER_DAY as u16;
    (((index as u16 % total) + total - day_start_block) % total) as u8 + 1
}

/// Where an instant falls in the day grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPosition {
    pub date: NaiveDate,
    pub block_index: u8,
    /// Seconds since the block started, 0..1200.
    pub elapsed: u32,
}

/// Block arithmetic anchored to a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockClock {
    offset_seconds: i32,
}

impl Default for BlockClock {
    fn default() -> Self {
        Self::utc()
    }
}

impl BlockClock {
    pub fn utc() -> Self {
        Self { offset_seconds: 0 }
    }

    pub fn with_offset_minutes(minutes: i32) -> Self {
        // Offsets beyond a day are nonsense; clamp into chrono's valid range.
        let offset_seconds = (minutes.saturating_mul(60)).clamp(-86_399, 86_399);
        Self { offset_seconds }
    }

    /// The host's current offset from UTC.
    pub fn local() -> Self {
        let offset = Local::now().offset().fix().local_minus_utc();
        Self {
            offset_seconds: offset,
        }
    }

    /// Configured offset, or the host's when none is configured.
    pub fn from_config(offset_minutes: Option<i32>) -> Self {
        match offset_minutes {
            Some(minutes) => Self::with_offset_minutes(minutes),
            None => Self::local(),
        }
    }

    pub fn offset_seconds(&self) -> i32 {
        self.offset_seconds
    }

    fn to_local(&self, at: DateTime<Utc>) -> chrono::NaiveDateTime {
        at.naive_utc() + Duration::seconds(self.offset_seconds as i64)
    }

    /// Local calendar date of an instant.
    pub fn date_of(&self, at: DateTime<Utc>) -> NaiveDate {
        self.to_local(at).date()
    }

    pub fn locate(&self, at: DateTime<Utc>) -> BlockPosition {
        let local = self.to_local(at);
        let block_index = block_index_at(local.time());
        let (start, _) = boundary_for(block_index);
        BlockPosition {
            date: local.date(),
            block_index,
            elapsed: local.time().num_seconds_from_midnight() - start,
        }
    }

    pub fn block_start(&self, date: NaiveDate, index: u8) -> DateTime<Utc> {
        let (start, _) = boundary_for(index);
        let local_midnight = date.and_time(NaiveTime::MIN);
        let naive_utc = local_midnight + Duration::seconds(start as i64)
            - Duration::seconds(self.offset_seconds as i64);
        Utc.from_utc_datetime(&naive_utc)
    }

    pub fn block_end(&self, date: NaiveDate, index: u8) -> DateTime<Utc> {
        self.block_start(date, index) + Duration::seconds(BLOCK_SECONDS as i64)
    }

    /// Seconds from `now` to the end of the block; negative once it passed.
    pub fn remaining_seconds(&self, date: NaiveDate, index: u8, now: DateTime<Utc>) -> i64 {
        (self.block_end(date, index) - now).num_seconds()
    }

    /// Seconds into the block at `now`, clamped to the block length.
    pub fn elapsed_in(&self, date: NaiveDate, index: u8, now: DateTime<Utc>) -> u32 {
        let since = (now - self.block_start(date, index)).num_seconds();
        since.clamp(0, BLOCK_SECONDS as i64) as u32
    }

    /// The block immediately after `(date, index)`, rolling into the next day.
    pub fn next_block(date: NaiveDate, index: u8) -> (NaiveDate, u8) {
        if index + 1 < BLOCKS_PER_DAY {
            (date, index + 1)
        } else {
            (date.succ_opt().unwrap_or(date), 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn index_is_twenty_minute_floor() {
        assert_eq!(block_index_at(t(0, 0, 0)), 0);
        assert_eq!(block_index_at(t(0, 19, 59)), 0);
        assert_eq!(block_index_at(t(0, 20, 0)), 1);
        assert_eq!(block_index_at(t(9, 45, 0)), 29);
        assert_eq!(block_index_at(t(23, 59, 59)), 71);
    }

    #[test]
    fn boundaries_are_half_open_1200s() {
        assert_eq!(boundary_for(0), (0, 1200));
        assert_eq!(boundary_for(29), (34_800, 36_000));
        assert_eq!(boundary_for(71), (85_200, 86_400));
    }

    #[test]
    fn display_number_wraps_past_midnight() {
        assert_eq!(display_number(18, 6), 1);
        assert_eq!(display_number(71, 6), 54);
        assert_eq!(display_number(0, 6), 55);
        assert_eq!(display_number(17, 6), 72);
        assert_eq!(display_number(0, 0), 1);
    }

    #[test]
    fn locate_applies_offset() {
        let clock = BlockClock::with_offset_minutes(120);
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 23, 30, 10).unwrap();
        let pos = clock.locate(at);
        assert_eq!(pos.date, NaiveDate::from_ymd_opt(2026, 3, 3).unwrap());
        // 01:30:10 local
        assert_eq!(pos.block_index, 4);
        assert_eq!(pos.elapsed, 610);
    }

    #[test]
    fn block_end_round_trips_through_locate() {
        let clock = BlockClock::with_offset_minutes(-300);
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let start = clock.block_start(date, 40);
        let pos = clock.locate(start);
        assert_eq!((pos.date, pos.block_index, pos.elapsed), (date, 40, 0));
        assert_eq!((clock.block_end(date, 40) - start).num_seconds(), 1200);
        assert_eq!(clock.remaining_seconds(date, 40, start), 1200);
    }

    #[test]
    fn next_block_rolls_over_day() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(BlockClock::next_block(date, 10), (date, 11));
        assert_eq!(
            BlockClock::next_block(date, 71),
            (NaiveDate::from_ymd_opt(2026, 3, 3).unwrap(), 0)
        );
    }
}
