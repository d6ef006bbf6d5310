use std::collections::BTreeMap;

use chrono::NaiveDate;
use clap::Subcommand;
use dayblocks_core::block::{boundary_for, BlockStatus};
use dayblocks_core::DayBlocks;
use serde::Serialize;

use super::{format_secs, print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum DayAction {
    /// Show every block of a day
    Show {
        /// Day to show (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Print the full block records as JSON
        #[arg(long)]
        json: bool,
        /// Include idle blocks in the table
        #[arg(long)]
        all: bool,
    },
    /// Clear everything recorded on a day
    Reset {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Worked and break time per category
    Stats {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DayStats {
    pub date: NaiveDate,
    pub worked_seconds: u32,
    pub break_seconds: u32,
    pub done_blocks: usize,
    pub skipped_blocks: usize,
    /// Worked seconds per category; uncategorized work is under "-".
    pub by_category: BTreeMap<String, u32>,
}

impl DayStats {
    pub fn from_day(day: &DayBlocks) -> Self {
        let mut by_category: BTreeMap<String, u32> = BTreeMap::new();
        for block in &day.blocks {
            for segment in block.segments.iter().filter(|s| s.is_work()) {
                let key = segment.category.clone().unwrap_or_else(|| "-".to_string());
                *by_category.entry(key).or_default() += segment.seconds;
            }
        }
        Self {
            date: day.date,
            worked_seconds: day.worked_seconds(),
            break_seconds: day.break_seconds(),
            done_blocks: count_status(day, BlockStatus::Done),
            skipped_blocks: count_status(day, BlockStatus::Skipped),
            by_category,
        }
    }
}

fn count_status(day: &DayBlocks, status: BlockStatus) -> usize {
    day.blocks.iter().filter(|b| b.status == status).count()
}

pub fn run(action: DayAction) -> CliResult {
    let (mut ctx, _) = Context::open()?;
    let now = ctx.now();
    let today = ctx.today();

    match action {
        DayAction::Show { date, json, all } => {
            let day = ctx.tracker.day(date.unwrap_or(today))?;
            ctx.save()?;
            if json {
                return print_json(&day);
            }
            let day_start_hour = ctx.tracker.settings().day_start_hour;
            println!("{}", day.date);
            for (number, block) in day.in_display_order(day_start_hour) {
                let untouched = block.status == BlockStatus::Idle && block.used_seconds == 0;
                if untouched && !all {
                    continue;
                }
                let (start, _) = boundary_for(block.block_index);
                let fill = block.fill();
                let mut line = format!(
                    "{number:>2}  {:02}:{:02}  {:<7}  work {:>3.0}%  break {:>3.0}%  {}",
                    start / 3600,
                    (start % 3600) / 60,
                    format!("{:?}", block.status).to_lowercase(),
                    fill.work * 100.0,
                    fill.rest * 100.0,
                    format_secs(i64::from(block.used_seconds)),
                );
                if let Some(category) = &block.category {
                    line.push_str(&format!("  {category}"));
                }
                if let Some(label) = &block.label {
                    line.push_str(&format!(": {label}"));
                }
                if block.muted {
                    line.push_str("  (muted)");
                }
                println!("{line}");
            }
        }
        DayAction::Reset { date } => {
            let outcome = ctx.tracker.reset_day(date.unwrap_or(today), now);
            ctx.save()?;
            print_json(&outcome?)?;
        }
        DayAction::Stats { date } => {
            let day = ctx.tracker.day(date.unwrap_or(today))?;
            ctx.save()?;
            print_json(&DayStats::from_day(&day))?;
        }
    }
    Ok(())
}
