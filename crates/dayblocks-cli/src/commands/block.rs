use chrono::NaiveDate;
use clap::Subcommand;
use dayblocks_core::BlockStatus;

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum BlockAction {
    /// Assign a category and label to a block
    Plan {
        /// Block index (0 = 00:00-00:20)
        #[arg(value_parser = clap::value_parser!(u8).range(0..72))]
        index: u8,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Attach a note (an empty note clears it)
    Note {
        #[arg(value_parser = clap::value_parser!(u8).range(0..72))]
        index: u8,
        text: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Set the status directly (idle, planned, done, skipped)
    Status {
        #[arg(value_parser = clap::value_parser!(u8).range(0..72))]
        index: u8,
        status: BlockStatus,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Silence notifications for a block
    Mute {
        #[arg(value_parser = clap::value_parser!(u8).range(0..72))]
        index: u8,
        /// Unmute instead
        #[arg(long)]
        off: bool,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Flag a block as activated in the day plan
    Activate {
        #[arg(value_parser = clap::value_parser!(u8).range(0..72))]
        index: u8,
        #[arg(long)]
        off: bool,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

pub fn run(action: BlockAction) -> CliResult {
    let (mut ctx, _) = Context::open()?;
    let now = ctx.now();
    let today = ctx.today();
    let tracker = &mut ctx.tracker;

    let edited = match action {
        BlockAction::Plan {
            index,
            category,
            label,
            date,
        } => tracker.plan_block(date.unwrap_or(today), index, category, label, now),
        BlockAction::Note { index, text, date } => {
            let note = (!text.trim().is_empty()).then_some(text);
            tracker.set_note(date.unwrap_or(today), index, note, now)
        }
        BlockAction::Status {
            index,
            status,
            date,
        } => tracker.set_status(date.unwrap_or(today), index, status, now),
        BlockAction::Mute { index, off, date } => {
            tracker.set_muted(date.unwrap_or(today), index, !off, now)
        }
        BlockAction::Activate { index, off, date } => {
            tracker.set_activated(date.unwrap_or(today), index, !off, now)
        }
    };

    ctx.save()?;
    print_json(&edited?)
}
