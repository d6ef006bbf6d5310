use std::time::Duration;

use clap::Subcommand;
use dayblocks_core::{Intent, Origin, TimerView};
use tracing::{debug, info};

use super::{format_secs, print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start timing the current block
    Start {
        /// Work category (defaults to the block's plan)
        #[arg(long)]
        category: Option<String>,
        /// Work label
        #[arg(long)]
        label: Option<String>,
    },
    /// Pause the running timer
    Pause,
    /// Resume a paused timer
    Resume,
    /// Stop the timer, keeping what was recorded
    Stop {
        /// Mark the block done
        #[arg(long)]
        complete: bool,
    },
    /// Switch to break mode
    Break,
    /// Switch back to work mode
    Work,
    /// Change category or label of the running work segment
    Context {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        label: Option<String>,
    },
    /// Skip a block of today (the current one by default)
    Skip {
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..72))]
        block: Option<u8>,
    },
    /// Start the current block with the previous block's work context
    Continue,
    /// Print the timer view as JSON
    Status,
    /// Keep ticking until Ctrl-C, printing events as they happen
    Watch {
        /// Seconds between ticks
        #[arg(long, default_value = "1", value_parser = clap::value_parser!(u64).range(1..=60))]
        interval: u64,
    },
}

impl TimerAction {
    fn intent(&self) -> Option<Intent> {
        let intent = match self {
            TimerAction::Start { category, label } => Intent::Start {
                category: category.clone(),
                label: label.clone(),
            },
            TimerAction::Pause => Intent::Pause,
            TimerAction::Resume => Intent::Resume,
            TimerAction::Stop { complete } => Intent::Stop {
                mark_complete: *complete,
            },
            TimerAction::Break => Intent::SwitchToBreak,
            TimerAction::Work => Intent::SwitchToWork,
            TimerAction::Context { category, label } => Intent::SetWorkContext {
                category: category.clone(),
                label: label.clone(),
            },
            TimerAction::Skip { block } => Intent::Skip { block_index: *block },
            TimerAction::Continue => Intent::Continue,
            TimerAction::Status | TimerAction::Watch { .. } => return None,
        };
        Some(intent)
    }
}

pub fn run(action: TimerAction) -> CliResult {
    if let TimerAction::Watch { interval } = action {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        return runtime.block_on(watch(Duration::from_secs(interval)));
    }

    let (mut ctx, mut events) = Context::open()?;
    let now = ctx.now();

    let Some(intent) = action.intent() else {
        ctx.save()?;
        return print_json(&ctx.tracker.view(now)?);
    };

    // Save before reporting a rejection: ticking may already have moved state.
    let dispatched = ctx.tracker.dispatch(intent, Origin::User, now);
    ctx.save()?;
    events.extend(dispatched?);
    print_json(&events)
}

/// Each tick reopens the tracker from the database so commands issued from
/// other shells are picked up.
async fn watch(period: Duration) -> CliResult {
    let mut interval = tokio::time::interval(period);
    let mut last_line = String::new();
    info!(period_secs = period.as_secs(), "watching timer");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let (ctx, events) = Context::open()?;
                ctx.save()?;
                for event in &events {
                    println!("{}", serde_json::to_string(event)?);
                }
                let line = status_line(&ctx.tracker.view(ctx.now())?);
                if line != last_line {
                    eprintln!("{line}");
                    last_line = line;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted; leaving watch");
                break;
            }
        }
    }
    Ok(())
}

fn status_line(view: &TimerView) -> String {
    let mut line = format!(
        "#{:02} {:?} work {:.0}% break {:.0}%",
        view.display_number,
        view.state,
        view.displayed_fill.work * 100.0,
        view.displayed_fill.rest * 100.0,
    );
    if let Some(left) = view.time_left_secs {
        line.push_str(&format!(" {} left", format_secs(left)));
    }
    if let Some(pending) = &view.auto_continue {
        line.push_str(&format!(" | {:?} in {}s", pending.kind, pending.remaining_secs));
    }
    if let Some(check_in) = &view.check_in {
        line.push_str(&format!(" | check in within {}s", check_in.remaining_secs));
    }
    line
}

