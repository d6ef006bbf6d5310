pub mod block;
pub mod config;
pub mod day;
pub mod timer;

use chrono::{DateTime, NaiveDate, Utc};
use dayblocks_core::storage::Database;
use dayblocks_core::{
    Clock, Config, DayTracker, Event, ManualClock, SystemClock, TrackerSettings, TrackerState,
};
use tracing::warn;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

const STATE_KEY: &str = "tracker_state";

/// Pins the clock for scripted runs (RFC 3339).
const NOW_ENV: &str = "DAYBLOCKS_NOW";

/// Everything one CLI invocation works with.
pub struct Context {
    pub tracker: DayTracker<Database>,
    clock: Box<dyn Clock>,
}

impl Context {
    /// Load config and database, restore the saved tracker (or recover from
    /// block snapshots when there is none), and catch up with the clock.
    pub fn open() -> CliResult<(Self, Vec<Event>)> {
        let config = Config::load()?;
        let db = Database::open()?;
        let settings = TrackerSettings::from_config(&config);
        let clock = clock_from_env()?;
        let now = clock.now();

        let saved = match db.kv_get(STATE_KEY)? {
            Some(json) => match serde_json::from_str::<TrackerState>(&json) {
                Ok(state) => Some(state),
                Err(e) => {
                    warn!(%e, "saved tracker state unreadable; recovering from snapshots");
                    db.kv_delete(STATE_KEY)?;
                    None
                }
            },
            None => None,
        };

        let mut events = Vec::new();
        let mut tracker = match saved {
            Some(state) => DayTracker::with_state(db, settings, state),
            None => DayTracker::new(db, settings),
        };
        if config.notifications.enabled {
            let bell = config.notifications.bell;
            tracker.subscribe(Box::new(move |event: &Event| notify(event, bell)));
        }
        events.extend(tracker.recover(now)?);
        events.extend(tracker.tick(now));

        Ok((
            Self { tracker, clock },
            events,
        ))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.tracker.settings().clock.date_of(self.now())
    }

    /// Persist the tracker for the next invocation.
    pub fn save(&self) -> CliResult {
        let json = serde_json::to_string(&self.tracker.state())?;
        self.tracker.store().kv_set(STATE_KEY, &json)?;
        Ok(())
    }
}

fn clock_from_env() -> CliResult<Box<dyn Clock>> {
    match std::env::var(NOW_ENV) {
        Ok(value) if !value.is_empty() => {
            let at = DateTime::parse_from_rfc3339(&value)
                .map_err(|e| format!("{NOW_ENV}: {e}"))?
                .with_timezone(&Utc);
            Ok(Box::new(ManualClock::new(at)))
        }
        _ => Ok(Box::new(SystemClock)),
    }
}

fn notify(event: &Event, bell: bool) {
    if !event.is_alert() {
        return;
    }
    let message = match event {
        Event::TimerStarted { block_index, .. } => format!("timer started on block {block_index}"),
        Event::TimerCompleted {
            block_index,
            outcome,
            ..
        } => format!("block {block_index} finished ({outcome:?})"),
        Event::BoundaryCrossedInBackground { block_index, .. } => {
            format!("block {block_index} ended while dayblocks was not running")
        }
        Event::CheckInRequired { expires_at, .. } => {
            format!("still there? confirm before {}", expires_at.format("%H:%M:%S"))
        }
        _ => return,
    };
    if bell {
        eprint!("\x07");
    }
    eprintln!("[dayblocks] {message}");
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `mm:ss` for a countdown.
pub fn format_secs(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
