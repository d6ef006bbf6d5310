use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::block::SegmentKind;
use crate::timer::{AutoContinueKind, CompletionOutcome, Origin};

/// Every state change in the engine produces an Event.
/// The presentation layer and notification hooks subscribe to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        date: NaiveDate,
        block_index: u8,
        run_id: String,
        category: Option<String>,
        label: Option<String>,
        scale_factor: f64,
        remaining_secs: i64,
        origin: Origin,
        at: DateTime<Utc>,
    },
    ModeSwitched {
        block_index: u8,
        mode: SegmentKind,
        elapsed: u32,
        at: DateTime<Utc>,
    },
    WorkContextChanged {
        block_index: u8,
        category: Option<String>,
        label: Option<String>,
        at: DateTime<Utc>,
    },
    TimerPaused {
        block_index: u8,
        seconds_used_at_pause: u32,
        time_left_secs: i64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        block_index: u8,
        run_id: String,
        scale_factor: f64,
        remaining_secs: i64,
        at: DateTime<Utc>,
    },
    TimerCompleted {
        date: NaiveDate,
        block_index: u8,
        run_id: Option<String>,
        outcome: CompletionOutcome,
        used_seconds: u32,
        at: DateTime<Utc>,
    },
    BlockSkipped {
        date: NaiveDate,
        block_index: u8,
        origin: Origin,
        at: DateTime<Utc>,
    },
    /// The in-flight run was written to its block.
    SnapshotSaved {
        block_index: u8,
        run_id: String,
        at: DateTime<Utc>,
    },
    /// A session was restored from a snapshot after restart or suspension.
    TimerRecovered {
        date: NaiveDate,
        block_index: u8,
        run_id: String,
        paused: bool,
        at: DateTime<Utc>,
    },
    /// A block boundary passed while the process was not running.
    BoundaryCrossedInBackground {
        date: NaiveDate,
        block_index: u8,
        at: DateTime<Utc>,
    },
    AutoContinueArmed {
        kind: AutoContinueKind,
        fires_at: DateTime<Utc>,
    },
    AutoContinueFired {
        kind: AutoContinueKind,
        at: DateTime<Utc>,
    },
    AutoContinueCancelled {
        kind: AutoContinueKind,
        at: DateTime<Utc>,
    },
    CheckInRequired {
        consecutive_autonomous: u32,
        expires_at: DateTime<Utc>,
    },
    CheckInExpired {
        block_index: u8,
        skipped: bool,
        at: DateTime<Utc>,
    },
    PersistenceFailed {
        date: NaiveDate,
        block_index: u8,
        run_id: Option<String>,
        message: String,
        at: DateTime<Utc>,
    },
    DayReset {
        date: NaiveDate,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Transition points that fire notification/audio hooks.
    pub fn is_alert(&self) -> bool {
        matches!(
            self,
            Event::TimerStarted { .. }
                | Event::TimerCompleted { .. }
                | Event::BoundaryCrossedInBackground { .. }
                | Event::CheckInRequired { .. }
        )
    }
}

/// Observer of engine events. Calls are fire-and-forget: a sink must not
/// block and cannot fail the transition that produced the event.
pub trait EventSink: Send {
    fn emit(&self, event: &Event);
}

impl<F> EventSink for F
where
    F: Fn(&Event) + Send,
{
    fn emit(&self, event: &Event) {
        self(event)
    }
}

/// Sink that keeps every event; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn drain(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|mut e| std::mem::take(&mut *e))
            .unwrap_or_default()
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: &Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
