//! # Dayblocks Core Library
//!
//! This library provides the core logic for the dayblocks day tracker. A day
//! is split into 72 fixed twenty-minute blocks, and the library records what
//! actually happened inside each block (work on a category, or a break) across
//! any number of start, pause and stop cycles. The `dayblocks` CLI is a thin
//! layer over the same library.
//!
//! ## Architecture
//!
//! - **Block model**: block clock arithmetic, the per-run segment ledger and the
//!   scale factors that map real seconds onto a single 0-100% fill
//! - **Timer Engine**: a wall-clock-based state machine that requires the caller
//!   to periodically invoke `tick()` for progress updates
//! - **Schedulers**: auto-continue countdowns, the check-in governor and the
//!   snapshot/recovery manager
//! - **Storage**: SQLite block storage and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`DayTracker`]: Owns the engine and schedulers, persists blocks
//! - [`Database`]: Block persistence
//! - [`Config`]: Application configuration management

pub mod block;
pub mod clock;
pub mod error;
pub mod events;
pub mod storage;
pub mod timer;
pub mod tracker;

pub use block::{Block, BlockClock, BlockSegment, BlockStatus, DayBlocks, Run, ScaleFactor, SegmentKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, TransitionError};
pub use events::{Event, EventLog, EventSink};
pub use storage::{BlockStore, Config, Database, MemoryStore};
pub use timer::{CompletionOutcome, Intent, Origin, TimerEngine, TimerState};
pub use tracker::{DayTracker, TimerView, TrackerSettings, TrackerState};
