mod auto_continue;
mod checkin;
mod engine;
mod recovery;

pub use auto_continue::{
    AutoContinueKind, AutoContinueScheduler, AutoContinueSettings, PendingAdvance,
};
pub use checkin::{CheckInGovernor, CheckInSettings, GracePeriod};
pub use engine::{
    ActiveRun, Completion, CompletionOutcome, TimerEngine, TimerSession, TimerState,
};
pub use recovery::{RecoveryManager, RecoveryOutcome};

use serde::{Deserialize, Serialize};

/// Who asked for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    User,
    /// Issued by the auto-continue scheduler or the check-in governor.
    Autonomous,
}

/// Requests the presentation layer (or a scheduler) can make. Autonomous
/// advances are the same intents as the buttons, tagged with their origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    Start {
        category: Option<String>,
        label: Option<String>,
    },
    SwitchToBreak,
    SwitchToWork,
    SetWorkContext {
        category: Option<String>,
        label: Option<String>,
    },
    Pause,
    Resume,
    Stop {
        mark_complete: bool,
    },
    /// Start the current block with the previous block's work context.
    Continue,
    /// After a break completed: start the current block in work mode.
    BackToWork,
    /// Skip a block; `None` means the current one.
    Skip {
        block_index: Option<u8>,
    },
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::Start { .. } => "start",
            Intent::SwitchToBreak => "switch_to_break",
            Intent::SwitchToWork => "switch_to_work",
            Intent::SetWorkContext { .. } => "set_work_context",
            Intent::Pause => "pause",
            Intent::Resume => "resume",
            Intent::Stop { .. } => "stop",
            Intent::Continue => "continue",
            Intent::BackToWork => "back_to_work",
            Intent::Skip { .. } => "skip",
        }
    }
}
