use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::SubmitPhase;

/// Why a persisted attempt record was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearReason {
    AutoSubmitted,
    AlreadyCompleted,
    ManuallySubmitted,
    Abandoned,
    Replaced,
}

/// Every state change in the timer produces an Event.
/// Hosts print, forward or ignore them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        attempt_id: String,
        end_time: DateTime<Utc>,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// An attempt persisted by a previous run was picked up again.
    TimerRestored {
        attempt_id: String,
        end_time: DateTime<Utc>,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerTick {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Remaining time was recomputed from the deadline after a pause.
    TimerResynced {
        previous_secs: u64,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerExpired {
        attempt_id: String,
        at: DateTime<Utc>,
    },
    AutoSubmitStarted {
        attempt_id: String,
        at: DateTime<Utc>,
    },
    AutoSubmitted {
        attempt_id: String,
        answered: usize,
        at: DateTime<Utc>,
    },
    /// The attempt had already been submitted elsewhere.
    AutoSubmitSkipped {
        attempt_id: String,
        at: DateTime<Utc>,
    },
    AutoSubmitFailed {
        attempt_id: String,
        reason: String,
        at: DateTime<Utc>,
    },
    AttemptCleared {
        attempt_id: String,
        reason: ClearReason,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        attempt_id: Option<String>,
        title: String,
        phase: SubmitPhase,
        remaining_secs: u64,
        end_time: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
}
