//! # quiztimer Core Library
//!
//! Keeps a timed quiz attempt honest on the client: the deadline survives
//! restarts, the countdown survives suspended hosts, and an expired attempt
//! is submitted exactly once even if the learner wandered off the quiz view.
//!
//! ## Architecture
//!
//! - **Deadline Store**: the single persisted [`ActiveAttemptRecord`] behind an
//!   injectable [`StorageBackend`](storage::StorageBackend)
//! - **Countdown Engine**: a deadline-driven state machine; the host sleeps
//!   until `next_wakeup()` and calls `tick()`
//! - **Auto-Submit Coordinator**: fetches autosaved answers and submits them
//!   through an [`AttemptService`], guarded by an explicit phase machine
//!
//! ## Key Components
//!
//! - [`QuizTimer`]: process-wide controller with `init()` / `dispose()`
//! - [`TimerStore`]: persisted deadline
//! - [`Config`]: application configuration management
//! - [`HttpAttemptService`]: REST implementation of [`AttemptService`]

pub mod attempt;
pub mod clock;
pub mod error;
pub mod events;
pub mod storage;
pub mod surface;
pub mod timer;

pub use attempt::{AttemptDetails, AttemptService, HttpAttemptService, SavedAnswer, SubmitPayload};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AttemptServiceError, ConfigError, CoreError, StoreError, ValidationError};
pub use events::{ClearReason, Event};
pub use storage::{Config, ConflictPolicy, MemoryBackend, SqliteBackend};
pub use surface::{HistoryNavigator, LogNotifier, Navigator, Notifier};
pub use timer::{
    ActiveAttemptRecord, AutoSubmitOutcome, QuizTimer, SubmitPhase, TimerBanner, TimerStore,
};
