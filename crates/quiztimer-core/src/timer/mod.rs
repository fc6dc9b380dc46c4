mod controller;
mod coordinator;
mod countdown;
mod record;
mod store;

pub use controller::{QuizTimer, TimerBanner};
pub use coordinator::{AutoSubmitCoordinator, AutoSubmitOutcome, SubmitPhase};
pub use countdown::{CountdownEngine, CountdownState};
pub use record::{parse_instant, remaining_secs, ActiveAttemptRecord, RecordDefect};
pub use store::{StartOutcome, TimerStore, DEFAULT_STORAGE_KEY};
