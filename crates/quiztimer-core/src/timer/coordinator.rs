//! Auto-submit coordinator.
//!
//! Guarantees an expired attempt is submitted at most once per trigger and
//! never concurrently, whichever view the user is on. Re-entrancy is
//! prevented by [`SubmitPhase`]: a trigger is only admitted from `Counting`,
//! `Expired` or `Failed`, and admission moves the phase to `Submitting` under
//! the lock, so overlapping triggers see `Submitting` and are dropped.
//!
//! ```text
//! Idle -> Counting -> Expired -> Submitting -> Completed
//!                                    |
//!                                    v
//!                                  Failed --(retry)--> Submitting
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::store::TimerStore;
use crate::attempt::{AttemptService, SubmitPayload};
use crate::error::AttemptServiceError;
use crate::storage::{MessagesConfig, RoutesConfig};
use crate::surface::{Navigator, Notifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitPhase {
    Idle,
    Counting,
    Expired,
    Submitting,
    Completed,
    /// Auto-submit failed; the record is retained and a retry is allowed.
    Failed,
}

/// What a single expiry trigger did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoSubmitOutcome {
    Submitted { answered: usize },
    /// The attempt was already submitted elsewhere; treated as success.
    AlreadyCompleted,
    Failed { reason: String },
    /// Another trigger for this attempt is still submitting.
    InFlight,
    /// The trigger does not concern the armed attempt, or it is already done.
    Stale,
}

#[derive(Debug)]
struct Slot {
    attempt_id: Option<String>,
    phase: SubmitPhase,
}

pub struct AutoSubmitCoordinator {
    store: Arc<TimerStore>,
    service: Arc<dyn AttemptService>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    routes: RoutesConfig,
    messages: MessagesConfig,
    slot: Mutex<Slot>,
}

impl AutoSubmitCoordinator {
    pub fn new(
        store: Arc<TimerStore>,
        service: Arc<dyn AttemptService>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            store,
            service,
            notifier,
            navigator,
            routes: RoutesConfig::default(),
            messages: MessagesConfig::default(),
            slot: Mutex::new(Slot {
                attempt_id: None,
                phase: SubmitPhase::Idle,
            }),
        }
    }

    pub fn with_routes(mut self, routes: RoutesConfig) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_messages(mut self, messages: MessagesConfig) -> Self {
        self.messages = messages;
        self
    }

    pub fn routes(&self) -> &RoutesConfig {
        &self.routes
    }

    pub fn phase(&self) -> SubmitPhase {
        self.slot().phase
    }

    pub fn attempt_id(&self) -> Option<String> {
        self.slot().attempt_id.clone()
    }

    /// Watch `attempt_id`; any earlier attempt's triggers become stale.
    ///
    /// Re-arming the attempt that is currently being submitted is a no-op.
    pub fn arm(&self, attempt_id: &str) {
        let mut slot = self.slot();
        if slot.attempt_id.as_deref() == Some(attempt_id) && slot.phase == SubmitPhase::Submitting
        {
            debug!(%attempt_id, "auto-submit in flight; keeping phase on re-arm");
            return;
        }
        slot.attempt_id = Some(attempt_id.to_string());
        slot.phase = SubmitPhase::Counting;
    }

    /// Forget the armed attempt. Later triggers for it are stale.
    pub fn disarm(&self) {
        let mut slot = self.slot();
        slot.attempt_id = None;
        slot.phase = SubmitPhase::Idle;
    }

    /// The countdown for `attempt_id` reached zero.
    pub fn mark_expired(&self, attempt_id: &str) {
        let mut slot = self.slot();
        if slot.attempt_id.as_deref() == Some(attempt_id) && slot.phase == SubmitPhase::Counting {
            slot.phase = SubmitPhase::Expired;
        }
    }

    /// A submission made outside the coordinator finished for `attempt_id`.
    pub fn mark_completed(&self, attempt_id: &str) {
        let mut slot = self.slot();
        if slot.attempt_id.as_deref() == Some(attempt_id) {
            slot.phase = SubmitPhase::Completed;
        }
    }

    /// Submit `attempt_id` because its deadline passed.
    pub async fn handle_expiry(&self, attempt_id: &str) -> AutoSubmitOutcome {
        if let Some(rejected) = self.admit(attempt_id) {
            return rejected;
        }

        info!(%attempt_id, "auto-submitting expired attempt");
        let outcome = match self.submit(attempt_id).await {
            Ok(outcome) => outcome,
            Err(err) if self.is_completed(attempt_id) => {
                debug!(
                    %attempt_id,
                    error = %err,
                    "auto-submit failed after a manual submission; ignoring"
                );
                return AutoSubmitOutcome::AlreadyCompleted;
            }
            Err(err) => {
                warn!(%attempt_id, error = %err, "auto-submit failed; manual submission required");
                self.notifier.show_error(&self.messages.auto_submit_failed);
                self.settle(attempt_id, SubmitPhase::Failed);
                return AutoSubmitOutcome::Failed {
                    reason: err.to_string(),
                };
            }
        };

        self.settle(attempt_id, SubmitPhase::Completed);
        outcome
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Move to `Submitting` or say why the trigger is dropped.
    fn admit(&self, attempt_id: &str) -> Option<AutoSubmitOutcome> {
        let mut slot = self.slot();
        if slot.attempt_id.as_deref() != Some(attempt_id) {
            debug!(%attempt_id, "ignoring expiry for an attempt that is not armed");
            return Some(AutoSubmitOutcome::Stale);
        }
        match slot.phase {
            SubmitPhase::Submitting => {
                debug!(%attempt_id, "auto-submit already in flight; dropping trigger");
                Some(AutoSubmitOutcome::InFlight)
            }
            SubmitPhase::Idle | SubmitPhase::Completed => Some(AutoSubmitOutcome::Stale),
            SubmitPhase::Counting | SubmitPhase::Expired | SubmitPhase::Failed => {
                slot.phase = SubmitPhase::Submitting;
                None
            }
        }
    }

    async fn submit(&self, attempt_id: &str) -> Result<AutoSubmitOutcome, AttemptServiceError> {
        let details = self.service.get_attempt(attempt_id).await?;
        if details.is_completed {
            info!(%attempt_id, "attempt was already submitted; clearing timer");
            self.clear_record(attempt_id);
            return Ok(AutoSubmitOutcome::AlreadyCompleted);
        }

        let payload = SubmitPayload::from_saved(&details.user_answers);
        let answered = payload.answers.len();
        self.service.submit_attempt(attempt_id, &payload).await?;

        info!(%attempt_id, answered, "attempt auto-submitted");
        self.notifier.show_warning(&self.messages.auto_submitted);
        self.clear_record(attempt_id);
        self.redirect_to_result(attempt_id);
        Ok(AutoSubmitOutcome::Submitted { answered })
    }

    fn clear_record(&self, attempt_id: &str) {
        if let Err(err) = self.store.clear_if(attempt_id) {
            error!(%attempt_id, error = %err, "failed to clear timer record");
        }
    }

    fn redirect_to_result(&self, attempt_id: &str) {
        if !self.is_armed_for(attempt_id) {
            return;
        }
        let result_path = self.routes.result_path(attempt_id);
        let current = self.navigator.current_path();
        if current == result_path {
            return;
        }
        let replace = current == self.routes.quiz_path(attempt_id);
        self.navigator.navigate(&result_path, replace);
    }

    /// Record the end of a submission unless the slot moved on meanwhile.
    fn settle(&self, attempt_id: &str, phase: SubmitPhase) {
        let mut slot = self.slot();
        if slot.attempt_id.as_deref() == Some(attempt_id) && slot.phase == SubmitPhase::Submitting
        {
            slot.phase = phase;
        }
    }

    fn is_completed(&self, attempt_id: &str) -> bool {
        let slot = self.slot();
        slot.attempt_id.as_deref() == Some(attempt_id) && slot.phase == SubmitPhase::Completed
    }

    fn is_armed_for(&self, attempt_id: &str) -> bool {
        self.slot().attempt_id.as_deref() == Some(attempt_id)
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        // The slot is always left in a consistent state; recover from poisoning.
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}
