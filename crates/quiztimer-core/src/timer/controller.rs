//! Process-wide quiz timer.
//!
//! [`QuizTimer`] owns the deadline store, the countdown engine and the
//! auto-submit coordinator, and is the only thing hosts talk to. It has an
//! explicit lifecycle: [`QuizTimer::init`] re-hydrates the persisted attempt
//! (including one whose deadline passed while the process was down) and
//! [`QuizTimer::dispose`] stops counting without touching the persisted record.
//!
//! Locks are never held across an `.await`; the coordinator's phase machine
//! is what serializes submissions.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use super::coordinator::{AutoSubmitCoordinator, AutoSubmitOutcome, SubmitPhase};
use super::countdown::{CountdownEngine, CountdownState};
use super::record::{parse_instant, ActiveAttemptRecord};
use super::store::TimerStore;
use crate::attempt::AttemptService;
use crate::clock::Clock;
use crate::error::{Result, ValidationError};
use crate::events::{ClearReason, Event};
use crate::storage::{Config, MessagesConfig, RoutesConfig};
use crate::surface::{Navigator, Notifier};

/// State consumed by the presentation banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerBanner {
    pub is_active: bool,
    pub remaining_seconds: u64,
    pub is_submitting: bool,
    pub title: String,
}

#[derive(Debug, Default)]
struct Session {
    record: Option<ActiveAttemptRecord>,
    countdown: CountdownEngine,
}

pub struct QuizTimer {
    store: Arc<TimerStore>,
    clock: Arc<dyn Clock>,
    navigator: Arc<dyn Navigator>,
    coordinator: AutoSubmitCoordinator,
    session: Mutex<Session>,
}

impl QuizTimer {
    pub fn new(
        store: Arc<TimerStore>,
        service: Arc<dyn AttemptService>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let clock = store.clock().clone();
        let coordinator =
            AutoSubmitCoordinator::new(store.clone(), service, notifier, navigator.clone());
        Self {
            store,
            clock,
            navigator,
            coordinator,
            session: Mutex::new(Session::default()),
        }
    }

    /// Apply routes and messages from `config`.
    pub fn configured(self, config: &Config) -> Self {
        self.with_routes(config.routes.clone())
            .with_messages(config.messages.clone())
    }

    pub fn with_routes(mut self, routes: RoutesConfig) -> Self {
        self.coordinator = self.coordinator.with_routes(routes);
        self
    }

    pub fn with_messages(mut self, messages: MessagesConfig) -> Self {
        self.coordinator = self.coordinator.with_messages(messages);
        self
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Pick up the persisted attempt, if any.
    ///
    /// An attempt whose deadline already passed is auto-submitted before
    /// this returns.
    pub async fn init(&self) -> Result<Vec<Event>> {
        let Some(record) = self.store.load()? else {
            self.reset_session();
            debug!("no active timed attempt to restore");
            return Ok(Vec::new());
        };

        let now = self.clock.now();
        let mut events = vec![Event::TimerRestored {
            attempt_id: record.attempt_id.clone(),
            end_time: record.end_time,
            remaining_secs: record.remaining_secs(now),
            at: now,
        }];
        info!(attempt_id = %record.attempt_id, end_time = %record.end_time, "restored timed attempt");
        let expired = self.activate(record, now);
        self.follow_up(expired, &mut events).await;
        Ok(events)
    }

    /// Stop counting. The persisted record is kept for the next `init`.
    pub fn dispose(&self) {
        self.reset_session();
        debug!("quiz timer disposed");
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a timed attempt. `start_time` is an ISO-8601 instant.
    pub async fn start_attempt(
        &self,
        attempt_id: &str,
        timer_minutes: u32,
        start_time: &str,
        title: &str,
    ) -> Result<Vec<Event>> {
        let start = parse_instant(start_time).ok_or_else(|| ValidationError::InvalidTimestamp {
            value: start_time.to_string(),
            message: "expected an ISO-8601 instant".into(),
        })?;
        let outcome = self.store.begin(attempt_id, timer_minutes, start, title)?;

        let now = self.clock.now();
        let mut events = Vec::new();
        if let Some(previous) = outcome.replaced {
            events.push(Event::AttemptCleared {
                attempt_id: previous.attempt_id,
                reason: ClearReason::Replaced,
                at: now,
            });
        }
        events.push(Event::TimerStarted {
            attempt_id: outcome.record.attempt_id.clone(),
            end_time: outcome.record.end_time,
            remaining_secs: outcome.remaining_secs,
            at: now,
        });
        let expired = self.activate(outcome.record, now);
        self.follow_up(expired, &mut events).await;
        Ok(events)
    }

    /// Scheduled wake-up.
    pub async fn poll(&self) -> Vec<Event> {
        let now = self.clock.now();
        let event = self.session().countdown.tick(now);
        let mut events = Vec::new();
        self.follow_up(event, &mut events).await;
        events
    }

    /// The host returned to the foreground; resynchronize with the deadline.
    pub async fn visibility_resumed(&self) -> Vec<Event> {
        let now = self.clock.now();
        let event = self.session().countdown.resume(now);
        let mut events = Vec::new();
        self.follow_up(event, &mut events).await;
        events
    }

    /// User-initiated retry after a failed auto-submit.
    pub async fn retry_auto_submit(&self) -> Vec<Event> {
        if self.coordinator.phase() != SubmitPhase::Failed {
            return Vec::new();
        }
        let Some(attempt_id) = self.coordinator.attempt_id() else {
            return Vec::new();
        };
        self.auto_submit(&attempt_id).await
    }

    /// Drop the active attempt without submitting it.
    pub fn abandon(&self) -> Result<Vec<Event>> {
        let record = self.store.load()?;
        self.store.clear()?;
        self.reset_session();
        Ok(record
            .map(|record| {
                info!(attempt_id = %record.attempt_id, "timed attempt abandoned");
                vec![Event::AttemptCleared {
                    attempt_id: record.attempt_id,
                    reason: ClearReason::Abandoned,
                    at: self.clock.now(),
                }]
            })
            .unwrap_or_default())
    }

    /// A manual submission of `attempt_id` succeeded.
    pub fn complete_manually(&self, attempt_id: &str) -> Result<Vec<Event>> {
        let removed = self.store.clear_if(attempt_id)?;
        {
            let mut session = self.session();
            if session.countdown.attempt_id() == Some(attempt_id) {
                session.countdown.cancel();
                session.record = None;
            }
        }
        self.coordinator.mark_completed(attempt_id);
        if !removed {
            return Ok(Vec::new());
        }
        info!(%attempt_id, "timed attempt submitted manually");
        Ok(vec![Event::AttemptCleared {
            attempt_id: attempt_id.to_string(),
            reason: ClearReason::ManuallySubmitted,
            at: self.clock.now(),
        }])
    }

    /// Navigate back to the quiz view of the active attempt.
    ///
    /// Returns false when no attempt is active.
    pub fn return_to_quiz(&self) -> bool {
        let Some(attempt_id) = self.active_attempt_id() else {
            return false;
        };
        let path = self.coordinator.routes().quiz_path(&attempt_id);
        self.navigator.navigate(&path, false);
        true
    }

    /// Sleep/poll until there is nothing left to count, or `shutdown` flips
    /// to true. Every produced event is handed to `on_event`.
    pub async fn run<F>(&self, mut shutdown: watch::Receiver<bool>, mut on_event: F)
    where
        F: FnMut(&Event),
    {
        while let Some(wait) = self.next_wakeup() {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            if *shutdown.borrow() {
                break;
            }
            for event in self.poll().await {
                on_event(&event);
            }
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> SubmitPhase {
        self.coordinator.phase()
    }

    pub fn countdown_state(&self) -> CountdownState {
        self.session().countdown.state()
    }

    pub fn remaining_secs(&self) -> u64 {
        self.session().countdown.remaining_secs()
    }

    pub fn active_record(&self) -> Option<ActiveAttemptRecord> {
        self.session().record.clone()
    }

    pub fn active_attempt_id(&self) -> Option<String> {
        self.session().record.as_ref().map(|r| r.attempt_id.clone())
    }

    pub fn next_wakeup(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.session().countdown.next_wakeup(now)
    }

    pub fn banner(&self) -> TimerBanner {
        let session = self.session();
        TimerBanner {
            is_active: session.record.is_some(),
            remaining_seconds: session.countdown.remaining_secs(),
            is_submitting: self.coordinator.phase() == SubmitPhase::Submitting,
            title: session
                .record
                .as_ref()
                .map(|r| r.title.clone())
                .unwrap_or_default(),
        }
    }

    /// The banner is hidden while the user is on the active attempt's quiz view.
    pub fn banner_visible(&self) -> bool {
        let Some(attempt_id) = self.active_attempt_id() else {
            return false;
        };
        self.navigator.current_path() != self.coordinator.routes().quiz_path(&attempt_id)
    }

    pub fn snapshot(&self) -> Event {
        let session = self.session();
        Event::StateSnapshot {
            attempt_id: session.record.as_ref().map(|r| r.attempt_id.clone()),
            title: session
                .record
                .as_ref()
                .map(|r| r.title.clone())
                .unwrap_or_default(),
            phase: self.coordinator.phase(),
            remaining_secs: session.countdown.remaining_secs(),
            end_time: session.record.as_ref().map(|r| r.end_time),
            at: self.clock.now(),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reset_session(&self) {
        {
            let mut session = self.session();
            session.countdown.cancel();
            session.record = None;
        }
        self.coordinator.disarm();
    }

    /// Track `record` and arm the coordinator. Returns the expiry event when
    /// the deadline already passed.
    fn activate(&self, record: ActiveAttemptRecord, now: DateTime<Utc>) -> Option<Event> {
        self.coordinator.arm(&record.attempt_id);
        let mut session = self.session();
        let expired = session
            .countdown
            .activate(&record.attempt_id, record.end_time, now);
        session.record = Some(record);
        expired
    }

    /// Record a countdown event and run auto-submit when it signals expiry.
    async fn follow_up(&self, event: Option<Event>, events: &mut Vec<Event>) {
        let Some(event) = event else {
            return;
        };
        let expired_attempt = match &event {
            Event::TimerExpired { attempt_id, .. } => Some(attempt_id.clone()),
            _ => None,
        };
        events.push(event);
        if let Some(attempt_id) = expired_attempt {
            info!(%attempt_id, "attempt deadline reached");
            self.coordinator.mark_expired(&attempt_id);
            events.extend(self.auto_submit(&attempt_id).await);
        }
    }

    async fn auto_submit(&self, attempt_id: &str) -> Vec<Event> {
        let started_at = self.clock.now();
        let outcome = self.coordinator.handle_expiry(attempt_id).await;
        let at = self.clock.now();
        let started = Event::AutoSubmitStarted {
            attempt_id: attempt_id.to_string(),
            at: started_at,
        };

        match outcome {
            AutoSubmitOutcome::InFlight | AutoSubmitOutcome::Stale => Vec::new(),
            AutoSubmitOutcome::Failed { reason } => vec![
                started,
                Event::AutoSubmitFailed {
                    attempt_id: attempt_id.to_string(),
                    reason,
                    at,
                },
            ],
            AutoSubmitOutcome::Submitted { answered } => {
                self.forget(attempt_id);
                vec![
                    started,
                    Event::AutoSubmitted {
                        attempt_id: attempt_id.to_string(),
                        answered,
                        at,
                    },
                    Event::AttemptCleared {
                        attempt_id: attempt_id.to_string(),
                        reason: ClearReason::AutoSubmitted,
                        at,
                    },
                ]
            }
            AutoSubmitOutcome::AlreadyCompleted => {
                self.forget(attempt_id);
                vec![
                    started,
                    Event::AutoSubmitSkipped {
                        attempt_id: attempt_id.to_string(),
                        at,
                    },
                    Event::AttemptCleared {
                        attempt_id: attempt_id.to_string(),
                        reason: ClearReason::AlreadyCompleted,
                        at,
                    },
                ]
            }
        }
    }

    /// Drop the in-memory view of `attempt_id` once its record is gone.
    fn forget(&self, attempt_id: &str) {
        let mut session = self.session();
        if session.countdown.attempt_id() == Some(attempt_id) {
            session.countdown.cancel();
            session.record = None;
        }
    }
}
