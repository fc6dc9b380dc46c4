//! Shared fixtures for quiztimer-core integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use quiztimer_core::attempt::{AttemptDetails, AttemptService, SavedAnswer, SubmitPayload};
use quiztimer_core::error::{AttemptServiceError, StoreError};
use quiztimer_core::storage::{MemoryBackend, StorageBackend};
use quiztimer_core::surface::{HistoryNavigator, RecordingNotifier};
use quiztimer_core::timer::parse_instant;
use quiztimer_core::{ManualClock, QuizTimer, TimerStore};

pub fn instant(raw: &str) -> DateTime<Utc> {
    parse_instant(raw).expect("valid test instant")
}

pub fn answer(question_id: &str, index: i32) -> SavedAnswer {
    SavedAnswer {
        question_id: question_id.to_string(),
        selected_option_index: Some(index),
    }
}

/// Attempt service whose responses are scripted by the test.
#[derive(Default)]
pub struct ScriptedService {
    completed: AtomicBool,
    fail_fetch: AtomicBool,
    fail_submit: AtomicBool,
    answers: Mutex<Vec<SavedAnswer>>,
    pub fetches: AtomicUsize,
    submissions: Mutex<Vec<(String, SubmitPayload)>>,
    /// When set, `get_attempt` waits for `release` after signalling `entered`.
    gated: AtomicBool,
    pub entered: Notify,
    pub release: Notify,
}

impl ScriptedService {
    pub fn with_answers(answers: Vec<SavedAnswer>) -> Self {
        let service = Self::default();
        *service.answers.lock().unwrap() = answers;
        service
    }

    pub fn set_completed(&self, completed: bool) {
        self.completed.store(completed, Ordering::SeqCst);
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_submit(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::SeqCst);
    }

    pub fn gate(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn submissions(&self) -> Vec<(String, SubmitPayload)> {
        self.submissions.lock().unwrap().clone()
    }

    /// What a learner clicking "submit" on the quiz view does.
    pub fn submit_manually(&self, attempt_id: &str) {
        self.submissions
            .lock()
            .unwrap()
            .push((attempt_id.to_string(), SubmitPayload::default()));
        self.set_completed(true);
    }
}

#[async_trait]
impl AttemptService for ScriptedService {
    async fn get_attempt(&self, _attempt_id: &str) -> Result<AttemptDetails, AttemptServiceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.gated.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(AttemptServiceError::Other("network unreachable".into()));
        }
        Ok(AttemptDetails {
            is_completed: self.completed.load(Ordering::SeqCst),
            user_answers: self.answers.lock().unwrap().clone(),
        })
    }

    async fn submit_attempt(
        &self,
        attempt_id: &str,
        payload: &SubmitPayload,
    ) -> Result<(), AttemptServiceError> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(AttemptServiceError::Status {
                status: 500,
                body: "internal error".into(),
            });
        }
        self.submissions
            .lock()
            .unwrap()
            .push((attempt_id.to_string(), payload.clone()));
        self.set_completed(true);
        Ok(())
    }
}

/// Memory backend that counts removals of keys that actually existed.
#[derive(Default)]
pub struct CountingBackend {
    inner: MemoryBackend,
    pub effective_removals: AtomicUsize,
}

impl StorageBackend for CountingBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if self.inner.get(key)?.is_some() {
            self.effective_removals.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.remove(key)
    }
}

pub struct Fixture {
    pub clock: Arc<ManualClock>,
    pub backend: Arc<CountingBackend>,
    pub store: Arc<TimerStore>,
    pub service: Arc<ScriptedService>,
    pub notifier: Arc<RecordingNotifier>,
    pub navigator: Arc<HistoryNavigator>,
    pub timer: QuizTimer,
}

impl Fixture {
    pub fn new(now: &str, service: ScriptedService, current_path: &str) -> Self {
        let clock = Arc::new(ManualClock::new(instant(now)));
        let backend = Arc::new(CountingBackend::default());
        Self::with_backend(clock, backend, service, current_path)
    }

    pub fn with_backend(
        clock: Arc<ManualClock>,
        backend: Arc<CountingBackend>,
        service: ScriptedService,
        current_path: &str,
    ) -> Self {
        let store = Arc::new(TimerStore::new(backend.clone(), clock.clone()));
        let service = Arc::new(service);
        let notifier = Arc::new(RecordingNotifier::new());
        let navigator = Arc::new(HistoryNavigator::new(current_path));
        let timer = QuizTimer::new(
            store.clone(),
            service.clone(),
            notifier.clone(),
            navigator.clone(),
        );
        Self {
            clock,
            backend,
            store,
            service,
            notifier,
            navigator,
            timer,
        }
    }

    /// A fresh controller over the same clock and storage, as after a reload.
    pub fn reload(&self, service: ScriptedService, current_path: &str) -> Self {
        Self::with_backend(
            self.clock.clone(),
            self.backend.clone(),
            service,
            current_path,
        )
    }

    pub fn removals(&self) -> usize {
        self.backend.effective_removals.load(Ordering::SeqCst)
    }
}
