//! End-to-end behaviour of the quiz timer: deadline persistence, countdown
//! resynchronization and exactly-once auto-submission.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Duration;
use tokio::sync::watch;

use common::{answer, instant, Fixture, ScriptedService};
use quiztimer_core::storage::StorageBackend;
use quiztimer_core::timer::{AutoSubmitCoordinator, AutoSubmitOutcome, CountdownState};
use quiztimer_core::{Clock, ClearReason, Event, Navigator, SubmitPhase};

const QUIZ_VIEW: &str = "/learner/quizzes/attempts/attempt-1";
const RESULT_VIEW: &str = "/learner/quizzes/attempts/attempt-1/result";

#[tokio::test]
async fn sample_attempt_is_submitted_once_after_deadline() {
    let fx = Fixture::new(
        "2024-01-01T00:00:00Z",
        ScriptedService::with_answers(vec![answer("q1", 2), answer("q2", -1)]),
        "/dashboard",
    );

    let events = fx
        .timer
        .start_attempt("attempt-1", 1, "2024-01-01T00:00:00Z", "Sample Quiz")
        .await
        .unwrap();
    assert!(matches!(
        events.as_slice(),
        [Event::TimerStarted { remaining_secs: 60, .. }]
    ));

    let stored = fx.backend.get("activeQuizTimer").unwrap().unwrap();
    let stored: serde_json::Value = serde_json::from_str(&stored).unwrap();
    assert_eq!(stored["endTime"], "2024-01-01T00:01:00Z");

    fx.clock.set(instant("2024-01-01T00:01:01Z"));
    let events = fx.timer.poll().await;

    assert!(events
        .iter()
        .any(|e| matches!(e, Event::TimerExpired { attempt_id, .. } if attempt_id == "attempt-1")));
    assert!(events.iter().any(|e| matches!(e, Event::AutoSubmitted { answered: 1, .. })));
    assert_eq!(fx.timer.remaining_secs(), 0);

    let submissions = fx.service.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].0, "attempt-1");
    assert_eq!(submissions[0].1.answers.len(), 1);
    assert_eq!(submissions[0].1.answers[0].question_id, "q1");
    assert_eq!(submissions[0].1.answers[0].selected_option_index, 2);

    assert!(fx.store.load().unwrap().is_none());
    assert_eq!(fx.removals(), 1);
    assert_eq!(fx.notifier.warnings(), 1);
    assert_eq!(fx.notifier.errors(), 0);
    assert_eq!(fx.navigator.current_path(), RESULT_VIEW);
    assert_eq!(fx.timer.phase(), SubmitPhase::Completed);

    // Later wake-ups do nothing.
    fx.clock.advance(Duration::seconds(5));
    assert!(fx.timer.poll().await.is_empty());
    assert!(fx.timer.visibility_resumed().await.is_empty());
    assert_eq!(fx.service.submissions().len(), 1);
}

#[tokio::test]
async fn deadline_passed_while_closed_is_submitted_on_init() {
    let first = Fixture::new("2024-01-01T00:00:00Z", ScriptedService::default(), QUIZ_VIEW);
    first
        .timer
        .start_attempt("attempt-1", 1, "2024-01-01T00:00:00Z", "Sample Quiz")
        .await
        .unwrap();
    first.timer.dispose();

    first.clock.advance(Duration::hours(2));
    let reloaded = first.reload(
        ScriptedService::with_answers(vec![answer("q1", 0)]),
        "/dashboard",
    );

    let events = reloaded.timer.init().await.unwrap();
    assert!(matches!(
        events.first(),
        Some(Event::TimerRestored { remaining_secs: 0, .. })
    ));
    assert!(events.iter().any(|e| matches!(e, Event::TimerExpired { .. })));
    assert_eq!(reloaded.timer.remaining_secs(), 0);
    assert_eq!(reloaded.service.submissions().len(), 1);
    assert!(reloaded.store.load().unwrap().is_none());
    assert_eq!(reloaded.navigator.history(), vec!["/dashboard", RESULT_VIEW]);
}

#[tokio::test]
async fn visibility_resume_uses_deadline_not_ticks() {
    let fx = Fixture::new("2024-01-01T00:00:00Z", ScriptedService::default(), "/");
    fx.timer
        .start_attempt("attempt-1", 30, "2024-01-01T00:00:00Z", "Long Quiz")
        .await
        .unwrap();

    fx.clock.advance(Duration::seconds(1));
    fx.timer.poll().await;
    assert_eq!(fx.timer.remaining_secs(), 1799);

    // Background tab: wake-ups throttled for a long time.
    fx.clock.advance(Duration::minutes(12));
    assert_eq!(fx.timer.remaining_secs(), 1799);

    let events = fx.timer.visibility_resumed().await;
    let record = fx.store.load().unwrap().unwrap();
    let expected = record.remaining_secs(fx.clock.now());
    assert_eq!(expected, 1079);
    assert_eq!(fx.timer.remaining_secs(), expected);
    assert!(matches!(
        events.as_slice(),
        [Event::TimerResynced { previous_secs: 1799, remaining_secs: 1079, .. }]
    ));
}

#[tokio::test]
async fn resume_after_deadline_submits_immediately() {
    let fx = Fixture::new("2024-01-01T00:00:00Z", ScriptedService::default(), QUIZ_VIEW);
    fx.timer
        .start_attempt("attempt-1", 5, "2024-01-01T00:00:00Z", "Quiz")
        .await
        .unwrap();

    fx.clock.advance(Duration::minutes(20));
    let events = fx.timer.visibility_resumed().await;
    assert!(events.iter().any(|e| matches!(e, Event::AutoSubmitted { .. })));
    assert_eq!(fx.service.submissions().len(), 1);
    // On the quiz view the result replaces the history entry.
    assert_eq!(fx.navigator.history(), vec![RESULT_VIEW]);
}

#[tokio::test]
async fn manual_submission_in_another_view_wins_the_race() {
    let fx = Fixture::new("2024-01-01T00:00:00Z", ScriptedService::default(), "/dashboard");
    fx.timer
        .start_attempt("attempt-1", 1, "2024-01-01T00:00:00Z", "Quiz")
        .await
        .unwrap();

    // Submitted elsewhere; this controller never heard about it.
    fx.service.submit_manually("attempt-1");

    fx.clock.advance(Duration::seconds(61));
    let events = fx.timer.poll().await;

    assert!(events.iter().any(|e| matches!(e, Event::AutoSubmitSkipped { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::AttemptCleared { reason: ClearReason::AlreadyCompleted, .. }
    )));
    assert_eq!(fx.notifier.errors(), 0);
    assert_eq!(fx.service.submissions().len(), 1);
    assert_eq!(fx.removals(), 1);
    assert!(fx.store.load().unwrap().is_none());
    assert_eq!(fx.timer.phase(), SubmitPhase::Completed);
}

#[tokio::test]
async fn manual_submission_during_auto_submit_clears_once() {
    let service = ScriptedService::default();
    service.gate();
    let fx = Fixture::new("2024-01-01T00:00:00Z", service, "/dashboard");
    fx.timer
        .start_attempt("attempt-1", 1, "2024-01-01T00:00:00Z", "Quiz")
        .await
        .unwrap();
    fx.clock.advance(Duration::seconds(61));

    let (auto_events, manual_events) = tokio::join!(fx.timer.poll(), async {
        fx.service.entered.notified().await;
        assert!(fx.timer.banner().is_submitting);
        fx.service.submit_manually("attempt-1");
        let events = fx.timer.complete_manually("attempt-1").unwrap();
        fx.service.release.notify_one();
        events
    });

    assert!(matches!(
        manual_events.as_slice(),
        [Event::AttemptCleared { reason: ClearReason::ManuallySubmitted, .. }]
    ));
    assert!(auto_events.iter().any(|e| matches!(e, Event::AutoSubmitSkipped { .. })));
    assert_eq!(fx.notifier.errors(), 0);
    assert_eq!(fx.removals(), 1);
    assert_eq!(fx.service.submissions().len(), 1);
    assert_eq!(fx.timer.phase(), SubmitPhase::Completed);
    assert_eq!(fx.navigator.history(), vec!["/dashboard"]);
}

#[tokio::test]
async fn overlapping_trigger_is_dropped_while_submitting() {
    let service = ScriptedService::default();
    service.gate();
    let fx = Fixture::new("2024-01-01T00:00:00Z", service, "/dashboard");
    fx.store.start("attempt-1", 1, "2024-01-01T00:00:00Z", "Quiz").unwrap();

    let coordinator = AutoSubmitCoordinator::new(
        fx.store.clone(),
        fx.service.clone(),
        fx.notifier.clone(),
        fx.navigator.clone(),
    );
    coordinator.arm("attempt-1");
    coordinator.mark_expired("attempt-1");

    let (first, second) = tokio::join!(coordinator.handle_expiry("attempt-1"), async {
        fx.service.entered.notified().await;
        assert_eq!(coordinator.phase(), SubmitPhase::Submitting);
        let second = coordinator.handle_expiry("attempt-1").await;
        fx.service.release.notify_one();
        second
    });

    assert_eq!(first, AutoSubmitOutcome::Submitted { answered: 0 });
    assert_eq!(second, AutoSubmitOutcome::InFlight);
    assert_eq!(fx.service.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(fx.service.submissions().len(), 1);
}

#[tokio::test]
async fn repeated_init_does_not_restart_an_in_flight_submission() {
    let service = ScriptedService::default();
    service.gate();
    let fx = Fixture::new("2024-01-01T00:00:00Z", service, "/dashboard");
    fx.store.start("attempt-1", 1, "2024-01-01T00:00:00Z", "Quiz").unwrap();
    fx.clock.advance(Duration::minutes(5));

    let (first, second) = tokio::join!(fx.timer.init(), async {
        fx.service.entered.notified().await;
        let second = fx.timer.init().await.unwrap();
        assert_eq!(fx.timer.phase(), SubmitPhase::Submitting);
        fx.service.release.notify_one();
        second
    });

    let first = first.unwrap();
    assert!(first.iter().any(|e| matches!(e, Event::AutoSubmitted { .. })));
    assert!(!second.iter().any(|e| matches!(e, Event::AutoSubmitStarted { .. })));
    assert_eq!(fx.service.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(fx.service.submissions().len(), 1);
    assert_eq!(fx.removals(), 1);
    assert!(fx.store.load().unwrap().is_none());
    assert_eq!(fx.timer.phase(), SubmitPhase::Completed);
}

#[tokio::test]
async fn failed_submit_after_manual_completion_is_not_reported() {
    let service = ScriptedService::with_answers(vec![answer("q1", 0)]);
    service.gate();
    service.set_fail_submit(true);
    let fx = Fixture::new("2024-01-01T00:00:00Z", service, "/dashboard");
    fx.timer
        .start_attempt("attempt-1", 1, "2024-01-01T00:00:00Z", "Quiz")
        .await
        .unwrap();
    fx.clock.advance(Duration::seconds(61));

    let (auto_events, manual_events) = tokio::join!(fx.timer.poll(), async {
        fx.service.entered.notified().await;
        let events = fx.timer.complete_manually("attempt-1").unwrap();
        fx.service.release.notify_one();
        events
    });

    assert!(matches!(
        manual_events.as_slice(),
        [Event::AttemptCleared { reason: ClearReason::ManuallySubmitted, .. }]
    ));
    assert!(auto_events.iter().any(|e| matches!(e, Event::AutoSubmitSkipped { .. })));
    assert!(!auto_events.iter().any(|e| matches!(e, Event::AutoSubmitFailed { .. })));
    assert_eq!(fx.notifier.errors(), 0);
    assert_eq!(fx.timer.phase(), SubmitPhase::Completed);
    assert_eq!(fx.removals(), 1);
    assert!(fx.store.load().unwrap().is_none());
    assert_eq!(fx.navigator.history(), vec!["/dashboard"]);
}

#[tokio::test]
async fn failed_auto_submit_keeps_record_until_retry() {
    let service = ScriptedService::with_answers(vec![answer("q1", 1)]);
    service.set_fail_submit(true);
    let fx = Fixture::new("2024-01-01T00:00:00Z", service, "/dashboard");
    fx.timer
        .start_attempt("attempt-1", 1, "2024-01-01T00:00:00Z", "Quiz")
        .await
        .unwrap();

    fx.clock.advance(Duration::seconds(90));
    let events = fx.timer.poll().await;
    assert!(events.iter().any(|e| matches!(e, Event::AutoSubmitFailed { .. })));
    assert_eq!(fx.notifier.errors(), 1);
    assert_eq!(fx.timer.phase(), SubmitPhase::Failed);
    assert!(fx.store.load().unwrap().is_some());
    assert!(fx.timer.banner().is_active);
    assert!(!fx.timer.banner().is_submitting);
    assert!(fx.timer.next_wakeup().is_none());
    assert_eq!(fx.navigator.history(), vec!["/dashboard"]);

    // No automatic retry on the next wake-up.
    assert!(fx.timer.poll().await.is_empty());

    fx.service.set_fail_submit(false);
    let events = fx.timer.retry_auto_submit().await;
    assert!(events.iter().any(|e| matches!(e, Event::AutoSubmitted { answered: 1, .. })));
    assert!(fx.store.load().unwrap().is_none());
    assert!(!fx.timer.banner().is_active);
    assert_eq!(fx.navigator.current_path(), RESULT_VIEW);
}

#[tokio::test]
async fn failed_fetch_survives_reload_and_resubmits() {
    let service = ScriptedService::default();
    service.set_fail_fetch(true);
    let fx = Fixture::new("2024-01-01T00:00:00Z", service, "/dashboard");
    fx.timer
        .start_attempt("attempt-1", 1, "2024-01-01T00:00:00Z", "Quiz")
        .await
        .unwrap();
    fx.clock.advance(Duration::minutes(2));
    fx.timer.poll().await;
    assert_eq!(fx.timer.phase(), SubmitPhase::Failed);

    let reloaded = fx.reload(ScriptedService::default(), "/dashboard");
    reloaded.timer.init().await.unwrap();
    assert_eq!(reloaded.service.submissions().len(), 1);
    assert!(reloaded.store.load().unwrap().is_none());
}

#[tokio::test]
async fn abandoned_attempt_never_submits() {
    let fx = Fixture::new("2024-01-01T00:00:00Z", ScriptedService::default(), "/");
    fx.timer
        .start_attempt("attempt-1", 1, "2024-01-01T00:00:00Z", "Quiz")
        .await
        .unwrap();
    fx.timer.abandon().unwrap();

    fx.clock.advance(Duration::minutes(5));
    assert!(fx.timer.poll().await.is_empty());
    assert!(fx.timer.visibility_resumed().await.is_empty());
    assert_eq!(fx.service.fetches.load(Ordering::SeqCst), 0);
    assert_eq!(fx.timer.countdown_state(), CountdownState::Inactive);
}

#[tokio::test]
async fn corrupted_record_is_discarded_on_init() {
    let fx = Fixture::new("2024-01-01T00:00:00Z", ScriptedService::default(), "/");
    fx.backend
        .set("activeQuizTimer", r#"{"attemptId":"attempt-1","endTime":"soon"}"#)
        .unwrap();

    let events = fx.timer.init().await.unwrap();
    assert!(events.is_empty());
    assert!(fx.backend.get("activeQuizTimer").unwrap().is_none());
    assert!(!fx.timer.banner().is_active);
    assert_eq!(fx.service.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn second_attempt_is_rejected_while_first_is_active() {
    let fx = Fixture::new("2024-01-01T00:00:00Z", ScriptedService::default(), "/");
    fx.timer
        .start_attempt("attempt-1", 10, "2024-01-01T00:00:00Z", "First")
        .await
        .unwrap();

    let result = fx
        .timer
        .start_attempt("attempt-2", 10, "2024-01-01T00:00:00Z", "Second")
        .await;
    assert!(result.is_err());
    assert_eq!(fx.timer.active_attempt_id().as_deref(), Some("attempt-1"));
    assert_eq!(fx.timer.phase(), SubmitPhase::Counting);
}

#[tokio::test]
async fn run_loop_drives_countdown_to_submission() {
    let fx = Fixture::new("2024-01-01T00:00:58.500Z", ScriptedService::default(), "/");
    fx.timer
        .start_attempt("attempt-1", 1, "2024-01-01T00:00:00Z", "Quiz")
        .await
        .unwrap();

    let (_tx, rx) = watch::channel(false);
    let clock = Arc::clone(&fx.clock);
    let mut seen = Vec::new();
    fx.timer
        .run(rx, |event| {
            if matches!(event, Event::TimerTick { .. }) {
                clock.advance(Duration::seconds(1));
            }
            seen.push(event.clone());
        })
        .await;

    assert!(seen.iter().any(|e| matches!(e, Event::AutoSubmitted { .. })));
    assert_eq!(fx.service.submissions().len(), 1);
    assert!(fx.timer.next_wakeup().is_none());
}

#[tokio::test]
async fn run_loop_stops_on_shutdown() {
    let fx = Fixture::new("2024-01-01T00:00:00Z", ScriptedService::default(), "/");
    fx.timer
        .start_attempt("attempt-1", 10, "2024-01-01T00:00:00Z", "Quiz")
        .await
        .unwrap();

    let (tx, rx) = watch::channel(false);
    tokio::join!(fx.timer.run(rx, |_| {}), async {
        tx.send(true).unwrap();
    });

    assert_eq!(fx.timer.countdown_state(), CountdownState::Running);
    assert!(fx.store.load().unwrap().is_some());
}
