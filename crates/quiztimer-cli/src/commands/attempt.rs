use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use clap::Subcommand;
use quiztimer_core::attempt::keyring_store::{self, API_TOKEN_KEY};
use quiztimer_core::{
    Config, ConflictPolicy, Event, HistoryNavigator, HttpAttemptService, LogNotifier, Navigator,
    QuizTimer, SqliteBackend, SubmitPhase, SystemClock, TimerStore,
};
use serde_json::json;
use tokio::sync::watch;

#[derive(Subcommand)]
pub enum AttemptAction {
    /// Start the countdown for a timed attempt
    Start {
        /// Attempt ID
        attempt_id: String,
        /// Time limit in minutes
        #[arg(long)]
        minutes: u32,
        /// Quiz title shown in the banner
        #[arg(long)]
        title: String,
        /// Attempt start (ISO-8601); defaults to now
        #[arg(long)]
        start_time: Option<String>,
        /// Overwrite a different active attempt instead of failing
        #[arg(long)]
        replace: bool,
    },
    /// Print banner state as JSON
    ///
    /// The active attempt is restored first, so an attempt whose deadline
    /// already passed is submitted before its state is printed.
    Status {
        /// View the user is currently on
        #[arg(long, default_value = "/")]
        at: String,
    },
    /// Count down until the attempt is submitted (Ctrl-C stops)
    Watch {
        /// View the user is currently on
        #[arg(long, default_value = "/")]
        at: String,
    },
    /// Submit an expired attempt whose auto-submit failed
    Retry {
        /// View the user is currently on
        #[arg(long, default_value = "/")]
        at: String,
    },
    /// Drop the active attempt without submitting
    Abandon,
    /// Record that the attempt was submitted manually
    Complete {
        /// Attempt ID
        attempt_id: String,
    },
}

struct Host {
    timer: QuizTimer,
    navigator: Arc<HistoryNavigator>,
}

fn open_host(at: &str, replace: bool) -> Result<Host, Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let token = keyring_store::get(API_TOKEN_KEY).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "keyring unavailable; sending requests without a token");
        None
    });

    let mut store = TimerStore::from_config(
        Arc::new(SqliteBackend::open()?),
        Arc::new(SystemClock),
        &config.timer,
    );
    if replace {
        store = store.with_conflict_policy(ConflictPolicy::Replace);
    }

    let navigator = Arc::new(HistoryNavigator::new(at));
    let timer = QuizTimer::new(
        Arc::new(store),
        Arc::new(HttpAttemptService::new(&config.api, token)?),
        Arc::new(LogNotifier),
        navigator.clone(),
    )
    .configured(&config);

    Ok(Host { timer, navigator })
}

fn print_events(events: &[Event]) -> Result<(), serde_json::Error> {
    for event in events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}

fn print_status(host: &Host) -> Result<(), serde_json::Error> {
    let status = json!({
        "banner": host.timer.banner(),
        "bannerVisible": host.timer.banner_visible(),
        "phase": host.timer.phase(),
        "attemptId": host.timer.active_attempt_id(),
        "path": host.navigator.current_path(),
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

pub async fn run(action: AttemptAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AttemptAction::Start {
            attempt_id,
            minutes,
            title,
            start_time,
            replace,
        } => {
            let host = open_host("/", replace)?;
            print_events(&host.timer.init().await?)?;
            let start_time = start_time
                .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
            let events = host
                .timer
                .start_attempt(&attempt_id, minutes, &start_time, &title)
                .await?;
            print_events(&events)?;
        }
        AttemptAction::Status { at } => {
            let host = open_host(&at, false)?;
            print_events(&host.timer.init().await?)?;
            print_status(&host)?;
        }
        AttemptAction::Watch { at } => {
            let host = open_host(&at, false)?;
            print_events(&host.timer.init().await?)?;

            let (tx, rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = tx.send(true);
                }
            });
            host.timer
                .run(rx, |event| match serde_json::to_string(event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::warn!(error = %e, "failed to encode event"),
                })
                .await;

            print_status(&host)?;
            if host.timer.phase() == SubmitPhase::Failed {
                return Err("auto-submit failed; run `quiztimer-cli attempt retry`".into());
            }
        }
        AttemptAction::Retry { at } => {
            let host = open_host(&at, false)?;
            print_events(&host.timer.init().await?)?;
            if let Some(attempt_id) = host.timer.active_attempt_id() {
                if host.timer.phase() == SubmitPhase::Failed {
                    return Err(format!("attempt {attempt_id} could not be submitted").into());
                }
                return Err(format!("attempt {attempt_id} has not expired yet").into());
            }
        }
        AttemptAction::Abandon => {
            let host = open_host("/", false)?;
            let events = host.timer.abandon()?;
            if events.is_empty() {
                eprintln!("no active attempt");
            }
            print_events(&events)?;
        }
        AttemptAction::Complete { attempt_id } => {
            let host = open_host("/", false)?;
            let events = host.timer.complete_manually(&attempt_id)?;
            if events.is_empty() {
                eprintln!("no active timer for attempt {attempt_id}");
            }
            print_events(&events)?;
        }
    }
    Ok(())
}
