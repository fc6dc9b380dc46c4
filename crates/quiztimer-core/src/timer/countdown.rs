//! Countdown engine.
//!
//! The engine is a deadline-driven state machine. It does not own a thread or
//! a timer: the host asks [`CountdownEngine::next_wakeup`] how long to sleep,
//! then calls [`CountdownEngine::tick`]. Hosts may oversleep arbitrarily
//! (background tabs, suspended laptops), so every wake-up recomputes the
//! remaining time from the absolute deadline instead of subtracting elapsed
//! ticks.
//!
//! ## State Transitions
//!
//! ```text
//! Inactive -> Running -> Expired
//!     ^          |          |
//!     +--cancel--+----------+
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = CountdownEngine::new();
//! engine.activate(&record.attempt_id, record.end_time, clock.now());
//! while let Some(wait) = engine.next_wakeup(clock.now()) {
//!     sleep(wait);
//!     engine.tick(clock.now()); // Some(Event::TimerExpired) exactly once
//! }
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::remaining_secs;
use crate::events::Event;

const TICK_MS: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountdownState {
    Inactive,
    Running,
    Expired,
}

/// Derived, non-persisted view of the active deadline.
#[derive(Debug, Clone)]
pub struct CountdownEngine {
    state: CountdownState,
    attempt_id: Option<String>,
    deadline: Option<DateTime<Utc>>,
    /// Seconds shown to the user as of the last wake-up.
    remaining_secs: u64,
}

impl Default for CountdownEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CountdownEngine {
    pub fn new() -> Self {
        Self {
            state: CountdownState::Inactive,
            attempt_id: None,
            deadline: None,
            remaining_secs: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> CountdownState {
        self.state
    }

    pub fn attempt_id(&self) -> Option<&str> {
        self.attempt_id.as_deref()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    /// How long the host should wait before the next [`tick`](Self::tick).
    ///
    /// Aligned to the instant the displayed seconds change. `None` when
    /// nothing is counting down.
    pub fn next_wakeup(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.state != CountdownState::Running {
            return None;
        }
        let left_ms = (self.deadline? - now).num_milliseconds();
        if left_ms <= 0 {
            return Some(Duration::ZERO);
        }
        let until_next_second = match left_ms % TICK_MS {
            0 => TICK_MS,
            partial => partial,
        };
        Some(Duration::from_millis(until_next_second as u64))
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start counting toward `deadline`.
    ///
    /// Returns `Some(Event::TimerExpired)` when the deadline already passed.
    pub fn activate(
        &mut self,
        attempt_id: &str,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<Event> {
        self.attempt_id = Some(attempt_id.to_string());
        self.deadline = Some(deadline);
        self.state = CountdownState::Running;
        self.remaining_secs = remaining_secs(deadline, now);
        if self.remaining_secs == 0 {
            return self.expire(now);
        }
        None
    }

    /// Scheduled wake-up.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.state != CountdownState::Running {
            return None;
        }
        self.remaining_secs = remaining_secs(self.deadline?, now);
        if self.remaining_secs == 0 {
            return self.expire(now);
        }
        Some(Event::TimerTick {
            remaining_secs: self.remaining_secs,
            at: now,
        })
    }

    /// The host is back in the foreground after a pause of unknown length.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.state != CountdownState::Running {
            return None;
        }
        let previous_secs = self.remaining_secs;
        self.remaining_secs = remaining_secs(self.deadline?, now);
        if self.remaining_secs == 0 {
            return self.expire(now);
        }
        Some(Event::TimerResynced {
            previous_secs,
            remaining_secs: self.remaining_secs,
            at: now,
        })
    }

    /// Stop counting. Pending wake-ups become no-ops.
    pub fn cancel(&mut self) {
        self.state = CountdownState::Inactive;
        self.attempt_id = None;
        self.deadline = None;
        self.remaining_secs = 0;
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn expire(&mut self, now: DateTime<Utc>) -> Option<Event> {
        self.state = CountdownState::Expired;
        self.remaining_secs = 0;
        Some(Event::TimerExpired {
            attempt_id: self.attempt_id.clone()?,
            at: now,
        })
    }
}
