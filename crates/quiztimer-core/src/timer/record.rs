//! The persisted active-attempt record.
//!
//! Encoded as camelCase JSON so the stored text matches what the quiz client
//! writes. Decoding is lenient about descriptive fields and strict about the
//! two load-bearing ones: `attemptId` and `endTime`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The single in-flight timed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveAttemptRecord {
    pub attempt_id: String,
    pub timer_minutes: u32,
    pub start_time: DateTime<Utc>,
    /// Stored verbatim at creation; never recomputed from `start_time`.
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub title: String,
}

/// Why stored text could not be turned into a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordDefect {
    #[error("stored value is not a JSON object")]
    Malformed,
    #[error("attemptId is missing or empty")]
    MissingAttemptId,
    #[error("endTime is missing")]
    MissingEndTime,
    #[error("endTime '{0}' is not an ISO-8601 instant")]
    UnparsableEndTime(String),
    #[error("endTime is not after startTime")]
    EndNotAfterStart,
    #[error("neither startTime nor timerMinutes is usable")]
    MissingDuration,
}

impl ActiveAttemptRecord {
    /// Build a record, computing the deadline from the start instant.
    pub fn new(
        attempt_id: impl Into<String>,
        timer_minutes: u32,
        start_time: DateTime<Utc>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            attempt_id: attempt_id.into(),
            timer_minutes,
            start_time,
            end_time: start_time + Duration::minutes(i64::from(timer_minutes)),
            title: title.into(),
        }
    }

    /// Whole seconds left until the deadline, rounded up, never negative.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        remaining_secs(self.end_time, now)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode stored text.
    ///
    /// A missing `startTime` is rebuilt from `endTime - timerMinutes`, a
    /// missing `timerMinutes` from the span between the two instants.
    pub fn decode(text: &str) -> Result<Self, RecordDefect> {
        let value: Value = serde_json::from_str(text).map_err(|_| RecordDefect::Malformed)?;
        let obj = value.as_object().ok_or(RecordDefect::Malformed)?;

        let attempt_id = obj
            .get("attemptId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(RecordDefect::MissingAttemptId)?
            .to_string();

        let end_raw = obj
            .get("endTime")
            .and_then(Value::as_str)
            .ok_or(RecordDefect::MissingEndTime)?;
        let end_time = parse_instant(end_raw)
            .ok_or_else(|| RecordDefect::UnparsableEndTime(end_raw.to_string()))?;

        let minutes = obj
            .get("timerMinutes")
            .and_then(Value::as_u64)
            .filter(|m| *m > 0)
            .and_then(|m| u32::try_from(m).ok());
        let start = obj
            .get("startTime")
            .and_then(Value::as_str)
            .and_then(parse_instant);

        let (start_time, timer_minutes) = match (start, minutes) {
            (Some(start), _) if start >= end_time => return Err(RecordDefect::EndNotAfterStart),
            (Some(start), Some(minutes)) => (start, minutes),
            (Some(start), None) => {
                let span_secs = (end_time - start).num_seconds();
                let minutes = u32::try_from((span_secs + 59) / 60).unwrap_or(u32::MAX);
                (start, minutes.max(1))
            }
            (None, Some(minutes)) => (end_time - Duration::minutes(i64::from(minutes)), minutes),
            (None, None) => return Err(RecordDefect::MissingDuration),
        };

        let title = obj
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            attempt_id,
            timer_minutes,
            start_time,
            end_time,
            title,
        })
    }
}

/// Whole seconds from `now` until `deadline`, rounded up, clamped at zero.
pub fn remaining_secs(deadline: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let ms = (deadline - now).num_milliseconds();
    if ms <= 0 {
        0
    } else {
        (ms as u64).div_ceil(1000)
    }
}

/// Parse an RFC 3339 / ISO-8601 instant into UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
