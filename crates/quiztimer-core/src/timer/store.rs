//! Deadline store: the single source of truth for the in-flight timed attempt.

use std::sync::Arc;

use chrono::DateTime;
use tracing::{debug, info, warn};

use super::record::{parse_instant, ActiveAttemptRecord};
use crate::clock::Clock;
use crate::error::{Result, StoreError, ValidationError};
use crate::storage::{ConflictPolicy, StorageBackend, TimerConfig};

pub const DEFAULT_STORAGE_KEY: &str = "activeQuizTimer";

/// Result of persisting a new attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    pub record: ActiveAttemptRecord,
    pub remaining_secs: u64,
    /// A different attempt that was overwritten under [`ConflictPolicy::Replace`].
    pub replaced: Option<ActiveAttemptRecord>,
}

/// Owns the persisted [`ActiveAttemptRecord`]. At most one record exists.
pub struct TimerStore {
    backend: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
    key: String,
    on_conflict: ConflictPolicy,
}

impl TimerStore {
    pub fn new(backend: Arc<dyn StorageBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            key: DEFAULT_STORAGE_KEY.to_string(),
            on_conflict: ConflictPolicy::default(),
        }
    }

    pub fn from_config(
        backend: Arc<dyn StorageBackend>,
        clock: Arc<dyn Clock>,
        config: &TimerConfig,
    ) -> Self {
        Self::new(backend, clock)
            .with_key(config.storage_key.clone())
            .with_conflict_policy(config.on_conflict)
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.on_conflict = policy;
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.on_conflict
    }

    /// Persist a new timed attempt and return the seconds left until its deadline.
    ///
    /// # Errors
    /// Fails on a non-positive duration, an unparsable `start_time`, a
    /// conflicting active attempt under [`ConflictPolicy::Reject`], or a
    /// backend failure.
    pub fn start(
        &self,
        attempt_id: &str,
        timer_minutes: u32,
        start_time: &str,
        title: &str,
    ) -> Result<u64> {
        let start = parse_instant(start_time).ok_or_else(|| ValidationError::InvalidTimestamp {
            value: start_time.to_string(),
            message: "expected an ISO-8601 instant".into(),
        })?;
        Ok(self
            .begin(attempt_id, timer_minutes, start, title)?
            .remaining_secs)
    }

    /// Like [`TimerStore::start`] with an already parsed start instant.
    pub fn begin(
        &self,
        attempt_id: &str,
        timer_minutes: u32,
        start_time: DateTime<chrono::Utc>,
        title: &str,
    ) -> Result<StartOutcome> {
        if attempt_id.is_empty() {
            return Err(ValidationError::EmptyAttemptId.into());
        }
        if timer_minutes == 0 {
            return Err(ValidationError::NonPositiveDuration.into());
        }

        let replaced = match self.load()? {
            Some(existing) if existing.attempt_id != attempt_id => match self.on_conflict {
                ConflictPolicy::Reject => {
                    return Err(StoreError::AttemptAlreadyActive {
                        active_attempt_id: existing.attempt_id,
                    }
                    .into());
                }
                ConflictPolicy::Replace => {
                    warn!(
                        previous = %existing.attempt_id,
                        next = %attempt_id,
                        "replacing active timed attempt; its auto-submit is abandoned"
                    );
                    Some(existing)
                }
            },
            _ => None,
        };

        let record = ActiveAttemptRecord::new(attempt_id, timer_minutes, start_time, title);
        self.backend.set(&self.key, &record.encode()?)?;

        let remaining_secs = record.remaining_secs(self.clock.now());
        info!(
            attempt_id = %record.attempt_id,
            end_time = %record.end_time,
            remaining_secs,
            "timed attempt persisted"
        );
        Ok(StartOutcome {
            record,
            remaining_secs,
            replaced,
        })
    }

    /// Read the persisted record.
    ///
    /// Corrupted entries are deleted and reported as absent. A record whose
    /// deadline already passed is still returned so it can be auto-submitted.
    pub fn load(&self) -> Result<Option<ActiveAttemptRecord>> {
        let Some(text) = self.backend.get(&self.key)? else {
            return Ok(None);
        };
        match ActiveAttemptRecord::decode(&text) {
            Ok(record) => Ok(Some(record)),
            Err(defect) => {
                warn!(key = %self.key, %defect, "discarding corrupted timer record");
                self.backend.remove(&self.key)?;
                Ok(None)
            }
        }
    }

    /// Remove the record. Calling this with nothing stored is a no-op.
    pub fn clear(&self) -> Result<()> {
        self.backend.remove(&self.key)?;
        debug!(key = %self.key, "timer record cleared");
        Ok(())
    }

    /// Remove the record only if it belongs to `attempt_id`.
    ///
    /// Returns whether a record was removed.
    pub fn clear_if(&self, attempt_id: &str) -> Result<bool> {
        match self.load()? {
            Some(record) if record.attempt_id == attempt_id => {
                self.clear()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
