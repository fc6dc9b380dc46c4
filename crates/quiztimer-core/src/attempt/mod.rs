//! Attempt service collaborator.
//!
//! The coordinator only needs two calls from the quiz backend: look up an
//! attempt (completion flag plus autosaved answers) and submit it.

pub mod http;

pub use http::HttpAttemptService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AttemptServiceError;

/// Option index the quiz UI autosaves for a question the learner skipped.
pub const UNANSWERED: i32 = -1;

/// An autosaved answer as reported by the attempt service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAnswer {
    pub question_id: String,
    /// `None` and [`UNANSWERED`] both mean no option was picked.
    #[serde(default)]
    pub selected_option_index: Option<i32>,
}

/// Snapshot of an attempt returned by `get_attempt`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptDetails {
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub user_answers: Vec<SavedAnswer>,
}

/// One answered question in a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmission {
    pub question_id: String,
    pub selected_option_index: i32,
}

/// Body of `submit_attempt`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubmitPayload {
    pub answers: Vec<AnswerSubmission>,
}

impl SubmitPayload {
    /// Build a submission from autosaved answers, dropping unanswered questions.
    pub fn from_saved(answers: &[SavedAnswer]) -> Self {
        let answers = answers
            .iter()
            .filter_map(|saved| match saved.selected_option_index {
                Some(index) if index > UNANSWERED => Some(AnswerSubmission {
                    question_id: saved.question_id.clone(),
                    selected_option_index: index,
                }),
                _ => None,
            })
            .collect();
        Self { answers }
    }
}

/// Quiz backend operations used by auto-submit.
#[async_trait]
pub trait AttemptService: Send + Sync {
    async fn get_attempt(&self, attempt_id: &str) -> Result<AttemptDetails, AttemptServiceError>;

    async fn submit_attempt(
        &self,
        attempt_id: &str,
        payload: &SubmitPayload,
    ) -> Result<(), AttemptServiceError>;
}

/// Thin wrapper around the OS keyring for the API token.
pub mod keyring_store {
    const SERVICE: &str = "quiztimer";
    pub const API_TOKEN_KEY: &str = "api_token";

    pub fn get(key: &str) -> Result<Option<String>, keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn set(key: &str, value: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        entry.set_password(value)
    }

    pub fn delete(key: &str) -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
