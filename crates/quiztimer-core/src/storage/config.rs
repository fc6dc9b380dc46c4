//! TOML-based application configuration.
//!
//! Stores:
//! - Attempt service endpoint and request timeout
//! - Deadline store key and start-conflict policy
//! - Quiz and result route templates
//! - User-facing notification messages
//!
//! Configuration is stored at `~/.config/quiztimer/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;

/// Placeholder substituted with the attempt id in route templates.
pub const ATTEMPT_ID_PLACEHOLDER: &str = "{attempt_id}";

/// Attempt service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// What to do when a timed attempt starts while another one is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Refuse to start; the persisted attempt must be submitted or abandoned first.
    #[default]
    Reject,
    /// Overwrite the persisted attempt. Its auto-submit is abandoned.
    Replace,
}

/// Deadline store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    #[serde(default)]
    pub on_conflict: ConflictPolicy,
}

/// Route templates. `{attempt_id}` is replaced with the attempt id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutesConfig {
    #[serde(default = "default_quiz_route")]
    pub quiz: String,
    #[serde(default = "default_result_route")]
    pub result: String,
}

/// User-facing notification messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesConfig {
    #[serde(default = "default_auto_submitted")]
    pub auto_submitted: String,
    #[serde(default = "default_auto_submit_failed")]
    pub auto_submit_failed: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/quiztimer/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
}

// Default functions
fn default_base_url() -> String {
    "http://localhost:3000/api".into()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_storage_key() -> String {
    "activeQuizTimer".into()
}
fn default_quiz_route() -> String {
    "/learner/quizzes/attempts/{attempt_id}".into()
}
fn default_result_route() -> String {
    "/learner/quizzes/attempts/{attempt_id}/result".into()
}
fn default_auto_submitted() -> String {
    "Time is up! Your quiz was submitted automatically.".into()
}
fn default_auto_submit_failed() -> String {
    "Time is up, but the quiz could not be submitted automatically. Please submit it manually."
        .into()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            on_conflict: ConflictPolicy::default(),
        }
    }
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            quiz: default_quiz_route(),
            result: default_result_route(),
        }
    }
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            auto_submitted: default_auto_submitted(),
            auto_submit_failed: default_auto_submit_failed(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            timer: TimerConfig::default(),
            routes: RoutesConfig::default(),
            messages: MessagesConfig::default(),
        }
    }
}

impl RoutesConfig {
    /// Path of the quiz-taking view for an attempt.
    pub fn quiz_path(&self, attempt_id: &str) -> String {
        self.quiz.replace(ATTEMPT_ID_PLACEHOLDER, attempt_id)
    }

    /// Path of the result view for an attempt.
    pub fn result_path(&self, attempt_id: &str) -> String {
        self.result.replace(ATTEMPT_ID_PLACEHOLDER, attempt_id)
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("config.toml"),
                message: e.to_string(),
            })
    }

    /// Load from disk, writing the defaults first if no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key and persist. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Set a config value by key without touching disk.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
