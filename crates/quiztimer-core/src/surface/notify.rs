use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Fire-and-forget user notifications.
pub trait Notifier: Send + Sync {
    fn show_warning(&self, message: &str);

    fn show_error(&self, message: &str);
}

/// Forwards notifications to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show_warning(&self, message: &str) {
        tracing::warn!(target: "quiztimer::notify", "{message}");
    }

    fn show_error(&self, message: &str) {
        tracing::error!(target: "quiztimer::notify", "{message}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

/// Keeps every notification it receives, in order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> usize {
        self.count(NotificationLevel::Error)
    }

    pub fn warnings(&self) -> usize {
        self.count(NotificationLevel::Warning)
    }

    fn count(&self, level: NotificationLevel) -> usize {
        self.notifications()
            .iter()
            .filter(|n| n.level == level)
            .count()
    }

    fn push(&self, level: NotificationLevel, message: &str) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(Notification {
                level,
                message: message.to_string(),
            });
        }
    }
}

impl Notifier for RecordingNotifier {
    fn show_warning(&self, message: &str) {
        self.push(NotificationLevel::Warning, message);
    }

    fn show_error(&self, message: &str) {
        self.push(NotificationLevel::Error, message);
    }
}
