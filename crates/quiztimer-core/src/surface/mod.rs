//! Collaborators provided by the host application: user notifications and
//! navigation. Neither carries business logic.

mod navigation;
mod notify;

pub use navigation::{HistoryNavigator, Navigator};
pub use notify::{LogNotifier, Notifier, RecordingNotifier, Notification, NotificationLevel};
