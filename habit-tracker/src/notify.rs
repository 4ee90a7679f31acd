//! User-visible notifications

use std::sync::Mutex;

pub const SCHEMA_MISMATCH_MESSAGE: &str = "Database schema mismatch. Please run migration.";
pub const SAVE_PROGRESS_FAILED: &str = "Failed to save progress";
pub const ADD_HABIT_FAILED: &str = "Failed to add habit";
pub const RENAME_HABIT_FAILED: &str = "Failed to update habit name";
pub const SAVE_WEEKLY_FAILED: &str = "Failed to save weekly progress";
pub const SAVE_REFLECTION_FAILED: &str = "Failed to save reflection";
pub const SIGN_OUT_FAILED: &str = "Error signing out";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }

    /// Message shown when a sync fails with `detail`
    pub fn sync_failed(detail: &str) -> Self {
        Self::error(format!("Failed to sync data: {}", detail))
    }
}

/// Sink for messages meant for the user
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Emits notifications as log events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Info => tracing::info!(message = %notification.message, "notification"),
            NotificationLevel::Error => tracing::warn!(message = %notification.message, "notification"),
        }
    }
}

/// Keeps every notification for later display
#[derive(Debug, Default)]
pub struct NotificationLog {
    entries: Mutex<Vec<Notification>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything received so far
    pub fn entries(&self) -> Vec<Notification> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Messages only, in arrival order
    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|n| n.message).collect()
    }

    /// Remove and return everything received so far
    pub fn drain(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .map(|mut e| std::mem::take(&mut *e))
            .unwrap_or_default()
    }
}

impl Notifier for NotificationLog {
    fn notify(&self, notification: Notification) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_collects_and_drains() {
        let log = NotificationLog::new();
        log.notify(Notification::error(ADD_HABIT_FAILED));
        log.notify(Notification::sync_failed("timeout"));

        assert_eq!(
            log.messages(),
            vec!["Failed to add habit", "Failed to sync data: timeout"]
        );
        assert_eq!(log.drain().len(), 2);
        assert!(log.entries().is_empty());
    }
}
