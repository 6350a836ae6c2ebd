// Per-recipient notifications raised by accepted status changes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use super::status::{Role, SubmissionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    StatusChanged,
    FeedbackReceived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub submission_id: String,
    pub kind: NotificationKind,
    pub from_status: SubmissionStatus,
    pub to_status: SubmissionStatus,
    /// Role of the reviewer who caused it
    pub sender_role: Role,
    #[serde(default)]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct NotificationLog {
    inbox: Mutex<HashMap<String, Vec<Notification>>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn inbox(&self) -> MutexGuard<'_, HashMap<String, Vec<Notification>>> {
        self.inbox.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Tell `recipient_id` that a submission moved `from -> to`. A message
    /// adds a second, feedback notification carrying it.
    pub fn status_changed(
        &self,
        recipient_id: &str,
        submission_id: &str,
        from: SubmissionStatus,
        to: SubmissionStatus,
        sender_role: Role,
        message: Option<String>,
    ) -> usize {
        let now = Utc::now();
        let note = |kind, message| Notification {
            id: Uuid::new_v4().to_string(),
            recipient_id: recipient_id.to_string(),
            submission_id: submission_id.to_string(),
            kind,
            from_status: from,
            to_status: to,
            sender_role,
            message,
            created_at: now,
        };

        let mut raised = vec![note(NotificationKind::StatusChanged, None)];
        if message.is_some() {
            raised.push(note(NotificationKind::FeedbackReceived, message));
        }
        let count = raised.len();

        self.inbox()
            .entry(recipient_id.to_string())
            .or_default()
            .extend(raised);
        debug!(recipient_id = %recipient_id, submission_id = %submission_id, to = %to, count, "Raised notifications");
        count
    }

    /// Oldest first
    pub fn for_recipient(&self, recipient_id: &str) -> Vec<Notification> {
        self.inbox().get(recipient_id).cloned().unwrap_or_default()
    }

    pub fn count_for_submission(&self, submission_id: &str) -> usize {
        self.inbox()
            .values()
            .flatten()
            .filter(|notification| notification.submission_id == submission_id)
            .count()
    }

    /// Drop every notification about a deleted submission
    pub fn purge(&self, submission_id: &str) -> usize {
        let mut inbox = self.inbox();
        let mut removed = 0;
        for notifications in inbox.values_mut() {
            let before = notifications.len();
            notifications.retain(|notification| notification.submission_id != submission_id);
            removed += before - notifications.len();
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SubmissionStatus::*;

    #[test]
    fn test_feedback_adds_second_notification() {
        let log = NotificationLog::new();
        log.status_changed("user-writer", "s1", Draft, Pending, Role::Writer, None);
        log.status_changed(
            "user-writer",
            "s1",
            Pending,
            NeedsRevision,
            Role::StoryManager,
            Some("Expand the ending".into()),
        );

        let inbox = log.for_recipient("user-writer");
        let kinds: Vec<_> = inbox.iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NotificationKind::StatusChanged,
                NotificationKind::StatusChanged,
                NotificationKind::FeedbackReceived
            ]
        );
        assert_eq!(inbox[2].message.as_deref(), Some("Expand the ending"));
        assert!(log.for_recipient("user-admin").is_empty());
    }

    #[test]
    fn test_purge_only_touches_one_submission() {
        let log = NotificationLog::new();
        log.status_changed("user-writer", "s1", Draft, Pending, Role::Writer, None);
        log.status_changed("user-writer", "s2", Draft, Pending, Role::Writer, None);

        assert_eq!(log.purge("s1"), 1);
        assert_eq!(log.count_for_submission("s1"), 0);
        assert_eq!(log.count_for_submission("s2"), 1);
    }
}
