// Append-only workflow history, one ordered log per submission

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use super::status::{SubmissionStatus, WorkflowAction};
use super::submission::WorkflowHistoryEntry;
use super::transitions::{validate_path, PathError};

#[derive(Debug, Default)]
pub struct HistoryLedger {
    entries: Mutex<HashMap<String, Vec<WorkflowHistoryEntry>>>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Vec<WorkflowHistoryEntry>>> {
        // A poisoned ledger still holds only fully appended entries
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append one entry. `created_at` never goes backwards within a
    /// submission, so timestamp order and append order agree.
    pub fn record(
        &self,
        submission_id: &str,
        from: SubmissionStatus,
        to: SubmissionStatus,
        actor_id: &str,
        action: WorkflowAction,
        notes: Option<String>,
    ) -> WorkflowHistoryEntry {
        let mut entries = self.entries();
        let log = entries.entry(submission_id.to_string()).or_default();

        let now = Utc::now();
        let created_at: DateTime<Utc> = log
            .last()
            .map(|last| last.created_at.max(now))
            .unwrap_or(now);

        let entry = WorkflowHistoryEntry {
            id: Uuid::new_v4().to_string(),
            submission_id: submission_id.to_string(),
            from_status: from,
            to_status: to,
            performed_by_id: actor_id.to_string(),
            action,
            notes,
            created_at,
        };
        log.push(entry.clone());

        debug!(
            submission_id = %submission_id,
            from = %from,
            to = %to,
            actor_id = %actor_id,
            sequence = log.len(),
            "Recorded workflow history entry"
        );
        entry
    }

    /// Entries for one submission, oldest first
    pub fn history_for(&self, submission_id: &str) -> Vec<WorkflowHistoryEntry> {
        self.entries()
            .get(submission_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len_for(&self, submission_id: &str) -> usize {
        self.entries().get(submission_id).map_or(0, Vec::len)
    }

    /// Check the recorded entries form a legal walk ending at `current`
    pub fn verify_path(&self, submission_id: &str, current: SubmissionStatus) -> Result<(), PathError> {
        let pairs: Vec<_> = self
            .history_for(submission_id)
            .iter()
            .map(|entry| (entry.from_status, entry.to_status))
            .collect();
        validate_path(&pairs, current)
    }

    /// Drop a submission's entries; only used when the submission itself is deleted
    pub fn purge(&self, submission_id: &str) -> usize {
        self.entries()
            .remove(submission_id)
            .map_or(0, |removed| removed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SubmissionStatus::*;

    #[test]
    fn test_entries_come_back_in_append_order() {
        let ledger = HistoryLedger::new();
        ledger.record("s1", Draft, Pending, "writer", WorkflowAction::Submit, None);
        ledger.record(
            "s1",
            Pending,
            StoryApproved,
            "sm",
            WorkflowAction::StoryApprove,
            Some("Excellent story!".into()),
        );
        ledger.record("s2", Draft, Pending, "writer", WorkflowAction::Submit, None);

        let history = ledger.history_for("s1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].to_status, Pending);
        assert_eq!(history[1].to_status, StoryApproved);
        assert_eq!(history[1].notes.as_deref(), Some("Excellent story!"));
        assert!(history[0].created_at <= history[1].created_at);
        assert_eq!(ledger.len_for("s2"), 1);
        assert!(ledger.history_for("missing").is_empty());
    }

    #[test]
    fn test_verify_path_against_current_status() {
        let ledger = HistoryLedger::new();
        ledger.record("s1", Draft, Pending, "writer", WorkflowAction::Submit, None);
        ledger.record("s1", Pending, NeedsRevision, "sm", WorkflowAction::StoryNeedsRevision, None);

        assert!(ledger.verify_path("s1", NeedsRevision).is_ok());
        assert!(ledger.verify_path("s1", Pending).is_err());
        assert!(ledger.verify_path("fresh", Draft).is_ok());
    }

    #[test]
    fn test_purge_removes_only_target() {
        let ledger = HistoryLedger::new();
        ledger.record("s1", Draft, Pending, "writer", WorkflowAction::Submit, None);
        ledger.record("s2", Draft, Pending, "writer", WorkflowAction::Submit, None);

        assert_eq!(ledger.purge("s1"), 1);
        assert_eq!(ledger.len_for("s1"), 0);
        assert_eq!(ledger.len_for("s2"), 1);
        assert_eq!(ledger.purge("s1"), 0);
    }
}
