// Assertions against server-side truth, never against rendered text

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::client::WorkflowApi;
use crate::session::Session;
use crate::workflows::{validate_path, SubmissionDetail, SubmissionStatus, WorkflowError};

/// Reads submissions through a session with read access to everything
/// it is asked about (usually ADMIN)
pub struct Verifier {
    api: Arc<dyn WorkflowApi>,
    reader: Session,
    poll_interval: Duration,
}

impl Verifier {
    pub fn new(api: Arc<dyn WorkflowApi>, reader: Session, poll_interval: Duration) -> Self {
        Self {
            api,
            reader,
            poll_interval,
        }
    }

    pub async fn fetch(&self, submission_id: &str) -> Result<SubmissionDetail, WorkflowError> {
        self.api.fetch_submission(&self.reader, submission_id).await
    }

    pub async fn verify_status(&self, submission_id: &str, expected: SubmissionStatus) -> Result<bool, WorkflowError> {
        let actual = self.fetch(submission_id).await?.status();
        if actual != expected {
            debug!(submission_id = %submission_id, expected = %expected, actual = %actual, "Status mismatch");
        }
        Ok(actual == expected)
    }

    /// True iff some ledger entry records exactly `from -> to`
    pub async fn verify_history_transition(
        &self,
        submission_id: &str,
        from: SubmissionStatus,
        to: SubmissionStatus,
    ) -> Result<bool, WorkflowError> {
        let detail = self.fetch(submission_id).await?;
        Ok(detail.transitions().contains(&(from, to)))
    }

    /// History forms a legal walk from DRAFT ending at the current status
    pub async fn verify_history_path(&self, submission_id: &str) -> Result<bool, WorkflowError> {
        let detail = self.fetch(submission_id).await?;
        match validate_path(&detail.transitions(), detail.status()) {
            Ok(()) => Ok(true),
            Err(error) => {
                warn!(submission_id = %submission_id, error = %error, "History is not a valid path");
                Ok(false)
            }
        }
    }

    pub async fn count_transitions_to(
        &self,
        submission_id: &str,
        status: SubmissionStatus,
    ) -> Result<usize, WorkflowError> {
        let detail = self.fetch(submission_id).await?;
        Ok(detail
            .workflow_history
            .iter()
            .filter(|entry| entry.to_status == status)
            .count())
    }

    /// Whether `session`'s role-visible queue currently lists the submission
    pub async fn verify_in_queue(&self, submission_id: &str, session: &Session) -> Result<bool, WorkflowError> {
        let queue = self.api.queue(session).await?;
        Ok(queue.iter().any(|submission| submission.id == submission_id))
    }

    /// Whether `recipient_id` was notified about the submission, optionally
    /// about its arrival in `status`
    pub async fn verify_notification_sent(
        &self,
        recipient_id: &str,
        submission_id: &str,
        status: Option<SubmissionStatus>,
    ) -> Result<bool, WorkflowError> {
        let inbox = self.api.notifications(&self.reader, Some(recipient_id)).await?;
        let found = inbox.iter().any(|notification| {
            notification.submission_id == submission_id
                && status.map_or(true, |status| notification.to_status == status)
        });
        if !found {
            debug!(recipient_id = %recipient_id, submission_id = %submission_id, "Notification not found");
        }
        Ok(found)
    }

    /// Poll until the submission reaches `expected`, failing with `Timeout`
    /// once `limit` elapses
    pub async fn wait_for_status(
        &self,
        submission_id: &str,
        expected: SubmissionStatus,
        limit: Duration,
    ) -> Result<SubmissionDetail, WorkflowError> {
        let poll = async {
            loop {
                let detail = self.fetch(submission_id).await?;
                if detail.status() == expected {
                    return Ok(detail);
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };
        tokio::time::timeout(limit, poll).await.unwrap_or_else(|_| {
            Err(WorkflowError::Timeout {
                operation: format!("wait for {submission_id} to reach {expected}"),
                duration_ms: limit.as_millis() as u64,
            })
        })
    }
}
