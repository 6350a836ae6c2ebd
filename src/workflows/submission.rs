// Submission records, audit entries and request payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::{FormatDecision, SubmissionStatus, WorkflowAction};

/// Content item progressing through editorial review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub summary: Option<String>,
    pub author_id: String,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub story_manager_id: Option<String>,
    #[serde(default)]
    pub book_manager_id: Option<String>,
    #[serde(default)]
    pub content_admin_id: Option<String>,
    #[serde(default)]
    pub story_feedback: Option<String>,
    #[serde(default)]
    pub format_decision: Option<FormatDecision>,
    #[serde(default)]
    pub final_notes: Option<String>,
    #[serde(default)]
    pub word_count: usize,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    pub fn new_draft(id: String, author_id: String, draft: NewSubmission, now: DateTime<Utc>) -> Self {
        let word_count = count_words(&draft.content);
        Self {
            id,
            title: draft.title,
            content: draft.content,
            summary: draft.summary,
            author_id,
            status: SubmissionStatus::Draft,
            story_manager_id: None,
            book_manager_id: None,
            content_admin_id: None,
            story_feedback: None,
            format_decision: None,
            final_notes: None,
            word_count,
            submitted_at: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Immutable audit record of one accepted transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowHistoryEntry {
    pub id: String,
    pub submission_id: String,
    pub from_status: SubmissionStatus,
    pub to_status: SubmissionStatus,
    pub performed_by_id: String,
    pub action: WorkflowAction,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Submission together with its ordered history, as served by the read path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDetail {
    #[serde(flatten)]
    pub submission: Submission,
    #[serde(default)]
    pub workflow_history: Vec<WorkflowHistoryEntry>,
}

impl SubmissionDetail {
    pub fn status(&self) -> SubmissionStatus {
        self.submission.status
    }

    pub fn transitions(&self) -> Vec<(SubmissionStatus, SubmissionStatus)> {
        self.workflow_history
            .iter()
            .map(|entry| (entry.from_status, entry.to_status))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubmission {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Author edit of a draft; absent fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl ContentUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.summary.is_none()
    }
}

/// Optional data accompanying a workflow action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<FormatDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_manager_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_manager_id: Option<String>,
}

impl ActionPayload {
    pub fn with_feedback(feedback: impl Into<String>) -> Self {
        Self {
            feedback: Some(feedback.into()),
            ..Default::default()
        }
    }

    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn with_decision(decision: FormatDecision, notes: Option<String>) -> Self {
        Self {
            decision: Some(decision),
            notes,
            ..Default::default()
        }
    }

    /// Text recorded on the history entry: whichever free-text field was given
    pub fn history_note(&self) -> Option<String> {
        self.reason
            .clone()
            .or_else(|| self.feedback.clone())
            .or_else(|| self.notes.clone())
    }
}

/// Body of `PUT /submissions/{id}` when it carries an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: WorkflowAction,
    #[serde(flatten)]
    pub payload: ActionPayload,
}

pub fn count_words(content: &str) -> usize {
    let mut text = String::with_capacity(content.len());
    let mut in_tag = false;
    for c in content.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_word_count_ignores_markup() {
        assert_eq!(count_words("<p>Once upon a time</p><p>The End.</p>"), 6);
        assert_eq!(count_words("   "), 0);
    }

    #[test]
    fn test_action_request_wire_shape() {
        let body = json!({
            "action": "assign_story_manager",
            "storyManagerId": "sm-1",
            "notes": "please take this one"
        });
        let request: ActionRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.action, WorkflowAction::AssignStoryManager);
        assert_eq!(request.payload.story_manager_id.as_deref(), Some("sm-1"));

        let encoded = serde_json::to_value(ActionRequest {
            action: WorkflowAction::Reject,
            payload: ActionPayload::with_reason("Does not meet quality standards"),
        })
        .unwrap();
        assert_eq!(
            encoded,
            json!({"action": "reject", "reason": "Does not meet quality standards"})
        );
    }

    #[test]
    fn test_history_note_prefers_reason() {
        let payload = ActionPayload {
            reason: Some("off-topic".into()),
            feedback: Some("nice prose".into()),
            ..Default::default()
        };
        assert_eq!(payload.history_note().as_deref(), Some("off-topic"));
        assert_eq!(ActionPayload::default().history_note(), None);
    }
}
