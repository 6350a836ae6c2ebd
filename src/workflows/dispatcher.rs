// Workflow action dispatcher - validates and atomically applies transitions
//
// Every mutation of a submission happens synchronously while its slot lock is
// held, so an awaiting caller that is cancelled never leaves a half-applied
// transition behind.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::errors::WorkflowError;
use super::ledger::HistoryLedger;
use super::notifications::{Notification, NotificationLog};
use super::status::{Role, SubmissionStatus, WorkflowAction};
use super::submission::{
    count_words, ActionPayload, ContentUpdate, NewSubmission, Submission, SubmissionDetail,
};
use super::transitions::{lookup, role_may_perform, ActorRule, TransitionRule};
use crate::platform::directory::{Account, AccountDirectory};

/// What happens to a second request while a transition on the same
/// submission is still being applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Wait for the in-flight transition, then validate against the new state
    #[default]
    Queue,
    /// Fail immediately with `WorkflowError::Conflict`
    Reject,
}

type Slot = Arc<AsyncMutex<Option<Submission>>>;

pub struct WorkflowDispatcher {
    directory: Arc<AccountDirectory>,
    ledger: HistoryLedger,
    notifications: NotificationLog,
    submissions: Mutex<HashMap<String, Slot>>,
    conflict_policy: ConflictPolicy,
}

impl std::fmt::Debug for WorkflowDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowDispatcher")
            .field("submissions", &self.slots().len())
            .field("conflict_policy", &self.conflict_policy)
            .finish()
    }
}

impl WorkflowDispatcher {
    pub fn new(directory: Arc<AccountDirectory>, conflict_policy: ConflictPolicy) -> Self {
        Self {
            directory,
            ledger: HistoryLedger::new(),
            notifications: NotificationLog::new(),
            submissions: Mutex::new(HashMap::new()),
            conflict_policy,
        }
    }

    pub fn directory(&self) -> &AccountDirectory {
        &self.directory
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    pub fn notifications(&self) -> &NotificationLog {
        &self.notifications
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.submissions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slot(&self, submission_id: &str) -> Result<Slot, WorkflowError> {
        self.slots()
            .get(submission_id)
            .cloned()
            .ok_or_else(|| WorkflowError::submission_not_found(submission_id))
    }

    fn actor(&self, actor_id: &str) -> Result<&Account, WorkflowError> {
        self.directory
            .account(actor_id)
            .ok_or_else(|| WorkflowError::Unauthorized(format!("unknown actor '{actor_id}'")))
    }

    async fn acquire<'a>(
        &self,
        slot: &'a Slot,
        submission_id: &str,
    ) -> Result<AsyncMutexGuard<'a, Option<Submission>>, WorkflowError> {
        match self.conflict_policy {
            ConflictPolicy::Queue => Ok(slot.lock().await),
            ConflictPolicy::Reject => slot.try_lock().map_err(|_| {
                warn!(submission_id = %submission_id, "Rejected concurrent transition");
                WorkflowError::Conflict(submission_id.to_string())
            }),
        }
    }

    pub async fn create_submission(
        &self,
        actor_id: &str,
        draft: NewSubmission,
    ) -> Result<Submission, WorkflowError> {
        let actor = self.actor(actor_id)?;
        if actor.role != Role::Writer {
            return Err(WorkflowError::Unauthorized(format!(
                "{} cannot author submissions",
                actor.role
            )));
        }
        if draft.title.trim().is_empty() {
            return Err(WorkflowError::ValidationFailed("title is required".to_string()));
        }
        if draft.content.trim().is_empty() {
            return Err(WorkflowError::ValidationFailed("content is required".to_string()));
        }

        let submission = Submission::new_draft(
            Uuid::new_v4().to_string(),
            actor.id.clone(),
            draft,
            Utc::now(),
        );
        self.slots().insert(
            submission.id.clone(),
            Arc::new(AsyncMutex::new(Some(submission.clone()))),
        );

        info!(
            submission_id = %submission.id,
            author_id = %actor.id,
            word_count = submission.word_count,
            "Created draft submission"
        );
        Ok(submission)
    }

    /// Validate and apply one workflow action. On any error the submission
    /// and its history are untouched.
    pub async fn perform_action(
        &self,
        submission_id: &str,
        action: WorkflowAction,
        actor_id: &str,
        payload: ActionPayload,
    ) -> Result<Submission, WorkflowError> {
        let actor = self.actor(actor_id)?;
        if !role_may_perform(actor.role, action) {
            warn!(actor_id = %actor.id, role = %actor.role, action = %action, "Role not permitted for action");
            return Err(WorkflowError::Unauthorized(format!(
                "{} may not perform {action}",
                actor.role
            )));
        }

        let slot = self.slot(submission_id)?;
        let mut guard = self.acquire(&slot, submission_id).await?;
        let current = guard
            .as_ref()
            .ok_or_else(|| WorkflowError::submission_not_found(submission_id))?;

        let rule = lookup(current.status, action)
            .filter(|rule| rule.roles.contains(&actor.role))
            .ok_or(WorkflowError::InvalidTransition {
                from: current.status,
                action,
            })?;

        check_actor(rule, actor, current)?;
        let updated = self.apply(rule, actor, current, &payload)?;

        // Ledger append, author notification and status swap happen under
        // the same slot lock
        let note = payload.history_note();
        self.ledger.record(
            submission_id,
            rule.from,
            rule.to,
            &actor.id,
            action,
            note.clone(),
        );
        self.notifications.status_changed(
            &current.author_id,
            submission_id,
            rule.from,
            rule.to,
            actor.role,
            note,
        );
        *guard = Some(updated.clone());

        info!(
            submission_id = %submission_id,
            action = %action,
            from = %rule.from,
            to = %rule.to,
            actor_id = %actor.id,
            role = %actor.role,
            "Workflow transition applied"
        );
        Ok(updated)
    }

    fn apply(
        &self,
        rule: &TransitionRule,
        actor: &Account,
        current: &Submission,
        payload: &ActionPayload,
    ) -> Result<Submission, WorkflowError> {
        let now = Utc::now();
        let mut next = current.clone();

        match rule.action {
            WorkflowAction::Submit => {
                next.submitted_at = Some(now);
            }
            WorkflowAction::AssignStoryManager => {
                let assignee = self.assignee(payload.story_manager_id.as_deref(), Role::StoryManager)?;
                next.story_manager_id = Some(assignee);
            }
            WorkflowAction::StoryApprove => {
                next.story_manager_id.get_or_insert_with(|| actor.id.clone());
                next.story_feedback = payload.feedback.clone();
            }
            WorkflowAction::StoryNeedsRevision => {
                let feedback = required_text(payload.feedback.as_deref(), "feedback")?;
                next.story_manager_id.get_or_insert_with(|| actor.id.clone());
                next.story_feedback = Some(feedback);
            }
            WorkflowAction::AssignBookManager => {
                let assignee = self.assignee(payload.book_manager_id.as_deref(), Role::BookManager)?;
                next.book_manager_id = Some(assignee);
            }
            WorkflowAction::FormatDecision => {
                let decision = payload.decision.ok_or_else(|| {
                    WorkflowError::ValidationFailed("decision is required".to_string())
                })?;
                next.book_manager_id.get_or_insert_with(|| actor.id.clone());
                next.format_decision = Some(decision);
            }
            WorkflowAction::FinalApprove => {
                next.content_admin_id = Some(actor.id.clone());
                next.final_notes = payload.notes.clone();
                next.published_at = Some(now);
            }
            WorkflowAction::Reject => {
                let reason = required_text(payload.reason.as_deref(), "reason")?;
                match actor.role {
                    Role::StoryManager => {
                        next.story_manager_id.get_or_insert_with(|| actor.id.clone());
                    }
                    Role::BookManager => {
                        next.book_manager_id.get_or_insert_with(|| actor.id.clone());
                    }
                    _ => next.content_admin_id = Some(actor.id.clone()),
                }
                next.final_notes = Some(reason);
            }
        }

        next.status = rule.to;
        next.updated_at = now;
        Ok(next)
    }

    fn assignee(&self, user_id: Option<&str>, role: Role) -> Result<String, WorkflowError> {
        let user_id = user_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| WorkflowError::ValidationFailed(format!("a {role} id is required")))?;
        match self.directory.account(user_id) {
            Some(account) if account.role == role => Ok(account.id.clone()),
            _ => Err(WorkflowError::ValidationFailed(format!(
                "'{user_id}' is not a {role}"
            ))),
        }
    }

    /// Submission plus history, subject to per-role read access
    pub async fn get_submission(
        &self,
        actor_id: &str,
        submission_id: &str,
    ) -> Result<SubmissionDetail, WorkflowError> {
        let actor = self.actor(actor_id)?;
        let detail = self.snapshot(submission_id).await?;
        if !can_read(actor, &detail.submission) {
            return Err(WorkflowError::Unauthorized(format!(
                "{} has no access to submission '{submission_id}'",
                actor.role
            )));
        }
        Ok(detail)
    }

    /// Authoritative state of a submission, bypassing access control
    pub async fn snapshot(&self, submission_id: &str) -> Result<SubmissionDetail, WorkflowError> {
        let slot = self.slot(submission_id)?;
        let guard = slot.lock().await;
        let submission = guard
            .clone()
            .ok_or_else(|| WorkflowError::submission_not_found(submission_id))?;
        Ok(SubmissionDetail {
            workflow_history: self.ledger.history_for(submission_id),
            submission,
        })
    }

    pub async fn update_content(
        &self,
        actor_id: &str,
        submission_id: &str,
        update: ContentUpdate,
    ) -> Result<Submission, WorkflowError> {
        let actor = self.actor(actor_id)?;
        let slot = self.slot(submission_id)?;
        let mut guard = self.acquire(&slot, submission_id).await?;
        let current = guard
            .as_ref()
            .ok_or_else(|| WorkflowError::submission_not_found(submission_id))?;

        if current.author_id != actor.id || !current.status.is_editable() {
            return Err(WorkflowError::Unauthorized(
                "cannot edit submission in current state".to_string(),
            ));
        }
        if update.is_empty() {
            return Err(WorkflowError::ValidationFailed("nothing to update".to_string()));
        }

        let mut next = current.clone();
        if let Some(title) = update.title {
            next.title = required_text(Some(title.as_str()), "title")?;
        }
        if let Some(content) = update.content {
            next.word_count = count_words(&content);
            next.content = content;
        }
        if let Some(summary) = update.summary {
            next.summary = Some(summary);
        }
        next.updated_at = Utc::now();
        *guard = Some(next.clone());

        debug!(submission_id = %submission_id, word_count = next.word_count, "Updated submission content");
        Ok(next)
    }

    pub async fn delete_submission(&self, actor_id: &str, submission_id: &str) -> Result<(), WorkflowError> {
        let actor = self.actor(actor_id)?;
        let slot = self.slot(submission_id)?;
        let mut guard = self.acquire(&slot, submission_id).await?;
        let current = guard
            .as_ref()
            .ok_or_else(|| WorkflowError::submission_not_found(submission_id))?;

        let can_delete = (current.author_id == actor.id && current.status == SubmissionStatus::Draft)
            || matches!(actor.role, Role::Admin | Role::ContentAdmin);
        if !can_delete {
            return Err(WorkflowError::Unauthorized("cannot delete submission".to_string()));
        }

        *guard = None;
        self.slots().remove(submission_id);
        let purged = self.ledger.purge(submission_id);
        self.notifications.purge(submission_id);
        info!(submission_id = %submission_id, actor_id = %actor.id, purged_entries = purged, "Deleted submission");
        Ok(())
    }

    /// Inbox of `recipient_id`, or of the actor itself. Only ADMIN and
    /// CONTENT_ADMIN may read someone else's.
    pub fn notifications_for(
        &self,
        actor_id: &str,
        recipient_id: Option<&str>,
    ) -> Result<Vec<Notification>, WorkflowError> {
        let actor = self.actor(actor_id)?;
        let recipient_id = recipient_id.unwrap_or(actor.id.as_str());
        if recipient_id != actor.id && !matches!(actor.role, Role::Admin | Role::ContentAdmin) {
            return Err(WorkflowError::Unauthorized(format!(
                "{} cannot read notifications of '{recipient_id}'",
                actor.role
            )));
        }
        Ok(self.notifications.for_recipient(recipient_id))
    }

    /// Work visible to an actor given the current statuses
    pub async fn queue_for(&self, actor_id: &str) -> Result<Vec<Submission>, WorkflowError> {
        let actor = self.actor(actor_id)?;
        let slots: Vec<Slot> = self.slots().values().cloned().collect();

        let mut queue = Vec::new();
        for slot in slots {
            let guard = slot.lock().await;
            if let Some(submission) = guard.as_ref() {
                if in_queue(actor, submission) {
                    queue.push(submission.clone());
                }
            }
        }
        queue.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(queue)
    }
}

fn required_text(value: Option<&str>, field: &str) -> Result<String, WorkflowError> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or_else(|| WorkflowError::ValidationFailed(format!("{field} is required")))
}

fn check_actor(rule: &TransitionRule, actor: &Account, current: &Submission) -> Result<(), WorkflowError> {
    match rule.actor {
        ActorRule::AnyInRole => Ok(()),
        ActorRule::Author if current.author_id == actor.id => Ok(()),
        ActorRule::Author => Err(WorkflowError::Unauthorized(format!(
            "only the author may {}",
            rule.action
        ))),
        ActorRule::Assignee => {
            let assigned = match current.status {
                SubmissionStatus::StoryReview => current.story_manager_id.as_deref(),
                SubmissionStatus::FormatReview => current.book_manager_id.as_deref(),
                _ => None,
            };
            match assigned {
                Some(assignee) if assignee != actor.id => Err(WorkflowError::Unauthorized(format!(
                    "submission is assigned to '{assignee}'"
                ))),
                _ => Ok(()),
            }
        }
    }
}

fn can_read(actor: &Account, submission: &Submission) -> bool {
    use SubmissionStatus::*;

    if submission.author_id == actor.id {
        return true;
    }
    match actor.role {
        Role::Admin | Role::ContentAdmin => true,
        Role::StoryManager => {
            submission.story_manager_id.as_deref() == Some(actor.id.as_str())
                || matches!(submission.status, Pending | StoryReview)
        }
        Role::BookManager => {
            submission.book_manager_id.as_deref() == Some(actor.id.as_str())
                || matches!(submission.status, StoryApproved | FormatReview)
        }
        _ => false,
    }
}

fn in_queue(actor: &Account, submission: &Submission) -> bool {
    use SubmissionStatus::*;

    let assigned_to_actor = |assignee: &Option<String>| assignee.as_deref() == Some(actor.id.as_str());
    match actor.role {
        Role::Writer => submission.author_id == actor.id,
        Role::StoryManager => match submission.status {
            Pending => true,
            StoryReview => assigned_to_actor(&submission.story_manager_id),
            _ => false,
        },
        Role::BookManager => match submission.status {
            StoryApproved => true,
            FormatReview => assigned_to_actor(&submission.book_manager_id),
            _ => false,
        },
        Role::ContentAdmin => submission.status == ContentReview,
        Role::Admin => !submission.status.is_terminal(),
        Role::Teacher | Role::Learner | Role::Institution => false,
    }
}
