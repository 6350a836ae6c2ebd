// Clients the harness drives the platform through

pub mod http;
pub mod local;

use async_trait::async_trait;
use std::sync::Arc;

use crate::session::Session;
use crate::workflows::{
    ActionPayload, ContentUpdate, FormatDecision, NewSubmission, Notification, Role, Submission,
    SubmissionDetail, WorkflowAction, WorkflowError,
};

pub use http::HttpPlatform;
pub use local::LocalPlatform;

/// Submission operations as seen by an authenticated session
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    async fn create_submission(
        &self,
        session: &Session,
        draft: &NewSubmission,
    ) -> Result<Submission, WorkflowError>;

    async fn perform_action(
        &self,
        session: &Session,
        submission_id: &str,
        action: WorkflowAction,
        payload: &ActionPayload,
    ) -> Result<Submission, WorkflowError>;

    /// Authoritative record plus ordered history
    async fn fetch_submission(
        &self,
        session: &Session,
        submission_id: &str,
    ) -> Result<SubmissionDetail, WorkflowError>;

    async fn update_content(
        &self,
        session: &Session,
        submission_id: &str,
        update: &ContentUpdate,
    ) -> Result<Submission, WorkflowError>;

    async fn delete_submission(&self, session: &Session, submission_id: &str) -> Result<(), WorkflowError>;

    async fn queue(&self, session: &Session) -> Result<Vec<Submission>, WorkflowError>;

    /// Inbox of `recipient_id`, or of the session's own account
    async fn notifications(
        &self,
        session: &Session,
        recipient_id: Option<&str>,
    ) -> Result<Vec<Notification>, WorkflowError>;
}

/// Session bound to an API, shared by the role-tagged clients below
#[derive(Clone)]
struct Actor {
    api: Arc<dyn WorkflowApi>,
    session: Session,
}

impl Actor {
    fn bind(api: Arc<dyn WorkflowApi>, session: Session, roles: &[Role]) -> Result<Self, WorkflowError> {
        if !roles.contains(&session.role) {
            return Err(WorkflowError::Unauthorized(format!(
                "a {} session cannot act as {roles:?}",
                session.role
            )));
        }
        Ok(Self { api, session })
    }

    async fn act(
        &self,
        submission_id: &str,
        action: WorkflowAction,
        payload: ActionPayload,
    ) -> Result<Submission, WorkflowError> {
        self.api
            .perform_action(&self.session, submission_id, action, &payload)
            .await
    }

    async fn fetch(&self, submission_id: &str) -> Result<SubmissionDetail, WorkflowError> {
        self.api.fetch_submission(&self.session, submission_id).await
    }

    async fn queue(&self) -> Result<Vec<Submission>, WorkflowError> {
        self.api.queue(&self.session).await
    }
}

macro_rules! role_client {
    ($(#[$meta:meta])* $name:ident, [$($role:expr),+]) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            actor: Actor,
        }

        impl $name {
            pub fn new(api: Arc<dyn WorkflowApi>, session: Session) -> Result<Self, WorkflowError> {
                Ok(Self { actor: Actor::bind(api, session, &[$($role),+])? })
            }

            pub fn session(&self) -> &Session {
                &self.actor.session
            }

            pub async fn fetch(&self, submission_id: &str) -> Result<SubmissionDetail, WorkflowError> {
                self.actor.fetch(submission_id).await
            }

            pub async fn queue(&self) -> Result<Vec<Submission>, WorkflowError> {
                self.actor.queue().await
            }

            pub async fn notifications(&self) -> Result<Vec<Notification>, WorkflowError> {
                self.actor.api.notifications(&self.actor.session, None).await
            }
        }
    };
}

role_client!(
    /// Author actions: drafting, submitting, revising
    WriterClient,
    [Role::Writer]
);
role_client!(StoryManagerClient, [Role::StoryManager]);
role_client!(BookManagerClient, [Role::BookManager]);
role_client!(ContentAdminClient, [Role::ContentAdmin]);
role_client!(
    /// Assignment and housekeeping
    AdminClient,
    [Role::Admin]
);

impl WriterClient {
    pub async fn create(&self, draft: &NewSubmission) -> Result<Submission, WorkflowError> {
        self.actor.api.create_submission(&self.actor.session, draft).await
    }

    pub async fn submit(&self, submission_id: &str) -> Result<Submission, WorkflowError> {
        self.actor
            .act(submission_id, WorkflowAction::Submit, ActionPayload::default())
            .await
    }

    pub async fn revise(&self, submission_id: &str, update: &ContentUpdate) -> Result<Submission, WorkflowError> {
        self.actor
            .api
            .update_content(&self.actor.session, submission_id, update)
            .await
    }

    pub async fn delete(&self, submission_id: &str) -> Result<(), WorkflowError> {
        self.actor
            .api
            .delete_submission(&self.actor.session, submission_id)
            .await
    }
}

impl StoryManagerClient {
    pub async fn approve(&self, submission_id: &str, feedback: Option<&str>) -> Result<Submission, WorkflowError> {
        let payload = ActionPayload {
            feedback: feedback.map(str::to_string),
            ..Default::default()
        };
        self.actor
            .act(submission_id, WorkflowAction::StoryApprove, payload)
            .await
    }

    pub async fn request_revision(&self, submission_id: &str, feedback: &str) -> Result<Submission, WorkflowError> {
        self.actor
            .act(
                submission_id,
                WorkflowAction::StoryNeedsRevision,
                ActionPayload::with_feedback(feedback),
            )
            .await
    }

    pub async fn reject(&self, submission_id: &str, reason: &str) -> Result<Submission, WorkflowError> {
        self.actor
            .act(submission_id, WorkflowAction::Reject, ActionPayload::with_reason(reason))
            .await
    }
}

impl BookManagerClient {
    pub async fn decide_format(
        &self,
        submission_id: &str,
        decision: FormatDecision,
        notes: Option<&str>,
    ) -> Result<Submission, WorkflowError> {
        self.actor
            .act(
                submission_id,
                WorkflowAction::FormatDecision,
                ActionPayload::with_decision(decision, notes.map(str::to_string)),
            )
            .await
    }

    pub async fn reject(&self, submission_id: &str, reason: &str) -> Result<Submission, WorkflowError> {
        self.actor
            .act(submission_id, WorkflowAction::Reject, ActionPayload::with_reason(reason))
            .await
    }
}

impl ContentAdminClient {
    pub async fn final_approve(&self, submission_id: &str, notes: Option<&str>) -> Result<Submission, WorkflowError> {
        let payload = ActionPayload {
            notes: notes.map(str::to_string),
            ..Default::default()
        };
        self.actor
            .act(submission_id, WorkflowAction::FinalApprove, payload)
            .await
    }

    pub async fn reject(&self, submission_id: &str, reason: &str) -> Result<Submission, WorkflowError> {
        self.actor
            .act(submission_id, WorkflowAction::Reject, ActionPayload::with_reason(reason))
            .await
    }
}

impl AdminClient {
    pub async fn assign_story_manager(
        &self,
        submission_id: &str,
        story_manager_id: &str,
    ) -> Result<Submission, WorkflowError> {
        let payload = ActionPayload {
            story_manager_id: Some(story_manager_id.to_string()),
            ..Default::default()
        };
        self.actor
            .act(submission_id, WorkflowAction::AssignStoryManager, payload)
            .await
    }

    pub async fn assign_book_manager(
        &self,
        submission_id: &str,
        book_manager_id: &str,
    ) -> Result<Submission, WorkflowError> {
        let payload = ActionPayload {
            book_manager_id: Some(book_manager_id.to_string()),
            ..Default::default()
        };
        self.actor
            .act(submission_id, WorkflowAction::AssignBookManager, payload)
            .await
    }

    pub async fn delete(&self, submission_id: &str) -> Result<(), WorkflowError> {
        self.actor
            .api
            .delete_submission(&self.actor.session, submission_id)
            .await
    }
}
