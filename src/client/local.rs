// In-process platform access: same contract as HTTP, no sockets

use async_trait::async_trait;
use std::sync::Arc;

use super::WorkflowApi;
use crate::config::AccountConfig;
use crate::platform::WorkflowService;
use crate::session::{Authenticator, Session};
use crate::workflows::{
    ActionPayload, ContentUpdate, NewSubmission, Notification, Submission, SubmissionDetail,
    WorkflowAction, WorkflowError,
};

#[derive(Debug, Clone)]
pub struct LocalPlatform {
    service: Arc<WorkflowService>,
}

impl LocalPlatform {
    pub fn new(service: Arc<WorkflowService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<WorkflowService> {
        &self.service
    }

    /// Tokens are checked exactly as the HTTP surface checks them
    fn actor_id(&self, session: &Session) -> Result<String, WorkflowError> {
        Ok(self.service.directory().resolve(&session.token)?.id.clone())
    }
}

#[async_trait]
impl Authenticator for LocalPlatform {
    async fn authenticate(&self, account: &AccountConfig) -> Result<Session, WorkflowError> {
        let grant = self
            .service
            .directory()
            .login(&account.email, &account.password)?;
        Ok(Session::new(
            grant.account.role,
            grant.account.id,
            grant.account.email,
            grant.token,
            grant.redirect,
        ))
    }

    async fn release(&self, session: &Session) -> Result<(), WorkflowError> {
        if self.service.directory().logout(&session.token) {
            Ok(())
        } else {
            Err(WorkflowError::Unauthenticated("unknown or expired session".to_string()))
        }
    }
}

#[async_trait]
impl WorkflowApi for LocalPlatform {
    async fn create_submission(
        &self,
        session: &Session,
        draft: &NewSubmission,
    ) -> Result<Submission, WorkflowError> {
        let actor_id = self.actor_id(session)?;
        self.service
            .dispatcher()
            .create_submission(&actor_id, draft.clone())
            .await
    }

    async fn perform_action(
        &self,
        session: &Session,
        submission_id: &str,
        action: WorkflowAction,
        payload: &ActionPayload,
    ) -> Result<Submission, WorkflowError> {
        let actor_id = self.actor_id(session)?;
        self.service
            .dispatcher()
            .perform_action(submission_id, action, &actor_id, payload.clone())
            .await
    }

    async fn fetch_submission(
        &self,
        session: &Session,
        submission_id: &str,
    ) -> Result<SubmissionDetail, WorkflowError> {
        let actor_id = self.actor_id(session)?;
        self.service
            .dispatcher()
            .get_submission(&actor_id, submission_id)
            .await
    }

    async fn update_content(
        &self,
        session: &Session,
        submission_id: &str,
        update: &ContentUpdate,
    ) -> Result<Submission, WorkflowError> {
        let actor_id = self.actor_id(session)?;
        self.service
            .dispatcher()
            .update_content(&actor_id, submission_id, update.clone())
            .await
    }

    async fn delete_submission(&self, session: &Session, submission_id: &str) -> Result<(), WorkflowError> {
        let actor_id = self.actor_id(session)?;
        self.service
            .dispatcher()
            .delete_submission(&actor_id, submission_id)
            .await
    }

    async fn queue(&self, session: &Session) -> Result<Vec<Submission>, WorkflowError> {
        let actor_id = self.actor_id(session)?;
        self.service.dispatcher().queue_for(&actor_id).await
    }

    async fn notifications(
        &self,
        session: &Session,
        recipient_id: Option<&str>,
    ) -> Result<Vec<Notification>, WorkflowError> {
        let actor_id = self.actor_id(session)?;
        self.service.dispatcher().notifications_for(&actor_id, recipient_id)
    }
}
