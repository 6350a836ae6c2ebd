// End-to-end editorial scenarios driven through role-scoped sessions

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, info_span, Instrument};

use crate::client::{
    AdminClient, BookManagerClient, ContentAdminClient, StoryManagerClient, WorkflowApi,
    WriterClient,
};
use crate::session::{Session, SessionBroker};
use crate::verify::Verifier;
use crate::workflows::{
    ContentUpdate, FormatDecision, NewSubmission, Role, SubmissionStatus, WorkflowError,
};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("expectation failed: {0}")]
    Expectation(String),
}

/// Summary printed by the CLI after a scenario run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
    pub scenario: String,
    pub submission_id: String,
    pub final_status: SubmissionStatus,
    pub history_len: usize,
    pub sessions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Scenario {
    HappyPath,
    Rejection,
    RevisionCycle,
}

pub struct ScenarioRunner {
    api: Arc<dyn WorkflowApi>,
    broker: Arc<SessionBroker>,
    poll_interval: Duration,
    step_timeout: Duration,
}

const ROLES: [Role; 5] = [
    Role::Writer,
    Role::StoryManager,
    Role::BookManager,
    Role::ContentAdmin,
    Role::Admin,
];

struct Cast {
    writer: WriterClient,
    story_manager: StoryManagerClient,
    book_manager: BookManagerClient,
    content_admin: ContentAdminClient,
    admin: AdminClient,
    verifier: Verifier,
}

fn expect(condition: bool, message: impl Into<String>) -> Result<(), ScenarioError> {
    if condition {
        Ok(())
    } else {
        Err(ScenarioError::Expectation(message.into()))
    }
}

fn sample_story(title: &str) -> NewSubmission {
    NewSubmission {
        title: title.to_string(),
        content: "<p>Once upon a time, in a small village, there lived a brave young hero.</p>".to_string(),
        summary: Some("A short adventure story".to_string()),
    }
}

impl ScenarioRunner {
    pub fn new(
        api: Arc<dyn WorkflowApi>,
        broker: Arc<SessionBroker>,
        poll_interval: Duration,
        step_timeout: Duration,
    ) -> Self {
        Self {
            api,
            broker,
            poll_interval,
            step_timeout,
        }
    }

    pub async fn run(&self, scenario: Scenario) -> Result<ScenarioReport, ScenarioError> {
        match scenario {
            Scenario::HappyPath => self.happy_path().await,
            Scenario::Rejection => self.rejection().await,
            Scenario::RevisionCycle => self.revision_cycle(2).await,
        }
    }

    fn cast(&self, sessions: Vec<Session>) -> Result<Cast, WorkflowError> {
        let mut sessions = sessions.into_iter();
        let mut next = || {
            sessions
                .next()
                .ok_or_else(|| WorkflowError::Unauthenticated("missing session".to_string()))
        };
        let writer = WriterClient::new(self.api.clone(), next()?)?;
        let story_manager = StoryManagerClient::new(self.api.clone(), next()?)?;
        let book_manager = BookManagerClient::new(self.api.clone(), next()?)?;
        let content_admin = ContentAdminClient::new(self.api.clone(), next()?)?;
        let admin_session = next()?;
        let verifier = Verifier::new(self.api.clone(), admin_session.clone(), self.poll_interval);
        let admin = AdminClient::new(self.api.clone(), admin_session)?;

        Ok(Cast {
            writer,
            story_manager,
            book_manager,
            content_admin,
            admin,
            verifier,
        })
    }

    async fn report(cast: &Cast, scenario: &str, submission_id: &str) -> Result<ScenarioReport, ScenarioError> {
        let detail = cast.verifier.fetch(submission_id).await?;
        expect(
            cast.verifier.verify_history_path(submission_id).await?,
            "history does not form a valid path",
        )?;
        Ok(ScenarioReport {
            scenario: scenario.to_string(),
            submission_id: submission_id.to_string(),
            final_status: detail.status(),
            history_len: detail.workflow_history.len(),
            sessions: ROLES.len(),
        })
    }

    /// DRAFT -> PENDING -> STORY_APPROVED -> CONTENT_REVIEW -> PUBLISHED
    pub async fn happy_path(&self) -> Result<ScenarioReport, ScenarioError> {
        let span = info_span!("scenario", name = "happy_path");
        self.broker
            .with_sessions(&ROLES, |sessions| async move {
                let cast = self.cast(sessions)?;
                let id = cast.writer.create(&sample_story("The Brave Hero")).await?.id;

                cast.writer.submit(&id).await?;
                expect(
                    cast.verifier.verify_in_queue(&id, cast.story_manager.session()).await?,
                    "submission missing from story manager queue",
                )?;

                cast.story_manager.approve(&id, Some("Excellent story!")).await?;
                cast.book_manager
                    .decide_format(&id, FormatDecision::Text, Some("Works best as a single text"))
                    .await?;
                let published = cast.content_admin.final_approve(&id, Some("Ready to publish")).await?;

                expect(published.published_at.is_some(), "publishedAt not set")?;
                cast.verifier
                    .wait_for_status(&id, SubmissionStatus::Published, self.step_timeout)
                    .await?;
                expect(
                    cast.verifier
                        .verify_notification_sent(&cast.writer.session().user_id, &id, Some(SubmissionStatus::Published))
                        .await?,
                    "author was not notified of publication",
                )?;
                let report = Self::report(&cast, "happy-path", &id).await?;
                expect(report.history_len >= 4, "expected at least four history entries")?;
                info!(submission_id = %id, history_len = report.history_len, "Happy path complete");
                Ok::<_, ScenarioError>(report)
            })
            .instrument(span)
            .await
    }

    /// Rejection is terminal: the author cannot resubmit
    pub async fn rejection(&self) -> Result<ScenarioReport, ScenarioError> {
        let span = info_span!("scenario", name = "rejection");
        self.broker
            .with_sessions(&ROLES, |sessions| async move {
                let cast = self.cast(sessions)?;
                let id = cast.writer.create(&sample_story("Rejected Tale")).await?.id;

                cast.writer.submit(&id).await?;
                cast.story_manager
                    .reject(&id, "Does not meet quality standards")
                    .await?;
                expect(
                    cast.verifier.verify_status(&id, SubmissionStatus::Rejected).await?,
                    "submission is not REJECTED",
                )?;

                match cast.writer.submit(&id).await {
                    Err(WorkflowError::InvalidTransition { from: SubmissionStatus::Rejected, .. }) => {}
                    other => {
                        return Err(ScenarioError::Expectation(format!(
                            "resubmitting a rejected submission should fail, got {other:?}"
                        )))
                    }
                }

                let report = Self::report(&cast, "rejection", &id).await?;
                expect(report.history_len == 2, "rejection should leave exactly two entries")?;
                Ok::<_, ScenarioError>(report)
            })
            .instrument(span)
            .await
    }

    /// `cycles` rounds of revision requests before the story is approved
    pub async fn revision_cycle(&self, cycles: usize) -> Result<ScenarioReport, ScenarioError> {
        let span = info_span!("scenario", name = "revision_cycle", cycles = cycles);
        self.broker
            .with_sessions(&ROLES, |sessions| async move {
                let cast = self.cast(sessions)?;
                let id = cast.writer.create(&sample_story("Needs Work")).await?.id;
                cast.writer.submit(&id).await?;

                for round in 1..=cycles {
                    cast.story_manager
                        .request_revision(&id, &format!("Round {round}: tighten the ending"))
                        .await?;
                    expect(
                        cast.verifier.verify_status(&id, SubmissionStatus::NeedsRevision).await?,
                        format!("round {round}: expected NEEDS_REVISION"),
                    )?;

                    let update = ContentUpdate {
                        content: Some(format!("<p>Revised draft number {round}.</p>")),
                        ..Default::default()
                    };
                    cast.writer.revise(&id, &update).await?;
                    cast.writer.submit(&id).await?;
                }

                cast.story_manager.approve(&id, Some("Much better")).await?;

                let revisions = cast
                    .verifier
                    .count_transitions_to(&id, SubmissionStatus::NeedsRevision)
                    .await?;
                expect(
                    revisions == cycles,
                    format!("expected {cycles} NEEDS_REVISION entries, found {revisions}"),
                )?;
                expect(
                    cast.verifier.verify_status(&id, SubmissionStatus::StoryApproved).await?,
                    "expected STORY_APPROVED after revisions",
                )?;
                // Admin can still see it in the pipeline
                expect(
                    cast.verifier.verify_in_queue(&id, cast.admin.session()).await?,
                    "approved submission missing from admin queue",
                )?;
                Self::report(&cast, "revision-cycle", &id).await
            })
            .instrument(span)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LocalPlatform;
    use crate::config::HarnessConfig;
    use crate::platform::WorkflowService;
    use crate::retry::RetryPolicy;

    fn runner() -> ScenarioRunner {
        let config = HarnessConfig::default();
        let platform = Arc::new(LocalPlatform::new(Arc::new(WorkflowService::from_config(&config))));
        let broker = SessionBroker::new(
            platform.clone(),
            &config.accounts,
            RetryPolicy::immediate(3),
            Duration::from_secs(5),
        );
        ScenarioRunner::new(platform, Arc::new(broker), Duration::from_millis(5), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_all_scenarios_pass_in_process() {
        let runner = runner();

        let report = runner.run(Scenario::HappyPath).await.unwrap();
        assert_eq!(report.final_status, SubmissionStatus::Published);
        assert_eq!(report.history_len, 4);

        let report = runner.run(Scenario::Rejection).await.unwrap();
        assert_eq!(report.final_status, SubmissionStatus::Rejected);

        let report = runner.revision_cycle(3).await.unwrap();
        assert_eq!(report.final_status, SubmissionStatus::StoryApproved);
        assert_eq!(report.history_len, 1 + 3 * 2 + 1);
    }
}
