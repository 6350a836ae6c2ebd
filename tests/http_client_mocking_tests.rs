// HTTP client behaviour against a mocked platform
//
// wiremock gives deterministic answers so error decoding, retry and
// login-routing checks can be exercised without the reference server.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use submission_flow::client::WorkflowApi;
use submission_flow::{
    AccountConfig, ActionPayload, HttpPlatform, RetryPolicy, Role, Session, SessionBroker,
    SlotPhase, SubmissionStatus, WorkflowAction, WorkflowError,
};

/// Mock platform plus a client pointed at it
struct PlatformMock {
    server: MockServer,
    client: Arc<HttpPlatform>,
}

impl PlatformMock {
    async fn new() -> Self {
        Self::with_timeout(Duration::from_secs(2)).await
    }

    async fn with_timeout(timeout: Duration) -> Self {
        let server = MockServer::start().await;
        let client = HttpPlatform::new(&server.uri(), 1_000, timeout, RetryPolicy::immediate(3))
            .expect("client should build");
        Self {
            server,
            client: Arc::new(client),
        }
    }

    fn session(&self, role: Role) -> Session {
        Session::new(
            role,
            format!("user-{role}"),
            format!("{role}@test.local"),
            "mock-token".to_string(),
            role.dashboard_path().to_string(),
        )
    }

    async fn mock_error(&self, verb: &str, route: &str, status: u16, code: &str, error: &str) {
        Mock::given(method(verb))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": error,
                "code": code,
            })))
            .mount(&self.server)
            .await;
    }

    async fn mock_login(&self, role: Role, redirect: &str, times: Option<u64>) {
        let mock = Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": format!("token-{role}"),
                "user": { "id": format!("user-{role}"), "email": format!("{role}@test.local"), "role": role },
                "redirect": redirect,
            })));
        match times {
            Some(n) => mock.up_to_n_times(n).mount(&self.server).await,
            None => mock.mount(&self.server).await,
        }
    }
}

fn submission_json(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "title": "Mocked",
        "content": "<p>mocked content</p>",
        "authorId": "user-writer",
        "status": status,
        "wordCount": 2,
        "createdAt": "2026-01-05T10:00:00Z",
        "updatedAt": "2026-01-05T10:05:00Z",
    })
}

#[tokio::test]
async fn test_invalid_transition_is_decoded() {
    let mock = PlatformMock::new().await;
    mock.mock_error(
        "PUT",
        "/submissions/sub-1",
        409,
        "invalid_transition",
        "invalid transition: cannot final_approve from PENDING",
    )
    .await;

    let error = mock
        .client
        .perform_action(
            &mock.session(Role::ContentAdmin),
            "sub-1",
            WorkflowAction::FinalApprove,
            &ActionPayload::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        error,
        WorkflowError::InvalidTransition {
            from: SubmissionStatus::Pending,
            action: WorkflowAction::FinalApprove,
        }
    );
}

#[tokio::test]
async fn test_error_codes_map_to_kinds() {
    let mock = PlatformMock::new().await;
    mock.mock_error("GET", "/submissions/missing", 404, "not_found", "submission 'missing' not found")
        .await;
    mock.mock_error("GET", "/submissions/secret", 403, "unauthorized", "unauthorized: not your submission")
        .await;
    mock.mock_error("GET", "/queue", 401, "unauthenticated", "authentication required: unknown token")
        .await;

    let session = mock.session(Role::Learner);

    let error = mock.client.fetch_submission(&session, "missing").await.unwrap_err();
    assert_eq!(error, WorkflowError::submission_not_found("missing"));

    let error = mock.client.fetch_submission(&session, "secret").await.unwrap_err();
    assert_eq!(error, WorkflowError::Unauthorized("not your submission".into()));

    let error = mock.client.queue(&session).await.unwrap_err();
    assert_eq!(error, WorkflowError::Unauthenticated("unknown token".into()));
}

#[tokio::test]
async fn test_requests_carry_bearer_token_and_action_body() {
    let mock = PlatformMock::new().await;
    Mock::given(method("PUT"))
        .and(path("/submissions/sub-2"))
        .and(header("authorization", "Bearer mock-token"))
        .and(body_partial_json(json!({
            "action": "reject",
            "reason": "Off topic",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "submission": submission_json("sub-2", "REJECTED"),
        })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let submission = mock
        .client
        .perform_action(
            &mock.session(Role::StoryManager),
            "sub-2",
            WorkflowAction::Reject,
            &ActionPayload::with_reason("Off topic"),
        )
        .await
        .unwrap();
    assert_eq!(submission.status, SubmissionStatus::Rejected);
}

#[tokio::test]
async fn test_reads_retry_transient_failures() {
    let mock = PlatformMock::new().await;
    Mock::given(method("GET"))
        .and(path("/submissions/flaky"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/submissions/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "submission": submission_json("flaky", "PENDING"),
        })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let detail = mock
        .client
        .fetch_submission(&mock.session(Role::Admin), "flaky")
        .await
        .unwrap();
    assert_eq!(detail.status(), SubmissionStatus::Pending);
    assert!(detail.workflow_history.is_empty());
}

#[tokio::test]
async fn test_refused_transitions_are_not_retried() {
    let mock = PlatformMock::new().await;
    Mock::given(method("PUT"))
        .and(path("/submissions/sub-3"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": "invalid transition: cannot submit from REJECTED",
            "code": "invalid_transition",
        })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let result = mock
        .client
        .perform_action(
            &mock.session(Role::Writer),
            "sub-3",
            WorkflowAction::Submit,
            &ActionPayload::default(),
        )
        .await;
    assert!(matches!(result, Err(WorkflowError::InvalidTransition { .. })));
}

#[tokio::test]
async fn test_conflicting_mutation_is_retried() {
    let mock = PlatformMock::new().await;
    Mock::given(method("PUT"))
        .and(path("/submissions/busy"))
        .respond_with(ResponseTemplate::new(423).set_body_json(json!({
            "error": "submission 'busy' already has a transition in flight",
            "code": "conflict",
        })))
        .up_to_n_times(1)
        .mount(&mock.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/submissions/busy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "submission": submission_json("busy", "STORY_APPROVED"),
        })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let submission = mock
        .client
        .perform_action(
            &mock.session(Role::StoryManager),
            "busy",
            WorkflowAction::StoryApprove,
            &ActionPayload::default(),
        )
        .await
        .unwrap();
    assert_eq!(submission.status, SubmissionStatus::StoryApproved);
}

#[tokio::test]
async fn test_slow_platform_times_out() {
    let mock = PlatformMock::with_timeout(Duration::from_millis(100)).await;
    Mock::given(method("DELETE"))
        .and(path("/submissions/slow"))
        .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_millis(500)))
        .mount(&mock.server)
        .await;

    let error = mock
        .client
        .delete_submission(&mock.session(Role::Admin), "slow")
        .await
        .unwrap_err();
    assert!(matches!(error, WorkflowError::Timeout { .. }), "{error:?}");
}

#[tokio::test]
async fn test_broker_retries_misrouted_login() {
    let mock = PlatformMock::new().await;
    mock.mock_login(Role::StoryManager, "/login", Some(1)).await;
    mock.mock_login(Role::StoryManager, "/dashboard/story-manager", None).await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock.server)
        .await;

    let accounts = [AccountConfig::new(Role::StoryManager, "story-manager@test.local", "test123")];
    let broker = SessionBroker::new(
        mock.client.clone(),
        &accounts,
        RetryPolicy::immediate(3),
        Duration::from_secs(2),
    );

    let session = broker.get_session(Role::StoryManager).await.unwrap();
    assert_eq!(session.landing, "/dashboard/story-manager");
    assert_eq!(session.token, "token-STORY_MANAGER");
    assert_eq!(broker.phase(Role::StoryManager).await, Some(SlotPhase::Ready));
}

#[tokio::test]
async fn test_broker_does_not_retry_bad_credentials() {
    let mock = PlatformMock::new().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "authentication required: invalid credentials",
            "code": "unauthenticated",
        })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let accounts = [AccountConfig::new(Role::Writer, "writer@test.local", "wrong")];
    let broker = SessionBroker::new(
        mock.client.clone(),
        &accounts,
        RetryPolicy::immediate(3),
        Duration::from_secs(2),
    );

    let error = broker.get_session(Role::Writer).await.unwrap_err();
    match error {
        WorkflowError::AuthFailure { role, attempts, reason } => {
            assert_eq!(role, Role::Writer);
            assert_eq!(attempts, 1);
            assert!(reason.contains("invalid credentials"), "{reason}");
        }
        other => panic!("expected AuthFailure, got {other:?}"),
    }
    assert_eq!(broker.phase(Role::Writer).await, Some(SlotPhase::Failed));
}
