// HTTP client for the platform API with throttling, deadlines and retry

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::WorkflowApi;
use crate::config::{AccountConfig, HarnessConfig};
use crate::platform::server::{ErrorBody, LoginResponse};
use crate::retry::{with_timeout, RetryPolicy};
use crate::session::{Authenticator, Session};
use crate::workflows::{
    ActionPayload, ActionRequest, ContentUpdate, NewSubmission, Notification, Role, Submission,
    SubmissionDetail, SubmissionStatus, WorkflowAction, WorkflowError,
};

#[derive(Debug, Deserialize)]
struct SubmissionEnvelope<T> {
    submission: T,
}

#[derive(Debug, Deserialize)]
struct QueueEnvelope {
    submissions: Vec<Submission>,
}

#[derive(Debug, Deserialize)]
struct NotificationEnvelope {
    notifications: Vec<Notification>,
}

/// Rate-limited client for a running platform
#[derive(Debug, Clone)]
pub struct HttpPlatform {
    base_url: String,
    client: reqwest::Client,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl HttpPlatform {
    pub fn new(
        base_url: &str,
        requests_per_second: u32,
        request_timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, WorkflowError> {
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(per_second).allow_burst(per_second);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Self::build_client(request_timeout)?,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            request_timeout,
            retry,
        })
    }

    pub fn from_config(config: &HarnessConfig) -> Result<Self, WorkflowError> {
        Self::new(
            &config.platform.base_url,
            config.platform.requests_per_second,
            config.request_timeout(),
            RetryPolicy::from(&config.retry),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_client(timeout: Duration) -> Result<reqwest::Client, WorkflowError> {
        reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WorkflowError::Transport(e.to_string()))
    }

    async fn send(
        &self,
        operation: &str,
        session: Option<&Session>,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, WorkflowError> {
        let client = session
            .and_then(Session::http_client)
            .unwrap_or(&self.client);
        let token = session.map(|session| session.token.as_str());
        self.dispatch(operation, client, token, method, path, body).await
    }

    /// One throttled, deadline-bounded request. Non-2xx answers come back as
    /// the `WorkflowError` the platform reported.
    async fn dispatch(
        &self,
        operation: &str,
        client: &reqwest::Client,
        token: Option<&str>,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, WorkflowError> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(10)))
            .await;

        let mut request = client.request(method.clone(), format!("{}{path}", self.base_url));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(operation = %operation, method = %method, path = %path, "Sending platform request");
        let response = with_timeout(operation, self.request_timeout, async {
            request.send().await.map_err(|e| transport_error(operation, self.request_timeout, e))
        })
        .await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(decode_error(response, path).await)
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        session: Option<&Session>,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, WorkflowError> {
        self.send(operation, session, method, path, body)
            .await?
            .json::<T>()
            .await
            .map_err(|e| WorkflowError::Transport(format!("{operation}: malformed response: {e}")))
    }

    /// Reads are retried on transient failures
    async fn read_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        session: &Session,
        path: &str,
    ) -> Result<T, WorkflowError> {
        self.retry
            .run(operation, || self.send_json(operation, Some(session), Method::GET, path, None))
            .await
    }

    /// Mutations are retried only when the platform refused them outright
    async fn write_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        session: &Session,
        method: Method,
        path: &str,
        body: &Value,
    ) -> Result<T, WorkflowError> {
        self.retry
            .run_if(
                operation,
                || self.send_json(operation, Some(session), method.clone(), path, Some(body)),
                |error| matches!(error, WorkflowError::Conflict(_)),
            )
            .await
    }
}

fn transport_error(operation: &str, limit: Duration, error: reqwest::Error) -> WorkflowError {
    if error.is_timeout() {
        WorkflowError::Timeout {
            operation: operation.to_string(),
            duration_ms: limit.as_millis() as u64,
        }
    } else {
        WorkflowError::Transport(error.to_string())
    }
}

/// Map an error body back onto the taxonomy it was rendered from
async fn decode_error(response: reqwest::Response, path: &str) -> WorkflowError {
    let status = response.status();
    let body = match response.json::<ErrorBody>().await {
        Ok(body) => body,
        Err(_) => return WorkflowError::Transport(format!("unexpected {status} from {path}")),
    };
    error_from_body(status, &body, path)
}

pub(crate) fn error_from_body(status: StatusCode, body: &ErrorBody, path: &str) -> WorkflowError {
    let detail = body
        .error
        .split_once(": ")
        .map_or(body.error.as_str(), |(_, detail)| detail)
        .to_string();
    let resource_id = path.rsplit('/').next().unwrap_or_default();

    match body.code.as_str() {
        "unauthenticated" => WorkflowError::Unauthenticated(detail),
        "unauthorized" => WorkflowError::Unauthorized(detail),
        "validation_failed" => WorkflowError::ValidationFailed(detail),
        "not_found" => WorkflowError::submission_not_found(resource_id),
        "conflict" => WorkflowError::Conflict(resource_id.to_string()),
        "auth_failure" => parse_auth_failure(&body.error)
            .unwrap_or_else(|| WorkflowError::Unauthenticated(detail)),
        "invalid_transition" => parse_invalid_transition(&body.error).unwrap_or_else(|| {
            WorkflowError::Transport(format!("{status}: {}", body.error))
        }),
        _ => WorkflowError::Transport(format!("{status}: {}", body.error)),
    }
}

fn parse_invalid_transition(message: &str) -> Option<WorkflowError> {
    let rest = message.strip_prefix("invalid transition: cannot ")?;
    let (action, from) = rest.split_once(" from ")?;
    Some(WorkflowError::InvalidTransition {
        from: from.trim().parse::<SubmissionStatus>().ok()?,
        action: action.trim().parse::<WorkflowAction>().ok()?,
    })
}

fn parse_auth_failure(message: &str) -> Option<WorkflowError> {
    let rest = message.strip_prefix("authentication failed for ")?;
    let (role, rest) = rest.split_once(" after ")?;
    let (attempts, reason) = rest.split_once(" attempt(s): ")?;
    Some(WorkflowError::AuthFailure {
        role: role.trim().parse::<Role>().ok()?,
        attempts: attempts.trim().parse().ok()?,
        reason: reason.to_string(),
    })
}

#[async_trait]
impl Authenticator for HttpPlatform {
    async fn authenticate(&self, account: &AccountConfig) -> Result<Session, WorkflowError> {
        let client = Self::build_client(self.request_timeout)?;
        let body = json!({ "email": account.email, "password": account.password });

        let grant: LoginResponse = self
            .dispatch("login", &client, None, Method::POST, "/auth/login", Some(&body))
            .await?
            .json()
            .await
            .map_err(|e| WorkflowError::Transport(format!("login: malformed response: {e}")))?;

        info!(role = %account.role, user_id = %grant.user.id, redirect = %grant.redirect, "Logged in");
        Ok(Session::new(
            grant.user.role,
            grant.user.id,
            grant.user.email,
            grant.token,
            grant.redirect,
        )
        .with_http_client(client))
    }

    async fn release(&self, session: &Session) -> Result<(), WorkflowError> {
        self.send("logout", Some(session), Method::POST, "/auth/logout", None)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl WorkflowApi for HttpPlatform {
    async fn create_submission(
        &self,
        session: &Session,
        draft: &NewSubmission,
    ) -> Result<Submission, WorkflowError> {
        let body = serde_json::to_value(draft).map_err(|e| WorkflowError::ValidationFailed(e.to_string()))?;
        let envelope: SubmissionEnvelope<Submission> = self
            .write_json("create_submission", session, Method::POST, "/submissions", &body)
            .await?;
        Ok(envelope.submission)
    }

    async fn perform_action(
        &self,
        session: &Session,
        submission_id: &str,
        action: WorkflowAction,
        payload: &ActionPayload,
    ) -> Result<Submission, WorkflowError> {
        let request = ActionRequest {
            action,
            payload: payload.clone(),
        };
        let body = serde_json::to_value(&request).map_err(|e| WorkflowError::ValidationFailed(e.to_string()))?;
        let path = format!("/submissions/{submission_id}");
        let envelope: SubmissionEnvelope<Submission> = self
            .write_json(action.as_str(), session, Method::PUT, &path, &body)
            .await?;
        Ok(envelope.submission)
    }

    async fn fetch_submission(
        &self,
        session: &Session,
        submission_id: &str,
    ) -> Result<SubmissionDetail, WorkflowError> {
        let path = format!("/submissions/{submission_id}");
        let envelope: SubmissionEnvelope<SubmissionDetail> =
            self.read_json("fetch_submission", session, &path).await?;
        Ok(envelope.submission)
    }

    async fn update_content(
        &self,
        session: &Session,
        submission_id: &str,
        update: &ContentUpdate,
    ) -> Result<Submission, WorkflowError> {
        let body = serde_json::to_value(update).map_err(|e| WorkflowError::ValidationFailed(e.to_string()))?;
        let path = format!("/submissions/{submission_id}");
        let envelope: SubmissionEnvelope<Submission> = self
            .write_json("update_content", session, Method::PUT, &path, &body)
            .await?;
        Ok(envelope.submission)
    }

    async fn delete_submission(&self, session: &Session, submission_id: &str) -> Result<(), WorkflowError> {
        let path = format!("/submissions/{submission_id}");
        self.send("delete_submission", Some(session), Method::DELETE, &path, None)
            .await
            .map(|_| ())
    }

    async fn queue(&self, session: &Session) -> Result<Vec<Submission>, WorkflowError> {
        let envelope: QueueEnvelope = self.read_json("queue", session, "/queue").await?;
        Ok(envelope.submissions)
    }

    async fn notifications(
        &self,
        session: &Session,
        recipient_id: Option<&str>,
    ) -> Result<Vec<Notification>, WorkflowError> {
        let path = match recipient_id {
            Some(user_id) => format!("/notifications?userId={user_id}"),
            None => "/notifications".to_string(),
        };
        let envelope: NotificationEnvelope = self.read_json("notifications", session, &path).await?;
        Ok(envelope.notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(code: &str, error: &str) -> ErrorBody {
        ErrorBody {
            error: error.to_string(),
            code: code.to_string(),
        }
    }

    #[test]
    fn test_invalid_transition_body_round_trips() {
        let original = WorkflowError::InvalidTransition {
            from: SubmissionStatus::Pending,
            action: WorkflowAction::FinalApprove,
        };
        let decoded = error_from_body(
            StatusCode::CONFLICT,
            &body(original.code(), &original.to_string()),
            "/submissions/abc",
        );
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_prefix_is_stripped_from_detail() {
        let decoded = error_from_body(
            StatusCode::UNPROCESSABLE_ENTITY,
            &body("validation_failed", "validation failed: reason is required"),
            "/submissions/abc",
        );
        assert_eq!(decoded, WorkflowError::ValidationFailed("reason is required".into()));

        let decoded = error_from_body(
            StatusCode::NOT_FOUND,
            &body("not_found", "submission 'abc' not found"),
            "/submissions/abc",
        );
        assert_eq!(decoded, WorkflowError::submission_not_found("abc"));
    }

    #[test]
    fn test_auth_failure_body_round_trips() {
        let original = WorkflowError::AuthFailure {
            role: Role::BookManager,
            attempts: 3,
            reason: "landed on '/login', expected '/dashboard/book-manager'".into(),
        };
        let decoded = error_from_body(
            StatusCode::UNAUTHORIZED,
            &body(original.code(), &original.to_string()),
            "/auth/login",
        );
        assert_eq!(decoded, original);

        let decoded = error_from_body(
            StatusCode::UNAUTHORIZED,
            &body("auth_failure", "authentication failed: locked"),
            "/auth/login",
        );
        assert!(matches!(decoded, WorkflowError::Unauthenticated(_)));
    }

    #[test]
    fn test_unknown_code_is_transport() {
        let decoded = error_from_body(StatusCode::INTERNAL_SERVER_ERROR, &body("boom", "kaput"), "/queue");
        assert!(matches!(decoded, WorkflowError::Transport(_)));
    }
}
