// HTTP surface of the reference platform

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Instrument};

use super::{Account, WorkflowService};
use crate::telemetry::{create_workflow_span, generate_correlation_id};
use crate::workflows::{ActionRequest, ContentUpdate, NewSubmission, WorkflowError};

/// Error body `{ "error": ..., "code": ... }` with one status per kind
#[derive(Debug)]
pub struct ApiError(pub WorkflowError);

impl From<WorkflowError> for ApiError {
    fn from(error: WorkflowError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: self.0.to_string(),
            code: self.0.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: Account,
    pub redirect: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

type ApiResult<T> = Result<T, ApiError>;

pub fn router(service: Arc<WorkflowService>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/submissions", post(create_submission_handler))
        .route(
            "/submissions/:id",
            get(get_submission_handler)
                .put(update_submission_handler)
                .delete(delete_submission_handler),
        )
        .route("/queue", get(queue_handler))
        .route("/notifications", get(notifications_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Serve until the process is stopped
pub async fn serve(addr: SocketAddr, service: Arc<WorkflowService>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Reference platform listening");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}

/// Bind an ephemeral local port and serve in the background
pub async fn spawn(service: Arc<WorkflowService>) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = router(service);
    let handle = tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, app).await {
            warn!(error = %error, "Reference platform stopped");
        }
    });
    Ok((addr, handle))
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, WorkflowError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| WorkflowError::Unauthenticated("missing bearer token".to_string()))
}

fn authenticate(service: &WorkflowService, headers: &HeaderMap) -> Result<Account, WorkflowError> {
    let token = bearer_token(headers)?;
    service.directory().resolve(token).cloned()
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn login_handler(
    State(service): State<Arc<WorkflowService>>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let grant = service.directory().login(&request.email, &request.password)?;
    Ok(Json(LoginResponse {
        token: grant.token,
        user: grant.account,
        redirect: grant.redirect,
    }))
}

async fn logout_handler(
    State(service): State<Arc<WorkflowService>>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let token = bearer_token(&headers)?;
    if !service.directory().logout(token) {
        return Err(WorkflowError::Unauthenticated("unknown or expired session".to_string()).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn create_submission_handler(
    State(service): State<Arc<WorkflowService>>,
    headers: HeaderMap,
    Json(draft): Json<NewSubmission>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let actor = authenticate(&service, &headers)?;
    let submission = service.dispatcher().create_submission(&actor.id, draft).await?;
    Ok((StatusCode::CREATED, Json(json!({ "submission": submission }))))
}

async fn get_submission_handler(
    State(service): State<Arc<WorkflowService>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let actor = authenticate(&service, &headers)?;
    let detail = service.dispatcher().get_submission(&actor.id, &id).await?;
    Ok(Json(json!({ "submission": detail })))
}

/// Action requests carry an `action` key; anything else is a content edit
async fn update_submission_handler(
    State(service): State<Arc<WorkflowService>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let actor = authenticate(&service, &headers)?;
    let dispatcher = service.dispatcher();

    let submission = if body.get("action").is_some() {
        let request: ActionRequest = serde_json::from_value(body)
            .map_err(|e| WorkflowError::ValidationFailed(e.to_string()))?;
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span(request.action, &id, actor.role, Some(&correlation_id));
        dispatcher
            .perform_action(&id, request.action, &actor.id, request.payload)
            .instrument(span)
            .await?
    } else {
        let update: ContentUpdate = serde_json::from_value(body)
            .map_err(|e| WorkflowError::ValidationFailed(e.to_string()))?;
        dispatcher.update_content(&actor.id, &id, update).await?
    };

    Ok(Json(json!({ "submission": submission })))
}

async fn delete_submission_handler(
    State(service): State<Arc<WorkflowService>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let actor = authenticate(&service, &headers)?;
    service.dispatcher().delete_submission(&actor.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn queue_handler(
    State(service): State<Arc<WorkflowService>>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let actor = authenticate(&service, &headers)?;
    let submissions = service.dispatcher().queue_for(&actor.id).await?;
    Ok(Json(json!({ "submissions": submissions })))
}

async fn notifications_handler(
    State(service): State<Arc<WorkflowService>>,
    Query(query): Query<NotificationQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let actor = authenticate(&service, &headers)?;
    let notifications = service
        .dispatcher()
        .notifications_for(&actor.id, query.user_id.as_deref())?;
    Ok(Json(json!({ "notifications": notifications })))
}
