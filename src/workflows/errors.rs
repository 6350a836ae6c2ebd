use super::status::{Role, SubmissionStatus, WorkflowAction};
use thiserror::Error;

/// Failure taxonomy shared by the engine, the HTTP surface and the harness
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("authentication required: {0}")]
    Unauthenticated(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid transition: cannot {action} from {from}")]
    InvalidTransition {
        from: SubmissionStatus,
        action: WorkflowAction,
    },

    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("submission '{0}' already has a transition in flight")]
    Conflict(String),

    #[error("authentication failed for {role} after {attempts} attempt(s): {reason}")]
    AuthFailure {
        role: Role,
        attempts: u32,
        reason: String,
    },

    #[error("operation '{operation}' timed out after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    #[error("transport error: {0}")]
    Transport(String),
}

impl WorkflowError {
    pub fn submission_not_found(id: &str) -> Self {
        WorkflowError::NotFound {
            resource: "submission",
            id: id.to_string(),
        }
    }

    /// Stable machine-readable kind carried in HTTP error bodies
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::Unauthenticated(_) => "unauthenticated",
            WorkflowError::Unauthorized(_) => "unauthorized",
            WorkflowError::InvalidTransition { .. } => "invalid_transition",
            WorkflowError::NotFound { .. } => "not_found",
            WorkflowError::ValidationFailed(_) => "validation_failed",
            WorkflowError::Conflict(_) => "conflict",
            WorkflowError::AuthFailure { .. } => "auth_failure",
            WorkflowError::Timeout { .. } => "timeout",
            WorkflowError::Transport(_) => "transport",
        }
    }

    /// One HTTP status per failure kind
    pub fn http_status(&self) -> u16 {
        match self {
            WorkflowError::Unauthenticated(_) | WorkflowError::AuthFailure { .. } => 401,
            WorkflowError::Unauthorized(_) => 403,
            WorkflowError::NotFound { .. } => 404,
            WorkflowError::InvalidTransition { .. } => 409,
            WorkflowError::ValidationFailed(_) => 422,
            WorkflowError::Conflict(_) => 423,
            WorkflowError::Timeout { .. } => 504,
            WorkflowError::Transport(_) => 502,
        }
    }

    /// Transient failures worth another attempt under a retry policy
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkflowError::Timeout { .. } | WorkflowError::Transport(_) | WorkflowError::Conflict(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_kind_maps_to_a_single_status() {
        let cases = [
            (WorkflowError::Unauthenticated("no token".into()), 401),
            (WorkflowError::Unauthorized("wrong role".into()), 403),
            (WorkflowError::submission_not_found("abc"), 404),
            (
                WorkflowError::InvalidTransition {
                    from: SubmissionStatus::Pending,
                    action: WorkflowAction::FinalApprove,
                },
                409,
            ),
            (WorkflowError::ValidationFailed("reason required".into()), 422),
            (WorkflowError::Conflict("abc".into()), 423),
        ];

        for (error, status) in cases {
            assert_eq!(error.http_status(), status, "{}", error.code());
        }
    }

    #[test]
    fn test_display_names_the_transition() {
        let error = WorkflowError::InvalidTransition {
            from: SubmissionStatus::Pending,
            action: WorkflowAction::FinalApprove,
        };
        assert_eq!(error.to_string(), "invalid transition: cannot final_approve from PENDING");
    }

    #[test]
    fn test_business_errors_are_not_retryable() {
        assert!(!WorkflowError::Unauthorized("x".into()).is_retryable());
        assert!(!WorkflowError::ValidationFailed("x".into()).is_retryable());
        assert!(WorkflowError::Transport("reset".into()).is_retryable());
    }
}
