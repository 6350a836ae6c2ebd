use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::ObservabilityConfig;
use crate::workflows::{Role, WorkflowAction};

/// Initialize structured logging on stderr. `RUST_LOG` wins over the
/// configured level.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }

    tracing::info!(log_level = %config.log_level, json = config.json, "Telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking related operations
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span around one workflow action request
pub fn create_workflow_span(
    action: WorkflowAction,
    submission_id: &str,
    role: Role,
    correlation_id: Option<&str>,
) -> tracing::Span {
    tracing::info_span!(
        "workflow_action",
        action = %action,
        submission.id = submission_id,
        actor.role = %role,
        correlation.id = correlation_id,
    )
}

/// Span around provisioning or releasing a role session
pub fn create_session_span(operation: &str, role: Role, correlation_id: Option<&str>) -> tracing::Span {
    tracing::info_span!(
        "session",
        operation = operation,
        actor.role = %role,
        correlation.id = correlation_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_ids_are_unique() {
        assert_ne!(generate_correlation_id(), generate_correlation_id());
    }
}
