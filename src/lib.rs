// Submission Flow - editorial workflow engine and multi-actor e2e harness
// This exposes the core components for testing and integration

pub mod client;
pub mod config;
pub mod platform;
pub mod retry;
pub mod scenarios;
pub mod session;
pub mod telemetry;
pub mod verify;
pub mod workflows;

// Re-export key types for easy access
pub use client::{
    AdminClient, BookManagerClient, ContentAdminClient, HttpPlatform, LocalPlatform,
    StoryManagerClient, WorkflowApi, WriterClient,
};
pub use config::{AccountConfig, HarnessConfig};
pub use platform::WorkflowService;
pub use retry::RetryPolicy;
pub use scenarios::{Scenario, ScenarioError, ScenarioReport, ScenarioRunner};
pub use session::{Authenticator, Session, SessionBroker, SlotPhase};
pub use telemetry::{generate_correlation_id, init_telemetry};
pub use verify::Verifier;
pub use workflows::{
    ActionPayload, ConflictPolicy, ContentUpdate, FormatDecision, NewSubmission, Notification,
    NotificationKind, Role, Submission, SubmissionDetail, SubmissionStatus, WorkflowAction,
    WorkflowDispatcher, WorkflowError,
};
