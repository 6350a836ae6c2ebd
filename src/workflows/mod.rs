// Submission workflow engine
// Every status change goes through the dispatcher and lands in the ledger

pub mod dispatcher;
pub mod errors;
pub mod ledger;
pub mod notifications;
pub mod status;
pub mod submission;
pub mod transitions;

pub use dispatcher::{ConflictPolicy, WorkflowDispatcher};
pub use errors::WorkflowError;
pub use ledger::HistoryLedger;
pub use notifications::{Notification, NotificationKind, NotificationLog};
pub use status::{FormatDecision, Role, SubmissionStatus, WorkflowAction};
pub use submission::{
    ActionPayload, ActionRequest, ContentUpdate, NewSubmission, Submission, SubmissionDetail,
    WorkflowHistoryEntry,
};
pub use transitions::{allowed_actions, lookup, validate_path, PathError, TransitionRule, TRANSITIONS};
