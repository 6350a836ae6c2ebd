// Transition table - the single source of truth for legal status changes

use super::status::{Role, SubmissionStatus, WorkflowAction};
use SubmissionStatus::*;

/// Who, beyond holding the right role, may fire a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRule {
    /// Only the submission's author
    Author,
    /// The reviewer already assigned to the current stage
    Assignee,
    /// Any account holding one of the listed roles
    AnyInRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub from: SubmissionStatus,
    pub action: WorkflowAction,
    pub to: SubmissionStatus,
    pub roles: &'static [Role],
    pub actor: ActorRule,
}

const fn rule(
    from: SubmissionStatus,
    action: WorkflowAction,
    to: SubmissionStatus,
    roles: &'static [Role],
    actor: ActorRule,
) -> TransitionRule {
    TransitionRule { from, action, to, roles, actor }
}

const WRITER: &[Role] = &[Role::Writer];
const STORY_MANAGER: &[Role] = &[Role::StoryManager];
const BOOK_MANAGER: &[Role] = &[Role::BookManager];
const CONTENT_ADMIN: &[Role] = &[Role::ContentAdmin];
const ASSIGNERS: &[Role] = &[Role::Admin, Role::ContentAdmin];

pub const TRANSITIONS: &[TransitionRule] = &[
    rule(Draft, WorkflowAction::Submit, Pending, WRITER, ActorRule::Author),
    rule(Pending, WorkflowAction::StoryApprove, StoryApproved, STORY_MANAGER, ActorRule::AnyInRole),
    rule(Pending, WorkflowAction::StoryNeedsRevision, NeedsRevision, STORY_MANAGER, ActorRule::AnyInRole),
    rule(Pending, WorkflowAction::Reject, Rejected, STORY_MANAGER, ActorRule::AnyInRole),
    rule(Pending, WorkflowAction::AssignStoryManager, StoryReview, ASSIGNERS, ActorRule::AnyInRole),
    rule(StoryReview, WorkflowAction::StoryApprove, StoryApproved, STORY_MANAGER, ActorRule::Assignee),
    rule(StoryReview, WorkflowAction::StoryNeedsRevision, NeedsRevision, STORY_MANAGER, ActorRule::Assignee),
    rule(StoryReview, WorkflowAction::Reject, Rejected, STORY_MANAGER, ActorRule::Assignee),
    rule(NeedsRevision, WorkflowAction::Submit, Pending, WRITER, ActorRule::Author),
    rule(StoryApproved, WorkflowAction::FormatDecision, ContentReview, BOOK_MANAGER, ActorRule::AnyInRole),
    rule(StoryApproved, WorkflowAction::AssignBookManager, FormatReview, ASSIGNERS, ActorRule::AnyInRole),
    rule(StoryApproved, WorkflowAction::Reject, Rejected, BOOK_MANAGER, ActorRule::AnyInRole),
    rule(FormatReview, WorkflowAction::FormatDecision, ContentReview, BOOK_MANAGER, ActorRule::Assignee),
    rule(FormatReview, WorkflowAction::Reject, Rejected, BOOK_MANAGER, ActorRule::Assignee),
    rule(ContentReview, WorkflowAction::FinalApprove, Published, CONTENT_ADMIN, ActorRule::AnyInRole),
    rule(ContentReview, WorkflowAction::Reject, Rejected, CONTENT_ADMIN, ActorRule::AnyInRole),
];

/// Row for `action` out of `from`, ignoring who asks
pub fn lookup(from: SubmissionStatus, action: WorkflowAction) -> Option<&'static TransitionRule> {
    TRANSITIONS
        .iter()
        .find(|rule| rule.from == from && rule.action == action)
}

/// Whether `role` appears in any row for `action`, regardless of status
pub fn role_may_perform(role: Role, action: WorkflowAction) -> bool {
    TRANSITIONS
        .iter()
        .any(|rule| rule.action == action && rule.roles.contains(&role))
}

/// Actions a role may request while a submission sits in `status`
pub fn allowed_actions(status: SubmissionStatus, role: Role) -> Vec<WorkflowAction> {
    TRANSITIONS
        .iter()
        .filter(|rule| rule.from == status && rule.roles.contains(&role))
        .map(|rule| rule.action)
        .collect()
}

pub fn is_edge(from: SubmissionStatus, to: SubmissionStatus) -> bool {
    TRANSITIONS.iter().any(|rule| rule.from == from && rule.to == to)
}

/// Why a sequence of recorded transitions is not a walk through the table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("history does not start at DRAFT (first entry leaves {0})")]
    BadStart(SubmissionStatus),
    #[error("entry {index} leaves {found} but the previous entry arrived at {expected}")]
    Disconnected {
        index: usize,
        expected: SubmissionStatus,
        found: SubmissionStatus,
    },
    #[error("entry {index} records {from} -> {to}, which is not a legal edge")]
    IllegalEdge {
        index: usize,
        from: SubmissionStatus,
        to: SubmissionStatus,
    },
    #[error("entry {index} leaves terminal state {status}")]
    LeftTerminal { index: usize, status: SubmissionStatus },
    #[error("history ends at {ends_at} but the submission is {current}")]
    EndMismatch {
        ends_at: SubmissionStatus,
        current: SubmissionStatus,
    },
}

/// Check that ordered `(from, to)` pairs form a connected path from DRAFT
/// through legal edges that ends at `current`
pub fn validate_path(
    pairs: &[(SubmissionStatus, SubmissionStatus)],
    current: SubmissionStatus,
) -> Result<(), PathError> {
    let mut at = Draft;

    for (index, &(from, to)) in pairs.iter().enumerate() {
        if index == 0 && from != Draft {
            return Err(PathError::BadStart(from));
        }
        if from != at {
            return Err(PathError::Disconnected { index, expected: at, found: from });
        }
        if from.is_terminal() {
            return Err(PathError::LeftTerminal { index, status: from });
        }
        if !is_edge(from, to) {
            return Err(PathError::IllegalEdge { index, from, to });
        }
        at = to;
    }

    if at != current {
        return Err(PathError::EndMismatch { ends_at: at, current });
    }
    Ok(())
}
