// Status, action and role vocabulary shared by the engine and the harness

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a submission under editorial review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Draft,
    Pending,
    StoryReview,
    StoryApproved,
    FormatReview,
    ContentReview,
    NeedsRevision,
    Rejected,
    Published,
}

impl SubmissionStatus {
    pub const ALL: [SubmissionStatus; 9] = [
        SubmissionStatus::Draft,
        SubmissionStatus::Pending,
        SubmissionStatus::StoryReview,
        SubmissionStatus::StoryApproved,
        SubmissionStatus::FormatReview,
        SubmissionStatus::ContentReview,
        SubmissionStatus::NeedsRevision,
        SubmissionStatus::Rejected,
        SubmissionStatus::Published,
    ];

    /// REJECTED and PUBLISHED accept no further action
    pub fn is_terminal(self) -> bool {
        matches!(self, SubmissionStatus::Rejected | SubmissionStatus::Published)
    }

    /// The author may edit title and content only in these states
    pub fn is_editable(self) -> bool {
        matches!(self, SubmissionStatus::Draft | SubmissionStatus::NeedsRevision)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Draft => "DRAFT",
            SubmissionStatus::Pending => "PENDING",
            SubmissionStatus::StoryReview => "STORY_REVIEW",
            SubmissionStatus::StoryApproved => "STORY_APPROVED",
            SubmissionStatus::FormatReview => "FORMAT_REVIEW",
            SubmissionStatus::ContentReview => "CONTENT_REVIEW",
            SubmissionStatus::NeedsRevision => "NEEDS_REVISION",
            SubmissionStatus::Rejected => "REJECTED",
            SubmissionStatus::Published => "PUBLISHED",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubmissionStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown submission status '{s}'"))
    }
}

/// Named operation that attempts a status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    Submit,
    AssignStoryManager,
    StoryApprove,
    StoryNeedsRevision,
    AssignBookManager,
    FormatDecision,
    FinalApprove,
    Reject,
}

impl WorkflowAction {
    pub const ALL: [WorkflowAction; 8] = [
        WorkflowAction::Submit,
        WorkflowAction::AssignStoryManager,
        WorkflowAction::StoryApprove,
        WorkflowAction::StoryNeedsRevision,
        WorkflowAction::AssignBookManager,
        WorkflowAction::FormatDecision,
        WorkflowAction::FinalApprove,
        WorkflowAction::Reject,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowAction::Submit => "submit",
            WorkflowAction::AssignStoryManager => "assign_story_manager",
            WorkflowAction::StoryApprove => "story_approve",
            WorkflowAction::StoryNeedsRevision => "story_needs_revision",
            WorkflowAction::AssignBookManager => "assign_book_manager",
            WorkflowAction::FormatDecision => "format_decision",
            WorkflowAction::FinalApprove => "final_approve",
            WorkflowAction::Reject => "reject",
        }
    }
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkflowAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("invalid action '{s}'"))
    }
}

/// Principal role; determines which transitions an actor may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Writer,
    StoryManager,
    BookManager,
    ContentAdmin,
    Teacher,
    Learner,
    Institution,
    Admin,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Writer,
        Role::StoryManager,
        Role::BookManager,
        Role::ContentAdmin,
        Role::Teacher,
        Role::Learner,
        Role::Institution,
        Role::Admin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Writer => "WRITER",
            Role::StoryManager => "STORY_MANAGER",
            Role::BookManager => "BOOK_MANAGER",
            Role::ContentAdmin => "CONTENT_ADMIN",
            Role::Teacher => "TEACHER",
            Role::Learner => "LEARNER",
            Role::Institution => "INSTITUTION",
            Role::Admin => "ADMIN",
        }
    }

    /// Where the platform sends this role after a successful login
    pub fn dashboard_path(self) -> &'static str {
        match self {
            Role::Writer => "/dashboard/writer",
            Role::StoryManager => "/dashboard/story-manager",
            Role::BookManager => "/dashboard/book-manager",
            Role::ContentAdmin => "/dashboard/content-admin",
            Role::Teacher => "/dashboard/teacher",
            Role::Learner => "/dashboard/learner",
            Role::Institution => "/dashboard/institution",
            Role::Admin => "/admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.replace('-', "_");
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| format!("unknown role '{s}'"))
    }
}

/// Book manager's publication format choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FormatDecision {
    Text,
    Book,
    Collection,
}
