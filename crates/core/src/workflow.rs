//! Review workflow states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A module's position in its review lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowState {
    /// Never generated
    #[default]
    NotGenerated,
    /// Generated, waiting for a reviewer
    PendingReview,
    /// Accepted by a reviewer
    Approved,
    /// Sent back by a reviewer
    Rejected,
}

impl WorkflowState {
    /// Wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::NotGenerated => "not-generated",
            WorkflowState::PendingReview => "pending-review",
            WorkflowState::Approved => "approved",
            WorkflowState::Rejected => "rejected",
        }
    }

    /// Whether a reviewer decision can move a module from `self` to `next`.
    ///
    /// `PendingReview` is only entered through generation, migration or a
    /// manual edit, never through a review decision, and nothing moves a module
    /// back to `NotGenerated`.
    pub fn can_review_to(&self, next: WorkflowState) -> bool {
        matches!(
            (self, next),
            (WorkflowState::PendingReview, WorkflowState::Approved)
                | (WorkflowState::PendingReview, WorkflowState::Rejected)
                | (WorkflowState::Rejected, WorkflowState::Approved)
                | (WorkflowState::Approved, WorkflowState::Rejected)
        )
    }

    /// Whether the module has been generated at least once.
    pub fn is_generated(&self) -> bool {
        !matches!(self, WorkflowState::NotGenerated)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkflowState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "not-generated" => Ok(WorkflowState::NotGenerated),
            "pending-review" | "pending" => Ok(WorkflowState::PendingReview),
            "approved" => Ok(WorkflowState::Approved),
            "rejected" => Ok(WorkflowState::Rejected),
            other => Err(format!("unknown workflow state '{}'", other)),
        }
    }
}
