//! Captured approval decisions.
//!
//! Many approvals may exist per target; the lifecycle engine evaluates
//! the *set* of APPROVED records against the required-role set of a
//! transition rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ApprovalId, DealId, DealStage, DocumentType, DocumentVersionId, Role};

/// What the approval is for
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalKind {
    /// Approval to advance the deal into `target`
    StateTransition { target: DealStage },
    /// Approval to release a specific document version
    DocumentRelease {
        document_type: DocumentType,
        version_id: DocumentVersionId,
    },
}

/// The approver's decision
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
    /// Approved subject to the listed conditions
    Conditional { conditions: Vec<String> },
}

impl ApprovalDecision {
    /// Only an unconditional APPROVED satisfies a required-role gate.
    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalDecision::Approved)
    }
}

/// How the decision was captured
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaptureMethod {
    Ui,
    Email,
    Docusign,
    Verbal,
}

/// One captured approval decision for a deal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub approval_id: ApprovalId,
    pub deal_id: DealId,
    pub kind: ApprovalKind,
    pub approver_id: String,
    pub approver_role: Role,
    pub decision: ApprovalDecision,
    pub capture_method: CaptureMethod,
    pub decided_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

/// Snapshot of one approval considered at decision time, embedded in the
/// ledger event that consumed it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityRecord {
    pub approver_role: Role,
    pub decision: ApprovalDecision,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditional_does_not_satisfy_gate() {
        assert!(ApprovalDecision::Approved.is_approved());
        assert!(!ApprovalDecision::Rejected.is_approved());
        assert!(!ApprovalDecision::Conditional {
            conditions: vec!["subject to appraisal".into()]
        }
        .is_approved());
    }
}
