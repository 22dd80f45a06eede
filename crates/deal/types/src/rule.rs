//! Transition rules and blocker checks.
//!
//! Every lifecycle edge is a static record: target stage, required
//! approval roles, required document types, and an ordered list of named
//! blocker checks. Checks are a closed enum so the rule set stays
//! exhaustively matchable and each check is testable in isolation.

use serde::{Deserialize, Serialize};

use crate::{DealStage, DocumentType, Role};

/// Named blocker checks evaluated against a deal snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckId {
    AllClaimsVerified,
    NoOpenConflicts,
    HasSourceDocuments,
    HasUnderwritingModel,
    HasIcMemo,
    HasPsaExecuted,
    DdItemsComplete,
    HasLoanCommitment,
    AllClosingDocsReady,
}

impl CheckId {
    /// External wire name of the check, stable across releases.
    pub fn name(&self) -> &'static str {
        match self {
            CheckId::AllClaimsVerified => "allClaimsVerified",
            CheckId::NoOpenConflicts => "noOpenConflicts",
            CheckId::HasSourceDocuments => "hasSourceDocuments",
            CheckId::HasUnderwritingModel => "hasUnderwritingModel",
            CheckId::HasIcMemo => "hasICMemo",
            CheckId::HasPsaExecuted => "hasPSAExecuted",
            CheckId::DdItemsComplete => "ddItemsComplete",
            CheckId::HasLoanCommitment => "hasLoanCommitment",
            CheckId::AllClosingDocsReady => "allClosingDocsReady",
        }
    }
}

impl std::fmt::Display for CheckId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Outcome of evaluating one check against a deal snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: CheckId,
    pub satisfied: bool,
    /// Human-readable reason; set when not satisfied
    pub reason: Option<String>,
    /// Structured detail, e.g. `{"pendingClaims": 1}`
    pub details: serde_json::Value,
}

impl CheckResult {
    pub fn satisfied(check: CheckId) -> Self {
        Self {
            check,
            satisfied: true,
            reason: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn blocked(check: CheckId, reason: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            check,
            satisfied: false,
            reason: Some(reason.into()),
            details,
        }
    }
}

/// A structured reason a transition is currently disallowed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Blocker {
    pub check: CheckId,
    pub reason: String,
    pub details: serde_json::Value,
}

impl From<CheckResult> for Blocker {
    fn from(result: CheckResult) -> Self {
        Blocker {
            check: result.check,
            reason: result
                .reason
                .unwrap_or_else(|| format!("check {} not satisfied", result.check)),
            details: result.details,
        }
    }
}

/// One edge in the lifecycle graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRule {
    pub from: DealStage,
    pub to: DealStage,
    /// Roles that must each have an APPROVED record for this transition
    pub required_approvals: Vec<Role>,
    /// Document types that must exist before the transition
    pub required_documents: Vec<DocumentType>,
    /// Blocker checks, evaluated in order
    pub checks: Vec<CheckId>,
}

impl TransitionRule {
    pub fn new(from: DealStage, to: DealStage) -> Self {
        Self {
            from,
            to,
            required_approvals: Vec::new(),
            required_documents: Vec::new(),
            checks: Vec::new(),
        }
    }

    pub fn with_approvals(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.required_approvals.extend(roles);
        self
    }

    pub fn with_documents(mut self, documents: impl IntoIterator<Item = DocumentType>) -> Self {
        self.required_documents.extend(documents);
        self
    }

    pub fn with_checks(mut self, checks: impl IntoIterator<Item = CheckId>) -> Self {
        self.checks.extend(checks);
        self
    }
}

/// Evaluation of one outgoing edge, as returned to callers asking what
/// transitions are currently available.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionOption {
    pub target: DealStage,
    pub can_transition: bool,
    pub blockers: Vec<Blocker>,
    pub required_approvals: Vec<Role>,
    /// Required roles with no APPROVED record yet
    pub missing_approvals: Vec<Role>,
    pub required_documents: Vec<DocumentType>,
    /// Required document types with no version on file yet
    pub missing_documents: Vec<DocumentType>,
}
