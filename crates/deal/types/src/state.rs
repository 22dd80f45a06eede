//! Deal lifecycle stages and the per-deal mutable state record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{ActorContext, Blocker, DealId, Role};

/// Lifecycle stage of a deal.
///
/// Forward stages run intake through close; `OnHold` parks a deal without
/// losing its place and `Dead` is a terminal business override.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DealStage {
    IntakeReceived,
    DataRoomIngested,
    ExtractionComplete,
    UnderwritingInProgress,
    UnderwritingComplete,
    IcReview,
    IcApproved,
    LoiIssued,
    PsaNegotiation,
    PsaExecuted,
    DueDiligence,
    FinancingApplication,
    LoanCommitted,
    ClosingPrep,
    Closed,
    OnHold,
    Dead,
}

impl DealStage {
    /// Terminal stages accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DealStage::Closed | DealStage::Dead)
    }

    /// Override stages are reachable from any non-terminal stage and sit
    /// outside the forward edge set.
    pub fn is_override(&self) -> bool {
        matches!(self, DealStage::OnHold | DealStage::Dead)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DealStage::IntakeReceived => "INTAKE_RECEIVED",
            DealStage::DataRoomIngested => "DATA_ROOM_INGESTED",
            DealStage::ExtractionComplete => "EXTRACTION_COMPLETE",
            DealStage::UnderwritingInProgress => "UNDERWRITING_IN_PROGRESS",
            DealStage::UnderwritingComplete => "UNDERWRITING_COMPLETE",
            DealStage::IcReview => "IC_REVIEW",
            DealStage::IcApproved => "IC_APPROVED",
            DealStage::LoiIssued => "LOI_ISSUED",
            DealStage::PsaNegotiation => "PSA_NEGOTIATION",
            DealStage::PsaExecuted => "PSA_EXECUTED",
            DealStage::DueDiligence => "DUE_DILIGENCE",
            DealStage::FinancingApplication => "FINANCING_APPLICATION",
            DealStage::LoanCommitted => "LOAN_COMMITTED",
            DealStage::ClosingPrep => "CLOSING_PREP",
            DealStage::Closed => "CLOSED",
            DealStage::OnHold => "ON_HOLD",
            DealStage::Dead => "DEAD",
        }
    }
}

impl std::fmt::Display for DealStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Approvals outstanding for the current stage's next gated transition
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingApprovals {
    /// Roles the pending transition rule requires
    pub required: BTreeSet<Role>,
    /// Roles that already have an APPROVED record on file
    pub received: BTreeSet<Role>,
}

impl PendingApprovals {
    pub fn outstanding(&self) -> Vec<Role> {
        self.required.difference(&self.received).cloned().collect()
    }

    pub fn is_satisfied(&self) -> bool {
        self.required.is_subset(&self.received)
    }
}

/// The single mutable state record for a deal.
///
/// Owned exclusively by the lifecycle engine: `current_stage` must always
/// equal the `to` stage of the deal's most recent `StateTransition` event,
/// so both are updated inside one atomic operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DealState {
    pub deal_id: DealId,
    pub current_stage: DealStage,
    pub entered_stage_at: DateTime<Utc>,
    /// Structured reasons the last attempted transition was refused
    pub blockers: Vec<Blocker>,
    pub pending_approvals: PendingApprovals,
    /// Stage the deal occupied before being put on hold
    pub held_from: Option<DealStage>,
    pub last_transition_by: Option<ActorContext>,
    pub last_transition_at: Option<DateTime<Utc>>,
}

impl DealState {
    /// Fresh state for a newly created deal, sitting at intake.
    pub fn new(deal_id: DealId) -> Self {
        Self {
            deal_id,
            current_stage: DealStage::IntakeReceived,
            entered_stage_at: Utc::now(),
            blockers: Vec::new(),
            pending_approvals: PendingApprovals::default(),
            held_from: None,
            last_transition_by: None,
            last_transition_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_and_override_classification() {
        assert!(DealStage::Closed.is_terminal());
        assert!(DealStage::Dead.is_terminal());
        assert!(!DealStage::OnHold.is_terminal());
        assert!(DealStage::OnHold.is_override());
        assert!(!DealStage::IcReview.is_override());
    }

    #[test]
    fn stage_serializes_screaming_snake() {
        let json = serde_json::to_string(&DealStage::DataRoomIngested).unwrap();
        assert_eq!(json, "\"DATA_ROOM_INGESTED\"");
    }

    #[test]
    fn pending_approvals_outstanding() {
        let mut pa = PendingApprovals::default();
        pa.required.insert(Role::ic_chair());
        pa.required.insert(Role::managing_partner());
        pa.received.insert(Role::ic_chair());
        assert!(!pa.is_satisfied());
        assert_eq!(pa.outstanding(), vec![Role::managing_partner()]);
    }
}
