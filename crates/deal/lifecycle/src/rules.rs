//! The lifecycle rule table: every forward edge a deal can take.
//!
//! Edges are static records; changing the lifecycle means changing this
//! table, nothing else. Override moves to ON_HOLD and DEAD are not edges
//! here; the engine handles them explicitly.

use deal_types::{CheckId, DealStage, DocumentType, Role, TransitionRule};

/// Build the full forward edge set of the deal lifecycle.
pub fn lifecycle_rules() -> Vec<TransitionRule> {
    use DealStage::*;

    vec![
        TransitionRule::new(IntakeReceived, DataRoomIngested),
        TransitionRule::new(DataRoomIngested, ExtractionComplete)
            .with_checks([CheckId::HasSourceDocuments]),
        TransitionRule::new(ExtractionComplete, UnderwritingInProgress)
            .with_checks([CheckId::AllClaimsVerified, CheckId::NoOpenConflicts]),
        TransitionRule::new(UnderwritingInProgress, UnderwritingComplete)
            .with_checks([CheckId::HasUnderwritingModel]),
        TransitionRule::new(UnderwritingComplete, IcReview)
            .with_documents([DocumentType::IcMemo])
            .with_checks([CheckId::HasIcMemo]),
        TransitionRule::new(IcReview, IcApproved)
            .with_approvals([Role::ic_chair(), Role::managing_partner()])
            .with_checks([CheckId::NoOpenConflicts]),
        TransitionRule::new(IcApproved, LoiIssued).with_documents([DocumentType::Loi]),
        TransitionRule::new(LoiIssued, PsaNegotiation),
        TransitionRule::new(PsaNegotiation, PsaExecuted)
            .with_documents([DocumentType::Psa])
            .with_checks([CheckId::HasPsaExecuted]),
        TransitionRule::new(PsaExecuted, DueDiligence),
        TransitionRule::new(DueDiligence, FinancingApplication)
            .with_checks([CheckId::DdItemsComplete, CheckId::NoOpenConflicts]),
        TransitionRule::new(FinancingApplication, LoanCommitted)
            .with_documents([DocumentType::LoanCommitment])
            .with_checks([CheckId::HasLoanCommitment]),
        TransitionRule::new(LoanCommitted, ClosingPrep),
        TransitionRule::new(ClosingPrep, Closed)
            .with_approvals([Role::managing_partner()])
            .with_checks([CheckId::AllClosingDocsReady]),
    ]
}
