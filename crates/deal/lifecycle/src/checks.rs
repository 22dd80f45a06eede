//! Blocker check evaluation: pure functions over a deal snapshot.
//!
//! Checks never touch stores and never produce side effects, so each one
//! is testable in isolation and the engine can re-run the full set at
//! commit time cheaply.

use serde_json::json;

use deal_types::{CheckId, CheckResult, DealSnapshot, DocumentType};

/// Evaluate one named check against a snapshot of deal facts.
pub fn evaluate_check(check: CheckId, snapshot: &DealSnapshot) -> CheckResult {
    match check {
        CheckId::AllClaimsVerified => {
            if snapshot.pending_claims == 0 {
                CheckResult::satisfied(check)
            } else {
                CheckResult::blocked(
                    check,
                    format!("{} claim(s) still pending review", snapshot.pending_claims),
                    json!({ "pendingClaims": snapshot.pending_claims }),
                )
            }
        }

        CheckId::NoOpenConflicts => {
            if snapshot.open_conflicts == 0 {
                CheckResult::satisfied(check)
            } else {
                CheckResult::blocked(
                    check,
                    format!("{} unresolved data conflict(s)", snapshot.open_conflicts),
                    json!({ "openConflicts": snapshot.open_conflicts }),
                )
            }
        }

        CheckId::HasSourceDocuments => {
            if snapshot.source_documents > 0 {
                CheckResult::satisfied(check)
            } else {
                CheckResult::blocked(
                    check,
                    "no source documents ingested",
                    json!({ "sourceDocuments": 0 }),
                )
            }
        }

        CheckId::HasUnderwritingModel => {
            require_document(check, snapshot, DocumentType::UnderwritingModel)
        }

        CheckId::HasIcMemo => require_document(check, snapshot, DocumentType::IcMemo),

        CheckId::HasPsaExecuted => {
            if snapshot.has_executed(DocumentType::Psa) {
                CheckResult::satisfied(check)
            } else {
                CheckResult::blocked(
                    check,
                    "PSA not executed",
                    json!({ "documentType": DocumentType::Psa.to_string() }),
                )
            }
        }

        CheckId::DdItemsComplete => {
            if snapshot.open_diligence_items == 0 {
                CheckResult::satisfied(check)
            } else {
                CheckResult::blocked(
                    check,
                    format!(
                        "{} due-diligence item(s) still open",
                        snapshot.open_diligence_items
                    ),
                    json!({ "openItems": snapshot.open_diligence_items }),
                )
            }
        }

        CheckId::HasLoanCommitment => {
            require_document(check, snapshot, DocumentType::LoanCommitment)
        }

        CheckId::AllClosingDocsReady => {
            if snapshot.closing_docs_ready {
                CheckResult::satisfied(check)
            } else {
                CheckResult::blocked(
                    check,
                    "closing document set not confirmed complete",
                    json!({ "closingDocsReady": false }),
                )
            }
        }
    }
}

fn require_document(
    check: CheckId,
    snapshot: &DealSnapshot,
    document_type: DocumentType,
) -> CheckResult {
    if snapshot.has_document(document_type) {
        CheckResult::satisfied(check)
    } else {
        CheckResult::blocked(
            check,
            format!("no {} on file", document_type),
            serde_json::json!({ "documentType": document_type.to_string() }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_claims_verified_reports_pending_count() {
        let mut snapshot = DealSnapshot::default();
        assert!(evaluate_check(CheckId::AllClaimsVerified, &snapshot).satisfied);

        snapshot.pending_claims = 1;
        let result = evaluate_check(CheckId::AllClaimsVerified, &snapshot);
        assert!(!result.satisfied);
        assert_eq!(result.details["pendingClaims"], 1);
    }

    #[test]
    fn document_presence_checks() {
        let mut snapshot = DealSnapshot::default();
        assert!(!evaluate_check(CheckId::HasUnderwritingModel, &snapshot).satisfied);
        assert!(!evaluate_check(CheckId::HasIcMemo, &snapshot).satisfied);

        snapshot.document_types.insert(DocumentType::UnderwritingModel);
        snapshot.document_types.insert(DocumentType::IcMemo);
        assert!(evaluate_check(CheckId::HasUnderwritingModel, &snapshot).satisfied);
        assert!(evaluate_check(CheckId::HasIcMemo, &snapshot).satisfied);
    }

    #[test]
    fn psa_must_be_executed_not_just_present() {
        let mut snapshot = DealSnapshot::default();
        snapshot.document_types.insert(DocumentType::Psa);
        assert!(!evaluate_check(CheckId::HasPsaExecuted, &snapshot).satisfied);

        snapshot.executed_document_types.insert(DocumentType::Psa);
        assert!(evaluate_check(CheckId::HasPsaExecuted, &snapshot).satisfied);
    }

    #[test]
    fn diligence_and_closing_checks() {
        let mut snapshot = DealSnapshot::default();
        snapshot.open_diligence_items = 2;
        assert!(!evaluate_check(CheckId::DdItemsComplete, &snapshot).satisfied);
        snapshot.open_diligence_items = 0;
        assert!(evaluate_check(CheckId::DdItemsComplete, &snapshot).satisfied);

        assert!(!evaluate_check(CheckId::AllClosingDocsReady, &snapshot).satisfied);
        snapshot.closing_docs_ready = true;
        assert!(evaluate_check(CheckId::AllClosingDocsReady, &snapshot).satisfied);
    }
}
