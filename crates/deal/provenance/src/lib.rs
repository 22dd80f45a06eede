//! Provenance Store - where did this value come from?
//!
//! Captures the origin of every underwriting field value (Excel import,
//! verified AI claim, human entry, calculation) and keeps the full
//! per-field history, most recent first. When a document is finalized,
//! [`ProvenanceStore::build_field_provenance`] resolves each rendered
//! field back to a verified claim or refuses with `MissingProvenance`,
//! the gate that keeps unprovenanced values out of binding documents.

#![deny(unsafe_code)]

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use thiserror::Error;

use deal_claims::{ClaimError, ClaimQueue};
use deal_types::{
    ActorContext, DealId, FieldProvenance, InputSource, UnderwritingInput,
};

/// Provenance errors
#[derive(Debug, Error)]
pub enum ProvenanceError {
    /// The field has no claim-backed input; it cannot appear in a
    /// document promoted past DRAFT.
    #[error("no claim-backed provenance for field '{field_path}'")]
    MissingProvenance { field_path: String },

    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error("lock error")]
    LockError,
}

pub type ProvenanceResult<T> = Result<T, ProvenanceError>;

/// Per-deal, per-field input history.
pub struct ProvenanceStore {
    inputs: RwLock<HashMap<DealId, HashMap<String, Vec<UnderwritingInput>>>>,
}

impl ProvenanceStore {
    pub fn new() -> Self {
        Self {
            inputs: RwLock::new(HashMap::new()),
        }
    }

    /// Record where a field's current value came from.
    pub fn record_input(
        &self,
        deal_id: &DealId,
        field_path: impl Into<String>,
        value: serde_json::Value,
        source: InputSource,
        recorded_by: ActorContext,
    ) -> ProvenanceResult<UnderwritingInput> {
        let field_path = field_path.into();
        let input = UnderwritingInput {
            deal_id: deal_id.clone(),
            field_path: field_path.clone(),
            value,
            source,
            recorded_by,
            recorded_at: Utc::now(),
        };

        let mut inputs = self.inputs.write().map_err(|_| ProvenanceError::LockError)?;
        inputs
            .entry(deal_id.clone())
            .or_default()
            .entry(field_path.clone())
            .or_default()
            .push(input.clone());

        tracing::debug!(deal = %deal_id, field = %field_path, "provenance input recorded");
        Ok(input)
    }

    /// Full input history for a field, most recent first.
    pub fn get_history(
        &self,
        deal_id: &DealId,
        field_path: &str,
    ) -> ProvenanceResult<Vec<UnderwritingInput>> {
        let inputs = self.inputs.read().map_err(|_| ProvenanceError::LockError)?;
        let mut history = inputs
            .get(deal_id)
            .and_then(|fields| fields.get(field_path))
            .cloned()
            .unwrap_or_default();
        history.reverse();
        Ok(history)
    }

    /// The current (latest) input for a field, if any.
    pub fn latest(
        &self,
        deal_id: &DealId,
        field_path: &str,
    ) -> ProvenanceResult<Option<UnderwritingInput>> {
        let inputs = self.inputs.read().map_err(|_| ProvenanceError::LockError)?;
        Ok(inputs
            .get(deal_id)
            .and_then(|fields| fields.get(field_path))
            .and_then(|history| history.last())
            .cloned())
    }

    /// Resolve each field to its claim-backed provenance entry, for the
    /// trail a finalized document carries. Every field must trace to a
    /// claim; the first that does not fails the whole build.
    pub fn build_field_provenance(
        &self,
        claims: &ClaimQueue,
        deal_id: &DealId,
        field_paths: &[String],
    ) -> ProvenanceResult<Vec<FieldProvenance>> {
        let mut trail = Vec::with_capacity(field_paths.len());
        for field_path in field_paths {
            let input = self.latest(deal_id, field_path)?.ok_or_else(|| {
                ProvenanceError::MissingProvenance {
                    field_path: field_path.clone(),
                }
            })?;

            let claim_id = match input.source.claim_id() {
                Some(claim_id) => claim_id.clone(),
                None => {
                    return Err(ProvenanceError::MissingProvenance {
                        field_path: field_path.clone(),
                    })
                }
            };

            let claim = claims.get(&claim_id)?;
            trail.push(FieldProvenance {
                field_path: field_path.clone(),
                value: input.value,
                claim_id,
                document_source: claim.document_name,
                page_number: claim.locator.page_number(),
            });
        }
        Ok(trail)
    }
}

impl Default for ProvenanceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use deal_ledger::EventLedger;
    use deal_types::{
        ClaimId, ClaimStatus, DocumentId, DocumentType, ExtractionClaim, ExtractionId, Role,
        SourceLocator,
    };
    use serde_json::json;

    fn actor() -> ActorContext {
        ActorContext::new("u-1", "Dana Reyes", Role::analyst())
    }

    fn registered_claim(queue: &ClaimQueue, ledger: &EventLedger, id: &str) -> ClaimId {
        let claim = ExtractionClaim {
            claim_id: ClaimId::new(id),
            deal_id: DealId::new("d-1"),
            field_path: "income.grossPotentialRent".into(),
            claimed_value: json!(2_450_000),
            document_id: DocumentId::new("doc-1"),
            document_name: "rent-roll.pdf".into(),
            document_type: DocumentType::RentRoll,
            locator: SourceLocator::Page(3),
            text_snippet: "GPR $2,450,000".into(),
            extraction_id: ExtractionId::new("x-1"),
            ai_model: "extractor-v2".into(),
            ai_confidence: 0.92,
            status: ClaimStatus::Pending,
            verified_by: None,
            verified_at: None,
            corrected_value: None,
            rejection_reason: None,
            created_at: Utc::now(),
        };
        queue.register(ledger, claim, actor()).unwrap();
        ClaimId::new(id)
    }

    #[test]
    fn history_is_most_recent_first() {
        let store = ProvenanceStore::new();
        let deal = DealId::new("d-1");
        store
            .record_input(
                &deal,
                "income.gpr",
                json!(1),
                InputSource::HumanEntry { note: None },
                actor(),
            )
            .unwrap();
        store
            .record_input(
                &deal,
                "income.gpr",
                json!(2),
                InputSource::Calculation {
                    formula: "a + b".into(),
                },
                actor(),
            )
            .unwrap();

        let history = store.get_history(&deal, "income.gpr").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].value, json!(2));
        assert_eq!(history[1].value, json!(1));
        assert_eq!(
            store.latest(&deal, "income.gpr").unwrap().unwrap().value,
            json!(2)
        );
    }

    #[test]
    fn field_provenance_resolves_claim_backed_fields() {
        let store = ProvenanceStore::new();
        let queue = ClaimQueue::new();
        let ledger = EventLedger::new();
        let deal = DealId::new("d-1");
        let claim_id = registered_claim(&queue, &ledger, "c-1");

        store
            .record_input(
                &deal,
                "income.grossPotentialRent",
                json!(2_450_000),
                InputSource::AiExtraction {
                    claim_id: claim_id.clone(),
                    document_id: DocumentId::new("doc-1"),
                    page_number: Some(3),
                },
                actor(),
            )
            .unwrap();

        let trail = store
            .build_field_provenance(&queue, &deal, &["income.grossPotentialRent".to_string()])
            .unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].claim_id, claim_id);
        assert_eq!(trail[0].document_source, "rent-roll.pdf");
        assert_eq!(trail[0].page_number, Some(3));
        assert_eq!(trail[0].value, json!(2_450_000));
    }

    #[test]
    fn unrecorded_field_fails_missing_provenance() {
        let store = ProvenanceStore::new();
        let queue = ClaimQueue::new();
        let deal = DealId::new("d-1");

        let err = store
            .build_field_provenance(&queue, &deal, &["expenses.taxes".to_string()])
            .unwrap_err();
        assert!(matches!(
            err,
            ProvenanceError::MissingProvenance { ref field_path } if field_path == "expenses.taxes"
        ));
    }

    #[test]
    fn non_claim_input_fails_missing_provenance() {
        let store = ProvenanceStore::new();
        let queue = ClaimQueue::new();
        let deal = DealId::new("d-1");
        store
            .record_input(
                &deal,
                "expenses.taxes",
                json!(310_000),
                InputSource::HumanEntry { note: None },
                actor(),
            )
            .unwrap();

        let err = store
            .build_field_provenance(&queue, &deal, &["expenses.taxes".to_string()])
            .unwrap_err();
        assert!(matches!(err, ProvenanceError::MissingProvenance { .. }));
    }
}
