//! Extraction claims: AI-proposed field values pending human review.
//!
//! Claims arrive from the extraction collaborator as untrusted input.
//! A claim is resolved (verified or rejected) exactly once; a human
//! correction is captured in place via `corrected_value`, preserving the
//! original AI output for audit. Claims are never re-opened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActorContext, ClaimId, DealId, DocumentId, DocumentType, ExtractionId};

/// Where in the source document the claimed value was read from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceLocator {
    /// Page number within a paginated document
    Page(u32),
    /// Cell reference within a workbook, e.g. `Assumptions!B14`
    Cell(String),
}

impl SourceLocator {
    pub fn page_number(&self) -> Option<u32> {
        match self {
            SourceLocator::Page(page) => Some(*page),
            SourceLocator::Cell(_) => None,
        }
    }
}

/// Resolution status of a claim
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    Pending,
    Verified,
    Rejected,
}

/// An AI-extracted field value awaiting human confirmation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractionClaim {
    pub claim_id: ClaimId,
    pub deal_id: DealId,
    /// Dotted path of the field the value is proposed for,
    /// e.g. `income.grossPotentialRent`
    pub field_path: String,
    /// The value as the AI proposed it; never mutated after creation
    pub claimed_value: serde_json::Value,
    pub document_id: DocumentId,
    pub document_name: String,
    pub document_type: DocumentType,
    pub locator: SourceLocator,
    /// Verbatim text surrounding the extracted value
    pub text_snippet: String,
    pub extraction_id: ExtractionId,
    pub ai_model: String,
    /// Model confidence in [0, 1]; low-confidence claims surface first
    pub ai_confidence: f64,
    pub status: ClaimStatus,
    pub verified_by: Option<ActorContext>,
    pub verified_at: Option<DateTime<Utc>>,
    /// Present only when a human overrode the AI value
    pub corrected_value: Option<serde_json::Value>,
    /// Reviewer-supplied reason; set on rejection
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ExtractionClaim {
    pub fn is_pending(&self) -> bool {
        self.status == ClaimStatus::Pending
    }

    /// The value downstream consumers should use: the human correction if
    /// one exists, otherwise the AI's original.
    pub fn effective_value(&self) -> &serde_json::Value {
        self.corrected_value.as_ref().unwrap_or(&self.claimed_value)
    }

    pub fn was_corrected(&self) -> bool {
        self.corrected_value.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claim() -> ExtractionClaim {
        ExtractionClaim {
            claim_id: ClaimId::new("c-1"),
            deal_id: DealId::new("d-1"),
            field_path: "income.grossPotentialRent".into(),
            claimed_value: json!(2_450_000),
            document_id: DocumentId::new("doc-1"),
            document_name: "rent-roll.pdf".into(),
            document_type: DocumentType::RentRoll,
            locator: SourceLocator::Page(3),
            text_snippet: "Gross Potential Rent: $2,450,000".into(),
            extraction_id: ExtractionId::new("x-1"),
            ai_model: "extractor-v2".into(),
            ai_confidence: 0.92,
            status: ClaimStatus::Pending,
            verified_by: None,
            verified_at: None,
            corrected_value: None,
            rejection_reason: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn effective_value_prefers_correction() {
        let mut c = claim();
        assert_eq!(c.effective_value(), &json!(2_450_000));
        c.corrected_value = Some(json!(2_400_000));
        assert_eq!(c.effective_value(), &json!(2_400_000));
        assert_eq!(c.claimed_value, json!(2_450_000));
    }

    #[test]
    fn locator_page_number() {
        assert_eq!(SourceLocator::Page(3).page_number(), Some(3));
        assert_eq!(
            SourceLocator::Cell("Assumptions!B14".into()).page_number(),
            None
        );
    }
}
