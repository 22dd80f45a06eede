//! Document versions and the forward-only promotion lifecycle.
//!
//! Generated documents are versioned per `(deal, document type)` and move
//! DRAFT → BINDING → EXECUTED → EFFECTIVE, one step at a time, never
//! backwards. A document cannot leave DRAFT while any field it renders
//! lacks claim-backed provenance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ActorContext, ClaimId, ContentHash, DealId, DocumentVersionId};

/// Kinds of documents the core tracks, both ingested sources and
/// generated deliverables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    // Ingested source material
    RentRoll,
    OperatingStatement,
    TrailingTwelve,
    OfferingMemorandum,
    // Generated deliverables
    UnderwritingModel,
    IcMemo,
    Loi,
    Psa,
    LoanCommitment,
    ClosingStatement,
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DocumentType::RentRoll => "RENT_ROLL",
            DocumentType::OperatingStatement => "OPERATING_STATEMENT",
            DocumentType::TrailingTwelve => "TRAILING_TWELVE",
            DocumentType::OfferingMemorandum => "OFFERING_MEMORANDUM",
            DocumentType::UnderwritingModel => "UNDERWRITING_MODEL",
            DocumentType::IcMemo => "IC_MEMO",
            DocumentType::Loi => "LOI",
            DocumentType::Psa => "PSA",
            DocumentType::LoanCommitment => "LOAN_COMMITMENT",
            DocumentType::ClosingStatement => "CLOSING_STATEMENT",
        };
        write!(f, "{}", name)
    }
}

/// Promotion status of a document version. Ordering is the promotion
/// order; comparisons rely on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Draft,
    Binding,
    Executed,
    Effective,
}

impl DocumentStatus {
    /// The single legal promotion target from this status.
    pub fn next(&self) -> Option<DocumentStatus> {
        match self {
            DocumentStatus::Draft => Some(DocumentStatus::Binding),
            DocumentStatus::Binding => Some(DocumentStatus::Executed),
            DocumentStatus::Executed => Some(DocumentStatus::Effective),
            DocumentStatus::Effective => None,
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DocumentStatus::Draft => "DRAFT",
            DocumentStatus::Binding => "BINDING",
            DocumentStatus::Executed => "EXECUTED",
            DocumentStatus::Effective => "EFFECTIVE",
        };
        write!(f, "{}", name)
    }
}

/// One version of a generated document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub version_id: DocumentVersionId,
    pub deal_id: DealId,
    pub document_type: DocumentType,
    /// Strictly increasing per `(deal_id, document_type)`; duplicates are
    /// rejected at insert, never overwritten.
    pub version: u32,
    pub status: DocumentStatus,
    /// BLAKE3 of the rendered content held in blob storage
    pub content_hash: ContentHash,
    /// Key into the content-addressed blob store; the core never holds bytes
    pub storage_key: String,
    /// Field path → claim that sourced the field's value
    pub provenance_map: BTreeMap<String, ClaimId>,
    /// Version this one supersedes; informational lineage only
    pub parent_version_id: Option<DocumentVersionId>,
    /// Present exactly while status is DRAFT
    pub watermark_text: Option<String>,
    pub created_by: ActorContext,
    pub created_at: DateTime<Utc>,
    pub promoted_at: Option<DateTime<Utc>>,
}

/// Provenance trail entry carried by a finalized document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldProvenance {
    pub field_path: String,
    pub value: serde_json::Value,
    pub claim_id: ClaimId,
    /// Name of the source document the claim was extracted from
    pub document_source: String,
    pub page_number: Option<u32>,
}

/// A rendered artifact bound to a document version, carrying the
/// externally consumable provenance trail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratedDocument {
    pub version_id: DocumentVersionId,
    pub deal_id: DealId,
    pub document_type: DocumentType,
    pub content_hash: ContentHash,
    pub storage_key: String,
    pub field_provenance: Vec<FieldProvenance>,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotion_order_is_linear() {
        assert_eq!(DocumentStatus::Draft.next(), Some(DocumentStatus::Binding));
        assert_eq!(
            DocumentStatus::Binding.next(),
            Some(DocumentStatus::Executed)
        );
        assert_eq!(
            DocumentStatus::Executed.next(),
            Some(DocumentStatus::Effective)
        );
        assert_eq!(DocumentStatus::Effective.next(), None);
    }

    #[test]
    fn status_ordering_matches_promotion_order() {
        assert!(DocumentStatus::Draft < DocumentStatus::Binding);
        assert!(DocumentStatus::Binding < DocumentStatus::Executed);
        assert!(DocumentStatus::Executed < DocumentStatus::Effective);
    }
}
