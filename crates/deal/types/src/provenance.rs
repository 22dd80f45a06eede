//! Field provenance: where an underwriting value came from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActorContext, ClaimId, DealId, DocumentId};

/// Origin of a field value
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputSource {
    /// Imported from an uploaded workbook
    ExcelImport { sheet: String, cell: String },
    /// Derived from a verified extraction claim
    AiExtraction {
        claim_id: ClaimId,
        document_id: DocumentId,
        page_number: Option<u32>,
    },
    /// Typed in directly by a person
    HumanEntry { note: Option<String> },
    /// Computed from other fields
    Calculation { formula: String },
}

impl InputSource {
    /// The claim backing this input, if it was claim-derived.
    pub fn claim_id(&self) -> Option<&ClaimId> {
        match self {
            InputSource::AiExtraction { claim_id, .. } => Some(claim_id),
            _ => None,
        }
    }
}

/// One recorded value for a field, with its origin.
///
/// The history of inputs for a field answers "why this value" without
/// re-deriving from the ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingInput {
    pub deal_id: DealId,
    pub field_path: String,
    pub value: serde_json::Value,
    pub source: InputSource,
    pub recorded_by: ActorContext,
    pub recorded_at: DateTime<Utc>,
}
