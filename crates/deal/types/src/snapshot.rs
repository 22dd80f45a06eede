//! Point-in-time view of a deal's facts, consumed by blocker checks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::DocumentType;

/// The facts blocker checks evaluate against. Assembled by the service
/// from the claim queue, document manager, and intake records immediately
/// before evaluation, and re-assembled at commit time rather than trusted
/// from a prior read.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealSnapshot {
    /// Claims still awaiting human review
    pub pending_claims: usize,
    /// Unresolved data conflicts flagged on the deal
    pub open_conflicts: usize,
    /// Ingested source documents in the data room
    pub source_documents: usize,
    /// Document types with at least one version
    pub document_types: BTreeSet<DocumentType>,
    /// Document types with a version at EXECUTED or beyond
    pub executed_document_types: BTreeSet<DocumentType>,
    /// Due-diligence checklist items still open
    pub open_diligence_items: usize,
    /// Closing document set confirmed complete
    pub closing_docs_ready: bool,
}

impl DealSnapshot {
    pub fn has_document(&self, document_type: DocumentType) -> bool {
        self.document_types.contains(&document_type)
    }

    pub fn has_executed(&self, document_type: DocumentType) -> bool {
        self.executed_document_types.contains(&document_type)
    }
}
