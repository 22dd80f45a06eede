//! Intake-side records: ingested source documents and the diligence
//! checklist that gates the financing stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActorContext, ContentHash, DealId, DocumentId, DocumentType};

/// A source document ingested into the deal's data room. Bytes live in
/// content-addressed blob storage; the core keeps only the reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub document_id: DocumentId,
    pub deal_id: DealId,
    pub name: String,
    pub document_type: DocumentType,
    pub content_hash: ContentHash,
    pub storage_key: String,
    pub uploaded_by: ActorContext,
    pub uploaded_at: DateTime<Utc>,
}

/// One item on the due-diligence checklist
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiligenceItem {
    pub name: String,
    pub complete: bool,
    pub completed_by: Option<ActorContext>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DiligenceItem {
    pub fn open(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            complete: false,
            completed_by: None,
            completed_at: None,
        }
    }
}

/// Per-deal due-diligence checklist
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DiligenceChecklist {
    pub items: Vec<DiligenceItem>,
}

impl DiligenceChecklist {
    pub fn open_items(&self) -> usize {
        self.items.iter().filter(|i| !i.complete).count()
    }

    pub fn is_complete(&self) -> bool {
        self.open_items() == 0
    }
}
