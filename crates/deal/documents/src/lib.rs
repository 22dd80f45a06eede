//! Document Version Manager - versioned generated documents with a
//! forward-only promotion lifecycle.
//!
//! Versions are unique and strictly increasing per `(deal, document
//! type)`; a duplicate insert fails fast rather than overwriting.
//! Promotion walks DRAFT → BINDING → EXECUTED → EFFECTIVE one step at a
//! time and never backwards. Leaving DRAFT requires every field in the
//! version's provenance map to resolve to a *verified* claim, and clears
//! the draft watermark. Every promotion is a ledger append.

#![deny(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use chrono::Utc;
use thiserror::Error;

use deal_claims::{ClaimError, ClaimQueue};
use deal_ledger::{EventLedger, LedgerError};
use deal_provenance::{ProvenanceError, ProvenanceStore};
use deal_types::{
    ActorContext, ClaimId, ClaimStatus, ContentHash, DealId, DocumentStatus, DocumentType,
    DocumentVersion, DocumentVersionId, EventPayload, GeneratedDocument,
};

/// Watermark applied to every draft; cleared on promotion out of DRAFT.
pub const DRAFT_WATERMARK: &str = "DRAFT - NOT FOR EXECUTION";

/// Document manager errors
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document version not found: {0}")]
    VersionNotFound(DocumentVersionId),

    #[error("version {version} already exists for {document_type} on deal {deal_id}")]
    DuplicateVersion {
        deal_id: DealId,
        document_type: DocumentType,
        version: u32,
    },

    #[error("illegal promotion {from} -> {to}; only the immediate next status is allowed")]
    IllegalPromotion {
        from: DocumentStatus,
        to: DocumentStatus,
    },

    #[error("field '{field_path}' is backed by claim {claim_id} which is not verified")]
    UnverifiedClaim {
        field_path: String,
        claim_id: ClaimId,
    },

    #[error(transparent)]
    Provenance(#[from] ProvenanceError),

    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("lock error")]
    LockError,
}

pub type DocumentResult<T> = Result<T, DocumentError>;

/// Content reference handed in when drafting: the bytes already live in
/// content-addressed blob storage.
#[derive(Clone, Debug)]
pub struct ContentRef {
    pub content_hash: ContentHash,
    pub storage_key: String,
}

/// Versions generated documents and enforces the promotion lifecycle.
pub struct DocumentVersionManager {
    versions: RwLock<HashMap<DocumentVersionId, DocumentVersion>>,
    deal_index: RwLock<HashMap<(DealId, DocumentType), Vec<DocumentVersionId>>>,
}

impl DocumentVersionManager {
    pub fn new() -> Self {
        Self {
            versions: RwLock::new(HashMap::new()),
            deal_index: RwLock::new(HashMap::new()),
        }
    }

    /// Create the next draft for `(deal, document type)`, assigning
    /// `version = max(existing) + 1` under the store's write lock.
    pub fn create_draft(
        &self,
        ledger: &EventLedger,
        deal_id: &DealId,
        document_type: DocumentType,
        content: ContentRef,
        provenance_map: BTreeMap<String, ClaimId>,
        parent_version_id: Option<DocumentVersionId>,
        actor: ActorContext,
    ) -> DocumentResult<DocumentVersion> {
        let mut versions = self.versions.write().map_err(|_| DocumentError::LockError)?;
        let mut deal_index = self
            .deal_index
            .write()
            .map_err(|_| DocumentError::LockError)?;

        let key = (deal_id.clone(), document_type);
        let next_version = deal_index
            .get(&key)
            .map(|ids| ids.len() as u32)
            .unwrap_or(0)
            + 1;

        self.insert_draft(
            ledger,
            &mut versions,
            &mut deal_index,
            deal_id,
            document_type,
            next_version,
            content,
            provenance_map,
            parent_version_id,
            actor,
        )
    }

    /// Create a draft at an explicit version number, the
    /// read-validate-write form: a caller that computed the version from
    /// a stale read fails with `DuplicateVersion` instead of overwriting.
    #[allow(clippy::too_many_arguments)]
    pub fn create_draft_at(
        &self,
        ledger: &EventLedger,
        deal_id: &DealId,
        document_type: DocumentType,
        version: u32,
        content: ContentRef,
        provenance_map: BTreeMap<String, ClaimId>,
        parent_version_id: Option<DocumentVersionId>,
        actor: ActorContext,
    ) -> DocumentResult<DocumentVersion> {
        let mut versions = self.versions.write().map_err(|_| DocumentError::LockError)?;
        let mut deal_index = self
            .deal_index
            .write()
            .map_err(|_| DocumentError::LockError)?;

        let key = (deal_id.clone(), document_type);
        let taken = deal_index.get(&key).map(|ids| ids.len() as u32).unwrap_or(0);
        if version != taken + 1 {
            return Err(DocumentError::DuplicateVersion {
                deal_id: deal_id.clone(),
                document_type,
                version,
            });
        }

        self.insert_draft(
            ledger,
            &mut versions,
            &mut deal_index,
            deal_id,
            document_type,
            version,
            content,
            provenance_map,
            parent_version_id,
            actor,
        )
    }

    /// Promote a version to the immediate next status.
    ///
    /// Leaving DRAFT re-validates field provenance at call time: every
    /// field in the provenance map must resolve through the provenance
    /// store and be backed by a VERIFIED claim.
    pub fn promote(
        &self,
        ledger: &EventLedger,
        provenance: &ProvenanceStore,
        claims: &ClaimQueue,
        version_id: &DocumentVersionId,
        to_status: DocumentStatus,
        actor: ActorContext,
    ) -> DocumentResult<DocumentVersion> {
        let mut versions = self.versions.write().map_err(|_| DocumentError::LockError)?;
        let version = versions
            .get_mut(version_id)
            .ok_or_else(|| DocumentError::VersionNotFound(version_id.clone()))?;

        if version.status.next() != Some(to_status) {
            return Err(DocumentError::IllegalPromotion {
                from: version.status,
                to: to_status,
            });
        }

        if version.status == DocumentStatus::Draft {
            Self::validate_provenance(provenance, claims, version)?;
        }

        let from = version.status;

        // Ledger first: a failed append leaves the version untouched.
        ledger.append(
            &version.deal_id,
            EventPayload::DocumentPromoted {
                version_id: version_id.clone(),
                document_type: version.document_type,
                from,
                to: to_status,
            },
            actor,
            Vec::new(),
        )?;

        version.status = to_status;
        version.promoted_at = Some(Utc::now());
        if from == DocumentStatus::Draft {
            version.watermark_text = None;
        }

        tracing::info!(
            deal = %version.deal_id,
            version = %version_id,
            document_type = %version.document_type,
            from = %from,
            to = %to_status,
            "document promoted"
        );
        Ok(version.clone())
    }

    /// Render the externally consumable artifact for a version: the
    /// content reference plus the field-by-field provenance trail.
    pub fn finalize(
        &self,
        provenance: &ProvenanceStore,
        claims: &ClaimQueue,
        version_id: &DocumentVersionId,
    ) -> DocumentResult<GeneratedDocument> {
        let versions = self.versions.read().map_err(|_| DocumentError::LockError)?;
        let version = versions
            .get(version_id)
            .ok_or_else(|| DocumentError::VersionNotFound(version_id.clone()))?;

        let field_paths: Vec<String> = version.provenance_map.keys().cloned().collect();
        let field_provenance =
            provenance.build_field_provenance(claims, &version.deal_id, &field_paths)?;

        Ok(GeneratedDocument {
            version_id: version.version_id.clone(),
            deal_id: version.deal_id.clone(),
            document_type: version.document_type,
            content_hash: version.content_hash,
            storage_key: version.storage_key.clone(),
            field_provenance,
            generated_at: Utc::now(),
        })
    }

    pub fn get(&self, version_id: &DocumentVersionId) -> DocumentResult<DocumentVersion> {
        let versions = self.versions.read().map_err(|_| DocumentError::LockError)?;
        versions
            .get(version_id)
            .cloned()
            .ok_or_else(|| DocumentError::VersionNotFound(version_id.clone()))
    }

    /// All versions for `(deal, document type)` in version order.
    pub fn list_versions(
        &self,
        deal_id: &DealId,
        document_type: DocumentType,
    ) -> DocumentResult<Vec<DocumentVersion>> {
        let versions = self.versions.read().map_err(|_| DocumentError::LockError)?;
        let deal_index = self.deal_index.read().map_err(|_| DocumentError::LockError)?;
        Ok(deal_index
            .get(&(deal_id.clone(), document_type))
            .map(|ids| ids.iter().filter_map(|id| versions.get(id)).cloned().collect())
            .unwrap_or_default())
    }

    pub fn latest_version(
        &self,
        deal_id: &DealId,
        document_type: DocumentType,
    ) -> DocumentResult<Option<DocumentVersion>> {
        Ok(self.list_versions(deal_id, document_type)?.pop())
    }

    /// Document types that have at least one version for the deal.
    pub fn types_present(&self, deal_id: &DealId) -> DocumentResult<BTreeSet<DocumentType>> {
        let deal_index = self.deal_index.read().map_err(|_| DocumentError::LockError)?;
        Ok(deal_index
            .keys()
            .filter(|(d, _)| d == deal_id)
            .map(|(_, t)| *t)
            .collect())
    }

    /// Document types with a version at EXECUTED or beyond.
    pub fn types_executed(&self, deal_id: &DealId) -> DocumentResult<BTreeSet<DocumentType>> {
        let versions = self.versions.read().map_err(|_| DocumentError::LockError)?;
        Ok(versions
            .values()
            .filter(|v| v.deal_id == *deal_id && v.status >= DocumentStatus::Executed)
            .map(|v| v.document_type)
            .collect())
    }

    fn validate_provenance(
        provenance: &ProvenanceStore,
        claims: &ClaimQueue,
        version: &DocumentVersion,
    ) -> DocumentResult<()> {
        let field_paths: Vec<String> = version.provenance_map.keys().cloned().collect();
        provenance.build_field_provenance(claims, &version.deal_id, &field_paths)?;

        for (field_path, claim_id) in &version.provenance_map {
            let claim = claims.get(claim_id)?;
            if claim.status != ClaimStatus::Verified {
                return Err(DocumentError::UnverifiedClaim {
                    field_path: field_path.clone(),
                    claim_id: claim_id.clone(),
                });
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_draft(
        &self,
        ledger: &EventLedger,
        versions: &mut HashMap<DocumentVersionId, DocumentVersion>,
        deal_index: &mut HashMap<(DealId, DocumentType), Vec<DocumentVersionId>>,
        deal_id: &DealId,
        document_type: DocumentType,
        version: u32,
        content: ContentRef,
        provenance_map: BTreeMap<String, ClaimId>,
        parent_version_id: Option<DocumentVersionId>,
        actor: ActorContext,
    ) -> DocumentResult<DocumentVersion> {
        let version_id = DocumentVersionId::generate();

        ledger.append(
            deal_id,
            EventPayload::DocumentDrafted {
                version_id: version_id.clone(),
                document_type,
                version,
            },
            actor.clone(),
            Vec::new(),
        )?;

        let record = DocumentVersion {
            version_id: version_id.clone(),
            deal_id: deal_id.clone(),
            document_type,
            version,
            status: DocumentStatus::Draft,
            content_hash: content.content_hash,
            storage_key: content.storage_key,
            provenance_map,
            parent_version_id,
            watermark_text: Some(DRAFT_WATERMARK.to_string()),
            created_by: actor,
            created_at: Utc::now(),
            promoted_at: None,
        };

        deal_index
            .entry((deal_id.clone(), document_type))
            .or_default()
            .push(version_id.clone());
        versions.insert(version_id.clone(), record.clone());

        tracing::debug!(
            deal = %deal_id,
            document_type = %document_type,
            version,
            "draft created"
        );
        Ok(record)
    }
}

impl Default for DocumentVersionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use deal_types::{
        DocumentId, ExtractionClaim, ExtractionId, InputSource, Role, SourceLocator,
    };
    use serde_json::json;

    fn actor() -> ActorContext {
        ActorContext::new("u-1", "Dana Reyes", Role::analyst())
    }

    fn content(tag: &str) -> ContentRef {
        ContentRef {
            content_hash: ContentHash::digest(b"doc-test:", tag.as_bytes()),
            storage_key: format!("blobs/{}", tag),
        }
    }

    struct Fixture {
        manager: DocumentVersionManager,
        ledger: EventLedger,
        provenance: ProvenanceStore,
        claims: ClaimQueue,
        deal: DealId,
    }

    fn fixture() -> Fixture {
        Fixture {
            manager: DocumentVersionManager::new(),
            ledger: EventLedger::new(),
            provenance: ProvenanceStore::new(),
            claims: ClaimQueue::new(),
            deal: DealId::new("d-1"),
        }
    }

    /// Register + verify a claim and record the matching provenance input.
    fn provenanced_field(fx: &Fixture, field: &str, claim: &str) -> ClaimId {
        let claim_id = ClaimId::new(claim);
        fx.claims
            .register(
                &fx.ledger,
                ExtractionClaim {
                    claim_id: claim_id.clone(),
                    deal_id: fx.deal.clone(),
                    field_path: field.into(),
                    claimed_value: json!(42),
                    document_id: DocumentId::new("doc-1"),
                    document_name: "rent-roll.pdf".into(),
                    document_type: DocumentType::RentRoll,
                    locator: SourceLocator::Page(1),
                    text_snippet: "42".into(),
                    extraction_id: ExtractionId::new("x-1"),
                    ai_model: "extractor-v2".into(),
                    ai_confidence: 0.9,
                    status: deal_types::ClaimStatus::Pending,
                    verified_by: None,
                    verified_at: None,
                    corrected_value: None,
                    rejection_reason: None,
                    created_at: Utc::now(),
                },
                actor(),
            )
            .unwrap();
        fx.claims
            .verify(&fx.ledger, &claim_id, actor(), None)
            .unwrap();
        fx.provenance
            .record_input(
                &fx.deal,
                field,
                json!(42),
                InputSource::AiExtraction {
                    claim_id: claim_id.clone(),
                    document_id: DocumentId::new("doc-1"),
                    page_number: Some(1),
                },
                actor(),
            )
            .unwrap();
        claim_id
    }

    #[test]
    fn drafts_get_increasing_versions() {
        let fx = fixture();
        for expected in 1..=3u32 {
            let draft = fx
                .manager
                .create_draft(
                    &fx.ledger,
                    &fx.deal,
                    DocumentType::IcMemo,
                    content(&format!("v{}", expected)),
                    BTreeMap::new(),
                    None,
                    actor(),
                )
                .unwrap();
            assert_eq!(draft.version, expected);
            assert_eq!(draft.status, DocumentStatus::Draft);
            assert_eq!(draft.watermark_text.as_deref(), Some(DRAFT_WATERMARK));
        }
    }

    #[test]
    fn stale_explicit_version_fails_fast() {
        let fx = fixture();
        fx.manager
            .create_draft_at(
                &fx.ledger,
                &fx.deal,
                DocumentType::IcMemo,
                1,
                content("a"),
                BTreeMap::new(),
                None,
                actor(),
            )
            .unwrap();

        // Second writer raced on the same pair with the same stale read
        let err = fx
            .manager
            .create_draft_at(
                &fx.ledger,
                &fx.deal,
                DocumentType::IcMemo,
                1,
                content("b"),
                BTreeMap::new(),
                None,
                actor(),
            )
            .unwrap_err();
        assert!(matches!(err, DocumentError::DuplicateVersion { version: 1, .. }));
    }

    #[test]
    fn promotion_walks_one_step_and_clears_watermark() {
        let fx = fixture();
        let claim_id = provenanced_field(&fx, "income.gpr", "c-1");
        let mut map = BTreeMap::new();
        map.insert("income.gpr".to_string(), claim_id);

        let draft = fx
            .manager
            .create_draft(
                &fx.ledger,
                &fx.deal,
                DocumentType::IcMemo,
                content("v1"),
                map,
                None,
                actor(),
            )
            .unwrap();

        // Skipping straight to EFFECTIVE is illegal
        let err = fx
            .manager
            .promote(
                &fx.ledger,
                &fx.provenance,
                &fx.claims,
                &draft.version_id,
                DocumentStatus::Effective,
                actor(),
            )
            .unwrap_err();
        assert!(matches!(err, DocumentError::IllegalPromotion { .. }));

        let binding = fx
            .manager
            .promote(
                &fx.ledger,
                &fx.provenance,
                &fx.claims,
                &draft.version_id,
                DocumentStatus::Binding,
                actor(),
            )
            .unwrap();
        assert_eq!(binding.status, DocumentStatus::Binding);
        assert_eq!(binding.watermark_text, None);

        // No regression
        let err = fx
            .manager
            .promote(
                &fx.ledger,
                &fx.provenance,
                &fx.claims,
                &draft.version_id,
                DocumentStatus::Draft,
                actor(),
            )
            .unwrap_err();
        assert!(matches!(err, DocumentError::IllegalPromotion { .. }));

        fx.manager
            .promote(
                &fx.ledger,
                &fx.provenance,
                &fx.claims,
                &draft.version_id,
                DocumentStatus::Executed,
                actor(),
            )
            .unwrap();
        let effective = fx
            .manager
            .promote(
                &fx.ledger,
                &fx.provenance,
                &fx.claims,
                &draft.version_id,
                DocumentStatus::Effective,
                actor(),
            )
            .unwrap();
        assert_eq!(effective.status, DocumentStatus::Effective);
    }

    #[test]
    fn leaving_draft_requires_resolved_provenance() {
        let fx = fixture();
        let mut map = BTreeMap::new();
        map.insert("income.gpr".to_string(), ClaimId::new("c-none"));

        let draft = fx
            .manager
            .create_draft(
                &fx.ledger,
                &fx.deal,
                DocumentType::Psa,
                content("v1"),
                map,
                None,
                actor(),
            )
            .unwrap();

        let err = fx
            .manager
            .promote(
                &fx.ledger,
                &fx.provenance,
                &fx.claims,
                &draft.version_id,
                DocumentStatus::Binding,
                actor(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Provenance(ProvenanceError::MissingProvenance { .. })
        ));

        // Still a draft, watermark intact
        let unchanged = fx.manager.get(&draft.version_id).unwrap();
        assert_eq!(unchanged.status, DocumentStatus::Draft);
        assert!(unchanged.watermark_text.is_some());
    }

    #[test]
    fn finalize_carries_field_provenance_trail() {
        let fx = fixture();
        let claim_id = provenanced_field(&fx, "income.gpr", "c-1");
        let mut map = BTreeMap::new();
        map.insert("income.gpr".to_string(), claim_id.clone());

        let draft = fx
            .manager
            .create_draft(
                &fx.ledger,
                &fx.deal,
                DocumentType::IcMemo,
                content("v1"),
                map,
                None,
                actor(),
            )
            .unwrap();

        let generated = fx
            .manager
            .finalize(&fx.provenance, &fx.claims, &draft.version_id)
            .unwrap();
        assert_eq!(generated.field_provenance.len(), 1);
        assert_eq!(generated.field_provenance[0].claim_id, claim_id);
        assert_eq!(generated.field_provenance[0].document_source, "rent-roll.pdf");
    }

    #[test]
    fn revision_chain_is_informational() {
        let fx = fixture();
        let v1 = fx
            .manager
            .create_draft(
                &fx.ledger,
                &fx.deal,
                DocumentType::Loi,
                content("v1"),
                BTreeMap::new(),
                None,
                actor(),
            )
            .unwrap();
        let v2 = fx
            .manager
            .create_draft(
                &fx.ledger,
                &fx.deal,
                DocumentType::Loi,
                content("v2"),
                BTreeMap::new(),
                Some(v1.version_id.clone()),
                actor(),
            )
            .unwrap();
        assert_eq!(v2.parent_version_id, Some(v1.version_id));
        assert_eq!(v2.version, 2);
    }

    #[test]
    fn latest_version_tracks_the_newest_draft() {
        let fx = fixture();
        assert!(fx
            .manager
            .latest_version(&fx.deal, DocumentType::Loi)
            .unwrap()
            .is_none());

        for tag in ["v1", "v2"] {
            fx.manager
                .create_draft(
                    &fx.ledger,
                    &fx.deal,
                    DocumentType::Loi,
                    content(tag),
                    BTreeMap::new(),
                    None,
                    actor(),
                )
                .unwrap();
        }
        let latest = fx
            .manager
            .latest_version(&fx.deal, DocumentType::Loi)
            .unwrap()
            .unwrap();
        assert_eq!(latest.version, 2);
    }

    #[test]
    fn type_queries_reflect_status() {
        let fx = fixture();
        let claim_id = provenanced_field(&fx, "f", "c-1");
        let mut map = BTreeMap::new();
        map.insert("f".to_string(), claim_id);

        let draft = fx
            .manager
            .create_draft(
                &fx.ledger,
                &fx.deal,
                DocumentType::Psa,
                content("v1"),
                map,
                None,
                actor(),
            )
            .unwrap();
        assert!(fx
            .manager
            .types_present(&fx.deal)
            .unwrap()
            .contains(&DocumentType::Psa));
        assert!(fx.manager.types_executed(&fx.deal).unwrap().is_empty());

        for status in [DocumentStatus::Binding, DocumentStatus::Executed] {
            fx.manager
                .promote(
                    &fx.ledger,
                    &fx.provenance,
                    &fx.claims,
                    &draft.version_id,
                    status,
                    actor(),
                )
                .unwrap();
        }
        assert!(fx
            .manager
            .types_executed(&fx.deal)
            .unwrap()
            .contains(&DocumentType::Psa));
    }
}
