//! Evidence pack generation.
//!
//! A pack is a point-in-time export bundle for a deal: a manifest of the
//! documents an audience receives, counts of the events and claims it
//! covers, and a BLAKE3 hash over the canonical manifest JSON. Packs are
//! immutable once generated. Regenerating after the deal moves on
//! produces a new pack; the old one stays verifiable forever.

#![deny(unsafe_code)]

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use thiserror::Error;

use deal_types::{
    ActorContext, ContentHash, DealEvent, DealId, DealState, DocumentType, DocumentVersion,
    EvidencePack, EvidencePackId, ExtractionClaim, ManifestEntry, PackManifest, PackType,
    ValidationStatus,
};

/// Domain-separation prefix for pack hashing
const PACK_HASH_DOMAIN: &[u8] = b"deal-pack-v1:";

#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("evidence pack not found: {0}")]
    PackNotFound(EvidencePackId),

    #[error("manifest serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("lock error")]
    LockError,
}

pub type EvidenceResult<T> = Result<T, EvidenceError>;

/// Document types each audience receives. `None` means everything on
/// file, which is what a full audit gets.
fn included_types(pack_type: PackType) -> Option<&'static [DocumentType]> {
    match pack_type {
        PackType::IcSubmission => Some(&[
            DocumentType::IcMemo,
            DocumentType::UnderwritingModel,
            DocumentType::OfferingMemorandum,
        ]),
        PackType::LenderPackage => Some(&[
            DocumentType::UnderwritingModel,
            DocumentType::RentRoll,
            DocumentType::OperatingStatement,
            DocumentType::TrailingTwelve,
            DocumentType::Psa,
        ]),
        PackType::ClosingBinder => Some(&[
            DocumentType::Psa,
            DocumentType::LoanCommitment,
            DocumentType::ClosingStatement,
        ]),
        PackType::FullAudit => None,
    }
}

/// Builds and retains evidence packs.
pub struct EvidencePackBuilder {
    packs: RwLock<HashMap<EvidencePackId, EvidencePack>>,
    deal_index: RwLock<HashMap<DealId, Vec<EvidencePackId>>>,
}

impl EvidencePackBuilder {
    pub fn new() -> Self {
        Self {
            packs: RwLock::new(HashMap::new()),
            deal_index: RwLock::new(HashMap::new()),
        }
    }

    /// Assemble a pack from the deal's current materials.
    ///
    /// `events`, `claims`, and `documents` are the full sets for the deal
    /// at generation time; the pack type decides which documents enter
    /// the manifest. The pack validates as `Valid` only when the supplied
    /// event chain verifies end to end.
    pub fn generate(
        &self,
        deal_id: &DealId,
        pack_type: PackType,
        state: DealState,
        events: &[DealEvent],
        claims: &[ExtractionClaim],
        documents: &[DocumentVersion],
        generated_by: ActorContext,
    ) -> EvidenceResult<EvidencePack> {
        let entries: Vec<ManifestEntry> = documents
            .iter()
            .filter(|doc| match included_types(pack_type) {
                Some(types) => types.contains(&doc.document_type),
                None => true,
            })
            .map(|doc| ManifestEntry {
                name: format!("{}_v{}", doc.document_type, doc.version),
                content_hash: doc.content_hash,
                storage_key: doc.storage_key.clone(),
            })
            .collect();

        let manifest = PackManifest {
            document_count: entries.len(),
            entries,
            event_count: events.len(),
            claim_count: claims.len(),
        };

        let validation_status = if chain_verifies(events) {
            ValidationStatus::Valid
        } else {
            ValidationStatus::Invalid
        };

        let pack = EvidencePack {
            pack_id: EvidencePackId::generate(),
            deal_id: deal_id.clone(),
            pack_type,
            content_hash: manifest_hash(&manifest)?,
            manifest,
            deal_state_snapshot: state,
            validation_status,
            generated_by,
            generated_at: Utc::now(),
        };

        let mut packs = self.packs.write().map_err(|_| EvidenceError::LockError)?;
        let mut index = self
            .deal_index
            .write()
            .map_err(|_| EvidenceError::LockError)?;
        packs.insert(pack.pack_id.clone(), pack.clone());
        index.entry(deal_id.clone()).or_default().push(pack.pack_id.clone());

        tracing::info!(
            deal = %deal_id,
            pack = %pack.pack_id,
            pack_type = %pack_type,
            status = ?pack.validation_status,
            "evidence pack generated"
        );
        Ok(pack)
    }

    pub fn get(&self, pack_id: &EvidencePackId) -> EvidenceResult<EvidencePack> {
        let packs = self.packs.read().map_err(|_| EvidenceError::LockError)?;
        packs
            .get(pack_id)
            .cloned()
            .ok_or_else(|| EvidenceError::PackNotFound(pack_id.clone()))
    }

    /// Packs for a deal, in generation order.
    pub fn list_for_deal(&self, deal_id: &DealId) -> EvidenceResult<Vec<EvidencePack>> {
        let packs = self.packs.read().map_err(|_| EvidenceError::LockError)?;
        let index = self
            .deal_index
            .read()
            .map_err(|_| EvidenceError::LockError)?;
        Ok(index
            .get(deal_id)
            .map(|ids| ids.iter().filter_map(|id| packs.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    /// Recompute a stored pack's manifest hash and compare.
    pub fn verify(&self, pack_id: &EvidencePackId) -> EvidenceResult<bool> {
        let pack = self.get(pack_id)?;
        Ok(manifest_hash(&pack.manifest)? == pack.content_hash)
    }
}

impl Default for EvidencePackBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn manifest_hash(manifest: &PackManifest) -> EvidenceResult<ContentHash> {
    let bytes = serde_json::to_vec(manifest)?;
    Ok(ContentHash::digest(PACK_HASH_DOMAIN, &bytes))
}

fn chain_verifies(events: &[DealEvent]) -> bool {
    let mut prev: Option<&DealEvent> = None;
    for event in events {
        if !event.verify_integrity() || !event.chains_from(prev) {
            return false;
        }
        prev = Some(event);
    }
    true
}
