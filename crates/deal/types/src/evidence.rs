//! Evidence packs: immutable, integrity-checked export bundles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActorContext, ContentHash, DealId, DealState, EvidencePackId};

/// What audience the pack is assembled for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackType {
    IcSubmission,
    LenderPackage,
    ClosingBinder,
    FullAudit,
}

impl std::fmt::Display for PackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PackType::IcSubmission => "IC_SUBMISSION",
            PackType::LenderPackage => "LENDER_PACKAGE",
            PackType::ClosingBinder => "CLOSING_BINDER",
            PackType::FullAudit => "FULL_AUDIT",
        };
        write!(f, "{}", name)
    }
}

/// One file referenced by a pack manifest
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub content_hash: ContentHash,
    pub storage_key: String,
}

/// File list and counts for everything the pack covers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackManifest {
    pub entries: Vec<ManifestEntry>,
    pub event_count: usize,
    pub claim_count: usize,
    pub document_count: usize,
}

/// Outcome of pack-time validation. `Invalid` is terminal for the pack;
/// callers regenerate rather than retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    Pending,
}

/// An exported bundle for a deal at a point in time. Immutable once
/// generated; regenerating produces a new pack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvidencePack {
    pub pack_id: EvidencePackId,
    pub deal_id: DealId,
    pub pack_type: PackType,
    pub manifest: PackManifest,
    /// BLAKE3 over the canonical manifest JSON
    pub content_hash: ContentHash,
    pub deal_state_snapshot: DealState,
    pub validation_status: ValidationStatus,
    pub generated_by: ActorContext,
    pub generated_at: DateTime<Utc>,
}
