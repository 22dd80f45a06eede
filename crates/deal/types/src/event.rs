//! Ledger events, the atomic unit of change for a deal.
//!
//! Events are immutable once created. Every event commits to its
//! predecessor's hash (BLAKE3) and carries a dense, strictly increasing
//! sequence number, so the chain for a deal verifies end-to-end and any
//! tampering with a stored event is detectable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    ActorContext, ApprovalDecision, ApprovalId, AuthorityRecord, ClaimId, ContentHash, DealId,
    DealStage, DocumentId, DocumentStatus, DocumentType, DocumentVersionId, EvidencePackId, Role,
};

/// Domain-separation prefix for event hashing
const EVENT_HASH_DOMAIN: &[u8] = b"deal-event-v1:";

/// Discriminant of an event payload, used for filtering and hashing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    DealCreated,
    SourceDocumentRegistered,
    StateTransition,
    ClaimRecorded,
    ClaimVerified,
    ClaimRejected,
    ApprovalGranted,
    DocumentDrafted,
    DocumentPromoted,
    EvidencePackGenerated,
    ConflictRecorded,
    ConflictResolved,
    DiligenceItemCompleted,
}

/// Event payloads, one closed variant per event kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    DealCreated {
        deal_name: String,
    },
    SourceDocumentRegistered {
        document_id: DocumentId,
        document_name: String,
        document_type: DocumentType,
        content_hash: ContentHash,
    },
    StateTransition {
        from: DealStage,
        to: DealStage,
        reason: Option<String>,
    },
    ClaimRecorded {
        claim_id: ClaimId,
        field_path: String,
        document_id: DocumentId,
        ai_confidence: f64,
    },
    ClaimVerified {
        claim_id: ClaimId,
        field_path: String,
        value: serde_json::Value,
        corrected: bool,
    },
    ClaimRejected {
        claim_id: ClaimId,
        reason: String,
    },
    ApprovalGranted {
        approval_id: ApprovalId,
        approver_role: Role,
        decision: ApprovalDecision,
    },
    DocumentDrafted {
        version_id: DocumentVersionId,
        document_type: DocumentType,
        version: u32,
    },
    DocumentPromoted {
        version_id: DocumentVersionId,
        document_type: DocumentType,
        from: DocumentStatus,
        to: DocumentStatus,
    },
    EvidencePackGenerated {
        pack_id: EvidencePackId,
        pack_type: String,
        content_hash: ContentHash,
    },
    ConflictRecorded {
        description: String,
    },
    ConflictResolved {
        description: String,
    },
    DiligenceItemCompleted {
        item: String,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::DealCreated { .. } => EventKind::DealCreated,
            EventPayload::SourceDocumentRegistered { .. } => EventKind::SourceDocumentRegistered,
            EventPayload::StateTransition { .. } => EventKind::StateTransition,
            EventPayload::ClaimRecorded { .. } => EventKind::ClaimRecorded,
            EventPayload::ClaimVerified { .. } => EventKind::ClaimVerified,
            EventPayload::ClaimRejected { .. } => EventKind::ClaimRejected,
            EventPayload::ApprovalGranted { .. } => EventKind::ApprovalGranted,
            EventPayload::DocumentDrafted { .. } => EventKind::DocumentDrafted,
            EventPayload::DocumentPromoted { .. } => EventKind::DocumentPromoted,
            EventPayload::EvidencePackGenerated { .. } => EventKind::EvidencePackGenerated,
            EventPayload::ConflictRecorded { .. } => EventKind::ConflictRecorded,
            EventPayload::ConflictResolved { .. } => EventKind::ConflictResolved,
            EventPayload::DiligenceItemCompleted { .. } => EventKind::DiligenceItemCompleted,
        }
    }

    fn kind_byte(&self) -> u8 {
        match self.kind() {
            EventKind::DealCreated => 0,
            EventKind::SourceDocumentRegistered => 1,
            EventKind::StateTransition => 2,
            EventKind::ClaimRecorded => 3,
            EventKind::ClaimVerified => 4,
            EventKind::ClaimRejected => 5,
            EventKind::ApprovalGranted => 6,
            EventKind::DocumentDrafted => 7,
            EventKind::DocumentPromoted => 8,
            EventKind::EvidencePackGenerated => 9,
            EventKind::ConflictRecorded => 10,
            EventKind::ConflictResolved => 11,
            EventKind::DiligenceItemCompleted => 12,
        }
    }
}

/// One immutable entry in a deal's hash-chained ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DealEvent {
    pub deal_id: DealId,
    /// Dense per-deal sequence, starting at 1
    pub sequence_number: u64,
    pub payload: EventPayload,
    pub actor: ActorContext,
    /// Approvals considered at decision time; empty when none applied
    pub authority_context: Vec<AuthorityRecord>,
    pub recorded_at: DateTime<Utc>,
    /// Hash of the preceding event; `None` only for sequence 1
    pub previous_hash: Option<ContentHash>,
    /// BLAKE3 over (previous_hash, sequence, kind, payload, actor, time)
    pub event_hash: ContentHash,
}

impl DealEvent {
    /// Create the next event in a deal's chain and compute its hash.
    pub fn next_in_chain(
        deal_id: DealId,
        sequence_number: u64,
        previous_hash: Option<ContentHash>,
        payload: EventPayload,
        actor: ActorContext,
        authority_context: Vec<AuthorityRecord>,
    ) -> Self {
        let recorded_at = Utc::now();
        let event_hash = Self::compute_hash(
            previous_hash.as_ref(),
            sequence_number,
            &payload,
            &actor,
            recorded_at,
        );
        Self {
            deal_id,
            sequence_number,
            payload,
            actor,
            authority_context,
            recorded_at,
            previous_hash,
            event_hash,
        }
    }

    /// Recompute this event's hash and compare against the stored one.
    pub fn verify_integrity(&self) -> bool {
        let expected = Self::compute_hash(
            self.previous_hash.as_ref(),
            self.sequence_number,
            &self.payload,
            &self.actor,
            self.recorded_at,
        );
        self.event_hash == expected
    }

    /// Check the chain link back to the preceding event: sequence is
    /// dense and `previous_hash` matches. `prev` is `None` for the first
    /// event, which must carry sequence 1 and no previous hash.
    pub fn chains_from(&self, prev: Option<&DealEvent>) -> bool {
        match prev {
            None => self.sequence_number == 1 && self.previous_hash.is_none(),
            Some(prev) => {
                self.sequence_number == prev.sequence_number + 1
                    && self.previous_hash.as_ref() == Some(&prev.event_hash)
            }
        }
    }

    fn compute_hash(
        previous_hash: Option<&ContentHash>,
        sequence_number: u64,
        payload: &EventPayload,
        actor: &ActorContext,
        recorded_at: DateTime<Utc>,
    ) -> ContentHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(EVENT_HASH_DOMAIN);

        // Chain link: all zeros stands in for "no predecessor"
        match previous_hash {
            Some(hash) => hasher.update(hash.as_bytes()),
            None => hasher.update(&[0u8; 32]),
        };

        hasher.update(&sequence_number.to_le_bytes());
        hasher.update(&[payload.kind_byte()]);

        // Payload (canonical JSON bytes for deterministic hashing)
        if let Ok(payload_bytes) = serde_json::to_vec(payload) {
            hasher.update(&payload_bytes);
        }

        hasher.update(actor.actor_id.as_bytes());
        hasher.update(&recorded_at.timestamp_micros().to_le_bytes());

        ContentHash::from_bytes(*hasher.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn actor() -> ActorContext {
        ActorContext::new("u-1", "Dana Reyes", Role::analyst())
    }

    fn first_event() -> DealEvent {
        DealEvent::next_in_chain(
            DealId::new("d-1"),
            1,
            None,
            EventPayload::DealCreated {
                deal_name: "Maplewood Commons".into(),
            },
            actor(),
            Vec::new(),
        )
    }

    #[test]
    fn hash_verifies_after_creation() {
        let event = first_event();
        assert!(event.verify_integrity());
    }

    #[test]
    fn payload_tampering_is_detected() {
        let mut event = first_event();
        event.payload = EventPayload::DealCreated {
            deal_name: "Renamed".into(),
        };
        assert!(!event.verify_integrity());
    }

    #[test]
    fn chain_link_checks_sequence_and_hash() {
        let first = first_event();
        let second = DealEvent::next_in_chain(
            DealId::new("d-1"),
            2,
            Some(first.event_hash),
            EventPayload::ClaimVerified {
                claim_id: ClaimId::new("c-1"),
                field_path: "income.grossPotentialRent".into(),
                value: json!(2_450_000),
                corrected: false,
            },
            actor(),
            Vec::new(),
        );

        assert!(first.chains_from(None));
        assert!(second.chains_from(Some(&first)));
        assert!(!second.chains_from(None));

        // A re-written predecessor breaks the link
        let forged = DealEvent::next_in_chain(
            DealId::new("d-1"),
            1,
            None,
            EventPayload::DealCreated {
                deal_name: "Forged".into(),
            },
            actor(),
            Vec::new(),
        );
        assert!(!second.chains_from(Some(&forged)));
    }

    #[test]
    fn kind_matches_payload() {
        let event = first_event();
        assert_eq!(event.payload.kind(), EventKind::DealCreated);
    }
}
