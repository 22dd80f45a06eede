//! Service-level errors, wrapping each component's error type.

use thiserror::Error;

use deal_claims::ClaimError;
use deal_documents::DocumentError;
use deal_evidence::EvidenceError;
use deal_ledger::LedgerError;
use deal_lifecycle::LifecycleError;
use deal_provenance::ProvenanceError;
use deal_types::DealId;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The deal's event chain failed verification. Mutation stays
    /// refused until a manual audit clears the flag.
    #[error("hash chain mismatch on deal {deal_id} at sequence {broken_at:?}; deal is frozen pending audit")]
    HashChainMismatch {
        deal_id: DealId,
        broken_at: Option<u64>,
    },

    #[error("deal not found: {0}")]
    DealNotFound(DealId),

    #[error("no open conflict matching '{0}'")]
    ConflictNotFound(String),

    #[error("no diligence item named '{0}'")]
    DiligenceItemNotFound(String),

    #[error("ledger append abandoned after {0} conflicting attempt(s)")]
    AppendRetriesExhausted(u32),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error(transparent)]
    Provenance(#[from] ProvenanceError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Evidence(#[from] EvidenceError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("lock error")]
    LockError,
}

pub type ServiceResult<T> = Result<T, ServiceError>;
