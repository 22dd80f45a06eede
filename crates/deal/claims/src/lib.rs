//! Claim Verification Queue - human review of AI-extracted field values.
//!
//! The extraction collaborator is untrusted: its claims influence nothing
//! downstream until a person verifies them. Claims are resolved exactly
//! once; a second resolution attempt is rejected, never silently
//! accepted, so callers detect double submission. Every resolution is
//! expressed as a ledger append before the claim's status flips, inside
//! one critical section, so the ledger and the queue never diverge.

#![deny(unsafe_code)]

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use thiserror::Error;

use deal_ledger::{EventLedger, LedgerError};
use deal_types::{
    ActorContext, ClaimId, ClaimStatus, DealId, EventPayload, ExtractionClaim,
};

/// Claim queue errors
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("claim not found: {0}")]
    ClaimNotFound(ClaimId),

    #[error("claim {claim_id} already resolved as {status:?}")]
    ClaimAlreadyResolved {
        claim_id: ClaimId,
        status: ClaimStatus,
    },

    #[error("claim already registered: {0}")]
    DuplicateClaim(ClaimId),

    #[error("confidence {0} outside [0, 1]")]
    InvalidConfidence(f64),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("lock error")]
    LockError,
}

pub type ClaimResult<T> = Result<T, ClaimError>;

/// Manages extraction claims awaiting confirmation or correction.
pub struct ClaimQueue {
    claims: RwLock<HashMap<ClaimId, ExtractionClaim>>,
    deal_index: RwLock<HashMap<DealId, Vec<ClaimId>>>,
}

impl ClaimQueue {
    pub fn new() -> Self {
        Self {
            claims: RwLock::new(HashMap::new()),
            deal_index: RwLock::new(HashMap::new()),
        }
    }

    /// Register a claim produced by the extraction collaborator. The
    /// claim enters the queue PENDING and a `ClaimRecorded` event is
    /// appended for it.
    pub fn register(
        &self,
        ledger: &EventLedger,
        mut claim: ExtractionClaim,
        actor: ActorContext,
    ) -> ClaimResult<ExtractionClaim> {
        if !(0.0..=1.0).contains(&claim.ai_confidence) {
            return Err(ClaimError::InvalidConfidence(claim.ai_confidence));
        }

        let mut claims = self.claims.write().map_err(|_| ClaimError::LockError)?;
        if claims.contains_key(&claim.claim_id) {
            return Err(ClaimError::DuplicateClaim(claim.claim_id));
        }

        // Whatever the producer sent, a claim starts unresolved.
        claim.status = ClaimStatus::Pending;
        claim.verified_by = None;
        claim.verified_at = None;

        ledger.append(
            &claim.deal_id,
            EventPayload::ClaimRecorded {
                claim_id: claim.claim_id.clone(),
                field_path: claim.field_path.clone(),
                document_id: claim.document_id.clone(),
                ai_confidence: claim.ai_confidence,
            },
            actor,
            Vec::new(),
        )?;

        let mut deal_index = self.deal_index.write().map_err(|_| ClaimError::LockError)?;
        deal_index
            .entry(claim.deal_id.clone())
            .or_default()
            .push(claim.claim_id.clone());
        claims.insert(claim.claim_id.clone(), claim.clone());

        tracing::debug!(
            deal = %claim.deal_id,
            claim = %claim.claim_id,
            field = %claim.field_path,
            confidence = claim.ai_confidence,
            "claim registered"
        );
        Ok(claim)
    }

    /// Pending claims for a deal, lowest AI confidence first so the
    /// least trustworthy extractions surface for review.
    pub fn list_pending(&self, deal_id: &DealId) -> ClaimResult<Vec<ExtractionClaim>> {
        let claims = self.claims.read().map_err(|_| ClaimError::LockError)?;
        let deal_index = self.deal_index.read().map_err(|_| ClaimError::LockError)?;

        let mut pending: Vec<ExtractionClaim> = deal_index
            .get(deal_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| claims.get(id))
                    .filter(|c| c.is_pending())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        pending.sort_by(|a, b| a.ai_confidence.total_cmp(&b.ai_confidence));
        Ok(pending)
    }

    pub fn get(&self, claim_id: &ClaimId) -> ClaimResult<ExtractionClaim> {
        let claims = self.claims.read().map_err(|_| ClaimError::LockError)?;
        claims
            .get(claim_id)
            .cloned()
            .ok_or_else(|| ClaimError::ClaimNotFound(claim_id.clone()))
    }

    /// Mark a claim VERIFIED, optionally recording a human correction.
    /// The original AI value is preserved for audit; downstream readers
    /// use [`ExtractionClaim::effective_value`].
    pub fn verify(
        &self,
        ledger: &EventLedger,
        claim_id: &ClaimId,
        actor: ActorContext,
        corrected_value: Option<serde_json::Value>,
    ) -> ClaimResult<ExtractionClaim> {
        let mut claims = self.claims.write().map_err(|_| ClaimError::LockError)?;
        let claim = claims
            .get_mut(claim_id)
            .ok_or_else(|| ClaimError::ClaimNotFound(claim_id.clone()))?;

        if !claim.is_pending() {
            return Err(ClaimError::ClaimAlreadyResolved {
                claim_id: claim_id.clone(),
                status: claim.status,
            });
        }

        let corrected = corrected_value.is_some();
        let value = corrected_value
            .clone()
            .unwrap_or_else(|| claim.claimed_value.clone());

        // Ledger first: a failed append leaves the claim untouched.
        ledger.append(
            &claim.deal_id,
            EventPayload::ClaimVerified {
                claim_id: claim_id.clone(),
                field_path: claim.field_path.clone(),
                value,
                corrected,
            },
            actor.clone(),
            Vec::new(),
        )?;

        claim.status = ClaimStatus::Verified;
        claim.verified_by = Some(actor);
        claim.verified_at = Some(Utc::now());
        claim.corrected_value = corrected_value;

        tracing::info!(
            deal = %claim.deal_id,
            claim = %claim_id,
            field = %claim.field_path,
            corrected,
            "claim verified"
        );
        Ok(claim.clone())
    }

    /// Mark a claim REJECTED with the reviewer's reason.
    pub fn reject(
        &self,
        ledger: &EventLedger,
        claim_id: &ClaimId,
        actor: ActorContext,
        reason: impl Into<String>,
    ) -> ClaimResult<ExtractionClaim> {
        let reason = reason.into();
        let mut claims = self.claims.write().map_err(|_| ClaimError::LockError)?;
        let claim = claims
            .get_mut(claim_id)
            .ok_or_else(|| ClaimError::ClaimNotFound(claim_id.clone()))?;

        if !claim.is_pending() {
            return Err(ClaimError::ClaimAlreadyResolved {
                claim_id: claim_id.clone(),
                status: claim.status,
            });
        }

        ledger.append(
            &claim.deal_id,
            EventPayload::ClaimRejected {
                claim_id: claim_id.clone(),
                reason: reason.clone(),
            },
            actor.clone(),
            Vec::new(),
        )?;

        claim.status = ClaimStatus::Rejected;
        claim.verified_by = Some(actor);
        claim.verified_at = Some(Utc::now());
        claim.rejection_reason = Some(reason);

        tracing::info!(
            deal = %claim.deal_id,
            claim = %claim_id,
            field = %claim.field_path,
            "claim rejected"
        );
        Ok(claim.clone())
    }

    /// True iff no claim for the deal is still PENDING. Consumed by the
    /// lifecycle engine's `allClaimsVerified` blocker check.
    pub fn all_claims_verified(&self, deal_id: &DealId) -> ClaimResult<bool> {
        Ok(self.pending_count(deal_id)? == 0)
    }

    /// Every claim for a deal regardless of status, in registration order.
    pub fn claims_for(&self, deal_id: &DealId) -> ClaimResult<Vec<ExtractionClaim>> {
        let claims = self.claims.read().map_err(|_| ClaimError::LockError)?;
        let deal_index = self.deal_index.read().map_err(|_| ClaimError::LockError)?;
        Ok(deal_index
            .get(deal_id)
            .map(|ids| ids.iter().filter_map(|id| claims.get(id)).cloned().collect())
            .unwrap_or_default())
    }

    pub fn pending_count(&self, deal_id: &DealId) -> ClaimResult<usize> {
        let claims = self.claims.read().map_err(|_| ClaimError::LockError)?;
        let deal_index = self.deal_index.read().map_err(|_| ClaimError::LockError)?;
        Ok(deal_index
            .get(deal_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| claims.get(id))
                    .filter(|c| c.is_pending())
                    .count()
            })
            .unwrap_or(0))
    }
}

impl Default for ClaimQueue {
    fn default() -> Self {
        Self::new()
    }
}
