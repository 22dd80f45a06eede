//! Deal Event Ledger - append-only, per-deal ordered, hash-chained.
//!
//! The ledger is the single source of truth for "what happened" to a
//! deal. Every other component expresses its writes as ledger appends;
//! nothing in the core writes around it. Each event commits to the hash
//! of its predecessor, so the chain for a deal verifies end-to-end and
//! tampering with any stored event is detectable.

#![deny(unsafe_code)]

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use deal_types::{ActorContext, AuthorityRecord, DealEvent, DealId, EventKind, EventPayload};

/// Result of walking a deal's chain and recomputing every hash and link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub valid: bool,
    /// Sequence number of the first event that failed verification
    pub broken_at_sequence: Option<u64>,
    pub events_checked: usize,
}

impl IntegrityReport {
    fn valid(events_checked: usize) -> Self {
        Self {
            valid: true,
            broken_at_sequence: None,
            events_checked,
        }
    }

    fn broken_at(sequence: u64, events_checked: usize) -> Self {
        Self {
            valid: false,
            broken_at_sequence: Some(sequence),
            events_checked,
        }
    }
}

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Another writer advanced the chain first; retry with a fresh tail.
    #[error("concurrent append conflict on deal {deal_id}: expected tail {expected}, found {actual}")]
    ConcurrentAppendConflict {
        deal_id: DealId,
        expected: u64,
        actual: u64,
    },

    #[error("ledger already holds events for deal {0}")]
    AlreadyLoaded(DealId),

    #[error("lock error")]
    LockError,
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Append-only, per-deal ordered event log.
///
/// Appends are serialized by the internal write lock; the optimistic
/// [`EventLedger::append_after`] form additionally fails fast when the
/// caller's view of the chain tail is stale, so read-validate-write
/// callers never append onto state they have not seen.
pub struct EventLedger {
    chains: RwLock<HashMap<DealId, Vec<DealEvent>>>,
}

impl EventLedger {
    pub fn new() -> Self {
        Self {
            chains: RwLock::new(HashMap::new()),
        }
    }

    /// Append the next event to a deal's chain, computing its sequence
    /// number and chained hash from the current tail.
    pub fn append(
        &self,
        deal_id: &DealId,
        payload: EventPayload,
        actor: ActorContext,
        authority_context: Vec<AuthorityRecord>,
    ) -> LedgerResult<DealEvent> {
        let mut chains = self.chains.write().map_err(|_| LedgerError::LockError)?;
        let chain = chains.entry(deal_id.clone()).or_default();
        Ok(Self::push_next(chain, deal_id, payload, actor, authority_context))
    }

    /// Append only if the chain tail is still at `expected_tail`
    /// (0 for an empty chain). Fails with `ConcurrentAppendConflict` when
    /// another writer advanced the sequence first.
    pub fn append_after(
        &self,
        deal_id: &DealId,
        expected_tail: u64,
        payload: EventPayload,
        actor: ActorContext,
        authority_context: Vec<AuthorityRecord>,
    ) -> LedgerResult<DealEvent> {
        let mut chains = self.chains.write().map_err(|_| LedgerError::LockError)?;
        let chain = chains.entry(deal_id.clone()).or_default();
        let actual = chain.last().map(|e| e.sequence_number).unwrap_or(0);
        if actual != expected_tail {
            return Err(LedgerError::ConcurrentAppendConflict {
                deal_id: deal_id.clone(),
                expected: expected_tail,
                actual,
            });
        }
        Ok(Self::push_next(chain, deal_id, payload, actor, authority_context))
    }

    /// Sequence number of the last event for a deal; 0 if none.
    pub fn tail_sequence(&self, deal_id: &DealId) -> LedgerResult<u64> {
        let chains = self.chains.read().map_err(|_| LedgerError::LockError)?;
        Ok(chains
            .get(deal_id)
            .and_then(|c| c.last())
            .map(|e| e.sequence_number)
            .unwrap_or(0))
    }

    /// All events for a deal in sequence order. Replayable any number of
    /// times; an unknown deal yields an empty list.
    pub fn list(&self, deal_id: &DealId) -> LedgerResult<Vec<DealEvent>> {
        let chains = self.chains.read().map_err(|_| LedgerError::LockError)?;
        Ok(chains.get(deal_id).cloned().unwrap_or_default())
    }

    /// Events of one kind for a deal, in sequence order.
    pub fn list_of_kind(&self, deal_id: &DealId, kind: EventKind) -> LedgerResult<Vec<DealEvent>> {
        let chains = self.chains.read().map_err(|_| LedgerError::LockError)?;
        Ok(chains
            .get(deal_id)
            .map(|chain| {
                chain
                    .iter()
                    .filter(|e| e.payload.kind() == kind)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Walk the chain for a deal, recomputing every event hash and
    /// checking every link and sequence number. An empty chain is
    /// trivially valid.
    pub fn verify_integrity(&self, deal_id: &DealId) -> LedgerResult<IntegrityReport> {
        let chains = self.chains.read().map_err(|_| LedgerError::LockError)?;
        let chain = match chains.get(deal_id) {
            Some(chain) => chain,
            None => return Ok(IntegrityReport::valid(0)),
        };

        let mut prev: Option<&DealEvent> = None;
        for event in chain.iter() {
            if !event.verify_integrity() || !event.chains_from(prev) {
                tracing::warn!(
                    deal = %deal_id,
                    sequence = event.sequence_number,
                    "ledger chain broken"
                );
                return Ok(IntegrityReport::broken_at(
                    event.sequence_number,
                    chain.len(),
                ));
            }
            prev = Some(event);
        }
        Ok(IntegrityReport::valid(chain.len()))
    }

    /// Rehydrate a deal's chain from persisted events, e.g. at startup.
    /// The events are stored as given; run [`EventLedger::verify_integrity`]
    /// afterwards to audit what was loaded.
    pub fn load(&self, deal_id: &DealId, events: Vec<DealEvent>) -> LedgerResult<()> {
        let mut chains = self.chains.write().map_err(|_| LedgerError::LockError)?;
        if chains.get(deal_id).map(|c| !c.is_empty()).unwrap_or(false) {
            return Err(LedgerError::AlreadyLoaded(deal_id.clone()));
        }
        chains.insert(deal_id.clone(), events);
        Ok(())
    }

    fn push_next(
        chain: &mut Vec<DealEvent>,
        deal_id: &DealId,
        payload: EventPayload,
        actor: ActorContext,
        authority_context: Vec<AuthorityRecord>,
    ) -> DealEvent {
        let sequence_number = chain.last().map(|e| e.sequence_number).unwrap_or(0) + 1;
        let previous_hash = chain.last().map(|e| e.event_hash);
        let event = DealEvent::next_in_chain(
            deal_id.clone(),
            sequence_number,
            previous_hash,
            payload,
            actor,
            authority_context,
        );
        tracing::debug!(
            deal = %deal_id,
            sequence = sequence_number,
            kind = ?event.payload.kind(),
            actor = %event.actor.actor_id,
            "event appended"
        );
        chain.push(event.clone());
        event
    }
}

impl Default for EventLedger {
    fn default() -> Self {
        Self::new()
    }
}
