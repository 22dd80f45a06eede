//! The deal service facade.
//!
//! One entry point over the core components. All mutation for a deal is
//! serialized through a per-deal lock taken here; reads go straight to
//! the committed stores. The service also owns the intake-side records
//! (source documents, conflicts, the diligence checklist) and assembles
//! the fact snapshot that blocker checks evaluate against.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;

use deal_claims::ClaimQueue;
use deal_documents::{ContentRef, DocumentVersionManager};
use deal_evidence::EvidencePackBuilder;
use deal_ledger::{EventLedger, IntegrityReport, LedgerError};
use deal_lifecycle::{ApprovalLog, LifecycleEngine};
use deal_provenance::ProvenanceStore;
use deal_types::{
    ActorContext, ApprovalRecord, ClaimId, DealEvent, DealId, DealSnapshot, DealStage, DealState,
    DiligenceChecklist, DiligenceItem, DocumentId, DocumentStatus, DocumentType, DocumentVersion,
    DocumentVersionId, EventPayload, EvidencePack, EvidencePackId, ExtractionClaim,
    FieldProvenance, GeneratedDocument, InputSource, PackType, SourceDocument, TransitionOption,
    UnderwritingInput, ValidationStatus,
};

use crate::{Notifier, NoopNotifier, ServiceConfig, ServiceError, ServiceResult};

/// Intake-side records the service keeps per deal.
#[derive(Default)]
struct DealIntake {
    source_documents: Vec<SourceDocument>,
    open_conflicts: Vec<String>,
    diligence: DiligenceChecklist,
    closing_docs_ready: bool,
}

/// Facade over the lifecycle core.
pub struct DealService {
    config: ServiceConfig,
    ledger: EventLedger,
    engine: LifecycleEngine,
    approvals: ApprovalLog,
    claims: ClaimQueue,
    provenance: ProvenanceStore,
    documents: DocumentVersionManager,
    evidence: EvidencePackBuilder,
    intake: RwLock<HashMap<DealId, DealIntake>>,
    /// Deals whose chain failed verification; mutation refused until cleared
    flagged: RwLock<HashSet<DealId>>,
    deal_locks: Mutex<HashMap<DealId, Arc<Mutex<()>>>>,
    notifier: Box<dyn Notifier>,
}

impl DealService {
    pub fn new() -> Self {
        Self::with_config(ServiceConfig::default())
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        Self {
            config,
            ledger: EventLedger::new(),
            engine: LifecycleEngine::new(),
            approvals: ApprovalLog::new(),
            claims: ClaimQueue::new(),
            provenance: ProvenanceStore::new(),
            documents: DocumentVersionManager::new(),
            evidence: EvidencePackBuilder::new(),
            intake: RwLock::new(HashMap::new()),
            flagged: RwLock::new(HashSet::new()),
            deal_locks: Mutex::new(HashMap::new()),
            notifier: Box::new(NoopNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    // ── Deal lifecycle ───────────────────────────────────────────────

    /// Create a deal at INTAKE_RECEIVED and return its fresh state.
    pub fn create_deal(
        &self,
        deal_name: impl Into<String>,
        actor: ActorContext,
    ) -> ServiceResult<DealState> {
        let deal_id = DealId::generate();
        let state = self
            .engine
            .create_deal(&self.ledger, &deal_id, deal_name, actor)?;
        let mut intake = self.intake.write().map_err(|_| ServiceError::LockError)?;
        intake.insert(deal_id, DealIntake::default());
        Ok(state)
    }

    pub fn get_state(&self, deal_id: &DealId) -> ServiceResult<DealState> {
        Ok(self.engine.get_state(deal_id)?)
    }

    pub fn get_events(&self, deal_id: &DealId) -> ServiceResult<Vec<DealEvent>> {
        Ok(self.ledger.list(deal_id)?)
    }

    /// Evaluate every forward edge out of the deal's current stage.
    pub fn get_available_transitions(
        &self,
        deal_id: &DealId,
    ) -> ServiceResult<Vec<TransitionOption>> {
        let snapshot = self.snapshot(deal_id)?;
        Ok(self
            .engine
            .available_transitions(&self.approvals, deal_id, &snapshot)?)
    }

    /// Advance the deal to `target`, re-validating all gates under the
    /// deal's lock against a snapshot assembled at commit time.
    pub fn transition(
        &self,
        deal_id: &DealId,
        target: DealStage,
        actor: ActorContext,
        reason: Option<String>,
    ) -> ServiceResult<DealState> {
        let lock = self.deal_lock(deal_id)?;
        let _guard = lock.lock().map_err(|_| ServiceError::LockError)?;
        self.ensure_not_flagged(deal_id)?;

        let snapshot = self.snapshot(deal_id)?;
        let state = self.engine.transition(
            &self.ledger,
            &self.approvals,
            deal_id,
            target,
            &snapshot,
            actor,
            reason,
        )?;
        self.notify_committed(deal_id);
        Ok(state)
    }

    pub fn hold(
        &self,
        deal_id: &DealId,
        actor: ActorContext,
        reason: impl Into<String>,
    ) -> ServiceResult<DealState> {
        let lock = self.deal_lock(deal_id)?;
        let _guard = lock.lock().map_err(|_| ServiceError::LockError)?;
        self.ensure_not_flagged(deal_id)?;
        let state = self.engine.hold(&self.ledger, deal_id, actor, reason)?;
        self.notify_committed(deal_id);
        Ok(state)
    }

    pub fn resume(&self, deal_id: &DealId, actor: ActorContext) -> ServiceResult<DealState> {
        let lock = self.deal_lock(deal_id)?;
        let _guard = lock.lock().map_err(|_| ServiceError::LockError)?;
        self.ensure_not_flagged(deal_id)?;
        let state = self.engine.resume(&self.ledger, deal_id, actor)?;
        self.notify_committed(deal_id);
        Ok(state)
    }

    pub fn kill(
        &self,
        deal_id: &DealId,
        actor: ActorContext,
        reason: impl Into<String>,
    ) -> ServiceResult<DealState> {
        let lock = self.deal_lock(deal_id)?;
        let _guard = lock.lock().map_err(|_| ServiceError::LockError)?;
        self.ensure_not_flagged(deal_id)?;
        let state = self.engine.kill(&self.ledger, deal_id, actor, reason)?;
        self.notify_committed(deal_id);
        Ok(state)
    }

    // ── Intake ───────────────────────────────────────────────────────

    /// Register an ingested data-room document.
    pub fn register_source_document(
        &self,
        deal_id: &DealId,
        name: impl Into<String>,
        document_type: DocumentType,
        content: ContentRef,
        actor: ActorContext,
    ) -> ServiceResult<SourceDocument> {
        let lock = self.deal_lock(deal_id)?;
        let _guard = lock.lock().map_err(|_| ServiceError::LockError)?;
        self.ensure_not_flagged(deal_id)?;

        let document = SourceDocument {
            document_id: DocumentId::generate(),
            deal_id: deal_id.clone(),
            name: name.into(),
            document_type,
            content_hash: content.content_hash,
            storage_key: content.storage_key,
            uploaded_by: actor.clone(),
            uploaded_at: Utc::now(),
        };

        // Unknown deals are rejected before anything reaches the ledger
        let mut intake = self.intake.write().map_err(|_| ServiceError::LockError)?;
        let record = intake
            .get_mut(deal_id)
            .ok_or_else(|| ServiceError::DealNotFound(deal_id.clone()))?;

        self.append_with_retry(
            deal_id,
            EventPayload::SourceDocumentRegistered {
                document_id: document.document_id.clone(),
                document_name: document.name.clone(),
                document_type,
                content_hash: document.content_hash,
            },
            actor,
        )?;
        record.source_documents.push(document.clone());
        Ok(document)
    }

    pub fn list_source_documents(&self, deal_id: &DealId) -> ServiceResult<Vec<SourceDocument>> {
        let intake = self.intake.read().map_err(|_| ServiceError::LockError)?;
        Ok(intake
            .get(deal_id)
            .map(|record| record.source_documents.clone())
            .unwrap_or_default())
    }

    // ── Claims ───────────────────────────────────────────────────────

    /// Accept a claim from the extraction collaborator. It enters the
    /// review queue PENDING regardless of confidence.
    pub fn record_extraction_claim(
        &self,
        claim: ExtractionClaim,
        actor: ActorContext,
    ) -> ServiceResult<ExtractionClaim> {
        let deal_id = claim.deal_id.clone();
        let lock = self.deal_lock(&deal_id)?;
        let _guard = lock.lock().map_err(|_| ServiceError::LockError)?;
        self.ensure_not_flagged(&deal_id)?;
        self.engine.get_state(&deal_id)?;
        Ok(self.claims.register(&self.ledger, claim, actor)?)
    }

    /// Pending claims for review, least confident first.
    pub fn list_pending_claims(&self, deal_id: &DealId) -> ServiceResult<Vec<ExtractionClaim>> {
        Ok(self.claims.list_pending(deal_id)?)
    }

    pub fn verify_claim(
        &self,
        claim_id: &ClaimId,
        actor: ActorContext,
        corrected_value: Option<serde_json::Value>,
    ) -> ServiceResult<ExtractionClaim> {
        let deal_id = self.claims.get(claim_id)?.deal_id;
        let lock = self.deal_lock(&deal_id)?;
        let _guard = lock.lock().map_err(|_| ServiceError::LockError)?;
        self.ensure_not_flagged(&deal_id)?;

        let claim = self
            .claims
            .verify(&self.ledger, claim_id, actor.clone(), corrected_value)?;

        // A verified claim becomes eligible provenance for underwriting.
        self.provenance.record_input(
            &deal_id,
            claim.field_path.clone(),
            claim.effective_value().clone(),
            InputSource::AiExtraction {
                claim_id: claim_id.clone(),
                document_id: claim.document_id.clone(),
                page_number: claim.locator.page_number(),
            },
            actor,
        )?;
        self.notify_committed(&deal_id);
        Ok(claim)
    }

    pub fn reject_claim(
        &self,
        claim_id: &ClaimId,
        actor: ActorContext,
        reason: impl Into<String>,
    ) -> ServiceResult<ExtractionClaim> {
        let deal_id = self.claims.get(claim_id)?.deal_id;
        let lock = self.deal_lock(&deal_id)?;
        let _guard = lock.lock().map_err(|_| ServiceError::LockError)?;
        self.ensure_not_flagged(&deal_id)?;
        let claim = self.claims.reject(&self.ledger, claim_id, actor, reason)?;
        self.notify_committed(&deal_id);
        Ok(claim)
    }

    // ── Provenance ───────────────────────────────────────────────────

    pub fn record_underwriting_input(
        &self,
        deal_id: &DealId,
        field_path: impl Into<String>,
        value: serde_json::Value,
        source: InputSource,
        actor: ActorContext,
    ) -> ServiceResult<UnderwritingInput> {
        let lock = self.deal_lock(deal_id)?;
        let _guard = lock.lock().map_err(|_| ServiceError::LockError)?;
        self.ensure_not_flagged(deal_id)?;
        Ok(self
            .provenance
            .record_input(deal_id, field_path, value, source, actor)?)
    }

    /// Full input history for a field, most recent first.
    pub fn get_field_history(
        &self,
        deal_id: &DealId,
        field_path: &str,
    ) -> ServiceResult<Vec<UnderwritingInput>> {
        Ok(self.provenance.get_history(deal_id, field_path)?)
    }

    // ── Documents ────────────────────────────────────────────────────

    pub fn create_document_draft(
        &self,
        deal_id: &DealId,
        document_type: DocumentType,
        content: ContentRef,
        provenance_map: BTreeMap<String, ClaimId>,
        parent_version_id: Option<DocumentVersionId>,
        actor: ActorContext,
    ) -> ServiceResult<DocumentVersion> {
        let lock = self.deal_lock(deal_id)?;
        let _guard = lock.lock().map_err(|_| ServiceError::LockError)?;
        self.ensure_not_flagged(deal_id)?;
        let version = self.documents.create_draft(
            &self.ledger,
            deal_id,
            document_type,
            content,
            provenance_map,
            parent_version_id,
            actor,
        )?;
        self.notify_committed(deal_id);
        Ok(version)
    }

    pub fn promote_document(
        &self,
        version_id: &DocumentVersionId,
        to_status: DocumentStatus,
        actor: ActorContext,
    ) -> ServiceResult<DocumentVersion> {
        let deal_id = self.documents.get(version_id)?.deal_id;
        let lock = self.deal_lock(&deal_id)?;
        let _guard = lock.lock().map_err(|_| ServiceError::LockError)?;
        self.ensure_not_flagged(&deal_id)?;
        let version = self.documents.promote(
            &self.ledger,
            &self.provenance,
            &self.claims,
            version_id,
            to_status,
            actor,
        )?;
        self.notify_committed(&deal_id);
        Ok(version)
    }

    pub fn finalize_document(
        &self,
        version_id: &DocumentVersionId,
    ) -> ServiceResult<GeneratedDocument> {
        Ok(self
            .documents
            .finalize(&self.provenance, &self.claims, version_id)?)
    }

    pub fn get_document(&self, version_id: &DocumentVersionId) -> ServiceResult<DocumentVersion> {
        Ok(self.documents.get(version_id)?)
    }

    pub fn list_document_versions(
        &self,
        deal_id: &DealId,
        document_type: DocumentType,
    ) -> ServiceResult<Vec<DocumentVersion>> {
        Ok(self.documents.list_versions(deal_id, document_type)?)
    }

    /// Highest-numbered version for `(deal, document type)`, if any.
    pub fn latest_document_version(
        &self,
        deal_id: &DealId,
        document_type: DocumentType,
    ) -> ServiceResult<Option<DocumentVersion>> {
        Ok(self.documents.latest_version(deal_id, document_type)?)
    }

    pub fn document_provenance(
        &self,
        version_id: &DocumentVersionId,
    ) -> ServiceResult<Vec<FieldProvenance>> {
        Ok(self.finalize_document(version_id)?.field_provenance)
    }

    // ── Approvals ────────────────────────────────────────────────────

    pub fn record_approval(
        &self,
        record: ApprovalRecord,
        recorded_by: ActorContext,
    ) -> ServiceResult<ApprovalRecord> {
        let deal_id = record.deal_id.clone();
        let lock = self.deal_lock(&deal_id)?;
        let _guard = lock.lock().map_err(|_| ServiceError::LockError)?;
        self.ensure_not_flagged(&deal_id)?;
        self.engine.get_state(&deal_id)?;
        let record = self.approvals.record(&self.ledger, record, recorded_by)?;
        self.notify_committed(&deal_id);
        Ok(record)
    }

    pub fn list_approvals(&self, deal_id: &DealId) -> ServiceResult<Vec<ApprovalRecord>> {
        Ok(self.approvals.records_for(deal_id)?)
    }

    // ── Conflicts and diligence ──────────────────────────────────────

    /// Flag a data conflict on the deal. Open conflicts block the
    /// transitions gated on `noOpenConflicts`.
    pub fn record_conflict(
        &self,
        deal_id: &DealId,
        description: impl Into<String>,
        actor: ActorContext,
    ) -> ServiceResult<()> {
        let description = description.into();
        let lock = self.deal_lock(deal_id)?;
        let _guard = lock.lock().map_err(|_| ServiceError::LockError)?;
        self.ensure_not_flagged(deal_id)?;

        // Unknown deals are rejected before anything reaches the ledger
        let mut intake = self.intake.write().map_err(|_| ServiceError::LockError)?;
        let record = intake
            .get_mut(deal_id)
            .ok_or_else(|| ServiceError::DealNotFound(deal_id.clone()))?;

        self.append_with_retry(
            deal_id,
            EventPayload::ConflictRecorded {
                description: description.clone(),
            },
            actor,
        )?;
        record.open_conflicts.push(description);
        Ok(())
    }

    pub fn resolve_conflict(
        &self,
        deal_id: &DealId,
        description: &str,
        actor: ActorContext,
    ) -> ServiceResult<()> {
        let lock = self.deal_lock(deal_id)?;
        let _guard = lock.lock().map_err(|_| ServiceError::LockError)?;
        self.ensure_not_flagged(deal_id)?;

        let mut intake = self.intake.write().map_err(|_| ServiceError::LockError)?;
        let record = intake
            .get_mut(deal_id)
            .ok_or_else(|| ServiceError::DealNotFound(deal_id.clone()))?;
        let position = record
            .open_conflicts
            .iter()
            .position(|c| c == description)
            .ok_or_else(|| ServiceError::ConflictNotFound(description.to_string()))?;

        // Append first; a failed append leaves the conflict open.
        self.append_with_retry(
            deal_id,
            EventPayload::ConflictResolved {
                description: description.to_string(),
            },
            actor,
        )?;
        record.open_conflicts.remove(position);
        Ok(())
    }

    pub fn add_diligence_item(
        &self,
        deal_id: &DealId,
        name: impl Into<String>,
    ) -> ServiceResult<()> {
        let lock = self.deal_lock(deal_id)?;
        let _guard = lock.lock().map_err(|_| ServiceError::LockError)?;
        let mut intake = self.intake.write().map_err(|_| ServiceError::LockError)?;
        intake
            .get_mut(deal_id)
            .ok_or_else(|| ServiceError::DealNotFound(deal_id.clone()))?
            .diligence
            .items
            .push(DiligenceItem::open(name));
        Ok(())
    }

    pub fn complete_diligence_item(
        &self,
        deal_id: &DealId,
        name: &str,
        actor: ActorContext,
    ) -> ServiceResult<()> {
        let lock = self.deal_lock(deal_id)?;
        let _guard = lock.lock().map_err(|_| ServiceError::LockError)?;
        self.ensure_not_flagged(deal_id)?;

        let mut intake = self.intake.write().map_err(|_| ServiceError::LockError)?;
        let record = intake
            .get_mut(deal_id)
            .ok_or_else(|| ServiceError::DealNotFound(deal_id.clone()))?;
        let item = record
            .diligence
            .items
            .iter_mut()
            .find(|item| item.name == name && !item.complete)
            .ok_or_else(|| ServiceError::DiligenceItemNotFound(name.to_string()))?;

        self.append_with_retry(
            deal_id,
            EventPayload::DiligenceItemCompleted {
                item: name.to_string(),
            },
            actor.clone(),
        )?;
        item.complete = true;
        item.completed_by = Some(actor);
        item.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn diligence_checklist(&self, deal_id: &DealId) -> ServiceResult<DiligenceChecklist> {
        let intake = self.intake.read().map_err(|_| ServiceError::LockError)?;
        intake
            .get(deal_id)
            .map(|record| record.diligence.clone())
            .ok_or_else(|| ServiceError::DealNotFound(deal_id.clone()))
    }

    pub fn set_closing_docs_ready(&self, deal_id: &DealId, ready: bool) -> ServiceResult<()> {
        let lock = self.deal_lock(deal_id)?;
        let _guard = lock.lock().map_err(|_| ServiceError::LockError)?;
        let mut intake = self.intake.write().map_err(|_| ServiceError::LockError)?;
        intake
            .get_mut(deal_id)
            .ok_or_else(|| ServiceError::DealNotFound(deal_id.clone()))?
            .closing_docs_ready = ready;
        Ok(())
    }

    // ── Evidence and integrity ───────────────────────────────────────

    /// Assemble an evidence pack for the deal as it stands right now.
    /// An invalid chain still yields a pack, marked INVALID, and freezes
    /// the deal for audit.
    pub fn generate_evidence_pack(
        &self,
        deal_id: &DealId,
        pack_type: PackType,
        actor: ActorContext,
    ) -> ServiceResult<EvidencePack> {
        let lock = self.deal_lock(deal_id)?;
        let _guard = lock.lock().map_err(|_| ServiceError::LockError)?;
        self.ensure_not_flagged(deal_id)?;

        let state = self.engine.get_state(deal_id)?;
        let events = self.ledger.list(deal_id)?;
        let claims = self.claims.claims_for(deal_id)?;
        let mut documents: Vec<DocumentVersion> = Vec::new();
        for document_type in self.documents.types_present(deal_id)? {
            documents.extend(self.documents.list_versions(deal_id, document_type)?);
        }

        let pack = self.evidence.generate(
            deal_id,
            pack_type,
            state,
            &events,
            &claims,
            &documents,
            actor.clone(),
        )?;

        if pack.validation_status == ValidationStatus::Invalid {
            tracing::warn!(deal = %deal_id, pack = %pack.pack_id, "pack generated over a broken chain");
            self.flag(deal_id)?;
            return Ok(pack);
        }

        self.append_with_retry(
            deal_id,
            EventPayload::EvidencePackGenerated {
                pack_id: pack.pack_id.clone(),
                pack_type: pack_type.to_string(),
                content_hash: pack.content_hash,
            },
            actor,
        )?;
        self.notify_committed(deal_id);
        Ok(pack)
    }

    pub fn get_evidence_pack(&self, pack_id: &EvidencePackId) -> ServiceResult<EvidencePack> {
        Ok(self.evidence.get(pack_id)?)
    }

    pub fn list_evidence_packs(&self, deal_id: &DealId) -> ServiceResult<Vec<EvidencePack>> {
        Ok(self.evidence.list_for_deal(deal_id)?)
    }

    /// Walk the deal's chain end to end. A broken chain freezes the deal.
    pub fn verify_ledger_integrity(&self, deal_id: &DealId) -> ServiceResult<IntegrityReport> {
        let report = self.ledger.verify_integrity(deal_id)?;
        if !report.valid {
            self.flag(deal_id)?;
        }
        Ok(report)
    }

    pub fn is_flagged(&self, deal_id: &DealId) -> ServiceResult<bool> {
        let flagged = self.flagged.read().map_err(|_| ServiceError::LockError)?;
        Ok(flagged.contains(deal_id))
    }

    /// Lift an integrity freeze after manual audit. Re-verifies first;
    /// the flag stays if the chain is still broken.
    pub fn clear_integrity_flag(&self, deal_id: &DealId) -> ServiceResult<IntegrityReport> {
        let report = self.ledger.verify_integrity(deal_id)?;
        if !report.valid {
            return Err(ServiceError::HashChainMismatch {
                deal_id: deal_id.clone(),
                broken_at: report.broken_at_sequence,
            });
        }
        let mut flagged = self.flagged.write().map_err(|_| ServiceError::LockError)?;
        flagged.remove(deal_id);
        tracing::info!(deal = %deal_id, "integrity flag cleared");
        Ok(report)
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Assemble the fact snapshot blocker checks run against. Called
    /// again at commit time; never cached across the gap.
    fn snapshot(&self, deal_id: &DealId) -> ServiceResult<DealSnapshot> {
        let intake = self.intake.read().map_err(|_| ServiceError::LockError)?;
        let record = intake
            .get(deal_id)
            .ok_or_else(|| ServiceError::DealNotFound(deal_id.clone()))?;

        Ok(DealSnapshot {
            pending_claims: self.claims.pending_count(deal_id)?,
            open_conflicts: record.open_conflicts.len(),
            source_documents: record.source_documents.len(),
            document_types: self.documents.types_present(deal_id)?,
            executed_document_types: self.documents.types_executed(deal_id)?,
            open_diligence_items: record.diligence.open_items(),
            closing_docs_ready: record.closing_docs_ready,
        })
    }

    fn deal_lock(&self, deal_id: &DealId) -> ServiceResult<Arc<Mutex<()>>> {
        let mut locks = self.deal_locks.lock().map_err(|_| ServiceError::LockError)?;
        Ok(locks.entry(deal_id.clone()).or_default().clone())
    }

    fn ensure_not_flagged(&self, deal_id: &DealId) -> ServiceResult<()> {
        if self.is_flagged(deal_id)? {
            let report = self.ledger.verify_integrity(deal_id)?;
            return Err(ServiceError::HashChainMismatch {
                deal_id: deal_id.clone(),
                broken_at: report.broken_at_sequence,
            });
        }
        Ok(())
    }

    fn flag(&self, deal_id: &DealId) -> ServiceResult<()> {
        let mut flagged = self.flagged.write().map_err(|_| ServiceError::LockError)?;
        if flagged.insert(deal_id.clone()) {
            tracing::error!(deal = %deal_id, "ledger chain broken; deal frozen pending audit");
        }
        Ok(())
    }

    /// Service-side appends use the optimistic form with a bounded retry
    /// budget; component appends are serialized by the ledger itself.
    fn append_with_retry(
        &self,
        deal_id: &DealId,
        payload: EventPayload,
        actor: ActorContext,
    ) -> ServiceResult<DealEvent> {
        let expected = self.ledger.tail_sequence(deal_id)?;
        self.append_from(deal_id, expected, payload, actor)
    }

    /// Retry loop for the optimistic append. `expected` is the caller's
    /// view of the chain tail; each conflict re-reads the tail until the
    /// configured budget runs out.
    fn append_from(
        &self,
        deal_id: &DealId,
        mut expected: u64,
        payload: EventPayload,
        actor: ActorContext,
    ) -> ServiceResult<DealEvent> {
        let mut attempts = 0;
        loop {
            match self.ledger.append_after(
                deal_id,
                expected,
                payload.clone(),
                actor.clone(),
                Vec::new(),
            ) {
                Ok(event) => return Ok(event),
                Err(LedgerError::ConcurrentAppendConflict { .. }) => {
                    attempts += 1;
                    if attempts >= self.config.max_append_retries {
                        return Err(ServiceError::AppendRetriesExhausted(attempts));
                    }
                    tracing::debug!(deal = %deal_id, attempts, "append conflict, retrying");
                    expected = self.ledger.tail_sequence(deal_id)?;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    fn notify_committed(&self, deal_id: &DealId) {
        let tail = match self.ledger.list(deal_id) {
            Ok(events) => events.into_iter().last(),
            Err(_) => None,
        };
        if let Some(event) = tail {
            if let Err(error) = self.notifier.notify(&event) {
                tracing::warn!(deal = %deal_id, error = %error, "notifier failed");
            }
        }
    }
}

impl Default for DealService {
    fn default() -> Self {
        Self::new()
    }
}
