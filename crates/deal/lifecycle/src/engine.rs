//! The lifecycle engine: evaluates edges and commits transitions.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use thiserror::Error;

use deal_ledger::{EventLedger, LedgerError};
use deal_types::{
    ActorContext, Blocker, DealId, DealSnapshot, DealStage, DealState, DocumentType, EventPayload,
    Role, TransitionOption, TransitionRule,
};

use crate::{evaluate_check, lifecycle_rules, ApprovalLog};

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("deal not found: {0}")]
    DealNotFound(DealId),

    #[error("deal already exists: {0}")]
    DuplicateDeal(DealId),

    #[error("no transition {from} -> {to}")]
    InvalidTransition { from: DealStage, to: DealStage },

    #[error("transition blocked by {} check(s)", blockers.len())]
    TransitionBlocked { blockers: Vec<Blocker> },

    #[error("missing approval from {} role(s)", roles.len())]
    MissingApproval { roles: Vec<Role> },

    #[error("missing required document(s): {documents:?}")]
    MissingDocuments { documents: Vec<DocumentType> },

    #[error("deal {0} is not on hold")]
    NotOnHold(DealId),

    #[error("deal {deal_id} is {stage}; no further transitions")]
    TerminalStage { deal_id: DealId, stage: DealStage },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("lock error")]
    LockError,
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Computes legal transitions and is the only writer of `DealState`.
pub struct LifecycleEngine {
    rules: Vec<TransitionRule>,
    states: RwLock<HashMap<DealId, DealState>>,
}

impl LifecycleEngine {
    pub fn new() -> Self {
        Self {
            rules: lifecycle_rules(),
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Custom rule table, for tests and non-standard lifecycles.
    pub fn with_rules(rules: Vec<TransitionRule>) -> Self {
        Self {
            rules,
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new deal at INTAKE_RECEIVED and append its creation
    /// event.
    pub fn create_deal(
        &self,
        ledger: &EventLedger,
        deal_id: &DealId,
        deal_name: impl Into<String>,
        actor: ActorContext,
    ) -> LifecycleResult<DealState> {
        let mut states = self.states.write().map_err(|_| LifecycleError::LockError)?;
        if states.contains_key(deal_id) {
            return Err(LifecycleError::DuplicateDeal(deal_id.clone()));
        }

        ledger.append(
            deal_id,
            EventPayload::DealCreated {
                deal_name: deal_name.into(),
            },
            actor,
            Vec::new(),
        )?;

        let state = DealState::new(deal_id.clone());
        states.insert(deal_id.clone(), state.clone());
        tracing::info!(deal = %deal_id, "deal created");
        Ok(state)
    }

    pub fn get_state(&self, deal_id: &DealId) -> LifecycleResult<DealState> {
        let states = self.states.read().map_err(|_| LifecycleError::LockError)?;
        states
            .get(deal_id)
            .cloned()
            .ok_or_else(|| LifecycleError::DealNotFound(deal_id.clone()))
    }

    /// Evaluate every forward edge out of the deal's current stage
    /// against `snapshot`. Read-only; the verdict is advisory and is
    /// re-computed at commit time by [`LifecycleEngine::transition`].
    pub fn available_transitions(
        &self,
        approvals: &ApprovalLog,
        deal_id: &DealId,
        snapshot: &DealSnapshot,
    ) -> LifecycleResult<Vec<TransitionOption>> {
        let state = self.get_state(deal_id)?;
        let mut options = Vec::new();
        for rule in self.rules.iter().filter(|r| r.from == state.current_stage) {
            options.push(self.evaluate_rule(approvals, deal_id, rule, snapshot)?);
        }
        Ok(options)
    }

    /// Advance the deal along a forward edge.
    ///
    /// Blockers, required documents, and approvals are all re-validated
    /// here, under the state write lock, regardless of what any earlier
    /// read reported. On success the `StateTransition` event and the
    /// state record commit together.
    pub fn transition(
        &self,
        ledger: &EventLedger,
        approvals: &ApprovalLog,
        deal_id: &DealId,
        target: DealStage,
        snapshot: &DealSnapshot,
        actor: ActorContext,
        reason: Option<String>,
    ) -> LifecycleResult<DealState> {
        let mut states = self.states.write().map_err(|_| LifecycleError::LockError)?;
        let state = states
            .get_mut(deal_id)
            .ok_or_else(|| LifecycleError::DealNotFound(deal_id.clone()))?;

        if state.current_stage.is_terminal() {
            return Err(LifecycleError::TerminalStage {
                deal_id: deal_id.clone(),
                stage: state.current_stage,
            });
        }

        let rule = self
            .rules
            .iter()
            .find(|r| r.from == state.current_stage && r.to == target)
            .ok_or(LifecycleError::InvalidTransition {
                from: state.current_stage,
                to: target,
            })?;

        let option = self.evaluate_rule(approvals, deal_id, rule, snapshot)?;
        if !option.blockers.is_empty() {
            // Surface the blockers on the state record for callers that
            // read rather than inspect the error.
            state.blockers = option.blockers.clone();
            tracing::info!(
                deal = %deal_id,
                target = %target,
                blockers = option.blockers.len(),
                "transition blocked"
            );
            return Err(LifecycleError::TransitionBlocked {
                blockers: option.blockers,
            });
        }
        if !option.missing_documents.is_empty() {
            return Err(LifecycleError::MissingDocuments {
                documents: option.missing_documents,
            });
        }
        if !option.missing_approvals.is_empty() {
            return Err(LifecycleError::MissingApproval {
                roles: option.missing_approvals,
            });
        }

        let authority = approvals.authority_snapshot(deal_id, target)?;
        let from = state.current_stage;

        ledger.append(
            deal_id,
            EventPayload::StateTransition {
                from,
                to: target,
                reason: reason.clone(),
            },
            actor.clone(),
            authority,
        )?;

        state.current_stage = target;
        state.entered_stage_at = Utc::now();
        state.blockers.clear();
        state.held_from = None;
        state.last_transition_by = Some(actor);
        state.last_transition_at = Some(Utc::now());
        self.refresh_pending_approvals(approvals, state)?;

        tracing::info!(deal = %deal_id, from = %from, to = %target, "transition committed");
        Ok(state.clone())
    }

    /// Park the deal ON_HOLD, remembering the stage it came from.
    pub fn hold(
        &self,
        ledger: &EventLedger,
        deal_id: &DealId,
        actor: ActorContext,
        reason: impl Into<String>,
    ) -> LifecycleResult<DealState> {
        self.override_stage(ledger, deal_id, DealStage::OnHold, actor, Some(reason.into()))
    }

    /// Return a held deal to the stage it was parked from.
    pub fn resume(
        &self,
        ledger: &EventLedger,
        deal_id: &DealId,
        actor: ActorContext,
    ) -> LifecycleResult<DealState> {
        let mut states = self.states.write().map_err(|_| LifecycleError::LockError)?;
        let state = states
            .get_mut(deal_id)
            .ok_or_else(|| LifecycleError::DealNotFound(deal_id.clone()))?;

        if state.current_stage != DealStage::OnHold {
            return Err(LifecycleError::NotOnHold(deal_id.clone()));
        }
        let target = state
            .held_from
            .ok_or_else(|| LifecycleError::NotOnHold(deal_id.clone()))?;

        ledger.append(
            deal_id,
            EventPayload::StateTransition {
                from: DealStage::OnHold,
                to: target,
                reason: None,
            },
            actor.clone(),
            Vec::new(),
        )?;

        state.current_stage = target;
        state.entered_stage_at = Utc::now();
        state.held_from = None;
        state.last_transition_by = Some(actor);
        state.last_transition_at = Some(Utc::now());

        tracing::info!(deal = %deal_id, to = %target, "deal resumed");
        Ok(state.clone())
    }

    /// Kill the deal: an explicit business override into DEAD.
    pub fn kill(
        &self,
        ledger: &EventLedger,
        deal_id: &DealId,
        actor: ActorContext,
        reason: impl Into<String>,
    ) -> LifecycleResult<DealState> {
        self.override_stage(ledger, deal_id, DealStage::Dead, actor, Some(reason.into()))
    }

    // ── Internal helpers ─────────────────────────────────────────────

    fn override_stage(
        &self,
        ledger: &EventLedger,
        deal_id: &DealId,
        target: DealStage,
        actor: ActorContext,
        reason: Option<String>,
    ) -> LifecycleResult<DealState> {
        let mut states = self.states.write().map_err(|_| LifecycleError::LockError)?;
        let state = states
            .get_mut(deal_id)
            .ok_or_else(|| LifecycleError::DealNotFound(deal_id.clone()))?;

        if state.current_stage.is_terminal() || state.current_stage == target {
            return Err(LifecycleError::TerminalStage {
                deal_id: deal_id.clone(),
                stage: state.current_stage,
            });
        }

        let from = state.current_stage;
        ledger.append(
            deal_id,
            EventPayload::StateTransition {
                from,
                to: target,
                reason,
            },
            actor.clone(),
            Vec::new(),
        )?;

        if target == DealStage::OnHold {
            state.held_from = Some(from);
        }
        state.current_stage = target;
        state.entered_stage_at = Utc::now();
        state.last_transition_by = Some(actor);
        state.last_transition_at = Some(Utc::now());

        tracing::warn!(deal = %deal_id, from = %from, to = %target, "override transition");
        Ok(state.clone())
    }

    fn evaluate_rule(
        &self,
        approvals: &ApprovalLog,
        deal_id: &DealId,
        rule: &TransitionRule,
        snapshot: &DealSnapshot,
    ) -> LifecycleResult<TransitionOption> {
        let blockers: Vec<Blocker> = rule
            .checks
            .iter()
            .map(|check| evaluate_check(*check, snapshot))
            .filter(|result| !result.satisfied)
            .map(Blocker::from)
            .collect();

        let missing_documents: Vec<DocumentType> = rule
            .required_documents
            .iter()
            .filter(|doc| !snapshot.has_document(**doc))
            .copied()
            .collect();

        let approved = approvals.approved_roles(deal_id, rule.to)?;
        let missing_approvals: Vec<Role> = rule
            .required_approvals
            .iter()
            .filter(|role| !approved.contains(role))
            .cloned()
            .collect();

        let can_transition =
            blockers.is_empty() && missing_documents.is_empty() && missing_approvals.is_empty();

        Ok(TransitionOption {
            target: rule.to,
            can_transition,
            blockers,
            required_approvals: rule.required_approvals.clone(),
            missing_approvals,
            required_documents: rule.required_documents.clone(),
            missing_documents,
        })
    }

    /// Denormalize the approval outlook for the new stage onto the state
    /// record: union of roles required by its outgoing edges, and which
    /// of those already have an APPROVED record.
    fn refresh_pending_approvals(
        &self,
        approvals: &ApprovalLog,
        state: &mut DealState,
    ) -> LifecycleResult<()> {
        state.pending_approvals.required.clear();
        state.pending_approvals.received.clear();
        for rule in self.rules.iter().filter(|r| r.from == state.current_stage) {
            let approved = approvals.approved_roles(&state.deal_id, rule.to)?;
            for role in &rule.required_approvals {
                state.pending_approvals.required.insert(role.clone());
                if approved.contains(role) {
                    state.pending_approvals.received.insert(role.clone());
                }
            }
        }
        Ok(())
    }
}

impl Default for LifecycleEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use deal_types::{
        ApprovalDecision, ApprovalId, ApprovalKind, ApprovalRecord, CaptureMethod, CheckId,
    };

    fn actor() -> ActorContext {
        ActorContext::new("u-1", "Dana Reyes", Role::analyst())
    }

    struct Fixture {
        engine: LifecycleEngine,
        ledger: EventLedger,
        approvals: ApprovalLog,
        deal: DealId,
    }

    fn fixture() -> Fixture {
        let fx = Fixture {
            engine: LifecycleEngine::new(),
            ledger: EventLedger::new(),
            approvals: ApprovalLog::new(),
            deal: DealId::new("d-1"),
        };
        fx.engine
            .create_deal(&fx.ledger, &fx.deal, "Maplewood Commons", actor())
            .unwrap();
        fx
    }

    fn approve(fx: &Fixture, role: Role, target: DealStage) {
        fx.approvals
            .record(
                &fx.ledger,
                ApprovalRecord {
                    approval_id: ApprovalId::generate(),
                    deal_id: fx.deal.clone(),
                    kind: ApprovalKind::StateTransition { target },
                    approver_id: "u-9".into(),
                    approver_role: role,
                    decision: ApprovalDecision::Approved,
                    capture_method: CaptureMethod::Ui,
                    decided_at: Utc::now(),
                    recorded_at: Utc::now(),
                },
                actor(),
            )
            .unwrap();
    }

    /// Scenario A: fresh deal with no claims advances immediately.
    #[test]
    fn intake_to_data_room_has_no_blockers() {
        let fx = fixture();
        let state = fx
            .engine
            .transition(
                &fx.ledger,
                &fx.approvals,
                &fx.deal,
                DealStage::DataRoomIngested,
                &DealSnapshot::default(),
                actor(),
                None,
            )
            .unwrap();
        assert_eq!(state.current_stage, DealStage::DataRoomIngested);

        // State matches the last transition event
        let events = fx.ledger.list(&fx.deal).unwrap();
        assert!(matches!(
            events.last().unwrap().payload,
            EventPayload::StateTransition {
                to: DealStage::DataRoomIngested,
                ..
            }
        ));
    }

    /// Scenario B: a pending claim blocks, verification unblocks.
    #[test]
    fn pending_claim_blocks_then_unblocks() {
        let fx = fixture();
        let mut snapshot = DealSnapshot {
            source_documents: 1,
            ..Default::default()
        };
        fx.engine
            .transition(
                &fx.ledger,
                &fx.approvals,
                &fx.deal,
                DealStage::DataRoomIngested,
                &snapshot,
                actor(),
                None,
            )
            .unwrap();
        fx.engine
            .transition(
                &fx.ledger,
                &fx.approvals,
                &fx.deal,
                DealStage::ExtractionComplete,
                &snapshot,
                actor(),
                None,
            )
            .unwrap();

        snapshot.pending_claims = 1;
        let err = fx
            .engine
            .transition(
                &fx.ledger,
                &fx.approvals,
                &fx.deal,
                DealStage::UnderwritingInProgress,
                &snapshot,
                actor(),
                None,
            )
            .unwrap_err();
        match err {
            LifecycleError::TransitionBlocked { blockers } => {
                assert_eq!(blockers.len(), 1);
                assert_eq!(blockers[0].check, CheckId::AllClaimsVerified);
                assert_eq!(blockers[0].details["pendingClaims"], 1);
            }
            other => panic!("expected TransitionBlocked, got {other:?}"),
        }
        // Blockers surfaced on the state record too
        assert_eq!(fx.engine.get_state(&fx.deal).unwrap().blockers.len(), 1);

        // Same call succeeds once the claim is resolved
        snapshot.pending_claims = 0;
        let state = fx
            .engine
            .transition(
                &fx.ledger,
                &fx.approvals,
                &fx.deal,
                DealStage::UnderwritingInProgress,
                &snapshot,
                actor(),
                None,
            )
            .unwrap();
        assert_eq!(state.current_stage, DealStage::UnderwritingInProgress);
        assert!(state.blockers.is_empty());
    }

    #[test]
    fn unknown_edge_is_invalid() {
        let fx = fixture();
        let err = fx
            .engine
            .transition(
                &fx.ledger,
                &fx.approvals,
                &fx.deal,
                DealStage::Closed,
                &DealSnapshot::default(),
                actor(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    }

    #[test]
    fn ic_approval_gate_requires_both_roles() {
        let engine = LifecycleEngine::with_rules(vec![TransitionRule::new(
            DealStage::IcReview,
            DealStage::IcApproved,
        )
        .with_approvals([Role::ic_chair(), Role::managing_partner()])]);
        let ledger = EventLedger::new();
        let approvals = ApprovalLog::new();
        let deal = DealId::new("d-1");
        engine.create_deal(&ledger, &deal, "Test", actor()).unwrap();

        // Force the deal into IC_REVIEW via a direct rule-less path is
        // not possible; use a fixture engine whose only edge starts
        // there by seeding state through hold/resume.
        {
            let mut states = engine.states.write().unwrap();
            states.get_mut(&deal).unwrap().current_stage = DealStage::IcReview;
        }

        let err = engine
            .transition(
                &ledger,
                &approvals,
                &deal,
                DealStage::IcApproved,
                &DealSnapshot::default(),
                actor(),
                None,
            )
            .unwrap_err();
        match err {
            LifecycleError::MissingApproval { roles } => assert_eq!(roles.len(), 2),
            other => panic!("expected MissingApproval, got {other:?}"),
        }

        let fx = Fixture {
            engine,
            ledger,
            approvals,
            deal,
        };
        approve(&fx, Role::ic_chair(), DealStage::IcApproved);
        approve(&fx, Role::managing_partner(), DealStage::IcApproved);

        let state = fx
            .engine
            .transition(
                &fx.ledger,
                &fx.approvals,
                &fx.deal,
                DealStage::IcApproved,
                &DealSnapshot::default(),
                actor(),
                None,
            )
            .unwrap();
        assert_eq!(state.current_stage, DealStage::IcApproved);

        // The event carries the approvals that were considered
        let events = fx.ledger.list(&fx.deal).unwrap();
        let last = events.last().unwrap();
        assert_eq!(last.authority_context.len(), 2);
    }

    #[test]
    fn hold_and_resume_restore_prior_stage() {
        let fx = fixture();
        fx.engine
            .transition(
                &fx.ledger,
                &fx.approvals,
                &fx.deal,
                DealStage::DataRoomIngested,
                &DealSnapshot::default(),
                actor(),
                None,
            )
            .unwrap();

        let held = fx
            .engine
            .hold(&fx.ledger, &fx.deal, actor(), "seller went quiet")
            .unwrap();
        assert_eq!(held.current_stage, DealStage::OnHold);
        assert_eq!(held.held_from, Some(DealStage::DataRoomIngested));

        // Forward transitions are refused while held
        let err = fx
            .engine
            .transition(
                &fx.ledger,
                &fx.approvals,
                &fx.deal,
                DealStage::ExtractionComplete,
                &DealSnapshot::default(),
                actor(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));

        let resumed = fx.engine.resume(&fx.ledger, &fx.deal, actor()).unwrap();
        assert_eq!(resumed.current_stage, DealStage::DataRoomIngested);
        assert_eq!(resumed.held_from, None);

        // Resuming an un-held deal fails
        let err = fx.engine.resume(&fx.ledger, &fx.deal, actor()).unwrap_err();
        assert!(matches!(err, LifecycleError::NotOnHold(_)));
    }

    #[test]
    fn dead_is_terminal() {
        let fx = fixture();
        fx.engine
            .kill(&fx.ledger, &fx.deal, actor(), "lost to competing bidder")
            .unwrap();

        let err = fx
            .engine
            .transition(
                &fx.ledger,
                &fx.approvals,
                &fx.deal,
                DealStage::DataRoomIngested,
                &DealSnapshot::default(),
                actor(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, LifecycleError::TerminalStage { .. }));

        let err = fx
            .engine
            .hold(&fx.ledger, &fx.deal, actor(), "too late")
            .unwrap_err();
        assert!(matches!(err, LifecycleError::TerminalStage { .. }));
    }

    #[test]
    fn available_transitions_reports_gates() {
        let fx = fixture();
        let options = fx
            .engine
            .available_transitions(&fx.approvals, &fx.deal, &DealSnapshot::default())
            .unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].target, DealStage::DataRoomIngested);
        assert!(options[0].can_transition);
    }

    #[test]
    fn required_document_missing_is_reported() {
        let engine = LifecycleEngine::with_rules(vec![TransitionRule::new(
            DealStage::UnderwritingComplete,
            DealStage::IcReview,
        )
        .with_documents([DocumentType::IcMemo])]);
        let ledger = EventLedger::new();
        let approvals = ApprovalLog::new();
        let deal = DealId::new("d-1");
        engine.create_deal(&ledger, &deal, "Test", actor()).unwrap();
        {
            let mut states = engine.states.write().unwrap();
            states.get_mut(&deal).unwrap().current_stage = DealStage::UnderwritingComplete;
        }

        let err = engine
            .transition(
                &ledger,
                &approvals,
                &deal,
                DealStage::IcReview,
                &DealSnapshot::default(),
                actor(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, LifecycleError::MissingDocuments { .. }));
    }
}
