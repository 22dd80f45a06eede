//! Approval log: captured decisions evaluated as role sets.
//!
//! Many approvals may exist per target. A transition rule is satisfied
//! when every required role has at least one unconditional APPROVED
//! record for the target stage.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use deal_ledger::EventLedger;
use deal_types::{
    ApprovalKind, ApprovalRecord, AuthorityRecord, DealId, DealStage, EventPayload, Role,
};

use crate::{LifecycleError, LifecycleResult};

/// Stores approval records per deal and answers role-set queries.
pub struct ApprovalLog {
    records: RwLock<HashMap<DealId, Vec<ApprovalRecord>>>,
}

impl ApprovalLog {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Record a captured approval decision and append it to the ledger.
    /// `recorded_by` is whoever entered the decision, which may differ
    /// from the approver for email or verbal captures.
    pub fn record(
        &self,
        ledger: &EventLedger,
        record: ApprovalRecord,
        recorded_by: deal_types::ActorContext,
    ) -> LifecycleResult<ApprovalRecord> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LifecycleError::LockError)?;

        ledger.append(
            &record.deal_id,
            EventPayload::ApprovalGranted {
                approval_id: record.approval_id.clone(),
                approver_role: record.approver_role.clone(),
                decision: record.decision.clone(),
            },
            recorded_by,
            Vec::new(),
        )?;

        records
            .entry(record.deal_id.clone())
            .or_default()
            .push(record.clone());

        tracing::info!(
            deal = %record.deal_id,
            role = %record.approver_role,
            decision = ?record.decision,
            "approval recorded"
        );
        Ok(record)
    }

    /// Roles holding an unconditional APPROVED record for a transition
    /// into `target`.
    pub fn approved_roles(
        &self,
        deal_id: &DealId,
        target: DealStage,
    ) -> LifecycleResult<BTreeSet<Role>> {
        let records = self.records.read().map_err(|_| LifecycleError::LockError)?;
        Ok(records
            .get(deal_id)
            .map(|list| {
                list.iter()
                    .filter(|r| {
                        matches!(r.kind, ApprovalKind::StateTransition { target: t } if t == target)
                            && r.decision.is_approved()
                    })
                    .map(|r| r.approver_role.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Snapshot of every approval considered for a transition into
    /// `target`, embedded in the resulting ledger event.
    pub fn authority_snapshot(
        &self,
        deal_id: &DealId,
        target: DealStage,
    ) -> LifecycleResult<Vec<AuthorityRecord>> {
        let records = self.records.read().map_err(|_| LifecycleError::LockError)?;
        Ok(records
            .get(deal_id)
            .map(|list| {
                list.iter()
                    .filter(|r| {
                        matches!(r.kind, ApprovalKind::StateTransition { target: t } if t == target)
                    })
                    .map(|r| AuthorityRecord {
                        approver_role: r.approver_role.clone(),
                        decision: r.decision.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    /// All approval records for a deal, in capture order.
    pub fn records_for(&self, deal_id: &DealId) -> LifecycleResult<Vec<ApprovalRecord>> {
        let records = self.records.read().map_err(|_| LifecycleError::LockError)?;
        Ok(records.get(deal_id).cloned().unwrap_or_default())
    }
}

impl Default for ApprovalLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use deal_types::{ActorContext, ApprovalDecision, ApprovalId, CaptureMethod};

    fn recorder() -> ActorContext {
        ActorContext::new("u-1", "Dana Reyes", Role::analyst())
    }

    fn approval(role: Role, decision: ApprovalDecision, target: DealStage) -> ApprovalRecord {
        ApprovalRecord {
            approval_id: ApprovalId::generate(),
            deal_id: DealId::new("d-1"),
            kind: ApprovalKind::StateTransition { target },
            approver_id: "u-9".into(),
            approver_role: role,
            decision,
            capture_method: CaptureMethod::Ui,
            decided_at: Utc::now(),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn only_unconditional_approvals_count() {
        let log = ApprovalLog::new();
        let ledger = EventLedger::new();
        let deal = DealId::new("d-1");

        log.record(
            &ledger,
            approval(
                Role::ic_chair(),
                ApprovalDecision::Approved,
                DealStage::IcApproved,
            ),
            recorder(),
        )
        .unwrap();
        log.record(
            &ledger,
            approval(
                Role::managing_partner(),
                ApprovalDecision::Conditional {
                    conditions: vec!["subject to appraisal".into()],
                },
                DealStage::IcApproved,
            ),
            recorder(),
        )
        .unwrap();

        let roles = log.approved_roles(&deal, DealStage::IcApproved).unwrap();
        assert!(roles.contains(&Role::ic_chair()));
        assert!(!roles.contains(&Role::managing_partner()));

        // Both decisions appear in the authority snapshot
        let snapshot = log.authority_snapshot(&deal, DealStage::IcApproved).unwrap();
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn approvals_are_scoped_to_their_target() {
        let log = ApprovalLog::new();
        let ledger = EventLedger::new();
        let deal = DealId::new("d-1");

        log.record(
            &ledger,
            approval(
                Role::managing_partner(),
                ApprovalDecision::Approved,
                DealStage::Closed,
            ),
            recorder(),
        )
        .unwrap();

        assert!(log
            .approved_roles(&deal, DealStage::IcApproved)
            .unwrap()
            .is_empty());
        assert!(!log.approved_roles(&deal, DealStage::Closed).unwrap().is_empty());
    }
}
