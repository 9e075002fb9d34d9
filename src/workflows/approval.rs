//! Approval gate resolution
//!
//! Pure state transitions on an [`ExecutionInstance`]: opening a gate,
//! applying a vote, and expiring overdue gates. Persistence and
//! continuation are the engine's job.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use super::definition::{Step, StepKind};
use super::instance::{ApprovalGate, ExecutionInstance, GateResolution, StepRecord, StepStatus};
use crate::types::{AppError, Result};

/// Error message stored on instances failed by the expiry sweep
pub const APPROVAL_EXPIRED_MESSAGE: &str = "approval expired";

/// Result of applying one vote
#[derive(Debug, Clone, PartialEq)]
pub enum VoteOutcome {
    /// Vote appended, gate still open
    Recorded,
    /// Approver had already voted; nothing changed
    AlreadyVoted,
    /// Vote appended and the gate resolved; it is now archived
    Resolved(ApprovalGate),
}

/// Build a fresh gate for an approval step
pub fn open_gate(step: &Step, now: DateTime<Utc>) -> Result<ApprovalGate> {
    let StepKind::Approval {
        approvers,
        approval_type,
        timeout_secs,
    } = &step.kind
    else {
        return Err(AppError::Internal(format!(
            "Step '{}' is not an approval step",
            step.id
        )));
    };

    let expires_at = i64::try_from(*timeout_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|timeout| now.checked_add_signed(timeout))
        .ok_or_else(|| {
            AppError::InvalidInput(format!(
                "Approval step '{}' timeout {}s is out of range",
                step.id, timeout_secs
            ))
        })?;

    Ok(ApprovalGate {
        approval_id: Uuid::new_v4().to_string(),
        step_id: step.id.clone(),
        required_approvers: approvers.clone(),
        approved_by: Vec::new(),
        approval_type: *approval_type,
        created_at: now,
        expires_at,
        resolution: None,
        resolved_at: None,
    })
}

/// Apply a vote to the gate identified by `approval_id`.
///
/// On resolution the gate is moved to `resolved_approvals` and a completed
/// record is appended to `steps_completed`; advancing past the step is left
/// to the caller.
pub fn apply_vote(
    instance: &mut ExecutionInstance,
    approval_id: &str,
    approver: &str,
    now: DateTime<Utc>,
) -> Result<VoteOutcome> {
    let Some(idx) = instance
        .pending_approvals
        .iter()
        .position(|g| g.approval_id == approval_id)
    else {
        return closed_gate_vote(instance, approval_id, approver);
    };
    let gate = &mut instance.pending_approvals[idx];

    if !gate.required_approvers.contains(approver) {
        return Err(AppError::Unauthorized(format!(
            "'{}' is not a required approver for approval {}",
            approver, approval_id
        )));
    }
    if gate.approved_by.iter().any(|a| a == approver) {
        return Ok(VoteOutcome::AlreadyVoted);
    }
    if gate.expires_at <= now {
        return Err(AppError::ApprovalExpired(format!(
            "Approval {} expired at {}",
            approval_id, gate.expires_at
        )));
    }

    gate.approved_by.push(approver.to_string());

    if !gate
        .approval_type
        .is_satisfied(&gate.required_approvers, &gate.approved_by)
    {
        return Ok(VoteOutcome::Recorded);
    }

    let gate = instance
        .close_gate(approval_id, GateResolution::Approved, now)
        .ok_or_else(|| AppError::Internal(format!("Gate {} vanished", approval_id)))?;

    instance.steps_completed.push(StepRecord {
        step_id: gate.step_id.clone(),
        status: StepStatus::Completed,
        started_at: gate.created_at,
        completed_at: now,
        result: json!({ "approved_by": gate.approved_by }),
    });

    Ok(VoteOutcome::Resolved(gate))
}

/// Votes against a gate no longer in `pending_approvals`
fn closed_gate_vote(
    instance: &ExecutionInstance,
    approval_id: &str,
    approver: &str,
) -> Result<VoteOutcome> {
    let Some(gate) = instance.find_resolved_gate(approval_id) else {
        return Err(AppError::NotFound(format!(
            "Approval {} not found on execution {}",
            approval_id, instance.id
        )));
    };

    if !gate.required_approvers.contains(approver) {
        return Err(AppError::Unauthorized(format!(
            "'{}' is not a required approver for approval {}",
            approver, approval_id
        )));
    }

    match gate.resolution {
        Some(GateResolution::Expired) => Err(AppError::ApprovalExpired(format!(
            "Approval {} expired at {}",
            approval_id, gate.expires_at
        ))),
        Some(GateResolution::Cancelled) => Err(AppError::Conflict(format!(
            "Execution {} was cancelled before approval {} resolved",
            instance.id, approval_id
        ))),
        _ => Ok(VoteOutcome::AlreadyVoted),
    }
}

/// Expire every pending gate whose deadline has passed.
///
/// Returns the expired approval ids. A running instance with at least one
/// expired gate is failed; terminal instances are left untouched.
pub fn expire_gates(instance: &mut ExecutionInstance, now: DateTime<Utc>) -> Vec<String> {
    if !instance.is_running() {
        return Vec::new();
    }

    let overdue: Vec<String> = instance
        .pending_approvals
        .iter()
        .filter(|g| g.expires_at <= now)
        .map(|g| g.approval_id.clone())
        .collect();

    for approval_id in &overdue {
        instance.close_gate(approval_id, GateResolution::Expired, now);
    }

    if !overdue.is_empty() {
        instance.mark_failed(APPROVAL_EXPIRED_MESSAGE, now);
    }

    overdue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::definition::ApprovalType;
    use crate::workflows::instance::ExecutionStatus;
    use std::collections::HashMap;

    fn gated_instance(approval_type: ApprovalType) -> (ExecutionInstance, String) {
        let step = Step::approval("review", ["m1", "m2", "m3"], approval_type, 3600);
        let gate = open_gate(&step, Utc::now()).unwrap();
        let approval_id = gate.approval_id.clone();

        let mut inst = ExecutionInstance::new("wf", "doc-1", "alice", HashMap::new());
        inst.current_step_id = Some("review".to_string());
        inst.pending_approvals.push(gate);
        (inst, approval_id)
    }

    #[test]
    fn test_open_gate_sets_deadline() {
        let now = Utc::now();
        let step = Step::approval("review", ["m1"], ApprovalType::Any, 120);
        let gate = open_gate(&step, now).unwrap();

        assert_eq!(gate.expires_at - gate.created_at, Duration::seconds(120));
        assert!(gate.approved_by.is_empty());
        assert!(open_gate(&Step::action("a", "add_tag"), now).is_err());
    }

    #[test]
    fn test_open_gate_rejects_unrepresentable_deadline() {
        let step = Step::approval("review", ["m1"], ApprovalType::Any, 1_000_000_000_000_000);
        let err = open_gate(&step, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let step = Step::approval("review", ["m1"], ApprovalType::Any, u64::MAX);
        assert!(open_gate(&step, Utc::now()).is_err());
    }

    #[test]
    fn test_all_requires_every_approver() {
        let (mut inst, id) = gated_instance(ApprovalType::All);
        let now = Utc::now();

        assert_eq!(apply_vote(&mut inst, &id, "m1", now).unwrap(), VoteOutcome::Recorded);
        assert_eq!(apply_vote(&mut inst, &id, "m2", now).unwrap(), VoteOutcome::Recorded);
        assert_eq!(inst.pending_approvals.len(), 1);

        let outcome = apply_vote(&mut inst, &id, "m3", now).unwrap();
        assert!(matches!(outcome, VoteOutcome::Resolved(_)));
        assert!(inst.pending_approvals.is_empty());
        assert_eq!(inst.steps_completed.len(), 1);
        assert_eq!(
            inst.steps_completed[0].result["approved_by"],
            json!(["m1", "m2", "m3"])
        );
    }

    #[test]
    fn test_quorum_resolves_at_threshold() {
        let (mut inst, id) = gated_instance(ApprovalType::Quorum(2));
        let now = Utc::now();

        apply_vote(&mut inst, &id, "m3", now).unwrap();
        let outcome = apply_vote(&mut inst, &id, "m1", now).unwrap();
        assert!(matches!(outcome, VoteOutcome::Resolved(_)));
    }

    #[test]
    fn test_duplicate_vote_is_noop() {
        let (mut inst, id) = gated_instance(ApprovalType::All);
        let now = Utc::now();

        apply_vote(&mut inst, &id, "m1", now).unwrap();
        assert_eq!(
            apply_vote(&mut inst, &id, "m1", now).unwrap(),
            VoteOutcome::AlreadyVoted
        );
        assert_eq!(inst.pending_approvals[0].approved_by, vec!["m1".to_string()]);
    }

    #[test]
    fn test_vote_after_resolution_is_noop() {
        let (mut inst, id) = gated_instance(ApprovalType::Any);
        let now = Utc::now();

        apply_vote(&mut inst, &id, "m1", now).unwrap();
        assert_eq!(
            apply_vote(&mut inst, &id, "m2", now).unwrap(),
            VoteOutcome::AlreadyVoted
        );
        assert_eq!(inst.steps_completed.len(), 1);
    }

    #[test]
    fn test_unknown_gate_and_outsider() {
        let (mut inst, id) = gated_instance(ApprovalType::Any);
        let now = Utc::now();

        assert!(matches!(
            apply_vote(&mut inst, "nope", "m1", now),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            apply_vote(&mut inst, &id, "mallory", now),
            Err(AppError::Unauthorized(_))
        ));
        assert!(inst.pending_approvals[0].approved_by.is_empty());
    }

    #[test]
    fn test_expire_gates_fails_instance_once() {
        let (mut inst, id) = gated_instance(ApprovalType::All);
        let later = Utc::now() + Duration::hours(2);

        let expired = expire_gates(&mut inst, later);
        assert_eq!(expired, vec![id.clone()]);
        assert_eq!(inst.status, ExecutionStatus::Failed);
        assert_eq!(inst.error_message.as_deref(), Some(APPROVAL_EXPIRED_MESSAGE));
        assert_eq!(inst.failed_step_id.as_deref(), Some("review"));
        assert!(inst.steps_completed.is_empty());

        assert!(expire_gates(&mut inst, later).is_empty());
        assert!(matches!(
            apply_vote(&mut inst, &id, "m1", later),
            Err(AppError::ApprovalExpired(_))
        ));
    }

    #[test]
    fn test_expire_gates_ignores_open_deadlines() {
        let (mut inst, _) = gated_instance(ApprovalType::Any);
        assert!(expire_gates(&mut inst, Utc::now()).is_empty());
        assert!(inst.is_running());
    }

    #[test]
    fn test_overdue_gate_rejects_votes() {
        let (mut inst, id) = gated_instance(ApprovalType::Any);
        let later = Utc::now() + Duration::hours(2);

        assert!(matches!(
            apply_vote(&mut inst, &id, "m1", later),
            Err(AppError::ApprovalExpired(_))
        ));
        assert!(inst.pending_approvals[0].approved_by.is_empty());
    }
}
