//! Execution instances
//!
//! The mutable, durable record of one workflow run. Instances are created
//! once per start request and move monotonically from `running` to a
//! terminal state. Only the engine mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use utoipa::ToSchema;
use uuid::Uuid;

use super::definition::ApprovalType;

/// Lifecycle status of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded for a step in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
    Failed,
}

/// One entry of `steps_completed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StepRecord {
    pub step_id: String,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub result: Value,
}

/// How a gate left `pending_approvals`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GateResolution {
    Approved,
    Expired,
    /// The execution was cancelled while the gate was open
    Cancelled,
}

/// A suspended approval step awaiting votes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ApprovalGate {
    pub approval_id: String,
    pub step_id: String,
    pub required_approvers: BTreeSet<String>,
    /// Votes in arrival order; never contains duplicates
    pub approved_by: Vec<String>,
    #[schema(value_type = Object)]
    pub approval_type: ApprovalType,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<GateResolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// The durable record of one workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExecutionInstance {
    pub id: String,
    pub workflow_id: String,
    pub scope_id: String,
    pub status: ExecutionStatus,
    pub started_by: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Non-null iff `status == running`
    pub current_step_id: Option<String>,
    pub steps_completed: Vec<StepRecord>,
    pub pending_approvals: Vec<ApprovalGate>,
    #[serde(default)]
    pub resolved_approvals: Vec<ApprovalGate>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub variables: HashMap<String, Value>,
    pub error_message: Option<String>,
    #[serde(default)]
    pub failed_step_id: Option<String>,
    /// Optimistic concurrency counter, bumped on every persisted write
    #[serde(default)]
    pub version: u64,
}

impl ExecutionInstance {
    pub fn new(
        workflow_id: impl Into<String>,
        scope_id: impl Into<String>,
        started_by: impl Into<String>,
        variables: HashMap<String, Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            workflow_id: workflow_id.into(),
            scope_id: scope_id.into(),
            status: ExecutionStatus::Running,
            started_by: started_by.into(),
            started_at: Utc::now(),
            completed_at: None,
            current_step_id: None,
            steps_completed: Vec::new(),
            pending_approvals: Vec::new(),
            resolved_approvals: Vec::new(),
            variables,
            error_message: None,
            failed_step_id: None,
            version: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == ExecutionStatus::Running
    }

    pub fn find_gate(&self, approval_id: &str) -> Option<&ApprovalGate> {
        self.pending_approvals
            .iter()
            .find(|g| g.approval_id == approval_id)
    }

    pub fn find_resolved_gate(&self, approval_id: &str) -> Option<&ApprovalGate> {
        self.resolved_approvals
            .iter()
            .find(|g| g.approval_id == approval_id)
    }

    /// Remove a pending gate and archive it with the given resolution
    pub(crate) fn close_gate(
        &mut self,
        approval_id: &str,
        resolution: GateResolution,
        at: DateTime<Utc>,
    ) -> Option<ApprovalGate> {
        let idx = self
            .pending_approvals
            .iter()
            .position(|g| g.approval_id == approval_id)?;
        let mut gate = self.pending_approvals.remove(idx);
        gate.resolution = Some(resolution);
        gate.resolved_at = Some(at);
        self.resolved_approvals.push(gate.clone());
        Some(gate)
    }

    /// Terminal success transition
    pub(crate) fn mark_completed(&mut self, at: DateTime<Utc>) {
        self.status = ExecutionStatus::Completed;
        self.current_step_id = None;
        self.completed_at = Some(at);
    }

    /// Archive every pending gate with the given resolution
    pub(crate) fn close_all_gates(&mut self, resolution: GateResolution, at: DateTime<Utc>) {
        for mut gate in std::mem::take(&mut self.pending_approvals) {
            gate.resolution = Some(resolution);
            gate.resolved_at = Some(at);
            self.resolved_approvals.push(gate);
        }
    }

    /// Terminal failure transition; leaves `steps_completed` untouched
    pub(crate) fn mark_failed(&mut self, message: impl Into<String>, at: DateTime<Utc>) {
        self.failed_step_id = self.current_step_id.take();
        self.status = ExecutionStatus::Failed;
        self.error_message = Some(message.into());
        self.completed_at = Some(at);
    }
}
