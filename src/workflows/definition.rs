//! Workflow definitions
//!
//! A definition is an immutable template: an ordered list of steps, each
//! either an automated action or a human approval gate. The engine reads
//! definitions but never modifies them.

use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use utoipa::ToSchema;

/// Longest approval window a step may declare (ten years)
pub const MAX_APPROVAL_TIMEOUT_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// An immutable, ordered workflow template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WorkflowDefinition {
    /// Unique workflow identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Steps in execution order
    #[schema(value_type = Vec<Object>)]
    pub steps: Vec<Step>,
}

/// A single step within a definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub kind: StepKind,
}

/// What a step does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// Automated side effect executed by the action registry
    Action {
        action_type: String,
        #[serde(default)]
        parameters: HashMap<String, Value>,
    },
    /// Human approval gate; suspends the execution until resolved or expired
    Approval {
        approvers: BTreeSet<String>,
        #[serde(default)]
        approval_type: ApprovalType,
        timeout_secs: u64,
    },
}

/// How votes on an approval gate are aggregated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalType {
    /// Resolved by the first vote
    #[default]
    Any,
    /// Resolved once every required approver voted
    All,
    /// Resolved once at least `n` approvers voted
    Quorum(usize),
}

impl ApprovalType {
    /// Returns true when `approved_by` satisfies this aggregation rule
    pub fn is_satisfied(&self, required: &BTreeSet<String>, approved_by: &[String]) -> bool {
        match self {
            ApprovalType::Any => !approved_by.is_empty(),
            ApprovalType::All => required.iter().all(|r| approved_by.contains(r)),
            ApprovalType::Quorum(n) => approved_by.len() >= *n,
        }
    }
}

impl Step {
    /// Build an action step
    pub fn action(id: impl Into<String>, action_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind: StepKind::Action {
                action_type: action_type.into(),
                parameters: HashMap::new(),
            },
        }
    }

    /// Build an approval step
    pub fn approval<I, S>(
        id: impl Into<String>,
        approvers: I,
        approval_type: ApprovalType,
        timeout_secs: u64,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            name: None,
            kind: StepKind::Approval {
                approvers: approvers.into_iter().map(Into::into).collect(),
                approval_type,
                timeout_secs,
            },
        }
    }

    /// Attach a parameter to an action step. No-op on approval steps.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let StepKind::Action { parameters, .. } = &mut self.kind {
            parameters.insert(key.into(), value.into());
        }
        self
    }

    pub fn is_approval(&self) -> bool {
        matches!(self.kind, StepKind::Approval { .. })
    }
}

impl WorkflowDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            steps,
        }
    }

    /// Position of a step by id
    pub fn step_index(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }

    /// Check structural consistency
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Workflow id must not be empty".to_string(),
            ));
        }
        if self.steps.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "Workflow '{}' has no steps",
                self.id
            )));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.id.trim().is_empty() {
                return Err(AppError::InvalidInput(format!(
                    "Workflow '{}' contains a step with an empty id",
                    self.id
                )));
            }
            if !seen.insert(step.id.as_str()) {
                return Err(AppError::InvalidInput(format!(
                    "Workflow '{}' has duplicate step id '{}'",
                    self.id, step.id
                )));
            }

            match &step.kind {
                StepKind::Action { action_type, .. } => {
                    if action_type.trim().is_empty() {
                        return Err(AppError::InvalidInput(format!(
                            "Step '{}' has an empty action_type",
                            step.id
                        )));
                    }
                }
                StepKind::Approval {
                    approvers,
                    approval_type,
                    timeout_secs,
                } => {
                    if approvers.is_empty() {
                        return Err(AppError::InvalidInput(format!(
                            "Approval step '{}' has no approvers",
                            step.id
                        )));
                    }
                    if *timeout_secs == 0 {
                        return Err(AppError::InvalidInput(format!(
                            "Approval step '{}' must have a positive timeout",
                            step.id
                        )));
                    }
                    if *timeout_secs > MAX_APPROVAL_TIMEOUT_SECS {
                        return Err(AppError::InvalidInput(format!(
                            "Approval step '{}' timeout {}s exceeds the maximum of {}s",
                            step.id, timeout_secs, MAX_APPROVAL_TIMEOUT_SECS
                        )));
                    }
                    if let ApprovalType::Quorum(n) = approval_type {
                        if *n == 0 || *n > approvers.len() {
                            return Err(AppError::InvalidInput(format!(
                                "Approval step '{}' quorum {} is outside 1..={}",
                                step.id,
                                n,
                                approvers.len()
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
