//! Workflow Engine
//!
//! Drives execution instances through their definition's steps. Every unit
//! of work is one short call triggered by an outside event: a start request,
//! an approval vote, an expiry sweep or a cancellation. Between events an
//! instance is inert state in the [`WorkflowStore`].
//!
//! Each transition is persisted with a compare-and-swap on the instance
//! version, so concurrent callers touching the same instance either see each
//! other's writes or retry.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::approval::{self, VoteOutcome};
use super::definition::{StepKind, WorkflowDefinition};
use super::instance::{
    ApprovalGate, ExecutionInstance, GateResolution, StepRecord, StepStatus,
};
use crate::actions::builtin::SET_VARIABLE_ACTION;
use crate::actions::{ActionContext, ActionRegistry};
use crate::db::{EntityStore, ExecutionFilter, WorkflowStore};
use crate::notify::{Notification, Notifier};
use crate::types::{AppError, Result, StartExecutionRequest, StartExecutionResponse};

/// Collection that holds approval notification outcomes
pub const DELIVERIES_COLLECTION: &str = "notification_deliveries";

/// Runtime knobs for the engine
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// How many times a vote, sweep or cancel is retried after losing a
    /// version race
    pub max_conflict_retries: u32,
    /// Upper bound on a single approver notification
    pub notification_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_conflict_retries: 5,
            notification_timeout: Duration::from_secs(5),
        }
    }
}

/// Workflow engine that advances executions step by step
pub struct WorkflowEngine {
    store: Arc<dyn WorkflowStore>,
    entities: Arc<dyn EntityStore>,
    actions: Arc<ActionRegistry>,
    notifier: Arc<dyn Notifier>,
    settings: EngineSettings,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        entities: Arc<dyn EntityStore>,
        actions: Arc<ActionRegistry>,
        notifier: Arc<dyn Notifier>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            entities,
            actions,
            notifier,
            settings,
        }
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    // ============= Definitions =============

    /// Validate and store a definition, replacing any with the same id
    pub async fn register_definition(&self, definition: WorkflowDefinition) -> Result<()> {
        definition.validate()?;
        self.store.put_definition(&definition).await?;
        tracing::info!(workflow_id = %definition.id, steps = definition.steps.len(), "Registered workflow");
        Ok(())
    }

    pub async fn get_definition(&self, workflow_id: &str) -> Result<WorkflowDefinition> {
        self.store
            .get_definition(workflow_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Workflow {} not found", workflow_id)))
    }

    pub async fn list_definitions(&self) -> Result<Vec<WorkflowDefinition>> {
        self.store.list_definitions().await
    }

    // ============= Executions =============

    /// Create an instance and run it until it completes, fails or suspends
    /// on an approval step.
    pub async fn start_execution(
        &self,
        request: StartExecutionRequest,
    ) -> Result<StartExecutionResponse> {
        let definition = self.get_definition(&request.workflow_id).await?;

        let mut instance = ExecutionInstance::new(
            &definition.id,
            request.scope_id,
            request.started_by,
            request.variables,
        );
        instance.current_step_id = definition.steps.first().map(|s| s.id.clone());
        self.store.create_instance(&instance).await?;

        tracing::info!(
            execution_id = %instance.id,
            workflow_id = %definition.id,
            scope_id = %instance.scope_id,
            "Started execution"
        );

        let started_at = instance.started_at;
        let instance = self.advance(&definition, instance, 0).await?;

        Ok(StartExecutionResponse {
            execution_id: instance.id,
            status: instance.status,
            started_at,
        })
    }

    pub async fn get_execution(&self, execution_id: &str) -> Result<ExecutionInstance> {
        self.store
            .get_instance(execution_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Execution {} not found", execution_id)))
    }

    pub async fn list_executions(&self, filter: &ExecutionFilter) -> Result<Vec<ExecutionInstance>> {
        self.store.list_instances(filter).await
    }

    /// Run steps from `index` onwards.
    ///
    /// Action steps are executed back to back; an approval step opens a gate
    /// and suspends. Running past the last step completes the instance. Any
    /// failure is recorded on the instance rather than returned, except a
    /// failure to persist the failure itself.
    pub async fn advance(
        &self,
        definition: &WorkflowDefinition,
        mut instance: ExecutionInstance,
        mut index: usize,
    ) -> Result<ExecutionInstance> {
        while instance.is_running() {
            let Some(step) = definition.steps.get(index) else {
                instance.mark_completed(Utc::now());
                self.persist_or_fail(&mut instance).await?;
                tracing::info!(execution_id = %instance.id, "Execution completed");
                break;
            };
            instance.current_step_id = Some(step.id.clone());

            match &step.kind {
                StepKind::Action {
                    action_type,
                    parameters,
                } => {
                    let started_at = Utc::now();
                    let ctx = ActionContext {
                        execution_id: instance.id.clone(),
                        scope_id: instance.scope_id.clone(),
                        step_id: step.id.clone(),
                        variables: instance.variables.clone(),
                    };

                    match self.actions.execute(action_type, &ctx, parameters).await {
                        Ok(result) => {
                            if action_type == SET_VARIABLE_ACTION {
                                merge_variable(&mut instance, &result);
                            }
                            instance.steps_completed.push(StepRecord {
                                step_id: step.id.clone(),
                                status: StepStatus::Completed,
                                started_at,
                                completed_at: Utc::now(),
                                result,
                            });
                            index += 1;
                            instance.current_step_id =
                                definition.steps.get(index).map(|s| s.id.clone());
                            self.persist_or_fail(&mut instance).await?;
                        }
                        Err(e) => {
                            let now = Utc::now();
                            tracing::warn!(
                                execution_id = %instance.id,
                                step_id = %step.id,
                                action_type = %action_type,
                                "Action failed: {}",
                                e
                            );
                            instance.steps_completed.push(StepRecord {
                                step_id: step.id.clone(),
                                status: StepStatus::Failed,
                                started_at,
                                completed_at: now,
                                result: json!({ "error": e.to_string() }),
                            });
                            instance.mark_failed(e.to_string(), now);
                            self.persist_failure(&mut instance).await?;
                        }
                    }
                }
                StepKind::Approval { .. } => {
                    let gate = match approval::open_gate(step, Utc::now()) {
                        Ok(gate) => gate,
                        Err(e) => {
                            instance.mark_failed(e.to_string(), Utc::now());
                            self.persist_failure(&mut instance).await?;
                            break;
                        }
                    };
                    instance.pending_approvals.push(gate.clone());
                    self.persist_or_fail(&mut instance).await?;

                    tracing::info!(
                        execution_id = %instance.id,
                        step_id = %step.id,
                        approval_id = %gate.approval_id,
                        expires_at = %gate.expires_at,
                        "Waiting for approval"
                    );
                    self.notify_approvers(&instance, &gate).await;
                    break;
                }
            }
        }

        Ok(instance)
    }

    /// Apply one approver's vote and, if the gate resolves, continue with
    /// the step after it.
    pub async fn record_approval(
        &self,
        execution_id: &str,
        approval_id: &str,
        approver: &str,
    ) -> Result<ExecutionInstance> {
        let mut attempt = 0;
        loop {
            let mut instance = self.get_execution(execution_id).await?;
            let outcome = approval::apply_vote(&mut instance, approval_id, approver, Utc::now())?;

            let resolved = match outcome {
                VoteOutcome::AlreadyVoted => {
                    tracing::debug!(execution_id, approval_id, approver, "Duplicate vote ignored");
                    return Ok(instance);
                }
                VoteOutcome::Recorded => None,
                VoteOutcome::Resolved(gate) => Some(gate),
            };

            // Gate removal, vote and approval record land in one write
            if let Err(e) = self.persist(&mut instance).await {
                if self.should_retry(&e, &mut attempt) {
                    continue;
                }
                return Err(e);
            }

            tracing::info!(
                execution_id,
                approval_id,
                approver,
                resolved = resolved.is_some(),
                "Recorded approval"
            );

            return match resolved {
                None => Ok(instance),
                Some(gate) => self.resume_after(instance, &gate).await,
            };
        }
    }

    async fn resume_after(
        &self,
        mut instance: ExecutionInstance,
        gate: &ApprovalGate,
    ) -> Result<ExecutionInstance> {
        let definition = match self.get_definition(&instance.workflow_id).await {
            Ok(d) => d,
            Err(e) => {
                instance.mark_failed(e.to_string(), Utc::now());
                self.persist_failure(&mut instance).await?;
                return Ok(instance);
            }
        };

        let Some(index) = definition.step_index(&gate.step_id) else {
            instance.mark_failed(
                format!("Step '{}' no longer exists in workflow {}", gate.step_id, definition.id),
                Utc::now(),
            );
            self.persist_failure(&mut instance).await?;
            return Ok(instance);
        };

        self.advance(&definition, instance, index + 1).await
    }

    /// Expire overdue gates on one execution. Returns the expired approval
    /// ids; empty when nothing was due or the execution is already terminal.
    pub async fn expire_sweep(
        &self,
        execution_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let mut attempt = 0;
        loop {
            let mut instance = self.get_execution(execution_id).await?;
            let expired = approval::expire_gates(&mut instance, now);
            if expired.is_empty() {
                return Ok(expired);
            }

            if let Err(e) = self.persist(&mut instance).await {
                if self.should_retry(&e, &mut attempt) {
                    continue;
                }
                return Err(e);
            }

            tracing::warn!(
                execution_id,
                failed_step_id = ?instance.failed_step_id,
                expired = ?expired,
                "Approval expired, execution failed"
            );
            return Ok(expired);
        }
    }

    /// Sweep every running execution with an overdue gate.
    ///
    /// Failures on one execution are logged and do not stop the sweep.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let running = self.store.list_instances(&ExecutionFilter::running()).await?;
        let mut expired = Vec::new();

        for instance in running
            .iter()
            .filter(|i| i.pending_approvals.iter().any(|g| g.expires_at <= now))
        {
            match self.expire_sweep(&instance.id, now).await {
                Ok(ids) => expired.extend(ids),
                Err(e) => {
                    tracing::error!(execution_id = %instance.id, "Expiry sweep failed: {}", e)
                }
            }
        }

        Ok(expired)
    }

    /// Force a running execution into `failed`. Terminal executions are
    /// returned unchanged. Completed steps are not compensated.
    pub async fn cancel_execution(
        &self,
        execution_id: &str,
        reason: &str,
    ) -> Result<ExecutionInstance> {
        let mut attempt = 0;
        loop {
            let mut instance = self.get_execution(execution_id).await?;
            if !instance.is_running() {
                return Ok(instance);
            }

            let now = Utc::now();
            instance.close_all_gates(GateResolution::Cancelled, now);
            instance.mark_failed(format!("cancelled: {}", reason), now);

            if let Err(e) = self.persist(&mut instance).await {
                if self.should_retry(&e, &mut attempt) {
                    continue;
                }
                return Err(e);
            }

            tracing::info!(execution_id, reason, "Execution cancelled");
            return Ok(instance);
        }
    }

    // ============= Persistence helpers =============

    /// Write the instance, bumping its version under compare-and-swap
    async fn persist(&self, instance: &mut ExecutionInstance) -> Result<()> {
        let expected = instance.version;
        instance.version = expected + 1;
        if let Err(e) = self.store.update_instance(instance, expected).await {
            instance.version = expected;
            return Err(e);
        }
        Ok(())
    }

    /// Persist a forward transition; if that fails, try to record the
    /// failure instead
    async fn persist_or_fail(&self, instance: &mut ExecutionInstance) -> Result<()> {
        let Err(e) = self.persist(instance).await else {
            return Ok(());
        };

        tracing::error!(execution_id = %instance.id, "Failed to persist transition: {}", e);
        let Ok(mut stored) = self.get_execution(&instance.id).await else {
            return Err(e);
        };
        if !stored.is_running() {
            // Someone else already terminated it
            *instance = stored;
            return Ok(());
        }
        stored.mark_failed(e.to_string(), Utc::now());
        self.persist_failure(&mut stored).await?;
        *instance = stored;
        Ok(())
    }

    async fn persist_failure(&self, instance: &mut ExecutionInstance) -> Result<()> {
        self.persist(instance).await.map_err(|e| {
            tracing::error!(
                execution_id = %instance.id,
                "Could not record failure, execution may be stuck in running: {}",
                e
            );
            e
        })
    }

    fn should_retry(&self, err: &AppError, attempt: &mut u32) -> bool {
        if !matches!(err, AppError::Conflict(_)) || *attempt >= self.settings.max_conflict_retries {
            return false;
        }
        *attempt += 1;
        tracing::debug!(attempt = *attempt, "Version conflict, retrying: {}", err);
        true
    }

    // ============= Notifications =============

    /// Notify every approver of a new gate concurrently, so the caller waits
    /// at most one notification timeout. Each outcome is stored as a
    /// delivery record.
    async fn notify_approvers(&self, instance: &ExecutionInstance, gate: &ApprovalGate) {
        let sends = gate
            .required_approvers
            .iter()
            .map(|approver| self.notify_approver(instance, gate, approver));
        join_all(sends).await;
    }

    async fn notify_approver(&self, instance: &ExecutionInstance, gate: &ApprovalGate, approver: &str) {
        let notification = Notification::approval_requested(
            approver,
            &instance.id,
            &gate.approval_id,
            &gate.step_id,
        );

        let outcome = tokio::time::timeout(
            self.settings.notification_timeout,
            self.notifier.notify(&notification),
        )
        .await;

        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!(
                "timed out after {}ms",
                self.settings.notification_timeout.as_millis()
            )),
        };
        if let Some(ref err) = error {
            tracing::warn!(approver, approval_id = %gate.approval_id, "Approver notification failed: {}", err);
        }

        let delivery = json!({
            "execution_id": instance.id,
            "approval_id": gate.approval_id,
            "recipient": approver,
            "delivered": error.is_none(),
            "error": error,
            "attempted_at": Utc::now().to_rfc3339(),
        });
        if let Err(e) = self.entities.create_entity(DELIVERIES_COLLECTION, delivery).await {
            tracing::warn!(approval_id = %gate.approval_id, "Failed to record delivery: {}", e);
        }
    }
}

fn merge_variable(instance: &mut ExecutionInstance, result: &Value) {
    if let (Some(name), Some(value)) = (result["name"].as_str(), result.get("value")) {
        instance.variables.insert(name.to_string(), value.clone());
    }
}
