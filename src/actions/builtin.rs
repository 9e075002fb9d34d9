use crate::actions::registry::{ActionContext, ActionHandler};
use crate::db::EntityStore;
use crate::notify::{Notification, Notifier};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Action type whose result the engine merges into the instance variables
pub const SET_VARIABLE_ACTION: &str = "set_variable";

fn required_str<'a>(
    params: &'a HashMap<String, Value>,
    key: &str,
    action: &str,
) -> Result<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            AppError::ActionExecution(format!("{}: missing '{}' parameter", action, key))
        })
}

fn optional_str<'a>(params: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

/// Creates a row in the `tasks` collection
pub struct CreateTaskAction {
    entities: Arc<dyn EntityStore>,
}

impl CreateTaskAction {
    pub fn new(entities: Arc<dyn EntityStore>) -> Self {
        Self { entities }
    }
}

#[async_trait]
impl ActionHandler for CreateTaskAction {
    fn action_type(&self) -> &str {
        "create_task"
    }

    fn description(&self) -> &str {
        "Create a task linked to the execution's scope"
    }

    async fn execute(&self, ctx: &ActionContext, params: &HashMap<String, Value>) -> Result<Value> {
        let title = required_str(params, "title", self.action_type())?;
        let due_at = match params.get("due_in_days").and_then(|v| v.as_i64()) {
            Some(days) => Some(
                Duration::try_days(days)
                    .and_then(|d| Utc::now().checked_add_signed(d))
                    .ok_or_else(|| {
                        AppError::ActionExecution(format!(
                            "{}: due_in_days {} is out of range",
                            self.action_type(),
                            days
                        ))
                    })?
                    .to_rfc3339(),
            ),
            None => None,
        };

        let task_id = self
            .entities
            .create_entity(
                "tasks",
                json!({
                    "title": title,
                    "description": optional_str(params, "description"),
                    "assignee": optional_str(params, "assignee"),
                    "due_at": due_at,
                    "status": "open",
                    "scope_id": ctx.scope_id,
                    "execution_id": ctx.execution_id,
                    "step_id": ctx.step_id,
                }),
            )
            .await?;

        Ok(json!({ "executed": true, "task_id": task_id }))
    }
}

/// Sends a message through the configured notifier.
///
/// Delivery failures are reported in the result and do not fail the step.
pub struct SendNotificationAction {
    notifier: Arc<dyn Notifier>,
}

impl SendNotificationAction {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl ActionHandler for SendNotificationAction {
    fn action_type(&self) -> &str {
        "send_notification"
    }

    fn description(&self) -> &str {
        "Notify a recipient"
    }

    async fn execute(&self, ctx: &ActionContext, params: &HashMap<String, Value>) -> Result<Value> {
        let recipient = required_str(params, "recipient", self.action_type())?;
        let message = required_str(params, "message", self.action_type())?;

        let notification = Notification::message(recipient, &ctx.execution_id, message);
        match self.notifier.notify(&notification).await {
            Ok(()) => Ok(json!({ "executed": true, "delivered": true, "recipient": recipient })),
            Err(e) => {
                tracing::warn!(recipient, execution_id = %ctx.execution_id, "Notification failed: {}", e);
                Ok(json!({
                    "executed": true,
                    "delivered": false,
                    "recipient": recipient,
                    "error": e.to_string(),
                }))
            }
        }
    }
}

/// Tags the scope (or an explicit `target`)
pub struct AddTagAction {
    entities: Arc<dyn EntityStore>,
}

impl AddTagAction {
    pub fn new(entities: Arc<dyn EntityStore>) -> Self {
        Self { entities }
    }
}

#[async_trait]
impl ActionHandler for AddTagAction {
    fn action_type(&self) -> &str {
        "add_tag"
    }

    fn description(&self) -> &str {
        "Attach a tag to a record"
    }

    async fn execute(&self, ctx: &ActionContext, params: &HashMap<String, Value>) -> Result<Value> {
        let tag = required_str(params, "tag", self.action_type())?;
        let target = optional_str(params, "target").unwrap_or(&ctx.scope_id);

        let tag_id = self
            .entities
            .create_entity(
                "tags",
                json!({
                    "tag": tag,
                    "target": target,
                    "execution_id": ctx.execution_id,
                }),
            )
            .await?;

        Ok(json!({ "executed": true, "tag_id": tag_id, "tag": tag, "target": target }))
    }
}

/// Marks a document archived
pub struct ArchiveDocumentAction {
    entities: Arc<dyn EntityStore>,
}

impl ArchiveDocumentAction {
    pub fn new(entities: Arc<dyn EntityStore>) -> Self {
        Self { entities }
    }
}

#[async_trait]
impl ActionHandler for ArchiveDocumentAction {
    fn action_type(&self) -> &str {
        "archive_document"
    }

    fn description(&self) -> &str {
        "Archive a document"
    }

    async fn execute(&self, ctx: &ActionContext, params: &HashMap<String, Value>) -> Result<Value> {
        let document_id = required_str(params, "document_id", self.action_type())?;

        self.entities
            .update_entity(
                "documents",
                document_id,
                json!({
                    "archived": true,
                    "archived_at": Utc::now().to_rfc3339(),
                    "archived_by_execution": ctx.execution_id,
                }),
            )
            .await
            .map_err(|e| match e {
                AppError::NotFound(msg) => AppError::ActionExecution(msg),
                other => other,
            })?;

        Ok(json!({ "executed": true, "document_id": document_id, "archived": true }))
    }
}

/// Echoes `{name, value}`; the engine merges it into the instance variables
pub struct SetVariableAction;

#[async_trait]
impl ActionHandler for SetVariableAction {
    fn action_type(&self) -> &str {
        SET_VARIABLE_ACTION
    }

    fn description(&self) -> &str {
        "Set an execution variable"
    }

    async fn execute(&self, _ctx: &ActionContext, params: &HashMap<String, Value>) -> Result<Value> {
        let name = required_str(params, "name", self.action_type())?;
        let value = params.get("value").cloned().ok_or_else(|| {
            AppError::ActionExecution("set_variable: missing 'value' parameter".to_string())
        })?;

        Ok(json!({ "executed": true, "name": name, "value": value }))
    }
}
