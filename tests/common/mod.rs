//! Common test utilities for the integration tests.

#![allow(dead_code)]

pub mod mocks;

use std::collections::HashMap;
use std::sync::Arc;
use steward::actions::ActionRegistry;
use steward::db::{EntityStore, MemoryStore, WorkflowStore};
use steward::notify::Notifier;
use steward::types::StartExecutionRequest;
use steward::workflows::{ApprovalType, EngineSettings, Step, WorkflowDefinition, WorkflowEngine};

/// Engine over the given store and notifier with the built-in actions.
pub fn engine(
    store: Arc<dyn WorkflowStore>,
    entities: Arc<dyn EntityStore>,
    notifier: Arc<dyn Notifier>,
) -> WorkflowEngine {
    let actions = ActionRegistry::with_default_actions(entities.clone(), notifier.clone());
    WorkflowEngine::new(
        store,
        entities,
        Arc::new(actions),
        notifier,
        EngineSettings::default(),
    )
}

/// Engine over a fresh `MemoryStore`, returning the store for inspection.
pub fn memory_engine(notifier: Arc<dyn Notifier>) -> (WorkflowEngine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (engine(store.clone(), store.clone(), notifier), store)
}

/// create_task, then an approval gate, then send_notification
pub fn document_review(approval_type: ApprovalType, timeout_secs: u64) -> WorkflowDefinition {
    WorkflowDefinition::new(
        "document-review",
        "Document review",
        vec![
            Step::action("open-task", "create_task")
                .with_param("title", "Review {{document}}")
                .with_param("due_in_days", 2),
            Step::approval(
                "manager-approval",
                ["manager1", "manager2"],
                approval_type,
                timeout_secs,
            ),
            Step::action("notify-author", "send_notification")
                .with_param("recipient", "{{author}}")
                .with_param("message", "{{document}} was approved"),
        ],
    )
}

pub fn start_request(workflow_id: &str) -> StartExecutionRequest {
    let variables: HashMap<String, serde_json::Value> = serde_json::from_value(serde_json::json!({
        "document": "Q3 report",
        "author": "alice"
    }))
    .unwrap();

    StartExecutionRequest {
        workflow_id: workflow_id.to_string(),
        scope_id: "doc-42".to_string(),
        started_by: "alice".to_string(),
        variables,
    }
}
