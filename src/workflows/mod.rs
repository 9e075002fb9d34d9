//! Workflow Engine Module
//!
//! Declarative, step-ordered workflows with human approval gates.
//!
//! # Configuration
//!
//! Definitions can be seeded from `steward.toml`:
//!
//! ```toml
//! [[workflows]]
//! id = "contract-review"
//! name = "Contract review"
//!
//! [[workflows.steps]]
//! id = "open-task"
//! type = "action"
//! action_type = "create_task"
//! parameters = { title = "Review {{document}}" }
//!
//! [[workflows.steps]]
//! id = "legal-signoff"
//! type = "approval"
//! approvers = ["m1", "m2"]
//! approval_type = "any"
//! timeout_secs = 172800
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let resp = engine.start_execution(request).await?;
//! let inst = engine.record_approval(&resp.execution_id, &approval_id, "m1").await?;
//! println!("Status: {}", inst.status);
//! ```

pub mod approval;
pub mod definition;
pub mod engine;
pub mod instance;

pub use approval::{VoteOutcome, APPROVAL_EXPIRED_MESSAGE};
pub use definition::{ApprovalType, Step, StepKind, WorkflowDefinition};
pub use engine::{EngineSettings, WorkflowEngine, DELIVERIES_COLLECTION};
pub use instance::{
    ApprovalGate, ExecutionInstance, ExecutionStatus, GateResolution, StepRecord, StepStatus,
};
