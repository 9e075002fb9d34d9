//! HTTP API Handlers and Routes
//!
//! This module provides the REST API layer for Steward, built on the Axum web framework.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! ## Workflows (`/api/workflows`)
//! - `GET /api/workflows` - List workflow definitions
//! - `POST /api/workflows` - Register or replace a definition
//! - `GET /api/workflows/{id}` - Get one definition
//! - `GET /api/actions` - List registered action handlers
//!
//! ## Executions (`/api/executions`)
//! - `POST /api/executions` - Start an execution
//! - `GET /api/executions` - List executions (`?status=&workflow_id=`)
//! - `GET /api/executions/{id}` - Poll one execution
//! - `POST /api/executions/{id}/approvals/{approval_id}` - Vote on a gate
//! - `POST /api/executions/{id}/cancel` - Force an execution to fail
//! - `POST /api/sweep` - Expire overdue approval gates
//!
//! ## Health (`/api/health`)
//! - `GET /api/health` - Health check endpoint
//!
//! # OpenAPI Documentation
//!
//! The OpenAPI document is served at `/api/openapi.json`. When the
//! `swagger-ui` feature is enabled, interactive API documentation is
//! available at `/swagger-ui/`.

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;

use crate::types::{
    ActionInfo, ApprovalVoteRequest, ApprovalVoteResponse, CancelExecutionRequest,
    HealthResponse, StartExecutionRequest, StartExecutionResponse, SweepResponse,
};
use crate::workflows::{
    ApprovalGate, ExecutionInstance, ExecutionStatus, GateResolution, StepRecord, StepStatus,
    WorkflowDefinition,
};
use utoipa::OpenApi;

/// OpenAPI document for the HTTP surface
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Steward",
        description = "Workflow execution with action steps and approval gates"
    ),
    paths(
        handlers::health::health_check,
        handlers::actions::list_actions,
        handlers::workflows::list_workflows,
        handlers::workflows::get_workflow,
        handlers::workflows::create_workflow,
        handlers::executions::start_execution,
        handlers::executions::list_executions,
        handlers::executions::get_execution,
        handlers::executions::record_approval,
        handlers::executions::cancel_execution,
        handlers::executions::sweep,
    ),
    components(schemas(
        HealthResponse,
        ActionInfo,
        WorkflowDefinition,
        StartExecutionRequest,
        StartExecutionResponse,
        ApprovalVoteRequest,
        ApprovalVoteResponse,
        CancelExecutionRequest,
        SweepResponse,
        ExecutionInstance,
        ExecutionStatus,
        StepRecord,
        StepStatus,
        ApprovalGate,
        GateResolution,
    )),
    tags(
        (name = "workflows", description = "Workflow definitions and action handlers"),
        (name = "executions", description = "Execution lifecycle and approvals"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
