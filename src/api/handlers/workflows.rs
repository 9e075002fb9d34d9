//! Workflow definition handlers
//!
//! Definitions come from `[[workflows]]` in steward.toml at startup and can
//! be added or replaced at runtime through the API.

use crate::{types::Result, workflows::WorkflowDefinition, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

/// List registered workflows
#[utoipa::path(
    get,
    path = "/api/workflows",
    responses(
        (status = 200, description = "Registered workflow definitions", body = Vec<WorkflowDefinition>)
    ),
    tag = "workflows"
)]
pub async fn list_workflows(
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkflowDefinition>>> {
    Ok(Json(state.engine.list_definitions().await?))
}

/// Get one workflow definition
#[utoipa::path(
    get,
    path = "/api/workflows/{workflow_id}",
    responses(
        (status = 200, description = "Workflow definition", body = WorkflowDefinition),
        (status = 404, description = "Workflow not found")
    ),
    params(
        ("workflow_id" = String, Path, description = "Workflow id")
    ),
    tag = "workflows"
)]
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<WorkflowDefinition>> {
    Ok(Json(state.engine.get_definition(&workflow_id).await?))
}

/// Register or replace a workflow definition
///
/// Suspended executions of a replaced workflow resume against the new step
/// list, located by the id of the step they are waiting on.
#[utoipa::path(
    post,
    path = "/api/workflows",
    request_body = WorkflowDefinition,
    responses(
        (status = 201, description = "Workflow registered", body = WorkflowDefinition),
        (status = 400, description = "Invalid definition")
    ),
    tag = "workflows"
)]
pub async fn create_workflow(
    State(state): State<AppState>,
    Json(definition): Json<WorkflowDefinition>,
) -> Result<(StatusCode, Json<WorkflowDefinition>)> {
    state.engine.register_definition(definition.clone()).await?;
    Ok((StatusCode::CREATED, Json(definition)))
}
