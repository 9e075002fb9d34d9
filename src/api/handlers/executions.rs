//! Execution handlers
//!
//! Starting a run returns as soon as the engine suspends, completes or fails;
//! callers poll `GET /api/executions/{id}` for progress.

use crate::{
    types::{
        ApprovalVoteRequest, ApprovalVoteResponse, CancelExecutionRequest, ExecutionQuery,
        Result, StartExecutionRequest, StartExecutionResponse, SweepResponse,
    },
    workflows::ExecutionInstance,
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

/// Start a workflow execution
#[utoipa::path(
    post,
    path = "/api/executions",
    request_body = StartExecutionRequest,
    responses(
        (status = 201, description = "Execution started", body = StartExecutionResponse),
        (status = 404, description = "Workflow not found")
    ),
    tag = "executions"
)]
pub async fn start_execution(
    State(state): State<AppState>,
    Json(payload): Json<StartExecutionRequest>,
) -> Result<(StatusCode, Json<StartExecutionResponse>)> {
    let response = state.engine.start_execution(payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// List executions, optionally filtered by status and workflow
#[utoipa::path(
    get,
    path = "/api/executions",
    params(ExecutionQuery),
    responses(
        (status = 200, description = "Matching executions, oldest first", body = Vec<ExecutionInstance>)
    ),
    tag = "executions"
)]
pub async fn list_executions(
    State(state): State<AppState>,
    Query(query): Query<ExecutionQuery>,
) -> Result<Json<Vec<ExecutionInstance>>> {
    let filter = query.into();
    Ok(Json(state.engine.list_executions(&filter).await?))
}

/// Get one execution
#[utoipa::path(
    get,
    path = "/api/executions/{execution_id}",
    responses(
        (status = 200, description = "Execution state", body = ExecutionInstance),
        (status = 404, description = "Execution not found")
    ),
    params(
        ("execution_id" = String, Path, description = "Execution id")
    ),
    tag = "executions"
)]
pub async fn get_execution(
    State(state): State<AppState>,
    Path(execution_id): Path<String>,
) -> Result<Json<ExecutionInstance>> {
    Ok(Json(state.engine.get_execution(&execution_id).await?))
}

/// Record an approver's vote on a pending gate
#[utoipa::path(
    post,
    path = "/api/executions/{execution_id}/approvals/{approval_id}",
    request_body = ApprovalVoteRequest,
    responses(
        (status = 200, description = "Vote applied", body = ApprovalVoteResponse),
        (status = 403, description = "Approver is not required on this gate"),
        (status = 404, description = "Execution or approval not found"),
        (status = 409, description = "Execution was cancelled or the vote kept losing races"),
        (status = 410, description = "Approval expired")
    ),
    params(
        ("execution_id" = String, Path, description = "Execution id"),
        ("approval_id" = String, Path, description = "Approval gate id")
    ),
    tag = "executions"
)]
pub async fn record_approval(
    State(state): State<AppState>,
    Path((execution_id, approval_id)): Path<(String, String)>,
    Json(payload): Json<ApprovalVoteRequest>,
) -> Result<Json<ApprovalVoteResponse>> {
    let instance = state
        .engine
        .record_approval(&execution_id, &approval_id, &payload.approver)
        .await?;
    Ok(Json(instance.into()))
}

/// Force a running execution into `failed`
#[utoipa::path(
    post,
    path = "/api/executions/{execution_id}/cancel",
    request_body = CancelExecutionRequest,
    responses(
        (status = 200, description = "Execution state after cancellation", body = ExecutionInstance),
        (status = 404, description = "Execution not found")
    ),
    params(
        ("execution_id" = String, Path, description = "Execution id")
    ),
    tag = "executions"
)]
pub async fn cancel_execution(
    State(state): State<AppState>,
    Path(execution_id): Path<String>,
    Json(payload): Json<CancelExecutionRequest>,
) -> Result<Json<ExecutionInstance>> {
    Ok(Json(
        state
            .engine
            .cancel_execution(&execution_id, &payload.reason)
            .await?,
    ))
}

/// Expire every overdue approval gate now
#[utoipa::path(
    post,
    path = "/api/sweep",
    responses(
        (status = 200, description = "Approval ids that expired", body = SweepResponse)
    ),
    tag = "executions"
)]
pub async fn sweep(State(state): State<AppState>) -> Result<Json<SweepResponse>> {
    let now = Utc::now();
    let expired = state.engine.expire_overdue(now).await?;
    Ok(Json(SweepResponse {
        swept_at: now,
        expired,
    }))
}
