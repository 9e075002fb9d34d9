use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};

use crate::db::ExecutionFilter;
use crate::workflows::{ApprovalGate, ExecutionInstance, ExecutionStatus};

// ============= API Request/Response Types =============

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StartExecutionRequest {
    pub workflow_id: String,
    pub scope_id: String,
    /// Identity of the caller starting the run
    #[serde(default = "default_started_by")]
    pub started_by: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub variables: HashMap<String, Value>,
}

fn default_started_by() -> String {
    "system".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StartExecutionResponse {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApprovalVoteRequest {
    pub approver: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApprovalVoteResponse {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub current_step_id: Option<String>,
    pub pending_approvals: Vec<ApprovalGate>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CancelExecutionRequest {
    #[serde(default = "default_cancel_reason")]
    pub reason: String,
}

fn default_cancel_reason() -> String {
    "cancelled by caller".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExecutionQuery {
    pub status: Option<ExecutionStatus>,
    pub workflow_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SweepResponse {
    pub swept_at: DateTime<Utc>,
    pub expired: Vec<String>,
}

impl From<ExecutionInstance> for ApprovalVoteResponse {
    fn from(instance: ExecutionInstance) -> Self {
        Self {
            execution_id: instance.id,
            status: instance.status,
            current_step_id: instance.current_step_id,
            pending_approvals: instance.pending_approvals,
            error_message: instance.error_message,
        }
    }
}

impl From<ExecutionQuery> for ExecutionFilter {
    fn from(query: ExecutionQuery) -> Self {
        Self {
            status: query.status,
            workflow_id: query.workflow_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

/// A registered action handler
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActionInfo {
    pub action_type: String,
    pub description: String,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Action execution failed: {0}")]
    ActionExecution(String),

    #[error("Approval expired: {0}")]
    ApprovalExpired(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ApprovalExpired(_) => StatusCode::GONE,
            AppError::ActionExecution(_)
            | AppError::Database(_)
            | AppError::Notification(_)
            | AppError::Configuration(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("Serialization failed: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
