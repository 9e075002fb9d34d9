use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(crate::api::handlers::health::health_check))
        .route("/actions", get(crate::api::handlers::actions::list_actions))
        // Workflow definitions
        .route(
            "/workflows",
            get(crate::api::handlers::workflows::list_workflows)
                .post(crate::api::handlers::workflows::create_workflow),
        )
        .route(
            "/workflows/{workflow_id}",
            get(crate::api::handlers::workflows::get_workflow),
        )
        // Executions
        .route(
            "/executions",
            get(crate::api::handlers::executions::list_executions)
                .post(crate::api::handlers::executions::start_execution),
        )
        .route(
            "/executions/{execution_id}",
            get(crate::api::handlers::executions::get_execution),
        )
        .route(
            "/executions/{execution_id}/approvals/{approval_id}",
            post(crate::api::handlers::executions::record_approval),
        )
        .route(
            "/executions/{execution_id}/cancel",
            post(crate::api::handlers::executions::cancel_execution),
        )
        .route("/sweep", post(crate::api::handlers::executions::sweep))
}
