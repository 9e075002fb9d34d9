use crate::{types::ActionInfo, AppState};
use axum::{extract::State, Json};

/// List registered action handlers
///
/// Action steps whose type is not listed here are skipped as successful
/// no-ops, or fail when `engine.strict_actions` is enabled.
#[utoipa::path(
    get,
    path = "/api/actions",
    responses(
        (status = 200, description = "Registered action handlers", body = Vec<ActionInfo>)
    ),
    tag = "workflows"
)]
pub async fn list_actions(State(state): State<AppState>) -> Json<Vec<ActionInfo>> {
    Json(state.engine.actions().describe())
}
