//! # Steward - workflow execution with approval gates
//!
//! Steward runs declarative workflows: ordered lists of automated action
//! steps and human approval steps. Executions advance synchronously through
//! action steps, suspend on approval gates, and resume when enough approvers
//! vote. Every transition is persisted with optimistic concurrency, so
//! concurrent votes are never lost and a gate is never resolved twice.
//!
//! ## Overview
//!
//! Steward can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `steward-server` binary
//! 2. **As a library** - Embed the [`WorkflowEngine`] in your own service
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use steward::actions::ActionRegistry;
//! use steward::db::MemoryStore;
//! use steward::notify::LogNotifier;
//! use steward::workflows::{ApprovalType, EngineSettings, Step, WorkflowDefinition, WorkflowEngine};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let notifier = Arc::new(LogNotifier);
//! let actions = Arc::new(ActionRegistry::with_default_actions(store.clone(), notifier.clone()));
//! let engine = WorkflowEngine::new(store.clone(), store, actions, notifier, EngineSettings::default());
//!
//! engine.register_definition(WorkflowDefinition::new("review", "Review", vec![
//!     Step::action("open-task", "create_task").with_param("title", "Review {{document}}"),
//!     Step::approval("signoff", ["m1", "m2"], ApprovalType::Any, 172_800),
//! ])).await?;
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `local-db` | Local SQLite database (default) |
//! | `turso` | Remote Turso database |
//! | `swagger-ui` | Interactive API docs at `/swagger-ui/` |
//!
//! ## Modules
//!
//! - [`workflows`] - Definitions, instances, approval gates and the engine
//! - [`actions`] - Action handlers and their registry
//! - [`db`] - Storage traits and backends (memory, libsql)
//! - [`notify`] - Approver notification delivery
//! - [`api`] - REST API handlers and routes
//! - [`types`] - Request/response types and error handling

#![cfg_attr(docsrs, feature(doc_cfg))]

/// Action handlers run by action steps.
pub mod actions;
/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// Storage backends (in-memory, libsql/Turso).
pub mod db;
/// Notification delivery (log, webhook).
pub mod notify;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;
/// Workflow definitions, execution state and the engine.
pub mod workflows;

// Re-export commonly used types
pub use actions::ActionRegistry;
pub use db::{EntityStore, MemoryStore, TursoClient, WorkflowStore};
pub use types::{AppError, Result};
pub use utils::toml_config::{StewardConfig, StewardConfigManager};
pub use workflows::WorkflowEngine;

use axum::Router;
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// TOML-based configuration with reload support
    pub config_manager: Arc<StewardConfigManager>,
    /// The workflow engine, bound to the configured store and notifier
    pub engine: Arc<WorkflowEngine>,
}

impl AppState {
    /// Wire storage, notifier, action registry and engine from the current
    /// configuration, then register the configured workflows.
    pub async fn from_config(config_manager: Arc<StewardConfigManager>) -> Result<Self> {
        let config = config_manager.config();

        let provider = config
            .database_provider()
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        let db = provider.create_client().await?;
        let notifier = build_notifier(&config)?;
        let engine = build_engine(db.clone(), db, notifier, &config);

        let state = Self {
            config_manager,
            engine: Arc::new(engine),
        };
        state.seed_workflows().await?;
        Ok(state)
    }

    /// Register every `[[workflows]]` entry of the current configuration.
    /// Existing definitions with the same id are replaced.
    pub async fn seed_workflows(&self) -> Result<usize> {
        let config = self.config_manager.config();
        for definition in &config.workflows {
            self.engine.register_definition(definition.clone()).await?;
        }
        Ok(config.workflows.len())
    }
}

/// Webhook notifier when `notifications.webhook_url` is set, log-only otherwise
pub fn build_notifier(config: &StewardConfig) -> Result<Arc<dyn Notifier>> {
    match config.notifications.webhook_url {
        Some(ref url) => Ok(Arc::new(WebhookNotifier::new(
            url.clone(),
            config.notification_timeout(),
        )?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}

/// Engine with the built-in actions over the given collaborators
pub fn build_engine(
    store: Arc<dyn WorkflowStore>,
    entities: Arc<dyn EntityStore>,
    notifier: Arc<dyn Notifier>,
    config: &StewardConfig,
) -> WorkflowEngine {
    let actions = ActionRegistry::with_default_actions(entities.clone(), notifier.clone())
        .strict(config.engine.strict_actions);

    WorkflowEngine::new(
        store,
        entities,
        Arc::new(actions),
        notifier,
        config.engine_settings(),
    )
}

/// Full HTTP application: `/api` routes, OpenAPI document, tracing and CORS
pub fn app(state: AppState) -> Router {
    let router = Router::new().nest("/api", api::routes::create_router());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api/openapi.json", api::ApiDoc::openapi()),
    );

    #[cfg(not(feature = "swagger-ui"))]
    let router = router.route(
        "/api/openapi.json",
        axum::routing::get(|| async { axum::Json(api::ApiDoc::openapi()) }),
    );

    router
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
