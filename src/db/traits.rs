//! Storage abstraction traits
//!
//! This module provides the `WorkflowStore` and `EntityStore` traits that
//! abstract over the storage backends (in-memory maps, in-memory SQLite,
//! file-based SQLite, remote Turso).
//!
//! # Example
//!
//! ```rust,ignore
//! use steward::db::DatabaseProvider;
//!
//! // Use in-memory SQLite (default for development/testing)
//! let db = DatabaseProvider::Memory.create_client().await?;
//!
//! // Use file-based SQLite
//! let db = DatabaseProvider::SQLite { path: "data/steward.db".into() }.create_client().await?;
//! ```

use crate::types::Result;
use crate::workflows::{ExecutionInstance, ExecutionStatus, WorkflowDefinition};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Database provider configuration
#[derive(Debug, Clone, Default)]
pub enum DatabaseProvider {
    /// In-memory SQLite database (ephemeral, lost on restart)
    #[default]
    Memory,
    /// File-based SQLite database
    SQLite {
        /// Path to the SQLite database file
        path: String,
    },
    /// Remote Turso database (requires network access)
    #[cfg(feature = "turso")]
    Turso {
        /// The Turso database URL (e.g., `libsql://your-db.turso.io`)
        url: String,
        /// Authentication token for the Turso database
        auth_token: String,
    },
}

impl DatabaseProvider {
    /// Create a database client from this provider configuration
    pub async fn create_client(&self) -> Result<Arc<super::turso::TursoClient>> {
        let client = match self {
            DatabaseProvider::Memory => super::turso::TursoClient::new_memory().await?,
            DatabaseProvider::SQLite { path } => super::turso::TursoClient::new_local(path).await?,
            #[cfg(feature = "turso")]
            DatabaseProvider::Turso { url, auth_token } => {
                super::turso::TursoClient::new_remote(url.clone(), auth_token.clone()).await?
            }
        };
        Ok(Arc::new(client))
    }

    /// Select a provider from a configured database url (`:memory:` or a path)
    pub fn from_url(url: &str) -> Self {
        if url.is_empty() || url == ":memory:" {
            DatabaseProvider::Memory
        } else {
            DatabaseProvider::SQLite {
                path: url.to_string(),
            }
        }
    }
}

/// Filter for listing executions
#[derive(Debug, Clone, Default)]
pub struct ExecutionFilter {
    pub status: Option<ExecutionStatus>,
    pub workflow_id: Option<String>,
}

impl ExecutionFilter {
    pub fn running() -> Self {
        Self {
            status: Some(ExecutionStatus::Running),
            workflow_id: None,
        }
    }

    pub fn matches(&self, instance: &ExecutionInstance) -> bool {
        self.status.is_none_or(|s| s == instance.status)
            && self
                .workflow_id
                .as_deref()
                .is_none_or(|w| w == instance.workflow_id)
    }
}

/// Durable storage for definitions and execution instances
///
/// Instance writes are compare-and-swap on `ExecutionInstance::version`:
/// `update_instance` succeeds only when the stored version equals
/// `expected_version`, and fails with `AppError::Conflict` otherwise.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    // ============== Definition Operations ==============

    /// Insert or replace a workflow definition
    async fn put_definition(&self, definition: &WorkflowDefinition) -> Result<()>;

    /// Get a workflow definition by id
    async fn get_definition(&self, id: &str) -> Result<Option<WorkflowDefinition>>;

    /// List all workflow definitions
    async fn list_definitions(&self) -> Result<Vec<WorkflowDefinition>>;

    // ============== Instance Operations ==============

    /// Create a new execution instance; fails with `Conflict` if the id exists
    async fn create_instance(&self, instance: &ExecutionInstance) -> Result<()>;

    /// Get an execution instance by id
    async fn get_instance(&self, id: &str) -> Result<Option<ExecutionInstance>>;

    /// Replace the stored instance if its version still equals `expected_version`
    async fn update_instance(
        &self,
        instance: &ExecutionInstance,
        expected_version: u64,
    ) -> Result<()>;

    /// List execution instances matching a filter
    async fn list_instances(&self, filter: &ExecutionFilter) -> Result<Vec<ExecutionInstance>>;
}

/// Auxiliary business records created by action handlers (tasks, tags, ...)
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Create an entity in a collection, returning its generated id
    async fn create_entity(&self, collection: &str, data: Value) -> Result<String>;

    /// Get an entity by collection and id
    async fn get_entity(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Shallow-merge `patch` into an existing entity; `NotFound` if absent
    async fn update_entity(&self, collection: &str, id: &str, patch: Value) -> Result<()>;

    /// List all entities in a collection
    async fn list_entities(&self, collection: &str) -> Result<Vec<Value>>;
}

/// Shallow JSON object merge used by entity updates
pub(crate) fn merge_patch(target: &mut Value, patch: Value) {
    match (target.as_object_mut(), patch) {
        (Some(existing), Value::Object(fields)) => {
            for (k, v) in fields {
                existing.insert(k, v);
            }
        }
        (_, other) => *target = other,
    }
}
