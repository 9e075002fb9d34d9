use super::traits::{merge_patch, EntityStore, ExecutionFilter, WorkflowStore};
use crate::types::{AppError, Result};
use crate::workflows::{ExecutionInstance, WorkflowDefinition};
use async_trait::async_trait;
use chrono::Utc;
use libsql::{Builder, Connection, Database};
use serde_json::Value;

/// libsql-backed store for definitions, executions and entities.
///
/// Records are stored as JSON bodies next to the columns queries filter on
/// (`status`, `workflow_id`, `version`).
pub struct TursoClient {
    // Kept alive for the lifetime of the connection
    _db: Database,
    conn: Connection,
}

impl TursoClient {
    #[cfg(feature = "turso")]
    pub async fn new_remote(url: String, auth_token: String) -> Result<Self> {
        let db = Builder::new_remote(url, auth_token)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Turso: {}", e)))?;

        Self::from_database(db).await
    }

    pub async fn new_local(path: &str) -> Result<Self> {
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to open database {}: {}", path, e)))?;

        Self::from_database(db).await
    }

    pub async fn new_memory() -> Result<Self> {
        Self::new_local(":memory:").await
    }

    async fn from_database(db: Database) -> Result<Self> {
        let conn = db
            .connect()
            .map_err(|e| AppError::Database(format!("Failed to get connection: {}", e)))?;

        let client = Self { _db: db, conn };
        client.initialize_schema().await?;

        Ok(client)
    }

    pub fn connection(&self) -> Result<Connection> {
        Ok(self.conn.clone())
    }

    async fn initialize_schema(&self) -> Result<()> {
        let conn = self.connection()?;

        // Workflow definitions table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS workflow_definitions (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to create workflow_definitions table: {}", e))
        })?;

        // Execution instances table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS execution_instances (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                scope_id TEXT NOT NULL,
                status TEXT NOT NULL,
                version INTEGER NOT NULL,
                body TEXT NOT NULL,
                started_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to create execution_instances table: {}", e))
        })?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_execution_instances_status
             ON execution_instances (status)",
            (),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create status index: {}", e)))?;

        // Auxiliary entities table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS entities (
                id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create entities table: {}", e)))?;

        Ok(())
    }

    async fn query_bodies(&self, sql: &str, params: Vec<String>) -> Result<Vec<String>> {
        let conn = self.connection()?;

        let params: Vec<libsql::Value> = params.into_iter().map(libsql::Value::from).collect();
        let mut rows = conn
            .query(sql, params)
            .await
            .map_err(|e| AppError::Database(format!("Failed to query: {}", e)))?;

        let mut bodies = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            bodies.push(
                row.get::<String>(0)
                    .map_err(|e| AppError::Database(e.to_string()))?,
            );
        }

        Ok(bodies)
    }

    async fn instance_exists(&self, id: &str) -> Result<bool> {
        let found = self
            .query_bodies(
                "SELECT id FROM execution_instances WHERE id = ?",
                vec![id.to_string()],
            )
            .await?;
        Ok(!found.is_empty())
    }
}

fn to_db_version(version: u64) -> Result<i64> {
    i64::try_from(version)
        .map_err(|_| AppError::Database(format!("Version {} exceeds storage range", version)))
}

#[async_trait]
impl WorkflowStore for TursoClient {
    async fn put_definition(&self, definition: &WorkflowDefinition) -> Result<()> {
        let conn = self.connection()?;
        let body = serde_json::to_string(definition)?;
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT OR REPLACE INTO workflow_definitions (id, name, body, updated_at)
             VALUES (?, ?, ?, ?)",
            (definition.id.as_str(), definition.name.as_str(), body, now),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to store definition: {}", e)))?;

        Ok(())
    }

    async fn get_definition(&self, id: &str) -> Result<Option<WorkflowDefinition>> {
        let bodies = self
            .query_bodies(
                "SELECT body FROM workflow_definitions WHERE id = ?",
                vec![id.to_string()],
            )
            .await?;

        bodies
            .first()
            .map(|b| serde_json::from_str(b).map_err(AppError::from))
            .transpose()
    }

    async fn list_definitions(&self) -> Result<Vec<WorkflowDefinition>> {
        let bodies = self
            .query_bodies("SELECT body FROM workflow_definitions ORDER BY id", vec![])
            .await?;

        bodies
            .iter()
            .map(|b| serde_json::from_str(b).map_err(AppError::from))
            .collect()
    }

    async fn create_instance(&self, instance: &ExecutionInstance) -> Result<()> {
        let conn = self.connection()?;
        let body = serde_json::to_string(instance)?;
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT INTO execution_instances
             (id, workflow_id, scope_id, status, version, body, started_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            (
                instance.id.as_str(),
                instance.workflow_id.as_str(),
                instance.scope_id.as_str(),
                instance.status.as_str(),
                to_db_version(instance.version)?,
                body,
                instance.started_at.timestamp(),
                now,
            ),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create execution: {}", e)))?;

        Ok(())
    }

    async fn get_instance(&self, id: &str) -> Result<Option<ExecutionInstance>> {
        let bodies = self
            .query_bodies(
                "SELECT body FROM execution_instances WHERE id = ?",
                vec![id.to_string()],
            )
            .await?;

        bodies
            .first()
            .map(|b| serde_json::from_str(b).map_err(AppError::from))
            .transpose()
    }

    async fn update_instance(
        &self,
        instance: &ExecutionInstance,
        expected_version: u64,
    ) -> Result<()> {
        let conn = self.connection()?;
        let body = serde_json::to_string(instance)?;
        let now = Utc::now().timestamp();

        let affected = conn
            .execute(
                "UPDATE execution_instances
                 SET status = ?, version = ?, body = ?, updated_at = ?
                 WHERE id = ? AND version = ?",
                (
                    instance.status.as_str(),
                    to_db_version(instance.version)?,
                    body,
                    now,
                    instance.id.as_str(),
                    to_db_version(expected_version)?,
                ),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to update execution: {}", e)))?;

        if affected == 0 {
            if self.instance_exists(&instance.id).await? {
                return Err(AppError::Conflict(format!(
                    "Execution {} was modified concurrently (expected version {})",
                    instance.id, expected_version
                )));
            }
            return Err(AppError::NotFound(format!(
                "Execution {} not found",
                instance.id
            )));
        }

        Ok(())
    }

    async fn list_instances(&self, filter: &ExecutionFilter) -> Result<Vec<ExecutionInstance>> {
        let mut sql = "SELECT body FROM execution_instances WHERE 1 = 1".to_string();
        let mut params = Vec::new();

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            params.push(status.as_str().to_string());
        }
        if let Some(ref workflow_id) = filter.workflow_id {
            sql.push_str(" AND workflow_id = ?");
            params.push(workflow_id.clone());
        }
        sql.push_str(" ORDER BY started_at ASC");

        let bodies = self.query_bodies(&sql, params).await?;
        bodies
            .iter()
            .map(|b| serde_json::from_str(b).map_err(AppError::from))
            .collect()
    }
}

#[async_trait]
impl EntityStore for TursoClient {
    async fn create_entity(&self, collection: &str, data: Value) -> Result<String> {
        let conn = self.connection()?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();

        let mut record = data;
        if let Some(obj) = record.as_object_mut() {
            obj.insert("id".to_string(), Value::String(id.clone()));
        }
        let body = serde_json::to_string(&record)?;

        conn.execute(
            "INSERT INTO entities (id, collection, body, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
            (id.as_str(), collection, body, now, now),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create {} entity: {}", collection, e)))?;

        Ok(id)
    }

    async fn get_entity(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let bodies = self
            .query_bodies(
                "SELECT body FROM entities WHERE collection = ? AND id = ?",
                vec![collection.to_string(), id.to_string()],
            )
            .await?;

        bodies
            .first()
            .map(|b| serde_json::from_str(b).map_err(AppError::from))
            .transpose()
    }

    async fn update_entity(&self, collection: &str, id: &str, patch: Value) -> Result<()> {
        let mut record = self
            .get_entity(collection, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {} not found", collection, id)))?;
        merge_patch(&mut record, patch);

        let conn = self.connection()?;
        let body = serde_json::to_string(&record)?;
        let now = Utc::now().timestamp();

        conn.execute(
            "UPDATE entities SET body = ?, updated_at = ? WHERE collection = ? AND id = ?",
            (body, now, collection, id),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to update {} entity: {}", collection, e)))?;

        Ok(())
    }

    async fn list_entities(&self, collection: &str) -> Result<Vec<Value>> {
        let bodies = self
            .query_bodies(
                "SELECT body FROM entities WHERE collection = ? ORDER BY created_at ASC",
                vec![collection.to_string()],
            )
            .await?;

        bodies
            .iter()
            .map(|b| serde_json::from_str(b).map_err(AppError::from))
            .collect()
    }
}
