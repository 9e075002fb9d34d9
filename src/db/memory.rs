//! In-process store backed by `parking_lot` maps.
//!
//! Useful for tests and for embedding the engine without a database. All
//! state is lost when the store is dropped.

use super::traits::{merge_patch, EntityStore, ExecutionFilter, WorkflowStore};
use crate::types::{AppError, Result};
use crate::workflows::{ExecutionInstance, WorkflowDefinition};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    definitions: RwLock<BTreeMap<String, WorkflowDefinition>>,
    instances: RwLock<HashMap<String, ExecutionInstance>>,
    entities: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn put_definition(&self, definition: &WorkflowDefinition) -> Result<()> {
        self.definitions
            .write()
            .insert(definition.id.clone(), definition.clone());
        Ok(())
    }

    async fn get_definition(&self, id: &str) -> Result<Option<WorkflowDefinition>> {
        Ok(self.definitions.read().get(id).cloned())
    }

    async fn list_definitions(&self) -> Result<Vec<WorkflowDefinition>> {
        Ok(self.definitions.read().values().cloned().collect())
    }

    async fn create_instance(&self, instance: &ExecutionInstance) -> Result<()> {
        let mut instances = self.instances.write();
        if instances.contains_key(&instance.id) {
            return Err(AppError::Conflict(format!(
                "Execution {} already exists",
                instance.id
            )));
        }
        instances.insert(instance.id.clone(), instance.clone());
        Ok(())
    }

    async fn get_instance(&self, id: &str) -> Result<Option<ExecutionInstance>> {
        Ok(self.instances.read().get(id).cloned())
    }

    async fn update_instance(
        &self,
        instance: &ExecutionInstance,
        expected_version: u64,
    ) -> Result<()> {
        let mut instances = self.instances.write();
        let stored = instances
            .get_mut(&instance.id)
            .ok_or_else(|| AppError::NotFound(format!("Execution {} not found", instance.id)))?;

        if stored.version != expected_version {
            return Err(AppError::Conflict(format!(
                "Execution {} is at version {}, expected {}",
                instance.id, stored.version, expected_version
            )));
        }

        *stored = instance.clone();
        Ok(())
    }

    async fn list_instances(&self, filter: &ExecutionFilter) -> Result<Vec<ExecutionInstance>> {
        let mut found: Vec<ExecutionInstance> = self
            .instances
            .read()
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        found.sort_by_key(|i| i.started_at);
        Ok(found)
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn create_entity(&self, collection: &str, data: Value) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let mut record = data;
        if let Some(obj) = record.as_object_mut() {
            obj.insert("id".to_string(), Value::String(id.clone()));
        }
        self.entities
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), record);
        Ok(id)
    }

    async fn get_entity(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .entities
            .read()
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned())
    }

    async fn update_entity(&self, collection: &str, id: &str, patch: Value) -> Result<()> {
        let mut entities = self.entities.write();
        let record = entities
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| AppError::NotFound(format!("{} {} not found", collection, id)))?;
        merge_patch(record, patch);
        Ok(())
    }

    async fn list_entities(&self, collection: &str) -> Result<Vec<Value>> {
        Ok(self
            .entities
            .read()
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }
}
