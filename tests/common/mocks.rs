//! Test doubles shared by the integration tests.
//!
//! Notifiers that record, fail or stall, and a store wrapper that injects
//! version conflicts or write failures so retry and failure paths can be
//! driven deterministically.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use steward::db::{ExecutionFilter, MemoryStore, WorkflowStore};
use steward::notify::{Notification, Notifier};
use steward::types::{AppError, Result};
use steward::workflows::{ExecutionInstance, WorkflowDefinition};

/// Notifier that remembers everything it was asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent.lock().iter().map(|n| n.recipient.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}

/// Notifier whose every delivery fails.
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _notification: &Notification) -> Result<()> {
        Err(AppError::Notification("mailbox unavailable".to_string()))
    }
}

/// Notifier that never answers within a reasonable time.
pub struct SlowNotifier(pub Duration);

#[async_trait]
impl Notifier for SlowNotifier {
    async fn notify(&self, _notification: &Notification) -> Result<()> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}

/// `MemoryStore` wrapper whose instance updates can be made to fail
/// without touching the stored state.
pub struct FaultyStore {
    inner: Arc<MemoryStore>,
    pending_conflicts: AtomicU32,
    pending_write_failures: AtomicU32,
    updates: AtomicU32,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            pending_conflicts: AtomicU32::new(0),
            pending_write_failures: AtomicU32::new(0),
            updates: AtomicU32::new(0),
        }
    }

    /// Make the next `n` calls to `update_instance` lose the version race.
    pub fn inject_conflicts(&self, n: u32) {
        self.pending_conflicts.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` calls to `update_instance` fail with a database error.
    pub fn inject_write_failures(&self, n: u32) {
        self.pending_write_failures.store(n, Ordering::SeqCst);
    }

    /// Total `update_instance` calls, including the failed ones.
    pub fn update_calls(&self) -> u32 {
        self.updates.load(Ordering::SeqCst)
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl WorkflowStore for FaultyStore {
    async fn put_definition(&self, definition: &WorkflowDefinition) -> Result<()> {
        self.inner.put_definition(definition).await
    }

    async fn get_definition(&self, id: &str) -> Result<Option<WorkflowDefinition>> {
        self.inner.get_definition(id).await
    }

    async fn list_definitions(&self) -> Result<Vec<WorkflowDefinition>> {
        self.inner.list_definitions().await
    }

    async fn create_instance(&self, instance: &ExecutionInstance) -> Result<()> {
        self.inner.create_instance(instance).await
    }

    async fn get_instance(&self, id: &str) -> Result<Option<ExecutionInstance>> {
        self.inner.get_instance(id).await
    }

    async fn update_instance(
        &self,
        instance: &ExecutionInstance,
        expected_version: u64,
    ) -> Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.pending_write_failures) {
            return Err(AppError::Database(format!(
                "disk I/O error writing execution {}",
                instance.id
            )));
        }
        if take_one(&self.pending_conflicts) {
            return Err(AppError::Conflict(format!(
                "Injected conflict on execution {}",
                instance.id
            )));
        }
        self.inner.update_instance(instance, expected_version).await
    }

    async fn list_instances(&self, filter: &ExecutionFilter) -> Result<Vec<ExecutionInstance>> {
        self.inner.list_instances(filter).await
    }
}
