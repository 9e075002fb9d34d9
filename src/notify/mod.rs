//! Notification dispatch
//!
//! The engine tells approvers about new gates through a [`Notifier`].
//! Delivery is fire-and-forget from the workflow's point of view: a failed
//! send never fails a step. Outcomes are recorded separately as
//! `notification_deliveries` entities.
//!
//! # Implementations
//!
//! - [`LogNotifier`] - writes notifications to the tracing log
//! - [`webhook::WebhookNotifier`] - POSTs each notification as JSON

/// Webhook delivery over HTTP.
pub mod webhook;

use crate::types::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use webhook::WebhookNotifier;

/// Why a notification was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// An approver is asked to vote on a gate
    ApprovalRequested,
    /// Sent by the `send_notification` action
    Message,
}

/// One message to one recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: String,
    pub execution_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<String>,
    pub message: String,
}

impl Notification {
    /// Approval request keyed by `{approver, execution_id, approval_id}`
    pub fn approval_requested(
        approver: &str,
        execution_id: &str,
        approval_id: &str,
        step_id: &str,
    ) -> Self {
        Self {
            kind: NotificationKind::ApprovalRequested,
            recipient: approver.to_string(),
            execution_id: execution_id.to_string(),
            approval_id: Some(approval_id.to_string()),
            message: format!(
                "Your approval is requested for step '{}' of execution {}",
                step_id, execution_id
            ),
        }
    }

    pub fn message(recipient: &str, execution_id: &str, message: &str) -> Self {
        Self {
            kind: NotificationKind::Message,
            recipient: recipient.to_string(),
            execution_id: execution_id.to_string(),
            approval_id: None,
            message: message.to_string(),
        }
    }
}

/// Sends notifications to people
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Notifier that only logs; the default when no webhook is configured
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            recipient = %notification.recipient,
            execution_id = %notification.execution_id,
            approval_id = ?notification.approval_id,
            kind = ?notification.kind,
            "{}",
            notification.message
        );
        Ok(())
    }
}
