//! API request handlers.
//!
//! This module contains all HTTP request handlers organized by functionality.

/// Action handler listing.
pub mod actions;
/// Execution lifecycle handlers (start, poll, vote, cancel, sweep).
pub mod executions;
/// Liveness check.
pub mod health;
/// Workflow definition handlers.
pub mod workflows;
