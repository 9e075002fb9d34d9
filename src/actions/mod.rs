//! Action handlers run by action steps.
//!
//! Handlers are looked up by `action_type` in an [`ActionRegistry`]. An
//! unregistered type counts as a successful no-op unless the registry is
//! strict.

pub mod builtin;
pub mod registry;

pub use registry::{ActionContext, ActionHandler, ActionRegistry};
