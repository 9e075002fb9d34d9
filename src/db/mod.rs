//! Storage backends for workflow state.
//!
//! This module provides the storage abstractions the engine consumes:
//! - **WorkflowStore**: definitions and execution instances, with
//!   compare-and-swap writes on the instance version
//! - **EntityStore**: auxiliary records created by action handlers
//!
//! # Backends
//!
//! - `MemoryStore` - in-process maps, for tests and embedding
//! - `TursoClient` - libsql (in-memory SQLite, local file, or remote Turso
//!   with the `turso` feature)

#![allow(missing_docs)]

pub mod memory;
pub mod traits;
pub mod turso;

// Re-exports
pub use memory::MemoryStore;
pub use traits::{DatabaseProvider, EntityStore, ExecutionFilter, WorkflowStore};
pub use turso::TursoClient;
