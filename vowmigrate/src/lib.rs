//! Tenant-scoped data migration engine.
//!
//! Definitions are catalogued in a [`MigrationRegistry`], which also reads and writes
//! execution history through a [`DocumentStore`]. A [`MigrationRunner`] drives
//! definitions through their lifecycle and reports [`MigrationResult`]s.

pub mod definition;
pub mod errors;
pub mod id;
pub mod keys;
pub mod migrations;
pub mod plan;
pub mod registry;
pub mod runner;
pub mod store;
pub mod summary;
pub mod types;

pub use definition::{MigrationBase, MigrationDefinition, MigrationMetadata};
pub use errors::*;
pub use plan::{ExecutionPlan, PlanTarget, PlannedMigration};
pub use registry::MigrationRegistry;
pub use runner::MigrationRunner;
pub use store::{Document, DocumentStore, MemoryStore, RedisStore};
pub use summary::{ExecutionSummary, print_execution_summary};
pub use types::*;

// Re-export so implementors don't need their own async-trait dependency
pub use async_trait::async_trait;
