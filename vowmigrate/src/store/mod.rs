//! Tenant-scoped document store interface.
//!
//! The engine itself only needs [`list_records`](DocumentStore::list_records) and
//! [`append_record`](DocumentStore::append_record) for execution history. The
//! remaining operations exist for migration bodies that read and rewrite tenant data.

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::StoreError;

/// Collection holding [`MigrationRecord`](crate::types::MigrationRecord)s.
pub const MIGRATION_HISTORY_COLLECTION: &str = "_migrations";

/// A stored document and its id within the collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Single snapshot of every document in a tenant collection.
    async fn list_records(&self, collection: &str, tenant_id: &str) -> Result<Vec<Document>, StoreError>;

    /// Store a new document and return its generated id.
    async fn append_record(&self, collection: &str, tenant_id: &str, data: Value) -> Result<String, StoreError>;

    async fn get_record(&self, collection: &str, tenant_id: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Replace an existing document. Fails with [`StoreError::NotFound`] when absent.
    async fn update_record(&self, collection: &str, tenant_id: &str, id: &str, data: Value) -> Result<(), StoreError>;
}
