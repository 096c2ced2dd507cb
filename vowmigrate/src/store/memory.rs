use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Document, DocumentStore};
use crate::errors::StoreError;
use crate::id::generate_record_id;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct CollectionKey {
    tenant_id: String,
    collection: String,
}

impl CollectionKey {
    fn new(collection: &str, tenant_id: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            collection: collection.to_string(),
        }
    }
}

/// In-process store keeping documents in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<CollectionKey, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document under a caller-chosen id.
    pub async fn insert(&self, collection: &str, tenant_id: &str, id: impl Into<String>, data: Value) {
        let id = id.into();
        let mut collections = self.collections.write().await;
        let documents = collections.entry(CollectionKey::new(collection, tenant_id)).or_default();
        match documents.iter_mut().find(|doc| doc.id == id) {
            Some(existing) => existing.data = data,
            None => documents.push(Document { id, data }),
        }
    }

    /// Number of documents in a tenant collection.
    pub async fn count(&self, collection: &str, tenant_id: &str) -> usize {
        self.collections
            .read()
            .await
            .get(&CollectionKey::new(collection, tenant_id))
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_records(&self, collection: &str, tenant_id: &str) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(&CollectionKey::new(collection, tenant_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn append_record(&self, collection: &str, tenant_id: &str, data: Value) -> Result<String, StoreError> {
        let id = generate_record_id();
        self.collections
            .write()
            .await
            .entry(CollectionKey::new(collection, tenant_id))
            .or_default()
            .push(Document { id: id.clone(), data });
        Ok(id)
    }

    async fn get_record(&self, collection: &str, tenant_id: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(&CollectionKey::new(collection, tenant_id))
            .and_then(|docs| docs.iter().find(|doc| doc.id == id).cloned()))
    }

    async fn update_record(&self, collection: &str, tenant_id: &str, id: &str, data: Value) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let existing = collections
            .get_mut(&CollectionKey::new(collection, tenant_id))
            .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        existing.data = data;
        Ok(())
    }
}
