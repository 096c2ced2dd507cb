/// Tenant-scoped key construction for the Redis document store.
#[derive(Debug, Clone)]
pub struct KeyContext<'a> {
    pub prefix: &'a str,
    pub tenant_id: &'a str,
}

impl<'a> KeyContext<'a> {
    pub fn new(prefix: &'a str, tenant_id: &'a str) -> Self {
        Self { prefix, tenant_id }
    }

    pub fn document(&self, collection: &str, document_id: &str) -> String {
        format!("{}:{}:{}:{}", self.prefix, self.tenant_id, collection, document_id)
    }

    /// SCAN pattern matching every document of a collection.
    pub fn collection_pattern(&self, collection: &str) -> String {
        format!("{}:{}:{}:*", self.prefix, self.tenant_id, collection)
    }
}

/// Extract the document id (last segment) from a full key.
pub fn document_id_from_key(key: &str) -> &str {
    key.rsplit(':').next().unwrap_or(key)
}
