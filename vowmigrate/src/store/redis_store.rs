//! RedisJSON-backed document store.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde_json::Value;

use super::{Document, DocumentStore};
use crate::errors::StoreError;
use crate::id::generate_record_id;
use crate::keys::{KeyContext, document_id_from_key};

const SCAN_COUNT: usize = 500;

/// Documents live under `{prefix}:{tenant}:{collection}:{id}` as RedisJSON values.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn, prefix))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn read_document(conn: &mut ConnectionManager, key: &str) -> Result<Option<Value>, StoreError> {
        let raw: Option<String> = redis::cmd("JSON.GET").arg(key).arg("$").query_async(conn).await?;
        match raw {
            Some(json) => {
                // JSON.GET with a path returns an array of matches
                let values: Vec<Value> = serde_json::from_str(&json)?;
                Ok(values.into_iter().next())
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl DocumentStore for RedisStore {
    async fn list_records(&self, collection: &str, tenant_id: &str) -> Result<Vec<Document>, StoreError> {
        let keys = KeyContext::new(&self.prefix, tenant_id);
        let pattern = keys.collection_pattern(collection);
        let mut conn = self.conn.clone();
        let mut documents = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;

            for key in batch {
                if let Some(data) = Self::read_document(&mut conn, &key).await? {
                    documents.push(Document {
                        id: document_id_from_key(&key).to_string(),
                        data,
                    });
                }
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        // SCAN order is unspecified
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }

    async fn append_record(&self, collection: &str, tenant_id: &str, data: Value) -> Result<String, StoreError> {
        let id = generate_record_id();
        let key = KeyContext::new(&self.prefix, tenant_id).document(collection, &id);
        let json = serde_json::to_string(&data)?;
        let mut conn = self.conn.clone();

        let _: () = redis::cmd("JSON.SET")
            .arg(&key)
            .arg("$")
            .arg(&json)
            .query_async(&mut conn)
            .await?;

        Ok(id)
    }

    async fn get_record(&self, collection: &str, tenant_id: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let key = KeyContext::new(&self.prefix, tenant_id).document(collection, id);
        let mut conn = self.conn.clone();
        Ok(Self::read_document(&mut conn, &key).await?.map(|data| Document {
            id: id.to_string(),
            data,
        }))
    }

    async fn update_record(&self, collection: &str, tenant_id: &str, id: &str, data: Value) -> Result<(), StoreError> {
        let key = KeyContext::new(&self.prefix, tenant_id).document(collection, id);
        let json = serde_json::to_string(&data)?;
        let mut conn = self.conn.clone();

        // XX: only overwrite an existing key
        let written: Option<String> = redis::cmd("JSON.SET")
            .arg(&key)
            .arg("$")
            .arg(&json)
            .arg("XX")
            .query_async(&mut conn)
            .await?;

        match written {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
        }
    }
}
