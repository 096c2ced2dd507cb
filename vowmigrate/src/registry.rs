//! Catalog of migration definitions and mediator for execution history.
//!
//! History reads degrade: if the store cannot be read, the registry behaves as if
//! nothing has been executed for the tenant. Callers must accept that a transient
//! read failure can re-offer an executed migration as pending.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::definition::MigrationDefinition;
use crate::errors::MigrationError;
use crate::store::{DocumentStore, MIGRATION_HISTORY_COLLECTION};
use crate::types::{MigrationRecord, MigrationStats, MigrationStatus, MigrationStatusEntry};

pub struct MigrationRegistry {
    definitions: Vec<Arc<dyn MigrationDefinition>>,
    store: Arc<dyn DocumentStore>,
}

impl MigrationRegistry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            definitions: Vec::new(),
            store,
        }
    }

    /// Add a definition to the catalog. Ids must be unique; nothing is added on conflict.
    pub fn register(&mut self, definition: Arc<dyn MigrationDefinition>) -> Result<(), MigrationError> {
        let id = definition.id();
        if self.definitions.iter().any(|existing| existing.id() == id) {
            return Err(MigrationError::DuplicateId(id.to_string()));
        }
        log::debug!("registered migration '{id}' (v{})", definition.metadata().version);
        self.definitions.push(definition);
        Ok(())
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn MigrationDefinition>> {
        self.definitions.iter().find(|def| def.id() == id).cloned()
    }

    /// All definitions in registration order.
    pub fn get_all(&self) -> Vec<Arc<dyn MigrationDefinition>> {
        self.definitions.clone()
    }

    pub fn get_by_tag(&self, tag: &str) -> Vec<Arc<dyn MigrationDefinition>> {
        self.definitions
            .iter()
            .filter(|def| def.metadata().has_tag(tag))
            .cloned()
            .collect()
    }

    /// All definitions sorted by `version` using plain string ordering.
    ///
    /// This is lexicographic, not semver-aware: `"1.10.0"` sorts before `"1.2.0"`.
    pub fn get_ordered_by_version(&self) -> Vec<Arc<dyn MigrationDefinition>> {
        let mut ordered = self.definitions.clone();
        ordered.sort_by(|a, b| a.metadata().version.cmp(&b.metadata().version));
        ordered
    }

    /// Every history record for the tenant, oldest first. Read failures yield an empty list.
    pub async fn get_executed_migrations(&self, tenant_id: &str) -> Vec<MigrationRecord> {
        let documents = match self.store.list_records(MIGRATION_HISTORY_COLLECTION, tenant_id).await {
            Ok(documents) => documents,
            Err(err) => {
                log::warn!("failed to read migration history for tenant '{tenant_id}', treating as empty: {err}");
                return Vec::new();
            }
        };

        let mut records: Vec<MigrationRecord> = documents
            .into_iter()
            .filter_map(|doc| match serde_json::from_value::<MigrationRecord>(doc.data) {
                Ok(mut record) => {
                    record.id = Some(doc.id);
                    Some(record)
                }
                Err(err) => {
                    log::warn!("skipping malformed migration record '{}': {err}", doc.id);
                    None
                }
            })
            .collect();
        records.sort_by(|a, b| a.executed_at.cmp(&b.executed_at));
        records
    }

    /// Ids with a COMPLETED record that has not been superseded by a later rollback.
    /// One entry per qualifying record, so ids may repeat.
    pub async fn get_executed_migration_ids(&self, tenant_id: &str) -> Vec<String> {
        completed_ids(&self.get_executed_migrations(tenant_id).await)
    }

    /// Version-ordered definitions that have not been executed for the tenant.
    pub async fn get_pending_migrations(&self, tenant_id: &str) -> Vec<Arc<dyn MigrationDefinition>> {
        let executed = self.get_executed_migration_ids(tenant_id).await;
        self.get_ordered_by_version()
            .into_iter()
            .filter(|def| !executed.iter().any(|id| id == def.id()))
            .collect()
    }

    /// Append a history record for a finished execution.
    pub async fn mark_as_executed(
        &self,
        migration_id: &str,
        tenant_id: &str,
        stats: &MigrationStats,
        status: MigrationStatus,
    ) -> Result<MigrationRecord, MigrationError> {
        let record = MigrationRecord {
            id: None,
            migration_id: migration_id.to_string(),
            status,
            executed_at: Some(Utc::now()),
            execution_time_ms: stats.duration_ms,
            stats: Some(stats.clone()),
            error: None,
            tenant_id: tenant_id.to_string(),
        };
        self.append(record).await
    }

    /// Append a FAILED record. Write failures are logged and swallowed.
    pub async fn mark_as_failed(
        &self,
        migration_id: &str,
        tenant_id: &str,
        error: &str,
        stats: Option<&MigrationStats>,
    ) -> Option<MigrationRecord> {
        let record = MigrationRecord {
            id: None,
            migration_id: migration_id.to_string(),
            status: MigrationStatus::Failed,
            executed_at: Some(Utc::now()),
            execution_time_ms: stats.and_then(|s| s.duration_ms),
            stats: stats.cloned(),
            error: Some(error.to_string()),
            tenant_id: tenant_id.to_string(),
        };
        match self.append(record).await {
            Ok(record) => Some(record),
            Err(err) => {
                log::error!("failed to record failure of migration '{migration_id}' for tenant '{tenant_id}': {err}");
                None
            }
        }
    }

    async fn append(&self, mut record: MigrationRecord) -> Result<MigrationRecord, MigrationError> {
        let data = serde_json::to_value(&record).map_err(crate::errors::StoreError::from)?;
        let id = self
            .store
            .append_record(MIGRATION_HISTORY_COLLECTION, &record.tenant_id, data)
            .await?;
        record.id = Some(id);
        Ok(record)
    }

    pub async fn is_executed(&self, migration_id: &str, tenant_id: &str) -> bool {
        self.get_executed_migration_ids(tenant_id)
            .await
            .iter()
            .any(|id| id == migration_id)
    }

    /// History of one migration for the tenant, oldest first.
    pub async fn get_history(&self, migration_id: &str, tenant_id: &str) -> Vec<MigrationRecord> {
        self.get_executed_migrations(tenant_id)
            .await
            .into_iter()
            .filter(|record| record.migration_id == migration_id)
            .collect()
    }

    /// Status of the latest record, or `Pending` when there is none.
    pub async fn get_status(&self, migration_id: &str, tenant_id: &str) -> MigrationStatus {
        self.get_history(migration_id, tenant_id)
            .await
            .last()
            .map_or(MigrationStatus::Pending, |record| record.status)
    }

    /// Catalog in version order joined with the latest record per migration.
    pub async fn list_with_status(&self, tenant_id: &str) -> Vec<MigrationStatusEntry> {
        let records = self.get_executed_migrations(tenant_id).await;
        let mut latest: HashMap<&str, &MigrationRecord> = HashMap::new();
        for record in &records {
            // records are oldest first, so later entries win
            latest.insert(record.migration_id.as_str(), record);
        }

        self.get_ordered_by_version()
            .into_iter()
            .map(|def| {
                let record = latest.get(def.id());
                MigrationStatusEntry {
                    migration: def.metadata().clone(),
                    status: record.map_or(MigrationStatus::Pending, |r| r.status),
                    last_executed: record.and_then(|r| r.executed_at),
                    stats: record.and_then(|r| r.stats.clone()),
                }
            })
            .collect()
    }
}

/// Completed records not followed by a ROLLED_BACK record for the same migration.
fn completed_ids(records: &[MigrationRecord]) -> Vec<String> {
    records
        .iter()
        .filter(|record| record.status == MigrationStatus::Completed)
        .filter(|completed| {
            !records.iter().any(|other| {
                other.status == MigrationStatus::RolledBack
                    && other.migration_id == completed.migration_id
                    && other.executed_at > completed.executed_at
            })
        })
        .map(|record| record.migration_id.clone())
        .collect()
}
