use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::definition::{MigrationBase, MigrationDefinition, MigrationMetadata};
use crate::errors::MigrationError;
use crate::store::{Document, DocumentStore};
use crate::types::{ExecutionContext, MigrationResult, ValidationIssue, ValidationResult};

const DEFAULT_BATCH_SIZE: usize = 100;

/// Collection recording which documents each backfill run wrote.
pub const BACKFILL_JOURNAL_COLLECTION: &str = "_backfill_journal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum JournalAction {
    Filled,
    Reverted,
}

/// One journal entry per real run. Entries are append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JournalEntry {
    migration_id: String,
    action: JournalAction,
    #[serde(default)]
    document_ids: Vec<String>,
    recorded_at: DateTime<Utc>,
}

/// Sets `field` to a default value on every document of a tenant collection that
/// lacks it (missing or null). Documents that already carry the field are skipped,
/// so re-running is harmless.
///
/// Every real run journals the ids it wrote in [`BACKFILL_JOURNAL_COLLECTION`].
/// Rollback only touches journaled documents, so a document that held the
/// default value before the backfill keeps it.
pub struct FieldBackfill {
    base: MigrationBase,
    store: Arc<dyn DocumentStore>,
    collection: String,
    field: String,
    default: Value,
}

impl FieldBackfill {
    pub fn new(
        metadata: MigrationMetadata,
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        field: impl Into<String>,
        default: Value,
    ) -> Self {
        Self {
            base: MigrationBase::new(metadata),
            store,
            collection: collection.into(),
            field: field.into(),
            default,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    fn is_missing(&self, data: &Value) -> bool {
        data.get(&self.field).is_none_or(Value::is_null)
    }

    async fn load(&self, ctx: &ExecutionContext) -> Result<Vec<Document>, MigrationError> {
        Ok(self.store.list_records(&self.collection, &ctx.tenant_id).await?)
    }

    async fn append_journal(
        &self,
        ctx: &ExecutionContext,
        action: JournalAction,
        document_ids: Vec<String>,
    ) -> Result<(), MigrationError> {
        let entry = JournalEntry {
            migration_id: self.id().to_string(),
            action,
            document_ids,
            recorded_at: Utc::now(),
        };
        let data = serde_json::to_value(&entry).map_err(crate::errors::StoreError::from)?;
        self.store
            .append_record(BACKFILL_JOURNAL_COLLECTION, &ctx.tenant_id, data)
            .await?;
        Ok(())
    }

    /// Ids written by fills since the last complete revert.
    async fn filled_ids(&self, ctx: &ExecutionContext) -> Result<HashSet<String>, MigrationError> {
        let documents = self
            .store
            .list_records(BACKFILL_JOURNAL_COLLECTION, &ctx.tenant_id)
            .await?;
        let mut entries: Vec<JournalEntry> = documents
            .into_iter()
            .filter_map(|doc| match serde_json::from_value::<JournalEntry>(doc.data) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    log::warn!("skipping unreadable journal entry {}: {err}", doc.id);
                    None
                }
            })
            .filter(|entry| entry.migration_id == self.id())
            .collect();
        entries.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));

        let since = entries
            .iter()
            .rposition(|entry| entry.action == JournalAction::Reverted)
            .map_or(0, |index| index + 1);
        Ok(entries[since..]
            .iter()
            .flat_map(|entry| entry.document_ids.iter().cloned())
            .collect())
    }
}

#[async_trait]
impl MigrationDefinition for FieldBackfill {
    fn metadata(&self) -> &MigrationMetadata {
        self.base.metadata()
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<MigrationResult, MigrationError> {
        let documents = self.load(ctx).await?;
        ctx.stats.total_items = documents.len() as u64;
        self.base.log_info(
            ctx,
            &format!("backfilling '{}' on {} {} document(s)", self.field, documents.len(), self.collection),
        );

        let batch_size = ctx.batch_size_or(DEFAULT_BATCH_SIZE);
        let mut written = Vec::new();
        for (index, batch) in documents.chunks(batch_size).enumerate() {
            log::debug!("processing batch {} ({} document(s))", index + 1, batch.len());

            for doc in batch {
                ctx.stats.items_processed += 1;

                let Some(object) = doc.data.as_object() else {
                    ctx.stats.items_skipped += 1;
                    ctx.stats.record_warning(doc.id.clone(), "document is not a JSON object");
                    continue;
                };

                if !self.is_missing(&doc.data) {
                    ctx.stats.items_skipped += 1;
                    continue;
                }

                if ctx.is_dry_run() {
                    self.base
                        .log_info(ctx, &format!("would set '{}' on {}", self.field, doc.id));
                    ctx.stats.items_updated += 1;
                    continue;
                }

                let mut updated = object.clone();
                updated.insert(self.field.clone(), self.default.clone());
                match self
                    .store
                    .update_record(&self.collection, &ctx.tenant_id, &doc.id, Value::Object(updated))
                    .await
                {
                    Ok(()) => {
                        ctx.stats.items_updated += 1;
                        written.push(doc.id.clone());
                    }
                    Err(err) => {
                        self.base.log_error(ctx, &format!("failed to update {}: {err}", doc.id));
                        ctx.stats.record_error(doc.id.clone(), err.to_string());
                    }
                }
            }
        }

        if !written.is_empty() {
            if let Err(err) = self.append_journal(ctx, JournalAction::Filled, written).await {
                self.base.log_error(ctx, &format!("failed to journal written documents: {err}"));
                ctx.stats.record_error(self.id().to_string(), format!("journal write failed: {err}"));
            }
        }

        let result = self.base.finish(ctx);
        if result.success {
            self.base.log_success(ctx, &format!("{} document(s) updated", result.stats.items_updated));
        }
        self.base.print_summary(&result);
        Ok(result)
    }

    async fn validate(&self, ctx: &ExecutionContext) -> Result<Option<ValidationResult>, MigrationError> {
        let documents = self.load(ctx).await?;
        let issues = documents
            .iter()
            .filter(|doc| doc.data.is_object() && self.is_missing(&doc.data))
            .map(|doc| {
                ValidationIssue::new(doc.id.clone(), format!("field '{}' is missing", self.field))
                    .with_values(self.default.clone(), doc.data.get(&self.field).cloned().unwrap_or(Value::Null))
            })
            .collect();
        Ok(Some(ValidationResult::from_issues(issues)))
    }

    /// Removes the field from journaled documents where it still equals the
    /// default. Values changed after the backfill, and documents the backfill
    /// never wrote, are left alone.
    async fn rollback(&self, ctx: &mut ExecutionContext) -> Result<Option<MigrationResult>, MigrationError> {
        let filled = self.filled_ids(ctx).await?;
        let documents = self.load(ctx).await?;
        ctx.stats.total_items = documents.len() as u64;

        for doc in &documents {
            ctx.stats.items_processed += 1;
            let Some(object) = doc.data.as_object() else {
                ctx.stats.items_skipped += 1;
                continue;
            };
            if !filled.contains(&doc.id) || object.get(&self.field) != Some(&self.default) {
                ctx.stats.items_skipped += 1;
                continue;
            }
            if ctx.is_dry_run() {
                ctx.stats.items_updated += 1;
                continue;
            }

            let mut reverted = object.clone();
            reverted.remove(&self.field);
            match self
                .store
                .update_record(&self.collection, &ctx.tenant_id, &doc.id, Value::Object(reverted))
                .await
            {
                Ok(()) => ctx.stats.items_updated += 1,
                Err(err) => ctx.stats.record_error(doc.id.clone(), err.to_string()),
            }
        }

        // Partial reverts keep the fill entries so a retry can finish the job.
        if !ctx.is_dry_run() && ctx.stats.errors.is_empty() {
            if let Err(err) = self.append_journal(ctx, JournalAction::Reverted, Vec::new()).await {
                ctx.stats.record_error(self.id().to_string(), format!("journal write failed: {err}"));
            }
        }

        Ok(Some(self.base.finish(ctx)))
    }

    async fn can_run(&self, ctx: &ExecutionContext) -> Result<bool, MigrationError> {
        match self.store.list_records(&self.collection, &ctx.tenant_id).await {
            Ok(_) => Ok(true),
            Err(err) => {
                self.base.log_error(ctx, &format!("collection '{}' is not readable: {err}", self.collection));
                Ok(false)
            }
        }
    }
}
