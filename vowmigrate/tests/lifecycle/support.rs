pub(crate) use serde_json::{Value, json};
pub(crate) use std::sync::Arc;
pub(crate) use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
pub(crate) use vowmigrate::{
    Document, DocumentStore, ExecutionContext, ExecutionOptions, MemoryStore, MigrationBase, MigrationDefinition,
    MigrationError, MigrationMetadata, MigrationRecord, MigrationRegistry, MigrationResult, MigrationRunner,
    MigrationStatus, PlanTarget, StoreError, ValidationIssue, ValidationResult, async_trait,
    store::MIGRATION_HISTORY_COLLECTION,
};

pub(crate) const TENANT: &str = "wedding-42";

/// How a scripted migration behaves when executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    Succeed,
    /// Completes but reports an item-level error.
    ItemErrors,
    /// `execute` returns an error.
    Throw,
    /// `can_run` returns false.
    Blocked,
    /// Executes cleanly, then fails validation.
    Drift,
}

#[derive(Debug, Default)]
pub(crate) struct CallCounts {
    execute: AtomicUsize,
    validate: AtomicUsize,
    rollback: AtomicUsize,
    can_run: AtomicUsize,
}

impl CallCounts {
    pub(crate) fn execute(&self) -> usize {
        self.execute.load(Ordering::SeqCst)
    }

    pub(crate) fn validate(&self) -> usize {
        self.validate.load(Ordering::SeqCst)
    }

    pub(crate) fn rollback(&self) -> usize {
        self.rollback.load(Ordering::SeqCst)
    }

    pub(crate) fn can_run(&self) -> usize {
        self.can_run.load(Ordering::SeqCst)
    }
}

pub(crate) struct ScriptedMigration {
    base: MigrationBase,
    behavior: Behavior,
    items: u64,
    supports_rollback: bool,
    calls: Arc<CallCounts>,
}

impl ScriptedMigration {
    pub(crate) fn new(id: &str, version: &str) -> Self {
        Self {
            base: MigrationBase::new(
                MigrationMetadata::new(id, format!("Migration {id}"), version).with_description("scripted test migration"),
            ),
            behavior: Behavior::Succeed,
            items: 3,
            supports_rollback: false,
            calls: Arc::new(CallCounts::default()),
        }
    }

    pub(crate) fn behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub(crate) fn with_rollback(mut self) -> Self {
        self.supports_rollback = true;
        self
    }

    pub(crate) fn build(self) -> (Arc<dyn MigrationDefinition>, Arc<CallCounts>) {
        let calls = self.calls.clone();
        (Arc::new(self), calls)
    }
}

#[async_trait]
impl MigrationDefinition for ScriptedMigration {
    fn metadata(&self) -> &MigrationMetadata {
        self.base.metadata()
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<MigrationResult, MigrationError> {
        self.calls.execute.fetch_add(1, Ordering::SeqCst);
        if self.behavior == Behavior::Throw {
            return Err(MigrationError::execution("guest table exploded"));
        }

        ctx.stats.total_items = self.items;
        for n in 0..self.items {
            ctx.stats.items_processed += 1;
            if self.behavior == Behavior::ItemErrors && n == 0 {
                ctx.stats.record_error(format!("item-{n}"), "unreadable answer");
                continue;
            }
            if !ctx.is_dry_run() {
                ctx.stats.items_updated += 1;
            }
        }
        Ok(self.base.finish(ctx))
    }

    async fn validate(&self, _ctx: &ExecutionContext) -> Result<Option<ValidationResult>, MigrationError> {
        self.calls.validate.fetch_add(1, Ordering::SeqCst);
        if self.behavior == Behavior::Drift {
            return Ok(Some(ValidationResult::from_issues(vec![
                ValidationIssue::new("item-1", "denormalized copy differs").with_values(json!("yes"), json!("no")),
            ])));
        }
        Ok(Some(ValidationResult::valid()))
    }

    async fn rollback(&self, ctx: &mut ExecutionContext) -> Result<Option<MigrationResult>, MigrationError> {
        if !self.supports_rollback {
            return Ok(None);
        }
        self.calls.rollback.fetch_add(1, Ordering::SeqCst);
        ctx.stats.items_processed = self.items;
        ctx.stats.items_updated = self.items;
        Ok(Some(self.base.finish(ctx)))
    }

    async fn can_run(&self, _ctx: &ExecutionContext) -> Result<bool, MigrationError> {
        self.calls.can_run.fetch_add(1, Ordering::SeqCst);
        Ok(self.behavior != Behavior::Blocked)
    }
}

/// Memory store whose reads and writes can be switched to fail.
#[derive(Debug, Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self, flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("injected failure"));
        }
        Ok(())
    }

    /// History records for a tenant, bypassing failure injection.
    pub(crate) async fn history(&self, tenant_id: &str) -> Vec<MigrationRecord> {
        self.inner
            .list_records(MIGRATION_HISTORY_COLLECTION, tenant_id)
            .await
            .expect("memory store read")
            .into_iter()
            .map(|doc| serde_json::from_value(doc.data).expect("valid record"))
            .collect()
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn list_records(&self, collection: &str, tenant_id: &str) -> Result<Vec<Document>, StoreError> {
        self.check(&self.fail_reads)?;
        self.inner.list_records(collection, tenant_id).await
    }

    async fn append_record(&self, collection: &str, tenant_id: &str, data: Value) -> Result<String, StoreError> {
        self.check(&self.fail_writes)?;
        self.inner.append_record(collection, tenant_id, data).await
    }

    async fn get_record(&self, collection: &str, tenant_id: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.check(&self.fail_reads)?;
        self.inner.get_record(collection, tenant_id, id).await
    }

    async fn update_record(&self, collection: &str, tenant_id: &str, id: &str, data: Value) -> Result<(), StoreError> {
        self.check(&self.fail_writes)?;
        self.inner.update_record(collection, tenant_id, id, data).await
    }
}

/// Registry over `store` with `definitions` registered in order.
pub(crate) fn registry_with(store: Arc<FlakyStore>, definitions: Vec<Arc<dyn MigrationDefinition>>) -> MigrationRegistry {
    let mut registry = MigrationRegistry::new(store);
    for definition in definitions {
        registry.register(definition).expect("unique migration id");
    }
    registry
}

pub(crate) fn runner_with(store: Arc<FlakyStore>, definitions: Vec<Arc<dyn MigrationDefinition>>) -> MigrationRunner {
    MigrationRunner::new(Arc::new(registry_with(store, definitions)))
}

pub(crate) fn live() -> ExecutionOptions {
    ExecutionOptions::new(TENANT)
}

pub(crate) fn dry() -> ExecutionOptions {
    ExecutionOptions::new(TENANT).with_dry_run(true)
}
