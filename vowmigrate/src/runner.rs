//! Lifecycle orchestration for one or many migrations.
//!
//! A single execution goes through: prerequisite gate, history check (real runs
//! only), `execute`, optional validation (real runs only), and history recording
//! (real runs only). Only the final outcome is persisted. Multi-migration runs are
//! strictly sequential because migrations may touch the same tenant documents.

use std::sync::Arc;

use crate::definition::MigrationDefinition;
use crate::errors::MigrationError;
use crate::plan::{ExecutionPlan, PlanTarget, PlannedMigration};
use crate::registry::MigrationRegistry;
use crate::types::{ExecutionContext, ExecutionOptions, ItemError, MigrationResult, MigrationStats, MigrationStatus};

pub struct MigrationRunner {
    registry: Arc<MigrationRegistry>,
}

impl MigrationRunner {
    pub fn new(registry: Arc<MigrationRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// Run one migration through the full lifecycle.
    ///
    /// Fails with [`MigrationError::NotFound`] for unknown ids and with
    /// [`MigrationError::PrerequisiteFailed`] when `can_run` says no; in both cases
    /// nothing is recorded. Failures of the migration body are reported in the
    /// returned result, not as an error.
    pub async fn run_single(
        &self,
        migration_id: &str,
        options: &ExecutionOptions,
    ) -> Result<MigrationResult, MigrationError> {
        let definition = self
            .registry
            .get(migration_id)
            .ok_or_else(|| MigrationError::NotFound(migration_id.to_string()))?;
        self.execute_definition(definition.as_ref(), options).await
    }

    async fn execute_definition(
        &self,
        definition: &dyn MigrationDefinition,
        options: &ExecutionOptions,
    ) -> Result<MigrationResult, MigrationError> {
        let id = definition.id().to_string();
        let tenant_id = options.tenant_id.as_str();
        let mut ctx = ExecutionContext::new(options.clone());

        if !definition.can_run(&ctx).await? {
            log::error!("prerequisites not met for migration '{id}' (tenant '{tenant_id}')");
            return Err(MigrationError::PrerequisiteFailed { id });
        }

        if !options.dry_run && self.registry.is_executed(&id, tenant_id).await {
            log::info!("migration '{id}' already completed for tenant '{tenant_id}', skipping");
            let mut stats = MigrationStats::new();
            stats.items_skipped = 1;
            stats.finalize();
            return Ok(MigrationResult::from_stats(id, stats));
        }

        log::info!(
            "{} migration '{id}' for tenant '{tenant_id}'",
            if options.dry_run { "simulating" } else { "executing" }
        );

        let outcome = definition.execute(&mut ctx).await;
        let mut result = match outcome {
            Ok(result) => normalize(result, &id),
            Err(err) => {
                log::error!("migration '{id}' raised an error: {err}");
                let result = failure_from_error(&id, ctx.stats, &err);
                if !options.dry_run {
                    self.registry
                        .mark_as_failed(&id, tenant_id, &err.to_string(), Some(&result.stats))
                        .await;
                }
                return Ok(result);
            }
        };

        if options.validate_after && !options.dry_run {
            let validation = definition.validate(&ctx).await;
            match validation {
                Ok(Some(validation)) => {
                    if !validation.is_valid {
                        log::warn!(
                            "validation of '{id}' found {} inconsistencies",
                            validation.inconsistencies
                        );
                        result.success = false;
                    }
                    result.validation_result = Some(validation);
                }
                Ok(None) => {}
                Err(err) => {
                    log::error!("validation of '{id}' raised an error: {err}");
                    result = failure_from_error(&id, result.stats, &err);
                }
            }
        }

        if !options.dry_run {
            self.record_outcome(&id, tenant_id, &mut result, MigrationStatus::Completed)
                .await;
        }

        log::info!(
            "migration '{id}' {} ({} processed, {} updated, {} errors)",
            if result.success { "succeeded" } else { "failed" },
            result.stats.items_processed,
            result.stats.items_updated,
            result.stats.errors.len()
        );
        Ok(result)
    }

    /// Run migrations in the given order, one result per attempted id.
    ///
    /// Stops after the first failure unless `continue_on_error` is set. Errors
    /// escaping a single run (unknown id, unmet prerequisites) become failed
    /// results instead of aborting the batch.
    pub async fn run_multiple<S: AsRef<str>>(
        &self,
        migration_ids: &[S],
        options: &ExecutionOptions,
    ) -> Vec<MigrationResult> {
        let mut results = Vec::with_capacity(migration_ids.len());

        for migration_id in migration_ids {
            let migration_id = migration_id.as_ref();
            let result = match self.run_single(migration_id, options).await {
                Ok(result) => result,
                Err(err) => {
                    log::error!("migration '{migration_id}' aborted: {err}");
                    MigrationResult::failed(migration_id, err.to_string())
                }
            };

            let failed = !result.success;
            results.push(result);

            if failed && !options.continue_on_error {
                log::warn!("stopping after failed migration '{migration_id}'");
                break;
            }
        }

        results
    }

    /// Run everything pending for `options.tenant_id`, in version order.
    pub async fn run_pending(&self, options: &ExecutionOptions) -> Vec<MigrationResult> {
        let pending = self.registry.get_pending_migrations(&options.tenant_id).await;
        if pending.is_empty() {
            log::info!("no pending migrations for tenant '{}'", options.tenant_id);
            return Vec::new();
        }

        let ids: Vec<String> = pending.iter().map(|def| def.id().to_string()).collect();
        log::info!("{} pending migration(s): {}", ids.len(), ids.join(", "));
        self.run_multiple(ids.as_slice(), options).await
    }

    /// Preview which migrations would run. Executes nothing.
    pub async fn create_execution_plan(
        &self,
        target: PlanTarget,
        tenant_id: Option<&str>,
    ) -> Result<ExecutionPlan, MigrationError> {
        match target {
            PlanTarget::Pending => {
                let tenant_id = tenant_id.ok_or(MigrationError::MissingTenant)?;
                let planned = self
                    .registry
                    .get_pending_migrations(tenant_id)
                    .await
                    .iter()
                    .map(|def| PlannedMigration::from(def.metadata()))
                    .collect();
                Ok(ExecutionPlan::new(planned, Vec::new()))
            }
            PlanTarget::Ids(ids) => {
                let mut planned = Vec::new();
                let mut missing = Vec::new();
                for id in ids {
                    match self.registry.get(&id) {
                        Some(def) => planned.push(PlannedMigration::from(def.metadata())),
                        None => missing.push(id),
                    }
                }
                Ok(ExecutionPlan::new(planned, missing))
            }
        }
    }

    /// Operator-triggered rollback. Never invoked by the other run operations.
    ///
    /// A successful real rollback is recorded as ROLLED_BACK, which makes the
    /// migration pending again; a failed one is recorded as FAILED.
    pub async fn rollback(
        &self,
        migration_id: &str,
        options: &ExecutionOptions,
    ) -> Result<MigrationResult, MigrationError> {
        let definition = self
            .registry
            .get(migration_id)
            .ok_or_else(|| MigrationError::NotFound(migration_id.to_string()))?;
        let id = definition.id().to_string();
        let tenant_id = options.tenant_id.as_str();
        let mut ctx = ExecutionContext::new(options.clone());

        if !definition.can_run(&ctx).await? {
            return Err(MigrationError::PrerequisiteFailed { id });
        }

        if !self.registry.is_executed(&id, tenant_id).await {
            log::warn!("rolling back '{id}' although it is not recorded as completed for tenant '{tenant_id}'");
        }

        let outcome = definition.rollback(&mut ctx).await;
        let mut result = match outcome {
            Ok(Some(result)) => normalize(result, &id),
            Ok(None) => return Err(MigrationError::RollbackUnsupported(id)),
            Err(err) => {
                log::error!("rollback of '{id}' raised an error: {err}");
                failure_from_error(&id, ctx.stats, &err)
            }
        };

        if !options.dry_run {
            self.record_outcome(&id, tenant_id, &mut result, MigrationStatus::RolledBack)
                .await;
        }

        Ok(result)
    }

    /// Append the history record for a finished real run.
    ///
    /// A successful run is recorded with `status`. If that write fails, the run is
    /// downgraded to a failure carrying the write error next to its real counters,
    /// and a FAILED record is attempted instead. Never returns an error.
    async fn record_outcome(
        &self,
        id: &str,
        tenant_id: &str,
        result: &mut MigrationResult,
        status: MigrationStatus,
    ) {
        if result.success {
            let recorded = self
                .registry
                .mark_as_executed(id, tenant_id, &result.stats, status)
                .await;
            let Err(err) = recorded else {
                return;
            };
            log::error!("failed to record {status} for migration '{id}' (tenant '{tenant_id}'): {err}");
            result.success = false;
            result.stats.record_error(id, format!("history write failed: {err}"));
        }
        self.registry
            .mark_as_failed(id, tenant_id, &failure_message(result), Some(&result.stats))
            .await;
    }
}

/// Finalize stats, pin the id and make `success` agree with the error list.
fn normalize(mut result: MigrationResult, id: &str) -> MigrationResult {
    result.stats.finalize();
    result.migration_id = id.to_string();
    if result.stats.has_errors() {
        result.success = false;
    }
    result
}

/// Failed result carrying the counters gathered so far and a single error entry.
fn failure_from_error(id: &str, mut stats: MigrationStats, err: &MigrationError) -> MigrationResult {
    stats.errors = vec![ItemError {
        id: id.to_string(),
        error: err.to_string(),
        details: None,
    }];
    stats.finalize();
    MigrationResult {
        migration_id: id.to_string(),
        success: false,
        stats,
        validation_result: None,
    }
}

fn failure_message(result: &MigrationResult) -> String {
    if let Some(error) = result.first_error() {
        return error.to_string();
    }
    match &result.validation_result {
        Some(validation) if !validation.is_valid => {
            format!("validation failed with {} inconsistencies", validation.inconsistencies)
        }
        _ => "migration reported failure".to_string(),
    }
}
