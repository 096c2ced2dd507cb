//! Batch-level aggregation for operator reporting.

use serde::Serialize;

use crate::types::MigrationResult;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionSummary {
    pub migrations_run: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_items: u64,
    pub items_processed: u64,
    pub items_updated: u64,
    pub items_skipped: u64,
    pub errors: usize,
    pub warnings: usize,
    /// Ids of the failed migrations, in execution order.
    pub failed_migrations: Vec<String>,
}

impl ExecutionSummary {
    pub fn from_results(results: &[MigrationResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.migrations_run += 1;
            if result.success {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
                summary.failed_migrations.push(result.migration_id.clone());
            }
            let stats = &result.stats;
            summary.total_items += stats.total_items;
            summary.items_processed += stats.items_processed;
            summary.items_updated += stats.items_updated;
            summary.items_skipped += stats.items_skipped;
            summary.errors += stats.errors.len();
            summary.warnings += stats.warnings.len();
        }
        summary
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Aggregate a batch and log it. Has no other side effects.
pub fn print_execution_summary(results: &[MigrationResult]) -> ExecutionSummary {
    let summary = ExecutionSummary::from_results(results);
    log::info!(
        "execution summary: {} run, {} succeeded, {} failed",
        summary.migrations_run,
        summary.succeeded,
        summary.failed
    );
    log::info!(
        "items: {} total, {} processed, {} updated, {} skipped",
        summary.total_items,
        summary.items_processed,
        summary.items_updated,
        summary.items_skipped
    );
    log::info!("errors: {}, warnings: {}", summary.errors, summary.warnings);
    if !summary.failed_migrations.is_empty() {
        log::warn!("failed migrations: {}", summary.failed_migrations.join(", "));
    }
    summary
}
