//! Execution-state model shared by definitions, the registry and the runner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::definition::MigrationMetadata;

/// Options supplied by the caller for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOptions {
    /// Simulate without persisting data changes or history.
    pub dry_run: bool,
    /// Tenant (wedding) whose data is migrated.
    pub tenant_id: String,
    /// Preferred page size for migrations that process items in batches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    /// Keep going after a failed migration in a multi-migration run.
    pub continue_on_error: bool,
    /// Run the definition's validator after a real execution.
    pub validate_after: bool,
}

impl ExecutionOptions {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            dry_run: false,
            tenant_id: tenant_id.into(),
            batch_size: None,
            continue_on_error: false,
            validate_after: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_validate_after(mut self, validate_after: bool) -> Self {
        self.validate_after = validate_after;
        self
    }
}

/// Per-run working state handed to a migration.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub options: ExecutionOptions,
    pub tenant_id: String,
    /// Live counters, mutated by the migration while it runs.
    pub stats: MigrationStats,
}

impl ExecutionContext {
    pub fn new(options: ExecutionOptions) -> Self {
        let tenant_id = options.tenant_id.clone();
        Self {
            options,
            tenant_id,
            stats: MigrationStats::new(),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.options.dry_run
    }

    /// Batch size requested by the caller, or `default` when unset or zero.
    pub fn batch_size_or(&self, default: usize) -> usize {
        match self.options.batch_size {
            Some(size) if size > 0 => size,
            _ => default,
        }
    }
}

/// Item-level error captured during execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemError {
    pub id: String,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Item-level warning captured during execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemWarning {
    pub id: String,
    pub warning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Counters and logs accumulated during one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationStats {
    pub total_items: u64,
    pub items_processed: u64,
    pub items_skipped: u64,
    pub items_updated: u64,
    #[serde(default)]
    pub errors: Vec<ItemError>,
    #[serde(default)]
    pub warnings: Vec<ItemWarning>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Milliseconds between `start_time` and `end_time`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

impl MigrationStats {
    /// Zeroed counters starting now.
    pub fn new() -> Self {
        Self {
            total_items: 0,
            items_processed: 0,
            items_skipped: 0,
            items_updated: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
            duration_ms: None,
        }
    }

    pub fn record_error(&mut self, id: impl Into<String>, error: impl Into<String>) {
        self.errors.push(ItemError {
            id: id.into(),
            error: error.into(),
            details: None,
        });
    }

    pub fn record_error_with_details(&mut self, id: impl Into<String>, error: impl Into<String>, details: Value) {
        self.errors.push(ItemError {
            id: id.into(),
            error: error.into(),
            details: Some(details),
        });
    }

    pub fn record_warning(&mut self, id: impl Into<String>, warning: impl Into<String>) {
        self.warnings.push(ItemWarning {
            id: id.into(),
            warning: warning.into(),
            details: None,
        });
    }

    pub fn record_warning_with_details(&mut self, id: impl Into<String>, warning: impl Into<String>, details: Value) {
        self.warnings.push(ItemWarning {
            id: id.into(),
            warning: warning.into(),
            details: Some(details),
        });
    }

    /// Stamp `end_time` and `duration_ms`. Only the first call has an effect.
    pub fn finalize(&mut self) {
        if self.end_time.is_some() {
            return;
        }
        let end = Utc::now();
        self.end_time = Some(end);
        self.duration_ms = Some((end - self.start_time).num_milliseconds());
    }

    pub fn is_finalized(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl Default for MigrationStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one migration execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationResult {
    pub migration_id: String,
    pub success: bool,
    pub stats: MigrationStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_result: Option<ValidationResult>,
}

impl MigrationResult {
    /// Build a result whose success flag follows the collected errors.
    pub fn from_stats(migration_id: impl Into<String>, stats: MigrationStats) -> Self {
        Self {
            migration_id: migration_id.into(),
            success: stats.errors.is_empty(),
            stats,
            validation_result: None,
        }
    }

    /// Failed result with zero counters and a single error naming the migration.
    pub fn failed(migration_id: impl Into<String>, error: impl Into<String>) -> Self {
        let migration_id = migration_id.into();
        let mut stats = MigrationStats::new();
        stats.record_error(migration_id.clone(), error);
        stats.finalize();
        Self {
            migration_id,
            success: false,
            stats,
            validation_result: None,
        }
    }

    /// Message of the first recorded error, if any.
    pub fn first_error(&self) -> Option<&str> {
        self.stats.errors.first().map(|entry| entry.error.as_str())
    }
}

/// One inconsistency found by a validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub id: String,
    pub issue: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
}

impl ValidationIssue {
    pub fn new(id: impl Into<String>, issue: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            issue: issue.into(),
            expected: None,
            actual: None,
        }
    }

    pub fn with_values(mut self, expected: Value, actual: Value) -> Self {
        self.expected = Some(expected);
        self.actual = Some(actual);
        self
    }
}

/// Result of a post-execution consistency check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub inconsistencies: u64,
    pub details: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn from_issues(details: Vec<ValidationIssue>) -> Self {
        Self {
            is_valid: details.is_empty(),
            inconsistencies: details.len() as u64,
            details,
        }
    }

    pub fn valid() -> Self {
        Self::from_issues(Vec::new())
    }
}

/// Status of a migration for a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationStatus {
    /// No history exists. Never persisted.
    Pending,
    Completed,
    Failed,
    RolledBack,
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MigrationStatus::Pending => "PENDING",
            MigrationStatus::Completed => "COMPLETED",
            MigrationStatus::Failed => "FAILED",
            MigrationStatus::RolledBack => "ROLLED_BACK",
        };
        f.write_str(label)
    }
}

/// Persisted audit entry for one execution attempt. Never updated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub migration_id: String,
    pub status: MigrationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    /// Execution time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<MigrationStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tenant_id: String,
}

/// Catalog entry joined with the tenant's latest history record.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatusEntry {
    pub migration: MigrationMetadata,
    pub status: MigrationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_executed: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<MigrationStats>,
}
