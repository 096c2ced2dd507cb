//! The contract every migration implements, plus shared bookkeeping helpers.
//!
//! A migration is any value implementing [`MigrationDefinition`]. Only
//! [`execute`](MigrationDefinition::execute) is required; validation, rollback and
//! the prerequisite gate are optional capabilities with inert defaults.
//! Concrete migrations embed a [`MigrationBase`] for stats and logging instead of
//! re-implementing that bookkeeping.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::MigrationError;
use crate::types::{ExecutionContext, MigrationResult, MigrationStats, ValidationResult};

/// Identity of a migration. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationMetadata {
    /// Globally unique and stable across versions.
    pub id: String,
    pub name: String,
    pub description: String,
    /// Ordering key, compared as a plain string.
    pub version: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl MigrationMetadata {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            version: version.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[async_trait]
pub trait MigrationDefinition: Send + Sync {
    fn metadata(&self) -> &MigrationMetadata;

    fn id(&self) -> &str {
        &self.metadata().id
    }

    /// Transform the tenant's data, counting progress in `ctx.stats`.
    ///
    /// Must be safe to call repeatedly: dry runs bypass the runner's history check,
    /// so the body has to detect already-migrated items itself.
    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<MigrationResult, MigrationError>;

    /// Re-read migrated data and report drift. Must not mutate anything.
    /// `Ok(None)` means the migration has no validator.
    async fn validate(&self, _ctx: &ExecutionContext) -> Result<Option<ValidationResult>, MigrationError> {
        Ok(None)
    }

    /// Reverse the transformation. `Ok(None)` means rollback is unsupported.
    async fn rollback(&self, _ctx: &mut ExecutionContext) -> Result<Option<MigrationResult>, MigrationError> {
        Ok(None)
    }

    /// Prerequisite gate evaluated before any side effect.
    async fn can_run(&self, _ctx: &ExecutionContext) -> Result<bool, MigrationError> {
        Ok(true)
    }
}

/// Bookkeeping shared by concrete migrations: metadata, stats lifecycle and
/// run-mode-tagged logging.
#[derive(Debug, Clone)]
pub struct MigrationBase {
    metadata: MigrationMetadata,
}

impl MigrationBase {
    pub fn new(metadata: MigrationMetadata) -> Self {
        Self { metadata }
    }

    pub fn metadata(&self) -> &MigrationMetadata {
        &self.metadata
    }

    pub fn init_stats(&self) -> MigrationStats {
        MigrationStats::new()
    }

    pub fn finalize_stats(&self, stats: &mut MigrationStats) {
        stats.finalize();
    }

    /// Finalize the context's stats and wrap them in a result.
    pub fn finish(&self, ctx: &mut ExecutionContext) -> MigrationResult {
        self.finalize_stats(&mut ctx.stats);
        MigrationResult::from_stats(self.metadata.id.clone(), ctx.stats.clone())
    }

    fn prefix(&self, ctx: &ExecutionContext) -> String {
        let mode = if ctx.is_dry_run() { "[DRY RUN]" } else { "[LIVE]" };
        format!("{mode} [{}] [{}]", self.metadata.id, ctx.tenant_id)
    }

    pub fn log_info(&self, ctx: &ExecutionContext, message: &str) {
        log::info!("{} {message}", self.prefix(ctx));
    }

    pub fn log_success(&self, ctx: &ExecutionContext, message: &str) {
        log::info!("{} ✓ {message}", self.prefix(ctx));
    }

    pub fn log_warning(&self, ctx: &ExecutionContext, message: &str) {
        log::warn!("{} {message}", self.prefix(ctx));
    }

    pub fn log_error(&self, ctx: &ExecutionContext, message: &str) {
        log::error!("{} {message}", self.prefix(ctx));
    }

    /// Human-readable summary lines for one result.
    pub fn summary_lines(&self, result: &MigrationResult) -> Vec<String> {
        let stats = &result.stats;
        let mut lines = vec![
            format!("Migration: {} ({})", self.metadata.name, self.metadata.id),
            format!("Status: {}", if result.success { "success" } else { "failed" }),
            format!("Total items: {}", stats.total_items),
            format!("Processed: {}", stats.items_processed),
            format!("Updated: {}", stats.items_updated),
            format!("Skipped: {}", stats.items_skipped),
            format!("Errors: {}", stats.errors.len()),
            format!("Warnings: {}", stats.warnings.len()),
        ];
        if let Some(duration) = stats.duration_ms {
            lines.push(format!("Duration: {duration}ms"));
        }
        for entry in &stats.errors {
            lines.push(format!("  error [{}]: {}", entry.id, entry.error));
        }
        if let Some(validation) = &result.validation_result {
            lines.push(format!(
                "Validation: {} ({} inconsistencies)",
                if validation.is_valid { "valid" } else { "invalid" },
                validation.inconsistencies
            ));
        }
        lines
    }

    pub fn print_summary(&self, result: &MigrationResult) {
        for line in self.summary_lines(result) {
            log::info!("{line}");
        }
    }
}
