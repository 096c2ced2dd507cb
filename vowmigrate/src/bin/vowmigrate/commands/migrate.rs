use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{Cell, Table};
use serde::Serialize;
use std::sync::Arc;

use vowmigrate::{
    DocumentStore, ExecutionOptions, ExecutionPlan, ExecutionSummary, MigrationRecord, MigrationResult, MigrationRunner,
    MigrationStatus, MigrationStatusEntry, PlanTarget, RedisStore, print_execution_summary,
};

use crate::context::{ProjectContext, RunDefaults};
use crate::output::{OutputManager, TableDisplay, report_table};
use crate::theme::Tone;
use crate::utils::{format_duration_ms, format_optional_datetime};

pub const EXAMPLES: &str = "\
Examples:
  vowmigrate migrate status --tenant wedding-42              # Catalog with per-tenant status
  vowmigrate migrate plan --tenant wedding-42                # What deploy would run
  vowmigrate migrate deploy --tenant wedding-42 --dry-run    # Preview without writing
  vowmigrate migrate deploy --tenant wedding-42              # Run all pending migrations
  vowmigrate migrate run rsvp-default --tenant wedding-42    # Run specific migrations
  vowmigrate migrate rollback rsvp-default --tenant wedding-42
  vowmigrate migrate history --tenant wedding-42 -m rsvp-default";

#[derive(Args, Debug, Clone)]
pub struct TenantArg {
    /// Tenant whose data and history are targeted
    #[arg(short, long, env = "VOWMIGRATE_TENANT")]
    pub tenant: String,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunFlags {
    /// Run migration bodies without writing data or history
    #[arg(long)]
    pub dry_run: bool,

    /// Keep going after a failed migration
    #[arg(long, overrides_with = "stop_on_error")]
    pub continue_on_error: bool,

    /// Stop at the first failed migration, even if the config says otherwise
    #[arg(long, overrides_with = "continue_on_error")]
    pub stop_on_error: bool,

    /// Skip post-execution validation
    #[arg(long)]
    pub no_validate: bool,

    /// Documents per batch for migrations that batch their work
    #[arg(long)]
    pub batch_size: Option<usize>,
}

impl RunFlags {
    /// `None` when neither flag was given, so the configured default applies.
    fn continue_on_error(&self) -> Option<bool> {
        match (self.continue_on_error, self.stop_on_error) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    fn options(&self, tenant_id: &str, defaults: &RunDefaults) -> ExecutionOptions {
        defaults.options(
            tenant_id,
            self.dry_run,
            self.continue_on_error(),
            self.no_validate,
            self.batch_size,
        )
    }
}

#[derive(Subcommand)]
pub enum MigrateCommands {
    /// Show every registered migration with its status for a tenant
    #[command(name = "status")]
    Status {
        #[command(flatten)]
        tenant: TenantArg,
    },

    /// Preview an execution plan without running anything
    #[command(name = "plan")]
    Plan {
        /// Tenant to resolve pending migrations for (required without ids)
        #[arg(short, long, env = "VOWMIGRATE_TENANT")]
        tenant: Option<String>,

        /// Explicit migration ids, in execution order
        ids: Vec<String>,
    },

    /// Run specific migrations in the given order
    #[command(name = "run")]
    Run {
        #[command(flatten)]
        tenant: TenantArg,

        /// Migration ids, in execution order
        #[arg(required = true)]
        ids: Vec<String>,

        #[command(flatten)]
        flags: RunFlags,
    },

    /// Run all pending migrations in version order
    #[command(name = "deploy")]
    Deploy {
        #[command(flatten)]
        tenant: TenantArg,

        #[command(flatten)]
        flags: RunFlags,
    },

    /// Roll back a migration through its rollback hook
    #[command(name = "rollback")]
    Rollback {
        #[command(flatten)]
        tenant: TenantArg,

        /// Migration id to roll back
        migration_id: String,

        /// Run the rollback without writing data or history
        #[arg(long)]
        dry_run: bool,
    },

    /// Show raw execution records for a tenant
    #[command(name = "history")]
    History {
        #[command(flatten)]
        tenant: TenantArg,

        /// Only show records for this migration
        #[arg(short, long)]
        migration: Option<String>,
    },
}

pub async fn handle_migrate_commands(command: MigrateCommands, output: &OutputManager) -> Result<()> {
    let ctx = ProjectContext::find()?;
    output.verbose(&format!("Using {}", ctx.config_location()));

    let defaults = ctx.config().defaults;
    let runner = connect_runner(&ctx, output).await?;

    match command {
        MigrateCommands::Status { tenant } => handle_status(&runner, &tenant.tenant, output).await,
        MigrateCommands::Plan { tenant, ids } => handle_plan(&runner, tenant.as_deref(), ids, output).await,
        MigrateCommands::Run { tenant, ids, flags } => {
            let options = flags.options(&tenant.tenant, &defaults);
            handle_run(&runner, &ids, &options, output).await
        }
        MigrateCommands::Deploy { tenant, flags } => {
            let options = flags.options(&tenant.tenant, &defaults);
            handle_deploy(&runner, &options, output).await
        }
        MigrateCommands::Rollback {
            tenant,
            migration_id,
            dry_run,
        } => {
            let options = ExecutionOptions::new(&tenant.tenant).with_dry_run(dry_run);
            handle_rollback(&runner, &migration_id, &options, output).await
        }
        MigrateCommands::History { tenant, migration } => {
            handle_history(&runner, &tenant.tenant, migration.as_deref(), output).await
        }
    }
}

async fn connect_runner(ctx: &ProjectContext, output: &OutputManager) -> Result<MigrationRunner> {
    let config = ctx.config();

    let url = ctx.store_url().inspect_err(|_| {
        output.error("Store URL could not be resolved (is REDIS_URL set?)");
    })?;
    output.verbose(&format!("Store: {url} (prefix '{}')", config.store.prefix));

    let store = RedisStore::connect(&url, config.store.prefix.clone())
        .await
        .context("Failed to connect to Redis")?;
    output.verbose("Connected to Redis");

    let store: Arc<dyn DocumentStore> = Arc::new(store);
    let registry = ctx.build_registry(store)?;
    if registry.is_empty() {
        output.warning("No migrations are declared in the configuration");
    }

    Ok(MigrationRunner::new(Arc::new(registry)))
}

async fn handle_status(runner: &MigrationRunner, tenant_id: &str, output: &OutputManager) -> Result<()> {
    output.heading(&format!("Migration Status: {tenant_id}"));

    let report = StatusReport {
        tenant_id: tenant_id.to_string(),
        migrations: runner.registry().list_with_status(tenant_id).await,
    };
    output.display(&report)?;

    let pending = report.count(MigrationStatus::Pending) + report.count(MigrationStatus::RolledBack);
    if pending > 0 {
        output.info(&format!("{pending} migration(s) pending"));
    } else {
        output.success("Up to date");
    }
    Ok(())
}

async fn handle_plan(
    runner: &MigrationRunner,
    tenant_id: Option<&str>,
    ids: Vec<String>,
    output: &OutputManager,
) -> Result<()> {
    let target = if ids.is_empty() {
        PlanTarget::Pending
    } else {
        PlanTarget::Ids(ids)
    };

    output.heading("Execution Plan");
    let plan = runner.create_execution_plan(target, tenant_id).await?;
    output.display(&plan)?;

    for missing in &plan.missing {
        output.warning(&format!("Unknown migration: {missing}"));
    }
    if plan.is_empty() {
        output.success("Nothing to run");
    } else {
        output.info(&format!("Estimated duration: {}s", plan.estimated_duration.as_secs()));
    }
    Ok(())
}

async fn handle_run(
    runner: &MigrationRunner,
    ids: &[String],
    options: &ExecutionOptions,
    output: &OutputManager,
) -> Result<()> {
    output.heading(&format!("Run Migrations: {}", options.tenant_id));
    announce_dry_run(options, output);

    let results = runner.run_multiple(ids, options).await;
    report_results(results, ids.len(), options, output)
}

async fn handle_deploy(runner: &MigrationRunner, options: &ExecutionOptions, output: &OutputManager) -> Result<()> {
    output.heading(&format!("Deploy Migrations: {}", options.tenant_id));
    announce_dry_run(options, output);

    let results = runner.run_pending(options).await;
    if results.is_empty() {
        output.success("No pending migrations");
        return Ok(());
    }
    let attempted = results.len();
    report_results(results, attempted, options, output)
}

async fn handle_rollback(
    runner: &MigrationRunner,
    migration_id: &str,
    options: &ExecutionOptions,
    output: &OutputManager,
) -> Result<()> {
    output.heading(&format!("Rollback: {migration_id}"));
    announce_dry_run(options, output);

    let result = runner.rollback(migration_id, options).await?;
    report_results(vec![result], 1, options, output)
}

async fn handle_history(
    runner: &MigrationRunner,
    tenant_id: &str,
    migration_id: Option<&str>,
    output: &OutputManager,
) -> Result<()> {
    output.heading(&format!("Migration History: {tenant_id}"));

    let records = match migration_id {
        Some(id) => runner.registry().get_history(id, tenant_id).await,
        None => runner.registry().get_executed_migrations(tenant_id).await,
    };
    output.display(&HistoryReport {
        tenant_id: tenant_id.to_string(),
        records,
    })
}

fn announce_dry_run(options: &ExecutionOptions, output: &OutputManager) {
    if options.dry_run {
        output.warning("DRY RUN MODE - No changes will be made");
    }
}

/// Print the results and turn any failure into a non-zero exit.
fn report_results(
    results: Vec<MigrationResult>,
    requested: usize,
    options: &ExecutionOptions,
    output: &OutputManager,
) -> Result<()> {
    let summary = print_execution_summary(&results);
    let report = RunReport { results, summary };
    output.display(&report)?;

    for result in report.results.iter().filter(|r| !r.success) {
        for error in &result.stats.errors {
            output.detail(Tone::Failure, &format!("{} [{}]: {}", result.migration_id, error.id, error.error));
        }
        if let Some(validation) = result.validation_result.as_ref().filter(|v| !v.is_valid) {
            for issue in &validation.details {
                output.detail(Tone::Warning, &format!("{} [{}]: {}", result.migration_id, issue.id, issue.issue));
            }
        }
    }

    let skipped = requested.saturating_sub(report.results.len());
    if skipped > 0 {
        output.warning(&format!("{skipped} migration(s) not attempted after failure"));
    }
    if options.dry_run {
        output.warning("DRY RUN - No actual changes were made");
    }

    if report.summary.all_succeeded() {
        output.success(&format!("{} migration(s) succeeded", report.summary.succeeded));
        Ok(())
    } else {
        anyhow::bail!(
            "{} migration(s) failed: {}",
            report.summary.failed,
            report.summary.failed_migrations.join(", ")
        )
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    tenant_id: String,
    migrations: Vec<MigrationStatusEntry>,
}

impl StatusReport {
    fn count(&self, status: MigrationStatus) -> usize {
        self.migrations.iter().filter(|entry| entry.status == status).count()
    }
}

impl TableDisplay for StatusReport {
    fn to_table(&self, color: bool) -> Table {
        let mut table = report_table(
            &["Status", "ID", "Name", "Version", "Last Executed", "Updated", "Errors"],
            color,
        );
        for entry in &self.migrations {
            let (updated, errors) = entry
                .stats
                .as_ref()
                .map(|s| (s.items_updated.to_string(), s.errors.len().to_string()))
                .unwrap_or_else(|| ("-".to_string(), "-".to_string()));
            table.add_row(vec![
                Tone::for_status(entry.status).cell(entry.status, color),
                Cell::new(&entry.migration.id),
                Cell::new(&entry.migration.name),
                Cell::new(&entry.migration.version),
                Cell::new(format_optional_datetime(entry.last_executed)),
                Cell::new(updated),
                Cell::new(errors),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        self.migrations
            .iter()
            .map(|entry| format!("{}:{}", entry.migration.id, entry.status))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl TableDisplay for ExecutionPlan {
    fn to_table(&self, color: bool) -> Table {
        let mut table = report_table(&["#", "ID", "Name", "Version", "Description"], color);
        for (index, migration) in self.migrations.iter().enumerate() {
            table.add_row(vec![
                Cell::new(index + 1),
                Cell::new(&migration.id),
                Cell::new(&migration.name),
                Cell::new(&migration.version),
                Cell::new(&migration.description),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        let ids: Vec<&str> = self.migrations.iter().map(|m| m.id.as_str()).collect();
        format!(
            "{} migration(s) ~{}s: {}",
            ids.len(),
            self.estimated_duration.as_secs(),
            ids.join(" ")
        )
    }
}

#[derive(Debug, Serialize)]
struct RunReport {
    results: Vec<MigrationResult>,
    summary: ExecutionSummary,
}

impl TableDisplay for RunReport {
    fn to_table(&self, color: bool) -> Table {
        let mut table = report_table(
            &["ID", "Result", "Total", "Processed", "Updated", "Skipped", "Errors", "Duration"],
            color,
        );
        for result in &self.results {
            let stats = &result.stats;
            table.add_row(vec![
                Cell::new(&result.migration_id),
                Tone::for_outcome(result.success).cell(if result.success { "ok" } else { "failed" }, color),
                Cell::new(stats.total_items),
                Cell::new(stats.items_processed),
                Cell::new(stats.items_updated),
                Cell::new(stats.items_skipped),
                Cell::new(stats.errors.len()),
                Cell::new(format_duration_ms(stats.duration_ms)),
            ]);
        }
        let summary = &self.summary;
        table.add_row(vec![
            Cell::new("total"),
            Cell::new(format!("{}/{} ok", summary.succeeded, summary.migrations_run)),
            Cell::new(summary.total_items),
            Cell::new(summary.items_processed),
            Cell::new(summary.items_updated),
            Cell::new(summary.items_skipped),
            Cell::new(summary.errors),
            Cell::new(""),
        ]);
        table
    }

    fn to_compact(&self) -> String {
        let summary = &self.summary;
        format!(
            "run={} ok={} failed={} updated={} errors={}",
            summary.migrations_run, summary.succeeded, summary.failed, summary.items_updated, summary.errors
        )
    }
}

#[derive(Debug, Serialize)]
struct HistoryReport {
    tenant_id: String,
    records: Vec<MigrationRecord>,
}

impl TableDisplay for HistoryReport {
    fn to_table(&self, color: bool) -> Table {
        let mut table = report_table(&["Executed At", "Migration", "Status", "Duration", "Error"], color);
        for record in &self.records {
            table.add_row(vec![
                Cell::new(format_optional_datetime(record.executed_at)),
                Cell::new(&record.migration_id),
                Tone::for_status(record.status).cell(record.status, color),
                Cell::new(format_duration_ms(record.execution_time_ms)),
                Cell::new(record.error.as_deref().unwrap_or("")),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        format!("{} record(s) for {}", self.records.len(), self.tenant_id)
    }
}
