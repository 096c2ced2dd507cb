mod commands;
mod context;
mod output;
mod theme;
mod utils;

use anyhow::Result;
use clap::builder::styling::{AnsiColor, Styles};
use clap::{Parser, Subcommand};

use commands::init::{self, InitArgs, handle_init};
use commands::migrate::{self, MigrateCommands, handle_migrate_commands};
use output::{GlobalOptions, OutputFormat, OutputManager};
use theme::TERMINAL_COLOR;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Cyan.on_default().bold())
    .usage(AnsiColor::BrightBlue.on_default().bold())
    .literal(AnsiColor::Magenta.on_default())
    .placeholder(AnsiColor::BrightBlack.on_default())
    .valid(AnsiColor::Green.on_default())
    .invalid(AnsiColor::Yellow.on_default())
    .error(AnsiColor::Red.on_default().bold());

const ENVIRONMENT: &str = "\
Environment:
  REDIS_URL          Store URL when [store].url is \"${REDIS_URL}\"
  VOWMIGRATE_TENANT  Default for --tenant
  RUST_LOG           Engine log level (error, warn, info, debug)";

/// Tenant-scoped data migrations with per-tenant history, dry runs and rollback.
///
/// Migrations are declared in .vowmigrate/config.toml and executed against one
/// tenant at a time. Completed migrations are never re-run for the same tenant.
#[derive(Parser)]
#[command(name = "vowmigrate", version, styles = STYLES, after_long_help = ENVIRONMENT)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Report format
    #[arg(long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print connection and catalog details
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write .vowmigrate/config.toml in the current directory
    #[command(after_long_help = init::EXAMPLES)]
    Init(InitArgs),

    /// Inspect, run and roll back migrations for a tenant
    #[command(subcommand, after_long_help = migrate::EXAMPLES)]
    Migrate(MigrateCommands),
}

impl Cli {
    fn global_options(&self) -> GlobalOptions {
        GlobalOptions {
            output_format: self.output,
            quiet: self.quiet,
            verbose: self.verbose,
            no_color: self.no_color || !*TERMINAL_COLOR,
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(err) = execute(cli).await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let options = cli.global_options();
    if options.no_color {
        colored::control::set_override(false);
    }
    let output = OutputManager::new(options);

    match cli.command {
        Commands::Init(args) => handle_init(args, &output).await,
        Commands::Migrate(command) => handle_migrate_commands(command, &output).await,
    }
}
