use anyhow::{Context, Result};
use clap::Args;

use crate::context::{ProjectContext, StoreSettings, VowConfig};
use crate::output::OutputManager;
use crate::theme::Tone;

pub const EXAMPLES: &str = "\
Examples:
  vowmigrate init                 # Write .vowmigrate/config.toml
  vowmigrate init --prefix wed    # Use a custom key prefix
  vowmigrate init --force         # Overwrite an existing config";

#[derive(Args)]
pub struct InitArgs {
    /// Key prefix for tenant documents
    #[arg(long)]
    pub prefix: Option<String>,

    /// Overwrite an existing configuration
    #[arg(long)]
    pub force: bool,
}

pub async fn handle_init(args: InitArgs, output: &OutputManager) -> Result<()> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    let ctx = ProjectContext::from_root(current_dir)?;

    output.heading("Initialize vowmigrate");

    if ctx.is_initialized() && !args.force {
        output.warning(&format!("Already initialized: {}", ctx.config_location()));
        output.info("Use --force to overwrite the existing configuration.");
        return Ok(());
    }

    let config = default_config(args.prefix);
    let content = toml::to_string_pretty(&config).context("Failed to serialize config")?;

    std::fs::create_dir_all(&ctx.config_dir).context("Failed to create .vowmigrate directory")?;
    std::fs::write(&ctx.config_path, content)
        .with_context(|| format!("Failed to write {}", ctx.config_path.display()))?;

    output.success(&format!("Created {}", ctx.config_location()));
    output.info("Next steps:");
    for step in [
        "Set REDIS_URL or edit [store].url",
        "Declare [[backfill]] migrations in the config",
        "Run 'vowmigrate migrate status --tenant <id>'",
    ] {
        output.detail(Tone::Muted, step);
    }

    Ok(())
}

fn default_config(prefix: Option<String>) -> VowConfig {
    let mut store = StoreSettings::default();
    if let Some(prefix) = prefix {
        store.prefix = prefix;
    }
    VowConfig {
        store,
        ..Default::default()
    }
}
