use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use vowmigrate::migrations::FieldBackfill;
use vowmigrate::{DocumentStore, ExecutionOptions, MigrationMetadata, MigrationRegistry};

pub const CONFIG_DIR: &str = ".vowmigrate";
pub const CONFIG_FILE: &str = "config.toml";

/// Project context for vowmigrate operations
pub struct ProjectContext {
    /// Directory holding `.vowmigrate/`
    pub project_root: PathBuf,
    /// Path to .vowmigrate directory
    pub config_dir: PathBuf,
    /// Path to config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: Option<VowConfig>,
}

/// Configuration stored in .vowmigrate/config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VowConfig {
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub defaults: RunDefaults,
    /// Field backfills registered in the migration catalog
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backfill: Vec<BackfillConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_store_url")]
    pub url: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            prefix: default_prefix(),
        }
    }
}

fn default_store_url() -> String {
    "${REDIS_URL}".to_string()
}

fn default_prefix() -> String {
    "vow".to_string()
}

/// Execution defaults; command-line flags take precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default = "default_validate_after")]
    pub validate_after: bool,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            batch_size: None,
            continue_on_error: false,
            validate_after: default_validate_after(),
        }
    }
}

fn default_validate_after() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub version: String,
    pub collection: String,
    pub field: String,
    pub default: toml::Value,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl BackfillConfig {
    fn metadata(&self) -> MigrationMetadata {
        MigrationMetadata::new(&self.id, &self.name, &self.version)
            .with_description(&self.description)
            .with_tags(self.tags.iter().cloned())
    }

    fn into_migration(&self, store: Arc<dyn DocumentStore>) -> Result<FieldBackfill> {
        let default = serde_json::to_value(&self.default)
            .with_context(|| format!("Invalid default value for backfill '{}'", self.id))?;
        Ok(FieldBackfill::new(
            self.metadata(),
            store,
            &self.collection,
            &self.field,
            default,
        ))
    }
}

impl RunDefaults {
    /// Merge command-line flags over the configured defaults.
    pub fn options(
        &self,
        tenant_id: &str,
        dry_run: bool,
        continue_on_error: Option<bool>,
        no_validate: bool,
        batch_size: Option<usize>,
    ) -> ExecutionOptions {
        let mut options = ExecutionOptions::new(tenant_id)
            .with_dry_run(dry_run)
            .with_continue_on_error(continue_on_error.unwrap_or(self.continue_on_error))
            .with_validate_after(self.validate_after && !no_validate);
        if let Some(size) = batch_size.or(self.batch_size) {
            options = options.with_batch_size(size);
        }
        options
    }
}

impl ProjectContext {
    /// Find and load project context from current directory or ancestors
    pub fn find() -> Result<Self> {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::find_from(&current_dir)
    }

    /// Find project context starting from the given directory
    pub fn find_from(start: &Path) -> Result<Self> {
        let project_root = Self::find_project_root(start)?;
        Self::from_root(project_root)
    }

    /// Create context from a known project root
    pub fn from_root(project_root: PathBuf) -> Result<Self> {
        let config_dir = project_root.join(CONFIG_DIR);
        let config_path = config_dir.join(CONFIG_FILE);

        let config = if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).context("Failed to read config.toml")?;
            let config: VowConfig =
                toml::from_str(&content).context("Failed to parse config.toml")?;
            Some(config)
        } else {
            None
        };

        Ok(Self {
            project_root,
            config_dir,
            config_path,
            config,
        })
    }

    /// Find the nearest ancestor holding `.vowmigrate/config.toml`
    fn find_project_root(start: &Path) -> Result<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            if current.join(CONFIG_DIR).join(CONFIG_FILE).exists() {
                return Ok(current);
            }

            if !current.pop() {
                anyhow::bail!(
                    "Could not find {CONFIG_DIR}/{CONFIG_FILE} in {start:?} or any parent directory. \
                     Run 'vowmigrate init' first."
                );
            }
        }
    }

    /// Check if vowmigrate is initialized in this project
    pub fn is_initialized(&self) -> bool {
        self.config_dir.exists() && self.config_path.exists()
    }

    /// Config path relative to the project root, for messages.
    pub fn config_location(&self) -> String {
        let relative = self
            .config_path
            .strip_prefix(&self.project_root)
            .unwrap_or(&self.config_path);
        format!("{} (in {})", relative.display(), self.project_root.display())
    }

    pub fn config(&self) -> VowConfig {
        self.config.clone().unwrap_or_default()
    }

    /// Get the store URL, expanding environment variables
    pub fn store_url(&self) -> Result<String> {
        let url = self
            .config
            .as_ref()
            .map(|c| c.store.url.as_str())
            .unwrap_or("${REDIS_URL}");
        expand_env(url)
    }

    /// Registry holding every migration declared in the config.
    pub fn build_registry(&self, store: Arc<dyn DocumentStore>) -> Result<MigrationRegistry> {
        let mut registry = MigrationRegistry::new(store.clone());
        for entry in self.config.iter().flat_map(|c| c.backfill.iter()) {
            let migration = entry.into_migration(store.clone())?;
            registry
                .register(Arc::new(migration))
                .with_context(|| format!("Invalid migration catalog in {}", self.config_location()))?;
        }
        Ok(registry)
    }
}

fn expand_env(value: &str) -> Result<String> {
    match value.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        Some(var_name) => std::env::var(var_name)
            .with_context(|| format!("Environment variable {var_name} not set")),
        None => Ok(value.to_string()),
    }
}
