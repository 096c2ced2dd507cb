use std::time::Duration;

use serde::Serialize;

use crate::definition::MigrationMetadata;

/// Rough cost per migration used for plan estimates.
pub const ESTIMATED_SECONDS_PER_MIGRATION: u64 = 30;

/// Which migrations a plan should cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanTarget {
    /// Everything pending for the tenant, in version order.
    Pending,
    /// Explicit ids, in the given order.
    Ids(Vec<String>),
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedMigration {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
}

impl From<&MigrationMetadata> for PlannedMigration {
    fn from(meta: &MigrationMetadata) -> Self {
        Self {
            id: meta.id.clone(),
            name: meta.name.clone(),
            description: meta.description.clone(),
            version: meta.version.clone(),
        }
    }
}

/// Read-only preview of a run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPlan {
    pub migrations: Vec<PlannedMigration>,
    /// Requested ids with no registered definition.
    pub missing: Vec<String>,
    #[serde(rename = "estimated_duration_secs", serialize_with = "serialize_secs")]
    pub estimated_duration: Duration,
}

impl ExecutionPlan {
    pub fn new(migrations: Vec<PlannedMigration>, missing: Vec<String>) -> Self {
        let estimated_duration = Duration::from_secs(ESTIMATED_SECONDS_PER_MIGRATION * migrations.len() as u64);
        Self {
            migrations,
            missing,
            estimated_duration,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

fn serialize_secs<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_secs())
}
