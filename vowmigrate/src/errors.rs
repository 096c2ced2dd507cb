use std::borrow::Cow;

use thiserror::Error;

/// Top-level error type returned by the migration engine.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A definition with the same id is already in the catalog.
    #[error("migration '{0}' is already registered")]
    DuplicateId(String),

    /// No definition with this id is registered.
    #[error("migration '{0}' not found")]
    NotFound(String),

    /// `can_run` reported that the migration's prerequisites are not met.
    #[error("prerequisites not met for migration '{id}'")]
    PrerequisiteFailed { id: String },

    /// A tenant is required to resolve pending migrations.
    #[error("a tenant id is required to resolve pending migrations")]
    MissingTenant,

    /// The definition does not provide a rollback.
    #[error("migration '{0}' does not support rollback")]
    RollbackUnsupported(String),

    /// Raised from inside a migration body.
    #[error("{message}")]
    Execution { message: Cow<'static, str> },

    /// Document store failure that could not be degraded.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl MigrationError {
    /// Convenience constructor for failures raised by migration bodies.
    pub fn execution(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }
}

/// Errors surfaced by [`DocumentStore`](crate::store::DocumentStore) implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The addressed document does not exist.
    #[error("document '{id}' not found in collection '{collection}'")]
    NotFound { collection: String, id: String },

    /// The store could not serve the request.
    #[error("store unavailable: {message}")]
    Unavailable { message: Cow<'static, str> },
}

impl StoreError {
    pub fn unavailable(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}
