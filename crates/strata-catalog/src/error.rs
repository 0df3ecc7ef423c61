// Error types module
use strata_commons::{EntityKey, VersionToken};
use strata_store::StorageError;
use thiserror::Error;

/// Main error type for catalog operations.
///
/// Validation errors (`KeyConflict`, `ReadOnlyViolation`,
/// `CapabilityViolation`) are raised before any compare-and-set is attempted
/// and never partially apply. Concurrency errors (`ParentNotFound`,
/// `ConcurrentSchemaMutation`) arise exactly at the atomic commit boundary.
/// The engine performs zero internal retries; `is_retryable` tells the
/// caller whether a retry can ever help.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Parent not found: {parent} (while mutating {entity})")]
    ParentNotFound { entity: EntityKey, parent: EntityKey },

    #[error("Concurrent schema mutation on {entity} (expected {expected}, found {found:?})")]
    ConcurrentSchemaMutation {
        entity: EntityKey,
        expected: VersionToken,
        found: Option<VersionToken>,
    },

    #[error("Table is read only: {view}")]
    ReadOnlyViolation { view: EntityKey },

    #[error("Key conflict: column '{column}' already defined on {entity}")]
    KeyConflict { entity: EntityKey, column: String },

    #[error("Tenant scope violation on {entity}")]
    TenantScopeViolation { entity: EntityKey },

    #[error("Non-retryable storage fault: {0}")]
    NonRetryableStorageFault(String),

    #[error("Entity already exists: {0}")]
    EntityExists(EntityKey),

    #[error("Entity not found: {0}")]
    EntityNotFound(EntityKey),

    #[error("Capability violation on {entity}: {detail}")]
    CapabilityViolation { entity: EntityKey, detail: String },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl CatalogError {
    /// Whether the caller may retry the failed mutation. Only optimistic
    /// conflicts qualify; everything else is fatal to the statement.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CatalogError::ConcurrentSchemaMutation { .. }
                | CatalogError::Storage(StorageError::TransientFault(_))
        )
    }
}

impl From<StorageError> for CatalogError {
    fn from(err: StorageError) -> Self {
        match err {
            // Deliberate poison from the hook layer propagates verbatim and
            // must never be reported as a conflict.
            StorageError::NonRetryableFault(msg) => CatalogError::NonRetryableStorageFault(msg),
            other => CatalogError::Storage(other),
        }
    }
}

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
