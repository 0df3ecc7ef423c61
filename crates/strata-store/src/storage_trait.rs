//! Storage backend abstraction.
//!
//! The catalog engine only assumes a sorted key-value store with atomic
//! multi-operation batches; this trait is that assumption made explicit.
//! Partitions map to whatever the backend natively offers (column families,
//! trees, key prefixes). The in-memory implementation in `memory.rs` is the
//! reference backend; a RocksDB or remote-store implementation plugs in
//! behind the same trait.

use std::fmt;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors surfaced by storage backends and the catalog store.
#[derive(Debug, Clone)]
pub enum StorageError {
    /// Partition (column family, tree, namespace) not found
    PartitionNotFound(String),

    /// Generic I/O error from underlying storage
    IoError(String),

    /// Serialization/deserialization error
    SerializationError(String),

    /// A mutation hook explicitly refused the mutation and marked the
    /// refusal as non-retryable. Never masked as a version conflict.
    NonRetryableFault(String),

    /// A mutation hook reported a transient condition.
    TransientFault(String),

    /// Other errors
    Other(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::PartitionNotFound(p) => write!(f, "Partition not found: {}", p),
            StorageError::IoError(msg) => write!(f, "I/O error: {}", msg),
            StorageError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            StorageError::NonRetryableFault(msg) => write!(f, "Non-retryable fault: {}", msg),
            StorageError::TransientFault(msg) => write!(f, "Transient fault: {}", msg),
            StorageError::Other(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

/// A logical partition of data within a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition {
    name: String,
}

impl Partition {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl From<&str> for Partition {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A single operation in an atomic batch.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Insert or update a key-value pair
    Put {
        partition: Partition,
        key: Vec<u8>,
        value: Vec<u8>,
    },

    /// Delete a key
    Delete { partition: Partition, key: Vec<u8> },
}

/// Pluggable storage backend. Implementations must be thread-safe; `batch`
/// must apply all-or-nothing.
pub trait StorageBackend: Send + Sync {
    /// Retrieves a value by key. `Ok(None)` when the key does not exist.
    fn get(&self, partition: &Partition, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Stores a key-value pair, replacing any previous value.
    fn put(&self, partition: &Partition, key: &[u8], value: &[u8]) -> Result<()>;

    /// Deletes a key. Idempotent.
    fn delete(&self, partition: &Partition, key: &[u8]) -> Result<()>;

    /// Applies all operations atomically: either every operation takes
    /// effect or none does.
    fn batch(&self, operations: Vec<Operation>) -> Result<()>;

    /// Scans keys in sorted order, optionally filtered by prefix and
    /// bounded by `limit`.
    fn scan(
        &self,
        partition: &Partition,
        prefix: Option<&[u8]>,
        limit: Option<usize>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Creates a partition. Idempotent.
    fn create_partition(&self, partition: &Partition) -> Result<()>;

    /// Checks whether a partition exists.
    fn partition_exists(&self, partition: &Partition) -> bool;
}
