//! In-memory storage backend.
//!
//! Sorted maps behind one `RwLock` per store; `batch` applies under a single
//! write-lock acquisition, which is the crate's atomicity primitive. This is
//! the reference backend for the catalog engine's contract and the backend
//! every test runs against.

use crate::storage_trait::{Operation, Partition, Result, StorageBackend, StorageError};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

type PartitionData = BTreeMap<Vec<u8>, Vec<u8>>;

/// Thread-safe in-memory backend.
#[derive(Default)]
pub struct MemoryBackend {
    partitions: RwLock<HashMap<String, PartitionData>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, partition: &Partition, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let partitions = self.partitions.read();
        let data = partitions
            .get(partition.name())
            .ok_or_else(|| StorageError::PartitionNotFound(partition.name().to_string()))?;
        Ok(data.get(key).cloned())
    }

    fn put(&self, partition: &Partition, key: &[u8], value: &[u8]) -> Result<()> {
        let mut partitions = self.partitions.write();
        let data = partitions
            .get_mut(partition.name())
            .ok_or_else(|| StorageError::PartitionNotFound(partition.name().to_string()))?;
        data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, partition: &Partition, key: &[u8]) -> Result<()> {
        let mut partitions = self.partitions.write();
        let data = partitions
            .get_mut(partition.name())
            .ok_or_else(|| StorageError::PartitionNotFound(partition.name().to_string()))?;
        data.remove(key);
        Ok(())
    }

    fn batch(&self, operations: Vec<Operation>) -> Result<()> {
        let mut partitions = self.partitions.write();
        // Validate every partition before touching anything so a failed
        // batch leaves no partial writes behind.
        for op in &operations {
            let name = match op {
                Operation::Put { partition, .. } | Operation::Delete { partition, .. } => {
                    partition.name()
                }
            };
            if !partitions.contains_key(name) {
                return Err(StorageError::PartitionNotFound(name.to_string()));
            }
        }
        for op in operations {
            match op {
                Operation::Put {
                    partition,
                    key,
                    value,
                } => {
                    partitions
                        .get_mut(partition.name())
                        .expect("partition checked above")
                        .insert(key, value);
                }
                Operation::Delete { partition, key } => {
                    partitions
                        .get_mut(partition.name())
                        .expect("partition checked above")
                        .remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan(
        &self,
        partition: &Partition,
        prefix: Option<&[u8]>,
        limit: Option<usize>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let partitions = self.partitions.read();
        let data = partitions
            .get(partition.name())
            .ok_or_else(|| StorageError::PartitionNotFound(partition.name().to_string()))?;

        let max = limit.unwrap_or(usize::MAX);
        let mut results = Vec::new();
        match prefix {
            Some(prefix) => {
                for (key, value) in data.range(prefix.to_vec()..) {
                    if !key.starts_with(prefix) {
                        break;
                    }
                    results.push((key.clone(), value.clone()));
                    if results.len() >= max {
                        break;
                    }
                }
            }
            None => {
                for (key, value) in data.iter().take(max) {
                    results.push((key.clone(), value.clone()));
                }
            }
        }
        Ok(results)
    }

    fn create_partition(&self, partition: &Partition) -> Result<()> {
        let mut partitions = self.partitions.write();
        partitions.entry(partition.name().to_string()).or_default();
        Ok(())
    }

    fn partition_exists(&self, partition: &Partition) -> bool {
        self.partitions.read().contains_key(partition.name())
    }
}
