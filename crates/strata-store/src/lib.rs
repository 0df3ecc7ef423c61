//! strata-store
//!
//! Storage abstraction and the durable catalog store. The `StorageBackend`
//! trait keeps the engine independent of any concrete sorted key-value
//! engine; `CatalogStore` layers typed entity access, tenant scoping,
//! atomic compare-and-set, descendant scans, and the shared qualifier
//! counter rows on top of it. The mutation-hook seam lets an embedder
//! intercept catalog mutations before they apply.

pub mod catalog_store;
pub mod hook;
pub mod memory;
pub mod storage_trait;

pub use catalog_store::{
    CasOutcome, CatalogStore, QualifierCounter, SubtreeOutcome, VersionedEntity,
};
pub use hook::{HookError, MutationContext, MutationHook, MutationId};
pub use memory::MemoryBackend;
pub use storage_trait::{Operation, Partition, Result, StorageBackend, StorageError};
