//! Capability surface for transaction-provider collaborators.
//!
//! Providers consult entity immutability and the capability flags a table
//! declares so unsupported combinations (say, a local index under a
//! provider that forbids them) are refused at DDL time rather than
//! discovered on the write path.

use crate::error::{CatalogError, Result};
use crate::registry::SchemaRegistry;
use strata_commons::{EntityKey, IndexScope, SchemaEntity, StorageEncoding, TableCapabilities, TenantId};
use strata_store::CatalogStore;

/// What a provider needs to know about one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderFacts {
    pub immutable_rows: bool,
    pub capabilities: TableCapabilities,
    pub encoding: StorageEncoding,
}

/// Facts for a committed entity, through the resolved-schema cache.
pub fn provider_facts(
    store: &CatalogStore,
    registry: &SchemaRegistry,
    key: &EntityKey,
    caller: Option<&TenantId>,
) -> Result<ProviderFacts> {
    let row = registry
        .get(store, key, caller)?
        .ok_or_else(|| CatalogError::EntityNotFound(key.clone()))?;
    Ok(ProviderFacts {
        immutable_rows: row.entity.immutable_rows,
        capabilities: row.entity.capabilities,
        encoding: row.entity.encoding,
    })
}

/// DDL-time check that `parent` may carry an index of the given scope.
pub fn check_index_allowed(parent: &SchemaEntity, scope: IndexScope) -> Result<()> {
    if scope == IndexScope::Local && !parent.capabilities.allow_local_index {
        return Err(CatalogError::CapabilityViolation {
            entity: parent.key.clone(),
            detail: "local indexes are not supported on this table".into(),
        });
    }
    if !parent.immutable_rows && !parent.capabilities.allow_mutable_indexes {
        return Err(CatalogError::CapabilityViolation {
            entity: parent.key.clone(),
            detail: "indexes on mutable rows are not supported on this table".into(),
        });
    }
    Ok(())
}
