//! Resolved-schema cache.
//!
//! A read-through cache over the catalog store for query-compile-time
//! lookups. The coordinator invalidates entries on every committed
//! mutation; tenant visibility is re-checked on every cache hit so a shared
//! cache never leaks a tenant-scoped entity to the wrong connection.

use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;
use strata_commons::{EntityKey, TenantId};
use strata_store::{CatalogStore, VersionedEntity};

#[derive(Default)]
pub struct SchemaRegistry {
    entries: DashMap<EntityKey, Arc<VersionedEntity>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn visible_to(row: &VersionedEntity, caller: Option<&TenantId>) -> bool {
        match row.entity.key.tenant.as_ref() {
            None => true,
            Some(tenant) => caller == Some(tenant),
        }
    }

    /// Cached lookup, falling back to the store on miss. Returns `None` for
    /// absent entities and for entities outside the caller's tenant scope.
    pub fn get(
        &self,
        store: &CatalogStore,
        key: &EntityKey,
        caller: Option<&TenantId>,
    ) -> Result<Option<Arc<VersionedEntity>>> {
        if let Some(row) = self.entries.get(key) {
            let row = Arc::clone(&row);
            return Ok(Self::visible_to(&row, caller).then_some(row));
        }
        match store.get(key, caller)? {
            Some(row) => {
                let row = Arc::new(row);
                self.entries.insert(key.clone(), Arc::clone(&row));
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    /// Drops one entry after a committed mutation.
    pub fn invalidate(&self, key: &EntityKey) {
        self.entries.remove(key);
    }

    /// Drops a batch of entries (DROP cascade).
    pub fn invalidate_many<'a>(&self, keys: impl IntoIterator<Item = &'a EntityKey>) {
        for key in keys {
            self.entries.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
