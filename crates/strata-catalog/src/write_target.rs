//! Write-target resolution for the bulk-load / write-path collaborator.
//!
//! Writers resolve a view to its physical root table before generating any
//! storage records: the answer carries the updatability verdict, the
//! effective key layout generated keys must match, and the constants the
//! view's predicate chain pins, so a write through `v1` (predicate
//! `k1 = 1`) that omits `k1` implicitly fixes it to 1.

use crate::error::{CatalogError, Result};
use crate::registry::SchemaRegistry;
use crate::views::{collect_equality_pins, PinnedColumn};
use std::sync::Arc;
use strata_commons::{EntityKey, EntityKind, KeyLayout, TenantId};
use strata_store::CatalogStore;

/// Resolved target for writes addressed at a view.
#[derive(Debug, Clone)]
pub struct WriteTarget {
    /// The root table whose rows the view exposes.
    pub physical_table: EntityKey,
    pub is_updatable: bool,
    /// The view's composed key layout; generated keys must match it exactly.
    pub effective_pk: KeyLayout,
    /// PK columns pinned to constants anywhere on the view chain, in key
    /// order. The write path fills these for omitted columns.
    pub pinned: Vec<PinnedColumn>,
}

impl WriteTarget {
    /// Gate for the write path: rejects before any record is generated.
    pub fn ensure_updatable(&self, view: &EntityKey) -> Result<()> {
        if self.is_updatable {
            Ok(())
        } else {
            Err(CatalogError::ReadOnlyViolation { view: view.clone() })
        }
    }
}

/// Resolves `view_key` down to its physical table.
pub fn resolve_write_target(
    store: &CatalogStore,
    registry: &SchemaRegistry,
    view_key: &EntityKey,
    caller: Option<&TenantId>,
) -> Result<WriteTarget> {
    let view = registry
        .get(store, view_key, caller)?
        .ok_or_else(|| CatalogError::EntityNotFound(view_key.clone()))?;
    if view.entity.kind == EntityKind::Index {
        return Err(CatalogError::InvalidOperation(format!(
            "cannot write through index {}",
            view_key
        )));
    }

    let mut pinned: Vec<PinnedColumn> = Vec::new();
    let mut current = Arc::clone(&view);
    while let Some(parent_key) = current.entity.parent.clone() {
        let parent = registry
            .get(store, &parent_key, caller)?
            .ok_or_else(|| CatalogError::ParentNotFound {
                entity: current.entity.key.clone(),
                parent: parent_key.clone(),
            })?;
        for pin in collect_equality_pins(
            &parent.entity.key_layout,
            current.entity.view_predicate.as_ref(),
        ) {
            // Key prefixes align across levels, so positions from any
            // ancestor layout are positions in the view's own layout.
            if !pinned.iter().any(|p| p.position == pin.position) {
                pinned.push(pin);
            }
        }
        current = parent;
    }
    pinned.sort_by_key(|p| p.position);

    Ok(WriteTarget {
        physical_table: current.entity.key.clone(),
        is_updatable: view.entity.updatable,
        effective_pk: view.entity.key_layout.clone(),
        pinned,
    })
}
