//! Index inheritance resolution.
//!
//! An index declared anywhere on the ancestor chain of a view is a
//! candidate for queries against that view, transitively across inheritance
//! levels. Resolution is read-only against committed catalog state and is
//! deterministic for identical catalog state and query shape, which is what
//! plan-stability tests pin down.

use crate::error::{CatalogError, Result};
use crate::index::scan_range::{extract_constraints, ranges_for_layout, ScanRange};
use crate::registry::SchemaRegistry;
use crate::views::collect_equality_pins;
use std::sync::Arc;
use strata_commons::{EntityKey, EntityKind, Expr, IndexScope, TenantId};
use strata_store::{CatalogStore, VersionedEntity};

/// A compile-time query against a view: parsed predicate plus projection.
#[derive(Debug, Clone, Default)]
pub struct QueryShape {
    pub predicate: Option<Expr>,
    pub projection: Vec<String>,
}

/// One usable index, with the cost facts the tie-break is decided on.
#[derive(Debug, Clone)]
pub struct IndexCandidate {
    pub index: Arc<VersionedEntity>,
    /// Key columns that must be range-scanned: key length minus the
    /// equality-pinned leading prefix. Fewer means a narrower scan.
    pub range_scanned: usize,
}

/// Resolution result: ordered candidates, the chosen index, and the scan
/// boundaries the chosen index yields for this query.
#[derive(Debug, Clone)]
pub struct IndexResolution {
    pub candidates: Vec<IndexCandidate>,
    pub chosen: Option<Arc<VersionedEntity>>,
    pub scan_ranges: Vec<ScanRange>,
}

/// Collects every index on the ancestor chain of `view_key` (the view
/// itself included) that covers the query, orders them, and derives scan
/// boundaries from the best one.
pub fn resolve_indexes_for_view(
    store: &CatalogStore,
    registry: &SchemaRegistry,
    view_key: &EntityKey,
    caller: Option<&TenantId>,
    query: &QueryShape,
) -> Result<IndexResolution> {
    let view = registry
        .get(store, view_key, caller)?
        .ok_or_else(|| CatalogError::EntityNotFound(view_key.clone()))?;

    // Walk view → root, gathering chain nodes and the PK columns each view
    // level pins to constants.
    let mut chain = vec![Arc::clone(&view)];
    let mut pinned_columns: Vec<String> = Vec::new();
    let mut current = view;
    while let Some(parent_key) = current.entity.parent.clone() {
        let parent = registry
            .get(store, &parent_key, caller)?
            .ok_or_else(|| CatalogError::EntityNotFound(parent_key.clone()))?;
        for pin in collect_equality_pins(
            &parent.entity.key_layout,
            current.entity.view_predicate.as_ref(),
        ) {
            if !pinned_columns.contains(&pin.column) {
                pinned_columns.push(pin.column);
            }
        }
        chain.push(Arc::clone(&parent));
        current = parent;
    }

    // Columns the query actually needs, after constant-folding the pinned
    // PK prefix out of the requirement.
    let mut required: Vec<String> = Vec::new();
    if let Some(predicate) = &query.predicate {
        predicate.referenced_columns(&mut required);
    }
    for column in &query.projection {
        if !required.contains(column) {
            required.push(column.clone());
        }
    }
    required.retain(|c| !pinned_columns.contains(c));

    // Combined constraints: the query's own plus every ancestor pin.
    let mut constraints = extract_constraints(query.predicate.as_ref());
    for node in &chain {
        if let Some(parent_key) = &node.entity.parent {
            if let Some(parent) = registry.get(store, parent_key, caller)? {
                for pin in collect_equality_pins(
                    &parent.entity.key_layout,
                    node.entity.view_predicate.as_ref(),
                ) {
                    constraints.entry(pin.column.clone()).or_default().eq = Some(pin.value);
                }
            }
        }
    }

    let mut candidates: Vec<IndexCandidate> = Vec::new();
    for node in &chain {
        for child in store.scan_children(&node.entity.key, caller)? {
            if child.entity.kind != EntityKind::Index {
                continue;
            }
            if !covers(&child, &required) {
                continue;
            }
            let (_, eq_prefix) = ranges_for_layout(&child.entity.key_layout, &constraints);
            let range_scanned = child.entity.key_layout.len().saturating_sub(eq_prefix);
            candidates.push(IndexCandidate {
                index: Arc::new(child),
                range_scanned,
            });
        }
    }

    // Narrowest scan first; global beats local at equal cost (local scans
    // need a server-side merge across partitions); name breaks remaining
    // ties so the ordering is total.
    candidates.sort_by(|a, b| {
        a.range_scanned
            .cmp(&b.range_scanned)
            .then_with(|| scope_rank(&a.index).cmp(&scope_rank(&b.index)))
            .then_with(|| a.index.entity.key.cmp(&b.index.entity.key))
    });

    let chosen = candidates.first().map(|c| Arc::clone(&c.index));
    let scan_ranges = match &chosen {
        Some(index) => ranges_for_layout(&index.entity.key_layout, &constraints).0,
        None => Vec::new(),
    };

    Ok(IndexResolution {
        candidates,
        chosen,
        scan_ranges,
    })
}

fn scope_rank(index: &VersionedEntity) -> u8 {
    match index.entity.index_scope {
        Some(IndexScope::Global) | None => 0,
        Some(IndexScope::Local) => 1,
    }
}

/// Index column set (key segments + included columns) must cover every
/// required column.
fn covers(index: &VersionedEntity, required: &[String]) -> bool {
    required.iter().all(|column| {
        index
            .entity
            .key_layout
            .segments
            .iter()
            .any(|s| &s.column == column)
            || index.entity.included_columns.contains(column)
    })
}
