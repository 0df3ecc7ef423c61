//! View schema derivation.

use crate::error::{CatalogError, Result};
use crate::pk::compose_key;
use crate::views::updatability::classify_predicate;
use strata_commons::{
    ColumnDef, EntityKey, EntityKind, Expr, KeySegment, SchemaEntity,
};

/// A view definition as handed over by the SQL layer, with column
/// qualifiers already assigned (the coordinator draws encoded qualifiers
/// from the shared counter before derivation).
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSpec {
    pub key: EntityKey,
    /// Columns declared by the view itself, beyond the parent's, already
    /// tagged with the view's hierarchy depth as their origin level.
    pub columns: Vec<ColumnDef>,
    /// Parsed WHERE predicate; `None` selects every parent row.
    pub predicate: Option<Expr>,
    /// Key columns the view appends to the parent's primary key.
    pub pk_extension: Vec<KeySegment>,
}

/// Derives a view's full logical schema from its parent and classifies it.
///
/// Pure and deterministic: identical inputs yield a byte-identical entity,
/// which is what makes plan-stability and round-trip testing possible.
/// Classification never fails: a predicate that denies write-through
/// produces a read-only view, not an error.
pub fn derive_view(parent: &SchemaEntity, spec: &ViewSpec) -> Result<SchemaEntity> {
    if parent.kind == EntityKind::Index {
        return Err(CatalogError::InvalidOperation(format!(
            "cannot create view {} over index {}",
            spec.key, parent.key
        )));
    }

    // 1. Column name collisions across levels are rejected at creation.
    for column in &spec.columns {
        if parent.has_column(&column.name) {
            return Err(CatalogError::KeyConflict {
                entity: spec.key.clone(),
                column: column.name.clone(),
            });
        }
    }

    // 2. Effective columns: parent's list, then the view's own. Origin
    //    levels arrive on the `ViewSpec` already set from the hierarchy
    //    depth, the same source ALTER uses, so a column-less intermediate
    //    view still advances the level of everything declared below it.
    let mut columns = parent.columns.clone();
    columns.extend(spec.columns.iter().cloned());

    // 3. Extend the primary key through the composer. Extension columns
    //    must be columns of the view.
    for segment in &spec.pk_extension {
        if !columns.iter().any(|c| c.name == segment.column) {
            return Err(CatalogError::InvalidOperation(format!(
                "pk column '{}' is not a column of view {}",
                segment.column, spec.key
            )));
        }
    }
    let key_layout = compose_key(&spec.key, &parent.key_layout, spec.pk_extension.clone())?;

    // 4. Classify the predicate against the parent's primary key. A view
    //    over a read-only view can never be written through either.
    let updatable = parent.updatable
        && classify_predicate(&parent.key_layout, spec.predicate.as_ref()).is_updatable();

    // 5. The view inherits storage encoding, row immutability, and
    //    capability flags from its parent.
    Ok(SchemaEntity {
        key: spec.key.clone(),
        kind: EntityKind::View,
        parent: Some(parent.key.clone()),
        columns,
        key_layout,
        encoding: parent.encoding,
        immutable_rows: parent.immutable_rows,
        capabilities: parent.capabilities,
        view_predicate: spec.predicate.clone(),
        updatable,
        included_columns: Vec::new(),
        index_scope: None,
    })
}
