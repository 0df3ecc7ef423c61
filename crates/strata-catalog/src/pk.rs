//! Row-key composition.
//!
//! Pure functions computing logical primary-key layouts. A child's key is
//! always the parent's key with the child's own segments appended: parent
//! segments are never reordered or dropped, so the first N segments of any
//! descendant equal, positionally, its ancestor's N segments. Salting and
//! tenant prefixing are root-level layout flags inherited unchanged; the
//! DESC bit per segment is recorded here and byte-inverted downstream, not
//! in this module.

use crate::error::{CatalogError, Result};
use strata_commons::{EntityKey, KeyLayout, KeySegment};

/// Builds the key layout for a root table.
///
/// `salt_buckets` adds a synthetic leading salt byte derived from a hash of
/// the full key at encode time; it is only ever set here, at the root, and
/// every descendant inherits it as-is. `multi_tenant` reserves the leading
/// tenant-id position for tenant-scoped descendants.
pub fn root_layout(
    entity: &EntityKey,
    segments: Vec<KeySegment>,
    salt_buckets: Option<u8>,
    multi_tenant: bool,
) -> Result<KeyLayout> {
    if segments.is_empty() {
        return Err(CatalogError::InvalidOperation(format!(
            "table {} must declare at least one primary key column",
            entity
        )));
    }
    check_no_duplicates(entity, &[], &segments)?;
    let mut layout = KeyLayout::new(segments);
    layout.salt_buckets = salt_buckets;
    layout.tenant_prefixed = multi_tenant;
    Ok(layout)
}

/// Composes a child key layout from a parent layout plus the child's own
/// key columns. Appends, never reorders. Rejects with `KeyConflict` when an
/// own column collides with any parent segment name.
pub fn compose_key(
    entity: &EntityKey,
    parent: &KeyLayout,
    own: Vec<KeySegment>,
) -> Result<KeyLayout> {
    check_no_duplicates(entity, &parent.segments, &own)?;
    let mut layout = parent.clone();
    layout.segments.extend(own);
    Ok(layout)
}

fn check_no_duplicates(
    entity: &EntityKey,
    parent: &[KeySegment],
    own: &[KeySegment],
) -> Result<()> {
    for (i, segment) in own.iter().enumerate() {
        let clashes_parent = parent.iter().any(|p| p.column == segment.column);
        let clashes_own = own[..i].iter().any(|p| p.column == segment.column);
        if clashes_parent || clashes_own {
            return Err(CatalogError::KeyConflict {
                entity: entity.clone(),
                column: segment.column.clone(),
            });
        }
    }
    Ok(())
}
