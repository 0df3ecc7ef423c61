//! The catalog row: one `SchemaEntity` per table, view, or index.

use crate::expr::Expr;
use crate::ids::EntityKey;
use crate::models::column::ColumnDef;
use crate::models::key_layout::KeyLayout;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminates the three entity kinds sharing the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Table,
    View,
    Index,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Table => "TABLE",
            EntityKind::View => "VIEW",
            EntityKind::Index => "INDEX",
        };
        write!(f, "{}", name)
    }
}

/// Column addressing mode, fixed at root-table creation and inherited by the
/// whole hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageEncoding {
    /// Columns addressed by literal name, independent per branch.
    ColumnNames,
    /// Columns addressed by sequential integer qualifiers drawn from one
    /// counter shared by the root table and all of its views.
    EncodedQualifiers,
}

/// Placement of an index relative to its base data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndexScope {
    /// Separately and fully sorted; parallel scans need no server-side merge.
    Global,
    /// Co-located per physical partition with the base rows.
    Local,
}

/// Capability flags a table declares, surfaced to the transaction-provider
/// collaborator so unsupported combinations are refused at DDL time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableCapabilities {
    pub allow_local_index: bool,
    pub allow_mutable_indexes: bool,
}

impl Default for TableCapabilities {
    fn default() -> Self {
        Self {
            allow_local_index: true,
            allow_mutable_indexes: true,
        }
    }
}

/// Optimistic-concurrency token for one catalog row.
///
/// Tokens are issued by the catalog store, strictly increasing per store,
/// and live beside the serialized entity rather than inside it: the entity
/// itself stays byte-deterministic for identical derivation inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionToken(pub u64);

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// One catalog entry. Tables, views, and indexes share the struct; the
/// view- and index-specific fields are `None`/empty for the other kinds.
///
/// Parents are held as an [`EntityKey`] resolved through the catalog store,
/// never as an in-memory reference, so the open-ended hierarchy carries no
/// ownership cycles and addressing matches the store's own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaEntity {
    pub key: EntityKey,
    pub kind: EntityKind,
    pub parent: Option<EntityKey>,
    /// Effective column list. For a view this already includes the parent's
    /// columns (at their original origin levels) followed by the view's own.
    pub columns: Vec<ColumnDef>,
    pub key_layout: KeyLayout,
    pub encoding: StorageEncoding,
    /// Rows are write-once when set; inherited by views and consulted by
    /// transaction providers.
    pub immutable_rows: bool,
    pub capabilities: TableCapabilities,
    /// WHERE predicate, present only for views.
    pub view_predicate: Option<Expr>,
    /// Whether writes may pass through this entity. Tables are always
    /// updatable; views are classified at derivation time.
    pub updatable: bool,
    /// Non-key columns an index carries for covering reads. Index kind only.
    pub included_columns: Vec<String>,
    /// Index placement. Index kind only.
    pub index_scope: Option<IndexScope>,
}

impl SchemaEntity {
    /// Bare table entity; callers layer columns and layout on top.
    pub fn table(key: EntityKey, columns: Vec<ColumnDef>, key_layout: KeyLayout) -> Self {
        Self {
            key,
            kind: EntityKind::Table,
            parent: None,
            columns,
            key_layout,
            encoding: StorageEncoding::ColumnNames,
            immutable_rows: false,
            capabilities: TableCapabilities::default(),
            view_predicate: None,
            updatable: true,
            included_columns: Vec::new(),
            index_scope: None,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}
