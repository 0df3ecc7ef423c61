//! Structured DDL requests.
//!
//! The SQL layer parses statements and hands these over; the coordinator
//! never sees SQL text. Column declarations carry no qualifier; qualifiers
//! are assigned by the coordinator, from the shared counter when the target
//! hierarchy uses encoded storage.

use strata_commons::{
    EntityKey, Expr, IndexScope, KeySegment, SqlDataType, StorageEncoding, TableCapabilities,
};

/// One declared column, before qualifier assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: SqlDataType,
    pub nullable: bool,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, data_type: SqlDataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateTableRequest {
    pub key: EntityKey,
    pub columns: Vec<ColumnSpec>,
    pub primary_key: Vec<KeySegment>,
    pub salt_buckets: Option<u8>,
    /// Reserve the leading tenant-id key position for tenant-scoped views.
    pub multi_tenant: bool,
    pub encoding: StorageEncoding,
    pub immutable_rows: bool,
    pub capabilities: TableCapabilities,
}

#[derive(Debug, Clone)]
pub struct CreateViewRequest {
    pub key: EntityKey,
    pub parent: EntityKey,
    pub columns: Vec<ColumnSpec>,
    pub predicate: Option<Expr>,
    pub pk_extension: Vec<KeySegment>,
}

#[derive(Debug, Clone)]
pub struct AddColumnRequest {
    pub target: EntityKey,
    pub column: ColumnSpec,
}

#[derive(Debug, Clone)]
pub struct CreateIndexRequest {
    pub key: EntityKey,
    pub parent: EntityKey,
    pub indexed: Vec<KeySegment>,
    pub included: Vec<String>,
    pub scope: IndexScope,
}

#[derive(Debug, Clone)]
pub struct DropTableRequest {
    pub key: EntityKey,
}
