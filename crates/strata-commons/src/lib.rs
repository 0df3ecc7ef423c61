//! strata-commons
//!
//! Shared data model for the StrataDB catalog engine: typed identifiers,
//! schema entities, key layouts, the predicate expression tree, and version
//! tokens. This crate performs no I/O; everything here is plain data that
//! the store and catalog crates move around.

pub mod expr;
pub mod ids;
pub mod models;

pub use expr::{CompareOp, Expr, ScalarValue, Volatility};
pub use ids::{EntityKey, EntityName, SchemaName, TenantId};
pub use models::{
    ColumnDef, ColumnQualifier, EntityKind, IndexScope, KeyLayout, KeySegment, SchemaEntity,
    SortOrder, SqlDataType, StorageEncoding, TableCapabilities, VersionToken,
};
