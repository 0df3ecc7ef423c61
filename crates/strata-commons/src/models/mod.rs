//! Catalog data model: columns, key layouts, schema entities.

mod column;
mod entity;
mod key_layout;

pub use column::{ColumnDef, ColumnQualifier, SqlDataType};
pub use entity::{
    EntityKind, IndexScope, SchemaEntity, StorageEncoding, TableCapabilities, VersionToken,
};
pub use key_layout::{KeyLayout, KeySegment, SortOrder};
