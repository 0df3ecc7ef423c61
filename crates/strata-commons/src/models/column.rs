//! Column definitions for catalog entities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical SQL data types the catalog tracks. Physical byte encoding is the
/// storage layer's concern; the catalog only needs identity and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlDataType {
    Int,
    BigInt,
    Decimal,
    Varchar,
    Boolean,
    Date,
    Timestamp,
}

impl fmt::Display for SqlDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlDataType::Int => "INTEGER",
            SqlDataType::BigInt => "BIGINT",
            SqlDataType::Decimal => "DECIMAL",
            SqlDataType::Varchar => "VARCHAR",
            SqlDataType::Boolean => "BOOLEAN",
            SqlDataType::Date => "DATE",
            SqlDataType::Timestamp => "TIMESTAMP",
        };
        write!(f, "{}", name)
    }
}

/// How a column is addressed in the underlying store.
///
/// Name-qualified tables use the column name verbatim, independently per
/// branch of the hierarchy. Encoded tables assign small sequential integers
/// drawn from one counter shared by the root table and all of its views.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnQualifier {
    Name(String),
    Encoded(u32),
}

/// One column of a table, view, or index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: SqlDataType,
    pub nullable: bool,
    /// Hierarchy level that declared this column: 0 for the root table,
    /// +1 per descent. Used for projection pruning when a view is read.
    pub origin_level: u16,
    pub qualifier: ColumnQualifier,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: SqlDataType, nullable: bool) -> Self {
        let name = name.into();
        Self {
            qualifier: ColumnQualifier::Name(name.clone()),
            name,
            data_type,
            nullable,
            origin_level: 0,
        }
    }

    pub fn with_origin_level(mut self, level: u16) -> Self {
        self.origin_level = level;
        self
    }

    pub fn with_qualifier(mut self, qualifier: ColumnQualifier) -> Self {
        self.qualifier = qualifier;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_qualifier_is_name() {
        let col = ColumnDef::new("k1", SqlDataType::Int, false);
        assert_eq!(col.qualifier, ColumnQualifier::Name("k1".into()));
        assert_eq!(col.origin_level, 0);
    }

    #[test]
    fn test_builder_setters() {
        let col = ColumnDef::new("v2", SqlDataType::Varchar, true)
            .with_origin_level(2)
            .with_qualifier(ColumnQualifier::Encoded(11));
        assert_eq!(col.origin_level, 2);
        assert_eq!(col.qualifier, ColumnQualifier::Encoded(11));
    }
}
