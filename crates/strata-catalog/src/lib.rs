//! strata-catalog
//!
//! The schema-metadata engine of StrataDB's SQL layer: it owns the catalog
//! of tables, views, and indexes over a sorted key-value store. It derives
//! a view's logical schema from its parents, classifies views as updatable
//! or read-only from their predicates, makes indexes declared anywhere in a
//! hierarchy usable by queries against descendant views, and serializes
//! concurrent schema mutations through optimistic compare-and-set, with no
//! centralized lock manager.
//!
//! SQL parsing, query execution, and the physical storage engine live in
//! collaborating components; this crate consumes parsed expression trees
//! and structured DDL requests, and talks to storage only through
//! `strata-store`.

pub mod config;
pub mod coordinator;
pub mod ddl;
pub mod error;
pub mod index;
pub mod pk;
pub mod provider;
pub mod registry;
pub mod views;
pub mod write_target;

pub use config::CatalogConfig;
pub use coordinator::MutationCoordinator;
pub use ddl::{
    AddColumnRequest, ColumnSpec, CreateIndexRequest, CreateTableRequest, CreateViewRequest,
    DropTableRequest,
};
pub use error::{CatalogError, Result};
pub use index::{resolve_indexes_for_view, IndexResolution, QueryShape, ScanRange};
pub use provider::{check_index_allowed, provider_facts, ProviderFacts};
pub use registry::SchemaRegistry;
pub use views::{classify_predicate, derive_view, Updatability, ViewSpec};
pub use write_target::{resolve_write_target, WriteTarget};
