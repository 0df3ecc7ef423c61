// End-to-end DDL lifecycle: create table, derive views, alter, drop cascade.

use std::sync::Arc;
use strata_catalog::{
    AddColumnRequest, CatalogConfig, CatalogError, ColumnSpec, CreateIndexRequest,
    CreateTableRequest, CreateViewRequest, DropTableRequest, MutationCoordinator, SchemaRegistry,
};
use strata_commons::{
    ColumnQualifier, EntityKey, EntityKind, Expr, IndexScope, KeySegment, ScalarValue, SqlDataType,
    StorageEncoding, TableCapabilities, TenantId,
};
use strata_store::{CatalogStore, MemoryBackend};

fn engine() -> MutationCoordinator {
    let store = Arc::new(CatalogStore::new(Arc::new(MemoryBackend::new())).unwrap());
    MutationCoordinator::new(store, Arc::new(SchemaRegistry::new()))
}

fn table_request(key: EntityKey, encoding: StorageEncoding) -> CreateTableRequest {
    CreateTableRequest {
        key,
        columns: vec![
            ColumnSpec::new("k1", SqlDataType::Int, false),
            ColumnSpec::new("k2", SqlDataType::Int, false),
            ColumnSpec::new("v1", SqlDataType::Varchar, true),
        ],
        primary_key: vec![KeySegment::asc("k1"), KeySegment::asc("k2")],
        salt_buckets: None,
        multi_tenant: false,
        encoding,
        immutable_rows: false,
        capabilities: TableCapabilities::default(),
    }
}

fn view_request(key: EntityKey, parent: EntityKey) -> CreateViewRequest {
    CreateViewRequest {
        key,
        parent,
        columns: vec![ColumnSpec::new("v2", SqlDataType::Decimal, true)],
        predicate: Some(Expr::eq("k1", ScalarValue::Int(1))),
        pk_extension: vec![],
    }
}

#[test]
fn test_create_table_and_read_back() {
    let engine = engine();
    let key = EntityKey::global("s1", "t1");
    let row = engine
        .create_table(table_request(key.clone(), StorageEncoding::ColumnNames), None)
        .unwrap();

    assert_eq!(row.entity.key, key);
    assert_eq!(row.entity.kind, EntityKind::Table);
    assert!(row.entity.parent.is_none());
    assert_eq!(row.entity.key_layout.len(), 2);
    assert_eq!(
        row.entity.column("v1").unwrap().qualifier,
        ColumnQualifier::Name("v1".into())
    );
}

#[test]
fn test_encoded_table_assigns_sequential_qualifiers() {
    let engine = engine();
    let key = EntityKey::global("s1", "t1");
    let row = engine
        .create_table(
            table_request(key, StorageEncoding::EncodedQualifiers),
            None,
        )
        .unwrap();

    let qualifiers: Vec<_> = row.entity.columns.iter().map(|c| c.qualifier.clone()).collect();
    assert_eq!(
        qualifiers,
        vec![
            ColumnQualifier::Encoded(1),
            ColumnQualifier::Encoded(2),
            ColumnQualifier::Encoded(3),
        ]
    );
}

#[test]
fn test_duplicate_table_rejected() {
    let engine = engine();
    let key = EntityKey::global("s1", "t1");
    engine
        .create_table(table_request(key.clone(), StorageEncoding::ColumnNames), None)
        .unwrap();

    let err = engine
        .create_table(table_request(key.clone(), StorageEncoding::ColumnNames), None)
        .unwrap_err();
    assert!(matches!(err, CatalogError::EntityExists(k) if k == key));
}

#[test]
fn test_pk_must_reference_declared_columns() {
    let engine = engine();
    let mut request = table_request(EntityKey::global("s1", "t1"), StorageEncoding::ColumnNames);
    request.primary_key = vec![KeySegment::asc("missing")];
    assert!(matches!(
        engine.create_table(request, None),
        Err(CatalogError::InvalidOperation(_))
    ));
}

#[test]
fn test_view_chain_levels_and_pk_prefix() {
    let engine = engine();
    let table = EntityKey::global("s1", "t1");
    let root = engine
        .create_table(table_request(table.clone(), StorageEncoding::ColumnNames), None)
        .unwrap();

    let v1 = engine
        .create_view(view_request(EntityKey::global("s1", "v1"), table), None)
        .unwrap();
    assert_eq!(v1.entity.kind, EntityKind::View);
    assert!(v1.entity.updatable);
    assert_eq!(v1.entity.column("v2").unwrap().origin_level, 1);
    assert_eq!(v1.entity.column("v1").unwrap().origin_level, 0);

    let v2 = engine
        .create_view(
            CreateViewRequest {
                key: EntityKey::global("s1", "v2"),
                parent: v1.entity.key.clone(),
                columns: vec![ColumnSpec::new("v3", SqlDataType::Int, true)],
                predicate: None,
                pk_extension: vec![KeySegment::asc("v3")],
            },
            None,
        )
        .unwrap();

    assert_eq!(v2.entity.column("v3").unwrap().origin_level, 2);
    assert_eq!(v2.entity.key_layout.len(), 3);
    assert!(v2.entity.key_layout.starts_with(&v1.entity.key_layout));
    assert!(v2.entity.key_layout.starts_with(&root.entity.key_layout));
    // Predicate-free view over an updatable parent stays updatable.
    assert!(v2.entity.updatable);
}

#[test]
fn test_view_over_missing_parent_rejected() {
    let engine = engine();
    let err = engine
        .create_view(
            view_request(EntityKey::global("s1", "v1"), EntityKey::global("s1", "ghost")),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, CatalogError::ParentNotFound { .. }));
}

#[test]
fn test_view_columns_draw_from_shared_counter() {
    let engine = engine();
    let table = EntityKey::global("s1", "t1");
    engine
        .create_table(
            table_request(table.clone(), StorageEncoding::EncodedQualifiers),
            None,
        )
        .unwrap();

    // Table consumed 1..=3; the view's own column continues at 4.
    let view = engine
        .create_view(view_request(EntityKey::global("s1", "v1"), table.clone()), None)
        .unwrap();
    assert_eq!(
        view.entity.column("v2").unwrap().qualifier,
        ColumnQualifier::Encoded(4)
    );

    // A later ALTER on the root continues at 5, not at a per-branch counter.
    let altered = engine
        .alter_add_column(
            AddColumnRequest {
                target: table,
                column: ColumnSpec::new("v9", SqlDataType::Varchar, true),
            },
            None,
            None,
        )
        .unwrap();
    assert_eq!(
        altered.entity.column("v9").unwrap().qualifier,
        ColumnQualifier::Encoded(5)
    );
}

#[test]
fn test_alter_rejects_duplicate_column() {
    let engine = engine();
    let table = EntityKey::global("s1", "t1");
    engine
        .create_table(table_request(table.clone(), StorageEncoding::ColumnNames), None)
        .unwrap();

    let err = engine
        .alter_add_column(
            AddColumnRequest {
                target: table,
                column: ColumnSpec::new("v1", SqlDataType::Int, true),
            },
            None,
            None,
        )
        .unwrap_err();
    assert!(matches!(err, CatalogError::KeyConflict { column, .. } if column == "v1"));
}

#[test]
fn test_drop_table_cascades_whole_subtree() {
    let engine = engine();
    let table = EntityKey::global("s1", "t1");
    engine
        .create_table(table_request(table.clone(), StorageEncoding::ColumnNames), None)
        .unwrap();
    let v1 = engine
        .create_view(view_request(EntityKey::global("s1", "v1"), table.clone()), None)
        .unwrap();
    // The grandchild declares no columns of its own; v2 already lives on v1.
    engine
        .create_view(
            CreateViewRequest {
                key: EntityKey::global("s1", "v2"),
                parent: v1.entity.key.clone(),
                columns: vec![],
                predicate: Some(Expr::eq("k2", ScalarValue::Int(2))),
                pk_extension: vec![],
            },
            None,
        )
        .unwrap();
    engine
        .create_index(
            CreateIndexRequest {
                key: EntityKey::global("s1", "i1"),
                parent: table.clone(),
                indexed: vec![KeySegment::asc("v1")],
                included: vec![],
                scope: IndexScope::Global,
            },
            None,
        )
        .unwrap();

    let deleted = engine
        .drop_table(DropTableRequest { key: table.clone() }, None)
        .unwrap();
    assert_eq!(deleted.len(), 4);

    let store = engine.store();
    assert!(store.get(&table, None).unwrap().is_none());
    assert!(store.get(&EntityKey::global("s1", "v1"), None).unwrap().is_none());
    assert!(store.get(&EntityKey::global("s1", "v2"), None).unwrap().is_none());
    assert!(store.get(&EntityKey::global("s1", "i1"), None).unwrap().is_none());
}

#[test]
fn test_drop_respects_cascade_limit() {
    let store = Arc::new(CatalogStore::new(Arc::new(MemoryBackend::new())).unwrap());
    let engine = MutationCoordinator::with_config(
        store,
        Arc::new(SchemaRegistry::new()),
        CatalogConfig {
            max_cascade_entities: 1,
            ..CatalogConfig::default()
        },
    );

    let table = EntityKey::global("s1", "t1");
    engine
        .create_table(table_request(table.clone(), StorageEncoding::ColumnNames), None)
        .unwrap();
    engine
        .create_view(view_request(EntityKey::global("s1", "v1"), table.clone()), None)
        .unwrap();

    let err = engine
        .drop_table(DropTableRequest { key: table.clone() }, None)
        .unwrap_err();
    assert!(matches!(err, CatalogError::InvalidOperation(_)));
    // Nothing was deleted.
    assert!(engine.store().get(&table, None).unwrap().is_some());
}

#[test]
fn test_cascade_limit_counts_tenant_invisible_descendants() {
    let store = Arc::new(CatalogStore::new(Arc::new(MemoryBackend::new())).unwrap());
    let engine = MutationCoordinator::with_config(
        store,
        Arc::new(SchemaRegistry::new()),
        CatalogConfig {
            max_cascade_entities: 1,
            ..CatalogConfig::default()
        },
    );

    let table = EntityKey::global("s1", "t1");
    let mut request = table_request(table.clone(), StorageEncoding::ColumnNames);
    request.multi_tenant = true;
    engine.create_table(request, None).unwrap();

    // A tenant-scoped view the global caller cannot see still counts
    // against the cascade limit: the drop would delete it.
    let acme = TenantId::new("acme");
    let scoped = EntityKey::scoped(acme.clone(), "s1", "v1");
    engine
        .create_view(view_request(scoped.clone(), table.clone()), Some(&acme))
        .unwrap();

    let err = engine
        .drop_table(DropTableRequest { key: table.clone() }, None)
        .unwrap_err();
    assert!(matches!(err, CatalogError::InvalidOperation(_)));
    assert!(engine.store().get(&scoped, Some(&acme)).unwrap().is_some());
}

#[test]
fn test_column_less_view_still_advances_origin_levels() {
    let engine = engine();
    let table = EntityKey::global("s1", "t1");
    engine
        .create_table(table_request(table.clone(), StorageEncoding::ColumnNames), None)
        .unwrap();

    // v1 selects rows but declares nothing of its own.
    let v1 = engine
        .create_view(
            CreateViewRequest {
                key: EntityKey::global("s1", "v1"),
                parent: table,
                columns: vec![],
                predicate: Some(Expr::eq("k1", ScalarValue::Int(1))),
                pk_extension: vec![],
            },
            None,
        )
        .unwrap();

    // A column declared two levels down carries level 2 even though level 1
    // contributed no columns.
    let v2 = engine
        .create_view(
            CreateViewRequest {
                key: EntityKey::global("s1", "v2"),
                parent: v1.entity.key.clone(),
                columns: vec![ColumnSpec::new("v3", SqlDataType::Int, true)],
                predicate: None,
                pk_extension: vec![],
            },
            None,
        )
        .unwrap();
    assert_eq!(v2.entity.column("v3").unwrap().origin_level, 2);

    // ALTER on the intermediate view tags its depth, not the deepest column.
    let altered = engine
        .alter_add_column(
            AddColumnRequest {
                target: v1.entity.key.clone(),
                column: ColumnSpec::new("v9", SqlDataType::Varchar, true),
            },
            None,
            None,
        )
        .unwrap();
    assert_eq!(altered.entity.column("v9").unwrap().origin_level, 1);
}

#[test]
fn test_tenant_scoped_view_invisible_across_tenants() {
    let engine = engine();
    let acme = TenantId::new("acme");
    let table = EntityKey::global("s1", "t1");
    let mut request = table_request(table.clone(), StorageEncoding::ColumnNames);
    request.multi_tenant = true;
    engine.create_table(request, None).unwrap();

    let scoped = EntityKey::scoped(acme.clone(), "s1", "v1");
    engine
        .create_view(view_request(scoped.clone(), table), Some(&acme))
        .unwrap();

    let store = engine.store();
    assert!(store.get(&scoped, Some(&acme)).unwrap().is_some());
    // The violator observes not-found, never an existence leak.
    assert!(store.get(&scoped, None).unwrap().is_none());
    assert!(store
        .get(&scoped, Some(&TenantId::new("rival")))
        .unwrap()
        .is_none());
}

#[test]
fn test_multi_tenant_table_records_tenant_position() {
    let engine = engine();
    let mut request = table_request(EntityKey::global("s1", "t1"), StorageEncoding::ColumnNames);
    request.multi_tenant = true;
    request.salt_buckets = Some(8);
    let row = engine.create_table(request, None).unwrap();

    assert!(row.entity.key_layout.tenant_prefixed);
    assert_eq!(row.entity.key_layout.salt_buckets, Some(8));
}
