//! Mutation coordination.
//!
//! Every catalog-mutating operation passes through here. Each mutation runs
//! the state machine `PENDING → VALIDATING → COMMITTED | ABORTED`:
//! validation errors abort before any compare-and-set is attempted, and
//! concurrency errors arise exactly at the atomic commit boundary, so no
//! partial catalog state is ever observable. The coordinator never retries;
//! a `ConcurrentSchemaMutation` is handed back to the caller, who owns the
//! retry policy. Correctness rests on the store's single-entry
//! compare-and-set plus the qualifier reservation protocol; there is no
//! global lock, and multiple coordinator instances over one backend stay
//! correct.

use crate::config::CatalogConfig;
use crate::ddl::{
    AddColumnRequest, ColumnSpec, CreateIndexRequest, CreateTableRequest, CreateViewRequest,
    DropTableRequest,
};
use crate::error::{CatalogError, Result};
use crate::pk::root_layout;
use crate::provider::check_index_allowed;
use crate::registry::SchemaRegistry;
use crate::views::{derive_view, ViewSpec};
use std::sync::Arc;
use std::time::{Duration, Instant};
use strata_commons::{
    ColumnDef, ColumnQualifier, EntityKey, EntityKind, KeyLayout, SchemaEntity, StorageEncoding,
    TenantId, VersionToken,
};
use strata_store::{CasOutcome, CatalogStore, MutationId, SubtreeOutcome, VersionedEntity};

/// First qualifier handed out on an encoded-storage table.
const FIRST_ENCODED_QUALIFIER: u32 = 1;

/// Lifecycle of one in-flight mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MutationState {
    Pending,
    Validating,
    Committed,
    Aborted,
}

/// Tracks and logs one mutation's state transitions.
struct Mutation {
    id: MutationId,
    target: EntityKey,
    state: MutationState,
}

impl Mutation {
    fn begin(id: MutationId, target: EntityKey) -> Self {
        log::debug!("{} pending on {}", id, target);
        Self {
            id,
            target,
            state: MutationState::Pending,
        }
    }

    fn advance(&mut self, next: MutationState) {
        log::debug!(
            "{} on {}: {:?} -> {:?}",
            self.id,
            self.target,
            self.state,
            next
        );
        self.state = next;
    }

    fn validating(&mut self) {
        self.advance(MutationState::Validating);
    }

    fn committed(&mut self, version: VersionToken) {
        self.advance(MutationState::Committed);
        log::debug!("{} committed {} at {}", self.id, self.target, version);
    }

    fn aborted(&mut self, reason: &CatalogError) {
        self.advance(MutationState::Aborted);
        log::warn!("{} aborted on {}: {}", self.id, self.target, reason);
    }
}

/// Serializes catalog mutations against the shared store.
pub struct MutationCoordinator {
    store: Arc<CatalogStore>,
    registry: Arc<SchemaRegistry>,
    config: CatalogConfig,
}

impl MutationCoordinator {
    pub fn new(store: Arc<CatalogStore>, registry: Arc<SchemaRegistry>) -> Self {
        Self::with_config(store, registry, CatalogConfig::default())
    }

    pub fn with_config(
        store: Arc<CatalogStore>,
        registry: Arc<SchemaRegistry>,
        config: CatalogConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// CREATE TABLE: validates the key layout, assigns column qualifiers,
    /// and installs the root entity. Encoded tables also get their shared
    /// qualifier counter row.
    pub fn create_table(
        &self,
        request: CreateTableRequest,
        caller: Option<&TenantId>,
    ) -> Result<VersionedEntity> {
        let mut mutation = Mutation::begin(self.store.next_mutation_id(), request.key.clone());
        let result = self.create_table_inner(&request, caller, &mut mutation);
        if let Err(err) = &result {
            mutation.aborted(err);
        }
        result
    }

    fn create_table_inner(
        &self,
        request: &CreateTableRequest,
        caller: Option<&TenantId>,
        mutation: &mut Mutation,
    ) -> Result<VersionedEntity> {
        mutation.validating();
        if self.store.get(&request.key, caller)?.is_some() {
            return Err(CatalogError::EntityExists(request.key.clone()));
        }
        for segment in &request.primary_key {
            if !request.columns.iter().any(|c| c.name == segment.column) {
                return Err(CatalogError::InvalidOperation(format!(
                    "pk column '{}' is not a column of {}",
                    segment.column, request.key
                )));
            }
        }
        let layout = root_layout(
            &request.key,
            request.primary_key.clone(),
            request.salt_buckets,
            request.multi_tenant,
        )?;

        let columns = assign_qualifiers(&request.columns, 0, request.encoding, FIRST_ENCODED_QUALIFIER);
        let mut entity = SchemaEntity::table(request.key.clone(), columns, layout);
        entity.encoding = request.encoding;
        entity.immutable_rows = request.immutable_rows;
        entity.capabilities = request.capabilities;

        // Encoded tables install their shared qualifier counter row in the
        // same batch as the entity: neither is ever observable without the
        // other.
        let outcome = match request.encoding {
            StorageEncoding::ColumnNames => {
                self.store
                    .compare_and_set(&request.key, None, Some(entity.clone()), None)?
            }
            StorageEncoding::EncodedQualifiers => {
                let first_free = FIRST_ENCODED_QUALIFIER + request.columns.len() as u32;
                self.store
                    .insert_root_with_counter(&request.key, entity.clone(), first_free)?
            }
        };
        match outcome {
            CasOutcome::Committed(version) => {
                self.registry.invalidate(&request.key);
                mutation.committed(version);
                Ok(VersionedEntity { entity, version })
            }
            CasOutcome::VersionConflict | CasOutcome::ParentMissing => {
                Err(CatalogError::EntityExists(request.key.clone()))
            }
        }
    }

    /// CREATE VIEW: derives the view from its parent and installs it with a
    /// compare-and-set guarded on both the empty view slot and the
    /// unchanged parent version. A concurrent DROP of the parent wins or
    /// loses purely on whose compare-and-set lands first.
    pub fn create_view(
        &self,
        request: CreateViewRequest,
        caller: Option<&TenantId>,
    ) -> Result<VersionedEntity> {
        let mut mutation = Mutation::begin(self.store.next_mutation_id(), request.key.clone());
        let result = self.create_view_inner(&request, caller, &mut mutation);
        if let Err(err) = &result {
            mutation.aborted(err);
        }
        result
    }

    fn create_view_inner(
        &self,
        request: &CreateViewRequest,
        caller: Option<&TenantId>,
        mutation: &mut Mutation,
    ) -> Result<VersionedEntity> {
        mutation.validating();
        let parent = self.store.get(&request.parent, caller)?.ok_or_else(|| {
            CatalogError::ParentNotFound {
                entity: request.key.clone(),
                parent: request.parent.clone(),
            }
        })?;
        if self.store.get(&request.key, caller)?.is_some() {
            return Err(CatalogError::EntityExists(request.key.clone()));
        }

        let level = self.hierarchy_depth(&parent, caller)? + 1;
        let columns = match parent.entity.encoding {
            StorageEncoding::ColumnNames => {
                assign_qualifiers(&request.columns, level, parent.entity.encoding, 0)
            }
            StorageEncoding::EncodedQualifiers => {
                // View-only columns on an encoded hierarchy draw their
                // qualifiers from the root's shared counter.
                let root = self.root_of(&parent, caller)?;
                let mut columns = Vec::with_capacity(request.columns.len());
                for spec in &request.columns {
                    let qualifier =
                        self.reserve_qualifier_blocking(&root.entity.key, mutation.id, None)?;
                    self.store
                        .commit_reservation(&root.entity.key, mutation.id)?;
                    columns.push(
                        column_from_spec(spec, level)
                            .with_qualifier(ColumnQualifier::Encoded(qualifier)),
                    );
                }
                columns
            }
        };

        let spec = ViewSpec {
            key: request.key.clone(),
            columns,
            predicate: request.predicate.clone(),
            pk_extension: request.pk_extension.clone(),
        };
        let entity = derive_view(&parent.entity, &spec)?;

        match self.store.compare_and_set(
            &request.key,
            None,
            Some(entity.clone()),
            Some((&request.parent, parent.version)),
        )? {
            // The committed row is reported from what was just written, not
            // re-read: a concurrent DROP cascade may have already swept the
            // slot, and a committed mutation must never surface as not-found.
            CasOutcome::Committed(version) => {
                self.registry.invalidate(&request.key);
                mutation.committed(version);
                Ok(VersionedEntity { entity, version })
            }
            // The parent vanished between our read and the commit: the DROP
            // landed first and this mutation loses, surfaced as
            // table-not-found. Must not be retried automatically.
            CasOutcome::ParentMissing => Err(CatalogError::ParentNotFound {
                entity: request.key.clone(),
                parent: request.parent.clone(),
            }),
            CasOutcome::VersionConflict => Err(CatalogError::ConcurrentSchemaMutation {
                entity: request.key.clone(),
                expected: parent.version,
                found: None,
            }),
        }
    }

    /// ALTER ... ADD COLUMN. On an encoded-storage hierarchy the next
    /// qualifier is reserved on the root's shared counter first; a second
    /// concurrent ALTER against the same root waits behind the reservation
    /// (bounded by `timeout`, defaulting to the configured wait) and aborts
    /// with `ConcurrentSchemaMutation` if it never clears. Non-encoded
    /// hierarchies have no shared counter and proceed independently.
    pub fn alter_add_column(
        &self,
        request: AddColumnRequest,
        caller: Option<&TenantId>,
        timeout: Option<Duration>,
    ) -> Result<VersionedEntity> {
        let mut mutation = Mutation::begin(self.store.next_mutation_id(), request.target.clone());
        let result = self.alter_add_column_inner(&request, caller, timeout, &mut mutation);
        if let Err(err) = &result {
            mutation.aborted(err);
        }
        result
    }

    fn alter_add_column_inner(
        &self,
        request: &AddColumnRequest,
        caller: Option<&TenantId>,
        timeout: Option<Duration>,
        mutation: &mut Mutation,
    ) -> Result<VersionedEntity> {
        mutation.validating();
        let target = self
            .store
            .get(&request.target, caller)?
            .ok_or_else(|| CatalogError::EntityNotFound(request.target.clone()))?;
        if target.entity.kind == EntityKind::Index {
            return Err(CatalogError::InvalidOperation(format!(
                "cannot add column to index {}",
                request.target
            )));
        }
        if target.entity.has_column(&request.column.name) {
            return Err(CatalogError::KeyConflict {
                entity: request.target.clone(),
                column: request.column.name.clone(),
            });
        }

        let level = self.hierarchy_depth(&target, caller)?;
        let (column, reservation) = match target.entity.encoding {
            StorageEncoding::ColumnNames => (column_from_spec(&request.column, level), None),
            StorageEncoding::EncodedQualifiers => {
                let root = self.root_of(&target, caller)?;
                let qualifier =
                    self.reserve_qualifier_blocking(&root.entity.key, mutation.id, timeout)?;
                (
                    column_from_spec(&request.column, level)
                        .with_qualifier(ColumnQualifier::Encoded(qualifier)),
                    Some(root.entity.key.clone()),
                )
            }
        };

        let mut updated = target.entity.clone();
        updated.columns.push(column);

        let outcome = self.store.compare_and_set(
            &request.target,
            Some(target.version),
            Some(updated.clone()),
            None,
        );
        match outcome {
            Ok(CasOutcome::Committed(version)) => {
                if let Some(root) = &reservation {
                    self.store.commit_reservation(root, mutation.id)?;
                }
                self.registry.invalidate(&request.target);
                mutation.committed(version);
                Ok(VersionedEntity {
                    entity: updated,
                    version,
                })
            }
            Ok(CasOutcome::VersionConflict) | Ok(CasOutcome::ParentMissing) => {
                if let Some(root) = &reservation {
                    self.store.release_reservation(root, mutation.id)?;
                }
                Err(CatalogError::ConcurrentSchemaMutation {
                    entity: request.target.clone(),
                    expected: target.version,
                    found: self.store.get(&request.target, caller)?.map(|r| r.version),
                })
            }
            Err(err) => {
                if let Some(root) = &reservation {
                    self.store.release_reservation(root, mutation.id)?;
                }
                Err(err.into())
            }
        }
    }

    /// CREATE INDEX under a table or view, guarded on the parent version.
    pub fn create_index(
        &self,
        request: CreateIndexRequest,
        caller: Option<&TenantId>,
    ) -> Result<VersionedEntity> {
        let mut mutation = Mutation::begin(self.store.next_mutation_id(), request.key.clone());
        let result = self.create_index_inner(&request, caller, &mut mutation);
        if let Err(err) = &result {
            mutation.aborted(err);
        }
        result
    }

    fn create_index_inner(
        &self,
        request: &CreateIndexRequest,
        caller: Option<&TenantId>,
        mutation: &mut Mutation,
    ) -> Result<VersionedEntity> {
        mutation.validating();
        let parent = self.store.get(&request.parent, caller)?.ok_or_else(|| {
            CatalogError::ParentNotFound {
                entity: request.key.clone(),
                parent: request.parent.clone(),
            }
        })?;
        if self.store.get(&request.key, caller)?.is_some() {
            return Err(CatalogError::EntityExists(request.key.clone()));
        }
        check_index_allowed(&parent.entity, request.scope)?;

        let mut columns = Vec::new();
        for segment in &request.indexed {
            let column = parent.entity.column(&segment.column).ok_or_else(|| {
                CatalogError::InvalidOperation(format!(
                    "indexed column '{}' is not a column of {}",
                    segment.column, request.parent
                ))
            })?;
            columns.push(column.clone());
        }
        for name in &request.included {
            let column = parent.entity.column(name).ok_or_else(|| {
                CatalogError::InvalidOperation(format!(
                    "included column '{}' is not a column of {}",
                    name, request.parent
                ))
            })?;
            columns.push(column.clone());
        }

        // Index row key: the indexed columns followed by whatever base key
        // segments they do not already contain, so index rows stay unique
        // per base row. Salt and tenancy ride along from the base layout.
        let mut segments = request.indexed.clone();
        for segment in &parent.entity.key_layout.segments {
            if !segments.iter().any(|s| s.column == segment.column) {
                segments.push(segment.clone());
            }
        }
        let mut key_layout = KeyLayout::new(segments);
        key_layout.salt_buckets = parent.entity.key_layout.salt_buckets;
        key_layout.tenant_prefixed = parent.entity.key_layout.tenant_prefixed;

        let entity = SchemaEntity {
            key: request.key.clone(),
            kind: EntityKind::Index,
            parent: Some(request.parent.clone()),
            columns,
            key_layout,
            encoding: parent.entity.encoding,
            immutable_rows: parent.entity.immutable_rows,
            capabilities: parent.entity.capabilities,
            view_predicate: None,
            updatable: false,
            included_columns: request.included.clone(),
            index_scope: Some(request.scope),
        };

        match self.store.compare_and_set(
            &request.key,
            None,
            Some(entity.clone()),
            Some((&request.parent, parent.version)),
        )? {
            CasOutcome::Committed(version) => {
                self.registry.invalidate(&request.key);
                mutation.committed(version);
                Ok(VersionedEntity { entity, version })
            }
            CasOutcome::ParentMissing => Err(CatalogError::ParentNotFound {
                entity: request.key.clone(),
                parent: request.parent.clone(),
            }),
            CasOutcome::VersionConflict => Err(CatalogError::ConcurrentSchemaMutation {
                entity: request.key.clone(),
                expected: parent.version,
                found: None,
            }),
        }
    }

    /// DROP TABLE (or view): cascading delete of the entity and its whole
    /// descendant subtree in one atomic commit. Returns the deleted keys.
    pub fn drop_table(
        &self,
        request: DropTableRequest,
        caller: Option<&TenantId>,
    ) -> Result<Vec<EntityKey>> {
        let mut mutation = Mutation::begin(self.store.next_mutation_id(), request.key.clone());
        let result = self.drop_table_inner(&request, caller, &mut mutation);
        if let Err(err) = &result {
            mutation.aborted(err);
        }
        result
    }

    fn drop_table_inner(
        &self,
        request: &DropTableRequest,
        caller: Option<&TenantId>,
        mutation: &mut Mutation,
    ) -> Result<Vec<EntityKey>> {
        mutation.validating();
        let root = self
            .store
            .get(&request.key, caller)?
            .ok_or_else(|| CatalogError::EntityNotFound(request.key.clone()))?;

        // The limit bounds what the cascade deletes, which spans every
        // tenant, so the count must be unfiltered.
        let descendants = self.store.count_descendants(&request.key)?;
        if descendants + 1 > self.config.max_cascade_entities {
            return Err(CatalogError::InvalidOperation(format!(
                "drop cascade on {} exceeds {} entities",
                request.key, self.config.max_cascade_entities
            )));
        }

        match self.store.delete_subtree(&request.key, root.version)? {
            SubtreeOutcome::Committed(deleted) => {
                self.registry.invalidate_many(deleted.iter());
                mutation.committed(root.version);
                Ok(deleted)
            }
            SubtreeOutcome::VersionConflict => Err(CatalogError::ConcurrentSchemaMutation {
                entity: request.key.clone(),
                expected: root.version,
                found: self.store.get(&request.key, caller)?.map(|r| r.version),
            }),
            SubtreeOutcome::RootMissing => Err(CatalogError::EntityNotFound(request.key.clone())),
        }
    }

    // --- helpers ---

    /// Number of view levels between `row` and its root table.
    fn hierarchy_depth(
        &self,
        row: &VersionedEntity,
        caller: Option<&TenantId>,
    ) -> Result<u16> {
        let mut depth = 0;
        let mut current = row.clone();
        while let Some(parent_key) = current.entity.parent.clone() {
            depth += 1;
            current = self.store.get(&parent_key, caller)?.ok_or_else(|| {
                CatalogError::ParentNotFound {
                    entity: current.entity.key.clone(),
                    parent: parent_key,
                }
            })?;
        }
        Ok(depth)
    }

    /// Root table of a hierarchy.
    fn root_of(
        &self,
        row: &VersionedEntity,
        caller: Option<&TenantId>,
    ) -> Result<VersionedEntity> {
        let mut current = row.clone();
        while let Some(parent_key) = current.entity.parent.clone() {
            current = self.store.get(&parent_key, caller)?.ok_or_else(|| {
                CatalogError::ParentNotFound {
                    entity: current.entity.key.clone(),
                    parent: parent_key,
                }
            })?;
        }
        Ok(current)
    }

    /// Spins on the shared counter until the reservation is granted or the
    /// bounded wait expires. The wait is always bounded; an expired wait is
    /// the sibling-ALTER conflict of the reservation protocol.
    fn reserve_qualifier_blocking(
        &self,
        root: &EntityKey,
        mutation: MutationId,
        timeout: Option<Duration>,
    ) -> Result<u32> {
        let deadline = Instant::now() + timeout.unwrap_or_else(|| self.config.reservation_wait());
        loop {
            if let Some(qualifier) = self.store.try_reserve_qualifier(root, mutation)? {
                return Ok(qualifier);
            }
            if Instant::now() >= deadline {
                log::warn!(
                    "{} timed out waiting for qualifier reservation on {}",
                    mutation,
                    root
                );
                return Err(CatalogError::ConcurrentSchemaMutation {
                    entity: root.clone(),
                    expected: VersionToken(0),
                    found: None,
                });
            }
            std::thread::sleep(self.config.reservation_poll());
        }
    }
}

fn column_from_spec(spec: &ColumnSpec, level: u16) -> ColumnDef {
    ColumnDef::new(spec.name.clone(), spec.data_type, spec.nullable).with_origin_level(level)
}

fn assign_qualifiers(
    specs: &[ColumnSpec],
    level: u16,
    encoding: StorageEncoding,
    first: u32,
) -> Vec<ColumnDef> {
    specs
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            let column = column_from_spec(spec, level);
            match encoding {
                StorageEncoding::ColumnNames => column,
                StorageEncoding::EncodedQualifiers => {
                    column.with_qualifier(ColumnQualifier::Encoded(first + i as u32))
                }
            }
        })
        .collect()
}
