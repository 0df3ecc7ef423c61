//! Durable catalog persistence.
//!
//! One row per table/view/index keyed by (tenant, schema, name), with a
//! version token beside the serialized entity. All mutations go through
//! atomic compare-and-set; the parent→child link partition is maintained in
//! the same batch as the entity row, so descendant scans never observe a
//! half-linked hierarchy. Tenant visibility is enforced here, on the lookup
//! path, and nowhere else.
//!
//! The shared encoded-qualifier counters are versioned rows in this store,
//! mutated with the same compare-and-set discipline as any entity, never an
//! in-process singleton, so the design stays correct across multiple
//! coordinator instances sharing one backend.

use crate::hook::{HookError, MutationContext, MutationHook, MutationId};
use crate::storage_trait::{Operation, Partition, Result, StorageBackend, StorageError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strata_commons::{EntityKey, EntityKind, SchemaEntity, TenantId, VersionToken};

const ENTITIES: &str = "catalog_entities";
const CHILDREN: &str = "catalog_children";
const COUNTERS: &str = "catalog_counters";

/// An immutable catalog snapshot: entity plus the version token it was read
/// at. Snapshots are never mutated in place; every change lands as a new
/// version through compare-and-set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedEntity {
    pub entity: SchemaEntity,
    pub version: VersionToken,
}

/// Outcome of a compare-and-set attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    Committed(VersionToken),
    /// The entry (or the guarded parent) changed since it was read.
    VersionConflict,
    /// The guarded parent no longer exists.
    ParentMissing,
}

/// Outcome of a cascading subtree delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtreeOutcome {
    /// Root and every descendant removed; lists the deleted keys.
    Committed(Vec<EntityKey>),
    VersionConflict,
    RootMissing,
}

/// Versioned counter row backing encoded-qualifier allocation for one root
/// table. `reserved_by` is the transient reservation marker: while set, no
/// other mutation may draw a qualifier from this counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifierCounter {
    pub next: u32,
    pub reserved_by: Option<MutationId>,
}

/// Typed access to the catalog rows on top of a [`StorageBackend`].
pub struct CatalogStore {
    backend: Arc<dyn StorageBackend>,
    hooks: Vec<Arc<dyn MutationHook>>,
    /// Serializes read-check-write sequences over the generic backend; this
    /// is the single-entry atomic compare-and-set primitive.
    cas_lock: Mutex<()>,
    next_version: AtomicU64,
    next_mutation: AtomicU64,
}

impl CatalogStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Result<Self> {
        for name in [ENTITIES, CHILDREN, COUNTERS] {
            backend.create_partition(&Partition::new(name))?;
        }
        Ok(Self {
            backend,
            hooks: Vec::new(),
            cas_lock: Mutex::new(()),
            next_version: AtomicU64::new(1),
            next_mutation: AtomicU64::new(1),
        })
    }

    /// Registers a pre-mutation hook. Builder-style; call before sharing the
    /// store between threads.
    pub fn with_hook(mut self, hook: Arc<dyn MutationHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Issues an identifier for one in-flight mutation.
    pub fn next_mutation_id(&self) -> MutationId {
        MutationId(self.next_mutation.fetch_add(1, Ordering::SeqCst))
    }

    fn next_version_token(&self) -> VersionToken {
        VersionToken(self.next_version.fetch_add(1, Ordering::SeqCst))
    }

    fn entities(&self) -> Partition {
        Partition::new(ENTITIES)
    }

    fn children(&self) -> Partition {
        Partition::new(CHILDREN)
    }

    fn counters(&self) -> Partition {
        Partition::new(COUNTERS)
    }

    /// Link row key: `{parent_storage_key}/{child_storage_key}`. Storage
    /// keys never contain `/`, so a `{parent}/` prefix scan yields exactly
    /// the direct children.
    fn link_key(parent: &EntityKey, child: &EntityKey) -> Vec<u8> {
        let mut key = parent.storage_key();
        key.push(b'/');
        key.extend_from_slice(&child.storage_key());
        key
    }

    fn serialize_row(row: &VersionedEntity) -> Result<Vec<u8>> {
        serde_json::to_vec(row).map_err(|e| StorageError::SerializationError(e.to_string()))
    }

    fn deserialize_row(bytes: &[u8]) -> Result<VersionedEntity> {
        serde_json::from_slice(bytes).map_err(|e| StorageError::SerializationError(e.to_string()))
    }

    /// Raw row read with no tenant filtering. Internal paths only.
    fn read_row(&self, key: &EntityKey) -> Result<Option<VersionedEntity>> {
        match self.backend.get(&self.entities(), &key.storage_key())? {
            Some(bytes) => Ok(Some(Self::deserialize_row(&bytes)?)),
            None => Ok(None),
        }
    }

    /// True when `caller` may see an entity scoped to `owner`.
    ///
    /// Global entities are visible to everyone; tenant-scoped entities only
    /// to a connection bound to that exact tenant. A scope violation is
    /// indistinguishable from absence on this path.
    fn visible_to(owner: Option<&TenantId>, caller: Option<&TenantId>) -> bool {
        match owner {
            None => true,
            Some(tenant) => caller == Some(tenant),
        }
    }

    /// Tenant-scoped lookup: `Ok(None)` for both absent rows and rows the
    /// caller is not allowed to see.
    pub fn get(
        &self,
        key: &EntityKey,
        caller: Option<&TenantId>,
    ) -> Result<Option<VersionedEntity>> {
        match self.read_row(key)? {
            Some(row) if Self::visible_to(row.entity.key.tenant.as_ref(), caller) => Ok(Some(row)),
            _ => Ok(None),
        }
    }

    fn run_hooks(&self, ctx: &MutationContext) -> Result<()> {
        for hook in &self.hooks {
            match hook.before_mutation(ctx) {
                Ok(()) => {}
                Err(HookError::NonRetryable(msg)) => {
                    return Err(StorageError::NonRetryableFault(msg));
                }
                Err(HookError::Transient(msg)) => {
                    return Err(StorageError::TransientFault(msg));
                }
            }
        }
        Ok(())
    }

    /// Atomic conditional write of a single catalog entry.
    ///
    /// - `expected = None` requires the slot to be empty (fresh insert);
    ///   `Some(v)` requires the stored version to equal `v`.
    /// - `new = None` deletes the entry; otherwise it replaces it.
    /// - `parent_guard`, when present, additionally requires the named
    ///   parent row to still exist at the given version. Guard and entry
    ///   checks decide together, atomically, which is what lets CREATE VIEW
    ///   lose cleanly to a concurrent DROP of its parent.
    pub fn compare_and_set(
        &self,
        key: &EntityKey,
        expected: Option<VersionToken>,
        new: Option<SchemaEntity>,
        parent_guard: Option<(&EntityKey, VersionToken)>,
    ) -> Result<CasOutcome> {
        self.compare_and_set_inner(key, expected, new, parent_guard, None)
    }

    /// Fresh insert of an encoded-storage root table together with its
    /// qualifier counter row, in one atomic batch. The table is never
    /// observable without its counter.
    pub fn insert_root_with_counter(
        &self,
        key: &EntityKey,
        entity: SchemaEntity,
        first_qualifier: u32,
    ) -> Result<CasOutcome> {
        self.compare_and_set_inner(key, None, Some(entity), None, Some(first_qualifier))
    }

    fn compare_and_set_inner(
        &self,
        key: &EntityKey,
        expected: Option<VersionToken>,
        new: Option<SchemaEntity>,
        parent_guard: Option<(&EntityKey, VersionToken)>,
        counter_first: Option<u32>,
    ) -> Result<CasOutcome> {
        let ctx = MutationContext {
            target: key.clone(),
            kind: match &new {
                Some(entity) => entity.kind,
                // Delete: report the stored kind when the row still exists.
                None => self
                    .read_row(key)?
                    .map(|row| row.entity.kind)
                    .unwrap_or(EntityKind::Table),
            },
            is_delete: new.is_none(),
        };
        self.run_hooks(&ctx)?;

        let _guard = self.cas_lock.lock();

        if let Some((parent_key, parent_version)) = parent_guard {
            match self.read_row(parent_key)? {
                None => return Ok(CasOutcome::ParentMissing),
                Some(row) if row.version != parent_version => {
                    return Ok(CasOutcome::VersionConflict);
                }
                Some(_) => {}
            }
        }

        let current = self.read_row(key)?;
        match (&expected, &current) {
            (None, None) => {}
            (Some(v), Some(row)) if row.version == *v => {}
            _ => {
                log::debug!("catalog cas conflict on {}", key);
                return Ok(CasOutcome::VersionConflict);
            }
        }

        let version = self.next_version_token();
        let mut operations = Vec::new();
        match new {
            Some(entity) => {
                let parent = entity.parent.clone();
                let row = VersionedEntity { entity, version };
                operations.push(Operation::Put {
                    partition: self.entities(),
                    key: key.storage_key(),
                    value: Self::serialize_row(&row)?,
                });
                // Fresh insert under a parent also writes the child link.
                if expected.is_none() {
                    if let Some(parent) = parent {
                        operations.push(Operation::Put {
                            partition: self.children(),
                            key: Self::link_key(&parent, key),
                            value: key.storage_key(),
                        });
                    }
                }
                if let Some(first) = counter_first {
                    operations.push(Operation::Put {
                        partition: self.counters(),
                        key: key.storage_key(),
                        value: Self::encode_counter(&QualifierCounter {
                            next: first,
                            reserved_by: None,
                        })?,
                    });
                }
            }
            None => {
                operations.push(Operation::Delete {
                    partition: self.entities(),
                    key: key.storage_key(),
                });
                if let Some(row) = &current {
                    if let Some(parent) = &row.entity.parent {
                        operations.push(Operation::Delete {
                            partition: self.children(),
                            key: Self::link_key(parent, key),
                        });
                    }
                }
            }
        }
        self.backend.batch(operations)?;
        log::debug!("catalog cas committed {} at {}", key, version);
        Ok(CasOutcome::Committed(version))
    }

    /// Direct children of `key`, unfiltered. Internal traversal helper.
    fn child_keys(&self, key: &EntityKey) -> Result<Vec<EntityKey>> {
        let mut prefix = key.storage_key();
        prefix.push(b'/');
        let rows = self.backend.scan(&self.children(), Some(&prefix), None)?;
        let mut keys = Vec::with_capacity(rows.len());
        for (_, value) in rows {
            if let Some(child) = EntityKey::from_storage_key(&value) {
                keys.push(child);
            }
        }
        Ok(keys)
    }

    /// Direct children of `key` visible to the caller.
    pub fn scan_children(
        &self,
        key: &EntityKey,
        caller: Option<&TenantId>,
    ) -> Result<Vec<VersionedEntity>> {
        let mut results = Vec::new();
        for child in self.child_keys(key)? {
            if let Some(row) = self.read_row(&child)? {
                if Self::visible_to(row.entity.key.tenant.as_ref(), caller) {
                    results.push(row);
                }
            }
        }
        Ok(results)
    }

    /// Every descendant of `key` (children, grandchildren, ...) visible to
    /// the caller, in breadth-first order.
    pub fn scan_descendants(
        &self,
        key: &EntityKey,
        caller: Option<&TenantId>,
    ) -> Result<Vec<VersionedEntity>> {
        let mut queue = self.child_keys(key)?;
        let mut cursor = 0;
        let mut results = Vec::new();
        while cursor < queue.len() {
            let child = queue[cursor].clone();
            cursor += 1;
            queue.extend(self.child_keys(&child)?);
            if let Some(row) = self.read_row(&child)? {
                if Self::visible_to(row.entity.key.tenant.as_ref(), caller) {
                    results.push(row);
                }
            }
        }
        Ok(results)
    }

    /// Number of descendants of `key` across all tenants. Cascade limits
    /// must count what a drop would actually delete, not just the rows the
    /// caller can see.
    pub fn count_descendants(&self, key: &EntityKey) -> Result<usize> {
        let mut queue = self.child_keys(key)?;
        let mut cursor = 0;
        while cursor < queue.len() {
            let child = queue[cursor].clone();
            cursor += 1;
            queue.extend(self.child_keys(&child)?);
        }
        Ok(queue.len())
    }

    /// Atomically deletes `root` and its entire descendant subtree,
    /// contingent on the root still being at `expected_root_version`.
    /// The whole subtree goes in one batch: a concurrent CREATE VIEW either
    /// lands before this commit (and is deleted with the subtree) or checks
    /// its parent guard after it (and observes the parent missing).
    pub fn delete_subtree(
        &self,
        root: &EntityKey,
        expected_root_version: VersionToken,
    ) -> Result<SubtreeOutcome> {
        let ctx = MutationContext {
            target: root.clone(),
            kind: EntityKind::Table,
            is_delete: true,
        };
        self.run_hooks(&ctx)?;

        let _guard = self.cas_lock.lock();

        let root_row = match self.read_row(root)? {
            None => return Ok(SubtreeOutcome::RootMissing),
            Some(row) => row,
        };
        if root_row.version != expected_root_version {
            return Ok(SubtreeOutcome::VersionConflict);
        }

        // Collect the subtree (the cascading lock intent): every path is
        // walked before any delete is staged.
        let mut doomed = vec![root.clone()];
        let mut cursor = 0;
        while cursor < doomed.len() {
            let children = self.child_keys(&doomed[cursor])?;
            doomed.extend(children);
            cursor += 1;
        }

        let mut operations = Vec::new();
        for key in &doomed {
            if let Some(row) = self.read_row(key)? {
                if let Some(parent) = &row.entity.parent {
                    operations.push(Operation::Delete {
                        partition: self.children(),
                        key: Self::link_key(parent, key),
                    });
                }
            }
            operations.push(Operation::Delete {
                partition: self.entities(),
                key: key.storage_key(),
            });
        }
        operations.push(Operation::Delete {
            partition: self.counters(),
            key: root.storage_key(),
        });
        self.backend.batch(operations)?;
        log::debug!("catalog subtree dropped at {} ({} entities)", root, doomed.len());
        Ok(SubtreeOutcome::Committed(doomed))
    }

    // --- qualifier counter rows ---

    fn read_counter(&self, root: &EntityKey) -> Result<Option<QualifierCounter>> {
        match self.backend.get(&self.counters(), &root.storage_key())? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes)
                    .map_err(|e| StorageError::SerializationError(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    fn encode_counter(counter: &QualifierCounter) -> Result<Vec<u8>> {
        serde_json::to_vec(counter).map_err(|e| StorageError::SerializationError(e.to_string()))
    }

    fn write_counter(&self, root: &EntityKey, counter: &QualifierCounter) -> Result<()> {
        let bytes = Self::encode_counter(counter)?;
        self.backend.put(&self.counters(), &root.storage_key(), &bytes)
    }

    /// Attempts to reserve the next qualifier from `root`'s shared counter
    /// for `mutation`. Returns the reserved value, or `None` while another
    /// in-flight reservation holds the counter.
    pub fn try_reserve_qualifier(
        &self,
        root: &EntityKey,
        mutation: MutationId,
    ) -> Result<Option<u32>> {
        let _guard = self.cas_lock.lock();
        let mut counter = self
            .read_counter(root)?
            .ok_or_else(|| StorageError::Other(format!("no qualifier counter for {}", root)))?;
        match counter.reserved_by {
            Some(holder) if holder != mutation => Ok(None),
            _ => {
                let value = counter.next;
                counter.reserved_by = Some(mutation);
                self.write_counter(root, &counter)?;
                Ok(Some(value))
            }
        }
    }

    /// Consumes a reservation: advances the counter and clears the marker.
    pub fn commit_reservation(&self, root: &EntityKey, mutation: MutationId) -> Result<()> {
        let _guard = self.cas_lock.lock();
        let mut counter = self
            .read_counter(root)?
            .ok_or_else(|| StorageError::Other(format!("no qualifier counter for {}", root)))?;
        if counter.reserved_by != Some(mutation) {
            return Err(StorageError::Other(format!(
                "reservation on {} not held by {}",
                root, mutation
            )));
        }
        counter.next += 1;
        counter.reserved_by = None;
        self.write_counter(root, &counter)
    }

    /// Rolls a reservation back without consuming the qualifier.
    pub fn release_reservation(&self, root: &EntityKey, mutation: MutationId) -> Result<()> {
        let _guard = self.cas_lock.lock();
        let mut counter = match self.read_counter(root)? {
            Some(counter) => counter,
            // Root dropped while the reservation was held; nothing to release.
            None => return Ok(()),
        };
        if counter.reserved_by == Some(mutation) {
            counter.reserved_by = None;
            self.write_counter(root, &counter)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use strata_commons::{ColumnDef, KeyLayout, KeySegment, SqlDataType};

    fn store() -> CatalogStore {
        CatalogStore::new(Arc::new(MemoryBackend::new())).unwrap()
    }

    fn table(key: EntityKey) -> SchemaEntity {
        SchemaEntity::table(
            key,
            vec![ColumnDef::new("k1", SqlDataType::Int, false)],
            KeyLayout::new(vec![KeySegment::asc("k1")]),
        )
    }

    fn insert(store: &CatalogStore, entity: SchemaEntity) -> VersionToken {
        match store
            .compare_and_set(&entity.key.clone(), None, Some(entity), None)
            .unwrap()
        {
            CasOutcome::Committed(version) => version,
            other => panic!("insert failed: {:?}", other),
        }
    }

    #[test]
    fn test_insert_then_get() {
        let store = store();
        let key = EntityKey::global("s1", "t1");
        let version = insert(&store, table(key.clone()));

        let row = store.get(&key, None).unwrap().unwrap();
        assert_eq!(row.version, version);
        assert_eq!(row.entity.key, key);
    }

    #[test]
    fn test_double_insert_conflicts() {
        let store = store();
        let key = EntityKey::global("s1", "t1");
        insert(&store, table(key.clone()));
        let outcome = store
            .compare_and_set(&key, None, Some(table(key.clone())), None)
            .unwrap();
        assert_eq!(outcome, CasOutcome::VersionConflict);
    }

    #[test]
    fn test_stale_version_conflicts() {
        let store = store();
        let key = EntityKey::global("s1", "t1");
        let v1 = insert(&store, table(key.clone()));

        // First update commits, second (still at v1) conflicts.
        let outcome = store
            .compare_and_set(&key, Some(v1), Some(table(key.clone())), None)
            .unwrap();
        assert!(matches!(outcome, CasOutcome::Committed(_)));
        let outcome = store
            .compare_and_set(&key, Some(v1), Some(table(key.clone())), None)
            .unwrap();
        assert_eq!(outcome, CasOutcome::VersionConflict);
    }

    #[test]
    fn test_parent_guard_detects_missing_parent() {
        let store = store();
        let parent_key = EntityKey::global("s1", "t1");
        let child_key = EntityKey::global("s1", "v1");
        let parent_version = insert(&store, table(parent_key.clone()));

        // Drop the parent, then attempt a guarded insert of the child.
        store
            .compare_and_set(&parent_key, Some(parent_version), None, None)
            .unwrap();
        let mut child = table(child_key.clone());
        child.parent = Some(parent_key.clone());
        let outcome = store
            .compare_and_set(
                &child_key,
                None,
                Some(child),
                Some((&parent_key, parent_version)),
            )
            .unwrap();
        assert_eq!(outcome, CasOutcome::ParentMissing);
        assert!(store.get(&child_key, None).unwrap().is_none());
    }

    #[test]
    fn test_tenant_scoping_on_lookup() {
        let store = store();
        let acme = TenantId::new("acme");
        let key = EntityKey::scoped(acme.clone(), "s1", "v1");
        insert(&store, table(key.clone()));

        // Owner sees it; global and foreign connections observe absence.
        assert!(store.get(&key, Some(&acme)).unwrap().is_some());
        assert!(store.get(&key, None).unwrap().is_none());
        assert!(store.get(&key, Some(&TenantId::new("other"))).unwrap().is_none());
    }

    #[test]
    fn test_scan_descendants_transitive() {
        let store = store();
        let root = EntityKey::global("s1", "t1");
        let child = EntityKey::global("s1", "v1");
        let grandchild = EntityKey::global("s1", "v2");
        insert(&store, table(root.clone()));
        let mut v1 = table(child.clone());
        v1.parent = Some(root.clone());
        insert(&store, v1);
        let mut v2 = table(grandchild.clone());
        v2.parent = Some(child.clone());
        insert(&store, v2);

        let descendants = store.scan_descendants(&root, None).unwrap();
        let mut names: Vec<_> = descendants
            .iter()
            .map(|row| row.entity.key.name.as_str().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["v1".to_string(), "v2".to_string()]);
    }

    #[test]
    fn test_delete_subtree_removes_everything() {
        let store = store();
        let root = EntityKey::global("s1", "t1");
        let child = EntityKey::global("s1", "v1");
        let version = insert(&store, table(root.clone()));
        let mut v1 = table(child.clone());
        v1.parent = Some(root.clone());
        insert(&store, v1);

        match store.delete_subtree(&root, version).unwrap() {
            SubtreeOutcome::Committed(deleted) => assert_eq!(deleted.len(), 2),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(store.get(&root, None).unwrap().is_none());
        assert!(store.get(&child, None).unwrap().is_none());
    }

    #[test]
    fn test_counter_reservation_protocol() {
        let store = store();
        let root = EntityKey::global("s1", "t1");
        let outcome = store
            .insert_root_with_counter(&root, table(root.clone()), 11)
            .unwrap();
        assert!(matches!(outcome, CasOutcome::Committed(_)));

        let m1 = store.next_mutation_id();
        let m2 = store.next_mutation_id();

        assert_eq!(store.try_reserve_qualifier(&root, m1).unwrap(), Some(11));
        // Second mutation is shut out while the reservation is held.
        assert_eq!(store.try_reserve_qualifier(&root, m2).unwrap(), None);

        store.commit_reservation(&root, m1).unwrap();
        assert_eq!(store.try_reserve_qualifier(&root, m2).unwrap(), Some(12));
        store.release_reservation(&root, m2).unwrap();

        // Rolled back: the same value is handed out again.
        let m3 = store.next_mutation_id();
        assert_eq!(store.try_reserve_qualifier(&root, m3).unwrap(), Some(12));
    }

    struct PoisonHook;

    impl MutationHook for PoisonHook {
        fn before_mutation(&self, ctx: &MutationContext) -> std::result::Result<(), HookError> {
            if ctx.target.name.as_str() == "failed_view" {
                Err(HookError::NonRetryable("deliberate poison".into()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_poison_hook_propagates_verbatim() {
        let store = CatalogStore::new(Arc::new(MemoryBackend::new()))
            .unwrap()
            .with_hook(Arc::new(PoisonHook));
        let key = EntityKey::global("s1", "failed_view");
        let err = store
            .compare_and_set(&key, None, Some(table(key.clone())), None)
            .unwrap_err();
        assert!(matches!(err, StorageError::NonRetryableFault(_)));
        assert!(store.get(&key, None).unwrap().is_none());
    }
}
