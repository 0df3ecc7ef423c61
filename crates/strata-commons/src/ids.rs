//! Typed identifiers for catalog entities.
//!
//! Every catalog row is addressed by an [`EntityKey`]: an optional tenant id,
//! a schema name, and an entity name. String newtypes keep the components
//! from being swapped at call sites; `EntityKey` also owns the storage-key
//! encoding used by the catalog store.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id! {
    /// Tenant identifier. Absence of a tenant means the global scope.
    TenantId
}

string_id! {
    /// SQL schema (namespace) name.
    SchemaName
}

string_id! {
    /// Table, view, or index name within a schema.
    EntityName
}

/// Fully-qualified address of a catalog entity: (tenant, schema, name).
///
/// `tenant = None` denotes a global entity visible to every connection.
/// The storage encoding is `{tenant}:{schema}:{name}` with an empty first
/// segment as the global-tenant sentinel, so global and tenant-scoped rows
/// for the same name never collide and tenant rows group together under a
/// common prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub tenant: Option<TenantId>,
    pub schema: SchemaName,
    pub name: EntityName,
}

impl EntityKey {
    pub fn new(tenant: Option<TenantId>, schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tenant,
            schema: SchemaName::new(schema),
            name: EntityName::new(name),
        }
    }

    /// Global (tenant-less) key.
    pub fn global(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(None, schema, name)
    }

    /// Key scoped to a single tenant.
    pub fn scoped(
        tenant: TenantId,
        schema: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::new(Some(tenant), schema, name)
    }

    /// Encodes the key for storage: `{tenant}:{schema}:{name}`.
    ///
    /// Identifier components must not contain `:`; the SQL layer rejects
    /// such names before they reach this crate.
    pub fn storage_key(&self) -> Vec<u8> {
        let tenant = self.tenant.as_ref().map(|t| t.as_str()).unwrap_or("");
        let mut key =
            Vec::with_capacity(tenant.len() + self.schema.as_str().len() + self.name.as_str().len() + 2);
        key.extend_from_slice(tenant.as_bytes());
        key.push(b':');
        key.extend_from_slice(self.schema.as_str().as_bytes());
        key.push(b':');
        key.extend_from_slice(self.name.as_str().as_bytes());
        key
    }

    /// Parses a key produced by [`EntityKey::storage_key`].
    pub fn from_storage_key(bytes: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(bytes).ok()?;
        let mut parts = text.splitn(3, ':');
        let tenant = parts.next()?;
        let schema = parts.next()?;
        let name = parts.next()?;
        Some(Self {
            tenant: if tenant.is_empty() {
                None
            } else {
                Some(TenantId::new(tenant))
            },
            schema: SchemaName::new(schema),
            name: EntityName::new(name),
        })
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tenant {
            Some(tenant) => write!(f, "{}@{}.{}", tenant, self.schema, self.name),
            None => write!(f, "{}.{}", self.schema, self.name),
        }
    }
}
