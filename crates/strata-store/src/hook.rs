//! Mutation interception hooks.
//!
//! An embedder can register hooks that see every catalog-mutating operation
//! before it is applied. A hook may veto a mutation: a `NonRetryable` veto
//! propagates to the caller as a fatal storage fault and is never rewritten
//! into a version conflict, while a `Transient` veto is reported as a
//! retryable fault. Hooks run before any write; a vetoed mutation leaves no
//! trace in the catalog.

use std::fmt;
use strata_commons::{EntityKey, EntityKind};

/// Identifier of one in-flight mutation, used to mark counter reservations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct MutationId(pub u64);

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// What a hook gets to see about a pending mutation.
#[derive(Debug, Clone)]
pub struct MutationContext {
    pub target: EntityKey,
    pub kind: EntityKind,
    /// `true` for deletes, `false` for inserts and updates.
    pub is_delete: bool,
}

/// Errors a hook can raise to refuse a mutation.
#[derive(Debug, Clone)]
pub enum HookError {
    /// Unrecoverable refusal; propagated verbatim, never retried.
    NonRetryable(String),
    /// Transient condition; the caller may retry.
    Transient(String),
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookError::NonRetryable(msg) => write!(f, "non-retryable: {}", msg),
            HookError::Transient(msg) => write!(f, "transient: {}", msg),
        }
    }
}

impl std::error::Error for HookError {}

/// Pre-mutation interceptor. Implementations must be thread-safe.
pub trait MutationHook: Send + Sync {
    /// Called once per catalog mutation, before any write is attempted.
    fn before_mutation(&self, ctx: &MutationContext) -> Result<(), HookError>;
}

/// Hook that approves everything.
#[derive(Debug, Default)]
pub struct NoopHook;

impl MutationHook for NoopHook {
    fn before_mutation(&self, _ctx: &MutationContext) -> Result<(), HookError> {
        Ok(())
    }
}
