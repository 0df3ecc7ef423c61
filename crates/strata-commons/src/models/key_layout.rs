//! Logical primary-key layout.
//!
//! A `KeyLayout` describes the ordered key segments of an entity plus the
//! root-level salting and tenant-prefix flags. It is purely logical: the
//! DESC bit and the salt are recorded here and honored by the downstream
//! byte encoder, never encoded in this crate.

use serde::{Deserialize, Serialize};

/// Sort direction of one key segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// One segment of a composed primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeySegment {
    pub column: String,
    pub order: SortOrder,
    pub nullable: bool,
}

impl KeySegment {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Asc,
            nullable: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Desc,
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Ordered key segments plus root-level layout flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyLayout {
    pub segments: Vec<KeySegment>,
    /// Salt bucket count. Set only on the root table and inherited unchanged
    /// by every descendant; `None` means unsalted.
    pub salt_buckets: Option<u8>,
    /// Whether rows carry a leading tenant-id segment. Set when a
    /// tenant-scoped view sits over a multi-tenant table.
    pub tenant_prefixed: bool,
}

impl KeyLayout {
    pub fn new(segments: Vec<KeySegment>) -> Self {
        Self {
            segments,
            salt_buckets: None,
            tenant_prefixed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Position of a column within the key, if it is a key column.
    pub fn position_of(&self, column: &str) -> Option<usize> {
        self.segments.iter().position(|s| s.column == column)
    }

    /// True when `prefix` equals, positionally, the leading segments of
    /// this layout. Every child key must satisfy this against its parent.
    pub fn starts_with(&self, prefix: &KeyLayout) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_of() {
        let layout = KeyLayout::new(vec![KeySegment::asc("k1"), KeySegment::desc("k2")]);
        assert_eq!(layout.position_of("k1"), Some(0));
        assert_eq!(layout.position_of("k2"), Some(1));
        assert_eq!(layout.position_of("v1"), None);
    }

    #[test]
    fn test_starts_with() {
        let parent = KeyLayout::new(vec![KeySegment::asc("k1"), KeySegment::asc("k2")]);
        let mut child = parent.clone();
        child.segments.push(KeySegment::asc("k3"));
        assert!(child.starts_with(&parent));
        assert!(!parent.starts_with(&child));
    }

    #[test]
    fn test_starts_with_respects_direction() {
        let parent = KeyLayout::new(vec![KeySegment::asc("k1")]);
        let child = KeyLayout::new(vec![KeySegment::desc("k1"), KeySegment::asc("k2")]);
        assert!(!child.starts_with(&parent));
    }
}
