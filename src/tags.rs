//! Cache tags and the tag → cache-key index.
//!
//! Every successful or failed query result is provided under a set of tags.
//! Invalidating a tag marks every cache entry registered under it stale.
//!
//! Matching follows the usual rule for typed tags:
//!
//! | Invalidated tag | Matches provided tags |
//! |-----------------|-----------------------|
//! | `Households` | every `Households` tag, with or without id |
//! | `Households:LIST` | `Households:LIST` only |
//! | `Households:MNG1` | `Households:MNG1` only |

use dashmap::DashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Resource family a tag belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagKind {
    GlobalStats,
    RegionStats,
    Regions,
    Households,
    FieldAgents,
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TagKind::GlobalStats => "GlobalStats",
            TagKind::RegionStats => "RegionStats",
            TagKind::Regions => "Regions",
            TagKind::Households => "Households",
            TagKind::FieldAgents => "FieldAgents",
        };
        f.write_str(name)
    }
}

/// Identity part of a tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TagId {
    /// The whole kind.
    Kind,
    /// The list of all entities of a kind.
    List,
    /// One entity.
    Id(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tag {
    pub kind: TagKind,
    pub id: TagId,
}

impl Tag {
    pub fn kind(kind: TagKind) -> Self {
        Tag {
            kind,
            id: TagId::Kind,
        }
    }

    pub fn list(kind: TagKind) -> Self {
        Tag {
            kind,
            id: TagId::List,
        }
    }

    pub fn id(kind: TagKind, id: impl Into<String>) -> Self {
        Tag {
            kind,
            id: TagId::Id(id.into()),
        }
    }

    /// Whether invalidating `self` invalidates an entry that provided `provided`.
    pub fn matches(&self, provided: &Tag) -> bool {
        self.kind == provided.kind && (self.id == TagId::Kind || self.id == provided.id)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            TagId::Kind => write!(f, "{}", self.kind),
            TagId::List => write!(f, "{}:LIST", self.kind),
            TagId::Id(id) => write!(f, "{}:{}", self.kind, id),
        }
    }
}

/// Explicit mapping from provided tags to the cache keys that provided them.
///
/// Cloning is cheap; clones share the same index.
#[derive(Clone, Default)]
pub struct TagIndex {
    by_tag: Arc<DashMap<Tag, HashSet<String>>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `key` provides every tag in `tags`.
    pub fn register(&self, key: &str, tags: &[Tag]) {
        for tag in tags {
            self.by_tag
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
    }

    /// Forget that `key` provides `tags`.
    pub fn unregister(&self, key: &str, tags: &[Tag]) {
        for tag in tags {
            if let Some(mut keys) = self.by_tag.get_mut(tag) {
                keys.remove(key);
            }
            self.by_tag.remove_if(tag, |_, keys| keys.is_empty());
        }
    }

    /// Cache keys affected by invalidating `tag`.
    pub fn keys_for(&self, tag: &Tag) -> HashSet<String> {
        match tag.id {
            TagId::Kind => self
                .by_tag
                .iter()
                .filter(|entry| tag.matches(entry.key()))
                .flat_map(|entry| entry.value().iter().cloned().collect::<Vec<_>>())
                .collect(),
            _ => self
                .by_tag
                .get(tag)
                .map(|keys| keys.clone())
                .unwrap_or_default(),
        }
    }

    /// Number of distinct tags currently provided.
    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}
