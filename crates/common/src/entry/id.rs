use std::fmt;

use uuid::Uuid;

/// Listing-derived identity: the parent's stable id joined with the entry's
///  canonical name. Survives repeated listings as long as the name does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StableId(String);

impl StableId {
    const SEPARATOR: char = '/';

    pub fn root() -> Self {
        Self(Self::SEPARATOR.to_string())
    }

    /// Normalize a `/`-separated path into a stable id.
    ///  Empty segments are dropped, so `a//b/` and `/a/b` are the same id.
    pub fn from_path(path: &str) -> Self {
        path.split(Self::SEPARATOR)
            .filter(|segment| !segment.is_empty())
            .fold(Self::root(), |id, segment| id.child(segment))
    }

    pub fn child(&self, cname: &str) -> Self {
        if self.is_root() {
            Self(format!("{}{}", Self::SEPARATOR, cname))
        } else {
            Self(format!("{}{}{}", self.0, Self::SEPARATOR, cname))
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(Self::SEPARATOR) {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// True when `other` is this id or lives underneath it
    pub fn contains(&self, other: &StableId) -> bool {
        if self.is_root() || self == other {
            return true;
        }
        other
            .0
            .strip_prefix(&self.0)
            .is_some_and(|rest| rest.starts_with(Self::SEPARATOR))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity handed to every entry at construction. Not stable across calls:
///  two constructions of the same resource get two different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EphemeralId(Uuid);

impl EphemeralId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EphemeralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ephemeral:{}", self.0)
    }
}

/// The identity half of a cache key. Kept as two variants so a stable id can
///  never collide with an ephemeral one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheId {
    Stable(StableId),
    Ephemeral(EphemeralId),
}

impl CacheId {
    pub fn stable(&self) -> Option<&StableId> {
        match self {
            CacheId::Stable(id) => Some(id),
            CacheId::Ephemeral(_) => None,
        }
    }
}

impl fmt::Display for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheId::Stable(id) => id.fmt(f),
            CacheId::Ephemeral(id) => id.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_and_parent() {
        let root = StableId::root();
        let volumes = root.child("volumes");
        let data = volumes.child("data");

        assert_eq!(volumes.as_str(), "/volumes");
        assert_eq!(data.as_str(), "/volumes/data");
        assert_eq!(data.parent(), Some(volumes.clone()));
        assert_eq!(volumes.parent(), Some(root.clone()));
        assert_eq!(root.parent(), None);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(StableId::from_path(""), StableId::root());
        assert_eq!(StableId::from_path("/"), StableId::root());
        assert_eq!(
            StableId::from_path("volumes//data/"),
            StableId::root().child("volumes").child("data")
        );
    }

    #[test]
    fn test_contains() {
        let volumes = StableId::from_path("/volumes");
        assert!(StableId::root().contains(&volumes));
        assert!(volumes.contains(&volumes));
        assert!(volumes.contains(&StableId::from_path("/volumes/data/a.txt")));
        assert!(!volumes.contains(&StableId::from_path("/volumes2")));
        assert!(!volumes.contains(&StableId::root()));
    }

    #[test]
    fn test_ephemeral_ids_differ() {
        assert_ne!(EphemeralId::generate(), EphemeralId::generate());
    }
}
