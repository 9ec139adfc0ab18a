use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Everything a consumer can ask of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    List,
    Read,
    Stream,
    Delete,
    Metadata,
    VolumeList,
    VolumeRead,
    VolumeStream,
    VolumeDelete,
}

impl Action {
    pub const ALL: [Action; 9] = [
        Action::List,
        Action::Read,
        Action::Stream,
        Action::Delete,
        Action::Metadata,
        Action::VolumeList,
        Action::VolumeRead,
        Action::VolumeStream,
        Action::VolumeDelete,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Action::List => "list",
            Action::Read => "read",
            Action::Stream => "stream",
            Action::Delete => "delete",
            Action::Metadata => "metadata",
            Action::VolumeList => "volume_list",
            Action::VolumeRead => "volume_read",
            Action::VolumeStream => "volume_stream",
            Action::VolumeDelete => "volume_delete",
        }
    }

    fn bit(&self) -> u16 {
        1 << (*self as u16)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of actions an entry supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionSet(u16);

impl ActionSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, action: Action) {
        self.0 |= action.bit();
    }

    pub fn contains(&self, action: Action) -> bool {
        self.0 & action.bit() != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Actions in declaration order
    pub fn iter(&self) -> impl Iterator<Item = Action> + '_ {
        Action::ALL.into_iter().filter(|a| self.contains(*a))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|a| a.name()).collect()
    }
}

impl FromIterator<Action> for ActionSet {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        let mut set = ActionSet::empty();
        for action in iter {
            set.insert(action);
        }
        set
    }
}

impl<const N: usize> From<[Action; N]> for ActionSet {
    fn from(actions: [Action; N]) -> Self {
        actions.into_iter().collect()
    }
}

/// The cached operations. Each has its own TTL in an entry's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOp {
    List,
    Open,
    Metadata,
}

impl CacheOp {
    pub const ALL: [CacheOp; 3] = [CacheOp::List, CacheOp::Open, CacheOp::Metadata];

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }

    /// The action this operation serves
    pub fn action(&self) -> Action {
        match self {
            CacheOp::List => Action::List,
            CacheOp::Open => Action::Read,
            CacheOp::Metadata => Action::Metadata,
        }
    }
}

impl fmt::Display for CacheOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheOp::List => f.write_str("List"),
            CacheOp::Open => f.write_str("Open"),
            CacheOp::Metadata => f.write_str("Metadata"),
        }
    }
}

/// Time-to-live of a cached operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Never cache, every dispatch reaches the backend
    Disabled,
    For(Duration),
}

impl Ttl {
    pub const DEFAULT: Ttl = Ttl::For(Duration::from_secs(15));

    pub fn duration(&self) -> Option<Duration> {
        match self {
            Ttl::Disabled => None,
            Ttl::For(d) => Some(*d),
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Ttl::Disabled)
    }
}

impl Default for Ttl {
    fn default() -> Self {
        Ttl::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_set() {
        let mut set = ActionSet::from([Action::List, Action::Metadata]);
        assert!(set.contains(Action::List));
        assert!(!set.contains(Action::Read));
        assert_eq!(set.len(), 2);

        set.insert(Action::Read);
        set.insert(Action::Read);
        assert_eq!(set.names(), vec!["list", "read", "metadata"]);
    }

    #[test]
    fn test_cache_op_actions() {
        assert_eq!(CacheOp::Open.action(), Action::Read);
        assert_eq!(
            CacheOp::ALL.iter().map(|op| op.index()).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }
}
