use std::sync::OnceLock;
use std::time::Duration;

use parking_lot::RwLock;

use super::{ActionSet, Attributes, CacheId, CacheOp, EntryError, EphemeralId, StableId, Ttl};

/// State shared by every entry: names, identity, TTL table and attributes.
///
/// Concrete resources embed an `EntryBase` and hand it out through
///  [`Entry::base`](super::Entry::base).
#[derive(Debug)]
pub struct EntryBase {
    name: String,
    cname: String,
    separator_substitute: char,
    ttl: [Ttl; 3],
    ephemeral_id: EphemeralId,
    // set by the listing pass that discovers the entry
    stable_id: OnceLock<StableId>,
    actions: OnceLock<ActionSet>,
    attributes: RwLock<Attributes>,
}

impl EntryBase {
    pub const SEPARATOR: char = '/';
    pub const DEFAULT_SEPARATOR_SUBSTITUTE: char = '#';

    /// Create a base for `name`, replacing any `/` with `#` in the canonical name
    pub fn new(name: impl Into<String>) -> Result<Self, EntryError> {
        Self::with_separator_substitute(name, Self::DEFAULT_SEPARATOR_SUBSTITUTE)
    }

    /// Create a base for `name`, replacing any `/` with `substitute`
    pub fn with_separator_substitute(
        name: impl Into<String>,
        substitute: char,
    ) -> Result<Self, EntryError> {
        let name = name.into();
        if name.is_empty() {
            return Err(EntryError::InvalidName);
        }
        if substitute == Self::SEPARATOR {
            return Err(EntryError::InvalidSeparatorSubstitute(substitute));
        }
        let cname = name.replace(Self::SEPARATOR, &substitute.to_string());

        Ok(Self {
            name,
            cname,
            separator_substitute: substitute,
            ttl: [Ttl::DEFAULT; 3],
            ephemeral_id: EphemeralId::generate(),
            stable_id: OnceLock::new(),
            actions: OnceLock::new(),
            attributes: RwLock::new(Attributes::default()),
        })
    }

    /// Builder-style helper to seed the attributes at construction
    pub fn with_attributes(self, attributes: Attributes) -> Self {
        *self.attributes.write() = attributes;
        self
    }

    /// Name as reported by the backend; use this when calling backend APIs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Separator-safe name, used in paths and stable ids
    pub fn cname(&self) -> &str {
        &self.cname
    }

    pub fn separator_substitute(&self) -> char {
        self.separator_substitute
    }

    pub fn ttl_of(&self, op: CacheOp) -> Ttl {
        self.ttl[op.index()]
    }

    pub fn set_ttl(&mut self, op: CacheOp, ttl: Duration) {
        self.ttl[op.index()] = Ttl::For(ttl);
    }

    pub fn disable_caching(&mut self, op: CacheOp) {
        self.ttl[op.index()] = Ttl::Disabled;
    }

    /// Disable caching of List, Open and Metadata
    pub fn disable_default_caching(&mut self) {
        for op in CacheOp::ALL {
            self.disable_caching(op);
        }
    }

    pub fn stable_id(&self) -> Option<&StableId> {
        self.stable_id.get()
    }

    pub fn ephemeral_id(&self) -> EphemeralId {
        self.ephemeral_id
    }

    /// Key under which this entry's results are cached
    pub fn cache_id(&self) -> CacheId {
        match self.stable_id.get() {
            Some(id) => CacheId::Stable(id.clone()),
            None => CacheId::Ephemeral(self.ephemeral_id),
        }
    }

    /// Human readable identity for logs and errors
    pub fn path(&self) -> String {
        match self.stable_id.get() {
            Some(id) => id.to_string(),
            None => self.cname.clone(),
        }
    }

    /// Assign the stable id. Returns false if one was already assigned;
    ///  the first assignment wins.
    pub(crate) fn assign_stable_id(&self, id: StableId) -> bool {
        self.stable_id.set(id).is_ok()
    }

    pub(crate) fn actions_or_init(&self, derive: impl FnOnce() -> ActionSet) -> ActionSet {
        *self.actions.get_or_init(derive)
    }

    /// Snapshot of the current attributes
    pub fn attributes(&self) -> Attributes {
        self.attributes.read().clone()
    }

    /// Mutate the attributes in place, e.g. once a network round trip
    ///  revealed the real size of a resource.
    pub fn update_attributes<F>(&self, update: F)
    where
        F: FnOnce(&mut Attributes),
    {
        update(&mut self.attributes.write());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_name_is_rejected() {
        assert!(matches!(EntryBase::new(""), Err(EntryError::InvalidName)));
    }

    #[test]
    fn test_cname_replaces_separator() {
        let base = EntryBase::new("us-east/prod/db").unwrap();
        assert_eq!(base.name(), "us-east/prod/db");
        assert_eq!(base.cname(), "us-east#prod#db");

        let base = EntryBase::with_separator_substitute("a/b", ':').unwrap();
        assert_eq!(base.cname(), "a:b");
    }

    #[test]
    fn test_separator_cannot_substitute_itself() {
        assert!(matches!(
            EntryBase::with_separator_substitute("a/b", '/'),
            Err(EntryError::InvalidSeparatorSubstitute('/'))
        ));
        assert!(matches!(
            EntryBase::with_separator_substitute("plain", '/'),
            Err(EntryError::InvalidSeparatorSubstitute('/'))
        ));
    }

    #[test]
    fn test_cname_is_deterministic() {
        for name in ["plain", "/leading", "trailing/", "a//b", "ünï/cödé"] {
            let first = EntryBase::new(name).unwrap();
            let second = EntryBase::new(name).unwrap();
            assert_eq!(first.cname(), second.cname());
            assert!(!first.cname().contains('/'));
        }
    }

    #[test]
    fn test_ttl_table() {
        let mut base = EntryBase::new("entry").unwrap();
        for op in CacheOp::ALL {
            assert_eq!(base.ttl_of(op), Ttl::For(Duration::from_secs(15)));
        }

        base.set_ttl(CacheOp::List, Duration::from_secs(30));
        base.disable_caching(CacheOp::Open);
        assert_eq!(base.ttl_of(CacheOp::List), Ttl::For(Duration::from_secs(30)));
        assert_eq!(base.ttl_of(CacheOp::Open), Ttl::Disabled);

        base.disable_default_caching();
        assert!(CacheOp::ALL.iter().all(|op| base.ttl_of(*op).is_disabled()));
    }

    #[test]
    fn test_stable_id_assigned_once() {
        let base = EntryBase::new("data").unwrap();
        assert!(matches!(base.cache_id(), CacheId::Ephemeral(_)));

        assert!(base.assign_stable_id(StableId::from_path("/volumes/data")));
        assert!(!base.assign_stable_id(StableId::from_path("/elsewhere/data")));
        assert_eq!(
            base.cache_id(),
            CacheId::Stable(StableId::from_path("/volumes/data"))
        );
    }

    #[test]
    fn test_update_attributes() {
        let base = EntryBase::new("console.out").unwrap();
        assert_eq!(base.attributes().size(), None);

        base.update_attributes(|attr| {
            attr.set_size(42);
        });
        assert_eq!(base.attributes().size(), Some(42));
    }
}
