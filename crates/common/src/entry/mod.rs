use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::volume::Volume;

mod action;
mod attributes;
mod base;
mod error;
mod id;
mod stream;

pub use action::{Action, ActionSet, CacheOp, Ttl};
pub use attributes::{decode_metadata, Attributes, JsonObject};
pub use base::EntryBase;
pub use error::EntryError;
pub use id::{CacheId, EphemeralId, StableId};
pub use stream::ByteStream;

/// Shared handle to an entry. Listings hand these out and the cache keeps
///  them, so an entry lives as long as anything still refers to it.
pub type EntryRef = Arc<dyn Entry>;

/// A node in the namespace.
///
/// An entry supports exactly the actions whose capability accessor returns
///  `Some`. Implement the capability trait on the concrete type and return
///  `Some(self)` from the matching accessor:
///
/// ```ignore
/// impl Entry for Bucket {
///     fn base(&self) -> &EntryBase { &self.base }
///     fn as_parent(&self) -> Option<&dyn Parent> { Some(self) }
/// }
/// ```
///
/// Metadata is supported by every entry. The default implementation reports
///  the metadata blob from the attributes, or the known attributes themselves.
#[async_trait]
pub trait Entry: Send + Sync + 'static {
    fn base(&self) -> &EntryBase;

    fn as_parent(&self) -> Option<&dyn Parent> {
        None
    }

    fn as_readable(&self) -> Option<&dyn Readable> {
        None
    }

    fn as_streamable(&self) -> Option<&dyn Streamable> {
        None
    }

    fn as_deletable(&self) -> Option<&dyn Deletable> {
        None
    }

    fn as_volume(&self) -> Option<Arc<dyn Volume>> {
        None
    }

    async fn metadata(&self) -> Result<JsonObject, EntryError> {
        let attributes = self.base().attributes();
        Ok(match attributes.meta() {
            Some(meta) => meta.clone(),
            None => attributes.to_json(),
        })
    }
}

/// An entry with children
#[async_trait]
pub trait Parent: Send + Sync {
    async fn list(&self) -> Result<Vec<EntryRef>, EntryError>;
}

/// An entry whose full content can be fetched
#[async_trait]
pub trait Readable: Send + Sync {
    async fn read(&self) -> Result<Bytes, EntryError>;
}

/// An entry whose content can be followed
#[async_trait]
pub trait Streamable: Send + Sync {
    async fn stream(&self) -> Result<ByteStream, EntryError>;
}

#[async_trait]
pub trait Deletable: Send + Sync {
    /// Returns true if the entry was deleted, false if the deletion is
    ///  still in progress on the backend.
    async fn delete(&self) -> Result<bool, EntryError>;
}

impl dyn Entry {
    pub fn name(&self) -> &str {
        self.base().name()
    }

    pub fn cname(&self) -> &str {
        self.base().cname()
    }

    pub fn attributes(&self) -> Attributes {
        self.base().attributes()
    }

    /// The supported actions, derived on first use and fixed afterwards
    pub fn actions(&self) -> ActionSet {
        self.base().actions_or_init(|| {
            let mut set = ActionSet::from([Action::Metadata]);
            if self.as_parent().is_some() {
                set.insert(Action::List);
            }
            if self.as_readable().is_some() {
                set.insert(Action::Read);
            }
            if self.as_streamable().is_some() {
                set.insert(Action::Stream);
            }
            if self.as_deletable().is_some() {
                set.insert(Action::Delete);
            }
            if self.as_volume().is_some() {
                set.insert(Action::VolumeList);
                set.insert(Action::VolumeRead);
                set.insert(Action::VolumeStream);
                set.insert(Action::VolumeDelete);
            }
            set
        })
    }

    pub fn supports(&self, action: Action) -> bool {
        self.actions().contains(action)
    }

    /// Name for display: the canonical name, with a trailing separator for
    ///  anything that can be listed.
    pub fn display_name(&self) -> String {
        if self.supports(Action::List) {
            format!("{}{}", self.cname(), EntryBase::SEPARATOR)
        } else {
            self.cname().to_string()
        }
    }

    pub(crate) fn unsupported(&self, action: Action) -> EntryError {
        EntryError::unsupported(self.base().path(), action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf {
        base: EntryBase,
    }

    impl Entry for Leaf {
        fn base(&self) -> &EntryBase {
            &self.base
        }
    }

    struct Folder {
        base: EntryBase,
    }

    impl Entry for Folder {
        fn base(&self) -> &EntryBase {
            &self.base
        }

        fn as_parent(&self) -> Option<&dyn Parent> {
            Some(self)
        }

        fn as_deletable(&self) -> Option<&dyn Deletable> {
            Some(self)
        }
    }

    #[async_trait]
    impl Parent for Folder {
        async fn list(&self) -> Result<Vec<EntryRef>, EntryError> {
            Ok(vec![])
        }
    }

    #[async_trait]
    impl Deletable for Folder {
        async fn delete(&self) -> Result<bool, EntryError> {
            Ok(true)
        }
    }

    #[test]
    fn test_actions_follow_capabilities() {
        let leaf: EntryRef = Arc::new(Leaf {
            base: EntryBase::new("leaf").unwrap(),
        });
        assert_eq!(leaf.actions().names(), vec!["metadata"]);
        assert_eq!(leaf.display_name(), "leaf");

        let folder: EntryRef = Arc::new(Folder {
            base: EntryBase::new("a/b").unwrap(),
        });
        assert_eq!(folder.actions().names(), vec!["list", "delete", "metadata"]);
        assert!(folder.supports(Action::List));
        assert!(!folder.supports(Action::Read));
        assert_eq!(folder.display_name(), "a#b/");
    }

    #[tokio::test]
    async fn test_default_metadata() {
        let mut attributes = Attributes::new();
        attributes.set_size(3);
        let leaf = Leaf {
            base: EntryBase::new("leaf").unwrap().with_attributes(attributes),
        };
        let meta = leaf.metadata().await.unwrap();
        assert_eq!(meta["size"], 3);

        let mut blob = JsonObject::new();
        blob.insert("image".to_string(), "nginx:1.25".into());
        leaf.base.update_attributes(|a| {
            a.set_meta(blob.clone());
        });
        assert_eq!(leaf.metadata().await.unwrap(), blob);
    }
}
