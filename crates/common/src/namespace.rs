use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::cache::{ActionCache, Children};
use crate::entry::{
    Action, ByteStream, CacheOp, Entry, EntryBase, EntryError, EntryRef, JsonObject, Parent,
    StableId,
};

/// Root of the namespace. Its children are the roots of each backend.
pub struct Registry {
    base: EntryBase,
    roots: RwLock<Vec<EntryRef>>,
}

impl Registry {
    pub fn new() -> Result<Self, EntryError> {
        let mut base = EntryBase::new("root")?;
        // roots can be registered at any time
        base.disable_caching(CacheOp::List);
        base.assign_stable_id(StableId::root());
        Ok(Self {
            base,
            roots: RwLock::new(Vec::new()),
        })
    }

    /// Add a backend root. Its canonical name must be unique among roots.
    pub fn register(&self, root: EntryRef) -> Result<(), EntryError> {
        let mut roots = self.roots.write();
        if roots.iter().any(|existing| existing.cname() == root.cname()) {
            return Err(EntryError::DuplicateCanonicalName {
                parent: StableId::root().to_string(),
                cname: root.cname().to_string(),
            });
        }
        tracing::debug!(root = %root.cname(), "registered backend root");
        roots.push(root);
        Ok(())
    }
}

impl Entry for Registry {
    fn base(&self) -> &EntryBase {
        &self.base
    }

    fn as_parent(&self) -> Option<&dyn Parent> {
        Some(self)
    }
}

#[async_trait]
impl Parent for Registry {
    async fn list(&self) -> Result<Vec<EntryRef>, EntryError> {
        Ok(self.roots.read().clone())
    }
}

/// Resolve a `/`-separated path of canonical names, starting at `root`,
///  through cached listings.
pub async fn find(cache: &ActionCache, root: &EntryRef, path: &str) -> Result<EntryRef, EntryError> {
    let mut current = root.clone();
    for segment in path.split('/').filter(|segment| !segment.is_empty()) {
        if !current.supports(Action::List) {
            return Err(EntryError::NotFound(path.to_string()));
        }
        let children = cache.list(&current).await?;
        current = children
            .get(segment)
            .cloned()
            .ok_or_else(|| EntryError::NotFound(path.to_string()))?;
    }
    Ok(current)
}

/// A namespace root bundled with the cache that serves it
#[derive(Clone)]
pub struct Namespace {
    root: EntryRef,
    cache: ActionCache,
}

impl Namespace {
    pub fn new(root: EntryRef, cache: ActionCache) -> Self {
        Self { root, cache }
    }

    pub fn root(&self) -> &EntryRef {
        &self.root
    }

    pub fn cache(&self) -> &ActionCache {
        &self.cache
    }

    pub async fn find(&self, path: &str) -> Result<EntryRef, EntryError> {
        find(&self.cache, &self.root, path).await
    }

    pub async fn list(&self, path: &str) -> Result<Children, EntryError> {
        let entry = self.find(path).await?;
        self.cache.list(&entry).await
    }

    pub async fn read(&self, path: &str, offset: u64, len: usize) -> Result<Bytes, EntryError> {
        let entry = self.find(path).await?;
        self.cache.read(&entry, offset, len).await
    }

    /// Full content of the entry at `path`
    pub async fn read_all(&self, path: &str) -> Result<Bytes, EntryError> {
        let entry = self.find(path).await?;
        self.cache.open(&entry).await
    }

    pub async fn metadata(&self, path: &str) -> Result<Arc<JsonObject>, EntryError> {
        let entry = self.find(path).await?;
        self.cache.metadata(&entry).await
    }

    pub async fn stream(&self, path: &str) -> Result<ByteStream, EntryError> {
        let entry = self.find(path).await?;
        self.cache.stream(&entry).await
    }

    pub async fn delete(&self, path: &str) -> Result<bool, EntryError> {
        let entry = self.find(path).await?;
        self.cache.delete(&entry).await
    }
}
