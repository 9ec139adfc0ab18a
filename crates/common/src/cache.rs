//! Action cache for entry results
//!
//! Uses moka for concurrent storage and per-key coalescing. Freshness is
//! judged against the tokio clock, so an entry inserted at `t` is served
//! while `now - t < ttl` and recomputed from `t + ttl` on.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use moka::future::Cache;
use moka::Expiry;
use tokio::time::Instant;

use crate::entry::{
    Action, ByteStream, CacheId, CacheOp, EntryError, EntryRef, JsonObject, StableId, Ttl,
};

/// Children of a listed entry, keyed by canonical name
pub type Children = Arc<BTreeMap<String, EntryRef>>;

/// Configuration for the action cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached results (default: 10,000)
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub id: CacheId,
    pub op: CacheOp,
}

#[derive(Clone)]
enum CachedValue {
    List(Children),
    Open(Bytes),
    Metadata(Arc<JsonObject>),
}

#[derive(Clone)]
struct Cached {
    value: CachedValue,
    inserted_at: Instant,
    ttl: Duration,
}

impl Cached {
    fn is_fresh(&self) -> bool {
        self.inserted_at.elapsed() < self.ttl
    }
}

/// Lets the store drop results once their own TTL has passed
struct PerEntryTtl;

impl Expiry<CacheKey, Cached> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &Cached,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Cache statistics for debugging
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entry_count: u64,
}

/// Dispatches entry actions, caching List, Open and Metadata results under
///  the entry's cache id with the entry's own TTL for that operation.
///
/// Concurrent callers for one key share a single backend call. Errors are
///  never cached. Backend calls run on their own task, so a caller that
///  gives up waiting does not cancel the call for everyone else.
#[derive(Clone)]
pub struct ActionCache {
    store: Cache<CacheKey, Cached>,
}

impl ActionCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            store: Cache::builder()
                .max_capacity(config.max_capacity)
                .expire_after(PerEntryTtl)
                .support_invalidation_closures()
                .build(),
        }
    }

    /// List the children of `entry`. Every child gets its stable id before
    ///  it is stored or returned.
    pub async fn list(&self, entry: &EntryRef) -> Result<Children, EntryError> {
        let value = self
            .dispatch(entry, CacheOp::List, |entry| async move {
                let parent = entry
                    .as_parent()
                    .ok_or_else(|| entry.unsupported(Action::List))?;
                let listed = parent.list().await?;
                let children = assign_identities(&entry, listed)?;
                tracing::info!(
                    entry = %entry.base().path(),
                    children = children.len(),
                    "listed entry"
                );
                Ok(CachedValue::List(Arc::new(children)))
            })
            .await?;

        match value {
            CachedValue::List(children) => Ok(children),
            _ => Err(mismatch(CacheOp::List)),
        }
    }

    /// Full content of `entry`
    pub async fn open(&self, entry: &EntryRef) -> Result<Bytes, EntryError> {
        let value = self
            .dispatch(entry, CacheOp::Open, |entry| async move {
                let readable = entry
                    .as_readable()
                    .ok_or_else(|| entry.unsupported(Action::Read))?;
                Ok(CachedValue::Open(readable.read().await?))
            })
            .await?;

        match value {
            CachedValue::Open(data) => Ok(data),
            _ => Err(mismatch(CacheOp::Open)),
        }
    }

    /// Read up to `len` bytes at `offset` from the cached content.
    ///  Offsets past the end yield an empty buffer.
    pub async fn read(
        &self,
        entry: &EntryRef,
        offset: u64,
        len: usize,
    ) -> Result<Bytes, EntryError> {
        let data = self.open(entry).await?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let end = start.saturating_add(len).min(data.len());
        Ok(data.slice(start..end))
    }

    pub async fn metadata(&self, entry: &EntryRef) -> Result<Arc<JsonObject>, EntryError> {
        let value = self
            .dispatch(entry, CacheOp::Metadata, |entry| async move {
                Ok(CachedValue::Metadata(Arc::new(entry.metadata().await?)))
            })
            .await?;

        match value {
            CachedValue::Metadata(meta) => Ok(meta),
            _ => Err(mismatch(CacheOp::Metadata)),
        }
    }

    /// Follow the content of `entry`. Never cached.
    pub async fn stream(&self, entry: &EntryRef) -> Result<ByteStream, EntryError> {
        detached(entry, Action::Stream, |entry| async move {
            let streamable = entry
                .as_streamable()
                .ok_or_else(|| entry.unsupported(Action::Stream))?;
            streamable.stream().await
        })
        .await
    }

    /// Delete `entry`. Never cached; on success the entry's own results and
    ///  its parent's listing are dropped.
    pub async fn delete(&self, entry: &EntryRef) -> Result<bool, EntryError> {
        let deleted = detached(entry, Action::Delete, |entry| async move {
            let deletable = entry
                .as_deletable()
                .ok_or_else(|| entry.unsupported(Action::Delete))?;
            deletable.delete().await
        })
        .await?;

        let id = entry.base().cache_id();
        for op in CacheOp::ALL {
            self.store
                .invalidate(&CacheKey { id: id.clone(), op })
                .await;
        }
        if let Some(parent) = id.stable().and_then(StableId::parent) {
            self.invalidate_listing(parent).await;
        }
        Ok(deleted)
    }

    /// Drop the listing that holds `dir`'s children. A parent that does not
    ///  cache List answers from state captured by its own parent's listing,
    ///  so keep walking up until a cached listing was dropped.
    async fn invalidate_listing(&self, dir: StableId) {
        let mut next = Some(dir);
        while let Some(dir) = next {
            let key = CacheKey {
                id: CacheId::Stable(dir.clone()),
                op: CacheOp::List,
            };
            let cached = self.store.contains_key(&key);
            self.store.invalidate(&key).await;
            if cached {
                tracing::debug!(listing = %dir, "dropped listing after delete");
                return;
            }
            next = dir.parent();
        }
    }

    /// Drop every cached result at or below `id`
    pub fn clear(&self, id: &StableId) -> Result<(), EntryError> {
        let id = id.clone();
        self.store
            .invalidate_entries_if(move |key, _| {
                key.id.stable().is_some_and(|cached| id.contains(cached))
            })
            .map(|_| ())
            .map_err(|err| EntryError::Internal(format!("failed to clear cache: {err}")))
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.run_pending_tasks().await;
        CacheStats {
            entry_count: self.store.entry_count(),
        }
    }

    async fn dispatch<F, Fut>(
        &self,
        entry: &EntryRef,
        op: CacheOp,
        compute: F,
    ) -> Result<CachedValue, EntryError>
    where
        F: FnOnce(EntryRef) -> Fut,
        Fut: Future<Output = Result<CachedValue, EntryError>> + Send + 'static,
    {
        let ttl = match entry.base().ttl_of(op) {
            Ttl::Disabled => return detached(entry, op.action(), compute).await,
            Ttl::For(ttl) => ttl,
        };

        let key = CacheKey {
            id: entry.base().cache_id(),
            op,
        };
        if let Some(cached) = self.store.get(&key).await {
            if cached.is_fresh() {
                return Ok(cached.value);
            }
            self.store.invalidate(&key).await;
        }

        tracing::debug!(entry = %key.id, op = %op, "cache miss");
        let init = async {
            let value = detached(entry, op.action(), compute).await?;
            Ok(Cached {
                value,
                inserted_at: Instant::now(),
                ttl,
            })
        };
        self.store
            .try_get_with(key, init)
            .await
            .map(|cached| cached.value)
            .map_err(|err: Arc<EntryError>| (*err).clone())
    }
}

impl Default for ActionCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

/// Run a backend call on its own task, attaching entry and action context
///  to whatever it fails with.
async fn detached<T, F, Fut>(entry: &EntryRef, action: Action, call: F) -> Result<T, EntryError>
where
    F: FnOnce(EntryRef) -> Fut,
    Fut: Future<Output = Result<T, EntryError>> + Send + 'static,
    T: Send + 'static,
{
    let path = entry.base().path();
    match tokio::spawn(call(entry.clone())).await {
        Ok(result) => result.map_err(|err| err.in_context(&path, action)),
        Err(err) => Err(EntryError::Internal(format!(
            "{action} {path}: backend task failed: {err}"
        ))),
    }
}

fn assign_identities(
    parent: &EntryRef,
    listed: Vec<EntryRef>,
) -> Result<BTreeMap<String, EntryRef>, EntryError> {
    // children of an ephemeral parent stay ephemeral
    let parent_id = parent.base().stable_id().cloned();
    let mut children = BTreeMap::new();

    for child in listed {
        let cname = child.cname().to_string();
        if let Some(parent_id) = &parent_id {
            let id = parent_id.child(&cname);
            if !child.base().assign_stable_id(id.clone()) && child.base().stable_id() != Some(&id) {
                tracing::debug!(
                    child = %child.base().path(),
                    listed_as = %id,
                    "child already carries a different stable id"
                );
            }
        }
        match children.entry(cname) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(child);
            }
            btree_map::Entry::Occupied(slot) => {
                return Err(EntryError::DuplicateCanonicalName {
                    parent: parent.base().path(),
                    cname: slot.key().clone(),
                });
            }
        }
    }
    Ok(children)
}

fn mismatch(op: CacheOp) -> EntryError {
    EntryError::Internal(format!("cached value does not match {op} operation"))
}
