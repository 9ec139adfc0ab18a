use std::sync::Arc;

use async_trait::async_trait;

use crate::entry::{CacheOp, Deletable, Entry, EntryBase, EntryError, EntryRef, Parent};

use super::{Snapshot, StatRecord, Volume, LIST_TTL};

/// A directory inside a volume.
///
/// Directories whose contents were captured by the walk that found them
///  list straight from that walk, so their List result is never cached.
///  Anything deeper walks the volume again.
pub struct VolumeDir {
    base: EntryBase,
    volume: Arc<dyn Volume>,
    path: String,
    snapshot: Snapshot,
    key: String,
}

impl VolumeDir {
    pub(crate) fn new(
        volume: Arc<dyn Volume>,
        record: &StatRecord,
        path: String,
        snapshot: Snapshot,
        key: String,
    ) -> Result<Self, EntryError> {
        let mut base = EntryBase::new(record.name.clone())?.with_attributes(record.attributes());
        if snapshot.is_explored(&key) {
            base.disable_caching(CacheOp::List);
        } else {
            base.set_ttl(CacheOp::List, LIST_TTL);
        }

        Ok(Self {
            base,
            volume,
            path,
            snapshot,
            key,
        })
    }

    /// Path of the directory relative to the volume root
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Entry for VolumeDir {
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
impl Parent for VolumeDir {
    async fn list(&self) -> Result<Vec<EntryRef>, EntryError> {
        if self.snapshot.is_explored(&self.key) {
            return self.snapshot.children(&self.volume, &self.key);
        }
        super::list(&self.volume, &self.path).await
    }
}

#[async_trait]
impl Deletable for VolumeDir {
    async fn delete(&self) -> Result<bool, EntryError> {
        self.volume.volume_delete(&self.path).await
    }
}
