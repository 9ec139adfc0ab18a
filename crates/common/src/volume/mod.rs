use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::entry::{ByteStream, CacheOp, Entry, EntryBase, EntryError, EntryRef, Parent};

mod dir;
mod dir_map;
mod exec;
mod file;
mod stat;

pub use dir::VolumeDir;
pub use dir_map::{DirMap, StatRecord};
pub use exec::ExecVolume;
pub use file::VolumeFile;
pub use stat::{parse_stat_output, stat_cmd, StatError};

/// List TTL for entries that have to re-walk a volume to list themselves.
///  Walks are slow, so they are cached for longer than the default.
pub const LIST_TTL: Duration = Duration::from_secs(30);

/// Filesystem-like access to a mounted resource.
///
/// Paths are relative to the volume root: `""` is the root itself, anything
///  else starts with `/`.
#[async_trait]
pub trait Volume: Send + Sync + 'static {
    /// Walk the tree under `path`. Keys of the returned map are relative to `path`.
    async fn volume_list(&self, path: &str) -> Result<DirMap, EntryError>;

    async fn volume_read(&self, path: &str) -> Result<Bytes, EntryError>;

    async fn volume_stream(&self, path: &str) -> Result<ByteStream, EntryError>;

    async fn volume_delete(&self, path: &str) -> Result<bool, EntryError>;
}

/// Render the contents of `path` as entries
pub async fn list(volume: &Arc<dyn Volume>, path: &str) -> Result<Vec<EntryRef>, EntryError> {
    let map = volume.volume_list(path).await?;
    let snapshot = Snapshot {
        map: Arc::new(map),
        root: path.to_string(),
    };
    snapshot.children(volume, "")
}

/// A walk of the volume starting at `root`
#[derive(Clone)]
pub(crate) struct Snapshot {
    map: Arc<DirMap>,
    root: String,
}

impl Snapshot {
    /// Volume path of a key in the map
    fn volume_path(&self, key: &str) -> String {
        if key.is_empty() {
            self.root.clone()
        } else {
            format!("{}/{}", self.root, key)
        }
    }

    fn is_explored(&self, key: &str) -> bool {
        self.map.is_explored(key)
    }

    fn children(&self, volume: &Arc<dyn Volume>, key: &str) -> Result<Vec<EntryRef>, EntryError> {
        self.map
            .children(key)
            .map(|(child, record)| {
                let path = self.volume_path(child);
                let entry: EntryRef = if record.is_dir() {
                    Arc::new(VolumeDir::new(
                        volume.clone(),
                        record,
                        path,
                        self.clone(),
                        child.to_string(),
                    )?)
                } else {
                    Arc::new(VolumeFile::new(volume.clone(), record, path)?)
                };
                Ok(entry)
            })
            .collect()
    }
}

/// Namespace root for a whole volume
pub struct VolumeEntry {
    base: EntryBase,
    volume: Arc<dyn Volume>,
}

impl VolumeEntry {
    pub fn new(name: impl Into<String>, volume: Arc<dyn Volume>) -> Result<Self, EntryError> {
        let mut base = EntryBase::new(name)?;
        base.set_ttl(CacheOp::List, LIST_TTL);
        Ok(Self { base, volume })
    }
}

impl Entry for VolumeEntry {
    fn base(&self) -> &EntryBase {
        &self.base
    }

    fn as_parent(&self) -> Option<&dyn Parent> {
        Some(self)
    }

    fn as_volume(&self) -> Option<Arc<dyn Volume>> {
        Some(self.volume.clone())
    }
}

#[async_trait]
impl Parent for VolumeEntry {
    async fn list(&self) -> Result<Vec<EntryRef>, EntryError> {
        list(&self.volume, "").await
    }
}
