use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::entry::{
    ByteStream, Deletable, Entry, EntryBase, EntryError, Readable, Streamable,
};

use super::{StatRecord, Volume};

/// A file inside a volume
pub struct VolumeFile {
    base: EntryBase,
    volume: Arc<dyn Volume>,
    path: String,
}

impl VolumeFile {
    pub(crate) fn new(
        volume: Arc<dyn Volume>,
        record: &StatRecord,
        path: String,
    ) -> Result<Self, EntryError> {
        let base = EntryBase::new(record.name.clone())?.with_attributes(record.attributes());
        Ok(Self { base, volume, path })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Entry for VolumeFile {
    fn base(&self) -> &EntryBase {
        &self.base
    }

    fn as_readable(&self) -> Option<&dyn Readable> {
        Some(self)
    }

    fn as_streamable(&self) -> Option<&dyn Streamable> {
        Some(self)
    }

    fn as_deletable(&self) -> Option<&dyn Deletable> {
        Some(self)
    }
}

#[async_trait]
impl Readable for VolumeFile {
    async fn read(&self) -> Result<Bytes, EntryError> {
        self.volume.volume_read(&self.path).await
    }
}

#[async_trait]
impl Streamable for VolumeFile {
    async fn stream(&self) -> Result<ByteStream, EntryError> {
        self.volume.volume_stream(&self.path).await
    }
}

#[async_trait]
impl Deletable for VolumeFile {
    async fn delete(&self) -> Result<bool, EntryError> {
        self.volume.volume_delete(&self.path).await
    }
}
