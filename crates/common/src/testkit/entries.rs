use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::entry::{
    Action, Attributes, ByteStream, Deletable, Entry, EntryBase, EntryError, EntryRef,
    JsonObject, Parent, Readable, Streamable,
};
use crate::error::BackendError;

/// Number of backend calls an entry has served, per action
#[derive(Debug, Default)]
pub struct CallCounter {
    counts: [AtomicUsize; Action::ALL.len()],
}

impl CallCounter {
    pub fn get(&self, action: Action) -> usize {
        self.counts[action as usize].load(Ordering::SeqCst)
    }

    fn hit(&self, action: Action) {
        self.counts[action as usize].fetch_add(1, Ordering::SeqCst);
    }
}

/// Failure injection shared by the memory entries
#[derive(Debug, Default)]
struct Faults {
    remaining: AtomicUsize,
}

impl Faults {
    fn check(&self, action: Action) -> Result<(), EntryError> {
        let failed = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(BackendError::msg(format!("injected {action} failure")).into());
        }
        Ok(())
    }
}

#[derive(Clone)]
enum MemNode {
    File { name: String, content: Bytes },
    Dir { name: String, children: Vec<MemNode> },
}

impl MemNode {
    fn build(&self) -> Result<EntryRef, EntryError> {
        let entry: EntryRef = match self {
            MemNode::File { name, content } => Arc::new(MemFile::try_new(name, content.clone())?),
            MemNode::Dir { name, children } => Arc::new(MemDir::try_new(name, children.clone())?),
        };
        Ok(entry)
    }

    fn name(&self) -> &str {
        match self {
            MemNode::File { name, .. } | MemNode::Dir { name, .. } => name,
        }
    }
}

/// In-memory directory. Every listing builds fresh child entries, the way
///  a backend client returns fresh objects on every call.
pub struct MemDir {
    base: EntryBase,
    children: Mutex<Vec<MemNode>>,
    calls: CallCounter,
    faults: Faults,
}

impl MemDir {
    /// Panics on an empty name
    pub fn new(name: &str) -> Self {
        Self::try_new(name, Vec::new()).expect("memory entries need a name")
    }

    fn try_new(name: &str, children: Vec<MemNode>) -> Result<Self, EntryError> {
        Ok(Self {
            base: EntryBase::new(name)?,
            children: Mutex::new(children),
            calls: CallCounter::default(),
            faults: Faults::default(),
        })
    }

    pub fn with_file(self, name: &str, content: impl Into<Bytes>) -> Self {
        self.children.lock().push(MemNode::File {
            name: name.to_string(),
            content: content.into(),
        });
        self
    }

    pub fn with_dir(self, dir: MemDir) -> Self {
        let node = MemNode::Dir {
            name: dir.base.name().to_string(),
            children: dir.children.into_inner(),
        };
        self.children.lock().push(node);
        self
    }

    pub fn with_base(mut self, update: impl FnOnce(&mut EntryBase)) -> Self {
        update(&mut self.base);
        self
    }

    /// Drop a child from future listings
    pub fn remove(&self, name: &str) {
        self.children.lock().retain(|child| child.name() != name);
    }

    /// Fail the next `n` backend calls
    pub fn fail_next(&self, n: usize) {
        self.faults.remaining.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> &CallCounter {
        &self.calls
    }
}

impl Entry for MemDir {
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
impl Parent for MemDir {
    async fn list(&self) -> Result<Vec<EntryRef>, EntryError> {
        self.calls.hit(Action::List);
        self.faults.check(Action::List)?;
        let children = self.children.lock().clone();
        children.iter().map(MemNode::build).collect()
    }
}

#[async_trait]
impl Deletable for MemDir {
    async fn delete(&self) -> Result<bool, EntryError> {
        self.calls.hit(Action::Delete);
        self.faults.check(Action::Delete)?;
        self.children.lock().clear();
        Ok(true)
    }
}

/// In-memory file
pub struct MemFile {
    base: EntryBase,
    content: Bytes,
    gate: Option<Arc<Semaphore>>,
    calls: CallCounter,
    faults: Faults,
}

impl MemFile {
    /// Panics on an empty name
    pub fn new(name: &str, content: impl Into<Bytes>) -> Self {
        Self::try_new(name, content.into()).expect("memory entries need a name")
    }

    fn try_new(name: &str, content: Bytes) -> Result<Self, EntryError> {
        let mut attributes = Attributes::new();
        attributes.set_size(content.len() as u64);
        Ok(Self {
            base: EntryBase::new(name)?.with_attributes(attributes),
            content,
            gate: None,
            calls: CallCounter::default(),
            faults: Faults::default(),
        })
    }

    /// Hold every backend call until the semaphore hands out a permit
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_base(mut self, update: impl FnOnce(&mut EntryBase)) -> Self {
        update(&mut self.base);
        self
    }

    pub fn fail_next(&self, n: usize) {
        self.faults.remaining.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> &CallCounter {
        &self.calls
    }

    async fn call(&self, action: Action) -> Result<(), EntryError> {
        self.calls.hit(action);
        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|err| EntryError::Internal(err.to_string()))?;
        }
        self.faults.check(action)
    }
}

#[async_trait]
impl Entry for MemFile {
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

    async fn metadata(&self) -> Result<JsonObject, EntryError> {
        self.call(Action::Metadata).await?;
        Ok(self.base.attributes().to_json())
    }
}

#[async_trait]
impl Readable for MemFile {
    async fn read(&self) -> Result<Bytes, EntryError> {
        self.call(Action::Read).await?;
        Ok(self.content.clone())
    }
}

#[async_trait]
impl Streamable for MemFile {
    async fn stream(&self) -> Result<ByteStream, EntryError> {
        self.call(Action::Stream).await?;
        Ok(ByteStream::from_bytes(self.content.clone()))
    }
}

#[async_trait]
impl Deletable for MemFile {
    async fn delete(&self) -> Result<bool, EntryError> {
        self.call(Action::Delete).await?;
        Ok(true)
    }
}
