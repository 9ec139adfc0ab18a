/**
 * Dispatch layer in front of every entry.
 *  Caches List, Open and Metadata results with
 *  a TTL per entry and operation, and folds
 *  concurrent callers onto one backend call.
 */
pub mod cache;
/**
 * The entry contract: names, identity, attributes
 *  and the capability traits a backend implements
 *  for each action it supports.
 */
pub mod entry;
pub mod error;
/**
 * The registry of backend roots and path
 *  resolution through cached listings.
 */
pub mod namespace;
/**
 * Ephemeral sessions for running commands
 *  against a mounted resource, with guaranteed
 *  teardown.
 */
pub mod sandbox;
/**
 * In-memory doubles for entries and schedulers.
 */
pub mod testkit;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;
/**
 * Filesystem view over anything that can run
 *  commands: tree walks parsed from stat output,
 *  rendered as directory and file entries.
 */
pub mod volume;

pub mod prelude {
    pub use crate::cache::{ActionCache, CacheConfig, Children};
    pub use crate::entry::{
        Action, ActionSet, Attributes, ByteStream, CacheOp, Deletable, Entry, EntryBase,
        EntryError, EntryRef, JsonObject, Parent, Readable, StableId, Streamable, Ttl,
    };
    pub use crate::error::BackendError;
    pub use crate::namespace::{Namespace, Registry};
    pub use crate::sandbox::{
        LocalScheduler, MountMode, Orchestrator, SandboxError, SandboxPolicy, Scheduler,
        SessionSpec,
    };
    pub use crate::version::BuildInfo;
    pub use crate::volume::{DirMap, ExecVolume, StatError, Volume, VolumeEntry};
}
