/// Test doubles for backends
///
/// This module provides in-memory stand-ins for the two seams a backend
/// plugs into: entries with capability traits, and a session scheduler for
/// exec-based volumes. Both count the backend calls they serve, so tests
/// can assert on caching and cleanup behavior without external
/// infrastructure.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use common::prelude::*;
/// use common::testkit::FakeScheduler;
///
/// #[tokio::test]
/// async fn test_volume_listing() -> anyhow::Result<()> {
///     let scheduler = Arc::new(
///         FakeScheduler::new("/mnt")
///             .with_file("a.txt", "0123456789")
///             .with_file("b/c.txt", "c"),
///     );
///     let volume: Arc<dyn Volume> =
///         Arc::new(ExecVolume::new(Orchestrator::new(scheduler.clone()), "data"));
///
///     let map = volume.volume_list("").await?;
///     assert_eq!(map.len(), 3);
///     assert_eq!(scheduler.deletes(), 1);
///     Ok(())
/// }
/// ```
mod entries;
mod scheduler;

pub use entries::{CallCounter, MemDir, MemFile};
pub use scheduler::FakeScheduler;
