//! Shared test utilities for cache, volume and sandbox integration tests
#![allow(dead_code)]

use std::sync::Arc;

use common::namespace::Registry;
use common::prelude::*;
use common::testkit::FakeScheduler;

pub const MOUNTPOINT: &str = "/mnt";

/// Install a subscriber once so `RUST_LOG=debug` shows what a failing test did
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// The tree used by the volume scenarios:
///  `a.txt` (10 bytes), `b/`, `b/c.txt`
pub fn scenario_scheduler() -> FakeScheduler {
    FakeScheduler::new(MOUNTPOINT)
        .with_file("a.txt", "0123456789")
        .with_file("b/c.txt", "see")
}

pub fn exec_volume(scheduler: &Arc<FakeScheduler>, max_depth: usize) -> Arc<dyn Volume> {
    let orchestrator = Orchestrator::new(scheduler.clone());
    Arc::new(ExecVolume::new(orchestrator, "data").with_max_depth(max_depth))
}

/// A namespace with a single volume mounted at `/data`
pub fn volume_namespace(volume: Arc<dyn Volume>) -> Namespace {
    let registry = Registry::new().unwrap();
    registry
        .register(Arc::new(VolumeEntry::new("data", volume).unwrap()))
        .unwrap();
    Namespace::new(Arc::new(registry), ActionCache::default())
}

/// Discover `entry` through a listing, so it carries the stable id
///  `/<cname>` the way backend roots do.
pub async fn discover(cache: &ActionCache, entry: EntryRef) -> EntryRef {
    let registry = Arc::new(Registry::new().unwrap());
    registry.register(entry.clone()).unwrap();
    let root: EntryRef = registry;

    let children = cache.list(&root).await.unwrap();
    children[entry.cname()].clone()
}
