//! Integration tests for session lifecycles: every session created is torn
//! down exactly once, however the call ends.

mod common;

use std::sync::Arc;
use std::time::Duration;

use ::common::prelude::*;
use ::common::testkit::FakeScheduler;
use futures::StreamExt;

fn spec(command: &[&str]) -> SessionSpec {
    SessionSpec {
        target: "data".to_string(),
        mountpoint: common::MOUNTPOINT.to_string(),
        mount: MountMode::ReadOnly,
        command: command.iter().map(|s| s.to_string()).collect(),
    }
}

/// Let background teardowns run
async fn settle(scheduler: &FakeScheduler) {
    for _ in 0..100 {
        if scheduler.live_sessions() == 0 {
            return;
        }
        tokio::task::yield_now().await;
    }
}

fn assert_torn_down_once(scheduler: &FakeScheduler) {
    assert_eq!(scheduler.creates(), 1);
    assert_eq!(scheduler.deletes(), 1);
    assert_eq!(scheduler.live_sessions(), 0);
}

#[tokio::test]
async fn test_teardown_after_success() {
    common::init_tracing();
    let scheduler = Arc::new(common::scenario_scheduler());
    let orchestrator = Orchestrator::new(scheduler.clone());

    let output = orchestrator.run(&spec(&["cat", "/mnt/b/c.txt"])).await.unwrap();
    assert_eq!(&output.output[..], b"see");
    assert_torn_down_once(&scheduler);
}

#[tokio::test]
async fn test_teardown_after_failure() {
    let scheduler = Arc::new(common::scenario_scheduler());
    let orchestrator = Orchestrator::new(scheduler.clone());

    let err = orchestrator
        .run(&spec(&["stat", "/mnt/a.txt"]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SandboxError::CommandFailed {
            exit_code: Some(127),
            ..
        }
    ));
    assert_eq!(err.to_string(), "sh: stat: not found");
    assert_torn_down_once(&scheduler);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_after_timeout() {
    let scheduler = Arc::new(common::scenario_scheduler().hang());
    let orchestrator = Orchestrator::new(scheduler.clone()).with_policy(SandboxPolicy {
        timeout: Duration::from_secs(5),
    });

    let err = orchestrator
        .run(&spec(&["cat", "/mnt/a.txt"]))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_torn_down_once(&scheduler);
}

#[tokio::test(start_paused = true)]
async fn test_stream_that_never_starts_is_torn_down() {
    let scheduler = Arc::new(common::scenario_scheduler().hang());
    let orchestrator = Orchestrator::new(scheduler.clone()).with_policy(SandboxPolicy {
        timeout: Duration::from_secs(5),
    });

    let result = orchestrator.stream(&spec(&["tail", "-f", "/mnt/a.txt"])).await;
    assert!(matches!(result, Err(SandboxError::Timeout { .. })));
    assert_torn_down_once(&scheduler);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_run_is_torn_down() {
    let scheduler = Arc::new(common::scenario_scheduler().hang());
    let orchestrator = Orchestrator::new(scheduler.clone());

    // the caller gives up long before the session policy would
    let cat = spec(&["cat", "/mnt/a.txt"]);
    let run = orchestrator.run(&cat);
    assert!(tokio::time::timeout(Duration::from_secs(1), run).await.is_err());

    settle(&scheduler).await;
    assert_torn_down_once(&scheduler);
}

#[tokio::test]
async fn test_dropped_stream_is_torn_down() {
    let scheduler = Arc::new(common::scenario_scheduler());
    let orchestrator = Orchestrator::new(scheduler.clone());

    let mut stream = orchestrator
        .stream(&spec(&["tail", "-f", "/mnt/a.txt"]))
        .await
        .unwrap();
    assert_eq!(&stream.next().await.unwrap().unwrap()[..], b"0123456789");
    assert_eq!(scheduler.live_sessions(), 1);

    drop(stream);
    settle(&scheduler).await;
    assert_torn_down_once(&scheduler);
}

#[tokio::test]
async fn test_closed_stream_is_torn_down_once() {
    let scheduler = Arc::new(common::scenario_scheduler());
    let orchestrator = Orchestrator::new(scheduler.clone());

    let stream = orchestrator
        .stream(&spec(&["tail", "-f", "/mnt/a.txt"]))
        .await
        .unwrap();
    stream.close().await;

    // nothing left for a background teardown to do
    tokio::task::yield_now().await;
    assert_torn_down_once(&scheduler);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_local_volume_walks_host_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    std::fs::write(dir.path().join("sub").join("b.txt"), "nested").unwrap();

    let root = dir.path().to_str().unwrap().to_string();
    let orchestrator = Orchestrator::new(Arc::new(LocalScheduler::new()));
    let volume = ExecVolume::new(orchestrator, root.clone()).with_mountpoint(root);

    let map = volume.volume_list("").await.unwrap();
    assert_eq!(map.paths().collect::<Vec<_>>(), vec!["a.txt", "sub", "sub/b.txt"]);
    assert_eq!(map.get("a.txt").unwrap().size, 5);
    assert!(map.is_dir("sub"));

    assert_eq!(&volume.volume_read("/sub/b.txt").await.unwrap()[..], b"nested");
    assert!(volume.volume_read("/missing").await.is_err());
}
