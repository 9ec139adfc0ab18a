use async_trait::async_trait;
use bytes::Bytes;

use crate::entry::{ByteStream, EntryError};
use crate::sandbox::{MountMode, Orchestrator, Scheduler, SessionSpec};

use super::{parse_stat_output, stat_cmd, DirMap, Volume};

/// A volume reached by running commands in sessions that mount it.
///
/// List walks the tree with `find` + `stat`, Read runs `cat`, Stream runs
///  `tail -f` and Delete runs `rm -rf`. Only Delete mounts the volume
///  read-write.
pub struct ExecVolume<S: Scheduler> {
    orchestrator: Orchestrator<S>,
    target: String,
    mountpoint: String,
    max_depth: usize,
}

impl<S: Scheduler> ExecVolume<S> {
    pub const DEFAULT_MOUNTPOINT: &'static str = "/mnt";
    /// Volumes have relatively few files and walks are slow, so walk deep
    pub const DEFAULT_MAX_DEPTH: usize = 10;

    pub fn new(orchestrator: Orchestrator<S>, target: impl Into<String>) -> Self {
        Self {
            orchestrator,
            target: target.into(),
            mountpoint: Self::DEFAULT_MOUNTPOINT.to_string(),
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }

    /// Where the target is mounted inside the session. `/` is kept as is.
    pub fn with_mountpoint(mut self, mountpoint: impl Into<String>) -> Self {
        let mountpoint = mountpoint.into();
        let trimmed = mountpoint.trim_end_matches('/');
        self.mountpoint = if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        };
        self
    }

    /// Depth of a single walk, at least 1
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn mountpoint(&self) -> &str {
        &self.mountpoint
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn spec(&self, mount: MountMode, command: Vec<String>) -> SessionSpec {
        SessionSpec {
            target: self.target.clone(),
            mountpoint: self.mountpoint.clone(),
            mount,
            command,
        }
    }

    /// Mountpoint as a path prefix, empty when mounted at `/`
    fn prefix(&self) -> &str {
        self.mountpoint.trim_end_matches('/')
    }

    fn full_path(&self, path: &str) -> String {
        let full = format!("{}{}", self.prefix(), path);
        if full.is_empty() {
            "/".to_string()
        } else {
            full
        }
    }
}

#[async_trait]
impl<S: Scheduler> Volume for ExecVolume<S> {
    async fn volume_list(&self, path: &str) -> Result<DirMap, EntryError> {
        let command = stat_cmd(&self.full_path(path), self.max_depth);
        let output = self
            .orchestrator
            .run(&self.spec(MountMode::ReadOnly, command))
            .await?;
        Ok(parse_stat_output(
            &output.output,
            self.prefix(),
            path,
            self.max_depth,
        )?)
    }

    async fn volume_read(&self, path: &str) -> Result<Bytes, EntryError> {
        let command = vec!["cat".to_string(), self.full_path(path)];
        let output = self
            .orchestrator
            .run(&self.spec(MountMode::ReadOnly, command))
            .await?;
        Ok(output.output)
    }

    async fn volume_stream(&self, path: &str) -> Result<ByteStream, EntryError> {
        let command = vec!["tail".to_string(), "-f".to_string(), self.full_path(path)];
        tracing::debug!(volume = %self.target, path = %self.full_path(path), "streaming");
        Ok(self
            .orchestrator
            .stream(&self.spec(MountMode::ReadOnly, command))
            .await?)
    }

    async fn volume_delete(&self, path: &str) -> Result<bool, EntryError> {
        let command = vec!["rm".to_string(), "-rf".to_string(), self.full_path(path)];
        self.orchestrator
            .run(&self.spec(MountMode::ReadWrite, command))
            .await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::testkit::FakeScheduler;

    #[tokio::test]
    async fn test_mount_modes() {
        let scheduler = Arc::new(FakeScheduler::new("/mnt").with_file("a.txt", "a"));
        let volume = ExecVolume::new(Orchestrator::new(scheduler.clone()), "data");

        volume.volume_read("/a.txt").await.unwrap();
        assert!(volume.volume_delete("/a.txt").await.unwrap());

        let mounts: Vec<_> = scheduler.specs().iter().map(|spec| spec.mount).collect();
        assert_eq!(mounts, vec![MountMode::ReadOnly, MountMode::ReadWrite]);
        assert!(!scheduler.exists("a.txt"));
    }

    #[tokio::test]
    async fn test_root_mountpoint() {
        let scheduler = Arc::new(FakeScheduler::new("/mnt"));
        let volume = ExecVolume::new(Orchestrator::new(scheduler.clone()), "data")
            .with_mountpoint("/");
        assert_eq!(volume.mountpoint(), "/");

        // the fake has nothing at /, only the issued commands matter
        let _ = volume.volume_list("").await;
        let _ = volume.volume_read("/a.txt").await;

        let specs = scheduler.specs();
        assert_eq!(specs[0].command[..2], ["find", "/"]);
        assert_eq!(specs[0].mountpoint, "/");
        assert_eq!(specs[1].command, vec!["cat", "/a.txt"]);
    }

    #[test]
    fn test_root_mountpoint_walk_parses() {
        let output = "10 1700000000 1700000000 1700000000 81a4 /a.txt\n\
                      4096 1700000000 1700000000 1700000000 41ed /b\n";
        let map = parse_stat_output(output.as_bytes(), "", "", 2).unwrap();
        assert_eq!(map.paths().collect::<Vec<_>>(), vec!["a.txt", "b"]);
    }

    #[tokio::test]
    async fn test_mountpoint_trailing_slash_and_min_depth() {
        let scheduler = Arc::new(FakeScheduler::new("/srv/data"));
        let volume = ExecVolume::new(Orchestrator::new(scheduler.clone()), "data")
            .with_mountpoint("/srv/data/")
            .with_max_depth(0);

        assert_eq!(volume.max_depth(), 1);
        volume.volume_list("").await.unwrap();
        assert_eq!(
            scheduler.specs()[0].command[..6],
            ["find", "/srv/data", "-mindepth", "1", "-maxdepth", "1"]
        );
    }
}
