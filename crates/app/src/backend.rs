//! Namespace over the host directories named in the config.
//!
//! Every volume is walked and read by running `find`, `stat`, `cat` and
//! `tail` as local child processes, the same commands a remote session
//! would run against a mounted volume.

use std::sync::Arc;

use async_trait::async_trait;
use common::namespace::Registry;
use common::prelude::*;

use crate::state::{AppConfig, VolumeConfig};

/// Parent of every configured volume, mounted at `/volumes`
pub struct Volumes {
    base: EntryBase,
    volumes: Vec<VolumeConfig>,
    orchestrator: Orchestrator<LocalScheduler>,
    max_depth: usize,
}

impl Volumes {
    pub fn new(config: &AppConfig) -> Result<Self, EntryError> {
        let orchestrator = Orchestrator::new(Arc::new(LocalScheduler::new()))
            .with_policy(config.sandbox_policy());
        Ok(Self {
            base: EntryBase::new("volumes")?,
            volumes: config.volumes.clone(),
            orchestrator,
            max_depth: config.sandbox.max_depth,
        })
    }

    fn volume(&self, config: &VolumeConfig) -> anyhow::Result<VolumeEntry> {
        anyhow::ensure!(
            config.path.is_dir(),
            "{} is not a directory",
            config.path.display()
        );
        let path = config
            .path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("{} is not valid UTF-8", config.path.display()))?;

        let volume = ExecVolume::new(self.orchestrator.clone(), config.name.clone())
            .with_mountpoint(path)
            .with_max_depth(self.max_depth);
        Ok(VolumeEntry::new(config.name.clone(), Arc::new(volume))?)
    }
}

impl Entry for Volumes {
    fn base(&self) -> &EntryBase {
        &self.base
    }

    fn as_parent(&self) -> Option<&dyn Parent> {
        Some(self)
    }
}

#[async_trait]
impl Parent for Volumes {
    async fn list(&self) -> Result<Vec<EntryRef>, EntryError> {
        let mut entries = Vec::with_capacity(self.volumes.len());
        for config in &self.volumes {
            match self.volume(config) {
                Ok(volume) => {
                    let entry: EntryRef = Arc::new(volume);
                    entries.push(entry);
                }
                Err(err) => {
                    tracing::warn!(volume = %config.name, error = %err, "skipping volume");
                }
            }
        }
        Ok(entries)
    }
}

/// Build the namespace served by the CLI
pub fn namespace(config: &AppConfig) -> Result<Namespace, EntryError> {
    let registry = Registry::new()?;
    registry.register(Arc::new(Volumes::new(config)?))?;
    Ok(Namespace::new(
        Arc::new(registry),
        ActionCache::new(config.cache_config()),
    ))
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    fn config(volumes: Vec<VolumeConfig>) -> AppConfig {
        AppConfig {
            volumes,
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_volumes_are_listed_and_read() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("a.txt"), "hello").unwrap();

        let ns = namespace(&config(vec![
            VolumeConfig {
                name: "data".to_string(),
                path: temp.path().to_path_buf(),
            },
            VolumeConfig {
                name: "gone".to_string(),
                path: temp.path().join("missing"),
            },
        ]))
        .unwrap();

        let volumes = ns.list("/volumes").await.unwrap();
        assert_eq!(volumes.keys().collect::<Vec<_>>(), vec!["data"]);
        assert!(volumes["data"].supports(Action::VolumeList));

        let files = ns.list("/volumes/data").await.unwrap();
        assert_eq!(files.keys().collect::<Vec<_>>(), vec!["a.txt"]);
        assert_eq!(&ns.read_all("/volumes/data/a.txt").await.unwrap()[..], b"hello");
    }

    #[tokio::test]
    async fn test_delete_removes_host_file() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("a.txt"), "hello").unwrap();

        let ns = namespace(&config(vec![VolumeConfig {
            name: "data".to_string(),
            path: temp.path().to_path_buf(),
        }]))
        .unwrap();

        assert!(ns.delete("/volumes/data/a.txt").await.unwrap());
        assert!(!temp.path().join("a.txt").exists());
        assert!(ns.list("/volumes/data").await.unwrap().is_empty());
    }
}
