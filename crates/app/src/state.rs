use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use common::prelude::{CacheConfig, SandboxPolicy};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "canopy";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default log directive, `RUST_LOG` overrides it
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for daily log files (stderr only if not set)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub sandbox: SandboxSection,
    #[serde(default)]
    pub volumes: Vec<VolumeConfig>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: None,
            cache: CacheSection::default(),
            sandbox: SandboxSection::default(),
            volumes: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn log_level(&self) -> Result<tracing::Level, StateError> {
        tracing::Level::from_str(&self.log_level)
            .map_err(|_| StateError::InvalidLogLevel(self.log_level.clone()))
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_capacity: self.cache.max_capacity,
        }
    }

    pub fn sandbox_policy(&self) -> SandboxPolicy {
        SandboxPolicy {
            timeout: Duration::from_secs(self.sandbox.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSection {
    /// Maximum number of cached results
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

fn default_max_capacity() -> u64 {
    CacheConfig::default().max_capacity
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxSection {
    /// How long a command may take before its session is abandoned
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Depth of a single volume walk
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_timeout_secs() -> u64 {
    SandboxPolicy::default().timeout.as_secs()
}

fn default_max_depth() -> usize {
    10
}

impl Default for SandboxSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_depth: default_max_depth(),
        }
    }
}

/// A host directory exposed as a volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeConfig {
    pub name: String,
    pub path: PathBuf,
}

impl FromStr for VolumeConfig {
    type Err = StateError;

    /// Parse `NAME=PATH`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((name, path)) if !name.is_empty() && !path.is_empty() => Ok(Self {
                name: name.to_string(),
                path: PathBuf::from(path),
            }),
            _ => Err(StateError::InvalidVolume(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the canopy directory (~/.canopy)
    pub canopy_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the canopy directory path (custom or default ~/.canopy)
    pub fn canopy_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new canopy directory with the given config
    pub fn init(custom_path: Option<PathBuf>, config: AppConfig) -> Result<Self, StateError> {
        let canopy_dir = Self::canopy_dir(custom_path)?;
        let config_path = canopy_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        // validate before anything is written
        config.log_level()?;
        fs::create_dir_all(&canopy_dir)?;
        fs::write(&config_path, toml::to_string_pretty(&config)?)?;

        Ok(Self {
            canopy_dir,
            config_path,
            config,
        })
    }

    /// Load existing state from the canopy directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let canopy_dir = Self::canopy_dir(custom_path)?;
        let config_path = canopy_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::NotInitialized);
        }

        let config = read_config(&config_path)?;
        Ok(Self {
            canopy_dir,
            config_path,
            config,
        })
    }

    /// Load existing state, or the defaults if the directory was never initialized
    pub fn load_or_default(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        match Self::load(custom_path.clone()) {
            Err(StateError::NotInitialized) => {
                let canopy_dir = Self::canopy_dir(custom_path)?;
                Ok(Self {
                    config_path: canopy_dir.join(CONFIG_FILE_NAME),
                    canopy_dir,
                    config: AppConfig::default(),
                })
            }
            other => other,
        }
    }
}

fn read_config(path: &Path) -> Result<AppConfig, StateError> {
    let config: AppConfig = toml::from_str(&fs::read_to_string(path)?)?;
    config.log_level()?;
    Ok(config)
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("canopy directory not initialized. Run 'canopy init' first")]
    NotInitialized,

    #[error("canopy directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("invalid volume {0:?}, expected NAME=PATH")]
    InvalidVolume(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
