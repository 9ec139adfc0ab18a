use std::path::PathBuf;

use clap::Args;

use crate::state::{AppConfig, AppState, VolumeConfig};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Host directory to expose as a volume, repeatable
    #[arg(long = "volume", value_name = "NAME=PATH")]
    pub volumes: Vec<VolumeConfig>,

    /// Default log level
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Directory for log files (logs to stderr only if not set)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] crate::state::StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = AppConfig {
            log_level: self.log_level.clone(),
            log_dir: self.log_dir.clone(),
            volumes: self.volumes.clone(),
            ..AppConfig::default()
        };

        let state = AppState::init(ctx.config_path.clone(), config)?;

        let volumes = if state.config.volumes.is_empty() {
            "none".to_string()
        } else {
            state
                .config
                .volumes
                .iter()
                .map(|volume| format!("{} ({})", volume.name, volume.path.display()))
                .collect::<Vec<_>>()
                .join(", ")
        };

        Ok(format!(
            "Initialized canopy directory at: {}\n\
             - Config: {}\n\
             - Volumes: {}",
            state.canopy_dir.display(),
            state.config_path.display(),
            volumes
        ))
    }
}
