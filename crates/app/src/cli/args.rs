pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "canopy")]
#[command(about = "Browse, read and follow files inside volumes")]
pub struct Args {
    /// Path to the canopy config directory (defaults to ~/.canopy)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
