use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

/// Render the GPU cluster usage page once and exit.
#[derive(Debug, Clone, PartialEq, Parser)]
pub struct Args {
    /// TOML settings file, optional
    #[arg(long, default_value = "dashboard.toml")]
    pub config: PathBuf,

    #[arg(long)]
    pub log_level: Option<Level>,
}
