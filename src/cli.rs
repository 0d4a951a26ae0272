//! Command-line interface definitions.

use clap::Parser;
use std::path::PathBuf;

/// Build styles, scripts and static files for a PHP site
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// clean | build | dev
    #[arg(default_value = "build")]
    pub command: String,

    /// Project root holding src/, dist/ and tmp/
    #[arg(short, long)]
    pub root: Option<PathBuf>,
}
