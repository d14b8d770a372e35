use std::path::PathBuf;

use clap::Parser;

/// The API and worker pool run as one process; there is no separate worker
/// subcommand (SPEC_FULL.md §2 Process topology).
#[derive(Parser, Debug)]
#[command(name = "demo2apk")]
#[command(about = "HTML/zip to Android APK build service", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file (overrides DEMO2APK_CONFIG).
    #[arg(long)]
    pub config: Option<PathBuf>,
}
