mod cli;

use clap::Parser;
use cli::Cli;
use demo2apk::api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if let Some(config_path) = cli.config {
        // SAFETY: set once at startup before any other thread reads env vars.
        unsafe {
            std::env::set_var("DEMO2APK_CONFIG", config_path);
        }
    }

    api::run().await
}
