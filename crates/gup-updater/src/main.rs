//! gup - Gazetteer index updater

use anyhow::Result;
use clap::Parser;
use gup_common::logging::{init_logging, LogConfig, LogLevel};
use gup_updater::{UpdateConfig, Updater};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "gup")]
#[command(author, version, about = "Gazetteer index updater")]
struct Cli {
    /// Path to the update configuration (YAML)
    config: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging based on verbose flag; environment variables
    // take precedence
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("gup".to_string())
        .build()
        .from_env()?;

    init_logging(&log_config)?;

    info!("Starting gazetteer index update");

    let config = UpdateConfig::load(&cli.config)?;
    info!(
        "Configuration loaded: {} tasks against {}",
        config.tasks.len(),
        config.gazetteer_api.url
    );

    let report = Updater::new(config).run().await?;

    info!("Update finished: {} tasks processed", report.total());
    Ok(())
}
