//! sbomwatch-daemon entry point.
//!
//! Parses CLI arguments, loads and validates configuration, initializes
//! logging, and hands control to the orchestrator.

use anyhow::Result;
use clap::Parser;

use sbomwatch_core::config::SbomwatchConfig;
use sbomwatch_daemon::cli::DaemonCli;
use sbomwatch_daemon::logging;
use sbomwatch_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // Config file -> env overrides -> CLI overrides
    let mut config = SbomwatchConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }
    if let Some(pid_file) = cli.pid_file {
        config.general.pid_file = pid_file;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "sbomwatch-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await?;

    tracing::info!("sbomwatch-daemon shut down");
    Ok(())
}
