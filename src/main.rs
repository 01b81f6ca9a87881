mod cli;
mod config;
mod error;
mod filter;
mod sync;
mod transport;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use colored::Colorize;
use config::Config;
use error::SyncError;
use filter::IgnoreRules;
use std::time::Duration;
use sync::prompt::StdinPrompt;
use sync::watch::WatchMode;
use sync::SyncEngine;
use tracing_subscriber::{fmt, EnvFilter};
use transport::lftp::LftpTransport;
use transport::Transport;

/// Quiet window for coalescing bursts of events per path.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level().as_str()));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let config = Config::load(&cli.config)?;

    if !config.directories.local.is_dir() {
        anyhow::bail!(
            "Local directory does not exist: {}",
            config.directories.local.display()
        );
    }

    let ignore = IgnoreRules::new(&config.ignore);
    if !config.ignore.is_empty() {
        println!("Loaded ignore patterns: {:?}", config.ignore);
    }

    let transport = LftpTransport::new(config.ftp.clone(), config.directories.remote.clone());

    // One connection probe before any watching begins; a dead endpoint or
    // a missing lftp binary must fail here, not on the first upload.
    match transport.test_connection().await {
        Ok(()) => {
            println!(
                "{} FTP connection to {}:{} OK. Remote dir: {}",
                "✓".green(),
                config.ftp.host,
                config.ftp.port,
                config.directories.remote
            );
        }
        Err(SyncError::Connectivity { output }) => {
            if !output.stdout.trim().is_empty() {
                eprintln!("--- lftp stdout ---");
                eprintln!("{}", output.stdout.trim());
            }
            if !output.stderr.trim().is_empty() {
                eprintln!("--- lftp stderr ---");
                eprintln!("{}", output.stderr.trim());
            }
            anyhow::bail!("FTP connection test failed (exit code {:?})", output.code);
        }
        Err(e) => return Err(e.into()),
    }

    let engine = SyncEngine::new(
        transport,
        StdinPrompt,
        ignore,
        config.directories.local.clone(),
        config.directories.remote.clone(),
        cli.check_conflicts,
    );

    if cli.check_conflicts {
        println!("FTP sync started with conflict resolution enabled. Press Ctrl+C to stop.");
        println!("  When conflicts are detected, you'll be prompted to resolve them.");
    } else {
        println!("FTP sync started (standard mode). Press Ctrl+C to stop.");
        println!("  Use --check-conflicts to enable conflict resolution.");
    }

    WatchMode::new(engine, DEBOUNCE_WINDOW).run().await?;

    println!("\n{}", "Stopped.".bold());
    Ok(())
}
