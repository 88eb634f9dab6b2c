use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use skimmer::app::{self, Config};
use skimmer::error::Error;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

/// Cross-exchange spot arbitrage engine.
#[derive(Debug, Parser)]
#[command(name = "skimmer", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    config.init_logging();

    info!("skimmer starting");

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = signal::ctrl_c().await;
        info!("Shutdown signal received");
        let _ = stop_tx.send(true);
    });

    match app::run(config, stop_rx).await {
        Ok(()) => {
            info!("skimmer stopped");
            Ok(())
        }
        Err(e @ Error::Stuck(_)) => {
            eprintln!("skimmer halted: {e}");
            eprintln!(
                "Flatten the position manually, delete the stuck marker in the \
                 journal directory, then restart."
            );
            std::process::exit(2);
        }
        Err(e) => Err(e).context("engine failed"),
    }
}
