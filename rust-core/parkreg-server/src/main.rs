//! Parking-lot vehicle registry server.

mod logger;

use anyhow::Context;
use clap::Parser;
use parkreg_core::{api, store, Config, VehicleRegistry};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "parkreg-server", version, about = "Parking-lot vehicle registry")]
struct Args {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `server.address`
    #[arg(short, long)]
    address: Option<SocketAddr>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(address) = self.address {
            config.server.address = address;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = args.load_config()?;

    logger::init(&config.log, args.verbose);
    tracing::info!(version = parkreg_core::VERSION, "Starting parkreg-server");
    tracing::debug!(?config, "Effective configuration");

    let store = store::open(&config.store)
        .await
        .context("opening record store")?;
    tracing::info!(
        backend = store.backend(),
        car = ?config.capacity.car,
        motorcycle = ?config.capacity.motorcycle,
        "Record store ready"
    );

    let registry = Arc::new(VehicleRegistry::new(store, config.capacity));
    let server = api::app(&config, registry).context("building HTTP routes")?;
    server.serve().await.context("serving HTTP")?;

    tracing::info!("parkreg-server stopped");
    Ok(())
}
