use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use basalt_provider::{Provider, ProviderConfig};

#[derive(Parser)]
#[command(name = "basaltd", about = "Basalt volume provider daemon", version)]
struct Basaltd {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cluster endpoints handed to volume consumers.
    #[arg(long)]
    monitors: Option<String>,

    /// Backend entity whose credentials consumers attach with.
    #[arg(long)]
    client: Option<String>,

    /// Storage pool that holds provisioned volumes.
    #[arg(long)]
    pool: Option<String>,

    /// Parallel reconciliation workers.
    #[arg(long)]
    workers: Option<usize>,
}

impl Basaltd {
    /// Configuration file first, then flag overrides.
    fn provider_config(&self) -> anyhow::Result<ProviderConfig> {
        let mut config = match &self.config {
            Some(path) => ProviderConfig::load(path)?,
            None => ProviderConfig::default(),
        };
        if let Some(monitors) = &self.monitors {
            config.monitors = monitors.clone();
        }
        if let Some(client) = &self.client {
            config.client = client.clone();
        }
        if let Some(pool) = &self.pool {
            config.pool = pool.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Basaltd::parse();

    let provider = Provider::new(args.provider_config()?)?;
    provider.start();
    info!("basaltd running, press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    provider.shutdown().await;
    Ok(())
}
