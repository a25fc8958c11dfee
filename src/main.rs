//! cellstore server binary

use cellstore::{CellStoreServer, Result, ServerConfig};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cellstore-server", version, about = "In-memory data-structure store")]
struct Args {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:6379
    #[arg(short, long)]
    bind: Option<String>,

    #[arg(long)]
    max_connections: Option<usize>,

    /// Only expire keys when they are accessed
    #[arg(long)]
    no_active_expiry: bool,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(max) = self.max_connections {
            config.max_connections = max;
        }
        if self.no_active_expiry {
            config.active_expiry = false;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Args::parse().into_config()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let server = Arc::new(CellStoreServer::new(config)?);

    let server_clone = Arc::clone(&server);
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            return;
        }

        info!("received ctrl-c, initiating graceful shutdown");
        if let Err(e) = server_clone.shutdown() {
            error!(error = %e, "failed to initiate shutdown");
        }
    });

    server.run().await
}
