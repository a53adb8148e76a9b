use anyhow::Context;
use clap::Parser;
use modestdb::{Server, ServerConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Multi-client SQL database server
#[derive(Parser, Debug)]
#[command(name = "modestdb", version, about)]
struct Args {
    /// JSON settings file ({"Host","Port","Root","MaxSessions","BlockSize"})
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Directory holding the database files
    #[arg(long)]
    root: Option<PathBuf>,

    #[arg(long)]
    max_sessions: Option<usize>,

    /// Block size for newly created databases
    #[arg(long)]
    block_size: Option<u32>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)
                .with_context(|| format!("loading settings from {}", path.display()))?,
            None => ServerConfig::default(),
        };
        config = config.apply_env().context("reading MODESTDB_* environment")?;

        if let Some(host) = &self.host {
            config = config.host(host);
        }
        if let Some(port) = self.port {
            config = config.port(port);
        }
        if let Some(root) = self.root {
            config = config.root(root);
        }
        if let Some(max) = self.max_sessions {
            config = config.max_sessions(max);
        }
        if let Some(block_size) = self.block_size {
            config = config.block_size(block_size);
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("modestdb=info")),
        )
        .init();

    let config = Args::parse().into_config()?;
    let root = config.root.clone();

    let server = Server::start(config)
        .await
        .with_context(|| format!("starting server with root {}", root.display()))?;
    println!("ModestDB listening on {}", server.local_addr());

    tokio::signal::ctrl_c().await.context("waiting for Ctrl+C")?;
    server.shutdown().await.context("shutting down")?;
    Ok(())
}
