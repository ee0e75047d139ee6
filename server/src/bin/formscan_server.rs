use std::{net::SocketAddr, path::PathBuf};

use anyhow::Result;
use clap::Parser;
use formscan::{config::load_config, FormReader};
use formscan_server::{serve, ServerConfig};
use log::warn;

#[derive(Parser)]
struct Opts {
    /// Configuration file, instead of formscan.toml in the user config directory.
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Set the socket address of the HTTP API, overriding the configuration.
    #[clap(short, long)]
    addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let opts: Opts = Opts::parse();

    let config = load_config(opts.config.as_deref()).unwrap_or_else(|e| {
        warn!("using default configuration: {:#}", e);
        Default::default()
    });
    let mut server_config = ServerConfig::from_section(&config.server)?;
    if let Some(addr) = opts.addr {
        server_config.addr = addr;
    }

    serve(server_config, FormReader::new(config)?).await
}
