use std::net::IpAddr;

use anyhow::Result;
use clap::Parser;
use sync_net::RelayServer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sync-server")]
#[command(about = "Standalone relay server for sync sessions")]
struct Cli {
    /// Address to bind; defaults to this machine's LAN address
    #[arg(long)]
    addr: Option<IpAddr>,

    /// TCP port; blank or out-of-range values fall back to the default
    #[arg(long, default_value = "54555")]
    port: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let addr = cli.addr.unwrap_or_else(sync_net::lan_ip);
    let port = sync_net::validate_port(&cli.port);

    let server = RelayServer::host(addr, port).await?;
    info!("relaying on {}", server.local_addr());

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    server.close();
    Ok(())
}
