use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sync::SessionEvent;
use sync_net::{NetEvent, RelayClient, RelayServer};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sync")]
#[command(about = "Live directory co-editing over a relay server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Host a session: start a relay server and join it with this directory
    Host {
        /// Directory to share
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Address to bind; defaults to this machine's LAN address
        #[arg(long)]
        addr: Option<IpAddr>,
        /// TCP port; blank or out-of-range values fall back to the default
        #[arg(long, default_value = "54555")]
        port: String,
        /// Display name shown to other peers
        #[arg(long, default_value = "")]
        name: String,
        /// Also honor the project's .gitignore
        #[arg(long)]
        gitignore: bool,
    },
    /// Join a session hosted elsewhere
    Join {
        /// Host address to connect to
        addr: String,
        /// Directory to synchronize into
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// TCP port; blank or out-of-range values fall back to the default
        #[arg(long, default_value = "54555")]
        port: String,
        /// Display name shown to other peers
        #[arg(long, default_value = "")]
        name: String,
        /// Also honor the project's .gitignore
        #[arg(long)]
        gitignore: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Host { dir, addr, port, name, gitignore } => {
            let addr = addr.unwrap_or_else(sync_net::lan_ip);
            let port = sync_net::validate_port(&port);
            let server = RelayServer::host(addr, port).await?;
            let bound = server.local_addr();
            info!("hosting on {bound}");

            // The host participates like any other peer, through a local
            // client connection to its own relay.
            let client = RelayClient::connect(&bound.ip().to_string(), bound.port(), &name).await?;
            run_session(client, dir, gitignore).await?;
            server.close();
        }
        Commands::Join { addr, dir, port, name, gitignore } => {
            let port = sync_net::validate_port(&port);
            let client = RelayClient::connect(&addr, port, &name).await?;
            info!("joined {addr}:{port}");
            run_session(client, dir, gitignore).await?;
        }
    }
    Ok(())
}

/// Bridges one project session to one relay connection until ctrl-c or the
/// connection drops.
async fn run_session(client: RelayClient, dir: PathBuf, honor_gitignore: bool) -> Result<()> {
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (session, mut events) = sync::start_project(&dir, honor_gitignore, out_tx).await?;
    let mut net_events = client.take_events().context("event stream already claimed")?;
    info!("syncing {} as {:?}", session.root().display(), client.name());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            Some(packet) = out_rx.recv() => {
                if client.send(packet).is_err() {
                    warn!("connection lost while sending");
                    break;
                }
            }
            event = net_events.recv() => match event {
                Some(NetEvent::Connected { id }) => info!("connected as peer #{id}"),
                Some(NetEvent::Message(packet)) => session.interpret(packet).await,
                Some(NetEvent::Disconnected) | None => {
                    warn!("disconnected from relay");
                    break;
                }
            },
            Some(event) = events.recv() => match event {
                SessionEvent::PeerConnected(peer) => info!("{} joined as #{}", peer.name, peer.id),
                SessionEvent::PeerDisconnected { id } => info!("peer #{id} left"),
                SessionEvent::Desynchronized { path, message } => {
                    error!("{} may be desynchronized: {message}", path.display());
                }
            },
        }
    }

    session.close();
    client.close();
    Ok(())
}
