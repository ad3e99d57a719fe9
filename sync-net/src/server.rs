//! The fan-out relay server
//!
//! On accept, a peer is assigned a connection id; the first frame it receives
//! is the id grant, followed by a replay of every currently-known identity.
//! Afterwards every frame the peer sends is rebroadcast verbatim to all
//! other peers. Identity packets are additionally recorded in the roster, and
//! a disconnect removes the peer and broadcasts a [`Packet::PeerDisconnected`].

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::packet::{Packet, PeerIdentity};
use crate::wire::PacketCodec;

#[derive(Default)]
struct ServerState {
    peers: Mutex<HashMap<u32, mpsc::UnboundedSender<Packet>>>,
    roster: Mutex<HashMap<u32, String>>,
    next_id: AtomicU32,
}

impl ServerState {
    /// Sends a packet to every peer except `sender_id`.
    fn broadcast_except(&self, sender_id: u32, packet: &Packet) {
        let peers: Vec<mpsc::UnboundedSender<Packet>> = {
            let peers = self.peers.lock();
            peers
                .iter()
                .filter(|(id, _)| **id != sender_id)
                .map(|(_, tx)| tx.clone())
                .collect()
        };
        for tx in peers {
            // A closed channel means the peer is mid-disconnect; its own
            // task handles the cleanup.
            let _ = tx.send(packet.clone());
        }
    }
}

/// A running relay server
pub struct RelayServer {
    local_addr: SocketAddr,
    state: Arc<ServerState>,
    accept_task: JoinHandle<()>,
}

impl RelayServer {
    /// Binds to `addr:port` and starts accepting peers. Bind failures are
    /// returned to the caller; no retry is attempted.
    pub async fn host(addr: IpAddr, port: u16) -> Result<Self> {
        let listener = TcpListener::bind((addr, port)).await?;
        let local_addr = listener.local_addr()?;
        info!("relay server listening on {local_addr}");

        let state = Arc::new(ServerState::default());
        state.next_id.store(1, Ordering::Relaxed);

        let accept_state = state.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer_addr)) => {
                        let state = accept_state.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_peer(state, stream, peer_addr).await {
                                warn!("relay connection from {peer_addr} ended with error: {e}");
                            }
                        });
                    }
                    Err(e) => {
                        warn!("relay accept failed: {e}");
                        break;
                    }
                }
            }
        });

        Ok(Self { local_addr, state, accept_task })
    }

    /// The address the server is actually bound to (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A snapshot of the identities currently known to the server
    pub fn roster(&self) -> Vec<PeerIdentity> {
        let roster = self.state.roster.lock();
        let mut peers: Vec<PeerIdentity> = roster
            .iter()
            .map(|(id, name)| PeerIdentity { id: *id, name: name.clone() })
            .collect();
        peers.sort_by_key(|peer| peer.id);
        peers
    }

    /// Stops accepting and drops every peer's outbound queue, closing their
    /// connections as the write tasks drain out.
    pub fn close(&self) {
        info!("closing relay server on {}", self.local_addr);
        self.accept_task.abort();
        self.state.peers.lock().clear();
        self.state.roster.lock().clear();
    }
}

impl Drop for RelayServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn handle_peer(
    state: Arc<ServerState>,
    stream: TcpStream,
    peer_addr: SocketAddr,
) -> Result<()> {
    let id = state.next_id.fetch_add(1, Ordering::Relaxed);
    debug!("peer {peer_addr} connected as connection {id}");

    let framed = Framed::new(stream, PacketCodec);
    let (mut sink, mut frames) = framed.split();

    // Grant the connection id first, then replay the roster so the new peer
    // learns everyone already here.
    sink.send(Packet::ClientIdentity(PeerIdentity { id, name: String::new() }))
        .await?;
    let known: Vec<PeerIdentity> = {
        let roster = state.roster.lock();
        roster
            .iter()
            .filter(|(peer_id, _)| **peer_id != id)
            .map(|(peer_id, name)| PeerIdentity { id: *peer_id, name: name.clone() })
            .collect()
    };
    for identity in known {
        sink.send(Packet::ClientIdentity(identity)).await?;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<Packet>();
    state.peers.lock().insert(id, tx);

    let write_task = tokio::spawn(async move {
        while let Some(packet) = rx.recv().await {
            if sink.send(packet).await.is_err() {
                break;
            }
        }
    });

    let result = loop {
        match frames.next().await {
            Some(Ok(packet)) => {
                if let Packet::ClientIdentity(identity) = &packet {
                    state.roster.lock().insert(identity.id, identity.name.clone());
                }
                // Pure relay: no interpretation, never echoed to the sender.
                state.broadcast_except(id, &packet);
            }
            Some(Err(e)) => break Err(e),
            None => break Ok(()),
        }
    };

    state.peers.lock().remove(&id);
    state.roster.lock().remove(&id);
    state.broadcast_except(id, &Packet::PeerDisconnected { id });
    write_task.abort();
    debug!("connection {id} ({peer_addr}) disconnected");
    result
}
