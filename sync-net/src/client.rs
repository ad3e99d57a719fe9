//! The relay client
//!
//! One outbound connection with a bounded connect timeout. On connect the
//! client reads the server's id grant, announces its own identity, and then
//! bridges the socket to two queues: an outbound packet queue drained by a
//! write task, and an inbound [`NetEvent`] queue filled by a read task. The
//! consumer (UI or CLI) drains the event queue on its own schedule; ordering
//! is FIFO.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::error::{NetError, Result};
use crate::packet::{Packet, PeerIdentity};
use crate::wire::PacketCodec;
use crate::CONNECT_TIMEOUT;

/// Name used when the caller supplies a blank display name
const DEFAULT_NAME: &str = "peer";

/// Asynchronous notifications delivered to the client's consumer
#[derive(Debug, Clone, PartialEq)]
pub enum NetEvent {
    /// The connection is established and identified
    Connected { id: u32 },
    /// A packet arrived from another peer
    Message(Packet),
    /// The connection to the server dropped
    Disconnected,
}

/// A connected relay client
pub struct RelayClient {
    id: u32,
    name: String,
    roster: Arc<Mutex<HashMap<u32, String>>>,
    outbound: mpsc::UnboundedSender<Packet>,
    events: Mutex<Option<mpsc::UnboundedReceiver<NetEvent>>>,
    read_task: JoinHandle<()>,
    write_task: JoinHandle<()>,
}

impl RelayClient {
    /// Connects to `addr:port` within [`CONNECT_TIMEOUT`] and announces
    /// `display_name` (blank names fall back to a default). Connect failures
    /// are returned to the caller; reconnection is a caller decision.
    pub async fn connect(addr: &str, port: u16, display_name: &str) -> Result<Self> {
        let name = match display_name.trim() {
            "" => DEFAULT_NAME.to_string(),
            trimmed => trimmed.to_string(),
        };

        let target = format!("{addr}:{port}");
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(&target))
            .await
            .map_err(|_| NetError::ConnectTimeout { addr: target.clone() })??;
        let mut framed = Framed::new(stream, PacketCodec);

        // The server opens every connection with an id grant.
        let grant = match framed.next().await {
            Some(frame) => frame?,
            None => return Err(NetError::Closed),
        };
        let id = match grant {
            Packet::ClientIdentity(identity) => identity.id,
            other => {
                return Err(NetError::Handshake(format!(
                    "expected an id grant, got {other:?}"
                )))
            }
        };
        framed
            .send(Packet::ClientIdentity(PeerIdentity { id, name: name.clone() }))
            .await?;
        info!("connected to {target} as {name}[{id}]");

        let roster = Arc::new(Mutex::new(HashMap::from([(id, name.clone())])));
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Packet>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<NetEvent>();
        let (mut sink, mut frames) = framed.split();

        let write_task = tokio::spawn(async move {
            while let Some(packet) = out_rx.recv().await {
                if let Err(e) = sink.send(packet).await {
                    warn!("relay send failed: {e}");
                    break;
                }
            }
        });

        let read_roster = roster.clone();
        let read_events = event_tx.clone();
        let read_task = tokio::spawn(async move {
            while let Some(frame) = frames.next().await {
                let packet = match frame {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!("relay receive failed: {e}");
                        break;
                    }
                };
                match &packet {
                    Packet::ClientIdentity(identity) => {
                        read_roster.lock().insert(identity.id, identity.name.clone());
                    }
                    Packet::PeerDisconnected { id } => {
                        read_roster.lock().remove(id);
                    }
                    _ => {}
                }
                if read_events.send(NetEvent::Message(packet)).is_err() {
                    debug!("event queue consumer gone, stopping relay reader");
                    return;
                }
            }
            read_roster.lock().clear();
            let _ = read_events.send(NetEvent::Disconnected);
        });

        let _ = event_tx.send(NetEvent::Connected { id });

        Ok(Self {
            id,
            name,
            roster,
            outbound: out_tx,
            events: Mutex::new(Some(event_rx)),
            read_task,
            write_task,
        })
    }

    /// The connection id granted by the server
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The display name announced to other peers
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues a packet for transmission to the relay server.
    pub fn send(&self, packet: Packet) -> Result<()> {
        self.outbound.send(packet).map_err(|_| NetError::Closed)
    }

    /// Takes ownership of the inbound event queue. Returns `None` after the
    /// first call; there is exactly one consumer.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<NetEvent>> {
        self.events.lock().take()
    }

    /// A snapshot of the currently-known peers, self included, ordered by id
    pub fn roster(&self) -> Vec<PeerIdentity> {
        let roster = self.roster.lock();
        let mut peers: Vec<PeerIdentity> = roster
            .iter()
            .map(|(id, name)| PeerIdentity { id: *id, name: name.clone() })
            .collect();
        peers.sort_by_key(|peer| peer.id);
        peers
    }

    /// Drops the connection and stops both bridge tasks.
    pub fn close(&self) {
        self.read_task.abort();
        self.write_task.abort();
        self.roster.lock().clear();
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        self.read_task.abort();
        self.write_task.abort();
    }
}
