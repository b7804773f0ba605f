//! Multi-client TCP listening server.
//!
//! The server never blocks: [`TcpServer::update`] accepts pending
//! connections, reads whatever connected clients sent and hands it to the
//! inbound channel, and forgets clients that went away. [`TcpServer::broadcast`]
//! may run concurrently with `update` from another thread.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Mutex;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::net::{configure, drain_available, lock, write_all_until, Drain};

/// Listening server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind; every interface by default.
    pub host: String,
    /// Capacity of the inbound channel. Data arriving while it is full is dropped.
    pub inbound_capacity: usize,
    /// How long a broadcast may wait on one slow client before dropping it.
    pub write_timeout: Duration,
    /// Bytes read from a single client per `update` tick.
    pub read_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            inbound_capacity: 256,
            write_timeout: Duration::from_millis(500),
            read_limit: 64 * 1024,
        }
    }
}

/// Bytes received from one connected client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientData {
    pub client_id: u64,
    pub data: Bytes,
}

struct Client {
    id: u64,
    stream: TcpStream,
    peer: SocketAddr,
    rx: BytesMut,
}

/// Listening socket plus its connected clients.
pub struct TcpServer {
    listener: Mutex<Option<TcpListener>>,
    port: u16,
    clients: Mutex<Vec<Client>>,
    inbound: Mutex<Option<SyncSender<ClientData>>>,
    next_client_id: AtomicU64,
    dropped: AtomicU64,
    config: ServerConfig,
}

impl TcpServer {
    /// Bind `port` on every interface. Port `0` picks an ephemeral port.
    pub fn open(port: u16) -> Result<Self> {
        Self::open_with_config(port, ServerConfig::default())
    }

    pub fn open_with_config(port: u16, config: ServerConfig) -> Result<Self> {
        let addr = format!("{}:{port}", config.host);
        let listener = TcpListener::bind(&addr).map_err(|source| {
            if source.kind() == ErrorKind::AddrInUse {
                TransportError::PortInUse { port }
            } else {
                TransportError::Bind { addr, source }
            }
        })?;
        listener.set_nonblocking(true)?;
        let port = listener.local_addr()?.port();
        info!(port, "listening server opened");

        Ok(Self {
            listener: Mutex::new(Some(listener)),
            port,
            clients: Mutex::new(Vec::new()),
            inbound: Mutex::new(None),
            next_client_id: AtomicU64::new(1),
            dropped: AtomicU64::new(0),
            config,
        })
    }

    /// Start routing client data to a new bounded channel.
    ///
    /// Replaces any previous receiver; data read while no receiver is
    /// registered is discarded.
    pub fn inbound(&self) -> Receiver<ClientData> {
        let (tx, rx) = mpsc::sync_channel(self.config.inbound_capacity.max(1));
        *lock(&self.inbound) = Some(tx);
        rx
    }

    /// Accept pending connections, collect client data, and drop clients
    /// that disconnected. Returns the number of messages handed to the
    /// inbound channel.
    pub fn update(&self) -> usize {
        let accepted = self.accept_pending();
        let mut clients = lock(&self.clients);
        clients.extend(accepted);

        let inbound = lock(&self.inbound);
        let mut forwarded = 0usize;
        clients.retain_mut(|client| {
            let state = match drain_available(&mut client.stream, &mut client.rx, self.config.read_limit) {
                Ok(state) => state,
                Err(err) => {
                    debug!(client = client.id, peer = %client.peer, error = %err, "client read failed");
                    return false;
                }
            };

            if !client.rx.is_empty() {
                let data = ClientData {
                    client_id: client.id,
                    data: client.rx.split().freeze(),
                };
                match inbound.as_ref().map(|tx| tx.try_send(data)) {
                    Some(Ok(())) => forwarded += 1,
                    Some(Err(TrySendError::Full(data))) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        warn!(client = client.id, size = data.data.len(), "inbound queue full; dropping client data");
                    }
                    Some(Err(TrySendError::Disconnected(_))) | None => {}
                }
            }

            match state {
                Drain::Open(_) => true,
                Drain::Closed(_) => {
                    debug!(client = client.id, peer = %client.peer, "client disconnected");
                    false
                }
            }
        });
        forwarded
    }

    fn accept_pending(&self) -> Vec<Client> {
        let guard = lock(&self.listener);
        let Some(listener) = guard.as_ref() else {
            return Vec::new();
        };

        let mut accepted = Vec::new();
        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(err) = configure(&stream) {
                        warn!(%peer, error = %err, "failed configuring client socket");
                        continue;
                    }
                    let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
                    debug!(client = id, %peer, "client connected");
                    accepted.push(Client {
                        id,
                        stream,
                        peer,
                        rx: BytesMut::new(),
                    });
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!(error = %TransportError::Accept(err), "accept failed");
                    break;
                }
            }
        }
        accepted
    }

    /// Write `data` to every connected client. Clients that fail the write
    /// are disconnected. Returns the total number of bytes sent.
    pub fn broadcast(&self, data: &[u8]) -> usize {
        if data.is_empty() {
            return 0;
        }
        let mut clients = lock(&self.clients);
        let timeout = self.config.write_timeout;
        clients.retain_mut(|client| match write_all_until(&mut client.stream, data, timeout) {
            Ok(()) => true,
            Err(err) => {
                debug!(client = client.id, peer = %client.peer, error = %err, "dropping client after failed write");
                false
            }
        });
        clients.len() * data.len()
    }

    /// Client messages discarded because the inbound queue was full.
    pub fn dropped_messages(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Currently connected clients.
    pub fn client_count(&self) -> usize {
        lock(&self.clients).len()
    }

    /// Bound port (the ephemeral one when opened on port `0`).
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_open(&self) -> bool {
        lock(&self.listener).is_some()
    }

    /// Stop listening and disconnect every client. Idempotent.
    pub fn close(&self) {
        let listener = lock(&self.listener).take();
        let clients = std::mem::take(&mut *lock(&self.clients));
        lock(&self.inbound).take();

        if listener.is_some() {
            for client in &clients {
                let _ = client.stream.shutdown(std::net::Shutdown::Both);
            }
            info!(port = self.port, clients = clients.len(), "listening server closed");
        }
    }
}

impl Drop for TcpServer {
    fn drop(&mut self) {
        self.close();
    }
}
