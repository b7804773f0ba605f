//! ZeroMQ publish/subscribe sockets.
//!
//! Either side may bind or connect. libzmq reconnects in the background
//! every [`PubSubConfig::reconnect_interval`], so peers may start in any
//! order and no call ever waits on a connection attempt. A subscriber takes
//! every message (empty topic filter). Publishing with no subscriber
//! attached drops the message.
//!
//! Both sockets are [`Stream`]s: [`SubSocket`] is read-only and
//! [`PubSocket`] is write-only.

use std::fmt;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::error::{Result, StreamError, StreamResult, TransportError};
use crate::traits::{Open, Stream};

/// Tuning for pub/sub sockets.
#[derive(Debug, Clone)]
pub struct PubSubConfig {
    /// Delay between background reconnection attempts.
    pub reconnect_interval: Duration,
    /// Largest message sent or accepted. Larger inbound messages make libzmq
    /// drop the sending peer.
    pub max_message_size: usize,
    /// Messages queued per peer before new ones are dropped.
    pub high_water_mark: i32,
    /// How long unsent messages survive `close`.
    pub linger: Duration,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_millis(100),
            max_message_size: 1024 * 1024,
            high_water_mark: 1000,
            linger: Duration::from_millis(250),
        }
    }
}

/// Whether a socket binds its endpoint or connects to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attach {
    Bind,
    Connect,
}

impl fmt::Display for Attach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Attach::Bind => "bind",
            Attach::Connect => "connect",
        })
    }
}

/// Where a pub/sub socket attaches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketTarget {
    pub endpoint: String,
    pub attach: Attach,
}

impl SocketTarget {
    pub fn connect(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            attach: Attach::Connect,
        }
    }

    pub fn bind(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            attach: Attach::Bind,
        }
    }
}

/// One open libzmq socket and where it is attached.
struct Attached {
    socket: zmq::Socket,
    endpoint: Endpoint,
    attach: Attach,
}

impl Attached {
    fn open(kind: zmq::SocketType, target: &SocketTarget, config: &PubSubConfig) -> Result<Self> {
        let endpoint: Endpoint = target.endpoint.parse()?;
        let fail = |source: zmq::Error| socket_error(&endpoint, source);

        // Each socket owns its context; dropping the socket terminates the
        // context after flushing for at most `linger`.
        let socket = zmq::Context::new().socket(kind).map_err(fail)?;
        socket.set_linger(millis_i32(config.linger)).map_err(fail)?;
        socket
            .set_reconnect_ivl(millis_i32(config.reconnect_interval))
            .map_err(fail)?;
        socket.set_sndhwm(config.high_water_mark).map_err(fail)?;
        socket.set_rcvhwm(config.high_water_mark).map_err(fail)?;
        // A limit beyond what libzmq can express means no limit.
        socket
            .set_maxmsgsize(i64::try_from(config.max_message_size).unwrap_or(-1))
            .map_err(fail)?;
        if matches!(kind, zmq::SUB) {
            socket.set_subscribe(b"").map_err(fail)?;
        }

        let address = endpoint.to_string();
        match target.attach {
            Attach::Bind => socket.bind(&address).map_err(fail)?,
            Attach::Connect => socket.connect(&address).map_err(fail)?,
        }
        info!(%endpoint, attach = %target.attach, "pub/sub socket opened");

        Ok(Self {
            socket,
            endpoint,
            attach: target.attach,
        })
    }

    fn error(&self, source: zmq::Error) -> TransportError {
        socket_error(&self.endpoint, source)
    }
}

fn socket_error(endpoint: &Endpoint, source: zmq::Error) -> TransportError {
    match source {
        zmq::Error::EADDRINUSE => TransportError::PortInUse {
            port: endpoint.port(),
        },
        source => TransportError::Socket {
            endpoint: endpoint.to_string(),
            source,
        },
    }
}

fn millis_i32(duration: Duration) -> i32 {
    i32::try_from(duration.as_millis()).unwrap_or(i32::MAX)
}

fn millis_i64(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn describe(role: &str, attached: Option<&Attached>) -> String {
    match attached {
        Some(attached) => format!("PubSub {role} {} ({})", attached.endpoint, attached.attach),
        None => format!("PubSub {role} (closed)"),
    }
}

/// Receiving half of the pub/sub pair.
pub struct SubSocket {
    config: PubSubConfig,
    attached: Option<Attached>,
    /// A message that did not fit the caller's read buffer.
    pending: Option<Bytes>,
}

impl SubSocket {
    /// A closed socket; see [`Open`].
    pub fn new() -> Self {
        Self::with_config(PubSubConfig::default())
    }

    pub fn with_config(config: PubSubConfig) -> Self {
        Self {
            config,
            attached: None,
            pending: None,
        }
    }

    /// Connect to a publisher that binds `endpoint`.
    pub fn connect(endpoint: &str) -> Result<Self> {
        Self::connect_with_config(endpoint, PubSubConfig::default())
    }

    pub fn connect_with_config(endpoint: &str, config: PubSubConfig) -> Result<Self> {
        Self::opened(SocketTarget::connect(endpoint), config)
    }

    /// Bind `endpoint` and take messages from any number of publishers.
    pub fn bind(endpoint: &str) -> Result<Self> {
        Self::bind_with_config(endpoint, PubSubConfig::default())
    }

    pub fn bind_with_config(endpoint: &str, config: PubSubConfig) -> Result<Self> {
        Self::opened(SocketTarget::bind(endpoint), config)
    }

    fn opened(target: SocketTarget, config: PubSubConfig) -> Result<Self> {
        let attached = Attached::open(zmq::SUB, &target, &config)?;
        Ok(Self {
            config,
            attached: Some(attached),
            pending: None,
        })
    }

    /// Receive one message if one is already queued.
    pub fn try_recv(&mut self) -> StreamResult<Option<Bytes>> {
        self.recv_timeout(Duration::ZERO)
    }

    /// Receive one message, waiting at most `timeout`.
    pub fn recv_timeout(&mut self, timeout: Duration) -> StreamResult<Option<Bytes>> {
        let attached = self.attached.as_ref().ok_or(StreamError::NotOpen)?;
        if let Some(message) = self.pending.take() {
            return Ok(Some(message));
        }

        match attached.socket.poll(zmq::POLLIN, millis_i64(timeout)) {
            Ok(0) | Err(zmq::Error::EINTR) => return Ok(None),
            Ok(_) => {}
            Err(err) => return Err(attached.error(err).into()),
        }

        let mut message = match attached.socket.recv_bytes(zmq::DONTWAIT) {
            Ok(part) => BytesMut::from(part.as_slice()),
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(err) => return Err(attached.error(err).into()),
        };
        // Multipart messages are delivered as one, parts concatenated.
        while attached.socket.get_rcvmore().map_err(|err| attached.error(err))? {
            let part = attached
                .socket
                .recv_bytes(0)
                .map_err(|err| attached.error(err))?;
            message.extend_from_slice(&part);
        }
        Ok(Some(message.freeze()))
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.attached.as_ref().map(|attached| &attached.endpoint)
    }

    pub fn config(&self) -> &PubSubConfig {
        &self.config
    }
}

impl Default for SubSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl Open for SubSocket {
    type Target = SocketTarget;

    fn open(&mut self, target: SocketTarget) -> StreamResult<()> {
        self.close()?;
        self.attached = Some(Attached::open(zmq::SUB, &target, &self.config)?);
        Ok(())
    }
}

impl Stream for SubSocket {
    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        if self.attached.is_none() {
            return Err(StreamError::NotOpen);
        }
        if buf.is_empty() {
            return Err(StreamError::EmptyBuffer);
        }
        let Some(message) = self.try_recv()? else {
            return Ok(0);
        };
        if message.len() > buf.len() {
            let needed = message.len();
            self.pending = Some(message);
            return Err(StreamError::BufferTooSmall {
                needed,
                capacity: buf.len(),
            });
        }
        buf[..message.len()].copy_from_slice(&message);
        Ok(message.len())
    }

    fn write(&mut self, _data: &[u8]) -> StreamResult<usize> {
        if self.attached.is_none() {
            return Err(StreamError::NotOpen);
        }
        Err(StreamError::Unsupported("subscribe"))
    }

    fn close(&mut self) -> StreamResult<()> {
        self.pending = None;
        if let Some(attached) = self.attached.take() {
            debug!(endpoint = %attached.endpoint, "subscribe socket closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.attached.is_some()
    }

    fn describe(&self) -> String {
        describe("subscribe", self.attached.as_ref())
    }
}

/// Sending half of the pub/sub pair.
pub struct PubSocket {
    config: PubSubConfig,
    attached: Option<Attached>,
}

impl PubSocket {
    /// A closed socket; see [`Open`].
    pub fn new() -> Self {
        Self::with_config(PubSubConfig::default())
    }

    pub fn with_config(config: PubSubConfig) -> Self {
        Self {
            config,
            attached: None,
        }
    }

    /// Connect to a subscriber that binds `endpoint`.
    pub fn connect(endpoint: &str) -> Result<Self> {
        Self::connect_with_config(endpoint, PubSubConfig::default())
    }

    pub fn connect_with_config(endpoint: &str, config: PubSubConfig) -> Result<Self> {
        Self::opened(SocketTarget::connect(endpoint), config)
    }

    /// Bind `endpoint` and serve any number of subscribers.
    pub fn bind(endpoint: &str) -> Result<Self> {
        Self::bind_with_config(endpoint, PubSubConfig::default())
    }

    pub fn bind_with_config(endpoint: &str, config: PubSubConfig) -> Result<Self> {
        Self::opened(SocketTarget::bind(endpoint), config)
    }

    fn opened(target: SocketTarget, config: PubSubConfig) -> Result<Self> {
        let attached = Attached::open(zmq::PUB, &target, &config)?;
        Ok(Self {
            config,
            attached: Some(attached),
        })
    }

    /// Publish one message without blocking. Returns the message size.
    ///
    /// With no subscriber attached, or a subscriber at its high-water mark,
    /// the message is dropped.
    pub fn send(&mut self, message: &[u8]) -> StreamResult<usize> {
        let attached = self.attached.as_ref().ok_or(StreamError::NotOpen)?;
        let max = self.config.max_message_size;
        if message.len() > max {
            return Err(TransportError::MessageTooLarge {
                size: message.len(),
                max,
            }
            .into());
        }
        match attached.socket.send(message, zmq::DONTWAIT) {
            Ok(()) => {}
            Err(zmq::Error::EAGAIN) => {
                debug!(endpoint = %attached.endpoint, size = message.len(), "publish queue full; message dropped");
            }
            Err(err) => return Err(attached.error(err).into()),
        }
        Ok(message.len())
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.attached.as_ref().map(|attached| &attached.endpoint)
    }

    pub fn config(&self) -> &PubSubConfig {
        &self.config
    }
}

impl Default for PubSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl Open for PubSocket {
    type Target = SocketTarget;

    fn open(&mut self, target: SocketTarget) -> StreamResult<()> {
        self.close()?;
        self.attached = Some(Attached::open(zmq::PUB, &target, &self.config)?);
        Ok(())
    }
}

impl Stream for PubSocket {
    fn read(&mut self, _buf: &mut [u8]) -> StreamResult<usize> {
        if self.attached.is_none() {
            return Err(StreamError::NotOpen);
        }
        Err(StreamError::Unsupported("publish"))
    }

    fn write(&mut self, data: &[u8]) -> StreamResult<usize> {
        if self.attached.is_none() {
            return Err(StreamError::NotOpen);
        }
        if data.is_empty() {
            return Err(StreamError::EmptyBuffer);
        }
        self.send(data)
    }

    fn close(&mut self) -> StreamResult<()> {
        if let Some(attached) = self.attached.take() {
            debug!(endpoint = %attached.endpoint, "publish socket closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.attached.is_some()
    }

    fn describe(&self) -> String {
        describe("publish", self.attached.as_ref())
    }
}
