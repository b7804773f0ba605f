use bytes::BytesMut;
use tracing::{debug, trace};

use isbridge_frame::{decode_frame, encode_frame, DataId, Frame, PKT_BUF_SIZE};
use isbridge_transport::{
    Open, PubSocket, PubSubConfig, Stream, StreamError, StreamResult, SubSocket, TransportError,
};

/// Validating client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Largest inbound message accepted for decoding.
    pub max_message_size: usize,
    pub pubsub: PubSubConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_message_size: PKT_BUF_SIZE,
            pubsub: PubSubConfig::default(),
        }
    }
}

/// The pair of endpoints a [`PubSubClient`] connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubTarget {
    /// Where outbound frames are published.
    pub send_endpoint: String,
    /// Where inbound frames are subscribed from.
    pub recv_endpoint: String,
}

impl PubSubTarget {
    pub fn new(send_endpoint: impl Into<String>, recv_endpoint: impl Into<String>) -> Self {
        Self {
            send_endpoint: send_endpoint.into(),
            recv_endpoint: recv_endpoint.into(),
        }
    }
}

struct Sockets {
    publisher: PubSocket,
    subscriber: SubSocket,
    target: PubSubTarget,
}

/// [`Stream`] over a publish/subscribe pair that only ever hands out
/// validated payloads.
///
/// Every inbound message must be one complete frame; the frame's payload is
/// what `read` returns. `write` sends bytes untouched, so callers frame
/// outbound data themselves (or use [`PubSubClient::write_frame`]).
///
/// Not meant for concurrent reads; wrap it in a lock if several threads
/// need it.
#[derive(Default)]
pub struct PubSubClient {
    sockets: Option<Sockets>,
    config: ClientConfig,
    encode_buf: BytesMut,
}

impl PubSubClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            sockets: None,
            config,
            encode_buf: BytesMut::new(),
        }
    }

    /// Create and open in one step.
    pub fn connect(send_endpoint: &str, recv_endpoint: &str) -> StreamResult<Self> {
        let mut client = Self::new();
        client.open(PubSubTarget::new(send_endpoint, recv_endpoint))?;
        Ok(client)
    }

    /// Receive and validate one pending frame without blocking.
    ///
    /// `Ok(None)` when nothing is pending. Frames without a payload are
    /// returned too, with an empty payload.
    pub fn read_frame(&mut self) -> StreamResult<Option<Frame>> {
        let max = self.config.max_message_size;
        let sockets = self.sockets.as_mut().ok_or(StreamError::NotOpen)?;

        let Some(message) = sockets.subscriber.try_recv()? else {
            return Ok(None);
        };
        if message.is_empty() {
            return Ok(None);
        }
        if message.len() > max {
            return Err(TransportError::MessageTooLarge {
                size: message.len(),
                max,
            }
            .into());
        }

        let decoded = decode_frame(&message).inspect_err(|err| {
            debug!(size = message.len(), error = %err, "rejecting invalid message");
        })?;
        trace!(packet_type = %decoded.packet_type, did = %decoded.did, "frame received");
        Ok(Some(decoded.to_frame()))
    }

    /// Encode one data frame and publish it.
    pub fn write_frame(&mut self, did: DataId, offset: u16, payload: &[u8]) -> StreamResult<usize> {
        if self.sockets.is_none() {
            return Err(StreamError::NotOpen);
        }
        let mut buf = std::mem::take(&mut self.encode_buf);
        buf.clear();
        let result = encode_frame(did, offset, payload, &mut buf)
            .map_err(StreamError::from)
            .and_then(|_| self.write(&buf));
        self.encode_buf = buf;
        result
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Open for PubSubClient {
    type Target = PubSubTarget;

    fn open(&mut self, target: PubSubTarget) -> StreamResult<()> {
        self.close()?;

        let publisher =
            PubSocket::connect_with_config(&target.send_endpoint, self.config.pubsub.clone())?;
        let subscriber =
            SubSocket::connect_with_config(&target.recv_endpoint, self.config.pubsub.clone())?;
        debug!(send = %target.send_endpoint, recv = %target.recv_endpoint, "pub/sub client opened");

        self.sockets = Some(Sockets {
            publisher,
            subscriber,
            target,
        });
        Ok(())
    }
}

impl Stream for PubSubClient {
    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        if self.sockets.is_none() {
            return Err(StreamError::NotOpen);
        }
        if buf.is_empty() {
            return Err(StreamError::EmptyBuffer);
        }

        let Some(frame) = self.read_frame()? else {
            return Ok(0);
        };
        if !frame.packet_type.carries_payload() {
            return Ok(0);
        }

        let payload = frame.payload.as_ref();
        if payload.len() > buf.len() {
            return Err(StreamError::BufferTooSmall {
                needed: payload.len(),
                capacity: buf.len(),
            });
        }
        buf[..payload.len()].copy_from_slice(payload);
        Ok(payload.len())
    }

    fn write(&mut self, data: &[u8]) -> StreamResult<usize> {
        let sockets = self.sockets.as_mut().ok_or(StreamError::NotOpen)?;
        if data.is_empty() {
            return Err(StreamError::EmptyBuffer);
        }
        Ok(sockets.publisher.send(data)?)
    }

    fn close(&mut self) -> StreamResult<()> {
        if let Some(mut sockets) = self.sockets.take() {
            sockets.publisher.close()?;
            sockets.subscriber.close()?;
            debug!(
                send = %sockets.target.send_endpoint,
                recv = %sockets.target.recv_endpoint,
                "pub/sub client closed"
            );
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.sockets.is_some()
    }

    fn describe(&self) -> String {
        match &self.sockets {
            Some(sockets) => format!(
                "PubSub send: {}, recv: {}",
                sockets.target.send_endpoint, sockets.target.recv_endpoint
            ),
            None => "PubSub (closed)".to_string(),
        }
    }
}

impl Drop for PubSubClient {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
