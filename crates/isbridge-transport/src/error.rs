use isbridge_frame::FrameError;

/// Errors raised by the socket-level transports.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint string could not be parsed.
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// The listen port is already bound by another socket.
    #[error("port {port} is already in use")]
    PortInUse { port: u16 },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A message exceeds the configured limit.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// A pub/sub socket operation failed inside libzmq.
    #[error("pub/sub socket error on {endpoint}: {source}")]
    Socket {
        endpoint: String,
        source: zmq::Error,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors of the [`Stream`](crate::Stream) contract.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The stream is closed; only `open`, `describe` and `close` are allowed.
    #[error("stream is not open")]
    NotOpen,

    /// A zero-length buffer was passed to `read` or `write`.
    #[error("empty buffer")]
    EmptyBuffer,

    /// The destination cannot hold the next message; nothing was consumed into it.
    #[error("buffer too small ({needed} bytes needed, capacity {capacity})")]
    BufferTooSmall { needed: usize, capacity: usize },

    /// The remote end closed the connection.
    #[error("peer disconnected")]
    Disconnected,

    /// The open target could not be interpreted.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// The stream only carries data in the other direction.
    #[error("{0} streams do not support this operation")]
    Unsupported(&'static str),

    /// An inbound message failed frame validation.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Transport(TransportError::Io(err))
    }
}

pub type StreamResult<T> = std::result::Result<T, StreamError>;
