use isbridge_transport::{StreamError, TransportError};

/// Errors that can occur while managing a bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// `start` was called on a running bridge.
    #[error("bridge is already running")]
    AlreadyRunning,

    /// The operation needs a running bridge.
    #[error("bridge is not running")]
    NotRunning,

    /// The listen port is bound by someone else.
    #[error("listen port {port} is already in use")]
    PortInUse { port: u16 },

    /// Opening or using a pub/sub socket or the listening server failed.
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    /// Writing to or closing a pub/sub stream failed.
    #[error("stream error: {0}")]
    Stream(#[source] StreamError),

    /// A forwarding thread could not be started.
    #[error("failed to spawn forwarding task: {0}")]
    Spawn(#[source] std::io::Error),
}

impl From<TransportError> for BridgeError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::PortInUse { port } => BridgeError::PortInUse { port },
            other => BridgeError::Transport(other),
        }
    }
}

impl From<StreamError> for BridgeError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Transport(err) => err.into(),
            other => BridgeError::Stream(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
