//! Socket transports for the ISB bridge.
//!
//! - [`Stream`]/[`Open`]: the uniform read/write/close/describe contract
//! - [`TcpClient`]: point-to-point TCP stream
//! - [`TcpServer`]: multi-client listening server with broadcast
//! - [`PubSocket`]/[`SubSocket`]: ZeroMQ PUB/SUB sockets
//!
//! Everything here is non-blocking or bounded in time, so callers can poll
//! from a loop that also watches a shutdown flag.

pub mod endpoint;
pub mod error;
mod net;
pub mod pubsub;
pub mod server;
pub mod tcp;
pub mod traits;

pub use endpoint::Endpoint;
pub use error::{Result, StreamError, StreamResult, TransportError};
pub use pubsub::{Attach, PubSocket, PubSubConfig, SocketTarget, SubSocket};
pub use server::{ClientData, ServerConfig, TcpServer};
pub use tcp::{TcpClient, TcpTarget};
pub use traits::{Open, Stream};
