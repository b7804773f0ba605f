//! Framing, transport and bridging for ISB binary packet streams.
//!
//! # Crate Structure
//!
//! - [`frame`]: binary frame and ASCII sentence codecs, stream readers/writers
//! - [`transport`]: the [`Stream`](transport::Stream) contract, TCP client and
//!   listening server, pub/sub sockets
//! - [`client`]: validating pub/sub client and connection-string factory
//!   (behind the `client` feature)
//! - [`bridge`]: pub/sub to TCP bridge (behind the `bridge` feature)

/// Re-export frame types.
pub mod frame {
    pub use isbridge_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use isbridge_transport::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use isbridge_client::*;
}

/// Re-export bridge types (requires `bridge` feature).
#[cfg(feature = "bridge")]
pub mod bridge {
    pub use isbridge_bridge::*;
}
