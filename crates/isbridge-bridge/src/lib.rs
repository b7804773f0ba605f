//! Bidirectional bridge between a pub/sub pair and a multi-client TCP server.
//!
//! See [`Bridge`] for the lifecycle.

pub mod bridge;
pub mod config;
pub mod error;
pub mod status;

pub use bridge::Bridge;
pub use config::BridgeOptions;
pub use error::{BridgeError, Result};
pub use status::BridgeStatus;
