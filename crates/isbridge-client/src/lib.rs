//! Client-side streams for ISB traffic.
//!
//! [`PubSubClient`] subscribes to framed device output and returns only
//! payloads that pass frame validation. [`open_connection`] builds a ready
//! stream from a connection string such as `PUBSUB:IS:7116:7115`.

pub mod connection;
pub mod error;
pub mod pubsub;

pub use connection::{
    loopback_endpoint, open_connection, ConnectionSpec, HEADSET_1_CLIENT_TO_IMU,
    HEADSET_1_IMU_TO_CLIENT, HEADSET_2_CLIENT_TO_IMU, HEADSET_2_IMU_TO_CLIENT,
};
pub use error::{ClientError, Result};
pub use pubsub::{ClientConfig, PubSubClient, PubSubTarget};
