use std::time::Duration;

use isbridge_transport::{PubSubConfig, ServerConfig};

/// Bridge tuning. Only the three endpoints passed to
/// [`Bridge::start`](crate::Bridge::start) are mandatory.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Longest a single subscribe receive may wait. Bounds how long `stop`
    /// waits for the subscribe-side task.
    pub recv_timeout: Duration,
    /// Sleep between listening-server housekeeping ticks.
    pub poll_interval: Duration,
    pub pubsub: PubSubConfig,
    /// Listening server settings; `inbound_capacity` bounds the queue of
    /// client data waiting to be published.
    pub server: ServerConfig,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            recv_timeout: Duration::from_millis(20),
            poll_interval: Duration::from_millis(10),
            pubsub: PubSubConfig::default(),
            server: ServerConfig::default(),
        }
    }
}
