use std::fmt;

/// Observable bridge state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeStatus {
    Stopped,
    Running {
        subscribe_endpoint: String,
        publish_endpoint: String,
        listen_port: u16,
    },
    /// A forwarding task exited without being asked to. Resources are held
    /// until the next `start` or `stop`.
    Failed { reason: String },
}

impl BridgeStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, BridgeStatus::Running { .. })
    }
}

impl fmt::Display for BridgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeStatus::Stopped => f.write_str("Stopped"),
            BridgeStatus::Running {
                subscribe_endpoint,
                publish_endpoint,
                listen_port,
            } => write!(
                f,
                "Running - subscribe: {subscribe_endpoint}, publish: {publish_endpoint}, listen port: {listen_port}"
            ),
            BridgeStatus::Failed { reason } => write!(f, "Failed - {reason}"),
        }
    }
}
