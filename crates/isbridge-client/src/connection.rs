//! Build streams from connection strings.
//!
//! Supported forms:
//! - `PUBSUB:IS:<send_port>:<recv_port>`: validating pub/sub client on loopback
//! - `TCP:IS:<host>:<port>`: point-to-point TCP stream

use isbridge_transport::{Open, Stream, TcpClient, TcpTarget};

use crate::error::{ClientError, Result};
use crate::pubsub::{PubSubClient, PubSubTarget};

/// Headset 1: device to client.
pub const HEADSET_1_IMU_TO_CLIENT: &str = "tcp://127.0.0.1:7115";
/// Headset 1: client to device.
pub const HEADSET_1_CLIENT_TO_IMU: &str = "tcp://127.0.0.1:7116";
/// Headset 2: device to client.
pub const HEADSET_2_IMU_TO_CLIENT: &str = "tcp://127.0.0.1:7135";
/// Headset 2: client to device.
pub const HEADSET_2_CLIENT_TO_IMU: &str = "tcp://127.0.0.1:7136";

/// Loopback pub/sub endpoint for `port`.
pub fn loopback_endpoint(port: u16) -> String {
    format!("tcp://127.0.0.1:{port}")
}

/// A parsed connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSpec {
    PubSub(PubSubTarget),
    Tcp(TcpTarget),
}

impl ConnectionSpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = |reason: &str| ClientError::InvalidConnectionString {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = spec.split(':').collect();
        let &[kind, protocol, a, b] = parts.as_slice() else {
            return Err(invalid("expected KIND:IS:<a>:<b>"));
        };
        if !protocol.eq_ignore_ascii_case("IS") {
            return Err(invalid("only the IS protocol is supported"));
        }
        let port = |value: &str| {
            value
                .parse::<u16>()
                .map_err(|_| invalid(&format!("bad port {value:?}")))
        };

        if kind.eq_ignore_ascii_case("PUBSUB") {
            let send = port(a)?;
            let recv = port(b)?;
            Ok(Self::PubSub(PubSubTarget::new(
                loopback_endpoint(send),
                loopback_endpoint(recv),
            )))
        } else if kind.eq_ignore_ascii_case("TCP") {
            if a.is_empty() {
                return Err(invalid("empty host"));
            }
            Ok(Self::Tcp(TcpTarget::new(a, port(b)?)))
        } else {
            Err(invalid("unknown connection kind"))
        }
    }
}

/// Parse `spec` and return the opened stream.
pub fn open_connection(spec: &str) -> Result<Box<dyn Stream>> {
    let opened = match ConnectionSpec::parse(spec)? {
        ConnectionSpec::PubSub(target) => {
            let mut client = PubSubClient::new();
            client.open(target).map(|()| Box::new(client) as Box<dyn Stream>)
        }
        ConnectionSpec::Tcp(target) => {
            let mut client = TcpClient::new();
            client.open(target).map(|()| Box::new(client) as Box<dyn Stream>)
        }
    };
    opened.map_err(|source| ClientError::Open {
        spec: spec.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headset_endpoints() {
        assert_eq!(HEADSET_1_IMU_TO_CLIENT, "tcp://127.0.0.1:7115");
        assert_eq!(HEADSET_1_CLIENT_TO_IMU, "tcp://127.0.0.1:7116");
        assert_eq!(HEADSET_2_IMU_TO_CLIENT, "tcp://127.0.0.1:7135");
        assert_eq!(HEADSET_2_CLIENT_TO_IMU, "tcp://127.0.0.1:7136");
        assert_eq!(loopback_endpoint(7115), HEADSET_1_IMU_TO_CLIENT);
    }

    #[test]
    fn parses_pubsub_and_tcp() {
        assert_eq!(
            ConnectionSpec::parse("PUBSUB:IS:15117:15118").unwrap(),
            ConnectionSpec::PubSub(PubSubTarget::new(
                "tcp://127.0.0.1:15117",
                "tcp://127.0.0.1:15118"
            ))
        );
        assert_eq!(
            ConnectionSpec::parse("tcp:is:localhost:2000").unwrap(),
            ConnectionSpec::Tcp(TcpTarget::new("localhost", 2000))
        );
    }

    #[test]
    fn rejects_malformed_strings() {
        for spec in [
            "",
            "PUBSUB:IS:1",
            "PUBSUB:XX:1:2",
            "PUBSUB:IS:one:2",
            "PUBSUB:IS:1:70000",
            "SERIAL:IS:/dev/ttyACM0:921600",
            "TCP:IS::2000",
        ] {
            assert!(
                matches!(
                    ConnectionSpec::parse(spec),
                    Err(ClientError::InvalidConnectionString { .. })
                ),
                "{spec} should be rejected"
            );
        }
    }

    #[test]
    fn opens_pubsub_stream() {
        let mut stream = open_connection("PUBSUB:IS:15117:15118").unwrap();
        assert!(stream.is_open());
        assert!(stream.describe().contains("PubSub"));
        stream.close().unwrap();
        assert!(!stream.is_open());
    }

    #[test]
    fn refused_tcp_reports_open_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = open_connection(&format!("TCP:IS:127.0.0.1:{port}"))
            .err()
            .unwrap();
        assert!(matches!(err, ClientError::Open { .. }));
    }
}
