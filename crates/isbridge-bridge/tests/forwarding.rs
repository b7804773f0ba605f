use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use isbridge_bridge::{Bridge, BridgeOptions};
use isbridge_frame::{encode_frame, DataId};
use isbridge_transport::{PubSocket, PubSubConfig, SubSocket};

fn free_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    format!("tcp://127.0.0.1:{}", listener.local_addr().unwrap().port())
}

fn fast_options() -> BridgeOptions {
    BridgeOptions {
        recv_timeout: Duration::from_millis(10),
        poll_interval: Duration::from_millis(2),
        pubsub: PubSubConfig {
            reconnect_interval: Duration::from_millis(10),
            ..PubSubConfig::default()
        },
        ..BridgeOptions::default()
    }
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// External device side: publishes to the bridge and subscribes to what it publishes.
struct Device {
    output: PubSocket,
    commands: SubSocket,
}

struct Setup {
    device: Device,
    bridge: Bridge,
    client: TcpStream,
}

fn setup() -> Setup {
    let output_endpoint = free_endpoint();
    let command_endpoint = free_endpoint();
    let mut device = Device {
        output: PubSocket::bind(&output_endpoint).unwrap(),
        commands: SubSocket::bind(&command_endpoint).unwrap(),
    };

    let mut bridge = Bridge::with_options(fast_options());
    bridge.start(&output_endpoint, &command_endpoint, 0).unwrap();
    assert!(bridge.is_running());

    let mut client = TcpStream::connect(("127.0.0.1", bridge.listen_port().unwrap())).unwrap();
    wait_until("tcp client accepted", || bridge.client_count() == 1);

    // Subscriptions propagate asynchronously; exchange markers both ways
    // until each direction delivers, then discard the duplicates.
    client
        .set_read_timeout(Some(Duration::from_millis(20)))
        .unwrap();
    let mut buf = [0u8; 256];
    wait_until("bridge subscription", || {
        device.output.send(b"sync").unwrap();
        matches!(client.read(&mut buf), Ok(n) if n > 0)
    });
    wait_until("bridge publication", || {
        client.write_all(b"sync").unwrap();
        device
            .commands
            .recv_timeout(Duration::from_millis(20))
            .unwrap()
            .is_some()
    });
    std::thread::sleep(Duration::from_millis(50));
    while matches!(client.read(&mut buf), Ok(n) if n > 0) {}
    while device
        .commands
        .recv_timeout(Duration::from_millis(20))
        .unwrap()
        .is_some()
    {}
    client
        .set_read_timeout(Some(Duration::from_millis(500)))
        .unwrap();

    Setup {
        device,
        bridge,
        client,
    }
}

fn framed(did: DataId, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_frame(did, 0, payload, &mut buf).unwrap();
    buf.to_vec()
}

#[test]
fn subscribed_messages_reach_tcp_clients_unmodified() {
    let mut s = setup();
    let message = framed(DataId::INS_1, b"roll pitch yaw");

    let sent_at = Instant::now();
    s.device.output.send(&message).unwrap();

    let mut received = vec![0u8; message.len()];
    s.client.read_exact(&mut received).unwrap();
    assert!(sent_at.elapsed() < Duration::from_millis(500));
    assert_eq!(received, message);

    // Opaque bytes are forwarded too; the bridge does not validate.
    s.device.output.send(b"not a frame").unwrap();
    let mut raw = [0u8; 11];
    s.client.read_exact(&mut raw).unwrap();
    assert_eq!(&raw, b"not a frame");

    s.bridge.stop().unwrap();
}

#[test]
fn subscribed_messages_keep_arrival_order() {
    let mut s = setup();
    let messages: Vec<Vec<u8>> = (0..10u8).map(|i| framed(DataId(i), &[i; 8])).collect();
    for message in &messages {
        s.device.output.send(message).unwrap();
    }

    let expected: Vec<u8> = messages.concat();
    let mut received = vec![0u8; expected.len()];
    s.client.read_exact(&mut received).unwrap();
    assert_eq!(received, expected);
}

#[test]
fn tcp_client_data_is_published() {
    let mut s = setup();
    let command = framed(DataId::SYS_CMD, b"reset");
    s.client.write_all(&command).unwrap();

    let mut received = Vec::new();
    wait_until("published client data", || {
        while let Some(message) = s
            .device
            .commands
            .recv_timeout(Duration::from_millis(10))
            .unwrap()
        {
            received.extend_from_slice(&message);
        }
        received.len() >= command.len()
    });
    assert_eq!(received, command);
}

#[test]
fn direct_publish_shares_the_publish_socket() {
    let mut s = setup();
    let message = framed(DataId::FLASH_CONFIG, b"cfg");
    assert_eq!(s.bridge.publish(&message).unwrap(), message.len());

    let got = s
        .device
        .commands
        .recv_timeout(Duration::from_secs(1))
        .unwrap()
        .expect("direct publish should arrive");
    assert_eq!(got.as_ref(), message.as_slice());
}

#[test]
fn stop_disconnects_clients_and_frees_the_port() {
    let mut s = setup();
    let port = s.bridge.listen_port().unwrap();

    let stopped_at = Instant::now();
    s.bridge.stop().unwrap();
    assert!(stopped_at.elapsed() < Duration::from_secs(1));
    assert!(!s.bridge.is_running());

    let mut buf = [0u8; 1];
    assert!(matches!(s.client.read(&mut buf), Ok(0) | Err(_)));

    let mut again = Bridge::with_options(fast_options());
    again.start(&free_endpoint(), &free_endpoint(), port).unwrap();
    assert_eq!(again.listen_port(), Some(port));
}

#[test]
fn dropping_a_running_bridge_stops_it() {
    let s = setup();
    let port = s.bridge.listen_port().unwrap();
    drop(s.bridge);

    let mut again = Bridge::with_options(fast_options());
    again.start(&free_endpoint(), &free_endpoint(), port).unwrap();
    assert!(again.is_running());
}

#[test]
fn plain_zmq_peers_interoperate_with_the_bridge() {
    let output_endpoint = free_endpoint();
    let command_endpoint = free_endpoint();
    let output = zmq::Context::new().socket(zmq::PUB).unwrap();
    output.bind(&output_endpoint).unwrap();
    let commands = zmq::Context::new().socket(zmq::SUB).unwrap();
    commands.set_subscribe(b"").unwrap();
    commands.set_rcvtimeo(20).unwrap();
    commands.bind(&command_endpoint).unwrap();

    let mut bridge = Bridge::with_options(fast_options());
    bridge.start(&output_endpoint, &command_endpoint, 0).unwrap();
    let mut client = TcpStream::connect(("127.0.0.1", bridge.listen_port().unwrap())).unwrap();
    client
        .set_read_timeout(Some(Duration::from_millis(20)))
        .unwrap();
    wait_until("tcp client accepted", || bridge.client_count() == 1);

    let message = framed(DataId::PIMU, b"imu");
    let mut buf = [0u8; 64];
    wait_until("zmq publisher reaching the client", || {
        output.send(message.as_slice(), 0).unwrap();
        matches!(client.read(&mut buf), Ok(n) if n >= message.len())
    });
    assert_eq!(&buf[..message.len()], message.as_slice());

    let command = framed(DataId::SYS_CMD, b"reset");
    let mut received = Vec::new();
    wait_until("client data reaching the zmq subscriber", || {
        client.write_all(&command).unwrap();
        match commands.recv_bytes(0) {
            Ok(bytes) => {
                received = bytes;
                true
            }
            Err(_) => false,
        }
    });
    assert_eq!(received, command);
    bridge.stop().unwrap();
}
