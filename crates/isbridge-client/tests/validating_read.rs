use std::net::TcpListener;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use isbridge_client::{ClientConfig, PubSubClient, PubSubTarget};
use isbridge_frame::{encode_frame, encode_packet, DataId, FrameError, PacketType, FRAME_OVERHEAD};
use isbridge_transport::{Open, PubSocket, PubSubConfig, Stream, StreamError, SubSocket};

fn free_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    format!("tcp://127.0.0.1:{}", listener.local_addr().unwrap().port())
}

fn frame(did: DataId, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_frame(did, 0, payload, &mut buf).unwrap();
    buf.to_vec()
}

struct Harness {
    device: PubSocket,
    commands: SubSocket,
    client: PubSubClient,
}

/// A bound "device" publisher and command subscriber with a client attached to both.
fn harness() -> Harness {
    let recv = free_endpoint();
    let send = free_endpoint();
    let device = PubSocket::bind(&recv).unwrap();
    let commands = SubSocket::bind(&send).unwrap();

    let mut client = PubSubClient::with_config(ClientConfig {
        pubsub: PubSubConfig {
            reconnect_interval: Duration::from_millis(10),
            ..PubSubConfig::default()
        },
        ..ClientConfig::default()
    });
    client.open(PubSubTarget::new(send, recv)).unwrap();

    let mut harness = Harness {
        device,
        commands,
        client,
    };
    // Publish a marker until the subscription is live so later messages are not lost.
    let sync = frame(DataId::DEV_INFO, b"sync");
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        harness.device.send(&sync).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        if harness.client.read_frame().unwrap().is_some() {
            break;
        }
        assert!(Instant::now() < deadline, "client never attached");
    }
    std::thread::sleep(Duration::from_millis(50));
    while harness.client.read_frame().unwrap().is_some() {}
    harness
}

/// Publish `message` once and read until the client returns something.
fn publish_and_read(h: &mut Harness, message: &[u8], buf: &mut [u8]) -> Result<usize, StreamError> {
    h.device.send(message).unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        match h.client.read(buf) {
            Ok(0) if Instant::now() < deadline => std::thread::sleep(Duration::from_millis(2)),
            other => return other,
        }
    }
}

#[test]
fn valid_frame_yields_payload_only() {
    let mut h = harness();
    let mut buf = [0u8; 64];

    let n = publish_and_read(&mut h, &frame(DataId::INS_1, b"attitude"), &mut buf).unwrap();
    assert_eq!(&buf[..n], b"attitude");
}

#[test]
fn corrupted_frame_is_a_read_error() {
    let mut h = harness();
    let mut bytes = frame(DataId::PIMU, b"imu");
    bytes[FRAME_OVERHEAD - 1] ^= 0x01;

    let mut buf = [0u8; 64];
    let err = publish_and_read(&mut h, &bytes, &mut buf).unwrap_err();
    assert!(matches!(
        err,
        StreamError::Frame(FrameError::ChecksumInvalid { .. })
    ));

    // The stream stays usable after a rejected message.
    let n = publish_and_read(&mut h, &frame(DataId::PIMU, b"next"), &mut buf).unwrap();
    assert_eq!(&buf[..n], b"next");
}

#[test]
fn unframed_message_is_rejected() {
    let mut h = harness();
    let mut buf = [0u8; 64];
    let err = publish_and_read(&mut h, b"not a frame", &mut buf).unwrap_err();
    assert!(matches!(err, StreamError::Frame(FrameError::NoFrame)));
}

#[test]
fn small_buffer_is_an_error_not_a_truncation() {
    let mut h = harness();
    let mut buf = [0u8; 4];
    let err = publish_and_read(&mut h, &frame(DataId::INS_2, b"0123456789"), &mut buf).unwrap_err();
    assert!(matches!(
        err,
        StreamError::BufferTooSmall {
            needed: 10,
            capacity: 4
        }
    ));
}

#[test]
fn payloadless_packets_read_as_nothing() {
    let mut h = harness();
    let mut nack = BytesMut::new();
    encode_packet(PacketType::Nack, DataId::DEV_INFO, 0, &[], &mut nack).unwrap();
    h.device.send(&nack).unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    let frame = loop {
        if let Some(frame) = h.client.read_frame().unwrap() {
            break frame;
        }
        assert!(Instant::now() < deadline, "nack never arrived");
        std::thread::sleep(Duration::from_millis(2));
    };
    assert_eq!(frame.packet_type, PacketType::Nack);
    assert!(frame.payload.is_empty());

    h.device.send(&nack).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    let mut buf = [0u8; 16];
    assert_eq!(h.client.read(&mut buf).unwrap(), 0);
}

#[test]
fn write_is_a_pass_through() {
    let mut h = harness();
    let wire = frame(DataId::SYS_CMD, b"reset");

    let deadline = Instant::now() + Duration::from_secs(3);
    let received = loop {
        assert_eq!(h.client.write(&wire).unwrap(), wire.len());
        if let Some(message) = h.commands.recv_timeout(Duration::from_millis(20)).unwrap() {
            break message;
        }
        assert!(Instant::now() < deadline, "command never delivered");
    };
    assert_eq!(received.as_ref(), wire.as_slice());

    // write_frame frames the payload before sending.
    while h.commands.recv_timeout(Duration::from_millis(20)).unwrap().is_some() {}
    h.client.write_frame(DataId::SYS_CMD, 0, b"reset").unwrap();
    let framed = h
        .commands
        .recv_timeout(Duration::from_secs(1))
        .unwrap()
        .expect("framed command should arrive");
    assert_eq!(framed.as_ref(), wire.as_slice());
}
