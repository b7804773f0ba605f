use std::io::{ErrorKind, Read};

use bytes::{Buf, BytesMut};
use tracing::{debug, warn};

use crate::codec::{
    decode_frame, find_preamble, peek_payload_len, Frame, FrameConfig, PREAMBLE,
};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads validated frames from any `Read` byte stream.
///
/// Bytes before a preamble are discarded. A frame that fails validation is
/// dropped and the scan resumes one byte past its preamble, so one corrupt
/// frame never poisons the rest of the stream.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    dropped: u64,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            dropped: 0,
        }
    }

    /// Read the next valid frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) =
                next_frame(&mut self.buf, self.config.max_payload_size, &mut self.dropped)
            {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Number of frames discarded so far because they failed validation.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

/// Pull the next valid frame out of `buf`, discarding everything before it.
///
/// Returns `None` when more bytes are needed. `dropped` counts frames thrown
/// away for failing validation or exceeding `max_payload`.
pub(crate) fn next_frame(buf: &mut BytesMut, max_payload: usize, dropped: &mut u64) -> Option<Frame> {
    loop {
        match find_preamble(buf) {
            Some(start) => buf.advance(start),
            None => {
                // Keep a trailing first preamble byte; its partner may be in flight.
                let keep = usize::from(buf.last() == Some(&PREAMBLE[0]));
                let discard = buf.len() - keep;
                buf.advance(discard);
                return None;
            }
        }

        if let Some(len) = peek_payload_len(buf) {
            if len > max_payload {
                warn!(size = len, max = max_payload, "dropping oversized frame");
                *dropped += 1;
                buf.advance(1);
                continue;
            }
        }

        match decode_frame(buf) {
            Ok(decoded) => {
                let frame = decoded.to_frame();
                let end = decoded.span.end;
                buf.advance(end);
                return Some(frame);
            }
            Err(FrameError::Truncated { .. }) => return None,
            Err(err) => {
                debug!(error = %err, "dropping invalid frame");
                *dropped += 1;
                buf.advance(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::{encode_frame, FRAME_OVERHEAD};
    use crate::packet::DataId;

    fn wire(did: u8, offset: u16, payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(DataId(did), offset, payload, &mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn read_multiple_frames() {
        let mut bytes = wire(1, 0, b"one");
        bytes.extend(wire(2, 4, b"two"));
        bytes.extend(wire(3, 8, b"three"));
        let mut reader = FrameReader::new(Cursor::new(bytes));

        let f1 = reader.read_frame().unwrap();
        let f2 = reader.read_frame().unwrap();
        let f3 = reader.read_frame().unwrap();

        assert_eq!((f1.did, f1.payload.as_ref()), (DataId(1), b"one".as_ref()));
        assert_eq!((f2.offset, f2.payload.as_ref()), (4, b"two".as_ref()));
        assert_eq!((f3.offset, f3.payload.as_ref()), (8, b"three".as_ref()));
        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: wire(4, 0, b"slow"),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.did, DataId::INS_1);
        assert_eq!(frame.payload.as_ref(), b"slow");
    }

    #[test]
    fn garbage_between_frames_is_skipped() {
        let mut bytes = b"$ASC*51\r\n".to_vec();
        bytes.extend(wire(1, 0, b"first"));
        bytes.extend([0x00, 0xEF, 0x00, 0x49]);
        bytes.extend(wire(2, 0, b"second"));

        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"first");
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"second");
        assert_eq!(reader.dropped_frames(), 0);
    }

    #[test]
    fn corrupt_frame_is_dropped_and_stream_resyncs() {
        let mut bytes = wire(1, 0, b"corrupt me");
        bytes[FRAME_OVERHEAD] ^= 0x40;
        bytes.extend(wire(2, 0, b"intact"));

        let mut reader = FrameReader::new(Cursor::new(bytes));
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.did, DataId(2));
        assert_eq!(frame.payload.as_ref(), b"intact");
        assert_eq!(reader.dropped_frames(), 1);
    }

    #[test]
    fn oversized_frame_is_dropped() {
        let mut bytes = wire(1, 0, &[0xAB; 64]);
        bytes.extend(wire(2, 0, b"small"));

        let cfg = FrameConfig {
            max_payload_size: 16,
        };
        let mut reader = FrameReader::with_config(Cursor::new(bytes), cfg);
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"small");
        assert_eq!(reader.dropped_frames(), 1);
    }

    #[test]
    fn connection_closed_mid_frame() {
        let bytes = wire(1, 0, b"only-part");
        let mut reader = FrameReader::new(Cursor::new(bytes[..bytes.len() - 3].to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(wire(8, 0, b"ok")),
        };
        let mut framed = FrameReader::new(reader);
        let frame = framed.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"ok");
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        writer.send(DataId::PIMU, 0, b"ping").unwrap();
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.did, DataId::PIMU);
        assert_eq!(frame.payload.as_ref(), b"ping");
    }
}
