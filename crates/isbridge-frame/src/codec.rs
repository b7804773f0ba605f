use std::ops::Range;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::packet::{DataId, PacketType};

/// Preamble bytes marking the start of a frame (0x49EF little-endian).
pub const PREAMBLE: [u8; 2] = [0xEF, 0x49];

/// Preamble size in bytes.
pub const PREAMBLE_SIZE: usize = 2;

/// Header after the preamble: flags (1) + data id (1) + length (2) + offset (2).
pub const HEADER_SIZE: usize = 6;

/// Trailing checksum size in bytes.
pub const CHECKSUM_SIZE: usize = 2;

/// Bytes a frame adds around its payload.
pub const FRAME_OVERHEAD: usize = PREAMBLE_SIZE + HEADER_SIZE + CHECKSUM_SIZE;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Packet buffer size used by deployed devices.
pub const PKT_BUF_SIZE: usize = 2048;

/// Default maximum payload size: whatever fits a device packet buffer.
pub const DEFAULT_MAX_PAYLOAD: usize = PKT_BUF_SIZE - FRAME_OVERHEAD;

/// A decoded frame that owns its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub packet_type: PacketType,
    pub did: DataId,
    /// Byte offset into the data set (segmented updates).
    pub offset: u16,
    pub payload: Bytes,
}

impl Frame {
    /// Create a data frame.
    pub fn new(did: DataId, offset: u16, payload: impl Into<Bytes>) -> Self {
        Self::with_type(PacketType::Data, did, offset, payload)
    }

    /// Create a frame of an explicit packet type.
    pub fn with_type(
        packet_type: PacketType,
        did: DataId,
        offset: u16,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            packet_type,
            did,
            offset,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Append the wire encoding of this frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<usize> {
        encode_packet(
            self.packet_type,
            self.did,
            self.offset,
            self.payload.as_ref(),
            dst,
        )
    }
}

/// A validated frame borrowed from the buffer it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<'a> {
    pub packet_type: PacketType,
    pub did: DataId,
    pub offset: u16,
    body: &'a [u8],
    /// Position of the whole frame (preamble through checksum) in the source buffer.
    pub span: Range<usize>,
}

impl<'a> Decoded<'a> {
    /// Payload bytes, or `None` for packet types that carry no payload.
    pub fn payload(&self) -> Option<&'a [u8]> {
        if self.packet_type.carries_payload() {
            Some(self.body)
        } else {
            None
        }
    }

    /// Copy into an owned [`Frame`]. Types without payload yield an empty one.
    pub fn to_frame(&self) -> Frame {
        Frame::with_type(
            self.packet_type,
            self.did,
            self.offset,
            Bytes::copy_from_slice(self.payload().unwrap_or_default()),
        )
    }
}

/// 16-bit running checksum: two 8-bit accumulators, `a` sums the bytes and
/// `b` sums the successive values of `a`. Result is `b << 8 | a`.
pub fn checksum16(bytes: &[u8]) -> u16 {
    let (mut a, mut b) = (0u8, 0u8);
    for &byte in bytes {
        a = a.wrapping_add(byte);
        b = b.wrapping_add(a);
    }
    (u16::from(b) << 8) | u16::from(a)
}

/// Index of the first preamble in `src`.
pub fn find_preamble(src: &[u8]) -> Option<usize> {
    src.windows(PREAMBLE_SIZE).position(|w| w == PREAMBLE)
}

/// Encode a data frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────┬───────┬──────┬──────────┬──────────┬───────────┬──────────┐
/// │ Preamble  │ Flags │ DID  │ Length   │ Offset   │ Payload   │ Checksum │
/// │ 0xEF 0x49 │ (1B)  │ (1B) │ (2B LE)  │ (2B LE)  │ (Length)  │ (2B LE)  │
/// └───────────┴───────┴──────┴──────────┴──────────┴───────────┴──────────┘
/// ```
/// The checksum covers everything between the preamble and the checksum.
pub fn encode_frame(did: DataId, offset: u16, payload: &[u8], dst: &mut BytesMut) -> Result<usize> {
    encode_packet(PacketType::Data, did, offset, payload, dst)
}

/// Encode a frame of any packet type. Returns the number of bytes appended.
pub fn encode_packet(
    packet_type: PacketType,
    did: DataId,
    offset: u16,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<usize> {
    check_payload_len(payload.len(), MAX_PAYLOAD)?;

    let total = FRAME_OVERHEAD + payload.len();
    dst.reserve(total);
    let start = dst.len();
    dst.put_slice(&PREAMBLE);
    dst.put_u8(packet_type as u8);
    dst.put_u8(did.0);
    dst.put_u16_le(payload.len() as u16);
    dst.put_u16_le(offset);
    dst.put_slice(payload);
    let checksum = checksum16(&dst[start + PREAMBLE_SIZE..]);
    dst.put_u16_le(checksum);
    Ok(total)
}

/// Encode a data frame into a fixed-capacity buffer.
///
/// Fails with [`FrameError::PayloadTooLarge`] before touching `dst` when the
/// frame would not fit.
pub fn encode_into(did: DataId, offset: u16, payload: &[u8], dst: &mut [u8]) -> Result<usize> {
    check_payload_len(payload.len(), MAX_PAYLOAD)?;
    let total = FRAME_OVERHEAD + payload.len();
    if total > dst.len() {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: dst.len().saturating_sub(FRAME_OVERHEAD),
        });
    }

    let header_end = PREAMBLE_SIZE + HEADER_SIZE;
    let body_end = header_end + payload.len();

    dst[..PREAMBLE_SIZE].copy_from_slice(&PREAMBLE);
    dst[2] = PacketType::Data as u8;
    dst[3] = did.0;
    dst[4..6].copy_from_slice(&(payload.len() as u16).to_le_bytes());
    dst[6..8].copy_from_slice(&offset.to_le_bytes());
    dst[header_end..body_end].copy_from_slice(payload);
    let checksum = checksum16(&dst[PREAMBLE_SIZE..body_end]);
    dst[body_end..total].copy_from_slice(&checksum.to_le_bytes());
    Ok(total)
}

fn check_payload_len(size: usize, max: usize) -> Result<()> {
    if size > max {
        return Err(FrameError::PayloadTooLarge { size, max });
    }
    Ok(())
}

/// Declared payload length of a frame starting at `src[0]`, once the header is present.
pub(crate) fn peek_payload_len(src: &[u8]) -> Option<usize> {
    if src.len() < PREAMBLE_SIZE + HEADER_SIZE {
        return None;
    }
    Some(u16::from_le_bytes([src[4], src[5]]) as usize)
}

/// Decode the first frame in `src`.
///
/// Scans for the preamble, then validates length and checksum. The returned
/// payload borrows from `src`.
pub fn decode_frame(src: &[u8]) -> Result<Decoded<'_>> {
    let start = find_preamble(src).ok_or(FrameError::NoFrame)?;
    let frame = &src[start..];

    let header_end = PREAMBLE_SIZE + HEADER_SIZE;
    let payload_len = peek_payload_len(frame).ok_or(FrameError::Truncated {
        needed: header_end,
        available: frame.len(),
    })?;

    let body_end = header_end + payload_len;
    let total = body_end + CHECKSUM_SIZE;
    if frame.len() < total {
        return Err(FrameError::Truncated {
            needed: total,
            available: frame.len(),
        });
    }

    let computed = checksum16(&frame[PREAMBLE_SIZE..body_end]);
    let expected = u16::from_le_bytes([frame[body_end], frame[body_end + 1]]);
    if computed != expected {
        return Err(FrameError::ChecksumInvalid { expected, computed });
    }

    let packet_type = PacketType::try_from(frame[2])?;
    Ok(Decoded {
        packet_type,
        did: DataId(frame[3]),
        offset: u16::from_le_bytes([frame[6], frame[7]]),
        body: &frame[header_end..body_end],
        span: start..start + total,
    })
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: one device packet buffer.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}
