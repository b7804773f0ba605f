//! Checksummed binary packet framing for inertial sensor streams.
//!
//! Every frame carries:
//! - A 2-byte preamble (`0xEF 0x49`) marking the start of a frame
//! - A 6-byte header: flags (packet type), data identifier, payload length, offset
//! - The payload
//! - A 2-byte running checksum over header and payload
//!
//! [`decode_frame`] and [`encode_frame`] work on plain byte buffers and do no
//! I/O. [`FrameReader`] and [`FrameWriter`] apply them to byte streams.
//! The [`ascii`] module covers the NMEA-style text protocol spoken on the
//! same ports.

pub mod ascii;
#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod packet;
pub mod reader;
pub mod writer;

pub use ascii::{decode_sentence, encode_sentence, Sentence};
#[cfg(feature = "async")]
pub use async_codec::IsbCodec;
pub use codec::{
    checksum16, decode_frame, encode_frame, encode_into, encode_packet, find_preamble, Decoded,
    Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, FRAME_OVERHEAD, MAX_PAYLOAD, PKT_BUF_SIZE, PREAMBLE,
};
pub use error::{FrameError, Result};
pub use packet::{DataId, PacketType};
pub use reader::FrameReader;
pub use writer::FrameWriter;
