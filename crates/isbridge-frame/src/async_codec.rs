//! `tokio_util` codec over the same framing rules as [`FrameReader`](crate::FrameReader).

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::reader::next_frame;

/// Frame codec for `tokio_util::codec::Framed`.
#[derive(Debug, Default, Clone)]
pub struct IsbCodec {
    config: FrameConfig,
    dropped: u64,
}

impl IsbCodec {
    pub fn new(config: FrameConfig) -> Self {
        Self { config, dropped: 0 }
    }

    /// Number of frames discarded so far because they failed validation.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }
}

impl Decoder for IsbCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        Ok(next_frame(src, self.config.max_payload_size, &mut self.dropped))
    }
}

impl Encoder<Frame> for IsbCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        if frame.payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: frame.payload.len(),
                max: self.config.max_payload_size,
            });
        }
        frame.encode(dst).map(|_| ())
    }
}
