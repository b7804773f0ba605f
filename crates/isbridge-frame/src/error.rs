/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// No preamble was found in the buffer.
    #[error("no frame found (missing preamble)")]
    NoFrame,

    /// The buffer ends before the frame the header declares.
    #[error("truncated frame ({needed} bytes needed, {available} available)")]
    Truncated { needed: usize, available: usize },

    /// The trailing checksum does not match the framed bytes.
    #[error("checksum mismatch (frame carries {expected:#06x}, computed {computed:#06x})")]
    ChecksumInvalid { expected: u16, computed: u16 },

    /// The payload does not fit the length field or the destination buffer.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The frame checksum is valid but its packet type is not recognized.
    #[error("unknown packet type {0:#04x}")]
    UnknownPacketType(u8),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True for errors that describe malformed bytes rather than I/O failures.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            FrameError::NoFrame
                | FrameError::Truncated { .. }
                | FrameError::ChecksumInvalid { .. }
                | FrameError::PayloadTooLarge { .. }
                | FrameError::UnknownPacketType(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
