use crate::error::StreamResult;

/// One logical bidirectional channel over some transport.
///
/// A stream is either open or closed. Every call other than `describe` and
/// `close` on a closed stream fails with [`StreamError::NotOpen`](crate::StreamError::NotOpen).
/// `close` is idempotent.
pub trait Stream: Send {
    /// Read whatever is available into `buf` without blocking.
    ///
    /// `Ok(0)` means "nothing right now", not end of stream.
    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize>;

    /// Write `data`, returning the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> StreamResult<usize>;

    /// Release the underlying transport. Closing a closed stream is a no-op.
    fn close(&mut self) -> StreamResult<()>;

    fn is_open(&self) -> bool;

    /// Human-readable endpoint summary reflecting the open/closed state.
    fn describe(&self) -> String;
}

/// Streams that can be (re)opened against a transport-specific target.
pub trait Open: Stream {
    type Target;

    /// Open against `target`, closing any previous connection first.
    fn open(&mut self, target: Self::Target) -> StreamResult<()>;
}
