//! Non-blocking socket helpers shared by the transports.

use std::io::{self, ErrorKind, Read, Write};
use std::net::TcpStream;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::BytesMut;

const READ_CHUNK_SIZE: usize = 4 * 1024;
const WRITE_RETRY_DELAY: Duration = Duration::from_millis(1);

/// State of a socket after draining what it had buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Drain {
    /// Still connected; `usize` bytes were appended.
    Open(usize),
    /// The peer closed the connection after `usize` more bytes.
    Closed(usize),
}

/// Append everything currently readable from a non-blocking `stream` to
/// `dst`, stopping after `limit` bytes so one chatty peer cannot starve others.
pub(crate) fn drain_available(
    stream: &mut TcpStream,
    dst: &mut BytesMut,
    limit: usize,
) -> io::Result<Drain> {
    let mut total = 0usize;
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    while total < limit {
        match stream.read(&mut chunk) {
            Ok(0) => return Ok(Drain::Closed(total)),
            Ok(n) => {
                dst.extend_from_slice(&chunk[..n]);
                total += n;
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => break,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(Drain::Open(total))
}

/// Write all of `data` to a non-blocking `stream`, giving up after `timeout`.
pub(crate) fn write_all_until(
    stream: &mut TcpStream,
    data: &[u8],
    timeout: Duration,
) -> io::Result<()> {
    let deadline = Instant::now() + timeout;
    let mut written = 0usize;
    while written < data.len() {
        match stream.write(&data[written..]) {
            Ok(0) => return Err(io::Error::from(ErrorKind::WriteZero)),
            Ok(n) => written += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(io::Error::from(ErrorKind::TimedOut));
                }
                std::thread::sleep(WRITE_RETRY_DELAY);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

/// Put an accepted or connected socket into the mode every transport expects.
pub(crate) fn configure(stream: &TcpStream) -> io::Result<()> {
    stream.set_nonblocking(true)?;
    stream.set_nodelay(true)
}

/// Lock ignoring poisoning; the guarded socket sets stay consistent across panics.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use super::*;

    fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        configure(&client).unwrap();
        configure(&server).unwrap();
        (client, server)
    }

    #[test]
    fn drain_reports_open_then_closed() {
        let (mut client, mut server) = pair();
        let mut buf = BytesMut::new();

        assert_eq!(drain_available(&mut server, &mut buf, 1024).unwrap(), Drain::Open(0));

        write_all_until(&mut client, b"abc", Duration::from_secs(1)).unwrap();
        drop(client);

        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Drain::Closed(_) = drain_available(&mut server, &mut buf, 1024).unwrap() {
                break;
            }
            assert!(Instant::now() < deadline, "close never observed");
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(buf.as_ref(), b"abc");
    }
}
