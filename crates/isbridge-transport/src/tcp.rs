use std::io::{ErrorKind, Read};
use std::net::TcpStream;
use std::time::Duration;

use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::{StreamError, StreamResult, TransportError};
use crate::net::{configure, write_all_until};
use crate::traits::{Open, Stream};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Where a [`TcpClient`] connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpTarget {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
}

impl TcpTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Point-to-point TCP stream with non-blocking reads.
#[derive(Default)]
pub struct TcpClient {
    stream: Option<TcpStream>,
    endpoint: Option<Endpoint>,
}

impl TcpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and open in one step.
    pub fn connect(target: TcpTarget) -> StreamResult<Self> {
        let mut client = Self::new();
        client.open(target)?;
        Ok(client)
    }

    fn stream(&mut self) -> StreamResult<&mut TcpStream> {
        self.stream.as_mut().ok_or(StreamError::NotOpen)
    }
}

impl Open for TcpClient {
    type Target = TcpTarget;

    fn open(&mut self, target: TcpTarget) -> StreamResult<()> {
        if target.host.is_empty() {
            return Err(StreamError::InvalidTarget("empty host".to_string()));
        }
        self.close()?;

        let endpoint = Endpoint::new(target.host, target.port);
        let mut last_err = None;
        for addr in endpoint.resolve()? {
            match TcpStream::connect_timeout(&addr, target.connect_timeout) {
                Ok(stream) => {
                    configure(&stream)?;
                    debug!(%endpoint, "tcp stream opened");
                    self.stream = Some(stream);
                    self.endpoint = Some(endpoint);
                    return Ok(());
                }
                Err(err) => last_err = Some(err),
            }
        }

        let source = last_err.unwrap_or_else(|| ErrorKind::AddrNotAvailable.into());
        Err(TransportError::Connect {
            addr: endpoint.to_string(),
            source,
        }
        .into())
    }
}

impl Stream for TcpClient {
    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        let stream = self.stream()?;
        if buf.is_empty() {
            return Err(StreamError::EmptyBuffer);
        }
        loop {
            match stream.read(buf) {
                Ok(0) => return Err(StreamError::Disconnected),
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(0),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> StreamResult<usize> {
        let stream = self.stream()?;
        if data.is_empty() {
            return Err(StreamError::EmptyBuffer);
        }
        write_all_until(stream, data, DEFAULT_WRITE_TIMEOUT)?;
        Ok(data.len())
    }

    fn close(&mut self) -> StreamResult<()> {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            if let Some(endpoint) = self.endpoint.take() {
                debug!(%endpoint, "tcp stream closed");
            }
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn describe(&self) -> String {
        match (&self.stream, &self.endpoint) {
            (Some(_), Some(endpoint)) => format!("TCP {}:{}", endpoint.host(), endpoint.port()),
            _ => "TCP (closed)".to_string(),
        }
    }
}
