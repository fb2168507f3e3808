use super::client::ConnectionConfig;
use crate::error::ScopeError;
use log::{debug, warn};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Byte stream to an instrument.
///
/// Replies carry no trusted length framing, so the end of a multi-part reply
/// is detected with [`Transport::has_more_available`]: if nothing else arrives
/// within the given timeout the reply is assumed complete. This is a timing
/// heuristic and not a completeness guarantee.
pub trait Transport: Send {
    /// Write `line` followed by a single `\n`
    fn send_line(&mut self, line: &str) -> Result<(), ScopeError>;

    /// Blocking read of at most `max_bytes`; may return fewer
    fn receive(&mut self, max_bytes: usize) -> Result<Vec<u8>, ScopeError>;

    /// Wait up to `timeout` for unread bytes without consuming them
    fn has_more_available(&mut self, timeout: Duration) -> Result<bool, ScopeError>;

    /// Release the connection. Calling this more than once has no further effect.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Persistent TCP connection to an instrument's raw socket port
pub struct TcpTransport {
    stream: Option<TcpStream>,
    peer: String,
    read_timeout: Option<Duration>,
}

impl TcpTransport {
    /// Connect to `host:port`, trying every resolved address in turn
    pub fn connect(host: &str, port: u16, config: &ConnectionConfig) -> Result<Self, ScopeError> {
        let address = format!("{host}:{port}");

        let candidates: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| ScopeError::Connection {
                address: address.clone(),
                source,
            })?
            .collect();

        let mut last_error = None;
        let mut connected = None;
        for candidate in candidates {
            debug!("Connecting to {candidate}");
            match TcpStream::connect_timeout(&candidate, config.connect_timeout) {
                Ok(stream) => {
                    connected = Some(stream);
                    break;
                }
                Err(e) => {
                    warn!("Failed to connect to {candidate}: {e}");
                    last_error = Some(e);
                }
            }
        }

        let stream = connected.ok_or_else(|| ScopeError::Connection {
            address: address.clone(),
            source: last_error.unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, "no addresses resolved")
            }),
        })?;

        let configure = |stream: &TcpStream| -> io::Result<()> {
            stream.set_read_timeout(config.read_timeout)?;
            stream.set_write_timeout(config.write_timeout)?;
            stream.set_nodelay(true)
        };
        configure(&stream).map_err(|source| ScopeError::Connection {
            address: address.clone(),
            source,
        })?;

        debug!("Connected to {address}");

        Ok(Self {
            stream: Some(stream),
            peer: address,
            read_timeout: config.read_timeout,
        })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    fn stream(&mut self) -> Result<&mut TcpStream, ScopeError> {
        self.stream.as_mut().ok_or(ScopeError::Closed)
    }
}

fn connection_closed(context: &str) -> ScopeError {
    ScopeError::Io {
        source: io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed by instrument"),
        context: context.to_string(),
    }
}

impl Transport for TcpTransport {
    fn send_line(&mut self, line: &str) -> Result<(), ScopeError> {
        let stream = self.stream()?;

        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');

        stream
            .write_all(&bytes)
            .map_err(|e| ScopeError::io(e, format!("Writing command {line:?}")))
    }

    fn receive(&mut self, max_bytes: usize) -> Result<Vec<u8>, ScopeError> {
        let stream = self.stream()?;
        let mut buffer = vec![0u8; max_bytes];

        let read = loop {
            match stream.read(&mut buffer) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ScopeError::io(e, "Reading reply")),
            }
        };

        if read == 0 && max_bytes > 0 {
            return Err(connection_closed("Reading reply"));
        }

        buffer.truncate(read);
        Ok(buffer)
    }

    fn has_more_available(&mut self, timeout: Duration) -> Result<bool, ScopeError> {
        let read_timeout = self.read_timeout;
        let stream = self.stream()?;

        // A zero read timeout is rejected by the OS
        stream
            .set_read_timeout(Some(timeout.max(Duration::from_millis(1))))
            .map_err(|e| ScopeError::io(e, "Setting end-of-block timeout"))?;

        let mut next = [0u8; 1];
        let result = stream.peek(&mut next);

        stream
            .set_read_timeout(read_timeout)
            .map_err(|e| ScopeError::io(e, "Restoring read timeout"))?;

        match result {
            Ok(0) => Err(connection_closed("Waiting for more data")),
            Ok(_) => Ok(true),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(false)
            }
            Err(e) => Err(ScopeError::io(e, "Waiting for more data")),
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!("Closing connection to {}", self.peer);
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}
