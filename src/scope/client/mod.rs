use super::protocol::{DEFAULT_PORT, Protocol, REPLY_READ_SIZE};
use super::transport::{TcpTransport, Transport};
use crate::error::ScopeError;
use log::{debug, info};
use std::time::Duration;

pub mod acquire;
pub mod channels;
pub mod trigger;
pub mod waveform;

/// Connection configuration for the scope TCP client.
///
/// Contains timeout settings for the connection lifecycle plus the
/// end-of-block wait used during waveform transfers.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ds1000z::ConnectionConfig;
///
/// // Use default timeouts
/// let config = ConnectionConfig::default();
///
/// // Give a slow network link more time between data packets
/// let config = ConnectionConfig {
///     end_of_block_timeout: Duration::from_millis(250),
///     ..ConnectionConfig::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for establishing the initial TCP connection
    pub connect_timeout: Duration,
    /// Timeout for a single blocking read, `None` blocks indefinitely
    pub read_timeout: Option<Duration>,
    /// Timeout for writing a command, `None` blocks indefinitely
    pub write_timeout: Option<Duration>,
    /// How long to wait for further packets before a data block is considered
    /// complete. This is a heuristic: a link that pauses longer than this
    /// mid-block truncates the transfer.
    pub end_of_block_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Some(Duration::from_secs(10)),
            write_timeout: Some(Duration::from_secs(5)),
            end_of_block_timeout: Duration::from_millis(100),
        }
    }
}

/// Builder for constructing [`ScopeClient`] instances over TCP.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use ds1000z::ScopeClient;
///
/// let client = ScopeClient::builder()
///     .address("192.168.1.50")
///     .port(5555)
///     .connect_timeout(Duration::from_secs(2))
///     .build()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Default)]
pub struct ScopeClientBuilder {
    address: Option<String>,
    port: Option<u16>,
    config: ConnectionConfig,
}

impl ScopeClientBuilder {
    pub fn address(mut self, addr: &str) -> Self {
        self.address = Some(addr.to_string());
        self
    }

    /// Defaults to 5555, the DS1000Z raw socket port
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the full connection configuration
    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    pub fn end_of_block_timeout(mut self, timeout: Duration) -> Self {
        self.config.end_of_block_timeout = timeout;
        self
    }

    /// Connect and build the client
    pub fn build(self) -> Result<ScopeClient<TcpTransport>, ScopeError> {
        let address = self
            .address
            .ok_or_else(|| ScopeError::Protocol("Address must be specified".to_string()))?;
        let port = self.port.unwrap_or(DEFAULT_PORT);

        info!("Connecting to oscilloscope at {address}:{port}");
        let transport = TcpTransport::connect(&address, port, &self.config)?;
        info!("Connected to oscilloscope at {}", transport.peer());

        Ok(ScopeClient::with_transport(transport, self.config))
    }
}

/// Client for a DS1000Z oscilloscope.
///
/// Owns one persistent connection. Every call is a synchronous request/reply
/// exchange; nothing is pipelined.
///
/// # Examples
///
/// ```no_run
/// use ds1000z::{Channel, ScopeClient};
///
/// let mut client = ScopeClient::new("192.168.1.50", 5555)?;
///
/// let depth = client.memory_depth()?;
/// let samples = client.fetch_channel(Channel::Chan1)?;
/// assert_eq!(samples.len(), depth);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ScopeClient<T: Transport = TcpTransport> {
    transport: T,
    config: ConnectionConfig,
}

impl ScopeClient<TcpTransport> {
    /// Connect with default configuration
    pub fn new(addr: &str, port: u16) -> Result<Self, ScopeError> {
        Self::builder().address(addr).port(port).build()
    }

    pub fn builder() -> ScopeClientBuilder {
        ScopeClientBuilder::default()
    }
}

impl<T: Transport> ScopeClient<T> {
    /// Wrap an already established transport
    pub fn with_transport(transport: T, config: ConnectionConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Send a command that produces no reply
    pub fn command(&mut self, command: &str) -> Result<(), ScopeError> {
        debug!("-> {command}");
        self.transport.send_line(command)
    }

    /// Send a command and return its single-line ASCII reply without the terminator
    pub fn command_with_reply(&mut self, command: &str) -> Result<String, ScopeError> {
        self.command(command)?;
        let reply = self.transport.receive(REPLY_READ_SIZE)?;
        let text = Protocol::decode_reply(&reply).map_err(|e| match e {
            ScopeError::Protocol(message) => ScopeError::Protocol(format!("{command}: {message}")),
            other => other,
        })?;
        debug!("<- {text}");
        Ok(text)
    }

    pub fn query_f64(&mut self, command: &str) -> Result<f64, ScopeError> {
        let reply = self.command_with_reply(command)?;
        reply.trim().parse::<f64>().map_err(|_| {
            ScopeError::Protocol(format!("{command}: expected a number, got {reply:?}"))
        })
    }

    /// Close the connection. Further calls fail with [`ScopeError::Closed`].
    pub fn close(&mut self) {
        self.transport.close();
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::mock::{MockHandle, MockTransport};

    fn mock_client(replies: &[(&str, &str)]) -> (ScopeClient<MockTransport>, MockHandle) {
        let (transport, handle) = MockTransport::scripted(replies);
        (ScopeClient::with_transport(transport, ConnectionConfig::default()), handle)
    }

    #[test]
    fn test_command_sends_line() {
        let (mut client, handle) = mock_client(&[]);
        client.command(":WAV:MODE RAW").unwrap();
        assert_eq!(handle.sent(), vec![":WAV:MODE RAW".to_string()]);
    }

    #[test]
    fn test_command_with_reply_strips_final_byte() {
        let (mut client, _) = mock_client(&[(":ACQ:MDEP?", "AUTO\n")]);
        assert_eq!(client.command_with_reply(":ACQ:MDEP?").unwrap(), "AUTO");
    }

    #[test]
    fn test_command_with_reply_empty_is_protocol_error() {
        let (mut client, _) = mock_client(&[(":ACQ:MDEP?", "")]);
        // Empty packets are never delivered, so the read runs dry
        assert!(client.command_with_reply(":ACQ:MDEP?").is_err());

        let (transport, _) = MockTransport::new(|_| vec![vec![0x80, 0x81, b'\n']]);
        let mut client = ScopeClient::with_transport(transport, ConnectionConfig::default());
        let err = client.command_with_reply(":ACQ:MDEP?").unwrap_err();
        assert!(matches!(err, ScopeError::Protocol(_)));

        let message = err.to_string();
        assert!(message.starts_with("Protocol error: :ACQ:MDEP?: Reply is not ASCII"));
        assert_eq!(message.matches("Protocol error").count(), 1);
    }

    #[test]
    fn test_numeric_queries() {
        let (mut client, _) = mock_client(&[
            (":ACQ:SRAT?", "1.000000e+09\n"),
            (":TIM:SCAL?", "fast\n"),
        ]);
        assert_eq!(client.query_f64(":ACQ:SRAT?").unwrap(), 1.0e9);
        assert!(matches!(
            client.query_f64(":TIM:SCAL?"),
            Err(ScopeError::Protocol(_))
        ));
    }

    #[test]
    fn test_close_twice() {
        let (mut client, handle) = mock_client(&[]);
        client.close();
        client.close();
        assert!(client.is_closed());
        assert_eq!(handle.closes(), 1);
        assert!(matches!(client.command("*IDN?"), Err(ScopeError::Closed)));
    }
}
