use thiserror::Error;

use crate::types::AcquisitionMode;

#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("Failed to connect to {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error ({context}): {source}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },
    #[error("Connection timeout")]
    Timeout,
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Connection already closed")]
    Closed,
    #[error("Acquisition already in flight ({0:?})")]
    AcquisitionInFlight(AcquisitionMode),
    #[error("Acquisition thread panicked")]
    TaskPanicked,
    #[error("Invalid channel: {0}")]
    InvalidChannel(String),
    #[error("Index {index} out of range for history of length {len}")]
    InvalidIndex { index: usize, len: usize },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ScopeError {
    /// Wrap an IO error, mapping socket timeouts to [`ScopeError::Timeout`]
    pub(crate) fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        match source.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => ScopeError::Timeout,
            _ => ScopeError::Io {
                source,
                context: context.into(),
            },
        }
    }
}
