pub mod client;
pub mod protocol;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{ConnectionConfig, ScopeClient, ScopeClientBuilder};
pub use protocol::Protocol;
pub use transport::{TcpTransport, Transport};
