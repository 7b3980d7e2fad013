//! Transport and connector traits for gateway communication.
//!
//! The gateway protocol opens a fresh connection for every command: one
//! request frame goes out, one response comes back, and the connection is
//! torn down. [`Connector`] produces those short-lived connections and
//! [`Transport`] is the byte-level channel each one exposes.
//!
//! Protocol engines (the command executor in `gwlib-ecowitt`) operate on a
//! `Connector` rather than directly on a TCP socket, enabling both real
//! network use (`TcpConnector` from `gwlib-transport`) and deterministic
//! testing with `MockConnector` from the `gwlib-test-harness` crate.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a gateway.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the gateway.
    ///
    /// Implementations should wait until all bytes have been handed to the
    /// underlying socket.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the gateway into the provided buffer.
    ///
    /// Returns the number of bytes delivered by a single read. `Ok(0)` means
    /// the peer closed the connection without sending anything. Waits up to
    /// `timeout`; returns
    /// [`TransportError::Timeout`](crate::error::TransportError::Timeout)
    /// if no data arrives within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the connection.
    ///
    /// After `close()`, `send()` and `receive()` return
    /// [`TransportError::NotConnected`](crate::error::TransportError::NotConnected).
    /// Closing twice is a no-op.
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}

/// Opens a new [`Transport`] to a fixed gateway address on demand.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a new connection.
    async fn connect(&self) -> Result<Box<dyn Transport>>;

    /// The address connections are opened to, for logging.
    fn peer(&self) -> &str;
}
