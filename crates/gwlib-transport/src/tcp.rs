//! TCP transport for gateway communication.
//!
//! [`TcpTransport`] implements the [`Transport`] trait over a tokio
//! `TcpStream`, and [`TcpConnector`] opens one for every command the
//! gateway client executes. The gateway listens on TCP port 45000 by
//! default and expects a new connection per request.
//!
//! # Example
//!
//! ```no_run
//! use gwlib_core::{Connector, Transport};
//! use gwlib_transport::TcpConnector;
//! use std::time::Duration;
//!
//! # async fn example() -> gwlib_core::Result<()> {
//! let connector = TcpConnector::new("192.168.1.20", 45000);
//! let mut transport = connector.connect().await?;
//!
//! // Read firmware version: FF FF 50 03 53
//! transport.send(&[0xFF, 0xFF, 0x50, 0x03, 0x53]).await?;
//!
//! let mut buf = [0u8; 512];
//! let n = transport.receive(&mut buf, Duration::from_secs(2)).await?;
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use gwlib_core::error::{Result, TransportError};
use gwlib_core::transport::{Connector, Transport};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Default gateway command port.
pub const DEFAULT_PORT: u16 = 45000;

/// TCP transport carrying a single gateway command exchange.
#[derive(Debug)]
pub struct TcpTransport {
    /// The underlying TCP stream, `None` after `close()` is called.
    stream: Option<TcpStream>,
    /// The address string for logging/debugging.
    addr: String,
}

impl TcpTransport {
    /// Connect to a TCP endpoint.
    ///
    /// The `addr` parameter should be a `host:port` string, e.g.
    /// `"192.168.1.20:45000"`. Host names are resolved by tokio. The
    /// connect itself is not bounded here; the command executor runs it
    /// under the command deadline.
    pub async fn connect(addr: &str) -> Result<Self> {
        tracing::debug!(addr = %addr, "Connecting to gateway");

        let stream = TcpStream::connect(addr).await.map_err(|e| {
            tracing::debug!(addr = %addr, error = %e, "TCP connection failed");
            connection_error(addr, e)
        })?;

        // Requests are a handful of bytes; send them without coalescing.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(
                addr = %addr,
                error = %e,
                "Failed to set TCP_NODELAY (continuing anyway)"
            );
        }

        tracing::trace!(addr = %addr, "TCP connection established");

        Ok(Self {
            stream: Some(stream),
            addr: addr.to_string(),
        })
    }

    /// Wrap an existing `TcpStream` as a `TcpTransport`.
    ///
    /// # Arguments
    ///
    /// * `stream` - An already-connected `TcpStream`
    /// * `addr` - A label for logging (typically the peer address)
    pub fn from_stream(stream: TcpStream, addr: String) -> Self {
        tracing::debug!(addr = %addr, "Wrapping existing TCP stream");
        Self {
            stream: Some(stream),
            addr,
        }
    }

    /// Get the address string this transport was connected to.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

        tracing::trace!(
            addr = %self.addr,
            bytes = data.len(),
            data = ?data,
            "Sending frame"
        );

        stream
            .write_all(data)
            .await
            .map_err(|e| connection_error(&self.addr, e))?;

        stream
            .flush()
            .await
            .map_err(|e| connection_error(&self.addr, e))?;

        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

        tracing::trace!(
            addr = %self.addr,
            buf_len = buf.len(),
            timeout_ms = timeout.as_millis(),
            "Waiting for response"
        );

        match tokio::time::timeout(timeout, stream.read(buf)).await {
            Ok(Ok(0)) => {
                tracing::debug!(addr = %self.addr, "Peer closed connection without data");
                Ok(0)
            }
            Ok(Ok(n)) => {
                tracing::trace!(
                    addr = %self.addr,
                    bytes = n,
                    data = ?&buf[..n],
                    "Received response"
                );
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::debug!(addr = %self.addr, error = %e, "Failed to receive data");
                Err(connection_error(&self.addr, e).into())
            }
            Err(_) => {
                tracing::trace!(
                    addr = %self.addr,
                    timeout_ms = timeout.as_millis(),
                    "Timeout waiting for response"
                );
                Err(TransportError::Timeout(timeout).into())
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::trace!(
                    addr = %self.addr,
                    error = %e,
                    "Failed to shutdown TCP stream (continuing anyway)"
                );
            }
            tracing::trace!(addr = %self.addr, "TCP connection closed");
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

/// Opens a new [`TcpTransport`] to one gateway for every command.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    /// Create a connector for `host` and `port`.
    ///
    /// IPv6 literals are bracketed automatically.
    pub fn new(host: &str, port: u16) -> Self {
        let addr = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };
        Self { addr }
    }

    /// Create a connector from a ready-made `host:port` string.
    pub fn from_addr(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        let transport = TcpTransport::connect(&self.addr).await?;
        Ok(Box::new(transport))
    }

    fn peer(&self) -> &str {
        &self.addr
    }
}

fn connection_error(addr: &str, source: std::io::Error) -> TransportError {
    TransportError::Connection {
        addr: addr.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwlib_core::Error;
    use tokio::net::TcpListener;

    /// Helper: bind a TcpListener on a random available port and return it
    /// along with its address string.
    async fn test_listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    #[tokio::test]
    async fn connect_send_receive() {
        let (listener, addr) = test_listener().await;

        // Server echoes the request back.
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = stream.read(&mut buf).await.unwrap();
            stream.write_all(&buf[..n]).await.unwrap();
            stream.flush().await.unwrap();
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        assert!(transport.is_connected());

        let frame = [0xFF, 0xFF, 0x50, 0x03, 0x53];
        transport.send(&frame).await.unwrap();

        let mut buf = [0u8; 64];
        let n = transport
            .receive(&mut buf, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(&buf[..n], &frame);

        transport.close().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn connect_refused() {
        // Bind a listener and immediately drop it so the port is not listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = TcpTransport::connect(&addr).await.unwrap_err();
        match err {
            Error::Transport(TransportError::Connection { addr: a, source }) => {
                assert_eq!(a, addr);
                assert_eq!(source.kind(), std::io::ErrorKind::ConnectionRefused);
            }
            other => panic!("expected Connection error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn receive_timeout() {
        let (listener, addr) = test_listener().await;

        // Server accepts but sends nothing
        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();

        let mut buf = [0u8; 64];
        let result = transport
            .receive(&mut buf, Duration::from_millis(100))
            .await;
        assert!(matches!(
            result,
            Err(Error::Transport(TransportError::Timeout(_)))
        ));

        transport.close().await.unwrap();
        server.abort();
    }

    #[tokio::test]
    async fn peer_close_reads_zero_bytes() {
        let (listener, addr) = test_listener().await;

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        server.await.unwrap();

        let mut buf = [0u8; 64];
        let n = transport
            .receive(&mut buf, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn send_after_close_returns_not_connected() {
        let (listener, addr) = test_listener().await;

        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        transport.close().await.unwrap();
        assert!(!transport.is_connected());

        let result = transport.send(b"late").await;
        assert!(matches!(
            result,
            Err(Error::Transport(TransportError::NotConnected))
        ));

        // Closing again is a no-op.
        transport.close().await.unwrap();

        server.abort();
    }

    #[tokio::test]
    async fn connector_opens_fresh_connection_each_time() {
        let (listener, addr) = test_listener().await;

        let server = tokio::spawn(async move {
            for _ in 0..2 {
                let (_stream, _) = listener.accept().await.unwrap();
            }
        });

        let connector = TcpConnector::from_addr(addr.clone());
        assert_eq!(connector.peer(), addr);

        let mut first = connector.connect().await.unwrap();
        let mut second = connector.connect().await.unwrap();
        assert!(first.is_connected());
        assert!(second.is_connected());
        first.close().await.unwrap();
        second.close().await.unwrap();

        server.await.unwrap();
    }

    #[test]
    fn connector_formats_addresses() {
        assert_eq!(TcpConnector::new("192.168.1.20", 45000).peer(), "192.168.1.20:45000");
        assert_eq!(TcpConnector::new("gw.local", 4500).peer(), "gw.local:4500");
        assert_eq!(TcpConnector::new("fe80::1", 45000).peer(), "[fe80::1]:45000");
    }
}
