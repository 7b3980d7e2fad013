//! Mock gateway TCP server for protocol-level testing.
//!
//! [`MockGatewayServer`] provides a loopback TCP listener pre-loaded with
//! scripted exchanges, enabling end-to-end tests of the real TCP connector
//! without a gateway on the network.
//!
//! The gateway protocol opens one connection per command, so every
//! scripted exchange is served on its own accepted connection, and the
//! server closes that connection after replying, just like the device.
//!
//! # Example
//!
//! ```
//! use gwlib_test_harness::MockGatewayServer;
//!
//! # async fn example() -> gwlib_core::Result<()> {
//! let mut server = MockGatewayServer::new().await?;
//!
//! // When the client sends "read MAC", reply with a MAC frame.
//! server.expect(
//!     &[0xFF, 0xFF, 0x26, 0x03, 0x29],
//!     &[0xFF, 0xFF, 0x26, 0x09, 0x48, 0x3F, 0xDA, 0x54, 0x14, 0xEC, 0xE4],
//! );
//!
//! let addr = server.addr().to_string();
//! server.start();
//! // ... connect a TcpConnector to `addr` and run commands ...
//! # Ok(())
//! # }
//! ```

use gwlib_core::error::{Result, TransportError};
use std::collections::VecDeque;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A pre-loaded exchange for the mock gateway server.
#[derive(Debug, Clone)]
struct TcpExpectation {
    /// The exact bytes we expect the client to send.
    request: Vec<u8>,
    /// The bytes to send back, or `None` to stay silent until the client
    /// gives up and disconnects.
    response: Option<Vec<u8>>,
}

/// A mock gateway listening on a random loopback port.
///
/// Once [`start`](MockGatewayServer::start) is called, the server accepts
/// one connection per expectation, in order. If a client sends data that
/// does not match, the server stops and [`wait`](MockGatewayServer::wait)
/// reports the mismatch.
pub struct MockGatewayServer {
    /// The address the server is listening on (e.g. "127.0.0.1:54321").
    addr: String,
    /// Listener, moved into the server task by `start()`.
    listener: Option<TcpListener>,
    /// Ordered queue of expected exchanges.
    expectations: VecDeque<TcpExpectation>,
    /// Handle to the server task once started.
    server_handle: Option<JoinHandle<std::result::Result<(), String>>>,
}

impl MockGatewayServer {
    /// Create a new mock server listening on a random port.
    ///
    /// The listener is bound immediately, so clients may connect as soon
    /// as [`start`](MockGatewayServer::start) has been called.
    pub async fn new() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| bind_error("127.0.0.1:0", e))?;
        let addr = listener
            .local_addr()
            .map_err(|e| bind_error("127.0.0.1:0", e))?
            .to_string();

        Ok(Self {
            addr,
            listener: Some(listener),
            expectations: VecDeque::new(),
            server_handle: None,
        })
    }

    /// Add an expected request/response exchange on a new connection.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expectations.push_back(TcpExpectation {
            request: request.to_vec(),
            response: Some(response.to_vec()),
        });
    }

    /// Add an exchange where the server reads `request` and never answers.
    pub fn expect_silence(&mut self, request: &[u8]) {
        self.expectations.push_back(TcpExpectation {
            request: request.to_vec(),
            response: None,
        });
    }

    /// Get the address the server is listening on.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Start serving the expectations in a background task.
    ///
    /// Call [`wait`](MockGatewayServer::wait) to block until all
    /// expectations have been processed and check for errors.
    pub fn start(&mut self) {
        let Some(listener) = self.listener.take() else {
            tracing::warn!(addr = %self.addr, "Mock gateway already started");
            return;
        };
        let expectations: Vec<TcpExpectation> = self.expectations.drain(..).collect();

        let handle = tokio::spawn(async move {
            for (i, expectation) in expectations.iter().enumerate() {
                let (stream, _) = listener
                    .accept()
                    .await
                    .map_err(|e| format!("expectation {}: accept failed: {}", i, e))?;
                serve_exchange(i, stream, expectation).await?;
            }
            Ok(())
        });

        self.server_handle = Some(handle);
    }

    /// Wait for the server task to complete and return any errors.
    pub async fn wait(self) -> std::result::Result<(), String> {
        if let Some(handle) = self.server_handle {
            handle
                .await
                .map_err(|e| format!("server task panicked: {}", e))?
        } else {
            Ok(())
        }
    }
}

async fn serve_exchange(
    i: usize,
    mut stream: TcpStream,
    expectation: &TcpExpectation,
) -> std::result::Result<(), String> {
    let mut buf = vec![0u8; expectation.request.len()];
    let mut total_read = 0;

    // Read exactly the expected number of bytes.
    while total_read < expectation.request.len() {
        let n = stream
            .read(&mut buf[total_read..])
            .await
            .map_err(|e| format!("expectation {}: read error: {}", i, e))?;
        if n == 0 {
            return Err(format!(
                "expectation {}: client disconnected after {} bytes (expected {})",
                i,
                total_read,
                expectation.request.len()
            ));
        }
        total_read += n;
    }

    if buf != expectation.request {
        return Err(format!(
            "expectation {}: request mismatch: expected {:02X?}, got {:02X?}",
            i, expectation.request, buf
        ));
    }

    match &expectation.response {
        Some(response) => {
            stream
                .write_all(response)
                .await
                .map_err(|e| format!("expectation {}: write error: {}", i, e))?;
            stream
                .flush()
                .await
                .map_err(|e| format!("expectation {}: flush error: {}", i, e))?;
        }
        None => {
            // Hold the connection until the client times out and hangs up.
            let mut scratch = [0u8; 64];
            loop {
                match stream.read(&mut scratch).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => continue,
                }
            }
        }
    }

    Ok(())
}

fn bind_error(addr: &str, source: std::io::Error) -> TransportError {
    TransportError::Connection {
        addr: addr.to_string(),
        source,
    }
}
