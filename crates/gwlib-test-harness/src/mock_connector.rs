//! In-memory connector for deterministic testing of protocol engines.
//!
//! [`MockConnector`] implements the [`Connector`] trait with a script of
//! pre-loaded exchanges. Every `connect()` hands out a [`MockTransport`]
//! that serves the next scripted exchange, so a test can check what was
//! sent, how many connections were opened, and how many were closed,
//! without touching the network.
//!
//! # Example
//!
//! ```
//! use gwlib_test_harness::MockConnector;
//!
//! let mock = MockConnector::new();
//! // When the client sends "read firmware", reply with a firmware frame.
//! mock.expect(&[0xFF, 0xFF, 0x50, 0x03, 0x53],
//!             &[0xFF, 0xFF, 0x50, 0x06, 0x02, 0x56, 0x31, 0xDF]);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use gwlib_core::error::{Result, TransportError};
use gwlib_core::transport::{Connector, Transport};

const MOCK_PEER: &str = "mock-gateway:45000";

/// What the mock gateway does after receiving a request.
#[derive(Debug, Clone)]
enum Reply {
    /// Send these bytes (possibly none, which reads as a hang-up).
    Respond(Vec<u8>),
    /// Never answer.
    Silence,
}

/// One scripted connection.
#[derive(Debug, Clone)]
enum Script {
    /// Accept the connection and serve one request/reply exchange.
    Exchange { request: Vec<u8>, reply: Reply },
    /// Refuse the connection.
    Refuse,
}

#[derive(Debug, Default)]
struct MockState {
    script: VecDeque<Script>,
    connections: usize,
    closes: usize,
    sent: Vec<Vec<u8>>,
}

/// A scripted [`Connector`] for tests.
///
/// Clones share the same script and counters, so a test can keep one clone
/// for assertions and hand another to the code under test.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    /// Create an empty mock connector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next connection: expect `request`, reply with `response`.
    ///
    /// An empty `response` simulates the gateway closing the connection
    /// without sending anything.
    pub fn expect(&self, request: &[u8], response: &[u8]) {
        self.lock().script.push_back(Script::Exchange {
            request: request.to_vec(),
            reply: Reply::Respond(response.to_vec()),
        });
    }

    /// Script the next connection: expect `request`, then never reply.
    pub fn expect_silence(&self, request: &[u8]) {
        self.lock().script.push_back(Script::Exchange {
            request: request.to_vec(),
            reply: Reply::Silence,
        });
    }

    /// Script the next connection attempt to be refused.
    pub fn refuse_next(&self) {
        self.lock().script.push_back(Script::Refuse);
    }

    /// Number of connections successfully opened.
    pub fn connections(&self) -> usize {
        self.lock().connections
    }

    /// Number of `close()` calls, including repeated calls on a connection
    /// that is already closed.
    pub fn closes(&self) -> usize {
        self.lock().closes
    }

    /// Every frame sent, in order, across all connections.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    /// Number of scripted connections not yet consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.lock().script.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // Poisoned by a panicking test; the state is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        let mut state = self.lock();
        let script = match state.script.pop_front() {
            Some(Script::Refuse) => {
                return Err(mock_error(std::io::ErrorKind::ConnectionRefused, "connection refused").into());
            }
            Some(Script::Exchange { request, reply }) => Some((request, reply)),
            None => None,
        };
        state.connections += 1;
        drop(state);

        Ok(Box::new(MockTransport {
            state: Arc::clone(&self.state),
            script,
            pending: None,
            connected: true,
        }))
    }

    fn peer(&self) -> &str {
        MOCK_PEER
    }
}

/// One connection handed out by [`MockConnector`].
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    /// The exchange this connection serves, `None` if the script ran out.
    script: Option<(Vec<u8>, Reply)>,
    /// Reply armed by a matching `send()`.
    pending: Option<Reply>,
    connected: bool,
}

impl MockTransport {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(TransportError::NotConnected.into());
        }

        self.lock().sent.push(data.to_vec());

        match self.script.take() {
            Some((request, reply)) if request == data => {
                self.pending = Some(reply);
                Ok(())
            }
            Some((request, _)) => Err(mock_error(
                std::io::ErrorKind::InvalidInput,
                &format!(
                    "unexpected send data: expected {:02X?}, got {:02X?}",
                    request, data
                ),
            )
            .into()),
            None => Err(mock_error(
                std::io::ErrorKind::InvalidInput,
                "no more expectations in mock connector",
            )
            .into()),
        }
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(TransportError::NotConnected.into());
        }

        match self.pending.take() {
            Some(Reply::Respond(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(Reply::Silence) | None => {
                tokio::time::sleep(timeout).await;
                Err(TransportError::Timeout(timeout).into())
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.lock().closes += 1;
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

fn mock_error(kind: std::io::ErrorKind, message: &str) -> TransportError {
    TransportError::Connection {
        addr: MOCK_PEER.to_string(),
        source: std::io::Error::new(kind, message.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwlib_core::Error;

    #[tokio::test]
    async fn serves_scripted_exchange() {
        let mock = MockConnector::new();
        mock.expect(&[1, 2, 3], &[4, 5, 6]);

        let mut transport = mock.connect().await.unwrap();
        transport.send(&[1, 2, 3]).await.unwrap();

        let mut buf = [0u8; 16];
        let n = transport
            .receive(&mut buf, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(&buf[..n], &[4, 5, 6]);

        transport.close().await.unwrap();
        assert_eq!(mock.connections(), 1);
        assert_eq!(mock.closes(), 1);
        assert_eq!(mock.sent(), vec![vec![1, 2, 3]]);
    }

    #[tokio::test]
    async fn every_close_call_is_counted() {
        let mock = MockConnector::new();
        mock.expect(&[1], &[2]);

        let mut transport = mock.connect().await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(!transport.is_connected());
        assert_eq!(mock.closes(), 2);
    }

    #[tokio::test]
    async fn mismatched_request_fails() {
        let mock = MockConnector::new();
        mock.expect(&[1, 2, 3], &[4, 5, 6]);

        let mut transport = mock.connect().await.unwrap();
        let err = transport.send(&[9, 9]).await.unwrap_err();
        assert!(err.to_string().contains("unexpected send data"));
    }

    #[tokio::test]
    async fn silence_times_out() {
        let mock = MockConnector::new();
        mock.expect_silence(&[1]);

        let mut transport = mock.connect().await.unwrap();
        transport.send(&[1]).await.unwrap();
        let mut buf = [0u8; 4];
        let err = transport
            .receive(&mut buf, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn refused_connection_is_not_counted() {
        let mock = MockConnector::new();
        mock.refuse_next();

        let Err(err) = mock.connect().await else {
            panic!("refused connection returned a transport");
        };
        assert!(matches!(
            err,
            Error::Transport(TransportError::Connection { .. })
        ));
        assert_eq!(mock.connections(), 0);
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn closed_transport_rejects_io() {
        let mock = MockConnector::new();
        mock.expect(&[1], &[2]);

        let mut transport = mock.connect().await.unwrap();
        transport.close().await.unwrap();
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.send(&[1]).await,
            Err(Error::Transport(TransportError::NotConnected))
        ));
    }
}
