//! One-shot command execution.
//!
//! [`CommandExecutor`] runs exactly one command per call: it opens a fresh
//! connection, sends one frame, treats the first read as the complete
//! reply, closes the connection, and validates the reply. There is no
//! connection reuse and no pipelining, so concurrent calls never see each
//! other's replies.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace, warn};

use gwlib_core::error::{Result, TransportError};
use gwlib_core::transport::{Connector, Transport};

use crate::commands::Command;
use crate::frame;

/// Default time allowed for connect, send, and reply together.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(2000);

/// Size of the buffer handed to the single response read.
const RESPONSE_BUF_LEN: usize = 4096;

/// Executes gateway commands over short-lived connections.
#[derive(Clone)]
pub struct CommandExecutor {
    connector: Arc<dyn Connector>,
    timeout: Duration,
}

impl CommandExecutor {
    /// Create an executor that opens connections through `connector`.
    pub fn new(connector: Arc<dyn Connector>, timeout: Duration) -> Self {
        CommandExecutor { connector, timeout }
    }

    /// The per-command deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The gateway address, for logging.
    pub fn peer(&self) -> &str {
        self.connector.peer()
    }

    /// Send `command` with an optional payload and return the validated reply.
    ///
    /// The deadline starts when the connection is opened. If the reply has
    /// not arrived by then the call fails with
    /// [`TransportError::Timeout`]. The connection is closed exactly once
    /// on every path after it has been opened, before the reply is validated.
    pub async fn execute(&self, command: Command, payload: Option<&[u8]>) -> Result<Vec<u8>> {
        let request = frame::encode_frame(command, payload)?;
        let deadline = Instant::now() + self.timeout;

        debug!(
            addr = %self.connector.peer(),
            command = %command,
            payload_len = payload.map_or(0, <[u8]>::len),
            "Executing command"
        );

        let mut transport = match tokio::time::timeout_at(deadline, self.connector.connect()).await
        {
            Ok(connected) => connected?,
            Err(_) => {
                debug!(addr = %self.connector.peer(), command = %command, "Connect timed out");
                return Err(TransportError::Timeout(self.timeout).into());
            }
        };

        let outcome = tokio::time::timeout_at(
            deadline,
            exchange(transport.as_mut(), &request, deadline),
        )
        .await;

        if let Err(e) = transport.close().await {
            warn!(addr = %self.connector.peer(), error = %e, "Failed to close connection");
        }

        let response = match outcome {
            Ok(received) => received?,
            Err(_) => {
                debug!(
                    addr = %self.connector.peer(),
                    command = %command,
                    timeout_ms = self.timeout.as_millis(),
                    "Command timed out"
                );
                return Err(TransportError::Timeout(self.timeout).into());
            }
        };

        frame::decode_and_validate(&response, command)?;
        trace!(command = %command, bytes = response.len(), "Response validated");
        Ok(response)
    }
}

impl std::fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("peer", &self.connector.peer())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Send one frame and take the first read as the reply.
async fn exchange(
    transport: &mut dyn Transport,
    request: &[u8],
    deadline: Instant,
) -> Result<Vec<u8>> {
    transport.send(request).await?;

    let mut buf = vec![0u8; RESPONSE_BUF_LEN];
    let remaining = deadline.saturating_duration_since(Instant::now());
    let n = transport.receive(&mut buf, remaining).await?;
    buf.truncate(n);
    Ok(buf)
}
