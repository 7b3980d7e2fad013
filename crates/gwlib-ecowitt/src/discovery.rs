//! Gateway LAN discovery.
//!
//! Gateways periodically broadcast a UDP datagram to port 59387. Discovery
//! listens on that port for a fixed window and reports every distinct
//! sender address. The datagram contents are not inspected.
//!
//! # Usage
//!
//! ```no_run
//! use gwlib_ecowitt::discovery;
//!
//! # async fn example() -> gwlib_core::Result<()> {
//! let gateways = discovery::discover(discovery::DEFAULT_DISCOVERY_WINDOW).await?;
//! for ip in &gateways {
//!     println!("gateway at {ip}");
//! }
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use gwlib_core::error::{Result, TransportError};
use tokio::net::UdpSocket;
use tokio::time::Instant;

/// UDP port gateways broadcast their presence to.
pub const DISCOVERY_PORT: u16 = 59387;

/// How long [`discover`] listens by default.
pub const DEFAULT_DISCOVERY_WINDOW: Duration = Duration::from_secs(5);

/// Listen for gateway broadcasts on the default port for `window`.
///
/// Returns each responding address once, in the order first heard.
pub async fn discover(window: Duration) -> Result<Vec<IpAddr>> {
    discover_on_port(DISCOVERY_PORT, window).await
}

/// Listen for gateway broadcasts on a specific port.
///
/// The whole window is waited out unless the socket keeps failing; the
/// socket is closed when listening ends, whether or not anything arrived.
pub async fn discover_on_port(port: u16, window: Duration) -> Result<Vec<IpAddr>> {
    let bind_addr = format!("0.0.0.0:{}", port);
    let socket = UdpSocket::bind(&bind_addr)
        .await
        .map_err(|source| TransportError::Connection {
            addr: bind_addr.clone(),
            source,
        })?;

    tracing::debug!(port = port, window_ms = window.as_millis(), "Listening for gateway broadcasts");

    let found = {
        let socket = &socket;
        collect_responders(
            move || async move {
                let mut buf = [0u8; 1024];
                let (n, src_addr) = socket.recv_from(&mut buf).await?;
                tracing::trace!(from = %src_addr, bytes = n, "Discovery datagram");
                Ok::<_, std::io::Error>(src_addr)
            },
            window,
        )
        .await
    };

    drop(socket);
    tracing::debug!(count = found.len(), "Discovery complete");
    Ok(found)
}

/// Consecutive receive errors after which listening stops early.
const MAX_RECV_ERRORS: u32 = 8;

/// Pause after a receive error before trying again.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Call `recv` until `window` elapses, collecting distinct sender addresses.
async fn collect_responders<F, Fut>(mut recv: F, window: Duration) -> Vec<IpAddr>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<SocketAddr>>,
{
    let mut found = Vec::new();
    let mut errors = 0u32;
    let deadline = Instant::now() + window;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, recv()).await {
            Ok(Ok(src_addr)) => {
                errors = 0;
                if record_responder(&mut found, src_addr.ip()) {
                    tracing::debug!(ip = %src_addr.ip(), "Discovered gateway");
                }
            }
            Ok(Err(e)) => {
                errors += 1;
                if errors >= MAX_RECV_ERRORS {
                    tracing::warn!(
                        error = %e,
                        errors = errors,
                        "Discovery socket keeps failing, stopping early"
                    );
                    break;
                }
                tracing::trace!(error = %e, "Discovery recv error");
                tokio::time::sleep_until((Instant::now() + RECV_ERROR_BACKOFF).min(deadline)).await;
            }
            Err(_) => break,
        }
    }

    found
}

/// Add `ip` to `found` unless already present. Returns `true` if added.
fn record_responder(found: &mut Vec<IpAddr>, ip: IpAddr) -> bool {
    if found.contains(&ip) {
        false
    } else {
        found.push(ip);
        true
    }
}
