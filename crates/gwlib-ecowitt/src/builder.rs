//! GatewayBuilder -- fluent builder for constructing [`EcowittGateway`] instances.
//!
//! Separates configuration from construction so that callers can set the
//! gateway address, command timeout, and rain source before the client is
//! created. No connection is opened at build time; every command opens its
//! own.
//!
//! # Example
//!
//! ```no_run
//! use gwlib_ecowitt::builder::GatewayBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> gwlib_core::Result<()> {
//! let gateway = GatewayBuilder::new()
//!     .host("192.168.1.20")
//!     .command_timeout(Duration::from_millis(3000))
//!     .build()?;
//! println!("{}", gateway.get_firmware_version().await?);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use gwlib_core::error::{Result, ValidationError};
use gwlib_core::transport::Connector;
use gwlib_transport::{DEFAULT_PORT, TcpConnector};

use crate::exec::{CommandExecutor, DEFAULT_COMMAND_TIMEOUT};
use crate::gateway::EcowittGateway;
use crate::rain::RainSource;

/// Fluent builder for [`EcowittGateway`].
///
/// Only the host is required:
///
/// ```ignore
/// let gateway = GatewayBuilder::new().host("192.168.1.20").build()?;
/// ```
#[derive(Debug, Clone)]
pub struct GatewayBuilder {
    host: Option<String>,
    port: u16,
    command_timeout: Duration,
    rain_source: Option<RainSource>,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayBuilder {
    /// Create a new builder with the default port and timeout.
    pub fn new() -> Self {
        GatewayBuilder {
            host: None,
            port: DEFAULT_PORT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            rain_source: None,
        }
    }

    /// Set the gateway host name or IP address.
    pub fn host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    /// Set the gateway TCP port (default: 45000).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the deadline for one command, from connect to reply
    /// (default: 2000ms).
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Pin the rain source instead of deriving it from the firmware version.
    pub fn rain_source(mut self, source: RainSource) -> Self {
        self.rain_source = Some(source);
        self
    }

    /// Build an [`EcowittGateway`] with a caller-provided connector.
    ///
    /// This is the entry point for testing (pass a `MockConnector` from
    /// `gwlib-test-harness`) and for callers that open connections their
    /// own way. The host and port settings are not used.
    pub fn build_with_connector(self, connector: impl Connector + 'static) -> Result<EcowittGateway> {
        if self.command_timeout.is_zero() {
            return Err(ValidationError::new("command_timeout", "must be greater than zero").into());
        }
        let exec = CommandExecutor::new(Arc::new(connector), self.command_timeout);
        Ok(EcowittGateway::new(exec, self.rain_source))
    }

    /// Build an [`EcowittGateway`] that talks to the gateway over TCP.
    ///
    /// Requires that [`host()`](Self::host) has been called.
    pub fn build(self) -> Result<EcowittGateway> {
        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ValidationError::new("host", "a gateway host is required"))?;
        if self.port == 0 {
            return Err(ValidationError::new("port", "must be from 1 to 65535").into());
        }

        let connector = TcpConnector::new(host, self.port);
        self.build_with_connector(connector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwlib_test_harness::MockConnector;

    #[test]
    fn builder_defaults() {
        let gateway = GatewayBuilder::new().host("192.168.1.20").build().unwrap();
        assert_eq!(gateway.peer(), "192.168.1.20:45000");
        assert_eq!(gateway.command_timeout(), Duration::from_millis(2000));
    }

    #[test]
    fn builder_fluent_chain() {
        let gateway = GatewayBuilder::new()
            .host("gw.local")
            .port(45001)
            .command_timeout(Duration::from_millis(500))
            .rain_source(RainSource::Legacy)
            .build()
            .unwrap();
        assert_eq!(gateway.peer(), "gw.local:45001");
        assert_eq!(gateway.command_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn host_is_required_for_build() {
        let err = GatewayBuilder::new().build().unwrap_err();
        assert_eq!(err.validation_field(), Some("host"));

        let err = GatewayBuilder::new().host("  ").build().unwrap_err();
        assert_eq!(err.validation_field(), Some("host"));
    }

    #[test]
    fn zero_port_and_timeout_are_rejected() {
        let err = GatewayBuilder::new().host("gw").port(0).build().unwrap_err();
        assert_eq!(err.validation_field(), Some("port"));

        let err = GatewayBuilder::new()
            .command_timeout(Duration::ZERO)
            .build_with_connector(MockConnector::new())
            .unwrap_err();
        assert_eq!(err.validation_field(), Some("command_timeout"));
    }

    #[tokio::test]
    async fn pinned_rain_source_skips_firmware_read() {
        let mock = MockConnector::new();
        let gateway = GatewayBuilder::new()
            .rain_source(RainSource::Legacy)
            .build_with_connector(mock.clone())
            .unwrap();
        assert_eq!(gateway.rain_source().await, RainSource::Legacy);
        assert_eq!(mock.connections(), 0);
    }
}
