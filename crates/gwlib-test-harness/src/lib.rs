//! gwlib-test-harness: Test utilities and mock gateways for gwlib.
//!
//! This crate provides [`MockConnector`] for deterministic unit testing of
//! protocol engines without a gateway or a network, and
//! [`MockGatewayServer`] for end-to-end tests over loopback TCP.

pub mod mock_connector;
pub mod mock_tcp;

pub use mock_connector::{MockConnector, MockTransport};
pub use mock_tcp::MockGatewayServer;
