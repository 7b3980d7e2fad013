//! Transport implementations for gwlib.
//!
//! This crate provides the concrete implementation of the
//! [`Transport`](gwlib_core::Transport) and [`Connector`](gwlib_core::Connector)
//! traits from `gwlib-core` used to talk to a real gateway:
//!
//! - [`TcpTransport`]: one TCP connection carrying one command exchange
//! - [`TcpConnector`]: opens a fresh `TcpTransport` per command

pub mod tcp;

pub use tcp::{DEFAULT_PORT, TcpConnector, TcpTransport};
