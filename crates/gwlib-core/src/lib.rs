//! gwlib-core: Core traits and error definitions for gwlib.
//!
//! This crate defines the protocol-agnostic pieces every gwlib backend
//! builds on. Applications can depend on these types without pulling in
//! the network stack.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level channel for a single command exchange
//! - [`Connector`] -- opens a fresh `Transport` per command
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod transport;

// Re-export key types at crate root for ergonomic `use gwlib_core::*`.
pub use error::{Error, ProtocolError, Result, TransportError, ValidationError};
pub use transport::{Connector, Transport};
