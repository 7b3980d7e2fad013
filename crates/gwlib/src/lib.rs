//! # gwlib -- Async Client for Weather Station Gateways
//!
//! `gwlib` is an asynchronous Rust library for talking to Ecowitt-style
//! weather-station gateways (GW1000, GW1100, GW2000 and the many rebranded
//! variants) over their binary LAN protocol. It reads live sensor data, the
//! paired sensor table, rain totals, calibration and offsets, and writes
//! back rain totals, soil calibration, and upload server settings.
//!
//! ## Quick Start
//!
//! Add `gwlib` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! gwlib = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! Connect to a gateway and read live data:
//!
//! ```no_run
//! use gwlib::ecowitt::{GatewayBuilder, LiveDataOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let gateway = GatewayBuilder::new().host("192.168.1.20").build()?;
//!
//!     let data = gateway.get_live_data(LiveDataOptions::default()).await?;
//!     println!("outdoor: {:?} °C", data.outdoor_temp);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                 | Purpose                                          |
//! |-----------------------|--------------------------------------------------|
//! | `gwlib-core`          | Errors, [`Transport`] and [`Connector`] traits   |
//! | `gwlib-transport`     | Tokio TCP transport and per-command connector     |
//! | `gwlib-ecowitt`       | Frame codec, record codecs, gateway client        |
//! | `gwlib-test-harness`  | Mock connector and mock gateway for tests         |
//! | **`gwlib`**           | This facade crate -- re-exports everything       |
//!
//! ## Connections
//!
//! Gateways handle one command per connection. Every operation therefore
//! opens a fresh TCP connection, sends one frame, reads one reply, and
//! closes the connection, all within a single deadline (2000 ms by
//! default). Nothing is retried; a timed-out write may still have been
//! applied by the gateway.
//!
//! ## Discovery
//!
//! Gateways announce themselves with UDP broadcasts. Listen for them with
//! [`EcowittGateway::discover`](ecowitt::EcowittGateway::discover):
//!
//! ```no_run
//! use gwlib::ecowitt::{DEFAULT_DISCOVERY_WINDOW, EcowittGateway};
//!
//! # async fn example() -> gwlib::Result<()> {
//! for ip in EcowittGateway::discover(DEFAULT_DISCOVERY_WINDOW).await? {
//!     println!("gateway at {ip}");
//! }
//! # Ok(())
//! # }
//! ```

pub use gwlib_core::*;

/// Transport implementations.
///
/// Provides [`TcpTransport`](transport::TcpTransport) and
/// [`TcpConnector`](transport::TcpConnector), which opens one TCP
/// connection per gateway command.
pub mod transport {
    pub use gwlib_transport::*;
}

/// Ecowitt gateway protocol backend.
///
/// Provides [`EcowittGateway`](ecowitt::EcowittGateway) and
/// [`GatewayBuilder`](ecowitt::GatewayBuilder), plus the frame and record
/// codecs for callers that want to work at the byte level.
#[cfg(feature = "ecowitt")]
pub mod ecowitt {
    pub use gwlib_ecowitt::*;
}
