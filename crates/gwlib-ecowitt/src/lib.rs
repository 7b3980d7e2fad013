//! Ecowitt-style weather gateway protocol backend for gwlib.
//!
//! This crate implements the binary request/response protocol spoken by
//! Ecowitt-compatible weather-station gateways (GW1000, GW1100, GW2000 and
//! relatives) on TCP port 45000. It provides:
//!
//! - **Frame codec** ([`frame`]) -- checksum, request frame encoding, and
//!   reply validation.
//! - **Command set** ([`commands`]) -- the command bytes the client sends.
//! - **Command executor** ([`exec`]) -- one connection per command, a single
//!   deadline covering connect, send, and reply.
//! - **Record codecs** ([`sensors`], [`live`], [`rain`], [`soil`],
//!   [`server`], [`device`]) -- decode gateway records and encode writes.
//! - **EcowittGateway** ([`gateway`]) -- the caller-facing client with one
//!   async method per record.
//! - **GatewayBuilder** ([`builder`]) -- fluent builder for `EcowittGateway`.
//! - **Discovery** ([`discovery`]) -- collect gateway addresses from their
//!   UDP broadcasts.
//!
//! # Example
//!
//! ```
//! use gwlib_ecowitt::commands::Command;
//! use gwlib_ecowitt::frame::{decode_and_validate, encode_frame};
//!
//! // Build a "live data" request.
//! let request = encode_frame(Command::LiveData, None).unwrap();
//! assert_eq!(request, vec![0xFF, 0xFF, 0x27, 0x03, 0x2A]);
//!
//! // Validate a write acknowledgment from the gateway.
//! let reply = [0xFF, 0xFF, 0x35, 0x04, 0x00, 0x39];
//! assert!(decode_and_validate(&reply, Command::WriteRainData).is_ok());
//! ```

pub mod builder;
pub mod commands;
pub mod device;
pub mod discovery;
pub mod exec;
pub mod frame;
pub mod gateway;
pub mod live;
pub mod rain;
mod reader;
pub mod sensors;
pub mod server;
pub mod soil;

pub use builder::GatewayBuilder;
pub use commands::Command;
pub use device::{Co2Offsets, FrequencyBand, MacAddress, OutdoorSensor, Pm25Offset, SystemParams};
pub use discovery::{DEFAULT_DISCOVERY_WINDOW, DISCOVERY_PORT};
pub use exec::{CommandExecutor, DEFAULT_COMMAND_TIMEOUT};
pub use gateway::EcowittGateway;
pub use live::{BatteryEntry, BatteryStatus, LiveData, LiveDataOptions, LowBattery};
pub use rain::{Rain, RainData, RainDataUpdate, RainPriority, RainReport, RainSource};
pub use sensors::{Sensor, SensorCategory, SensorFilter, SensorStatus, SensorType};
pub use server::{CustomServerInfo, CustomServerInfoUpdate, UploadProtocol};
pub use soil::{SoilCalibration, SoilCalibrationUpdate};
