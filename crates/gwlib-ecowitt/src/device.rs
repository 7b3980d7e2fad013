//! Read-only device records: firmware version, MAC address, sensor
//! offsets, and system parameters.

use std::fmt;

use gwlib_core::ProtocolError;

use crate::commands::Command;
use crate::frame;
use crate::reader::Reader;

/// Decode a validated `CMD_READ_FIRMWARE_VERSION` reply.
///
/// The body is a length byte followed by ASCII text.
pub fn decode_firmware(response: &[u8]) -> Result<String, ProtocolError> {
    let mut r = Reader::new(frame::body(response, Command::ReadFirmwareVersion)?, "firmware version");
    r.skip(1)?;
    let text = r.take(r.remaining())?;
    Ok(String::from_utf8_lossy(text).trim_end_matches('\0').to_string())
}

/// The gateway's station MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Upper-case hex without separators (e.g. `483FDA5414EC`).
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// Decode a validated `CMD_READ_STATION_MAC` reply.
pub fn decode_mac(response: &[u8]) -> Result<MacAddress, ProtocolError> {
    let mut r = Reader::new(frame::body(response, Command::ReadStationMac)?, "MAC address");
    let mut mac = [0u8; 6];
    mac.copy_from_slice(r.take(6)?);
    Ok(MacAddress(mac))
}

/// PM2.5 offset of one WH41/WH43 channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pm25Offset {
    /// Channel, 1-based.
    pub channel: u8,
    /// Offset in µg/m³.
    pub offset: f64,
}

/// Decode a validated `CMD_GET_PM25_OFFSET` reply.
pub fn decode_pm25_offsets(response: &[u8]) -> Result<Vec<Pm25Offset>, ProtocolError> {
    let mut r = Reader::new(frame::body(response, Command::GetPm25Offset)?, "PM2.5 offset");
    let mut offsets = Vec::with_capacity(r.remaining() / 3);
    while r.remaining() >= 3 {
        offsets.push(Pm25Offset {
            channel: r.u8()?.saturating_add(1),
            offset: f64::from(r.i16()?) / 10.0,
        });
    }
    Ok(offsets)
}

/// WH45 offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Co2Offsets {
    /// CO2 offset in ppm.
    pub co2: i16,
    /// PM2.5 offset in µg/m³.
    pub pm25: f64,
    /// PM10 offset in µg/m³.
    pub pm10: f64,
}

/// Decode a validated `CMD_GET_CO2_OFFSET` reply.
pub fn decode_co2_offsets(response: &[u8]) -> Result<Co2Offsets, ProtocolError> {
    let mut r = Reader::new(frame::body(response, Command::GetCo2Offset)?, "CO2 offsets");
    Ok(Co2Offsets {
        co2: r.i16()?,
        pm25: f64::from(r.i16()?) / 10.0,
        pm10: f64::from(r.i16()?) / 10.0,
    })
}

/// Radio band the gateway listens on for sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrequencyBand {
    Mhz433,
    Mhz868,
    Mhz915,
    Mhz920,
    Unknown(u8),
}

impl From<u8> for FrequencyBand {
    fn from(b: u8) -> Self {
        match b {
            0 => FrequencyBand::Mhz433,
            1 => FrequencyBand::Mhz868,
            2 => FrequencyBand::Mhz915,
            3 => FrequencyBand::Mhz920,
            other => FrequencyBand::Unknown(other),
        }
    }
}

impl fmt::Display for FrequencyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrequencyBand::Mhz433 => f.write_str("433 MHz"),
            FrequencyBand::Mhz868 => f.write_str("868 MHz"),
            FrequencyBand::Mhz915 => f.write_str("915 MHz"),
            FrequencyBand::Mhz920 => f.write_str("920 MHz"),
            FrequencyBand::Unknown(b) => write!(f, "unknown ({b})"),
        }
    }
}

/// Outdoor array model the gateway is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutdoorSensor {
    Wh24,
    Wh65,
    Unknown(u8),
}

impl From<u8> for OutdoorSensor {
    fn from(b: u8) -> Self {
        match b {
            0 => OutdoorSensor::Wh24,
            1 => OutdoorSensor::Wh65,
            other => OutdoorSensor::Unknown(other),
        }
    }
}

/// Decoded `CMD_READ_SSSS` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemParams {
    pub frequency: FrequencyBand,
    pub outdoor_sensor: OutdoorSensor,
    /// Gateway clock, seconds since the Unix epoch.
    pub utc_time: u32,
    /// Index into the gateway's timezone table.
    pub timezone_index: u8,
    /// Daylight saving time enabled.
    pub dst: bool,
    /// The complete reply frame.
    pub raw: Vec<u8>,
}

impl SystemParams {
    /// The complete reply as lower-case hex.
    pub fn raw_hex(&self) -> String {
        self.raw.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Decode a validated `CMD_READ_SSSS` reply.
pub fn decode_system_params(response: &[u8]) -> Result<SystemParams, ProtocolError> {
    let mut r = Reader::new(frame::body(response, Command::ReadSystemParams)?, "system params");
    Ok(SystemParams {
        frequency: r.u8()?.into(),
        outdoor_sensor: r.u8()?.into(),
        utc_time: r.u32()?,
        timezone_index: r.u8()?,
        dst: r.u8()? & 0x01 != 0,
        raw: response.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(command: Command, body: &[u8]) -> Vec<u8> {
        frame::encode_response(command, body).unwrap()
    }

    #[test]
    fn firmware_version() {
        let mut body = vec![14];
        body.extend_from_slice(b"GW2000A_V2.1.4");
        let version = decode_firmware(&reply(Command::ReadFirmwareVersion, &body)).unwrap();
        assert_eq!(version, "GW2000A_V2.1.4");
    }

    #[test]
    fn mac_address() {
        let body = [0x48, 0x3F, 0xDA, 0x54, 0x14, 0xEC];
        let mac = decode_mac(&reply(Command::ReadStationMac, &body)).unwrap();
        assert_eq!(mac.to_hex(), "483FDA5414EC");
        assert_eq!(mac.to_string(), "48:3F:DA:54:14:EC");

        assert!(decode_mac(&reply(Command::ReadStationMac, &body[..4])).is_err());
    }

    #[test]
    fn pm25_offsets() {
        let body = [0x00, 0x00, 0x0F, 0x01, 0xFF, 0xEC];
        let offsets = decode_pm25_offsets(&reply(Command::GetPm25Offset, &body)).unwrap();
        assert_eq!(
            offsets,
            vec![
                Pm25Offset {
                    channel: 1,
                    offset: 1.5
                },
                Pm25Offset {
                    channel: 2,
                    offset: -2.0
                },
            ]
        );
    }

    #[test]
    fn co2_offsets() {
        let body = [0xFF, 0xF6, 0x00, 0x05, 0x00, 0x0A];
        let offsets = decode_co2_offsets(&reply(Command::GetCo2Offset, &body)).unwrap();
        assert_eq!(offsets.co2, -10);
        assert_eq!(offsets.pm25, 0.5);
        assert_eq!(offsets.pm10, 1.0);
    }

    #[test]
    fn system_params() {
        let body = [0x02, 0x01, 0x65, 0x00, 0x00, 0x00, 0x11, 0x01];
        let response = reply(Command::ReadSystemParams, &body);
        let params = decode_system_params(&response).unwrap();
        assert_eq!(params.frequency, FrequencyBand::Mhz915);
        assert_eq!(params.outdoor_sensor, OutdoorSensor::Wh65);
        assert_eq!(params.utc_time, 0x6500_0000);
        assert_eq!(params.timezone_index, 0x11);
        assert!(params.dst);
        assert!(params.raw_hex().starts_with("ffff300b0201"));
        assert_eq!(params.frequency.to_string(), "915 MHz");
    }
}
