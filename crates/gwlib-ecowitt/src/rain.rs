//! Rain totals.
//!
//! Gateways expose rain through two commands. Older firmware answers
//! `CMD_READ_RAINDATA` with five fixed totals for the tipping bucket gauge,
//! which can also be written back with `CMD_WRITE_RAINDATA`. Newer firmware
//! answers `CMD_READ_RAIN` with an item stream that carries both the
//! traditional gauge and, when paired, the piezo gauge. [`RainSource`]
//! selects which of the two a gateway is read with.

use std::fmt;
use std::str::FromStr;

use bytes::BufMut;
use gwlib_core::{ProtocolError, ValidationError};
use tracing::warn;

use crate::commands::Command;
use crate::frame;
use crate::reader::Reader;

/// Length of the legacy rain record, read and write.
pub const RAIN_DATA_LEN: usize = 20;

/// Largest total the legacy record can hold, in mm.
pub const MAX_RAIN_MM: f64 = u32::MAX as f64 / 10.0;

/// Which command a gateway is read with for rain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RainSource {
    /// `CMD_READ_RAINDATA`, tipping bucket totals only.
    Legacy,
    /// `CMD_READ_RAIN`, traditional and piezo totals.
    Piezo,
}

impl RainSource {
    /// The rain source for a gateway running `firmware`.
    ///
    /// GW2000 firmware supports the piezo-capable read; everything else is
    /// read with the legacy command.
    pub fn from_firmware(firmware: &str) -> Self {
        if firmware.to_ascii_uppercase().contains("GW2000") {
            RainSource::Piezo
        } else {
            RainSource::Legacy
        }
    }

    /// The command used to read rain from this source.
    pub fn command(self) -> Command {
        match self {
            RainSource::Legacy => Command::ReadRainData,
            RainSource::Piezo => Command::ReadRain,
        }
    }
}

impl fmt::Display for RainSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RainSource::Legacy => f.write_str("legacy"),
            RainSource::Piezo => f.write_str("piezo"),
        }
    }
}

impl FromStr for RainSource {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" => Ok(RainSource::Legacy),
            "piezo" => Ok(RainSource::Piezo),
            _ => Err(ValidationError::new(
                "rain_source",
                format!("expected 'legacy' or 'piezo', got '{s}'"),
            )),
        }
    }
}

/// Rain totals in mm (rate in mm/h).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RainData {
    pub rain_rate: f64,
    pub rain_day: f64,
    pub rain_week: f64,
    pub rain_month: f64,
    pub rain_year: f64,
}

impl RainData {
    fn fields(&self) -> [(&'static str, f64); 5] {
        [
            ("rain_rate", self.rain_rate),
            ("rain_day", self.rain_day),
            ("rain_week", self.rain_week),
            ("rain_month", self.rain_month),
            ("rain_year", self.rain_year),
        ]
    }

    /// Check every total can be written back to the gateway.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.fields()
            .into_iter()
            .try_for_each(|(field, value)| validate_total(field, value))
    }
}

fn validate_total(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::new(field, "must be a finite number"));
    }
    if value < 0.0 {
        return Err(ValidationError::new(field, format!("must be >= 0, got {value}")));
    }
    if value > MAX_RAIN_MM {
        return Err(ValidationError::new(
            field,
            format!("must be <= {MAX_RAIN_MM}, got {value}"),
        ));
    }
    Ok(())
}

/// A partial rain update: only the fields set are written.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RainDataUpdate {
    pub rain_rate: Option<f64>,
    pub rain_day: Option<f64>,
    pub rain_week: Option<f64>,
    pub rain_month: Option<f64>,
    pub rain_year: Option<f64>,
}

impl RainDataUpdate {
    /// Check the supplied fields, before anything is read from the gateway.
    pub fn validate(&self) -> Result<(), ValidationError> {
        [
            ("rain_rate", self.rain_rate),
            ("rain_day", self.rain_day),
            ("rain_week", self.rain_week),
            ("rain_month", self.rain_month),
            ("rain_year", self.rain_year),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|v| (field, v)))
        .try_for_each(|(field, value)| validate_total(field, value))
    }

    /// Overlay the supplied fields on `current`.
    pub fn apply(&self, current: RainData) -> RainData {
        RainData {
            rain_rate: self.rain_rate.unwrap_or(current.rain_rate),
            rain_day: self.rain_day.unwrap_or(current.rain_day),
            rain_week: self.rain_week.unwrap_or(current.rain_week),
            rain_month: self.rain_month.unwrap_or(current.rain_month),
            rain_year: self.rain_year.unwrap_or(current.rain_year),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == RainDataUpdate::default()
    }
}

/// Decode a validated `CMD_READ_RAINDATA` reply.
pub fn decode_rain_data(response: &[u8]) -> Result<RainData, ProtocolError> {
    let mut r = Reader::new(frame::body(response, Command::ReadRainData)?, "rain data");
    let mut next = || r.u32().map(|v| f64::from(v) / 10.0);
    Ok(RainData {
        rain_rate: next()?,
        rain_day: next()?,
        rain_week: next()?,
        rain_month: next()?,
        rain_year: next()?,
    })
}

/// Encode the `CMD_WRITE_RAINDATA` payload, validating every total first.
pub fn encode_rain_data(data: &RainData) -> Result<Vec<u8>, ValidationError> {
    data.validate()?;
    let mut buf = Vec::with_capacity(RAIN_DATA_LEN);
    for (_, value) in data.fields() {
        buf.put_u32((value * 10.0).round() as u32);
    }
    Ok(buf)
}

/// Which gauge the gateway reports as its primary rain source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RainPriority {
    Traditional,
    Piezo,
}

/// Decoded `CMD_READ_RAIN` reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RainReport {
    /// Tipping bucket totals.
    pub traditional: RainData,
    /// Current rain event, mm.
    pub event: Option<f64>,
    /// Rain in the last hour, mm.
    pub hourly: Option<f64>,
    /// Lifetime total, mm.
    pub total: Option<f64>,
    /// Piezo gauge totals, when a piezo gauge is paired.
    pub piezo: Option<RainData>,
    pub piezo_event: Option<f64>,
    pub piezo_hourly: Option<f64>,
    /// Gauge the gateway prioritises, if reported.
    pub priority: Option<RainPriority>,
}

impl RainReport {
    /// The totals of the gauge the gateway prioritises.
    pub fn preferred(&self) -> &RainData {
        match (self.priority, &self.piezo) {
            (Some(RainPriority::Piezo), Some(piezo)) => piezo,
            _ => &self.traditional,
        }
    }
}

/// Decode a validated `CMD_READ_RAIN` reply.
///
/// As with live data, an unknown item id ends the parse.
pub fn decode_rain(response: &[u8]) -> Result<RainReport, ProtocolError> {
    let mut r = Reader::new(frame::body(response, Command::ReadRain)?, "rain item");
    let mut report = RainReport::default();
    let mut piezo = RainData::default();
    let mut has_piezo = false;

    while !r.is_empty() {
        let id = r.u8()?;
        match id {
            0x0D => report.event = Some(f64::from(r.u16()?) / 10.0),
            0x0E => report.traditional.rain_rate = f64::from(r.u16()?) / 10.0,
            0x0F => report.hourly = Some(f64::from(r.u16()?) / 10.0),
            0x10 => report.traditional.rain_day = f64::from(r.u32()?) / 10.0,
            0x11 => report.traditional.rain_week = f64::from(r.u32()?) / 10.0,
            0x12 => report.traditional.rain_month = f64::from(r.u32()?) / 10.0,
            0x13 => report.traditional.rain_year = f64::from(r.u32()?) / 10.0,
            0x14 => report.total = Some(f64::from(r.u32()?) / 10.0),
            0x7A => {
                report.priority = match r.u8()? {
                    1 => Some(RainPriority::Traditional),
                    2 => Some(RainPriority::Piezo),
                    _ => None,
                }
            }
            0x7B => r.skip(1)?,
            0x80..=0x86 => {
                has_piezo = true;
                match id {
                    0x80 => piezo.rain_rate = f64::from(r.u16()?) / 10.0,
                    0x81 => report.piezo_event = Some(f64::from(r.u16()?) / 10.0),
                    0x82 => report.piezo_hourly = Some(f64::from(r.u16()?) / 10.0),
                    0x83 => piezo.rain_day = f64::from(r.u32()?) / 10.0,
                    0x84 => piezo.rain_week = f64::from(r.u32()?) / 10.0,
                    0x85 => piezo.rain_month = f64::from(r.u32()?) / 10.0,
                    _ => piezo.rain_year = f64::from(r.u32()?) / 10.0,
                }
            }
            // Gain table and reset times.
            0x87 => r.skip(20)?,
            0x88 => r.skip(3)?,
            _ => {
                warn!(
                    item = format_args!("{:#04x}", id),
                    remaining = r.remaining(),
                    "Unknown rain item, ignoring the rest of the reply"
                );
                break;
            }
        }
    }

    if has_piezo {
        report.piezo = Some(piezo);
    }
    Ok(report)
}

/// Rain as merged into live data.
#[derive(Debug, Clone, PartialEq)]
pub enum Rain {
    Legacy(RainData),
    Piezo(RainReport),
}

impl Rain {
    /// The totals the gateway considers authoritative.
    pub fn preferred(&self) -> &RainData {
        match self {
            Rain::Legacy(data) => data,
            Rain::Piezo(report) => report.preferred(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn rain_data_reply(tenths: [u32; 5]) -> Vec<u8> {
        let mut body = Vec::new();
        for v in tenths {
            body.extend_from_slice(&v.to_be_bytes());
        }
        frame::encode_response(Command::ReadRainData, &body).unwrap()
    }

    #[test]
    fn rain_source_from_firmware() {
        assert_eq!(RainSource::from_firmware("GW2000A_V2.1.4"), RainSource::Piezo);
        assert_eq!(RainSource::from_firmware("gw2000b_v3.0.0"), RainSource::Piezo);
        assert_eq!(RainSource::from_firmware("GW1000B_V1.7.3"), RainSource::Legacy);
        assert_eq!(RainSource::Legacy.command(), Command::ReadRainData);
        assert_eq!(RainSource::Piezo.command(), Command::ReadRain);
    }

    #[test]
    fn rain_source_parse() {
        assert_eq!("Piezo".parse::<RainSource>().unwrap(), RainSource::Piezo);
        assert_eq!("legacy".parse::<RainSource>().unwrap(), RainSource::Legacy);
        assert_eq!(
            "bucket".parse::<RainSource>().unwrap_err().field,
            "rain_source"
        );
    }

    #[test]
    fn decode_legacy_totals() {
        let data = decode_rain_data(&rain_data_reply([12, 34, 567, 8901, 23456])).unwrap();
        assert_eq!(data.rain_rate, 1.2);
        assert_eq!(data.rain_day, 3.4);
        assert_eq!(data.rain_week, 56.7);
        assert_eq!(data.rain_month, 890.1);
        assert_eq!(data.rain_year, 2345.6);
    }

    #[test]
    fn decode_short_legacy_record() {
        let reply = frame::encode_response(Command::ReadRainData, &[0; 12]).unwrap();
        assert!(matches!(
            decode_rain_data(&reply),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn encode_legacy_totals() {
        let data = RainData {
            rain_rate: 0.0,
            rain_day: 3.4,
            rain_week: 56.7,
            rain_month: 890.1,
            rain_year: 2345.6,
        };
        let payload = encode_rain_data(&data).unwrap();
        assert_eq!(payload.len(), RAIN_DATA_LEN);
        assert_eq!(&payload[4..8], &34u32.to_be_bytes());
        assert_eq!(&payload[16..20], &23456u32.to_be_bytes());
    }

    #[test]
    fn validation_names_the_field() {
        let data = RainData {
            rain_week: -0.1,
            ..RainData::default()
        };
        assert_eq!(data.validate().unwrap_err().field, "rain_week");

        let data = RainData {
            rain_year: f64::NAN,
            ..RainData::default()
        };
        assert_eq!(encode_rain_data(&data).unwrap_err().field, "rain_year");

        let data = RainData {
            rain_day: 1e12,
            ..RainData::default()
        };
        assert_eq!(data.validate().unwrap_err().field, "rain_day");
    }

    #[test]
    fn update_validates_only_supplied_fields() {
        let update = RainDataUpdate {
            rain_rate: Some(-1.0),
            ..RainDataUpdate::default()
        };
        assert_eq!(update.validate().unwrap_err().field, "rain_rate");
        assert!(RainDataUpdate::default().validate().is_ok());
        assert!(RainDataUpdate::default().is_empty());
    }

    #[test]
    fn update_overlays_current() {
        let current = RainData {
            rain_rate: 1.0,
            rain_day: 2.0,
            rain_week: 3.0,
            rain_month: 4.0,
            rain_year: 5.0,
        };
        let update = RainDataUpdate {
            rain_day: Some(0.0),
            rain_year: Some(100.0),
            ..RainDataUpdate::default()
        };
        let merged = update.apply(current);
        assert_eq!(merged.rain_rate, 1.0);
        assert_eq!(merged.rain_day, 0.0);
        assert_eq!(merged.rain_week, 3.0);
        assert_eq!(merged.rain_year, 100.0);
    }

    #[test]
    fn decode_piezo_report() {
        let body = [
            0x0D, 0x00, 0x0A, // event 1.0
            0x0E, 0x00, 0x05, // rate 0.5
            0x10, 0x00, 0x00, 0x00, 0x14, // day 2.0
            0x13, 0x00, 0x00, 0x03, 0xE8, // year 100.0
            0x7A, 0x02, // piezo priority
            0x80, 0x00, 0x03, // piezo rate 0.3
            0x83, 0x00, 0x00, 0x00, 0x19, // piezo day 2.5
            0x86, 0x00, 0x00, 0x04, 0x4C, // piezo year 110.0
            0x88, 0x00, 0x00, 0x00, // reset times
        ];
        let reply = frame::encode_response(Command::ReadRain, &body).unwrap();
        let report = decode_rain(&reply).unwrap();

        assert_eq!(report.event, Some(1.0));
        assert_eq!(report.traditional.rain_rate, 0.5);
        assert_eq!(report.traditional.rain_day, 2.0);
        assert_eq!(report.traditional.rain_year, 100.0);
        assert_eq!(report.priority, Some(RainPriority::Piezo));

        let piezo = report.piezo.unwrap();
        assert_eq!(piezo.rain_rate, 0.3);
        assert_eq!(piezo.rain_day, 2.5);
        assert_eq!(report.preferred().rain_year, 110.0);
    }

    #[test]
    fn traditional_report_prefers_traditional() {
        let body = [0x0E, 0x00, 0x05, 0x7A, 0x01];
        let reply = frame::encode_response(Command::ReadRain, &body).unwrap();
        let report = decode_rain(&reply).unwrap();
        assert!(report.piezo.is_none());
        assert_eq!(report.preferred().rain_rate, 0.5);
        assert_eq!(Rain::Piezo(report).preferred().rain_rate, 0.5);
    }
}
