//! Soil moisture calibration (`CMD_GET_SOILHUMIAD` / `CMD_SET_SOILHUMIAD`).
//!
//! The read reply holds one 8-byte record per paired soil sensor:
//!
//! ```text
//! <channel (0-based)> <humidity %> <current AD (2)> <enabled> <min AD (1)> <max AD (2)>
//! ```
//!
//! A write carries a single channel:
//!
//! ```text
//! <channel (0-based)> <enabled> <min AD (2)> <max AD (2)>
//! ```

use bytes::BufMut;
use gwlib_core::{ProtocolError, ValidationError};

use crate::commands::Command;
use crate::frame;
use crate::reader::Reader;

/// Size of one calibration record in the read reply.
pub const SOIL_RECORD_LEN: usize = 8;

/// Highest soil moisture channel.
pub const MAX_SOIL_CHANNEL: u8 = 8;

/// Calibration of one soil moisture channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoilCalibration {
    /// Channel, 1 to 8.
    pub channel: u8,
    /// Current moisture reading in %.
    pub humidity: u8,
    /// Current raw AD reading.
    pub current_ad: u16,
    /// 1 if the custom calibration below is in use, 0 otherwise.
    pub calibration_enabled: u8,
    /// AD value read as 0 %.
    pub min_ad: u16,
    /// AD value read as 100 %.
    pub max_ad: u16,
}

/// A calibration change for one channel.
///
/// Fields are wide signed integers so out-of-range input reaches
/// [`validate`](SoilCalibrationUpdate::validate) instead of being truncated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoilCalibrationUpdate {
    pub channel: i64,
    pub calibration_enabled: Option<i64>,
    pub min_ad: Option<i64>,
    pub max_ad: Option<i64>,
}

impl SoilCalibrationUpdate {
    /// An update for `channel` that changes nothing yet.
    pub fn new(channel: i64) -> Self {
        SoilCalibrationUpdate {
            channel,
            ..Default::default()
        }
    }

    pub fn calibration_enabled(mut self, enabled: bool) -> Self {
        self.calibration_enabled = Some(i64::from(enabled));
        self
    }

    pub fn min_ad(mut self, value: i64) -> Self {
        self.min_ad = Some(value);
        self
    }

    pub fn max_ad(mut self, value: i64) -> Self {
        self.max_ad = Some(value);
        self
    }

    /// Check the supplied fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.channel_index()?;
        if let Some(enabled) = self.calibration_enabled {
            if !(0..=1).contains(&enabled) {
                return Err(ValidationError::new(
                    "calibration_enabled",
                    format!("must be 0 (disabled) or 1 (enabled), got {enabled}"),
                ));
            }
        }
        if let Some(min) = self.min_ad {
            ad_value("min_ad", min)?;
        }
        if let Some(max) = self.max_ad {
            ad_value("max_ad", max)?;
        }
        Ok(())
    }

    /// The validated channel, 1 to 8.
    pub fn channel_index(&self) -> Result<u8, ValidationError> {
        u8::try_from(self.channel)
            .ok()
            .filter(|ch| (1..=MAX_SOIL_CHANNEL).contains(ch))
            .ok_or_else(|| {
                ValidationError::new(
                    "channel",
                    format!("must be from 1 to {MAX_SOIL_CHANNEL}, got {}", self.channel),
                )
            })
    }

    /// Validate, then overlay the supplied fields on `current`.
    pub fn apply(&self, current: SoilCalibration) -> Result<SoilCalibration, ValidationError> {
        self.validate()?;
        let mut merged = current;
        if let Some(enabled) = self.calibration_enabled {
            merged.calibration_enabled = enabled as u8;
        }
        if let Some(min) = self.min_ad {
            merged.min_ad = ad_value("min_ad", min)?;
        }
        if let Some(max) = self.max_ad {
            merged.max_ad = ad_value("max_ad", max)?;
        }
        Ok(merged)
    }
}

fn ad_value(field: &'static str, value: i64) -> Result<u16, ValidationError> {
    u16::try_from(value).map_err(|_| {
        ValidationError::new(field, format!("must be from 0 to {}, got {value}", u16::MAX))
    })
}

/// Decode a validated `CMD_GET_SOILHUMIAD` reply.
pub fn decode_soil_calibration(response: &[u8]) -> Result<Vec<SoilCalibration>, ProtocolError> {
    let mut r = Reader::new(
        frame::body(response, Command::GetSoilHumiAd)?,
        "soil calibration record",
    );
    let mut records = Vec::with_capacity(r.remaining() / SOIL_RECORD_LEN);

    while r.remaining() >= SOIL_RECORD_LEN {
        records.push(SoilCalibration {
            channel: r.u8()?.saturating_add(1),
            humidity: r.u8()?,
            current_ad: r.u16()?,
            calibration_enabled: r.u8()?,
            min_ad: u16::from(r.u8()?),
            max_ad: r.u16()?,
        });
    }

    Ok(records)
}

/// Encode the `CMD_SET_SOILHUMIAD` payload for one channel.
pub fn encode_soil_calibration(cal: &SoilCalibration) -> Result<Vec<u8>, ValidationError> {
    if !(1..=MAX_SOIL_CHANNEL).contains(&cal.channel) {
        return Err(ValidationError::new(
            "channel",
            format!("must be from 1 to {MAX_SOIL_CHANNEL}, got {}", cal.channel),
        ));
    }
    if cal.calibration_enabled > 1 {
        return Err(ValidationError::new(
            "calibration_enabled",
            format!("must be 0 or 1, got {}", cal.calibration_enabled),
        ));
    }

    let mut buf = Vec::with_capacity(6);
    buf.put_u8(cal.channel - 1);
    buf.put_u8(cal.calibration_enabled);
    buf.put_u16(cal.min_ad);
    buf.put_u16(cal.max_ad);
    Ok(buf)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn soil_reply() -> Vec<u8> {
        let body = [
            0x00, 0x2A, 0x01, 0x10, 0x00, 0x46, 0x01, 0x5E, // ch1
            0x02, 0x33, 0x00, 0xF0, 0x01, 0x50, 0x01, 0x90, // ch3
        ];
        frame::encode_response(Command::GetSoilHumiAd, &body).unwrap()
    }

    #[test]
    fn decode_records() {
        let records = decode_soil_calibration(&soil_reply()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            SoilCalibration {
                channel: 1,
                humidity: 42,
                current_ad: 272,
                calibration_enabled: 0,
                min_ad: 70,
                max_ad: 350,
            }
        );
        assert_eq!(records[1].channel, 3);
        assert_eq!(records[1].calibration_enabled, 1);
        assert_eq!(records[1].max_ad, 400);
    }

    #[test]
    fn encode_uses_zero_based_channel() {
        let cal = SoilCalibration {
            channel: 3,
            humidity: 0,
            current_ad: 0,
            calibration_enabled: 1,
            min_ad: 80,
            max_ad: 400,
        };
        assert_eq!(
            encode_soil_calibration(&cal).unwrap(),
            vec![0x02, 0x01, 0x00, 0x50, 0x01, 0x90]
        );
    }

    #[test]
    fn update_validation() {
        assert_eq!(SoilCalibrationUpdate::new(0).validate().unwrap_err().field, "channel");
        assert_eq!(SoilCalibrationUpdate::new(9).validate().unwrap_err().field, "channel");
        assert!(SoilCalibrationUpdate::new(8).validate().is_ok());

        let update = SoilCalibrationUpdate {
            calibration_enabled: Some(2),
            ..SoilCalibrationUpdate::new(1)
        };
        assert_eq!(update.validate().unwrap_err().field, "calibration_enabled");

        let update = SoilCalibrationUpdate::new(1).min_ad(-1);
        assert_eq!(update.validate().unwrap_err().field, "min_ad");

        let update = SoilCalibrationUpdate::new(1).max_ad(70_000);
        assert_eq!(update.validate().unwrap_err().field, "max_ad");
    }

    #[test]
    fn update_overlays_current() {
        let current = decode_soil_calibration(&soil_reply()).unwrap()[0];
        let merged = SoilCalibrationUpdate::new(1)
            .calibration_enabled(true)
            .max_ad(500)
            .apply(current)
            .unwrap();
        assert_eq!(merged.calibration_enabled, 1);
        assert_eq!(merged.min_ad, 70);
        assert_eq!(merged.max_ad, 500);
    }
}
