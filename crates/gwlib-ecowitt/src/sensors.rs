//! Paired sensor list (`CMD_READ_SENSOR_ID_NEW`).
//!
//! The gateway reports one fixed 7-byte record per sensor slot it knows
//! about, whether or not a sensor is currently paired in that slot:
//!
//! ```text
//! <type index> <id (4, BE)> <battery> <signal>
//! ```
//!
//! The type index selects both the sensor family and, for multi-channel
//! families, the channel. A slot with id `0xFFFFFFFF` is still searching
//! and one with id `0xFFFFFFFE` is disabled; both read as inactive.

use std::fmt;
use std::str::FromStr;

use gwlib_core::{ProtocolError, ValidationError};

use crate::commands::Command;
use crate::frame;
use crate::reader::Reader;

/// Replies at or below this length carry no usable sensor table.
pub const MIN_SENSOR_RESPONSE_LEN: usize = 200;

/// Size of one sensor record.
pub const SENSOR_RECORD_LEN: usize = 7;

/// Sensor id of a slot that is still searching for a sensor.
pub const ID_SEARCHING: u32 = 0xFFFF_FFFF;

/// Sensor id of a slot that has been disabled.
pub const ID_DISABLED: u32 = 0xFFFF_FFFE;

/// Predicate applied to the decoded sensor list.
pub type SensorFilter = dyn Fn(&Sensor) -> bool + Send + Sync;

/// A sensor family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SensorCategory {
    /// 7-in-1 outdoor array.
    Wh65,
    /// Solar powered wind/light array.
    Wh68,
    /// Ultrasonic wind array.
    Wh80,
    /// Tipping bucket rain gauge.
    Wh40,
    /// Indoor temperature/humidity/pressure.
    Wh25,
    /// Outdoor temperature/humidity.
    Wh26,
    /// Multi-channel temperature/humidity.
    Wh31,
    /// Soil moisture.
    Wh51,
    /// PM2.5 air quality.
    Wh41,
    /// Lightning detector.
    Wh57,
    /// Water leak detector.
    Wh55,
    /// User temperature probe (WN34).
    Wh34,
    /// CO2 / PM2.5 / PM10 air quality.
    Wh45,
    /// Leaf wetness.
    Wh35,
    /// Piezo 7-in-1 array.
    Wh90,
}

impl SensorCategory {
    /// Number of channels for multi-channel families, 0 otherwise.
    pub const fn channels(self) -> u8 {
        match self {
            SensorCategory::Wh31
            | SensorCategory::Wh51
            | SensorCategory::Wh34
            | SensorCategory::Wh35 => 8,
            SensorCategory::Wh41 | SensorCategory::Wh55 => 4,
            _ => 0,
        }
    }

    /// Returns `true` if sensors of this family carry a channel number.
    pub const fn is_multi_channel(self) -> bool {
        self.channels() > 0
    }

    /// The upper-case family name (e.g. `WH31`).
    pub fn name(self) -> &'static str {
        match self {
            SensorCategory::Wh65 => "WH65",
            SensorCategory::Wh68 => "WH68",
            SensorCategory::Wh80 => "WH80",
            SensorCategory::Wh40 => "WH40",
            SensorCategory::Wh25 => "WH25",
            SensorCategory::Wh26 => "WH26",
            SensorCategory::Wh31 => "WH31",
            SensorCategory::Wh51 => "WH51",
            SensorCategory::Wh41 => "WH41",
            SensorCategory::Wh57 => "WH57",
            SensorCategory::Wh55 => "WH55",
            SensorCategory::Wh34 => "WH34",
            SensorCategory::Wh45 => "WH45",
            SensorCategory::Wh35 => "WH35",
            SensorCategory::Wh90 => "WH90",
        }
    }
}

/// Every sensor family, in type index order of its first slot.
pub const ALL_CATEGORIES: [SensorCategory; 15] = [
    SensorCategory::Wh65,
    SensorCategory::Wh68,
    SensorCategory::Wh80,
    SensorCategory::Wh40,
    SensorCategory::Wh25,
    SensorCategory::Wh26,
    SensorCategory::Wh31,
    SensorCategory::Wh51,
    SensorCategory::Wh41,
    SensorCategory::Wh57,
    SensorCategory::Wh55,
    SensorCategory::Wh34,
    SensorCategory::Wh45,
    SensorCategory::Wh35,
    SensorCategory::Wh90,
];

impl fmt::Display for SensorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SensorCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_CATEGORIES
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::new("sensor_type", format!("unknown sensor family '{s}'")))
    }
}

/// A sensor family plus channel, the composite key used across records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SensorType {
    /// Sensor family.
    pub category: SensorCategory,
    /// Channel (1-based) for multi-channel families.
    pub channel: Option<u8>,
}

impl SensorType {
    /// A single-channel sensor type.
    pub const fn single(category: SensorCategory) -> Self {
        SensorType {
            category,
            channel: None,
        }
    }

    /// A channel of a multi-channel family.
    pub const fn channel(category: SensorCategory, channel: u8) -> Self {
        SensorType {
            category,
            channel: Some(channel),
        }
    }

    /// Map a record's type index to its sensor type.
    ///
    /// Returns `None` for indices this client does not know.
    pub fn from_index(index: u8) -> Option<Self> {
        use SensorCategory::*;
        let t = match index {
            0 => Self::single(Wh65),
            1 => Self::single(Wh68),
            2 => Self::single(Wh80),
            3 => Self::single(Wh40),
            4 => Self::single(Wh25),
            5 => Self::single(Wh26),
            6..=13 => Self::channel(Wh31, index - 5),
            14..=21 => Self::channel(Wh51, index - 13),
            22..=25 => Self::channel(Wh41, index - 21),
            26 => Self::single(Wh57),
            27..=30 => Self::channel(Wh55, index - 26),
            31..=38 => Self::channel(Wh34, index - 30),
            39 => Self::single(Wh45),
            40..=47 => Self::channel(Wh35, index - 39),
            48 => Self::single(Wh90),
            _ => return None,
        };
        Some(t)
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.channel {
            Some(ch) => write!(f, "{}_CH{}", self.category, ch),
            None => write!(f, "{}", self.category),
        }
    }
}

impl FromStr for SensorType {
    type Err = ValidationError;

    /// Parse `WH65` or `WH31_CH3`, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        let Some((family, channel)) = upper.split_once("_CH") else {
            let category: SensorCategory = upper.parse()?;
            if category.is_multi_channel() {
                return Err(ValidationError::new(
                    "sensor_type",
                    format!("{category} needs a channel (e.g. {category}_CH1)"),
                ));
            }
            return Ok(SensorType::single(category));
        };

        let category: SensorCategory = family.parse()?;
        let channel: u8 = channel
            .parse()
            .map_err(|_| ValidationError::new("sensor_type", format!("bad channel in '{s}'")))?;
        if channel == 0 || channel > category.channels() {
            return Err(ValidationError::new(
                "sensor_type",
                format!("{category} has no channel {channel}"),
            ));
        }
        Ok(SensorType::channel(category, channel))
    }
}

/// Whether a sensor slot currently has a live sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorStatus {
    Active,
    Inactive,
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorStatus::Active => f.write_str("active"),
            SensorStatus::Inactive => f.write_str("inactive"),
        }
    }
}

/// One entry of the gateway's sensor table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sensor {
    pub id: u32,
    pub sensor_type: SensorType,
    /// Raw battery byte; its meaning depends on the family.
    pub battery: u8,
    /// Signal quality, 0 to 4.
    pub signal: u8,
    pub status: SensorStatus,
}

impl Sensor {
    pub fn is_active(&self) -> bool {
        self.status == SensorStatus::Active
    }

    /// The id as the gateway's UI shows it (upper-case hex).
    pub fn id_hex(&self) -> String {
        format!("{:X}", self.id)
    }
}

/// Decode a validated `CMD_READ_SENSOR_ID_NEW` reply.
///
/// Replies of [`MIN_SENSOR_RESPONSE_LEN`] bytes or fewer are rejected with
/// [`ProtocolError::InvalidLength`]. Records with an unknown type index are
/// skipped, and a trailing partial record is ignored. When `filter` is
/// given, only sensors it accepts are returned.
pub fn decode_sensors(
    response: &[u8],
    filter: Option<&SensorFilter>,
) -> Result<Vec<Sensor>, ProtocolError> {
    if response.len() <= MIN_SENSOR_RESPONSE_LEN {
        return Err(ProtocolError::InvalidLength {
            len: response.len(),
            min: MIN_SENSOR_RESPONSE_LEN,
        });
    }

    let mut r = Reader::new(frame::body(response, Command::ReadSensorIdNew)?, "sensor record");
    let mut sensors = Vec::with_capacity(r.remaining() / SENSOR_RECORD_LEN);

    while r.remaining() >= SENSOR_RECORD_LEN {
        let index = r.u8()?;
        let id = r.u32()?;
        let battery = r.u8()?;
        let signal = r.u8()?;

        let Some(sensor_type) = SensorType::from_index(index) else {
            continue;
        };
        let status = if id == ID_SEARCHING || id == ID_DISABLED {
            SensorStatus::Inactive
        } else {
            SensorStatus::Active
        };
        let sensor = Sensor {
            id,
            sensor_type,
            battery,
            signal,
            status,
        };

        if filter.is_none_or(|keep| keep(&sensor)) {
            sensors.push(sensor);
        }
    }

    Ok(sensors)
}
