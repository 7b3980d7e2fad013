//! Live sensor readings (`CMD_LIVEDATA`).
//!
//! The reply body is a stream of items, each a one-byte id followed by a
//! value whose width is fixed by the id. There is no per-item length, so
//! an id this client does not know ends the parse: everything decoded up
//! to that point is kept.
//!
//! Rain items are skipped here. Rain is read with a dedicated command and
//! merged in by [`EcowittGateway::get_live_data`](crate::EcowittGateway::get_live_data).

use std::collections::BTreeMap;

use gwlib_core::ProtocolError;
use tracing::warn;

use crate::commands::Command;
use crate::frame;
use crate::rain::Rain;
use crate::reader::Reader;
use crate::sensors::{Sensor, SensorCategory, SensorType};

/// Voltage step of the battery voltage bytes.
const VOLTAGE_STEP: f64 = 0.02;

/// At or below this voltage a battery reads as low.
const LOW_VOLTAGE: f64 = 1.2;

/// At or below this level (0 to 5 scale) a battery reads as low.
const LOW_LEVEL: u8 = 1;

/// Length of the low-battery block (item 0x4C).
pub const LOW_BATTERY_BLOCK_LEN: usize = 16;

/// Length of the WH45 CO2 block (item 0x70).
pub const CO2_BLOCK_LEN: usize = 16;

/// Options for [`EcowittGateway::get_live_data`](crate::EcowittGateway::get_live_data).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveDataOptions {
    /// Fetch rain with the secondary rain command and merge it in.
    pub include_rain: bool,
    /// Drop low-battery entries for sensors that are not active.
    pub filter_active_sensors: bool,
}

impl Default for LiveDataOptions {
    fn default() -> Self {
        LiveDataOptions {
            include_rain: true,
            filter_active_sensors: false,
        }
    }
}

/// Battery condition of one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatteryStatus {
    Normal,
    Low,
}

impl BatteryStatus {
    fn from_low(low: bool) -> Self {
        if low {
            BatteryStatus::Low
        } else {
            BatteryStatus::Normal
        }
    }

    fn from_level(level: u8) -> Self {
        Self::from_low(level <= LOW_LEVEL)
    }

    fn from_voltage(raw: u8) -> Self {
        Self::from_low(f64::from(raw) * VOLTAGE_STEP <= LOW_VOLTAGE)
    }

    pub fn is_low(self) -> bool {
        self == BatteryStatus::Low
    }
}

/// Low-battery entry for one sensor family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatteryEntry {
    /// A single-sensor family.
    Single(BatteryStatus),
    /// Per-channel statuses, keyed by 1-based channel.
    Channels(BTreeMap<u8, BatteryStatus>),
}

/// Battery state of every sensor family reported by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LowBattery {
    pub entries: BTreeMap<SensorCategory, BatteryEntry>,
}

impl LowBattery {
    /// Decode the 16-byte block of item 0x4C.
    fn decode(block: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = Reader::new(block, "low battery block");
        let flags = r.u8()?;
        let wh31 = r.u8()?;
        let wh51 = r.u8()?;
        let wh57 = r.u8()?;
        let wh68 = r.u8()?;
        let wh80 = r.u8()?;
        let wh41 = r.u16()?;
        let wh55 = r.u16()?;
        let wh45 = r.u8()?;
        let wh90 = r.u8()?;

        let bit = |byte: u8, n: u8| BatteryStatus::from_low(byte & (1 << n) != 0);
        let bits = |byte: u8| (1..=8).map(|ch| (ch, bit(byte, ch - 1))).collect();
        // Two levels per byte, low nibble first.
        let nibbles = |word: u16| {
            let [hi, lo] = word.to_be_bytes();
            [hi & 0x0F, hi >> 4, lo & 0x0F, lo >> 4]
                .into_iter()
                .zip(1u8..)
                .map(|(level, ch)| (ch, BatteryStatus::from_level(level)))
                .collect()
        };

        let mut entries = BTreeMap::new();
        entries.insert(SensorCategory::Wh65, BatteryEntry::Single(bit(flags, 0)));
        entries.insert(SensorCategory::Wh40, BatteryEntry::Single(bit(flags, 1)));
        entries.insert(SensorCategory::Wh26, BatteryEntry::Single(bit(flags, 2)));
        entries.insert(SensorCategory::Wh25, BatteryEntry::Single(bit(flags, 3)));
        entries.insert(SensorCategory::Wh31, BatteryEntry::Channels(bits(wh31)));
        entries.insert(SensorCategory::Wh51, BatteryEntry::Channels(bits(wh51)));
        entries.insert(
            SensorCategory::Wh57,
            BatteryEntry::Single(BatteryStatus::from_level(wh57)),
        );
        entries.insert(
            SensorCategory::Wh68,
            BatteryEntry::Single(BatteryStatus::from_voltage(wh68)),
        );
        entries.insert(
            SensorCategory::Wh80,
            BatteryEntry::Single(BatteryStatus::from_voltage(wh80)),
        );
        entries.insert(SensorCategory::Wh41, BatteryEntry::Channels(nibbles(wh41)));
        entries.insert(SensorCategory::Wh55, BatteryEntry::Channels(nibbles(wh55)));
        entries.insert(
            SensorCategory::Wh45,
            BatteryEntry::Single(BatteryStatus::from_level(wh45)),
        );
        entries.insert(
            SensorCategory::Wh90,
            BatteryEntry::Single(BatteryStatus::from_voltage(wh90)),
        );

        Ok(LowBattery { entries })
    }

    /// Status of one sensor, if the block reports it.
    pub fn get(&self, sensor_type: SensorType) -> Option<BatteryStatus> {
        match (self.entries.get(&sensor_type.category)?, sensor_type.channel) {
            (BatteryEntry::Single(status), None) => Some(*status),
            (BatteryEntry::Channels(channels), Some(ch)) => channels.get(&ch).copied(),
            _ => None,
        }
    }

    /// Keep only entries whose sensor appears in `sensors` as active.
    ///
    /// Per-channel entries match on family and channel, single entries on
    /// family alone. A per-channel family left with no channels is removed.
    pub fn retain_active(&mut self, sensors: &[Sensor]) {
        let active = |t: SensorType| sensors.iter().any(|s| s.sensor_type == t && s.is_active());

        self.entries.retain(|&category, entry| match entry {
            BatteryEntry::Single(_) => active(SensorType::single(category)),
            BatteryEntry::Channels(channels) => {
                channels.retain(|&ch, _| active(SensorType::channel(category, ch)));
                !channels.is_empty()
            }
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// WN34 user temperature probe reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserTemp {
    /// Temperature in °C.
    pub temperature: f64,
    /// Battery voltage in V.
    pub battery_voltage: f64,
}

/// WH45 air quality block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Co2Reading {
    pub temperature: f64,
    pub humidity: u8,
    pub pm10: f64,
    pub pm10_24h: f64,
    pub pm25: f64,
    pub pm25_24h: f64,
    /// CO2 in ppm.
    pub co2: u16,
    pub co2_24h: u16,
    /// Battery level, 0 to 5.
    pub battery: u8,
}

/// Decoded live readings.
///
/// Temperatures are °C, pressures hPa, wind m/s, light lux. Multi-channel
/// readings are keyed by 1-based channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveData {
    pub indoor_temp: Option<f64>,
    pub outdoor_temp: Option<f64>,
    pub dew_point: Option<f64>,
    pub wind_chill: Option<f64>,
    pub heat_index: Option<f64>,
    pub indoor_humidity: Option<u8>,
    pub outdoor_humidity: Option<u8>,
    pub abs_pressure: Option<f64>,
    pub rel_pressure: Option<f64>,
    /// Degrees from north.
    pub wind_direction: Option<u16>,
    pub wind_speed: Option<f64>,
    pub gust_speed: Option<f64>,
    pub day_max_wind: Option<f64>,
    pub light: Option<f64>,
    /// UV irradiance in µW/m².
    pub uv: Option<f64>,
    pub uv_index: Option<u8>,
    pub channel_temps: BTreeMap<u8, f64>,
    pub channel_humidity: BTreeMap<u8, u8>,
    pub soil_temps: BTreeMap<u8, f64>,
    /// Soil moisture in %.
    pub soil_moisture: BTreeMap<u8, u8>,
    /// PM2.5 in µg/m³.
    pub pm25: BTreeMap<u8, f64>,
    pub pm25_24h: BTreeMap<u8, f64>,
    /// Leak state per channel (non-zero = leak).
    pub leak: BTreeMap<u8, u8>,
    pub leaf_wetness: BTreeMap<u8, u8>,
    /// Distance of the last strike in km.
    pub lightning_distance: Option<u8>,
    /// UTC timestamp of the last strike.
    pub lightning_time: Option<u32>,
    pub lightning_count: Option<u32>,
    pub user_temps: BTreeMap<u8, UserTemp>,
    pub co2: Option<Co2Reading>,
    pub low_battery: Option<LowBattery>,
    /// Rain, merged from the secondary rain read.
    pub rain: Option<Rain>,
}

fn tenths(raw: i16) -> f64 {
    f64::from(raw) / 10.0
}

fn utenths(raw: u16) -> f64 {
    f64::from(raw) / 10.0
}

/// Decode a validated `CMD_LIVEDATA` reply.
pub fn decode_live_data(response: &[u8]) -> Result<LiveData, ProtocolError> {
    let mut r = Reader::new(frame::body(response, Command::LiveData)?, "live data item");
    let mut data = LiveData::default();

    while !r.is_empty() {
        let id = r.u8()?;
        match id {
            0x01 => data.indoor_temp = Some(tenths(r.i16()?)),
            0x02 => data.outdoor_temp = Some(tenths(r.i16()?)),
            0x03 => data.dew_point = Some(tenths(r.i16()?)),
            0x04 => data.wind_chill = Some(tenths(r.i16()?)),
            0x05 => data.heat_index = Some(tenths(r.i16()?)),
            0x06 => data.indoor_humidity = Some(r.u8()?),
            0x07 => data.outdoor_humidity = Some(r.u8()?),
            0x08 => data.abs_pressure = Some(utenths(r.u16()?)),
            0x09 => data.rel_pressure = Some(utenths(r.u16()?)),
            0x0A => data.wind_direction = Some(r.u16()?),
            0x0B => data.wind_speed = Some(utenths(r.u16()?)),
            0x0C => data.gust_speed = Some(utenths(r.u16()?)),
            0x0D..=0x11 => r.skip(2)?,
            0x12..=0x14 => r.skip(4)?,
            0x15 => data.light = Some(f64::from(r.u32()?) / 10.0),
            0x16 => data.uv = Some(utenths(r.u16()?)),
            0x17 => data.uv_index = Some(r.u8()?),
            0x18 => r.skip(6)?,
            0x19 => data.day_max_wind = Some(utenths(r.u16()?)),
            0x1A..=0x21 => {
                data.channel_temps.insert(id - 0x19, tenths(r.i16()?));
            }
            0x22..=0x29 => {
                data.channel_humidity.insert(id - 0x21, r.u8()?);
            }
            0x2A => {
                data.pm25.insert(1, utenths(r.u16()?));
            }
            0x2B..=0x4A => {
                let offset = id - 0x2B;
                let ch = offset / 2 + 1;
                if offset % 2 == 0 {
                    data.soil_temps.insert(ch, tenths(r.i16()?));
                } else {
                    data.soil_moisture.insert(ch, r.u8()?);
                }
            }
            0x4C => {
                data.low_battery = Some(LowBattery::decode(r.take(LOW_BATTERY_BLOCK_LEN)?)?);
            }
            0x4D..=0x50 => {
                data.pm25_24h.insert(id - 0x4C, utenths(r.u16()?));
            }
            0x51..=0x53 => {
                data.pm25.insert(id - 0x4F, utenths(r.u16()?));
            }
            0x58..=0x5B => {
                data.leak.insert(id - 0x57, r.u8()?);
            }
            0x60 => data.lightning_distance = Some(r.u8()?),
            0x61 => data.lightning_time = Some(r.u32()?),
            0x62 => data.lightning_count = Some(r.u32()?),
            0x63..=0x6A => {
                let temperature = tenths(r.i16()?);
                let battery_voltage = f64::from(r.u8()?) * VOLTAGE_STEP;
                data.user_temps.insert(
                    id - 0x62,
                    UserTemp {
                        temperature,
                        battery_voltage,
                    },
                );
            }
            0x70 => data.co2 = Some(decode_co2(r.take(CO2_BLOCK_LEN)?)?),
            0x72..=0x79 => {
                data.leaf_wetness.insert(id - 0x71, r.u8()?);
            }
            0x7A | 0x7B => r.skip(1)?,
            0x80..=0x82 => r.skip(2)?,
            0x83..=0x86 => r.skip(4)?,
            0x87 => r.skip(20)?,
            0x88 => r.skip(3)?,
            _ => {
                warn!(
                    item = format_args!("{:#04x}", id),
                    remaining = r.remaining(),
                    "Unknown live data item, ignoring the rest of the reply"
                );
                break;
            }
        }
    }

    Ok(data)
}

fn decode_co2(block: &[u8]) -> Result<Co2Reading, ProtocolError> {
    let mut r = Reader::new(block, "CO2 block");
    Ok(Co2Reading {
        temperature: tenths(r.i16()?),
        humidity: r.u8()?,
        pm10: utenths(r.u16()?),
        pm10_24h: utenths(r.u16()?),
        pm25: utenths(r.u16()?),
        pm25_24h: utenths(r.u16()?),
        co2: r.u16()?,
        co2_24h: r.u16()?,
        battery: r.u8()?,
    })
}
