//! Gateway command codes.
//!
//! Every request names exactly one [`Command`]; the gateway echoes the same
//! byte at offset 2 of its reply. The codes are fixed by the firmware and
//! are never negotiated.

use std::fmt;

/// A gateway command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Read the station MAC address.
    ReadStationMac = 0x26,
    /// Read current sensor readings.
    LiveData = 0x27,
    /// Read soil moisture calibration for every channel.
    GetSoilHumiAd = 0x28,
    /// Write soil moisture calibration for one channel.
    SetSoilHumiAd = 0x29,
    /// Read the customized upload server settings.
    ReadCustomized = 0x2A,
    /// Write the customized upload server settings.
    WriteCustomized = 0x2B,
    /// Read PM2.5 sensor offsets.
    GetPm25Offset = 0x2E,
    /// Read system parameters (frequency band, clock, timezone).
    ReadSystemParams = 0x30,
    /// Read legacy (tipping bucket) rain totals.
    ReadRainData = 0x34,
    /// Write legacy rain totals.
    WriteRainData = 0x35,
    /// Read the list of paired sensors.
    ReadSensorIdNew = 0x3C,
    /// Read the firmware version string.
    ReadFirmwareVersion = 0x50,
    /// Read the customized upload paths.
    ReadUserPath = 0x51,
    /// Write the customized upload paths.
    WriteUserPath = 0x52,
    /// Read CO2 sensor offsets.
    GetCo2Offset = 0x53,
    /// Read rain totals including piezo gauge data.
    ReadRain = 0x57,
}

impl Command {
    /// The wire byte for this command.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Width in bytes of the size field in this command's *response*.
    ///
    /// Requests always carry a one-byte size. Replies whose payload can
    /// exceed 255 bytes use a big-endian two-byte size instead.
    pub const fn response_size_width(self) -> usize {
        match self {
            Command::LiveData | Command::ReadSensorIdNew | Command::ReadRain => 2,
            _ => 1,
        }
    }

    /// Returns `true` for commands that change gateway state.
    pub const fn is_write(self) -> bool {
        matches!(
            self,
            Command::SetSoilHumiAd
                | Command::WriteCustomized
                | Command::WriteRainData
                | Command::WriteUserPath
        )
    }

    /// Look up a command by its wire byte.
    pub fn from_code(code: u8) -> Option<Command> {
        ALL_COMMANDS.iter().copied().find(|c| c.code() == code)
    }

    /// Firmware-style name of the command (e.g. `CMD_READ_RAIN`).
    pub fn name(self) -> &'static str {
        match self {
            Command::ReadStationMac => "CMD_READ_STATION_MAC",
            Command::LiveData => "CMD_LIVEDATA",
            Command::GetSoilHumiAd => "CMD_GET_SOILHUMIAD",
            Command::SetSoilHumiAd => "CMD_SET_SOILHUMIAD",
            Command::ReadCustomized => "CMD_READ_CUSTOMIZED",
            Command::WriteCustomized => "CMD_WRITE_CUSTOMIZED",
            Command::GetPm25Offset => "CMD_GET_PM25_OFFSET",
            Command::ReadSystemParams => "CMD_READ_SSSS",
            Command::ReadRainData => "CMD_READ_RAINDATA",
            Command::WriteRainData => "CMD_WRITE_RAINDATA",
            Command::ReadSensorIdNew => "CMD_READ_SENSOR_ID_NEW",
            Command::ReadFirmwareVersion => "CMD_READ_FIRMWARE_VERSION",
            Command::ReadUserPath => "CMD_READ_USR_PATH",
            Command::WriteUserPath => "CMD_WRITE_USR_PATH",
            Command::GetCo2Offset => "CMD_GET_CO2_OFFSET",
            Command::ReadRain => "CMD_READ_RAIN",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.code())
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> u8 {
        command.code()
    }
}

/// Every command this client knows, in code order.
pub const ALL_COMMANDS: [Command; 16] = [
    Command::ReadStationMac,
    Command::LiveData,
    Command::GetSoilHumiAd,
    Command::SetSoilHumiAd,
    Command::ReadCustomized,
    Command::WriteCustomized,
    Command::GetPm25Offset,
    Command::ReadSystemParams,
    Command::ReadRainData,
    Command::WriteRainData,
    Command::ReadSensorIdNew,
    Command::ReadFirmwareVersion,
    Command::ReadUserPath,
    Command::WriteUserPath,
    Command::GetCo2Offset,
    Command::ReadRain,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_lookup() {
        for command in ALL_COMMANDS {
            assert_eq!(Command::from_code(command.code()), Some(command));
        }
        assert_eq!(Command::from_code(0x00), None);
        assert_eq!(Command::from_code(0xFF), None);
    }

    #[test]
    fn codes_are_unique_and_sorted() {
        for pair in ALL_COMMANDS.windows(2) {
            assert!(pair[0].code() < pair[1].code());
        }
    }

    #[test]
    fn wide_size_field_commands() {
        assert_eq!(Command::LiveData.response_size_width(), 2);
        assert_eq!(Command::ReadSensorIdNew.response_size_width(), 2);
        assert_eq!(Command::ReadRain.response_size_width(), 2);
        assert_eq!(Command::ReadRainData.response_size_width(), 1);
        assert_eq!(Command::ReadFirmwareVersion.response_size_width(), 1);
    }

    #[test]
    fn write_commands() {
        let writes: Vec<Command> = ALL_COMMANDS.into_iter().filter(|c| c.is_write()).collect();
        assert_eq!(
            writes,
            vec![
                Command::SetSoilHumiAd,
                Command::WriteCustomized,
                Command::WriteRainData,
                Command::WriteUserPath,
            ]
        );
    }

    #[test]
    fn display_includes_name_and_code() {
        assert_eq!(Command::ReadRain.to_string(), "CMD_READ_RAIN (0x57)");
        assert_eq!(u8::from(Command::LiveData), 0x27);
    }
}
