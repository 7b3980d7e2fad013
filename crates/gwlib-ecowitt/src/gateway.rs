//! EcowittGateway -- the client for one weather-station gateway.
//!
//! Each operation maps onto one or a few gateway commands. Every command
//! runs over its own short-lived connection through the
//! [`CommandExecutor`]; the only state kept between calls is the last
//! unfiltered sensor list (used to filter low-battery reports) and the
//! rain source, resolved once from the firmware version.
//!
//! Writes follow the same pattern: validate what the caller supplied,
//! read the current record, overlay the changes, validate the merged
//! record, write it, and check the gateway's result byte.

use std::net::IpAddr;
use std::time::Duration;

use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

use gwlib_core::error::{Error, Result, ValidationError};

use crate::commands::Command;
use crate::device::{self, Co2Offsets, MacAddress, Pm25Offset, SystemParams};
use crate::discovery;
use crate::exec::CommandExecutor;
use crate::frame;
use crate::live::{self, LiveData, LiveDataOptions};
use crate::rain::{self, Rain, RainData, RainDataUpdate, RainReport, RainSource};
use crate::sensors::{self, Sensor, SensorFilter};
use crate::server::{self, CustomServerInfo, CustomServerInfoUpdate};
use crate::soil::{self, SoilCalibration, SoilCalibrationUpdate};

/// A weather-station gateway.
///
/// Constructed via [`GatewayBuilder`](crate::builder::GatewayBuilder).
/// All methods take `&self`, and concurrent calls use independent
/// connections.
pub struct EcowittGateway {
    exec: CommandExecutor,
    rain_source: OnceCell<RainSource>,
    sensors: Mutex<Option<Vec<Sensor>>>,
}

impl EcowittGateway {
    pub(crate) fn new(exec: CommandExecutor, rain_source: Option<RainSource>) -> Self {
        EcowittGateway {
            exec,
            rain_source: OnceCell::new_with(rain_source),
            sensors: Mutex::new(None),
        }
    }

    /// Listen for gateway broadcasts for `window` and return their addresses.
    pub async fn discover(window: Duration) -> Result<Vec<IpAddr>> {
        discovery::discover(window).await
    }

    /// The gateway address.
    pub fn peer(&self) -> &str {
        self.exec.peer()
    }

    /// The per-command deadline.
    pub fn command_timeout(&self) -> Duration {
        self.exec.timeout()
    }

    // ---------------------------------------------------------------
    // Sensors and live data
    // ---------------------------------------------------------------

    /// Read the gateway's sensor table.
    ///
    /// With no filter the result also replaces the cached sensor list used
    /// by [`get_live_data`](Self::get_live_data); filtered reads leave the
    /// cache alone.
    pub async fn get_sensors(&self, filter: Option<&SensorFilter>) -> Result<Vec<Sensor>> {
        let response = self.exec.execute(Command::ReadSensorIdNew, None).await?;
        let list = sensors::decode_sensors(&response, filter)?;
        debug!(addr = %self.peer(), count = list.len(), filtered = filter.is_some(), "Read sensors");

        if filter.is_none() {
            *self.sensors.lock().await = Some(list.clone());
        }
        Ok(list)
    }

    /// The sensor list cached by the last unfiltered [`get_sensors`](Self::get_sensors).
    pub async fn cached_sensors(&self) -> Option<Vec<Sensor>> {
        self.sensors.lock().await.clone()
    }

    /// Read live sensor values.
    ///
    /// With `filter_active_sensors`, low-battery entries are kept only for
    /// sensors that are active, using the cached sensor list or reading it
    /// first; a failed sensor read fails the call. With `include_rain`,
    /// rain is read with the gateway's rain command and merged in; a failed
    /// rain read is logged and the data returned without rain.
    pub async fn get_live_data(&self, options: LiveDataOptions) -> Result<LiveData> {
        let response = self.exec.execute(Command::LiveData, None).await?;
        let mut data = live::decode_live_data(&response)?;

        if options.filter_active_sensors {
            let sensors = self.sensor_list().await?;
            if let Some(low_battery) = data.low_battery.as_mut() {
                low_battery.retain_active(&sensors);
            }
        }

        if options.include_rain {
            match self.read_rain().await {
                Ok(rain) => data.rain = Some(rain),
                Err(e) => {
                    warn!(addr = %self.peer(), error = %e, "Rain read failed, returning live data without rain");
                }
            }
        }

        Ok(data)
    }

    async fn sensor_list(&self) -> Result<Vec<Sensor>> {
        if let Some(cached) = self.cached_sensors().await {
            return Ok(cached);
        }
        self.get_sensors(None).await
    }

    // ---------------------------------------------------------------
    // Rain
    // ---------------------------------------------------------------

    /// The command family used to read rain from this gateway.
    ///
    /// Resolved on first use from the firmware version unless pinned by
    /// the builder. If the firmware cannot be read, the piezo-capable read
    /// is assumed.
    pub async fn rain_source(&self) -> RainSource {
        *self
            .rain_source
            .get_or_init(|| async {
                match self.get_firmware_version().await {
                    Ok(firmware) => {
                        let source = RainSource::from_firmware(&firmware);
                        debug!(addr = %self.peer(), firmware = %firmware, source = %source, "Resolved rain source");
                        source
                    }
                    Err(e) => {
                        warn!(addr = %self.peer(), error = %e, "Firmware read failed, assuming piezo rain source");
                        RainSource::Piezo
                    }
                }
            })
            .await
    }

    async fn read_rain(&self) -> Result<Rain> {
        match self.rain_source().await {
            RainSource::Legacy => Ok(Rain::Legacy(self.get_rain_data().await?)),
            RainSource::Piezo => Ok(Rain::Piezo(self.get_rain().await?)),
        }
    }

    /// Read the legacy rain totals.
    pub async fn get_rain_data(&self) -> Result<RainData> {
        let response = self.exec.execute(Command::ReadRainData, None).await?;
        Ok(rain::decode_rain_data(&response)?)
    }

    /// Read rain including piezo gauge totals.
    pub async fn get_rain(&self) -> Result<RainReport> {
        let response = self.exec.execute(Command::ReadRain, None).await?;
        Ok(rain::decode_rain(&response)?)
    }

    /// Change some of the legacy rain totals and return the record written.
    pub async fn set_rain_data(&self, update: RainDataUpdate) -> Result<RainData> {
        update.validate()?;
        let current = self.get_rain_data().await?;
        let merged = update.apply(current);
        let payload = rain::encode_rain_data(&merged)?;

        self.write(Command::WriteRainData, &payload, "rain data update").await?;
        debug!(addr = %self.peer(), "Rain data updated");
        Ok(merged)
    }

    // ---------------------------------------------------------------
    // Soil moisture calibration
    // ---------------------------------------------------------------

    /// Read the calibration of every soil moisture channel.
    pub async fn get_soil_calibration(&self) -> Result<Vec<SoilCalibration>> {
        let response = self.exec.execute(Command::GetSoilHumiAd, None).await?;
        Ok(soil::decode_soil_calibration(&response)?)
    }

    /// Change one channel's calibration and return the record written.
    pub async fn set_soil_calibration(
        &self,
        update: SoilCalibrationUpdate,
    ) -> Result<SoilCalibration> {
        update.validate()?;
        let channel = update.channel_index()?;

        let current = self
            .get_soil_calibration()
            .await?
            .into_iter()
            .find(|c| c.channel == channel)
            .ok_or_else(|| {
                ValidationError::new(
                    "channel",
                    format!("gateway reports no soil sensor on channel {channel}"),
                )
            })?;
        let merged = update.apply(current)?;
        let payload = soil::encode_soil_calibration(&merged)?;

        self.write(Command::SetSoilHumiAd, &payload, "soil calibration update")
            .await?;
        debug!(addr = %self.peer(), channel = channel, "Soil calibration updated");
        Ok(merged)
    }

    // ---------------------------------------------------------------
    // Read-only device records
    // ---------------------------------------------------------------

    /// Read the PM2.5 offset of every channel.
    pub async fn get_pm25_offsets(&self) -> Result<Vec<Pm25Offset>> {
        let response = self.exec.execute(Command::GetPm25Offset, None).await?;
        Ok(device::decode_pm25_offsets(&response)?)
    }

    /// Read the WH45 offsets.
    pub async fn get_co2_offsets(&self) -> Result<Co2Offsets> {
        let response = self.exec.execute(Command::GetCo2Offset, None).await?;
        Ok(device::decode_co2_offsets(&response)?)
    }

    pub async fn get_firmware_version(&self) -> Result<String> {
        let response = self.exec.execute(Command::ReadFirmwareVersion, None).await?;
        Ok(device::decode_firmware(&response)?)
    }

    pub async fn get_system_params(&self) -> Result<SystemParams> {
        let response = self.exec.execute(Command::ReadSystemParams, None).await?;
        Ok(device::decode_system_params(&response)?)
    }

    pub async fn get_mac_address(&self) -> Result<MacAddress> {
        let response = self.exec.execute(Command::ReadStationMac, None).await?;
        Ok(device::decode_mac(&response)?)
    }

    // ---------------------------------------------------------------
    // Customized upload server
    // ---------------------------------------------------------------

    /// Read the upload server settings and paths.
    pub async fn get_custom_server_info(&self) -> Result<CustomServerInfo> {
        let customized = self.exec.execute(Command::ReadCustomized, None).await?;
        let user_path = self.exec.execute(Command::ReadUserPath, None).await?;
        Ok(server::decode_custom_server(&customized, &user_path)?)
    }

    /// Change the upload server settings and return the record written.
    ///
    /// The settings are written before the paths. If the gateway rejects
    /// the settings, the paths are not written.
    pub async fn set_custom_server_info(
        &self,
        update: CustomServerInfoUpdate,
    ) -> Result<CustomServerInfo> {
        update.validate()?;
        let current = self.get_custom_server_info().await?;
        let merged = update.apply(current)?;
        let settings = server::encode_custom_server(&merged)?;
        let paths = server::encode_user_path(&merged)?;

        self.write(Command::WriteCustomized, &settings, "custom server update")
            .await?;
        self.write(Command::WriteUserPath, &paths, "user path update")
            .await?;
        debug!(addr = %self.peer(), server = %merged.server, "Custom server updated");
        Ok(merged)
    }

    /// Send a write command and check the gateway applied it.
    async fn write(&self, command: Command, payload: &[u8], operation: &'static str) -> Result<()> {
        let response = self.exec.execute(command, Some(payload)).await?;
        match frame::ack_status(&response, command)? {
            0 => Ok(()),
            status => {
                warn!(addr = %self.peer(), command = %command, status = status, "Write rejected by gateway");
                Err(Error::DeviceRejected { operation, status })
            }
        }
    }
}

impl std::fmt::Debug for EcowittGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcowittGateway")
            .field("exec", &self.exec)
            .field("rain_source", &self.rain_source.get())
            .finish()
    }
}
