// gwlib test application -- CLI tool for exercising a weather-station
// gateway through gwlib.
//
// Usage:
//   gwlib-test-app discover --window-secs 10
//   gwlib-test-app --host 192.168.1.20 sensors --active
//   gwlib-test-app --host 192.168.1.20 live --filter-active
//   gwlib-test-app --host 192.168.1.20 rain set --day 0 --week 12.5
//   gwlib-test-app --host 192.168.1.20 soil set --channel 2 --min-ad 70 --max-ad 350
//   gwlib-test-app --host 192.168.1.20 server set --server ecowitt.local --interval 60
//   gwlib-test-app --host 192.168.1.20 --log-level gwlib_ecowitt=trace firmware

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gwlib::ecowitt::{
    CustomServerInfo, CustomServerInfoUpdate, DEFAULT_DISCOVERY_WINDOW, EcowittGateway,
    GatewayBuilder, LiveDataOptions, Rain, RainData, RainDataUpdate, RainSource, Sensor,
    SensorFilter, SoilCalibrationUpdate,
};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// gwlib test application -- talks to a weather gateway from the command line.
#[derive(Parser)]
#[command(name = "gwlib-test-app", version, about)]
struct Cli {
    /// Gateway host name or IP address.
    /// Required for every command except `discover`.
    #[arg(long)]
    host: Option<String>,

    /// Gateway TCP port.
    #[arg(long, default_value_t = gwlib::transport::DEFAULT_PORT)]
    port: u16,

    /// Deadline for one command, from connect to reply.
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    /// Pin the rain source (legacy or piezo) instead of deriving it from
    /// the firmware version.
    #[arg(long)]
    rain_source: Option<RainSource>,

    /// Log filter, e.g. "info" or "gwlib_ecowitt=trace".
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for gateway broadcasts on the LAN.
    /// Does not require --host.
    Discover {
        /// Listening window in seconds.
        #[arg(long, default_value_t = DEFAULT_DISCOVERY_WINDOW.as_secs())]
        window_secs: u64,
    },

    /// List the sensors the gateway knows about.
    Sensors {
        /// Only show sensors that are currently reporting.
        #[arg(long)]
        active: bool,
    },

    /// Print the current readings.
    Live {
        /// Skip the rain read.
        #[arg(long)]
        no_rain: bool,

        /// Only report low batteries for active sensors.
        #[arg(long)]
        filter_active: bool,
    },

    /// Rain totals from the resolved rain source.
    Rain {
        #[command(subcommand)]
        action: RainAction,
    },

    /// Print the full piezo/traditional rain report.
    Piezo,

    /// Soil moisture calibration.
    Soil {
        #[command(subcommand)]
        action: SoilAction,
    },

    /// Print the PM2.5 channel offsets.
    Pm25,

    /// Print the WH45 CO2 offsets.
    Co2,

    /// Print the firmware version.
    Firmware,

    /// Print the station MAC address.
    Mac,

    /// Print the system parameters.
    System,

    /// Customized upload server settings.
    Server {
        #[command(subcommand)]
        action: ServerAction,
    },
}

#[derive(Subcommand)]
enum RainAction {
    /// Read the rain totals.
    Get,
    /// Change one or more rain totals (mm).
    Set {
        #[arg(long, allow_negative_numbers = true)]
        rate: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        day: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        week: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        month: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        year: Option<f64>,
    },
}

#[derive(Subcommand)]
enum SoilAction {
    /// Read the calibration of every soil channel.
    Get,
    /// Change one channel's calibration.
    Set {
        /// Soil channel, 1 to 8.
        #[arg(long, allow_negative_numbers = true)]
        channel: i64,
        /// Enable (true) or disable (false) custom calibration.
        #[arg(long)]
        enabled: Option<bool>,
        /// AD value for 0% moisture.
        #[arg(long, allow_negative_numbers = true)]
        min_ad: Option<i64>,
        /// AD value for 100% moisture.
        #[arg(long, allow_negative_numbers = true)]
        max_ad: Option<i64>,
    },
}

#[derive(Subcommand)]
enum ServerAction {
    /// Read the upload server settings.
    Get,
    /// Change one or more upload server settings.
    Set {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        server: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        port: Option<i64>,
        /// Upload interval in seconds.
        #[arg(long, allow_negative_numbers = true)]
        interval: Option<i64>,
        /// ecowitt or wunderground.
        #[arg(long)]
        protocol: Option<String>,
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long)]
        ecowitt_path: Option<String>,
        #[arg(long)]
        wu_path: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

fn print_rain_data(label: &str, data: &RainData) {
    println!("{label}");
    println!("  Rate:   {:>8.1} mm/h", data.rain_rate);
    println!("  Day:    {:>8.1} mm", data.rain_day);
    println!("  Week:   {:>8.1} mm", data.rain_week);
    println!("  Month:  {:>8.1} mm", data.rain_month);
    println!("  Year:   {:>8.1} mm", data.rain_year);
}

fn print_sensor(sensor: &Sensor) {
    println!(
        "{:<12}  {:>8}  {:>6}  {:>7}  {:?}",
        sensor.sensor_type.to_string(),
        sensor.id_hex(),
        sensor.signal,
        sensor.battery,
        sensor.status
    );
}

fn print_server(info: &CustomServerInfo) {
    println!("Station id:        {}", info.id);
    println!("Server:            {}:{}", info.server, info.port);
    println!("Interval:          {} s", info.interval);
    println!("Protocol:          {}", info.protocol);
    println!("Enabled:           {}", info.enabled);
    println!("Ecowitt path:      {}", info.ecowitt_path);
    println!("Wunderground path: {}", info.wunderground_path);
}

fn opt<T: std::fmt::Display>(value: Option<T>, unit: &str) -> String {
    match value {
        Some(v) => format!("{v} {unit}"),
        None => "-".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_discover(window_secs: u64) -> Result<()> {
    println!("Listening for gateways for {window_secs} seconds...");
    let found = EcowittGateway::discover(Duration::from_secs(window_secs))
        .await
        .context("gateway discovery failed")?;

    if found.is_empty() {
        println!("No gateways found.");
        return Ok(());
    }
    for ip in &found {
        println!("  {ip}");
    }
    println!("{} gateway(s) found.", found.len());
    Ok(())
}

async fn cmd_sensors(gateway: &EcowittGateway, active: bool) -> Result<()> {
    let only_active: &SensorFilter = &|s: &Sensor| s.is_active();
    let sensors = gateway
        .get_sensors(active.then_some(only_active))
        .await?;

    println!(
        "{:<12}  {:>8}  {:>6}  {:>7}  Status",
        "Type", "Id", "Signal", "Battery"
    );
    for sensor in &sensors {
        print_sensor(sensor);
    }
    println!("{} sensor(s).", sensors.len());
    Ok(())
}

async fn cmd_live(gateway: &EcowittGateway, no_rain: bool, filter_active: bool) -> Result<()> {
    let options = LiveDataOptions {
        include_rain: !no_rain,
        filter_active_sensors: filter_active,
    };
    let start = Instant::now();
    let data = gateway.get_live_data(options).await?;

    println!("Indoor:       {} / {}", opt(data.indoor_temp, "°C"), opt(data.indoor_humidity, "%"));
    println!("Outdoor:      {} / {}", opt(data.outdoor_temp, "°C"), opt(data.outdoor_humidity, "%"));
    println!("Dew point:    {}", opt(data.dew_point, "°C"));
    println!("Pressure:     {} abs, {} rel", opt(data.abs_pressure, "hPa"), opt(data.rel_pressure, "hPa"));
    println!(
        "Wind:         {} gust {} from {}",
        opt(data.wind_speed, "m/s"),
        opt(data.gust_speed, "m/s"),
        opt(data.wind_direction, "°")
    );
    println!("Light:        {}  UV index {}", opt(data.light, "lux"), opt(data.uv_index, ""));
    for (ch, temp) in &data.channel_temps {
        let hum = data.channel_humidity.get(ch).copied();
        println!("Channel {ch}:    {temp} °C / {}", opt(hum, "%"));
    }
    for (ch, moisture) in &data.soil_moisture {
        println!("Soil {ch}:       {moisture} %");
    }
    for (ch, pm) in &data.pm25 {
        println!("PM2.5 {ch}:      {pm} µg/m³");
    }
    if let Some(co2) = &data.co2 {
        println!("CO2:          {} ppm (24h {} ppm)", co2.co2, co2.co2_24h);
    }

    match &data.rain {
        Some(Rain::Legacy(totals)) => print_rain_data("Rain (legacy):", totals),
        Some(Rain::Piezo(report)) => print_rain_data("Rain (preferred gauge):", report.preferred()),
        None if no_rain => {}
        None => println!("Rain:         unavailable"),
    }

    if let Some(low_battery) = &data.low_battery {
        if low_battery.is_empty() {
            println!("Batteries:    no report");
        }
        for (category, entry) in &low_battery.entries {
            println!("Battery {category}: {entry:?}");
        }
    }

    println!();
    println!("Read in {:.1} ms", start.elapsed().as_secs_f64() * 1000.0);
    Ok(())
}

async fn cmd_rain(gateway: &EcowittGateway, action: RainAction) -> Result<()> {
    match action {
        RainAction::Get => {
            let data = gateway.get_rain_data().await?;
            print_rain_data("Rain totals:", &data);
        }
        RainAction::Set {
            rate,
            day,
            week,
            month,
            year,
        } => {
            let update = RainDataUpdate {
                rain_rate: rate,
                rain_day: day,
                rain_week: week,
                rain_month: month,
                rain_year: year,
            };
            if update.is_empty() {
                bail!("nothing to change; pass at least one of --rate, --day, --week, --month, --year");
            }
            let written = gateway
                .set_rain_data(update)
                .await
                .context("rain update failed")?;
            print_rain_data("Rain totals written:", &written);
        }
    }
    Ok(())
}

async fn cmd_piezo(gateway: &EcowittGateway) -> Result<()> {
    let report = gateway.get_rain().await?;
    print_rain_data("Traditional gauge:", &report.traditional);
    println!("  Event:  {}", opt(report.event, "mm"));
    println!("  Hourly: {}", opt(report.hourly, "mm"));
    println!("  Total:  {}", opt(report.total, "mm"));
    if let Some(piezo) = &report.piezo {
        print_rain_data("Piezo gauge:", piezo);
        println!("  Event:  {}", opt(report.piezo_event, "mm"));
        println!("  Hourly: {}", opt(report.piezo_hourly, "mm"));
    }
    if let Some(priority) = report.priority {
        println!("Priority: {priority:?}");
    }
    Ok(())
}

async fn cmd_soil(gateway: &EcowittGateway, action: SoilAction) -> Result<()> {
    match action {
        SoilAction::Get => {
            let channels = gateway.get_soil_calibration().await?;
            println!(
                "{:<8}  {:>8}  {:>6}  {:>7}  {:>6}  {:>6}",
                "Channel", "Moisture", "AD", "Custom", "Min AD", "Max AD"
            );
            for cal in &channels {
                println!(
                    "{:<8}  {:>7}%  {:>6}  {:>7}  {:>6}  {:>6}",
                    cal.channel,
                    cal.humidity,
                    cal.current_ad,
                    cal.calibration_enabled != 0,
                    cal.min_ad,
                    cal.max_ad
                );
            }
        }
        SoilAction::Set {
            channel,
            enabled,
            min_ad,
            max_ad,
        } => {
            let mut update = SoilCalibrationUpdate::new(channel);
            if let Some(enabled) = enabled {
                update = update.calibration_enabled(enabled);
            }
            if let Some(min_ad) = min_ad {
                update = update.min_ad(min_ad);
            }
            if let Some(max_ad) = max_ad {
                update = update.max_ad(max_ad);
            }
            let written = gateway
                .set_soil_calibration(update)
                .await
                .with_context(|| format!("soil calibration update for channel {channel} failed"))?;
            println!(
                "Channel {}: custom {}, min AD {}, max AD {}",
                written.channel,
                written.calibration_enabled != 0,
                written.min_ad,
                written.max_ad
            );
        }
    }
    Ok(())
}

async fn cmd_server(gateway: &EcowittGateway, action: ServerAction) -> Result<()> {
    match action {
        ServerAction::Get => {
            let info = gateway.get_custom_server_info().await?;
            print_server(&info);
        }
        ServerAction::Set {
            id,
            password,
            server,
            port,
            interval,
            protocol,
            enabled,
            ecowitt_path,
            wu_path,
        } => {
            let update = CustomServerInfoUpdate {
                id,
                password,
                server,
                port,
                interval,
                protocol,
                enabled,
                ecowitt_path,
                wunderground_path: wu_path,
            };
            if update == CustomServerInfoUpdate::default() {
                bail!("nothing to change; pass at least one server setting");
            }
            let written = gateway
                .set_custom_server_info(update)
                .await
                .context("custom server update failed")?;
            println!("Written:");
            print_server(&written);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Gateway construction
// ---------------------------------------------------------------------------

fn create_gateway(cli: &Cli) -> Result<EcowittGateway> {
    let Some(host) = cli.host.as_deref() else {
        bail!("--host is required for this command (use `discover` to find gateways)");
    };

    let mut builder = GatewayBuilder::new()
        .host(host)
        .port(cli.port)
        .command_timeout(Duration::from_millis(cli.timeout_ms));
    if let Some(source) = cli.rain_source {
        builder = builder.rain_source(source);
    }
    builder.build().context("invalid gateway settings")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid --log-level '{}'", cli.log_level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // `discover` does not need a gateway address.
    if let Command::Discover { window_secs } = &cli.command {
        return cmd_discover(*window_secs).await;
    }

    let gateway = create_gateway(&cli)?;
    tracing::debug!(addr = %gateway.peer(), "Gateway configured");

    match cli.command {
        Command::Discover { .. } => Ok(()),
        Command::Sensors { active } => cmd_sensors(&gateway, active).await,
        Command::Live {
            no_rain,
            filter_active,
        } => cmd_live(&gateway, no_rain, filter_active).await,
        Command::Rain { action } => cmd_rain(&gateway, action).await,
        Command::Piezo => cmd_piezo(&gateway).await,
        Command::Soil { action } => cmd_soil(&gateway, action).await,
        Command::Pm25 => {
            for offset in gateway.get_pm25_offsets().await? {
                println!("Channel {}: {:+.1} µg/m³", offset.channel, offset.offset);
            }
            Ok(())
        }
        Command::Co2 => {
            let offsets = gateway.get_co2_offsets().await?;
            println!("CO2:   {:+} ppm", offsets.co2);
            println!("PM2.5: {:+.1} µg/m³", offsets.pm25);
            println!("PM10:  {:+.1} µg/m³", offsets.pm10);
            Ok(())
        }
        Command::Firmware => {
            println!("{}", gateway.get_firmware_version().await?);
            Ok(())
        }
        Command::Mac => {
            println!("{}", gateway.get_mac_address().await?);
            Ok(())
        }
        Command::System => {
            let params = gateway.get_system_params().await?;
            println!("Frequency:      {}", params.frequency);
            println!("Outdoor sensor: {:?}", params.outdoor_sensor);
            println!("UTC time:       {}", params.utc_time);
            println!("Timezone index: {}", params.timezone_index);
            println!("DST:            {}", params.dst);
            println!("Raw:            {}", params.raw_hex());
            Ok(())
        }
        Command::Server { action } => cmd_server(&gateway, action).await,
    }
}
