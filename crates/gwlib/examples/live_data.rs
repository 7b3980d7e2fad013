//! Live data example.
//!
//! Demonstrates connecting to a gateway, listing its active sensors, and
//! printing the current readings with rain merged in. Low-battery warnings
//! are filtered to sensors that are actually paired.
//!
//! # Requirements
//!
//! - A GW1000/GW1100/GW2000 (or compatible) gateway on the LAN
//! - The gateway address adjusted for your network
//!
//! # Usage
//!
//! ```sh
//! RUST_LOG=gwlib_ecowitt=debug cargo run -p gwlib --example live_data
//! ```

use std::time::Duration;

use gwlib::ecowitt::{GatewayBuilder, LiveDataOptions, Sensor};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Adjust this to match your gateway's address.
    let host = "192.168.1.20";

    println!("Connecting to gateway at {}...", host);

    let gateway = GatewayBuilder::new()
        .host(host)
        .command_timeout(Duration::from_millis(3000))
        .build()?;

    println!("Firmware: {}", gateway.get_firmware_version().await?);
    println!("Rain source: {}\n", gateway.rain_source().await);

    // Every unfiltered read also refreshes the cache used for the
    // low-battery filter below.
    let sensors = gateway.get_sensors(None).await?;
    let active: Vec<&Sensor> = sensors.iter().filter(|s| s.is_active()).collect();
    println!("Active sensors: {}", active.len());
    for sensor in &active {
        println!(
            "  {:<10} id {:>8}  signal {}/4  battery {}",
            sensor.sensor_type.to_string(),
            sensor.id_hex(),
            sensor.signal,
            sensor.battery
        );
    }

    let options = LiveDataOptions {
        include_rain: true,
        filter_active_sensors: true,
    };
    let data = gateway.get_live_data(options).await?;

    println!("\nIndoor:  {:?} °C, {:?} %", data.indoor_temp, data.indoor_humidity);
    println!("Outdoor: {:?} °C, {:?} %", data.outdoor_temp, data.outdoor_humidity);
    println!("Pressure (rel): {:?} hPa", data.rel_pressure);
    println!(
        "Wind: {:?} m/s gusting {:?} m/s from {:?}°",
        data.wind_speed, data.gust_speed, data.wind_direction
    );
    for (ch, temp) in &data.channel_temps {
        println!("Channel {}: {} °C", ch, temp);
    }

    match &data.rain {
        Some(rain) => {
            let totals = rain.preferred();
            println!(
                "Rain: {} mm/h, day {} mm, year {} mm",
                totals.rain_rate, totals.rain_day, totals.rain_year
            );
        }
        None => println!("Rain: unavailable"),
    }

    if let Some(low_battery) = &data.low_battery {
        for (category, entry) in &low_battery.entries {
            println!("Battery {}: {:?}", category, entry);
        }
    }

    Ok(())
}
