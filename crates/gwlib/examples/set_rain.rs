//! Rain total reset example.
//!
//! Demonstrates a partial record update: only the daily rain total is
//! changed, the other totals are read from the gateway and written back
//! unchanged.
//!
//! # Requirements
//!
//! - A gateway with a tipping bucket rain gauge
//! - The gateway address adjusted for your network
//!
//! # Usage
//!
//! ```sh
//! cargo run -p gwlib --example set_rain
//! ```

use gwlib::Error;
use gwlib::ecowitt::{GatewayBuilder, RainDataUpdate};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Adjust this to match your gateway's address.
    let host = "192.168.1.20";

    let gateway = GatewayBuilder::new().host(host).build()?;

    let before = gateway.get_rain_data().await?;
    println!("Before: {:?}", before);

    let update = RainDataUpdate {
        rain_day: Some(0.0),
        ..RainDataUpdate::default()
    };

    match gateway.set_rain_data(update).await {
        Ok(written) => println!("Written: {:?}", written),
        Err(Error::DeviceRejected { operation, status }) => {
            println!("Gateway refused the {} (status {:#04x})", operation, status);
        }
        Err(e) if e.is_timeout() => {
            // The write may still have been applied.
            println!("No acknowledgment before the deadline; re-read to check.");
        }
        Err(e) => return Err(e.into()),
    }

    println!("After: {:?}", gateway.get_rain_data().await?);
    Ok(())
}
