//! Gateway LAN discovery example.
//!
//! Demonstrates discovering weather-station gateways on the local network
//! by listening for their UDP broadcasts. Once a gateway is found, connects
//! to it and prints its firmware version and MAC address.
//!
//! Gateways broadcast their presence to UDP port 59387 every few seconds.
//! This example listens for the default five-second window, then queries
//! every gateway it heard.
//!
//! # Requirements
//!
//! - A GW1000/GW1100/GW2000 (or compatible) gateway on the same LAN
//! - UDP port 59387 accessible (not blocked by firewall)
//!
//! # Usage
//!
//! ```sh
//! cargo run -p gwlib --example discover
//! ```

use gwlib::ecowitt::{DEFAULT_DISCOVERY_WINDOW, EcowittGateway, GatewayBuilder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!(
        "Searching for gateways on the LAN ({} seconds)...\n",
        DEFAULT_DISCOVERY_WINDOW.as_secs()
    );

    let gateways = EcowittGateway::discover(DEFAULT_DISCOVERY_WINDOW).await?;

    if gateways.is_empty() {
        println!("No gateways found on the network.");
        println!("\nTroubleshooting:");
        println!("  - Verify the gateway is powered on and connected to the LAN");
        println!("  - Check that UDP port 59387 is not blocked by a firewall");
        println!("  - Ensure your computer is on the same subnet as the gateway");
        return Ok(());
    }

    println!("Found {} gateway(s):\n", gateways.len());

    for (i, ip) in gateways.iter().enumerate() {
        let gateway = GatewayBuilder::new().host(&ip.to_string()).build()?;
        println!("  [{}] {}", i + 1, ip);
        match gateway.get_firmware_version().await {
            Ok(firmware) => println!("      Firmware: {}", firmware),
            Err(e) => println!("      Firmware: unavailable ({})", e),
        }
        match gateway.get_mac_address().await {
            Ok(mac) => println!("      MAC: {}", mac),
            Err(e) => println!("      MAC: unavailable ({})", e),
        }
        println!();
    }

    Ok(())
}
