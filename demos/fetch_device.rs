// MIT License - Copyright (c) 2025 olarm2mqtt contributors

//! Example: Fetch an Olarm device document and print its entities.

use olarm2mqtt::entity::{load_area_panels, load_binary_sensors, load_buttons};
use olarm2mqtt::{OlarmApi, OlarmConfig, OlarmCoordinator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = OlarmConfig::builder()
        .access_token(std::env::var("OLARM_ACCESS_TOKEN")?)
        .device_id(std::env::var("OLARM_DEVICE_ID")?)
        .build();

    let api = OlarmApi::new(&config)?;
    let coordinator = OlarmCoordinator::new(api, &config.device_id);

    println!("Fetching device document...");
    coordinator.refresh().await?;
    let data = coordinator.data().await;

    println!("\n{} (serial {})", data.device_name, data.device_serial);

    let panels = load_area_panels(&data);
    println!("\n--- Areas ({}) ---", panels.len());
    for panel in &panels {
        println!("  {:30} state={:?}", panel.name(), panel.state(&data));
    }

    let sensors = load_binary_sensors(&data);
    println!("\n--- Binary sensors ({}) ---", sensors.len());
    for sensor in &sensors {
        println!(
            "  {:45} on={} class={:?}",
            sensor.name(),
            sensor.is_on(&data),
            sensor.device_class,
        );
    }

    let buttons = load_buttons(&data, config.zone_bypass_buttons);
    println!("\n--- Buttons ({}) ---", buttons.len());
    for button in &buttons {
        println!("  {:45} -> {}", button.name(), button.command_topic(&config.device_id));
    }

    Ok(())
}
