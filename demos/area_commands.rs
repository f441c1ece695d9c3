// MIT License - Copyright (c) 2025 olarm2mqtt contributors

//! Example: Arm and disarm the first area.

use tokio::time::{sleep, Duration};

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
    coordinator.refresh().await?;

    let data = coordinator.data().await;
    println!("Area 1 is currently: {:?}", data.area_state(0));

    println!("Arming area 1 in stay mode...");
    coordinator.send_area_stay(0).await?;

    // The cloud takes a moment to push the new state
    sleep(Duration::from_secs(10)).await;

    println!("Disarming area 1...");
    coordinator.send_area_disarm(0).await?;

    Ok(())
}
