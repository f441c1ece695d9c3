// MIT License - Copyright (c) 2025 olarm2mqtt contributors
//
//! # olarm2mqtt
//!
//! Bridge between the Olarm cloud alarm service and Home Assistant.
//!
//! An Olarm communicator attaches to an alarm panel (areas, zones, PGMs,
//! utility keys, LINK expansion modules, MAX IO boards, or an electric-fence
//! energizer) and mirrors its state into the Olarm cloud. This library fetches
//! the device document once over HTTPS, then keeps it current by merging the
//! partial JSON patches streamed over Olarm's MQTT brokers, and exposes the
//! result as Home Assistant entities (alarm control panels, binary sensors,
//! buttons) via MQTT discovery. Entity actions are translated back into Olarm
//! HTTP action calls.
//!
//! ## Quick Start
//!
//! ```no_run
//! use olarm2mqtt::{OlarmApi, OlarmConfig, OlarmCoordinator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = OlarmConfig::builder()
//!         .access_token("eyJ...")
//!         .device_id("6c8e4ee2-1234-5678-9abc-def012345678")
//!         .build();
//!
//!     let api = OlarmApi::new(&config)?;
//!     let coordinator = OlarmCoordinator::new(api, &config.device_id);
//!     coordinator.refresh().await?;
//!
//!     let mut events = coordinator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     coordinator.send_area_arm(0).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod event;
pub mod hass;
pub mod state;

// Re-exports for convenience
pub use api::{ActionCmd, OlarmApi};
pub use config::{OlarmConfig, OlarmConfigBuilder};
pub use coordinator::OlarmCoordinator;
pub use entity::alarm::{AlarmState, AreaPanel, ArmCommand};
pub use entity::binary_sensor::{BinarySensor, SensorKind};
pub use entity::button::{Button, ButtonKind};
pub use error::{OlarmError, Result};
pub use event::{DeviceEvent, EventReceiver, EventSender};
pub use state::{DeviceData, UpdateSections};
