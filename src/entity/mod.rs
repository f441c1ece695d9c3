// MIT License - Copyright (c) 2025 olarm2mqtt contributors

//! Entity descriptor tables: declarative mappings from the device profile to
//! the Home Assistant entities this bridge exposes.

pub mod alarm;
pub mod binary_sensor;
pub mod button;

pub use alarm::{load_area_panels, AlarmState, AreaPanel, ArmCommand};
pub use binary_sensor::{load_binary_sensors, BinarySensor, SensorKind};
pub use button::{load_buttons, Button, ButtonKind};
