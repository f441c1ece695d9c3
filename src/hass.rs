// MIT License - Copyright (c) 2025 olarm2mqtt contributors

//! Home Assistant MQTT discovery payloads and command-topic parsing.
//!
//! Discovery configs are published retained under `homeassistant/...` so
//! entities survive a Home Assistant restart; state and command topics live
//! under `olarm/{device_id}/...`.

use serde::Serialize;

use crate::entity::alarm::ArmCommand;
use crate::entity::binary_sensor::BinarySensor;
use crate::entity::button::{Button, ButtonKind};
use crate::entity::AreaPanel;

pub const PAYLOAD_ONLINE: &str = "online";
pub const PAYLOAD_OFFLINE: &str = "offline";
pub const PAYLOAD_ON: &str = "ON";
pub const PAYLOAD_OFF: &str = "OFF";
pub const PAYLOAD_PRESS: &str = "PRESS";

/// Replace anything outside `[a-zA-Z0-9_-]` so a unique id is safe to use as
/// a topic segment.
pub fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Retained discovery config topic for one entity.
pub fn discovery_topic(component: &str, unique_id: &str) -> String {
    format!("homeassistant/{component}/{}/config", sanitize_id(unique_id))
}

/// Availability topic, also used as the MQTT last-will topic.
pub fn availability_topic(device_id: &str) -> String {
    format!("olarm/{device_id}/availability")
}

/// The hub device every entity hangs off.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: &'static str,
}

impl DeviceInfo {
    pub fn new(device_id: &str, device_name: &str) -> Self {
        Self {
            identifiers: vec![format!("olarm_{device_id}")],
            name: device_name.to_string(),
            manufacturer: "Olarm",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Availability {
    pub topic: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlarmControlPanelConfig {
    pub name: String,
    pub unique_id: String,
    pub state_topic: String,
    pub command_topic: String,
    pub payload_arm_away: &'static str,
    pub payload_arm_home: &'static str,
    pub payload_arm_night: &'static str,
    pub payload_disarm: &'static str,
    pub code_arm_required: bool,
    pub code_disarm_required: bool,
    pub supported_features: Vec<&'static str>,
    pub availability: Vec<Availability>,
    pub device: DeviceInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct BinarySensorConfig {
    pub name: String,
    pub unique_id: String,
    pub state_topic: String,
    pub payload_on: &'static str,
    pub payload_off: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_attributes_topic: Option<String>,
    pub availability: Vec<Availability>,
    pub device: DeviceInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct ButtonConfig {
    pub name: String,
    pub unique_id: String,
    pub command_topic: String,
    pub payload_press: &'static str,
    pub availability: Vec<Availability>,
    pub device: DeviceInfo,
}

fn availability(device_id: &str) -> Vec<Availability> {
    vec![Availability {
        topic: availability_topic(device_id),
    }]
}

/// Discovery config for one area's alarm panel.
pub fn alarm_config(device_id: &str, device_name: &str, panel: &AreaPanel) -> AlarmControlPanelConfig {
    AlarmControlPanelConfig {
        name: panel.name(),
        unique_id: panel.unique_id(device_id),
        state_topic: panel.state_topic(device_id),
        command_topic: panel.command_topic(device_id),
        payload_arm_away: "ARM_AWAY",
        payload_arm_home: "ARM_HOME",
        payload_arm_night: "ARM_NIGHT",
        payload_disarm: "DISARM",
        code_arm_required: false,
        code_disarm_required: false,
        supported_features: vec!["arm_away", "arm_home", "arm_night"],
        availability: availability(device_id),
        device: DeviceInfo::new(device_id, device_name),
    }
}

/// Discovery config for one binary sensor.
pub fn binary_sensor_config(
    device_id: &str,
    device_name: &str,
    sensor: &BinarySensor,
) -> BinarySensorConfig {
    BinarySensorConfig {
        name: sensor.name(),
        unique_id: sensor.unique_id(device_id),
        state_topic: sensor.state_topic(device_id),
        payload_on: PAYLOAD_ON,
        payload_off: PAYLOAD_OFF,
        device_class: sensor.device_class,
        json_attributes_topic: sensor.attributes_topic(device_id),
        availability: availability(device_id),
        device: DeviceInfo::new(device_id, device_name),
    }
}

/// Discovery config for one button.
pub fn button_config(device_id: &str, device_name: &str, button: &Button) -> ButtonConfig {
    ButtonConfig {
        name: button.name(),
        unique_id: button.unique_id(device_id),
        command_topic: button.command_topic(device_id),
        payload_press: PAYLOAD_PRESS,
        availability: availability(device_id),
        device: DeviceInfo::new(device_id, device_name),
    }
}

/// A command received from Home Assistant over MQTT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Arm/disarm an area (`olarm/{id}/area/{n}/set`)
    Area { index: usize, arm: ArmCommand },
    /// Press a button (`olarm/{id}/cmd/{key}/[{link_id}/]{index}`)
    Button {
        kind: ButtonKind,
        index: usize,
        link_id: Option<String>,
    },
}

/// Parse an inbound hub message into a command.
///
/// Returns `None` for topics outside this device's command space and for
/// unknown payloads; both are normal (retained stragglers, other bridges on
/// the same broker) and not worth more than a debug log at the call site.
pub fn parse_command(device_id: &str, topic: &str, payload: &str) -> Option<Command> {
    let parts: Vec<&str> = topic.split('/').collect();
    if parts.first() != Some(&"olarm") || parts.get(1) != Some(&device_id) {
        return None;
    }

    match parts.get(2) {
        Some(&"area") if parts.len() == 5 && parts[4] == "set" => {
            let index = parts[3].parse().ok()?;
            let arm = ArmCommand::parse(payload)?;
            Some(Command::Area { index, arm })
        }
        Some(&"cmd") if payload == PAYLOAD_PRESS => {
            let kind = ButtonKind::from_key(parts.get(3)?)?;
            match parts.len() {
                5 => Some(Command::Button {
                    kind,
                    index: parts[4].parse().ok()?,
                    link_id: None,
                }),
                6 => Some(Command::Button {
                    kind,
                    index: parts[5].parse().ok()?,
                    link_id: Some(parts[4].to_string()),
                }),
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::binary_sensor::SensorKind;
    use crate::entity::button::ButtonKind;

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("dev.area.0"), "dev_area_0");
        assert_eq!(sanitize_id("dev_li1.link_output_open.2"), "dev_li1_link_output_open_2");
        assert_eq!(sanitize_id("abc-123_X"), "abc-123_X");
    }

    #[test]
    fn test_discovery_topic() {
        assert_eq!(
            discovery_topic("alarm_control_panel", "dev.area.0"),
            "homeassistant/alarm_control_panel/dev_area_0/config"
        );
    }

    #[test]
    fn test_alarm_config_payloads() {
        let panel = AreaPanel {
            index: 0,
            label: "House".to_string(),
        };
        let config = alarm_config("dev", "House Alarm", &panel);
        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["name"], "Area 01 - House");
        assert_eq!(json["state_topic"], "olarm/dev/area/0/state");
        assert_eq!(json["command_topic"], "olarm/dev/area/0/set");
        assert_eq!(json["payload_arm_night"], "ARM_NIGHT");
        assert_eq!(json["code_arm_required"], false);
        assert_eq!(json["availability"][0]["topic"], "olarm/dev/availability");
        assert_eq!(json["device"]["manufacturer"], "Olarm");
        assert_eq!(json["device"]["identifiers"][0], "olarm_dev");
    }

    #[test]
    fn test_binary_sensor_config_omits_empty_class() {
        let sensor = BinarySensor {
            kind: SensorKind::MaxInput,
            index: 0,
            label: "Borehole".to_string(),
            link_id: None,
            link_name: None,
            device_class: None,
        };
        let json = serde_json::to_value(binary_sensor_config("dev", "House", &sensor)).unwrap();
        assert!(json.get("device_class").is_none());
        assert_eq!(json["payload_on"], "ON");

        let sensor = BinarySensor {
            device_class: Some("door"),
            kind: SensorKind::Zone,
            ..sensor
        };
        let json = serde_json::to_value(binary_sensor_config("dev", "House", &sensor)).unwrap();
        assert_eq!(json["device_class"], "door");
    }

    #[test]
    fn test_parse_area_command() {
        assert_eq!(
            parse_command("dev", "olarm/dev/area/2/set", "ARM_AWAY"),
            Some(Command::Area {
                index: 2,
                arm: ArmCommand::ArmAway
            })
        );
        assert_eq!(parse_command("dev", "olarm/dev/area/2/set", "EXPLODE"), None);
        assert_eq!(parse_command("dev", "olarm/other/area/2/set", "DISARM"), None);
        assert_eq!(parse_command("dev", "olarm/dev/area/x/set", "DISARM"), None);
    }

    #[test]
    fn test_parse_button_command() {
        assert_eq!(
            parse_command("dev", "olarm/dev/cmd/pgm_pulse/3", "PRESS"),
            Some(Command::Button {
                kind: ButtonKind::PgmPulse,
                index: 3,
                link_id: None,
            })
        );
        assert_eq!(
            parse_command("dev", "olarm/dev/cmd/link_relay_latch/li1/0", "PRESS"),
            Some(Command::Button {
                kind: ButtonKind::LinkRelayLatch,
                index: 0,
                link_id: Some("li1".to_string()),
            })
        );
        // Wrong payload or unknown key is ignored
        assert_eq!(parse_command("dev", "olarm/dev/cmd/pgm_pulse/3", "push"), None);
        assert_eq!(parse_command("dev", "olarm/dev/cmd/bogus/3", "PRESS"), None);
    }
}
