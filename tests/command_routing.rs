// End-to-end routing: every command topic the bridge advertises in discovery
// must parse back into the command the daemon dispatches on.

use serde_json::json;

use olarm2mqtt::entity::{load_area_panels, load_buttons};
use olarm2mqtt::hass::{parse_command, Command};
use olarm2mqtt::{ArmCommand, DeviceData};

fn sample_device() -> DeviceData {
    DeviceData::from_device_json(&json!({
        "deviceName": "House Alarm",
        "deviceState": {
            "areas": ["disarm", "stay"],
            "zones": ["c", "a"]
        },
        "deviceProfile": {
            "areasLabels": ["House", "Cottage"],
            "zonesLabels": ["Front Door", "Garage PIR"],
            "pgmControl": ["110", "101"],
            "pgmLabels": ["Gate Motor", "Garden Lights"],
            "ukeysControl": [1, 1],
            "ukeysLabels": ["Panic", "Bell Test"]
        },
        "deviceProfileLinks": {
            "li1": {
                "name": "Pump House",
                "io": [
                    { "enabled": true, "type": "output", "label": "Pump", "outputMode": "latch" },
                    { "enabled": true, "type": "output", "label": "Bell", "outputMode": "pulse" }
                ],
                "relays": [
                    { "enabled": true, "label": "Gate Lock", "relayMode": "latch" }
                ]
            }
        },
        "deviceProfileIO": {
            "io": [
                { "enabled": true, "type": "output", "label": "Geyser", "outputMode": "pulse" }
            ]
        }
    }))
}

#[test]
fn every_button_topic_routes_back_to_its_button() {
    let data = sample_device();
    let buttons = load_buttons(&data, true);
    assert!(!buttons.is_empty());

    for button in &buttons {
        let topic = button.command_topic("dev-1");
        let command = parse_command("dev-1", &topic, "PRESS")
            .unwrap_or_else(|| panic!("Topic {topic} did not parse"));
        match command {
            Command::Button { kind, index, link_id } => {
                assert_eq!(kind, button.kind, "kind mismatch for {topic}");
                assert_eq!(index, button.index, "index mismatch for {topic}");
                assert_eq!(link_id, button.link_id, "link mismatch for {topic}");
            }
            other => panic!("Topic {topic} parsed as {other:?}"),
        }
    }
}

#[test]
fn every_area_topic_routes_back_to_its_area() {
    let data = sample_device();
    let panels = load_area_panels(&data);
    assert_eq!(panels.len(), 2);

    for panel in &panels {
        let topic = panel.command_topic("dev-1");
        for (payload, expected) in [
            ("ARM_AWAY", ArmCommand::ArmAway),
            ("ARM_HOME", ArmCommand::ArmHome),
            ("ARM_NIGHT", ArmCommand::ArmNight),
            ("DISARM", ArmCommand::Disarm),
        ] {
            let command = parse_command("dev-1", &topic, payload)
                .unwrap_or_else(|| panic!("Topic {topic} did not parse {payload}"));
            assert_eq!(
                command,
                Command::Area {
                    index: panel.index,
                    arm: expected
                }
            );
        }
    }
}

#[test]
fn foreign_topics_are_ignored() {
    assert!(parse_command("dev-1", "olarm/dev-2/area/0/set", "DISARM").is_none());
    assert!(parse_command("dev-1", "zigbee2mqtt/kitchen/set", "ON").is_none());
    assert!(parse_command("dev-1", "olarm/dev-1/availability", "online").is_none());
}
