// MIT License - Copyright (c) 2025 olarm2mqtt contributors

//! Binary sensors: alarm zones (plus their bypass state), mains power, LINK
//! module IO, MAX IO board IO, and electric-fence zones/gates.
//!
//! A panel can have up to 192 zones, usually door/window contacts and motion
//! sensors. LINK and MAX outputs/relays only get a sensor in latch mode;
//! pulse-mode outputs have no meaningful steady state.

use serde_json::{json, Value};

use crate::state::DeviceData;

/// The kinds of binary sensor this bridge exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    /// Zone active (`a`)
    Zone,
    /// Zone bypassed (`b`)
    ZoneBypass,
    /// Panel mains power present
    AcPower,
    /// Fence energizer mains power present
    AcPowerFence,
    /// Panel backup battery low (on = unhealthy, per the hub's battery class)
    BatteryLow,
    /// LINK input high
    LinkInput,
    /// LINK latch-mode output closed
    LinkOutput,
    /// LINK latch-mode relay latched
    LinkRelay,
    /// MAX IO input high
    MaxInput,
    /// MAX IO latch-mode output closed
    MaxOutput,
    /// Fence zone energized (`off == 0`)
    FenceZoneEnergized,
    /// Fence zone in alarm
    FenceZoneAlarm,
    /// Fence zone voltage out of range
    FenceZoneVoltBad,
    /// Fence gate in alarm or open
    FenceGateAlarmOpen,
}

impl SensorKind {
    /// Stable key used in unique ids and topics.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Zone => "zone",
            Self::ZoneBypass => "zone_bypass",
            Self::AcPower => "ac_power",
            Self::AcPowerFence => "ac_power_fence",
            Self::BatteryLow => "battery",
            Self::LinkInput => "link_input",
            Self::LinkOutput => "link_output",
            Self::LinkRelay => "link_relay",
            Self::MaxInput => "max_input",
            Self::MaxOutput => "max_output",
            Self::FenceZoneEnergized => "fence_zone_off",
            Self::FenceZoneAlarm => "fence_zone_alarm",
            Self::FenceZoneVoltBad => "fence_zone_voltbad",
            Self::FenceGateAlarmOpen => "fence_gate_alarmopen",
        }
    }
}

/// Hub device class for a numeric zone type from the profile.
pub fn zone_device_class(zone_type: u32) -> Option<&'static str> {
    match zone_type {
        10 => Some("door"),
        11 => Some("window"),
        20 | 21 => Some("motion"),
        _ => None,
    }
}

/// One binary sensor entity.
#[derive(Debug, Clone)]
pub struct BinarySensor {
    pub kind: SensorKind,
    pub index: usize,
    pub label: String,
    pub link_id: Option<String>,
    pub link_name: Option<String>,
    pub device_class: Option<&'static str>,
}

impl BinarySensor {
    pub fn unique_id(&self, device_id: &str) -> String {
        match self.kind {
            SensorKind::Zone => format!("{device_id}.zone.{}", self.index),
            SensorKind::ZoneBypass => format!("{device_id}.zone.bypass.{}", self.index),
            SensorKind::AcPower => format!("{device_id}.ac_power"),
            SensorKind::AcPowerFence => format!("{device_id}.ac_power_fence"),
            SensorKind::BatteryLow => format!("{device_id}.battery"),
            SensorKind::LinkInput => {
                format!("{device_id}_{}.link.input.{}", self.link_id_str(), self.index)
            }
            SensorKind::LinkOutput => {
                format!("{device_id}_{}.link.output.{}", self.link_id_str(), self.index)
            }
            SensorKind::LinkRelay => {
                format!("{device_id}_{}.link.relay.{}", self.link_id_str(), self.index)
            }
            SensorKind::MaxInput => format!("{device_id}.max.input.{}", self.index),
            SensorKind::MaxOutput => format!("{device_id}.max.output.{}", self.index),
            SensorKind::FenceZoneEnergized => {
                format!("{device_id}.fence_zone.off.{}", self.index)
            }
            SensorKind::FenceZoneAlarm => {
                format!("{device_id}.fence_zone.alarm.{}", self.index)
            }
            SensorKind::FenceZoneVoltBad => {
                format!("{device_id}.fence_zone.voltbad.{}", self.index)
            }
            SensorKind::FenceGateAlarmOpen => {
                format!("{device_id}.fence_gate.alarmopen.{}", self.index)
            }
        }
    }

    pub fn name(&self) -> String {
        let n = self.index + 1;
        let label = &self.label;
        match self.kind {
            SensorKind::Zone => format!("Zone {n:03} - {label}"),
            SensorKind::ZoneBypass => format!("Zone {n:03} Bypass - {label}"),
            SensorKind::AcPower | SensorKind::AcPowerFence | SensorKind::BatteryLow => {
                label.clone()
            }
            SensorKind::LinkInput => {
                format!("{} Input {n:02} - {label}", self.link_name_str())
            }
            SensorKind::LinkOutput => {
                format!("{} Output {n:02} - {label}", self.link_name_str())
            }
            SensorKind::LinkRelay => {
                format!("{} Relay {n:02} - {label}", self.link_name_str())
            }
            SensorKind::MaxInput => format!("MAX Input {n:02} - {label}"),
            SensorKind::MaxOutput => format!("MAX Output {n:02} - {label}"),
            SensorKind::FenceZoneEnergized => format!("Fence Zone {n:02} Energized - {label}"),
            SensorKind::FenceZoneAlarm => format!("Fence Zone {n:02} Alarm - {label}"),
            SensorKind::FenceZoneVoltBad => format!("Fence Zone {n:02} Voltage Bad - {label}"),
            SensorKind::FenceGateAlarmOpen => {
                format!("Fence Gate {n:02} Alarm Or Open - {label}")
            }
        }
    }

    /// Current on/off state of this sensor.
    pub fn is_on(&self, data: &DeviceData) -> bool {
        match self.kind {
            SensorKind::Zone => data.zone_active(self.index),
            SensorKind::ZoneBypass => data.zone_bypassed(self.index),
            SensorKind::AcPower => data.power_ac_ok(),
            SensorKind::AcPowerFence => data.fence_power_ac_ok(),
            SensorKind::BatteryLow => !data.power_battery_ok(),
            SensorKind::LinkInput => data.link_input_high(self.link_id_str(), self.index),
            SensorKind::LinkOutput => data.link_output_closed(self.link_id_str(), self.index),
            SensorKind::LinkRelay => data.link_relay_latched(self.link_id_str(), self.index),
            SensorKind::MaxInput => data.io_input_high(self.index),
            SensorKind::MaxOutput => data.io_output_closed(self.index),
            SensorKind::FenceZoneEnergized => data.fence_zone_energized(self.index),
            SensorKind::FenceZoneAlarm => data.fence_zone_alarm(self.index),
            SensorKind::FenceZoneVoltBad => data.fence_zone_volt_bad(self.index),
            SensorKind::FenceGateAlarmOpen => data.fence_gate_alarm_or_open(self.index),
        }
    }

    /// Topic this sensor's `ON`/`OFF` state is published on.
    pub fn state_topic(&self, device_id: &str) -> String {
        match self.kind {
            SensorKind::Zone => format!("olarm/{device_id}/zone/{}/state", self.index),
            SensorKind::ZoneBypass => {
                format!("olarm/{device_id}/zone/{}/bypass/state", self.index)
            }
            SensorKind::AcPower => format!("olarm/{device_id}/ac_power/state"),
            SensorKind::AcPowerFence => format!("olarm/{device_id}/fence/ac_power/state"),
            SensorKind::BatteryLow => format!("olarm/{device_id}/battery/state"),
            SensorKind::LinkInput => format!(
                "olarm/{device_id}/link/{}/input/{}/state",
                self.link_id_str(),
                self.index
            ),
            SensorKind::LinkOutput => format!(
                "olarm/{device_id}/link/{}/output/{}/state",
                self.link_id_str(),
                self.index
            ),
            SensorKind::LinkRelay => format!(
                "olarm/{device_id}/link/{}/relay/{}/state",
                self.link_id_str(),
                self.index
            ),
            SensorKind::MaxInput => format!("olarm/{device_id}/max/input/{}/state", self.index),
            SensorKind::MaxOutput => {
                format!("olarm/{device_id}/max/output/{}/state", self.index)
            }
            SensorKind::FenceZoneEnergized => {
                format!("olarm/{device_id}/fence/zone/{}/energized/state", self.index)
            }
            SensorKind::FenceZoneAlarm => {
                format!("olarm/{device_id}/fence/zone/{}/alarm/state", self.index)
            }
            SensorKind::FenceZoneVoltBad => {
                format!("olarm/{device_id}/fence/zone/{}/voltbad/state", self.index)
            }
            SensorKind::FenceGateAlarmOpen => {
                format!("olarm/{device_id}/fence/gate/{}/state", self.index)
            }
        }
    }

    /// Attributes topic, for sensor kinds that publish extra attributes.
    pub fn attributes_topic(&self, device_id: &str) -> Option<String> {
        match self.kind {
            SensorKind::Zone => Some(format!(
                "olarm/{device_id}/zone/{}/attributes",
                self.index
            )),
            _ => None,
        }
    }

    /// Extra attributes payload. Zones report when they last changed.
    pub fn attributes(&self, data: &DeviceData) -> Option<Value> {
        match self.kind {
            SensorKind::Zone => {
                let last_changed = data
                    .zone_stamp(self.index)
                    .and_then(|ms| chrono::DateTime::from_timestamp_millis(ms as i64))
                    .map(|dt| dt.to_rfc3339());
                Some(json!({ "last_changed": last_changed }))
            }
            _ => None,
        }
    }

    fn link_id_str(&self) -> &str {
        self.link_id.as_deref().unwrap_or_default()
    }

    fn link_name_str(&self) -> &str {
        self.link_name.as_deref().unwrap_or("Unnamed Link")
    }
}

fn simple(kind: SensorKind, index: usize, label: String, device_class: Option<&'static str>) -> BinarySensor {
    BinarySensor {
        kind,
        index,
        label,
        link_id: None,
        link_name: None,
        device_class,
    }
}

/// Build the full binary sensor list from the cached device document.
pub fn load_binary_sensors(data: &DeviceData) -> Vec<BinarySensor> {
    let mut sensors = Vec::new();
    load_zone_sensors(data, &mut sensors);
    load_ac_power_sensor(data, &mut sensors);
    load_link_sensors(data, &mut sensors);
    load_max_sensors(data, &mut sensors);
    load_fence_sensors(data, &mut sensors);
    sensors
}

/// Zone sensors and their bypass companions.
fn load_zone_sensors(data: &DeviceData, sensors: &mut Vec<BinarySensor>) {
    for index in 0..data.state.zones.len() {
        let label = data.zone_label(index);
        let class = zone_device_class(data.zone_type(index));
        sensors.push(simple(SensorKind::Zone, index, label.clone(), class));
        sensors.push(simple(SensorKind::ZoneBypass, index, label, None));
    }
}

/// One mains power sensor (from the panel when it reports one, else from the
/// fence energizer) plus a backup-battery sensor when reported.
fn load_ac_power_sensor(data: &DeviceData, sensors: &mut Vec<BinarySensor>) {
    if data.state.power_ac.is_some() {
        sensors.push(simple(SensorKind::AcPower, 0, "AC Power".to_string(), None));
    } else if data
        .fence
        .as_ref()
        .is_some_and(|f| f.power_ac.is_some())
    {
        sensors.push(simple(
            SensorKind::AcPowerFence,
            0,
            "AC Power".to_string(),
            None,
        ));
    }

    if data.state.power_bat.is_some() {
        sensors.push(simple(
            SensorKind::BatteryLow,
            0,
            "Battery".to_string(),
            Some("battery"),
        ));
    }
}

/// LINK inputs, latch-mode outputs, and latch-mode relays, enabled only.
fn load_link_sensors(data: &DeviceData, sensors: &mut Vec<BinarySensor>) {
    for (link_id, link) in &data.profile_links {
        for (index, io) in link.io.iter().enumerate() {
            if !io.enabled {
                continue;
            }
            let kind = if io.kind == "input" {
                SensorKind::LinkInput
            } else if io.kind == "output" && io.output_mode.as_deref() == Some("latch") {
                SensorKind::LinkOutput
            } else {
                continue;
            };
            sensors.push(BinarySensor {
                kind,
                index,
                label: io.label.clone(),
                link_id: Some(link_id.clone()),
                link_name: Some(link.name.clone()),
                device_class: None,
            });
        }

        for (index, relay) in link.relays.iter().enumerate() {
            if relay.enabled && relay.relay_mode.as_deref() == Some("latch") {
                sensors.push(BinarySensor {
                    kind: SensorKind::LinkRelay,
                    index,
                    label: relay.label.clone(),
                    link_id: Some(link_id.clone()),
                    link_name: Some(link.name.clone()),
                    device_class: None,
                });
            }
        }
    }
}

/// MAX IO inputs and latch-mode outputs, enabled only.
fn load_max_sensors(data: &DeviceData, sensors: &mut Vec<BinarySensor>) {
    for (index, io) in data.profile_io.io.iter().enumerate() {
        if !io.enabled {
            continue;
        }
        if io.kind == "input" {
            sensors.push(simple(SensorKind::MaxInput, index, io.label.clone(), None));
        } else if io.kind == "output" && io.output_mode.as_deref() == Some("latch") {
            sensors.push(simple(SensorKind::MaxOutput, index, io.label.clone(), None));
        }
    }
}

/// Fence zone (energized / alarm / voltage) and gate sensors.
fn load_fence_sensors(data: &DeviceData, sensors: &mut Vec<BinarySensor>) {
    let Some(fence) = &data.fence else {
        return;
    };

    for (index, zone) in fence.zones.iter().enumerate() {
        sensors.push(simple(
            SensorKind::FenceZoneEnergized,
            index,
            zone.name.clone(),
            None,
        ));
        sensors.push(simple(
            SensorKind::FenceZoneAlarm,
            index,
            zone.name.clone(),
            None,
        ));
        sensors.push(simple(
            SensorKind::FenceZoneVoltBad,
            index,
            zone.name.clone(),
            None,
        ));
    }

    for (index, gate) in fence.gates.iter().enumerate() {
        sensors.push(simple(
            SensorKind::FenceGateAlarmOpen,
            index,
            gate.name.clone(),
            None,
        ));
    }
}
