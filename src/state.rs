// MIT License - Copyright (c) 2025 olarm2mqtt contributors

//! Cached device state and the patch-merge that keeps it current.
//!
//! The full device document is fetched once over HTTP; afterwards the Olarm
//! brokers stream partial documents containing only the sections that changed
//! (`deviceState`, `deviceLinks`, `deviceIO`, `deviceFence`). Each incoming
//! section replaces the cached one wholesale; absent sections are untouched.

use std::collections::BTreeMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

bitflags! {
    /// Which sections of the cached device document a patch replaced.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UpdateSections: u8 {
        /// `deviceState` - areas, zones, panel power
        const DEVICE_STATE = 0b0001;
        /// `deviceLinks` - LINK module inputs/outputs/relays
        const DEVICE_LINKS = 0b0010;
        /// `deviceIO` - MAX IO board inputs/outputs
        const DEVICE_IO    = 0b0100;
        /// `deviceFence` - electric-fence zones, gates, power
        const DEVICE_FENCE = 0b1000;
    }
}

/// Live panel state: area arm states, zone activity, mains power.
///
/// Zone entries are single letters: `a` active, `b` bypassed, `c` closed.
/// Area entries are arm-state words (`disarm`, `arm`, `stay`, `sleep`,
/// `alarm`, ...).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceState {
    pub areas: Vec<String>,
    /// Secondary per-area detail words (e.g. which partition triggered)
    #[serde(rename = "areasDetail")]
    pub areas_detail: Vec<String>,
    pub zones: Vec<String>,
    #[serde(rename = "zonesStamp")]
    pub zones_stamp: Vec<Option<u64>>,
    #[serde(rename = "powerAC")]
    pub power_ac: Option<String>,
    #[serde(rename = "powerBat")]
    pub power_bat: Option<String>,
}

/// Live state of one LINK expansion module.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LinkState {
    /// `high` / `low` per input
    pub inputs: Vec<String>,
    /// `closed` / `open` per output
    pub outputs: Vec<String>,
    /// `latched` / `unlatched` per relay
    pub relays: Vec<String>,
}

/// Live state of the MAX IO expansion board.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct IoState {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// Live state of one electric-fence zone.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FenceZone {
    pub name: String,
    /// 0 = energized, 1 = off
    pub off: Option<i64>,
    pub alarm: Option<i64>,
    #[serde(rename = "voltBad")]
    pub volt_bad: Option<i64>,
}

/// Live state of one electric-fence gate.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FenceGate {
    pub name: String,
    #[serde(rename = "alarmOrOpen")]
    pub alarm_or_open: Option<i64>,
}

/// Live state of an electric-fence energizer.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FenceState {
    #[serde(rename = "powerAC")]
    pub power_ac: Option<String>,
    pub zones: Vec<FenceZone>,
    pub gates: Vec<FenceGate>,
}

/// Static panel profile: labels, limits, and which controls are provisioned.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceProfile {
    #[serde(rename = "areasLimit")]
    pub areas_limit: usize,
    #[serde(rename = "areasLabels")]
    pub areas_labels: Vec<String>,
    #[serde(rename = "zonesLimit")]
    pub zones_limit: usize,
    #[serde(rename = "zonesLabels")]
    pub zones_labels: Vec<String>,
    #[serde(rename = "zonesTypes")]
    pub zones_types: Vec<u32>,
    #[serde(rename = "pgmLimit")]
    pub pgm_limit: usize,
    /// Per-PGM control string: char 0 = enabled, char 1 = open/close
    /// supported, char 2 = pulse supported (each `1` or `0`)
    #[serde(rename = "pgmControl")]
    pub pgm_control: Vec<String>,
    #[serde(rename = "pgmLabels")]
    pub pgm_labels: Vec<String>,
    #[serde(rename = "ukeysLimit")]
    pub ukeys_limit: usize,
    /// 1 = utility key provisioned
    #[serde(rename = "ukeysControl")]
    pub ukeys_control: Vec<i64>,
    #[serde(rename = "ukeysLabels")]
    pub ukeys_labels: Vec<String>,
}

/// Profile of one input/output on a LINK module or the MAX IO board.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct IoProfileEntry {
    pub enabled: bool,
    /// `input` or `output`
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    /// `latch` or `pulse` (outputs only)
    #[serde(rename = "outputMode")]
    pub output_mode: Option<String>,
}

/// Profile of one relay on a LINK module.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayProfileEntry {
    pub enabled: bool,
    pub label: String,
    /// `latch` or `pulse`
    #[serde(rename = "relayMode")]
    pub relay_mode: Option<String>,
}

/// Static profile of one LINK expansion module.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LinkProfile {
    pub name: String,
    pub io: Vec<IoProfileEntry>,
    pub relays: Vec<RelayProfileEntry>,
}

/// Static profile of the MAX IO expansion board.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct IoProfile {
    pub io: Vec<IoProfileEntry>,
}

/// The complete cached device document.
// BTreeMap keeps LINK iteration (and thus entity enumeration) in a stable
// order across restarts.
#[derive(Debug, Clone, Default)]
pub struct DeviceData {
    pub device_name: String,
    /// Communicator serial (IMEI); the key in Olarm's MQTT topic scheme
    pub device_serial: String,
    pub state: DeviceState,
    pub links: BTreeMap<String, LinkState>,
    pub io: IoState,
    pub fence: Option<FenceState>,
    pub profile: DeviceProfile,
    pub profile_links: BTreeMap<String, LinkProfile>,
    pub profile_io: IoProfile,
}

fn parse_section<T: serde::de::DeserializeOwned + Default>(doc: &Value, key: &str) -> T {
    match doc.get(key) {
        Some(v) if !v.is_null() => serde_json::from_value(v.clone()).unwrap_or_else(|e| {
            warn!("Malformed {key} section, using defaults: {e}");
            T::default()
        }),
        _ => T::default(),
    }
}

impl DeviceData {
    /// Build the cache from a full device document (`GET /api/v4/devices/{id}`).
    ///
    /// Missing or malformed sections default to empty rather than failing the
    /// whole fetch; a panel without LINK modules simply has no `deviceLinks`.
    pub fn from_device_json(doc: &Value) -> Self {
        let device_name = doc
            .get("deviceName")
            .and_then(Value::as_str)
            .unwrap_or("Olarm Device")
            .to_string();
        let device_serial = doc
            .get("deviceSerial")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let fence = match doc.get("deviceFence") {
            Some(v) if !v.is_null() => serde_json::from_value(v.clone())
                .map_err(|e| warn!("Malformed deviceFence section, ignoring: {e}"))
                .ok(),
            _ => None,
        };

        Self {
            device_name,
            device_serial,
            state: parse_section(doc, "deviceState"),
            links: parse_section(doc, "deviceLinks"),
            io: parse_section(doc, "deviceIO"),
            fence,
            profile: parse_section(doc, "deviceProfile"),
            profile_links: parse_section(doc, "deviceProfileLinks"),
            profile_io: parse_section(doc, "deviceProfileIO"),
        }
    }

    /// Overlay a partial update onto the cache.
    ///
    /// Each section present in the patch replaces the cached section wholesale;
    /// absent sections are left as-is. Returns the sections that were replaced.
    /// A malformed section is skipped without touching the cache.
    pub fn apply_update(&mut self, patch: &Value) -> UpdateSections {
        let mut changed = UpdateSections::empty();

        if let Some(v) = patch.get("deviceState") {
            match serde_json::from_value::<DeviceState>(v.clone()) {
                Ok(state) => {
                    self.state = state;
                    changed |= UpdateSections::DEVICE_STATE;
                }
                Err(e) => warn!("Skipping malformed deviceState patch: {e}"),
            }
        }

        if let Some(v) = patch.get("deviceLinks") {
            match serde_json::from_value::<BTreeMap<String, LinkState>>(v.clone()) {
                Ok(links) => {
                    self.links = links;
                    changed |= UpdateSections::DEVICE_LINKS;
                }
                Err(e) => warn!("Skipping malformed deviceLinks patch: {e}"),
            }
        }

        if let Some(v) = patch.get("deviceIO") {
            match serde_json::from_value::<IoState>(v.clone()) {
                Ok(io) => {
                    self.io = io;
                    changed |= UpdateSections::DEVICE_IO;
                }
                Err(e) => warn!("Skipping malformed deviceIO patch: {e}"),
            }
        }

        if let Some(v) = patch.get("deviceFence") {
            match serde_json::from_value::<FenceState>(v.clone()) {
                Ok(fence) => {
                    self.fence = Some(fence);
                    changed |= UpdateSections::DEVICE_FENCE;
                }
                Err(e) => warn!("Skipping malformed deviceFence patch: {e}"),
            }
        }

        changed
    }

    // --- Panel accessors ---

    /// Arm-state word of an area, if the panel reports one.
    pub fn area_state(&self, index: usize) -> Option<&str> {
        self.state.areas.get(index).map(String::as_str)
    }

    /// Area label from the profile, or `Area N` when unset.
    pub fn area_label(&self, index: usize) -> String {
        match self.profile.areas_labels.get(index) {
            Some(label) if !label.is_empty() => label.clone(),
            _ => format!("Area {}", index + 1),
        }
    }

    /// Whether a zone is active (motion detected / contact open).
    pub fn zone_active(&self, index: usize) -> bool {
        self.state
            .zones
            .get(index)
            .is_some_and(|z| z.eq_ignore_ascii_case("a"))
    }

    /// Whether a zone is bypassed.
    pub fn zone_bypassed(&self, index: usize) -> bool {
        self.state
            .zones
            .get(index)
            .is_some_and(|z| z.eq_ignore_ascii_case("b"))
    }

    /// Zone label from the profile (empty when unset).
    pub fn zone_label(&self, index: usize) -> String {
        self.profile
            .zones_labels
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    /// Numeric zone type from the profile (0 when unset).
    pub fn zone_type(&self, index: usize) -> u32 {
        self.profile.zones_types.get(index).copied().unwrap_or(0)
    }

    /// Epoch-millis timestamp of the last zone state change, if reported.
    pub fn zone_stamp(&self, index: usize) -> Option<u64> {
        self.state.zones_stamp.get(index).copied().flatten()
    }

    /// Whether the panel reports mains power as present.
    pub fn power_ac_ok(&self) -> bool {
        self.state.power_ac.as_deref() == Some("ok")
    }

    /// Whether the panel reports its backup battery as healthy.
    pub fn power_battery_ok(&self) -> bool {
        self.state.power_bat.as_deref() == Some("ok")
    }

    // --- LINK accessors ---

    pub fn link_input_high(&self, link_id: &str, index: usize) -> bool {
        self.links
            .get(link_id)
            .and_then(|l| l.inputs.get(index))
            .is_some_and(|s| s == "high")
    }

    pub fn link_output_closed(&self, link_id: &str, index: usize) -> bool {
        self.links
            .get(link_id)
            .and_then(|l| l.outputs.get(index))
            .is_some_and(|s| s == "closed")
    }

    pub fn link_relay_latched(&self, link_id: &str, index: usize) -> bool {
        self.links
            .get(link_id)
            .and_then(|l| l.relays.get(index))
            .is_some_and(|s| s == "latched")
    }

    // --- MAX IO accessors ---

    pub fn io_input_high(&self, index: usize) -> bool {
        self.io.inputs.get(index).is_some_and(|s| s == "high")
    }

    pub fn io_output_closed(&self, index: usize) -> bool {
        self.io.outputs.get(index).is_some_and(|s| s == "closed")
    }

    // --- Fence accessors ---

    /// Whether the fence energizer reports mains power as present.
    pub fn fence_power_ac_ok(&self) -> bool {
        self.fence
            .as_ref()
            .and_then(|f| f.power_ac.as_deref())
            .is_some_and(|s| s == "ok")
    }

    /// Whether a fence zone is energized (`off == 0`).
    pub fn fence_zone_energized(&self, index: usize) -> bool {
        self.fence
            .as_ref()
            .and_then(|f| f.zones.get(index))
            .is_some_and(|z| z.off == Some(0))
    }

    pub fn fence_zone_alarm(&self, index: usize) -> bool {
        self.fence
            .as_ref()
            .and_then(|f| f.zones.get(index))
            .is_some_and(|z| z.alarm == Some(1))
    }

    pub fn fence_zone_volt_bad(&self, index: usize) -> bool {
        self.fence
            .as_ref()
            .and_then(|f| f.zones.get(index))
            .is_some_and(|z| z.volt_bad == Some(1))
    }

    pub fn fence_gate_alarm_or_open(&self, index: usize) -> bool {
        self.fence
            .as_ref()
            .and_then(|f| f.gates.get(index))
            .is_some_and(|g| g.alarm_or_open == Some(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_device() -> DeviceData {
        DeviceData::from_device_json(&json!({
            "deviceName": "House Alarm",
            "deviceSerial": "860000000000001",
            "deviceState": {
                "areas": ["disarm", "arm"],
                "zones": ["c", "a", "b"],
                "zonesStamp": [null, 1738900000000u64, null],
                "powerAC": "ok"
            },
            "deviceLinks": {
                "li1": {
                    "inputs": ["high", "low"],
                    "outputs": ["closed"],
                    "relays": ["unlatched", "latched"]
                }
            },
            "deviceIO": {
                "inputs": ["low"],
                "outputs": ["open", "closed"]
            },
            "deviceProfile": {
                "areasLimit": 2,
                "areasLabels": ["House", ""],
                "zonesLimit": 3,
                "zonesLabels": ["Front Door", "Passage PIR", "Garage"],
                "zonesTypes": [10, 20, 0]
            }
        }))
    }

    #[test]
    fn test_from_device_json() {
        let data = sample_device();
        assert_eq!(data.device_name, "House Alarm");
        assert_eq!(data.device_serial, "860000000000001");
        assert_eq!(data.state.areas, vec!["disarm", "arm"]);
        assert_eq!(data.links.len(), 1);
        assert!(data.fence.is_none());
    }

    #[test]
    fn test_zone_accessors() {
        let data = sample_device();
        assert!(!data.zone_active(0));
        assert!(data.zone_active(1));
        assert!(data.zone_bypassed(2));
        assert!(!data.zone_bypassed(1));
        // Out of range reads as off, never panics
        assert!(!data.zone_active(99));
        assert_eq!(data.zone_label(0), "Front Door");
        assert_eq!(data.zone_label(99), "");
        assert_eq!(data.zone_type(0), 10);
        assert_eq!(data.zone_stamp(1), Some(1738900000000));
        assert_eq!(data.zone_stamp(0), None);
    }

    #[test]
    fn test_zone_letters_case_insensitive() {
        // The cloud occasionally ships uppercase zone letters
        let mut data = sample_device();
        data.apply_update(&json!({
            "deviceState": { "areas": ["disarm"], "zones": ["A", "B", "C"] }
        }));
        assert!(data.zone_active(0));
        assert!(!data.zone_active(1));
        assert!(data.zone_bypassed(1));
        assert!(!data.zone_bypassed(2));
    }

    #[test]
    fn test_power_accessors() {
        let mut data = sample_device();
        assert!(data.power_ac_ok());
        // sample_device carries no powerBat
        assert!(!data.power_battery_ok());

        data.apply_update(&json!({
            "deviceState": {
                "areas": ["disarm"],
                "zones": [],
                "powerAC": "fail",
                "powerBat": "ok"
            }
        }));
        assert!(!data.power_ac_ok());
        assert!(data.power_battery_ok());
    }

    #[test]
    fn test_area_label_fallback() {
        let data = sample_device();
        assert_eq!(data.area_label(0), "House");
        assert_eq!(data.area_label(1), "Area 2");
        assert_eq!(data.area_label(7), "Area 8");
    }

    #[test]
    fn test_link_and_io_accessors() {
        let data = sample_device();
        assert!(data.link_input_high("li1", 0));
        assert!(!data.link_input_high("li1", 1));
        assert!(data.link_output_closed("li1", 0));
        assert!(data.link_relay_latched("li1", 1));
        assert!(!data.link_input_high("li9", 0));
        assert!(!data.io_input_high(0));
        assert!(data.io_output_closed(1));
    }

    #[test]
    fn test_apply_update_partial() {
        let mut data = sample_device();
        let changed = data.apply_update(&json!({
            "deviceState": {
                "areas": ["stay", "arm"],
                "zones": ["a", "c", "b"],
                "powerAC": "fail"
            }
        }));

        assert_eq!(changed, UpdateSections::DEVICE_STATE);
        assert_eq!(data.area_state(0), Some("stay"));
        assert!(data.zone_active(0));
        assert!(!data.power_ac_ok());
        // Untouched sections survive
        assert!(data.link_input_high("li1", 0));
        assert_eq!(data.zone_label(0), "Front Door");
    }

    #[test]
    fn test_apply_update_multiple_sections() {
        let mut data = sample_device();
        let changed = data.apply_update(&json!({
            "deviceLinks": {
                "li1": { "inputs": ["low", "low"], "outputs": ["open"], "relays": [] }
            },
            "deviceIO": { "inputs": ["high"], "outputs": [] }
        }));

        assert_eq!(
            changed,
            UpdateSections::DEVICE_LINKS | UpdateSections::DEVICE_IO
        );
        assert!(!data.link_input_high("li1", 0));
        assert!(data.io_input_high(0));
    }

    #[test]
    fn test_apply_update_no_known_sections() {
        let mut data = sample_device();
        let changed = data.apply_update(&json!({ "wifiStatus": { "rssi": -60 } }));
        assert!(changed.is_empty());
        assert_eq!(data.area_state(0), Some("disarm"));
    }

    #[test]
    fn test_apply_update_malformed_section_skipped() {
        let mut data = sample_device();
        let changed = data.apply_update(&json!({
            "deviceState": "not an object",
            "deviceIO": { "inputs": ["high"] }
        }));

        // The malformed section leaves the cache untouched
        assert_eq!(changed, UpdateSections::DEVICE_IO);
        assert_eq!(data.area_state(0), Some("disarm"));
        assert!(data.io_input_high(0));
    }

    #[test]
    fn test_fence_accessors() {
        let mut data = sample_device();
        let changed = data.apply_update(&json!({
            "deviceFence": {
                "powerAC": "ok",
                "zones": [
                    { "name": "Perimeter", "off": 0, "alarm": 0, "voltBad": 0 },
                    { "name": "Back Wall", "off": 1, "alarm": 1, "voltBad": 1 }
                ],
                "gates": [
                    { "name": "Main Gate", "alarmOrOpen": 1 }
                ]
            }
        }));

        assert_eq!(changed, UpdateSections::DEVICE_FENCE);
        assert!(data.fence_power_ac_ok());
        assert!(data.fence_zone_energized(0));
        assert!(!data.fence_zone_energized(1));
        assert!(data.fence_zone_alarm(1));
        assert!(data.fence_zone_volt_bad(1));
        assert!(data.fence_gate_alarm_or_open(0));
        assert!(!data.fence_gate_alarm_or_open(5));
    }

    #[test]
    fn test_missing_profile_defaults() {
        let data = DeviceData::from_device_json(&json!({}));
        assert_eq!(data.device_name, "Olarm Device");
        assert!(data.state.areas.is_empty());
        assert!(!data.power_ac_ok());
    }
}
