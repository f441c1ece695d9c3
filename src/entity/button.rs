// MIT License - Copyright (c) 2025 olarm2mqtt contributors

//! Buttons: PGM outputs, utility keys, zone bypass, LINK outputs/relays, and
//! MAX IO outputs.
//!
//! Latch-mode outputs get an open and a close button; pulse-mode outputs get
//! a single pulse button. Only provisioned controls are exposed, per the
//! device profile.

use crate::api::ActionCmd;
use crate::state::DeviceData;

/// The kinds of button this bridge exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    ZoneBypass,
    ZoneUnbypass,
    PgmOpen,
    PgmClose,
    PgmPulse,
    Ukey,
    LinkOutputOpen,
    LinkOutputClose,
    LinkOutputPulse,
    LinkRelayLatch,
    LinkRelayUnlatch,
    LinkRelayPulse,
    MaxOutputOpen,
    MaxOutputClose,
    MaxOutputPulse,
}

impl ButtonKind {
    /// Stable key used in unique ids and command topics.
    pub fn key(&self) -> &'static str {
        match self {
            Self::ZoneBypass => "zone_bypass",
            Self::ZoneUnbypass => "zone_unbypass",
            Self::PgmOpen => "pgm_open",
            Self::PgmClose => "pgm_close",
            Self::PgmPulse => "pgm_pulse",
            Self::Ukey => "ukey",
            Self::LinkOutputOpen => "link_output_open",
            Self::LinkOutputClose => "link_output_close",
            Self::LinkOutputPulse => "link_output_pulse",
            Self::LinkRelayLatch => "link_relay_latch",
            Self::LinkRelayUnlatch => "link_relay_unlatch",
            Self::LinkRelayPulse => "link_relay_pulse",
            Self::MaxOutputOpen => "max_output_open",
            Self::MaxOutputClose => "max_output_close",
            Self::MaxOutputPulse => "max_output_pulse",
        }
    }

    /// Parse a key back from a command topic segment.
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "zone_bypass" => Self::ZoneBypass,
            "zone_unbypass" => Self::ZoneUnbypass,
            "pgm_open" => Self::PgmOpen,
            "pgm_close" => Self::PgmClose,
            "pgm_pulse" => Self::PgmPulse,
            "ukey" => Self::Ukey,
            "link_output_open" => Self::LinkOutputOpen,
            "link_output_close" => Self::LinkOutputClose,
            "link_output_pulse" => Self::LinkOutputPulse,
            "link_relay_latch" => Self::LinkRelayLatch,
            "link_relay_unlatch" => Self::LinkRelayUnlatch,
            "link_relay_pulse" => Self::LinkRelayPulse,
            "max_output_open" => Self::MaxOutputOpen,
            "max_output_close" => Self::MaxOutputClose,
            "max_output_pulse" => Self::MaxOutputPulse,
            _ => return None,
        })
    }

    /// The Olarm action a press of this button sends.
    pub fn action(&self) -> ActionCmd {
        match self {
            Self::ZoneBypass => ActionCmd::ZoneBypass,
            Self::ZoneUnbypass => ActionCmd::ZoneUnbypass,
            Self::PgmOpen => ActionCmd::PgmOpen,
            Self::PgmClose => ActionCmd::PgmClose,
            Self::PgmPulse => ActionCmd::PgmPulse,
            Self::Ukey => ActionCmd::UkeyActivate,
            Self::LinkOutputOpen => ActionCmd::LinkOutputOpen,
            Self::LinkOutputClose => ActionCmd::LinkOutputClose,
            Self::LinkOutputPulse => ActionCmd::LinkOutputPulse,
            Self::LinkRelayLatch => ActionCmd::LinkRelayLatch,
            Self::LinkRelayUnlatch => ActionCmd::LinkRelayUnlatch,
            Self::LinkRelayPulse => ActionCmd::LinkRelayPulse,
            Self::MaxOutputOpen => ActionCmd::MaxOutputOpen,
            Self::MaxOutputClose => ActionCmd::MaxOutputClose,
            Self::MaxOutputPulse => ActionCmd::MaxOutputPulse,
        }
    }
}

/// One button entity.
#[derive(Debug, Clone)]
pub struct Button {
    pub kind: ButtonKind,
    pub index: usize,
    pub label: String,
    pub link_id: Option<String>,
    pub link_name: Option<String>,
}

impl Button {
    pub fn unique_id(&self, device_id: &str) -> String {
        match &self.link_id {
            Some(link_id) => {
                format!("{device_id}_{link_id}.{}.{}", self.kind.key(), self.index)
            }
            None => format!("{device_id}.{}.{}", self.kind.key(), self.index),
        }
    }

    pub fn name(&self) -> String {
        let n = self.index + 1;
        let label = &self.label;
        match self.kind {
            ButtonKind::ZoneBypass => format!("Bypass Zone {n:03} - {label}"),
            ButtonKind::ZoneUnbypass => format!("Unbypass Zone {n:03} - {label}"),
            ButtonKind::PgmOpen => format!("PGM {n:02} Open - {label}"),
            ButtonKind::PgmClose => format!("PGM {n:02} Close - {label}"),
            ButtonKind::PgmPulse => format!("PGM {n:02} Pulse - {label}"),
            ButtonKind::Ukey => format!("Utility Key {n:02} - {label}"),
            ButtonKind::LinkOutputOpen => {
                format!("{} Output {n:02} Open - {label}", self.link_name_str())
            }
            ButtonKind::LinkOutputClose => {
                format!("{} Output {n:02} Close - {label}", self.link_name_str())
            }
            ButtonKind::LinkOutputPulse => {
                format!("{} Output {n:02} Pulse - {label}", self.link_name_str())
            }
            ButtonKind::LinkRelayLatch => {
                format!("{} Relay {n:02} Latch - {label}", self.link_name_str())
            }
            ButtonKind::LinkRelayUnlatch => {
                format!("{} Relay {n:02} Unlatch - {label}", self.link_name_str())
            }
            ButtonKind::LinkRelayPulse => {
                format!("{} Relay {n:02} Pulse - {label}", self.link_name_str())
            }
            ButtonKind::MaxOutputOpen => format!("MAX Output {n:02} Open - {label}"),
            ButtonKind::MaxOutputClose => format!("MAX Output {n:02} Close - {label}"),
            ButtonKind::MaxOutputPulse => format!("MAX Output {n:02} Pulse - {label}"),
        }
    }

    /// Topic the hub publishes `PRESS` on for this button.
    pub fn command_topic(&self, device_id: &str) -> String {
        match &self.link_id {
            Some(link_id) => format!(
                "olarm/{device_id}/cmd/{}/{link_id}/{}",
                self.kind.key(),
                self.index
            ),
            None => format!("olarm/{device_id}/cmd/{}/{}", self.kind.key(), self.index),
        }
    }

    fn link_name_str(&self) -> &str {
        self.link_name.as_deref().unwrap_or("Unnamed Link")
    }
}

fn simple(kind: ButtonKind, index: usize, label: String) -> Button {
    Button {
        kind,
        index,
        label,
        link_id: None,
        link_name: None,
    }
}

/// Whether a `pgmControl` string has flag `pos` set.
fn pgm_flag(control: &str, pos: usize) -> bool {
    control.chars().nth(pos) == Some('1')
}

/// Build the full button list from the cached device document.
///
/// `zone_bypass_buttons` gates the per-zone bypass/unbypass buttons, which
/// most installations leave off (two buttons per zone is a lot of clutter on
/// a 64-zone panel).
pub fn load_buttons(data: &DeviceData, zone_bypass_buttons: bool) -> Vec<Button> {
    let mut buttons = Vec::new();
    if zone_bypass_buttons {
        load_zone_buttons(data, &mut buttons);
    }
    load_pgm_buttons(data, &mut buttons);
    load_ukey_buttons(data, &mut buttons);
    load_link_buttons(data, &mut buttons);
    load_max_buttons(data, &mut buttons);
    buttons
}

fn load_zone_buttons(data: &DeviceData, buttons: &mut Vec<Button>) {
    for index in 0..data.state.zones.len() {
        let label = data.zone_label(index);
        buttons.push(simple(ButtonKind::ZoneBypass, index, label.clone()));
        buttons.push(simple(ButtonKind::ZoneUnbypass, index, label));
    }
}

/// PGM buttons per the `pgmControl` flags: flag 0 = provisioned, flag 1 =
/// open/close supported, flag 2 = pulse supported.
fn load_pgm_buttons(data: &DeviceData, buttons: &mut Vec<Button>) {
    for (index, control) in data.profile.pgm_control.iter().enumerate() {
        if !pgm_flag(control, 0) {
            continue;
        }
        let label = data
            .profile
            .pgm_labels
            .get(index)
            .filter(|l| !l.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("PGM {}", index + 1));
        if pgm_flag(control, 1) {
            buttons.push(simple(ButtonKind::PgmOpen, index, label.clone()));
            buttons.push(simple(ButtonKind::PgmClose, index, label.clone()));
        }
        if pgm_flag(control, 2) {
            buttons.push(simple(ButtonKind::PgmPulse, index, label));
        }
    }
}

fn load_ukey_buttons(data: &DeviceData, buttons: &mut Vec<Button>) {
    for (index, control) in data.profile.ukeys_control.iter().enumerate() {
        if *control != 1 {
            continue;
        }
        let label = data
            .profile
            .ukeys_labels
            .get(index)
            .filter(|l| !l.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("Utility Key {}", index + 1));
        buttons.push(simple(ButtonKind::Ukey, index, label));
    }
}

fn load_link_buttons(data: &DeviceData, buttons: &mut Vec<Button>) {
    for (link_id, link) in &data.profile_links {
        let push = |buttons: &mut Vec<Button>, kind, index, label: &str| {
            buttons.push(Button {
                kind,
                index,
                label: label.to_string(),
                link_id: Some(link_id.clone()),
                link_name: Some(link.name.clone()),
            });
        };

        for (index, io) in link.io.iter().enumerate() {
            if !io.enabled || io.kind != "output" {
                continue;
            }
            match io.output_mode.as_deref() {
                Some("latch") => {
                    push(buttons, ButtonKind::LinkOutputOpen, index, &io.label);
                    push(buttons, ButtonKind::LinkOutputClose, index, &io.label);
                }
                Some("pulse") => push(buttons, ButtonKind::LinkOutputPulse, index, &io.label),
                _ => {}
            }
        }

        for (index, relay) in link.relays.iter().enumerate() {
            if !relay.enabled {
                continue;
            }
            match relay.relay_mode.as_deref() {
                Some("latch") => {
                    push(buttons, ButtonKind::LinkRelayLatch, index, &relay.label);
                    push(buttons, ButtonKind::LinkRelayUnlatch, index, &relay.label);
                }
                Some("pulse") => push(buttons, ButtonKind::LinkRelayPulse, index, &relay.label),
                _ => {}
            }
        }
    }
}

fn load_max_buttons(data: &DeviceData, buttons: &mut Vec<Button>) {
    for (index, io) in data.profile_io.io.iter().enumerate() {
        if !io.enabled || io.kind != "output" {
            continue;
        }
        match io.output_mode.as_deref() {
            Some("latch") => {
                buttons.push(simple(ButtonKind::MaxOutputOpen, index, io.label.clone()));
                buttons.push(simple(ButtonKind::MaxOutputClose, index, io.label.clone()));
            }
            Some("pulse") => {
                buttons.push(simple(ButtonKind::MaxOutputPulse, index, io.label.clone()));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DeviceData;
    use serde_json::json;

    fn sample() -> DeviceData {
        DeviceData::from_device_json(&json!({
            "deviceState": { "areas": ["disarm"], "zones": ["c", "a"] },
            "deviceProfile": {
                "zonesLabels": ["Front Door", "Garage PIR"],
                "pgmLimit": 4,
                "pgmControl": ["110", "101", "011", ""],
                "pgmLabels": ["Gate Motor", "Garden Lights", "Disabled PGM", ""],
                "ukeysLimit": 2,
                "ukeysControl": [1, 0],
                "ukeysLabels": ["Panic", "Unused"]
            },
            "deviceProfileLinks": {
                "li1": {
                    "name": "Pump House",
                    "io": [
                        { "enabled": true, "type": "output", "label": "Pump", "outputMode": "latch" },
                        { "enabled": true, "type": "output", "label": "Bell", "outputMode": "pulse" },
                        { "enabled": true, "type": "input", "label": "Float Switch" },
                        { "enabled": false, "type": "output", "label": "Spare", "outputMode": "latch" }
                    ],
                    "relays": [
                        { "enabled": true, "label": "Gate Lock", "relayMode": "latch" },
                        { "enabled": true, "label": "Strike", "relayMode": "pulse" }
                    ]
                }
            },
            "deviceProfileIO": {
                "io": [
                    { "enabled": true, "type": "output", "label": "Geyser", "outputMode": "latch" },
                    { "enabled": true, "type": "output", "label": "Sprinkler", "outputMode": "pulse" },
                    { "enabled": true, "type": "input", "label": "Borehole" }
                ]
            }
        }))
    }

    #[test]
    fn test_pgm_buttons_follow_control_flags() {
        let buttons = load_buttons(&sample(), false);

        let pgm: Vec<_> = buttons
            .iter()
            .filter(|b| {
                matches!(
                    b.kind,
                    ButtonKind::PgmOpen | ButtonKind::PgmClose | ButtonKind::PgmPulse
                )
            })
            .collect();
        // "110" -> open+close, "101" -> pulse, "011" -> not provisioned
        assert_eq!(pgm.len(), 3);
        assert_eq!(pgm[0].kind, ButtonKind::PgmOpen);
        assert_eq!(pgm[0].name(), "PGM 01 Open - Gate Motor");
        assert_eq!(pgm[1].kind, ButtonKind::PgmClose);
        assert_eq!(pgm[2].kind, ButtonKind::PgmPulse);
        assert_eq!(pgm[2].name(), "PGM 02 Pulse - Garden Lights");
    }

    #[test]
    fn test_ukey_buttons() {
        let buttons = load_buttons(&sample(), false);
        let ukeys: Vec<_> = buttons
            .iter()
            .filter(|b| b.kind == ButtonKind::Ukey)
            .collect();
        assert_eq!(ukeys.len(), 1);
        assert_eq!(ukeys[0].name(), "Utility Key 01 - Panic");
        assert_eq!(ukeys[0].unique_id("dev"), "dev.ukey.0");
    }

    #[test]
    fn test_zone_bypass_buttons_gated() {
        let data = sample();
        let without = load_buttons(&data, false);
        assert!(!without.iter().any(|b| b.kind == ButtonKind::ZoneBypass));

        let with = load_buttons(&data, true);
        let bypass: Vec<_> = with
            .iter()
            .filter(|b| {
                matches!(b.kind, ButtonKind::ZoneBypass | ButtonKind::ZoneUnbypass)
            })
            .collect();
        assert_eq!(bypass.len(), 4);
        assert_eq!(bypass[0].name(), "Bypass Zone 001 - Front Door");
        assert_eq!(bypass[1].name(), "Unbypass Zone 001 - Front Door");
    }

    #[test]
    fn test_link_buttons_split_by_mode() {
        let buttons = load_buttons(&sample(), false);

        let outputs: Vec<_> = buttons
            .iter()
            .filter(|b| {
                matches!(
                    b.kind,
                    ButtonKind::LinkOutputOpen
                        | ButtonKind::LinkOutputClose
                        | ButtonKind::LinkOutputPulse
                )
            })
            .collect();
        // Latch "Pump" -> open+close, pulse "Bell" -> pulse; input and
        // disabled entries skipped
        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[0].name(), "Pump House Output 01 Open - Pump");
        assert_eq!(outputs[2].name(), "Pump House Output 02 Pulse - Bell");
        assert_eq!(outputs[0].unique_id("dev"), "dev_li1.link_output_open.0");
        assert_eq!(
            outputs[0].command_topic("dev"),
            "olarm/dev/cmd/link_output_open/li1/0"
        );

        let relays: Vec<_> = buttons
            .iter()
            .filter(|b| {
                matches!(
                    b.kind,
                    ButtonKind::LinkRelayLatch
                        | ButtonKind::LinkRelayUnlatch
                        | ButtonKind::LinkRelayPulse
                )
            })
            .collect();
        assert_eq!(relays.len(), 3);
        assert_eq!(relays[0].name(), "Pump House Relay 01 Latch - Gate Lock");
        assert_eq!(relays[2].kind, ButtonKind::LinkRelayPulse);
    }

    #[test]
    fn test_max_buttons() {
        let buttons = load_buttons(&sample(), false);
        let max: Vec<_> = buttons
            .iter()
            .filter(|b| {
                matches!(
                    b.kind,
                    ButtonKind::MaxOutputOpen
                        | ButtonKind::MaxOutputClose
                        | ButtonKind::MaxOutputPulse
                )
            })
            .collect();
        assert_eq!(max.len(), 3);
        assert_eq!(max[0].name(), "MAX Output 01 Open - Geyser");
        assert_eq!(max[0].command_topic("dev"), "olarm/dev/cmd/max_output_open/0");
        assert_eq!(max[2].name(), "MAX Output 02 Pulse - Sprinkler");
    }

    #[test]
    fn test_key_round_trip() {
        for kind in [
            ButtonKind::ZoneBypass,
            ButtonKind::PgmPulse,
            ButtonKind::Ukey,
            ButtonKind::LinkRelayUnlatch,
            ButtonKind::MaxOutputClose,
        ] {
            assert_eq!(ButtonKind::from_key(kind.key()), Some(kind));
        }
        assert_eq!(ButtonKind::from_key("bogus"), None);
    }
}
