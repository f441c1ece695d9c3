// MIT License - Copyright (c) 2025 olarm2mqtt contributors

//! Alarm control panels: one per area on the alarm system. Each area can be
//! armed in different modes (away, home, night) and disarmed.

use crate::api::ActionCmd;
use crate::state::DeviceData;

/// Home Assistant alarm panel states (the MQTT state strings).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmState {
    Disarmed,
    Arming,
    /// Transient state published right after a command for UI feedback;
    /// corrected by the next vendor update.
    Pending,
    ArmedHome,
    ArmedAway,
    ArmedNight,
    Triggered,
}

impl AlarmState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disarmed => "disarmed",
            Self::Arming => "arming",
            Self::Pending => "pending",
            Self::ArmedHome => "armed_home",
            Self::ArmedAway => "armed_away",
            Self::ArmedNight => "armed_night",
            Self::Triggered => "triggered",
        }
    }
}

/// Map an Olarm area state word to the hub alarm state.
///
/// Unknown words (and `notready`) read as disarmed.
pub fn map_area_state(vendor: &str) -> AlarmState {
    match vendor {
        "disarm" | "notready" => AlarmState::Disarmed,
        "countdown" => AlarmState::Arming,
        "stay" => AlarmState::ArmedHome,
        "arm" => AlarmState::ArmedAway,
        "sleep" => AlarmState::ArmedNight,
        "alarm" | "emergency" | "fire" | "medical" => AlarmState::Triggered,
        _ => AlarmState::Disarmed,
    }
}

/// An arm/disarm command received from the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmCommand {
    ArmAway,
    ArmHome,
    ArmNight,
    Disarm,
}

impl ArmCommand {
    /// Parse a Home Assistant alarm panel command payload.
    pub fn parse(payload: &str) -> Option<Self> {
        match payload {
            "ARM_AWAY" => Some(Self::ArmAway),
            "ARM_HOME" => Some(Self::ArmHome),
            "ARM_NIGHT" => Some(Self::ArmNight),
            "DISARM" => Some(Self::Disarm),
            _ => None,
        }
    }

    /// The Olarm action this command translates to.
    pub fn action(&self) -> ActionCmd {
        match self {
            Self::ArmAway => ActionCmd::AreaArm,
            Self::ArmHome => ActionCmd::AreaStay,
            Self::ArmNight => ActionCmd::AreaSleep,
            Self::Disarm => ActionCmd::AreaDisarm,
        }
    }
}

/// One alarm control panel entity.
#[derive(Debug, Clone)]
pub struct AreaPanel {
    pub index: usize,
    pub label: String,
}

impl AreaPanel {
    pub fn unique_id(&self, device_id: &str) -> String {
        format!("{device_id}.area.{}", self.index)
    }

    pub fn name(&self) -> String {
        format!("Area {:02} - {}", self.index + 1, self.label)
    }

    /// Current hub state of this area.
    pub fn state(&self, data: &DeviceData) -> AlarmState {
        data.area_state(self.index)
            .map(map_area_state)
            .unwrap_or(AlarmState::Disarmed)
    }

    /// Topic this panel's state is published on.
    pub fn state_topic(&self, device_id: &str) -> String {
        format!("olarm/{device_id}/area/{}/state", self.index)
    }

    /// Topic the hub publishes arm/disarm commands on.
    pub fn command_topic(&self, device_id: &str) -> String {
        format!("olarm/{device_id}/area/{}/set", self.index)
    }
}

/// Build one panel per area the device reports.
pub fn load_area_panels(data: &DeviceData) -> Vec<AreaPanel> {
    (0..data.state.areas.len())
        .map(|index| AreaPanel {
            index,
            label: data.area_label(index),
        })
        .collect()
}
