// MIT License - Copyright (c) 2025 olarm2mqtt contributors

use crate::state::UpdateSections;

/// Events emitted by the coordinator.
///
/// Users subscribe via `coordinator.subscribe()` to receive a
/// `tokio::sync::broadcast::Receiver<DeviceEvent>`.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// Connected to the Olarm MQTT broker for this device
    Connected,
    /// Connection to the Olarm MQTT broker lost
    Disconnected,
    /// Initial device document fetched, cached state fully populated
    Refreshed,
    /// One or more state sections were replaced by an incoming patch
    StateUpdated { sections: UpdateSections },
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<DeviceEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<DeviceEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
