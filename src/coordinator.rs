// MIT License - Copyright (c) 2025 olarm2mqtt contributors

//! The coordinator: one HTTP fetch on setup, then MQTT patches merged into
//! the cached device document, with affected-section events broadcast to
//! subscribers.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::api::{ActionCmd, OlarmApi};
use crate::error::{OlarmError, Result};
use crate::event::{event_channel, DeviceEvent, EventReceiver, EventSender};
use crate::state::{DeviceData, UpdateSections};

pub struct OlarmCoordinator {
    api: OlarmApi,
    device_id: String,
    data: Arc<RwLock<DeviceData>>,
    event_tx: EventSender,
}

impl OlarmCoordinator {
    pub fn new(api: OlarmApi, device_id: impl Into<String>) -> Self {
        let (event_tx, _event_rx) = event_channel(256);
        Self {
            api,
            device_id: device_id.into(),
            data: Arc::new(RwLock::new(DeviceData::default())),
            event_tx,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Subscribe to coordinator events.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    /// Get a snapshot of the cached device document.
    pub async fn data(&self) -> DeviceData {
        self.data.read().await.clone()
    }

    /// Fetch the full device document from the Olarm HTTP API.
    ///
    /// This runs once on setup (and after SIGHUP reloads); ongoing updates
    /// arrive over MQTT.
    pub async fn refresh(&self) -> Result<()> {
        let doc = self.api.get_device(&self.device_id).await?;
        let data = DeviceData::from_device_json(&doc);
        info!(
            "Fetched device {:?}: {} areas, {} zones, {} LINK modules{}",
            data.device_name,
            data.state.areas.len(),
            data.state.zones.len(),
            data.links.len(),
            if data.fence.is_some() { ", fence" } else { "" }
        );
        *self.data.write().await = data;
        let _ = self.event_tx.send(DeviceEvent::Refreshed);
        Ok(())
    }

    /// Like [`refresh`](Self::refresh), but keeps retrying retryable errors
    /// (timeouts, 5xx, 429) with a fixed delay between attempts. Gives up
    /// immediately on anything else, such as a bad token.
    pub async fn refresh_with_retry(&self, delay: Duration, max_attempts: usize) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.refresh().await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    warn!("Device fetch failed (attempt {attempt}): {err}, retrying in {delay:?}");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Merge a partial update received over MQTT into the cache.
    ///
    /// Broadcasts `StateUpdated` when any section was replaced. Payloads with
    /// no recognized section (wifi status, heartbeats) are ignored.
    pub async fn apply_mqtt_payload(&self, payload: &Value) -> UpdateSections {
        let sections = self.data.write().await.apply_update(payload);
        if sections.is_empty() {
            debug!("MQTT payload carried no state sections");
        } else {
            debug!("MQTT update replaced sections: {sections:?}");
            let _ = self.event_tx.send(DeviceEvent::StateUpdated { sections });
        }
        sections
    }

    /// Note that the vendor MQTT stream (re)connected.
    pub fn mark_connected(&self) {
        let _ = self.event_tx.send(DeviceEvent::Connected);
    }

    /// Note that the vendor MQTT stream dropped.
    pub fn mark_disconnected(&self) {
        let _ = self.event_tx.send(DeviceEvent::Disconnected);
    }

    fn check_index(&self, kind: &'static str, index: usize, max: usize) -> Result<()> {
        if index >= max {
            return Err(OlarmError::InvalidIndex { kind, index, max });
        }
        Ok(())
    }

    async fn send(&self, cmd: ActionCmd, index: usize, link_id: Option<&str>) -> Result<()> {
        debug!("Sending action {cmd} #{index} (link: {link_id:?})");
        if let Some(link_id) = link_id {
            let data = self.data.read().await;
            if !data.profile_links.is_empty() && !data.profile_links.contains_key(link_id) {
                return Err(OlarmError::UnknownLink(link_id.to_string()));
            }
        }
        self.api
            .send_action(&self.device_id, cmd, index, link_id)
            .await
    }

    // --- Area commands ---

    pub async fn send_area_arm(&self, area: usize) -> Result<()> {
        let max = self.data.read().await.state.areas.len();
        self.check_index("area", area, max)?;
        self.send(ActionCmd::AreaArm, area, None).await
    }

    pub async fn send_area_stay(&self, area: usize) -> Result<()> {
        let max = self.data.read().await.state.areas.len();
        self.check_index("area", area, max)?;
        self.send(ActionCmd::AreaStay, area, None).await
    }

    pub async fn send_area_sleep(&self, area: usize) -> Result<()> {
        let max = self.data.read().await.state.areas.len();
        self.check_index("area", area, max)?;
        self.send(ActionCmd::AreaSleep, area, None).await
    }

    pub async fn send_area_disarm(&self, area: usize) -> Result<()> {
        let max = self.data.read().await.state.areas.len();
        self.check_index("area", area, max)?;
        self.send(ActionCmd::AreaDisarm, area, None).await
    }

    // --- Zone commands ---

    pub async fn send_zone_bypass(&self, zone: usize) -> Result<()> {
        let max = self.data.read().await.state.zones.len();
        self.check_index("zone", zone, max)?;
        self.send(ActionCmd::ZoneBypass, zone, None).await
    }

    pub async fn send_zone_unbypass(&self, zone: usize) -> Result<()> {
        let max = self.data.read().await.state.zones.len();
        self.check_index("zone", zone, max)?;
        self.send(ActionCmd::ZoneUnbypass, zone, None).await
    }

    // --- PGM / utility key commands ---

    pub async fn send_pgm_open(&self, pgm: usize) -> Result<()> {
        self.send(ActionCmd::PgmOpen, pgm, None).await
    }

    pub async fn send_pgm_close(&self, pgm: usize) -> Result<()> {
        self.send(ActionCmd::PgmClose, pgm, None).await
    }

    pub async fn send_pgm_pulse(&self, pgm: usize) -> Result<()> {
        self.send(ActionCmd::PgmPulse, pgm, None).await
    }

    pub async fn send_ukey_activate(&self, ukey: usize) -> Result<()> {
        self.send(ActionCmd::UkeyActivate, ukey, None).await
    }

    // --- LINK commands ---

    pub async fn send_link_output_open(&self, link_id: &str, output: usize) -> Result<()> {
        self.send(ActionCmd::LinkOutputOpen, output, Some(link_id)).await
    }

    pub async fn send_link_output_close(&self, link_id: &str, output: usize) -> Result<()> {
        self.send(ActionCmd::LinkOutputClose, output, Some(link_id)).await
    }

    pub async fn send_link_output_pulse(&self, link_id: &str, output: usize) -> Result<()> {
        self.send(ActionCmd::LinkOutputPulse, output, Some(link_id)).await
    }

    pub async fn send_link_relay_latch(&self, link_id: &str, relay: usize) -> Result<()> {
        self.send(ActionCmd::LinkRelayLatch, relay, Some(link_id)).await
    }

    pub async fn send_link_relay_unlatch(&self, link_id: &str, relay: usize) -> Result<()> {
        self.send(ActionCmd::LinkRelayUnlatch, relay, Some(link_id)).await
    }

    pub async fn send_link_relay_pulse(&self, link_id: &str, relay: usize) -> Result<()> {
        self.send(ActionCmd::LinkRelayPulse, relay, Some(link_id)).await
    }

    // --- MAX IO commands ---

    pub async fn send_max_output_open(&self, output: usize) -> Result<()> {
        self.send(ActionCmd::MaxOutputOpen, output, None).await
    }

    pub async fn send_max_output_close(&self, output: usize) -> Result<()> {
        self.send(ActionCmd::MaxOutputClose, output, None).await
    }

    pub async fn send_max_output_pulse(&self, output: usize) -> Result<()> {
        self.send(ActionCmd::MaxOutputPulse, output, None).await
    }

    /// Dispatch a button press to the matching action sender.
    pub async fn press_button(
        &self,
        kind: crate::entity::button::ButtonKind,
        index: usize,
        link_id: Option<&str>,
    ) -> Result<()> {
        let cmd = kind.action();
        if cmd.is_link_action() {
            let link_id = link_id.ok_or_else(|| OlarmError::UnknownLink("(missing)".to_string()))?;
            self.send(cmd, index, Some(link_id)).await
        } else {
            self.send(cmd, index, None).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OlarmConfig;
    use serde_json::json;

    fn test_coordinator() -> OlarmCoordinator {
        let config = OlarmConfig::builder()
            .access_token("test")
            .device_id("dev-1")
            .build();
        let api = OlarmApi::new(&config).expect("client");
        OlarmCoordinator::new(api, "dev-1")
    }

    #[tokio::test]
    async fn test_apply_payload_broadcasts() {
        let coordinator = test_coordinator();
        let mut rx = coordinator.subscribe();

        let sections = coordinator
            .apply_mqtt_payload(&json!({
                "deviceState": { "areas": ["arm"], "zones": ["c"] }
            }))
            .await;
        assert_eq!(sections, UpdateSections::DEVICE_STATE);

        match rx.try_recv() {
            Ok(DeviceEvent::StateUpdated { sections }) => {
                assert_eq!(sections, UpdateSections::DEVICE_STATE);
            }
            other => panic!("expected StateUpdated, got {other:?}"),
        }

        let data = coordinator.data().await;
        assert_eq!(data.area_state(0), Some("arm"));
    }

    #[tokio::test]
    async fn test_unrecognized_payload_is_silent() {
        let coordinator = test_coordinator();
        let mut rx = coordinator.subscribe();

        let sections = coordinator
            .apply_mqtt_payload(&json!({ "wifiStatus": { "rssi": -55 } }))
            .await;
        assert!(sections.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_area_index_validated() {
        let coordinator = test_coordinator();
        coordinator
            .apply_mqtt_payload(&json!({
                "deviceState": { "areas": ["disarm"], "zones": [] }
            }))
            .await;

        // No HTTP call is made for an out-of-range area
        let err = coordinator.send_area_arm(5).await.unwrap_err();
        match err {
            OlarmError::InvalidIndex { kind, index, max } => {
                assert_eq!(kind, "area");
                assert_eq!(index, 5);
                assert_eq!(max, 1);
            }
            other => panic!("expected InvalidIndex, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_retries_transport_errors() {
        // Nothing listens on port 9, so every attempt fails with a
        // connection error, which classifies as retryable.
        let config = OlarmConfig::builder()
            .access_token("test")
            .device_id("dev-1")
            .api_base_url("http://127.0.0.1:9")
            .request_timeout_ms(250)
            .build();
        let api = OlarmApi::new(&config).expect("client");
        let coordinator = OlarmCoordinator::new(api, "dev-1");

        let started = std::time::Instant::now();
        let err = coordinator
            .refresh_with_retry(Duration::from_millis(20), 3)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        // Three attempts means two sleeps between them
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_connection_events() {
        let coordinator = test_coordinator();
        let mut rx = coordinator.subscribe();

        coordinator.mark_connected();
        coordinator.mark_disconnected();

        assert!(matches!(rx.try_recv(), Ok(DeviceEvent::Connected)));
        assert!(matches!(rx.try_recv(), Ok(DeviceEvent::Disconnected)));
    }
}
