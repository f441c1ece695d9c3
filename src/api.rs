// MIT License - Copyright (c) 2025 olarm2mqtt contributors

//! Async client for the Olarm REST API.
//!
//! Two calls only: fetch the full device document, and post an action command.
//! Everything else (state streaming) happens over MQTT.

use std::fmt;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use crate::config::OlarmConfig;
use crate::error::{OlarmError, Result};

/// Action commands accepted by `POST /api/v4/devices/{id}/actions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionCmd {
    AreaArm,
    AreaStay,
    AreaSleep,
    AreaDisarm,
    ZoneBypass,
    ZoneUnbypass,
    PgmOpen,
    PgmClose,
    PgmPulse,
    UkeyActivate,
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

impl ActionCmd {
    /// The wire string for the `actionCmd` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AreaArm => "area-arm",
            Self::AreaStay => "area-stay",
            Self::AreaSleep => "area-sleep",
            Self::AreaDisarm => "area-disarm",
            Self::ZoneBypass => "zone-bypass",
            Self::ZoneUnbypass => "zone-unbypass",
            Self::PgmOpen => "pgm-open",
            Self::PgmClose => "pgm-close",
            Self::PgmPulse => "pgm-pulse",
            Self::UkeyActivate => "ukey-activate",
            Self::LinkOutputOpen => "link-output-open",
            Self::LinkOutputClose => "link-output-close",
            Self::LinkOutputPulse => "link-output-pulse",
            Self::LinkRelayLatch => "link-relay-latch",
            Self::LinkRelayUnlatch => "link-relay-unlatch",
            Self::LinkRelayPulse => "link-relay-pulse",
            Self::MaxOutputOpen => "max-output-open",
            Self::MaxOutputClose => "max-output-close",
            Self::MaxOutputPulse => "max-output-pulse",
        }
    }

    /// Whether this action targets a LINK module and must carry a `linkId`.
    pub fn is_link_action(&self) -> bool {
        matches!(
            self,
            Self::LinkOutputOpen
                | Self::LinkOutputClose
                | Self::LinkOutputPulse
                | Self::LinkRelayLatch
                | Self::LinkRelayUnlatch
                | Self::LinkRelayPulse
        )
    }
}

impl fmt::Display for ActionCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the JSON body for an action request.
///
/// The library indexes devices from 0 (matching the entity tables); the wire
/// protocol numbers them from 1.
pub fn action_body(cmd: ActionCmd, index: usize, link_id: Option<&str>) -> Value {
    let mut body = json!({
        "actionCmd": cmd.as_str(),
        "actionNum": index + 1,
    });
    if let Some(link_id) = link_id {
        body["linkId"] = Value::String(link_id.to_string());
    }
    body
}

/// HTTP client for the Olarm REST API.
#[derive(Debug, Clone)]
pub struct OlarmApi {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl OlarmApi {
    pub fn new(config: &OlarmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    /// Fetch the full device document.
    pub async fn get_device(&self, device_id: &str) -> Result<Value> {
        let url = format!("{}/api/v4/devices/{device_id}", self.base_url);
        debug!("GET {url}");
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Post an action command against a device.
    pub async fn send_action(
        &self,
        device_id: &str,
        cmd: ActionCmd,
        index: usize,
        link_id: Option<&str>,
    ) -> Result<()> {
        let url = format!("{}/api/v4/devices/{device_id}/actions", self.base_url);
        let body = action_body(cmd, index, link_id);
        debug!("POST {url}: {body}");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(OlarmError::Auth {
                status: status.as_u16(),
            });
        }
        let body = response.text().await.unwrap_or_default();
        Err(OlarmError::Api {
            status: status.as_u16(),
            body,
        })
    }
}
