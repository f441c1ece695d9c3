// MIT License - Copyright (c) 2025 olarm2mqtt contributors

/// Configuration for talking to the Olarm cloud (HTTP API + MQTT brokers).
///
/// The access token is obtained out of band (Olarm portal API key or an OAuth2
/// access token managed by an external helper); this library never refreshes
/// it.
#[derive(Debug, Clone)]
pub struct OlarmConfig {
    /// Base URL of the Olarm REST API
    pub api_base_url: String,
    /// Bearer token for the REST API, also the MQTT broker password
    pub access_token: String,
    /// Olarm device id (UUID from the portal)
    pub device_id: String,
    /// Olarm MQTT broker hostname (websocket endpoint)
    pub broker_host: String,
    /// Olarm MQTT broker port
    pub broker_port: u16,
    /// Username for the Olarm MQTT broker
    pub broker_username: String,
    /// Interval between status-refresh requests published to the device
    pub status_interval_secs: u64,
    /// Base reconnection delay in milliseconds
    pub reconnect_delay_ms: u64,
    /// HTTP request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Whether to expose zone bypass/unbypass buttons
    pub zone_bypass_buttons: bool,
}

impl Default for OlarmConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://apiv4.olarm.co".to_string(),
            access_token: String::new(),
            device_id: String::new(),
            broker_host: "mqtt-ws.olarm.com".to_string(),
            broker_port: 443,
            broker_username: "native_app".to_string(),
            status_interval_secs: 60,
            reconnect_delay_ms: 10000,
            request_timeout_ms: 30000,
            zone_bypass_buttons: false,
        }
    }
}

impl OlarmConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> OlarmConfigBuilder {
        OlarmConfigBuilder::default()
    }
}

/// Builder for OlarmConfig.
#[derive(Debug, Clone, Default)]
pub struct OlarmConfigBuilder {
    config: OlarmConfig,
}

impl OlarmConfigBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config.access_token = token.into();
        self
    }

    pub fn device_id(mut self, id: impl Into<String>) -> Self {
        self.config.device_id = id.into();
        self
    }

    pub fn broker_host(mut self, host: impl Into<String>) -> Self {
        self.config.broker_host = host.into();
        self
    }

    pub fn broker_port(mut self, port: u16) -> Self {
        self.config.broker_port = port;
        self
    }

    pub fn broker_username(mut self, username: impl Into<String>) -> Self {
        self.config.broker_username = username.into();
        self
    }

    pub fn status_interval_secs(mut self, secs: u64) -> Self {
        self.config.status_interval_secs = secs;
        self
    }

    pub fn reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.config.reconnect_delay_ms = ms;
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    pub fn zone_bypass_buttons(mut self, enabled: bool) -> Self {
        self.config.zone_bypass_buttons = enabled;
        self
    }

    pub fn build(self) -> OlarmConfig {
        self.config
    }
}
