// MIT License - Copyright (c) 2025 olarm2mqtt contributors
// Olarm <-> Home Assistant MQTT bridge

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS, Transport};
use serde::Deserialize;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Mutex;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

use olarm2mqtt::entity::{load_area_panels, load_binary_sensors, load_buttons};
use olarm2mqtt::entity::{AreaPanel, BinarySensor, Button};
use olarm2mqtt::hass::{
    alarm_config, availability_topic, binary_sensor_config, button_config, discovery_topic,
    parse_command, Command, PAYLOAD_OFF, PAYLOAD_OFFLINE, PAYLOAD_ON, PAYLOAD_ONLINE,
};
use olarm2mqtt::{
    ArmCommand, DeviceData, DeviceEvent, OlarmApi, OlarmConfig, OlarmCoordinator,
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "olarm2mqtt")]
#[command(about = "Bridge between the Olarm cloud alarm service and Home Assistant")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Config {
    olarm: OlarmToml,
    homeassistant: HassToml,
    /// Optional zone label overrides, keyed by 1-based zone number
    #[serde(default, deserialize_with = "deserialize_zone_labels")]
    zone_labels: HashMap<usize, String>,
}

fn deserialize_zone_labels<'de, D>(deserializer: D) -> Result<HashMap<usize, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let string_map: HashMap<String, String> = HashMap::deserialize(deserializer)?;
    string_map
        .into_iter()
        .map(|(k, v)| {
            k.parse::<usize>()
                .map(|n| (n, v))
                .map_err(|_| serde::de::Error::custom(format!("invalid zone number: {k}")))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct OlarmToml {
    access_token: String,
    device_id: String,
    #[serde(default = "default_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_broker_host")]
    broker_host: String,
    #[serde(default = "default_broker_port")]
    broker_port: u16,
    #[serde(default = "default_broker_username")]
    broker_username: String,
    #[serde(default = "default_status_interval")]
    status_interval_secs: u64,
    #[serde(default = "default_reconnect_delay")]
    reconnect_delay_ms: u64,
    #[serde(default = "default_request_timeout")]
    request_timeout_ms: u64,
    #[serde(default)]
    zone_bypass_buttons: bool,
}

fn default_api_base_url() -> String {
    "https://apiv4.olarm.co".to_string()
}
fn default_broker_host() -> String {
    "mqtt-ws.olarm.com".to_string()
}
fn default_broker_port() -> u16 {
    443
}
fn default_broker_username() -> String {
    "native_app".to_string()
}
fn default_status_interval() -> u64 {
    60
}
fn default_reconnect_delay() -> u64 {
    10000
}
fn default_request_timeout() -> u64 {
    30000
}

#[derive(Debug, Deserialize)]
struct HassToml {
    url: String,
    #[serde(default = "default_client_id")]
    client_id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

fn default_client_id() -> String {
    "olarm-bridge".to_string()
}

fn build_olarm_config(toml: &OlarmToml) -> OlarmConfig {
    OlarmConfig::builder()
        .api_base_url(&toml.api_base_url)
        .access_token(&toml.access_token)
        .device_id(&toml.device_id)
        .broker_host(&toml.broker_host)
        .broker_port(toml.broker_port)
        .broker_username(&toml.broker_username)
        .status_interval_secs(toml.status_interval_secs)
        .reconnect_delay_ms(toml.reconnect_delay_ms)
        .request_timeout_ms(toml.request_timeout_ms)
        .zone_bypass_buttons(toml.zone_bypass_buttons)
        .build()
}

// ---------------------------------------------------------------------------
// Entities and state publishing
// ---------------------------------------------------------------------------

struct Entities {
    panels: Vec<AreaPanel>,
    sensors: Vec<BinarySensor>,
    buttons: Vec<Button>,
}

fn load_entities(
    data: &DeviceData,
    zone_bypass_buttons: bool,
    zone_labels: &HashMap<usize, String>,
) -> Entities {
    use olarm2mqtt::entity::{ButtonKind, SensorKind};

    let mut entities = Entities {
        panels: load_area_panels(data),
        sensors: load_binary_sensors(data),
        buttons: load_buttons(data, zone_bypass_buttons),
    };

    // Config overrides beat whatever labels the panel installer typed in
    for sensor in &mut entities.sensors {
        if matches!(sensor.kind, SensorKind::Zone | SensorKind::ZoneBypass) {
            if let Some(label) = zone_labels.get(&(sensor.index + 1)) {
                sensor.label = label.clone();
            }
        }
    }
    for button in &mut entities.buttons {
        if matches!(button.kind, ButtonKind::ZoneBypass | ButtonKind::ZoneUnbypass) {
            if let Some(label) = zone_labels.get(&(button.index + 1)) {
                button.label = label.clone();
            }
        }
    }

    entities
}

async fn publish_str(client: &AsyncClient, topic: &str, payload: &str, retain: bool) {
    if let Err(e) = client.publish(topic, QoS::AtLeastOnce, retain, payload).await {
        error!("Failed to publish to {topic}: {e}");
    }
}

async fn publish_json(client: &AsyncClient, topic: &str, payload: &impl serde::Serialize) {
    match serde_json::to_string(payload) {
        Ok(json) => publish_str(client, topic, &json, true).await,
        Err(e) => error!("Failed to serialize MQTT payload: {e}"),
    }
}

/// Publish retained discovery configs for every entity.
async fn publish_discovery(
    client: &AsyncClient,
    device_id: &str,
    device_name: &str,
    entities: &Entities,
) {
    for panel in &entities.panels {
        let config = alarm_config(device_id, device_name, panel);
        let topic = discovery_topic("alarm_control_panel", &config.unique_id);
        publish_json(client, &topic, &config).await;
    }
    for sensor in &entities.sensors {
        let config = binary_sensor_config(device_id, device_name, sensor);
        let topic = discovery_topic("binary_sensor", &config.unique_id);
        publish_json(client, &topic, &config).await;
    }
    for button in &entities.buttons {
        let config = button_config(device_id, device_name, button);
        let topic = discovery_topic("button", &config.unique_id);
        publish_json(client, &topic, &config).await;
    }
    info!(
        "Published discovery for {} panels, {} sensors, {} buttons",
        entities.panels.len(),
        entities.sensors.len(),
        entities.buttons.len()
    );
}

/// Publish entity states, skipping topics whose payload has not changed.
///
/// The cache makes vendor updates cheap: a typical patch only flips one or
/// two zones, so only those topics see traffic.
async fn publish_states(
    client: &AsyncClient,
    device_id: &str,
    data: &DeviceData,
    entities: &Entities,
    cache: &Mutex<HashMap<String, String>>,
) {
    let mut pending: Vec<(String, String)> = Vec::new();

    for panel in &entities.panels {
        let topic = panel.state_topic(device_id);
        let state = panel.state(data).as_str().to_string();
        pending.push((topic, state));
    }
    for sensor in &entities.sensors {
        let topic = sensor.state_topic(device_id);
        let state = if sensor.is_on(data) { PAYLOAD_ON } else { PAYLOAD_OFF };
        pending.push((topic, state.to_string()));

        if let (Some(topic), Some(attrs)) =
            (sensor.attributes_topic(device_id), sensor.attributes(data))
        {
            pending.push((topic, attrs.to_string()));
        }
    }

    let mut cache = cache.lock().await;
    for (topic, payload) in pending {
        if cache.get(&topic).map(String::as_str) == Some(&payload) {
            continue;
        }
        publish_str(client, &topic, &payload, true).await;
        cache.insert(topic, payload);
    }
}

// ---------------------------------------------------------------------------
// Command handling
// ---------------------------------------------------------------------------

async fn handle_command(
    command: Command,
    coordinator: &OlarmCoordinator,
    client: &AsyncClient,
    cache: &Mutex<HashMap<String, String>>,
) {
    let device_id = coordinator.device_id().to_string();
    match command {
        Command::Area { index, arm } => {
            info!("Command: {arm:?} area {index}");

            let area_count = coordinator.data().await.state.areas.len();
            if index >= area_count {
                warn!("Ignoring {arm:?} for unknown area {index} ({area_count} areas)");
                return;
            }

            // Immediate UI feedback; corrected by the next vendor update
            let state_topic = format!("olarm/{device_id}/area/{index}/state");
            publish_str(client, &state_topic, "pending", true).await;
            cache.lock().await.insert(state_topic.clone(), "pending".to_string());

            let result = match arm {
                ArmCommand::ArmAway => coordinator.send_area_arm(index).await,
                ArmCommand::ArmHome => coordinator.send_area_stay(index).await,
                ArmCommand::ArmNight => coordinator.send_area_sleep(index).await,
                ArmCommand::Disarm => coordinator.send_area_disarm(index).await,
            };
            if let Err(e) = result {
                error!("{arm:?} area {index} failed: {e}");
                // Roll the panel back to its actual state
                let data = coordinator.data().await;
                if let Some(panel) = load_area_panels(&data).into_iter().find(|p| p.index == index)
                {
                    let state = panel.state(&data).as_str();
                    publish_str(client, &state_topic, state, true).await;
                    cache.lock().await.insert(state_topic, state.to_string());
                }
            }
        }

        Command::Button { kind, index, link_id } => {
            info!("Command: press {} #{index} (link: {link_id:?})", kind.key());
            if let Err(e) = coordinator.press_button(kind, index, link_id.as_deref()).await {
                error!("Button {} #{index} failed: {e}", kind.key());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=olarm2mqtt=trace).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();

    let config_text =
        std::fs::read_to_string(&cli.config).context("Failed to read config file")?;
    let mut config: Config = toml::from_str(&config_text).context("Failed to parse config file")?;

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        let olarm_config = build_olarm_config(&config.olarm);
        let device_id = olarm_config.device_id.clone();

        // Fetch the device document and build the entity tables
        let api = OlarmApi::new(&olarm_config)?;
        let coordinator = Arc::new(OlarmCoordinator::new(api, &device_id));
        // Retry transient failures (cloud hiccups, 5xx) forever; bail on
        // anything else, such as a rejected token
        coordinator
            .refresh_with_retry(Duration::from_millis(olarm_config.reconnect_delay_ms), usize::MAX)
            .await
            .context("Initial device fetch failed")?;

        let data = coordinator.data().await;
        let device_name = data.device_name.clone();
        let device_serial = data.device_serial.clone();
        if device_serial.is_empty() {
            anyhow::bail!("Device document carries no serial; cannot subscribe to updates");
        }
        let entities = Arc::new(load_entities(
            &data,
            olarm_config.zone_bypass_buttons,
            &config.zone_labels,
        ));

        // Home Assistant broker, with an LWT so entities go unavailable if
        // the bridge dies
        let (ha_host, ha_port) = parse_mqtt_url(&config.homeassistant.url)?;
        let avail_topic = availability_topic(&device_id);
        let mut ha_opts = MqttOptions::new(&config.homeassistant.client_id, &ha_host, ha_port);
        ha_opts.set_keep_alive(Duration::from_secs(30));
        ha_opts.set_last_will(LastWill::new(
            &avail_topic,
            PAYLOAD_OFFLINE,
            QoS::AtLeastOnce,
            true,
        ));
        if let (Some(username), Some(password)) =
            (&config.homeassistant.username, &config.homeassistant.password)
        {
            ha_opts.set_credentials(username, password);
        }
        let (ha_client, mut ha_eventloop) = AsyncClient::new(ha_opts, 256);

        let area_filter = format!("olarm/{device_id}/area/+/set");
        let cmd_filter = format!("olarm/{device_id}/cmd/#");
        ha_client
            .subscribe(&area_filter, QoS::AtLeastOnce)
            .await
            .context("Failed to subscribe to MQTT topic")?;
        ha_client.subscribe(&cmd_filter, QoS::AtLeastOnce).await?;
        info!("MQTT: subscribed to {area_filter} and {cmd_filter}");

        publish_discovery(&ha_client, &device_id, &device_name, &entities).await;
        publish_str(&ha_client, &avail_topic, PAYLOAD_ONLINE, true).await;

        let state_cache = Arc::new(Mutex::new(HashMap::new()));
        publish_states(&ha_client, &device_id, &data, &entities, &state_cache).await;

        // Olarm broker (MQTT over websocket)
        let status_interval_secs = olarm_config.status_interval_secs;
        let reconnect_delay_ms = olarm_config.reconnect_delay_ms;
        let ws_url = format!(
            "wss://{}:{}/mqtt",
            olarm_config.broker_host, olarm_config.broker_port
        );
        let mut olarm_opts = MqttOptions::new(
            format!("native-app-oauth-{device_serial}"),
            ws_url,
            olarm_config.broker_port,
        );
        olarm_opts.set_transport(Transport::wss_with_default_config());
        olarm_opts.set_credentials(&olarm_config.broker_username, &olarm_config.access_token);
        olarm_opts.set_keep_alive(Duration::from_secs(30));
        let (olarm_client, mut olarm_eventloop) = AsyncClient::new(olarm_opts, 256);

        let update_topic = format!("so/app/v1/{device_serial}");
        let status_topic = format!("si/app/v2/{device_serial}/status");

        // Task 1: Olarm event loop (receives state patches)
        let coord_vendor = Arc::clone(&coordinator);
        let client_vendor = olarm_client.clone();
        let sub_topic = update_topic.clone();
        let req_topic = status_topic.clone();
        let vendor_handle = tokio::spawn(async move {
            let mut connected = false;
            loop {
                match olarm_eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        // (Re)subscribe after every broker connect/reconnect.
                        // rumqttc does not auto-resubscribe, so without this a
                        // broker restart silently drops our subscription and we
                        // stop receiving updates.
                        info!("Olarm MQTT: connected, subscribing to {sub_topic}");
                        if let Err(e) =
                            client_vendor.subscribe(&sub_topic, QoS::AtLeastOnce).await
                        {
                            error!("Failed to subscribe to {sub_topic}: {e}");
                        }
                        // Ask the device for a full status document
                        if let Err(e) = client_vendor
                            .publish(&req_topic, QoS::AtLeastOnce, false, r#"{"method":"GET"}"#)
                            .await
                        {
                            error!("Failed to request device status: {e}");
                        }
                        connected = true;
                        coord_vendor.mark_connected();
                    }
                    Ok(Event::Incoming(Packet::Publish(msg))) => {
                        let payload = String::from_utf8_lossy(&msg.payload);
                        match serde_json::from_str::<serde_json::Value>(&payload) {
                            Ok(value) => {
                                // Status responses wrap the document in "data";
                                // push updates are bare
                                let doc = value.get("data").unwrap_or(&value);
                                coord_vendor.apply_mqtt_payload(doc).await;
                            }
                            Err(e) => warn!("Unparseable Olarm MQTT payload: {e}"),
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Olarm MQTT connection error: {e}");
                        if connected {
                            connected = false;
                            coord_vendor.mark_disconnected();
                        }
                        tokio::time::sleep(Duration::from_millis(reconnect_delay_ms)).await;
                    }
                }
            }
        });

        // Task 2: status poll timer, in case a push update was missed
        let client_status = olarm_client.clone();
        let status_handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(status_interval_secs));
            // Skip the first immediate tick (connect already requested status)
            ticker.tick().await;
            loop {
                ticker.tick().await;
                debug!("Requesting device status refresh");
                if let Err(e) = client_status
                    .publish(&status_topic, QoS::AtLeastOnce, false, r#"{"method":"GET"}"#)
                    .await
                {
                    error!("Failed to request device status: {e}");
                }
            }
        });

        // Task 3: Home Assistant event loop (receives commands)
        let coord_cmds = Arc::clone(&coordinator);
        let client_cmds = ha_client.clone();
        let cache_cmds = Arc::clone(&state_cache);
        let dev_cmds = device_id.clone();
        let sub_area = area_filter.clone();
        let sub_cmd = cmd_filter.clone();
        let ha_handle = tokio::spawn(async move {
            loop {
                match ha_eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("MQTT: connected, subscribing to {sub_area} and {sub_cmd}");
                        for filter in [&sub_area, &sub_cmd] {
                            if let Err(e) =
                                client_cmds.subscribe(filter, QoS::AtLeastOnce).await
                            {
                                error!("Failed to subscribe to {filter}: {e}");
                            }
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(msg))) => {
                        let payload = String::from_utf8_lossy(&msg.payload);
                        match parse_command(&dev_cmds, &msg.topic, &payload) {
                            Some(command) => {
                                handle_command(command, &coord_cmds, &client_cmds, &cache_cmds)
                                    .await;
                            }
                            None => {
                                debug!("Ignoring message on {}: {payload}", msg.topic);
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("MQTT event loop error: {e}");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        // Task 4: coordinator events -> entity state publishing
        let coord_events = Arc::clone(&coordinator);
        let client_events = ha_client.clone();
        let cache_events = Arc::clone(&state_cache);
        let entities_events = Arc::clone(&entities);
        let dev_events = device_id.clone();
        let avail_events = avail_topic.clone();
        let mut event_rx = coordinator.subscribe();
        let event_handle = tokio::spawn(async move {
            loop {
                match event_rx.recv().await {
                    Ok(DeviceEvent::StateUpdated { .. }) | Ok(DeviceEvent::Refreshed) => {
                        let data = coord_events.data().await;
                        publish_states(
                            &client_events,
                            &dev_events,
                            &data,
                            &entities_events,
                            &cache_events,
                        )
                        .await;
                    }
                    Ok(DeviceEvent::Connected) => {
                        publish_str(&client_events, &avail_events, PAYLOAD_ONLINE, true).await;
                    }
                    Ok(DeviceEvent::Disconnected) => {
                        warn!("Olarm stream disconnected; marking entities unavailable");
                        publish_str(&client_events, &avail_events, PAYLOAD_OFFLINE, true).await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Event receiver lagged, missed {n} events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        info!("Event channel closed");
                        break;
                    }
                }
            }
        });

        // Wait for a signal
        info!("MQTT bridge running. Send SIGHUP to restart, SIGINT/SIGTERM to stop.");
        let restart = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down...");
                false
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                false
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading config and restarting connections...");
                true
            }
        };

        // Mark entities unavailable before tearing down
        publish_str(&ha_client, &avail_topic, PAYLOAD_OFFLINE, true).await;

        vendor_handle.abort();
        status_handle.abort();
        ha_handle.abort();
        event_handle.abort();

        if let Err(e) = olarm_client.disconnect().await {
            debug!("Error disconnecting from Olarm broker: {e}");
        }
        if let Err(e) = ha_client.disconnect().await {
            debug!("Error disconnecting from Home Assistant broker: {e}");
        }

        if !restart {
            break;
        }

        // Reload config from disk; keep previous config on failure
        info!("Reloading config from {}", cli.config);
        match std::fs::read_to_string(&cli.config)
            .context("Failed to read config file")
            .and_then(|text| {
                toml::from_str::<Config>(&text).context("Failed to parse config file")
            }) {
            Ok(new_config) => match parse_mqtt_url(&new_config.homeassistant.url) {
                Ok(_) => {
                    config = new_config;
                    info!("Config reloaded successfully");
                }
                Err(e) => warn!("Invalid MQTT URL in new config, keeping previous: {e}"),
            },
            Err(e) => warn!("Failed to reload config, keeping previous: {e}"),
        }

        info!("Reconnecting...");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Parse an MQTT URL like "mqtt://host:port" into (host, port).
fn parse_mqtt_url(url: &str) -> Result<(String, u16)> {
    let stripped = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port_str) = stripped
        .rsplit_once(':')
        .context("MQTT URL must be in format mqtt://host:port")?;

    let port: u16 = port_str
        .parse()
        .context("Invalid MQTT port number")?;

    Ok((host.to_string(), port))
}
