//! MQTT bridge
//!
//! Remote senders publish command payloads to the broker under the engine
//! tags (e.g. `/salt/minion/blinkt`). [`MqttBridge`] subscribes to the
//! configured topic filters and fires every JSON-object payload onto the bus
//! with the MQTT topic as its tag. [`MqttPublisher`] is the sending side.

use async_trait::async_trait;
use minion_events::EventEnvelope;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{EventSink, SharedBus};
use crate::config::MqttConfig;
use crate::error::FireError;

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const REQUEST_CAPACITY: usize = 16;

fn options(config: &MqttConfig, client_id: &str) -> MqttOptions {
    let mut options = MqttOptions::new(client_id, &config.host, config.port);
    options.set_keep_alive(KEEP_ALIVE);
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        options.set_credentials(username, password);
    }
    options
}

/// Turn an MQTT publish into a bus event. Only JSON objects are accepted.
pub fn envelope_from_publish(topic: &str, payload: &[u8]) -> Option<EventEnvelope> {
    match serde_json::from_slice::<Value>(payload) {
        Ok(data @ Value::Object(_)) => Some(EventEnvelope::new(topic, data)),
        Ok(_) => {
            debug!(%topic, "Ignoring MQTT payload that is not a JSON object");
            None
        }
        Err(e) => {
            debug!(%topic, "Ignoring non-JSON MQTT payload: {}", e);
            None
        }
    }
}

/// Broker to bus bridge
pub struct MqttBridge {
    config: MqttConfig,
    bus: SharedBus,
    shutdown: CancellationToken,
}

impl MqttBridge {
    pub fn new(config: MqttConfig, bus: SharedBus, shutdown: CancellationToken) -> Self {
        Self {
            config,
            bus,
            shutdown,
        }
    }

    /// Run until the shutdown token is cancelled. Connection errors are
    /// retried; subscriptions are renewed on every (re)connect.
    pub async fn run(self) {
        let options = options(&self.config, &self.config.client_id);
        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        info!(
            "Starting MQTT bridge to {}:{}",
            self.config.host, self.config.port
        );

        loop {
            let polled = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("MQTT bridge cancelled via token");
                    break;
                }
                polled = eventloop.poll() => polled,
            };

            match polled {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected to MQTT broker");
                    for topic in &self.config.topics {
                        if let Err(e) = client.subscribe(topic.as_str(), QoS::AtLeastOnce).await {
                            warn!(%topic, "Failed to subscribe: {}", e);
                        }
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if let Some(event) = envelope_from_publish(&publish.topic, &publish.payload) {
                        self.bus.publish(event);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("MQTT connection error: {}", e);
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }

        if let Err(e) = client.try_disconnect() {
            debug!("MQTT disconnect failed: {}", e);
        }
        info!("MQTT bridge stopped");
    }
}

/// Event sink that publishes commands to the broker.
///
/// The caller owns the returned [`EventLoop`] and must keep polling it for
/// publishes to leave.
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    pub fn connect(config: &MqttConfig, client_id: &str) -> (Self, EventLoop) {
        let (client, eventloop) = AsyncClient::new(options(config, client_id), REQUEST_CAPACITY);
        (Self { client }, eventloop)
    }

    pub async fn disconnect(&self) {
        if let Err(e) = self.client.disconnect().await {
            debug!("MQTT disconnect failed: {}", e);
        }
    }
}

#[async_trait]
impl EventSink for MqttPublisher {
    async fn fire(&self, data: Value, tag: &str) -> Result<(), FireError> {
        let payload = serde_json::to_vec(&data)?;
        self.client
            .publish(tag, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| FireError::Publish(e.to_string()))
    }
}
