//! MQTT cloud channel
//!
//! Publishes every reading on three topics:
//!
//! | Topic       | Payload                      |
//! |-------------|------------------------------|
//! | `bpm`       | `72.5`                       |
//! | `spo2`      | `97`                         |
//! | `bpm_spo2`  | `{"bpm":72.5,"spo2":97.0}`   |
//!
//! Topics carry an optional prefix (e.g. `ward7/`). A publish counts as
//! delivered once the broker session is confirmed (CONNACK seen) and all three
//! messages were accepted by the client queue.
//!
//! The `rumqttc` event loop is driven from [`Transport::poll`], once per
//! control loop tick, without blocking.

use std::time::Duration;

use pulseguard_core::constants::delivery::{TOPIC_COMBINED, TOPIC_PRIMARY, TOPIC_SECONDARY};
use pulseguard_core::{DeviceId, Reading, Transport, TransportError};
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};

/// MQTT configuration
#[derive(Debug, Clone)]
pub struct MqttConfig {
    /// Broker host
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Client identifier, normally the device id
    pub client_id: String,
    /// Prepended to every topic
    pub topic_prefix: String,
    /// Keep-alive interval
    pub keep_alive: Duration,
    /// Username and password
    pub credentials: Option<(String, String)>,
    /// Outgoing request queue depth
    pub queue_capacity: usize,
    /// Events handled per `poll` call at most
    pub max_events_per_poll: usize,
}

impl MqttConfig {
    /// Create new configuration
    pub fn new(host: impl Into<String>, port: u16, client_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            client_id: client_id.into(),
            topic_prefix: String::new(),
            keep_alive: Duration::from_secs(60),
            credentials: None,
            queue_capacity: 16,
            max_events_per_poll: 16,
        }
    }

    /// Set topic prefix
    pub fn topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = prefix.into();
        self
    }

    /// Set keep-alive in seconds
    pub fn keep_alive_secs(mut self, secs: u64) -> Self {
        self.keep_alive = Duration::from_secs(secs);
        self
    }

    /// Set username and password
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }
}

/// Topic and payload of each message for one reading
pub fn topic_payloads(prefix: &str, reading: &Reading) -> Result<[(String, Vec<u8>); 3], serde_json::Error> {
    Ok([
        (format!("{prefix}{TOPIC_PRIMARY}"), reading.bpm.to_string().into_bytes()),
        (format!("{prefix}{TOPIC_SECONDARY}"), reading.spo2.to_string().into_bytes()),
        (format!("{prefix}{TOPIC_COMBINED}"), serde_json::to_vec(reading)?),
    ])
}

/// Cloud channel over a synchronous `rumqttc` client
pub struct MqttTransport {
    config: MqttConfig,
    client: Client,
    connection: Connection,
    session_up: bool,
}

impl MqttTransport {
    /// Create the client; the session is established by later `poll` calls
    pub fn connect(config: MqttConfig) -> Self {
        let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(config.keep_alive);
        if let Some((username, password)) = &config.credentials {
            options.set_credentials(username.clone(), password.clone());
        }

        let (client, connection) = Client::new(options, config.queue_capacity);
        log::info!("cloud channel to {}:{} as {}", config.host, config.port, config.client_id);

        Self {
            config,
            client,
            connection,
            session_up: false,
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &MqttConfig {
        &self.config
    }

    fn observe(&mut self, event: Event) {
        match event {
            Event::Incoming(Packet::ConnAck(_)) => {
                if !self.session_up {
                    log::info!("cloud session established");
                }
                self.session_up = true;
            }
            Event::Incoming(Packet::Disconnect) => {
                log::warn!("broker closed the session");
                self.session_up = false;
            }
            _ => {}
        }
    }
}

impl Transport for MqttTransport {
    fn name(&self) -> &'static str {
        "cloud"
    }

    fn is_connected(&self) -> bool {
        self.session_up
    }

    fn send(&mut self, _device: &DeviceId, reading: &Reading) -> Result<(), TransportError> {
        if !self.session_up {
            return Err(TransportError::NotConnected);
        }

        let messages = topic_payloads(&self.config.topic_prefix, reading)
            .map_err(|_| TransportError::Failed { reason: "payload encoding failed" })?;

        for (topic, payload) in messages {
            self.client
                .try_publish(topic.as_str(), QoS::AtLeastOnce, false, payload)
                .map_err(|e| {
                    log::warn!("publish on {} rejected: {}", topic, e);
                    TransportError::Failed { reason: "publish rejected" }
                })?;
        }

        self.poll();
        Ok(())
    }

    fn poll(&mut self) {
        for _ in 0..self.config.max_events_per_poll {
            match self.connection.try_recv() {
                Ok(Ok(event)) => self.observe(event),
                Ok(Err(e)) => {
                    if self.session_up {
                        log::warn!("cloud session lost: {}", e);
                    }
                    self.session_up = false;
                    break;
                }
                Err(_) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_topics_per_reading() {
        let messages = topic_payloads("ward7/", &Reading::new(72.5, 97.0)).unwrap();

        assert_eq!(messages[0].0, "ward7/bpm");
        assert_eq!(messages[0].1, b"72.5");
        assert_eq!(messages[1].0, "ward7/spo2");
        assert_eq!(messages[1].1, b"97");
        assert_eq!(messages[2].0, "ward7/bpm_spo2");

        let combined: serde_json::Value = serde_json::from_slice(&messages[2].1).unwrap();
        assert_eq!(combined, serde_json::json!({"bpm": 72.5, "spo2": 97.0}));
    }

    #[test]
    fn test_config_builder() {
        let config = MqttConfig::new("broker.local", 8883, "e00fce68")
            .topic_prefix("ward7/")
            .keep_alive_secs(30)
            .credentials("user", "pass");

        assert_eq!(config.client_id, "e00fce68");
        assert_eq!(config.keep_alive, Duration::from_secs(30));
        assert_eq!(config.credentials, Some(("user".into(), "pass".into())));
    }

    #[test]
    fn no_session_means_not_connected() {
        let mut transport = MqttTransport::connect(MqttConfig::new("localhost", 1883, "test"));

        assert!(!transport.is_connected());
        assert_eq!(
            transport.send(&DeviceId::new("test"), &Reading::new(60.0, 95.0)),
            Err(TransportError::NotConnected)
        );
    }
}
