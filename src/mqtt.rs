//! MQTT broker client plumbing.
//!
//! Connection handshake, reconnection, and QoS delivery mechanics belong to
//! `rumqttc`; this module only wires the client up: endpoint parsing, a
//! driver thread for the event loop, and the `Publisher` implementation the
//! pipeline hands payloads to.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rumqttc::v5::{mqttbytes::QoS, Client, Connection, Event, MqttOptions};
use rumqttc::Transport;

use crate::publish::{PublishError, Publisher};

/// Parsed broker endpoint.
#[derive(Clone, Debug)]
pub struct MqttEndpoint {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

/// Parse a broker address: `host:port`, optionally prefixed with
/// `mqtt://`/`tcp://` or `mqtts://`/`ssl://` (the latter enable TLS).
pub fn parse_mqtt_endpoint(addr: &str, tls_override: bool) -> Result<MqttEndpoint> {
    let mut use_tls = tls_override;
    let mut remainder = addr.trim();

    if let Some((scheme, rest)) = remainder.split_once("://") {
        match scheme {
            "mqtt" | "tcp" => {}
            "mqtts" | "ssl" => use_tls = true,
            other => return Err(anyhow!("unsupported MQTT scheme: {}", other)),
        }
        remainder = rest;
    }

    let (host, port) = split_host_port(remainder)?;
    Ok(MqttEndpoint {
        host,
        port,
        use_tls,
    })
}

fn split_host_port(addr: &str) -> Result<(String, u16)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| anyhow!("invalid MQTT address: {}", addr))?;
        let port = rest
            .strip_prefix(':')
            .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
        let port: u16 = port.parse().context("invalid MQTT port")?;
        return Ok((host.to_string(), port));
    }

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
    let port: u16 = port.parse().context("invalid MQTT port")?;
    Ok((host.to_string(), port))
}

/// Map a configured QoS level onto the protocol enum.
pub fn qos_from_level(level: u8) -> Result<QoS> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(anyhow!("MQTT QoS must be 0, 1 or 2, got {}", other)),
    }
}

/// Live broker connection: the client plus its event-loop driver thread.
pub struct MqttRuntime {
    pub client: Client,
    connection_handle: Option<std::thread::JoinHandle<()>>,
}

impl MqttRuntime {
    fn new(client: Client, mut connection: Connection) -> Self {
        let handle = std::thread::spawn(move || {
            for event in connection.iter() {
                match event {
                    Ok(Event::Incoming(_)) | Ok(Event::Outgoing(_)) => {}
                    Err(e) => {
                        log::warn!("MQTT connection error: {}", e);
                        break;
                    }
                }
            }
        });

        Self {
            client,
            connection_handle: Some(handle),
        }
    }

    pub fn disconnect(mut self) -> Result<()> {
        self.client.disconnect()?;
        if let Some(handle) = self.connection_handle.take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

/// Connect to the broker and start the event-loop driver thread.
pub fn connect(
    endpoint: &MqttEndpoint,
    client_id: &str,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<MqttRuntime> {
    let mut options = MqttOptions::new(client_id, &endpoint.host, endpoint.port);
    options.set_keep_alive(Duration::from_secs(60));
    options.set_clean_start(true);
    if let Some(user) = username {
        options.set_credentials(user, password.unwrap_or_default());
    }
    if endpoint.use_tls {
        options.set_transport(Transport::tls_with_default_config());
    } else {
        options.set_transport(Transport::tcp());
    }

    let (client, connection) = Client::new(options, 10);
    log::info!(
        "connected to MQTT broker {}:{} (TLS: {}, auth: {})",
        endpoint.host,
        endpoint.port,
        endpoint.use_tls,
        username.is_some()
    );
    Ok(MqttRuntime::new(client, connection))
}

/// `Publisher` implementation over the MQTT client.
///
/// Topic and QoS are fixed configuration passed through unchanged.
pub struct MqttPublisher {
    client: Client,
    topic: String,
    qos: QoS,
}

impl MqttPublisher {
    pub fn new(client: Client, topic: impl Into<String>, qos: QoS) -> Self {
        Self {
            client,
            topic: topic.into(),
            qos,
        }
    }
}

impl Publisher for MqttPublisher {
    fn publish(&mut self, payload: &[u8]) -> Result<(), PublishError> {
        self.client
            .publish(self.topic.clone(), self.qos, false, payload.to_vec())
            .map_err(|e| PublishError::new(e.to_string()))
    }
}
