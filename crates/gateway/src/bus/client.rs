// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, TlsConfiguration, Transport};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::GwError;

const RECONNECT_INITIAL: Duration = Duration::from_secs(1);
const RECONNECT_MAX: Duration = Duration::from_secs(30);
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// A single incoming MQTT publish, re-broadcast to every interested
/// subscriber inside this process.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Bytes,
}

/// Connection settings for [`BusClient::connect`].
#[derive(Debug, Clone)]
pub struct BusSettings {
    pub url: String,
    pub namespace: String,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub tls_verify: bool,
}

/// A live connection to the MQTT bus, handling reconnection with backoff and
/// fanning out every received publish to local subscribers via a broadcast
/// channel. Mirrors the teacher's NATS relay connect/run split.
#[derive(Clone)]
pub struct BusClient {
    client: AsyncClient,
    namespace: String,
    events: broadcast::Sender<BusMessage>,
    connected: Arc<AtomicBool>,
}

impl BusClient {
    pub fn connect(settings: BusSettings) -> Result<Self, GwError> {
        let mut opts = parse_url(&settings.url, &settings.client_id)?;
        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            opts.set_credentials(user.clone(), pass.clone());
        }
        if settings.url.starts_with("mqtts://") {
            let tls = if settings.tls_verify {
                TlsConfiguration::Native
            } else {
                TlsConfiguration::SimpleNative {
                    ca: Vec::new(),
                    client_auth: None,
                }
            };
            opts.set_transport(Transport::Tls(tls));
        }
        opts.set_keep_alive(Duration::from_secs(30));

        let (client, eventloop) = AsyncClient::new(opts, 64);
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));

        tokio::spawn(run_event_loop(eventloop, tx.clone(), connected.clone()));

        Ok(Self {
            client,
            namespace: settings.namespace,
            events: tx,
            connected,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BusMessage> {
        self.events.subscribe()
    }

    pub async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), GwError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, retain, payload)
            .await
            .map_err(|e| GwError::unavailable(format!("bus publish to {topic} failed: {e}")))
    }

    pub async fn subscribe_topic(&self, topic: &str) -> Result<(), GwError> {
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| GwError::unavailable(format!("bus subscribe to {topic} failed: {e}")))
    }

    pub async fn unsubscribe_topic(&self, topic: &str) -> Result<(), GwError> {
        self.client
            .unsubscribe(topic)
            .await
            .map_err(|e| GwError::unavailable(format!("bus unsubscribe from {topic} failed: {e}")))
    }
}

fn parse_url(url: &str, client_id: &str) -> Result<MqttOptions, GwError> {
    let without_scheme = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .ok_or_else(|| GwError::validation(format!("bus url {url} is missing a scheme")))?;
    let (host, port) = without_scheme
        .split_once(':')
        .ok_or_else(|| GwError::validation(format!("bus url {url} is missing a port")))?;
    let port: u16 = port
        .trim_end_matches('/')
        .parse()
        .map_err(|_| GwError::validation(format!("bus url {url} has an invalid port")))?;
    Ok(MqttOptions::new(client_id, host, port))
}

async fn run_event_loop(
    mut eventloop: rumqttc::EventLoop,
    tx: broadcast::Sender<BusMessage>,
    connected: Arc<AtomicBool>,
) {
    let mut backoff = RECONNECT_INITIAL;
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("bus connected");
                connected.store(true, Ordering::Relaxed);
                backoff = RECONNECT_INITIAL;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                debug!(topic = %publish.topic, "bus message received");
                let _ = tx.send(BusMessage {
                    topic: publish.topic,
                    payload: publish.payload,
                });
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                connected.store(false, Ordering::Relaxed);
            }
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "bus connection error, reconnecting");
                connected.store(false, Ordering::Relaxed);
                tokio::time::sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, RECONNECT_MAX);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_mqtt_url() {
        let opts = parse_url("mqtt://broker.local:1883", "agent-1").unwrap();
        assert_eq!(opts.broker_address(), ("broker.local".to_string(), 1883));
    }

    #[test]
    fn rejects_url_without_scheme() {
        assert!(parse_url("broker.local:1883", "agent-1").is_err());
    }

    #[test]
    fn rejects_url_without_port() {
        assert!(parse_url("mqtt://broker.local", "agent-1").is_err());
    }
}
