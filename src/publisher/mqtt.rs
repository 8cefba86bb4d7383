//! MQTT publisher backed by `rumqttc`.
//!
//! Connecting drives the event loop until the broker's CONNACK arrives, then
//! hands the event loop to a background task that services keepalives and
//! acknowledgements for the rest of the process.
//!
//! Publishing only enqueues the request. While the broker is unreachable the
//! event loop stops draining the queue, so a full queue fails the publish
//! instead of stalling the caller.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use tracing::{debug, warn};

use super::{PublishError, Publisher, PublisherConnector};
use crate::config::MqttSettings;

const KEEP_ALIVE: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_LOOP_BACKOFF: Duration = Duration::from_secs(1);
const REQUEST_CAPACITY: usize = 64;

/// Connector producing [`MqttPublisher`] instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct MqttConnector;

/// Client identifier for `settings`, generated when none is configured.
pub fn client_id(settings: &MqttSettings) -> String {
    settings
        .client_name
        .clone()
        .unwrap_or_else(|| format!("recwatch-{}", uuid::Uuid::new_v4().simple()))
}

#[async_trait]
impl PublisherConnector for MqttConnector {
    async fn connect(&self, settings: &MqttSettings) -> Result<Box<dyn Publisher>, PublishError> {
        let host = settings
            .host
            .clone()
            .ok_or_else(|| PublishError::NotConfigured("mqtt_host is not set".to_owned()))?;

        let mut options = MqttOptions::new(client_id(settings), host, settings.port);
        options.set_keep_alive(KEEP_ALIVE);
        if let Some(username) = &settings.username {
            options.set_credentials(
                username.clone(),
                settings.password.clone().unwrap_or_default(),
            );
        }

        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        tokio::time::timeout(CONNECT_TIMEOUT, wait_for_connack(&mut event_loop))
            .await
            .map_err(|_| {
                PublishError::Connect(format!(
                    "no CONNACK within {}s",
                    CONNECT_TIMEOUT.as_secs()
                ))
            })??;

        tokio::spawn(drive_event_loop(event_loop));
        Ok(Box::new(MqttPublisher { client }))
    }
}

async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), PublishError> {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    return Ok(());
                }
                return Err(PublishError::Connect(format!(
                    "broker refused connection: {:?}",
                    ack.code
                )));
            }
            Ok(event) => debug!(?event, "mqtt event before connack"),
            Err(e) => return Err(PublishError::Connect(e.to_string())),
        }
    }
}

async fn drive_event_loop(mut event_loop: EventLoop) {
    loop {
        match event_loop.poll().await {
            Ok(event) => debug!(?event, "mqtt event"),
            Err(e) => {
                warn!(error = %e, "mqtt event loop error");
                tokio::time::sleep(EVENT_LOOP_BACKOFF).await;
            }
        }
    }
}

/// Publisher over a connected MQTT client.
pub struct MqttPublisher {
    client: AsyncClient,
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(|e| PublishError::Publish {
                topic: topic.to_owned(),
                reason: e.to_string(),
            })
    }
}
