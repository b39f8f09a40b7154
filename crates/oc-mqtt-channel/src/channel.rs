//! MQTT channel: async client for broker communication.
//!
//! Wraps `rumqttc::AsyncClient` behind the `Channel` trait so the device
//! engine can be exercised against `MockChannel` in tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use serde::Serialize;

use oc_protocol::Credentials;

use crate::config::MqttConfig;
use crate::error::{MqttError, MqttResult};
use crate::tls;

// ── Channel trait ─────────────────────────────────────────────

/// Abstraction for MQTT message publishing and subscribing.
///
/// Enables mocking in tests without a real MQTT broker.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Publish a raw payload to a topic (never retained).
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()>;

    /// Subscribe to a topic filter.
    async fn subscribe(&self, filter: &str, qos: QoS) -> MqttResult<()>;

    /// Current connectivity as last observed by the transport.
    fn is_connected(&self) -> bool;

    /// Close the session with the broker.
    async fn disconnect(&self) -> MqttResult<()>;
}

/// Serialize `payload` as JSON and publish it.
pub async fn publish_json<C, T>(channel: &C, topic: &str, payload: &T, qos: QoS) -> MqttResult<()>
where
    C: Channel + ?Sized,
    T: Serialize + ?Sized,
{
    let bytes =
        serde_json::to_vec(payload).map_err(|e| MqttError::Serialization(e.to_string()))?;
    channel.publish(topic, &bytes, qos).await
}

// ── MqttChannel ───────────────────────────────────────────────

/// MQTT channel authenticated with session credentials.
///
/// Owns the `AsyncClient` for publishing/subscribing. The `EventLoop`
/// is returned separately from `new()`; the caller must drive it and
/// report connectivity through [`MqttChannel::connection_flag`].
pub struct MqttChannel {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
}

impl MqttChannel {
    /// Create a channel for the broker in `config`.
    ///
    /// No network traffic happens until the returned event loop is polled.
    pub fn new(config: &MqttConfig, credentials: &Credentials) -> MqttResult<(Self, EventLoop)> {
        let endpoint = config.endpoint()?;

        let mut options =
            MqttOptions::new(&credentials.client_id, &endpoint.host, endpoint.port);
        options.set_keep_alive(Duration::from_secs(config.keepalive_secs.into()));
        options.set_credentials(&credentials.username, &credentials.password);
        options.set_transport(tls::load_transport(config, &endpoint)?);

        tracing::debug!(
            host = %endpoint.host,
            port = endpoint.port,
            tls = endpoint.use_tls,
            client_id = %credentials.client_id,
            "MQTT options prepared"
        );

        let (client, eventloop) = AsyncClient::new(options, config.request_channel_capacity);

        Ok((
            Self {
                client,
                connected: Arc::new(AtomicBool::new(false)),
            },
            eventloop,
        ))
    }

    /// Shared connectivity flag, written by the event-loop driver.
    pub fn connection_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.connected)
    }
}

#[async_trait]
impl Channel for MqttChannel {
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()> {
        self.client
            .publish(topic, qos, false, payload)
            .await
            .map_err(|e| MqttError::Publish(e.to_string()))
    }

    async fn subscribe(&self, filter: &str, qos: QoS) -> MqttResult<()> {
        self.client
            .subscribe(filter, qos)
            .await
            .map_err(|e| MqttError::Subscribe(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn disconnect(&self) -> MqttResult<()> {
        self.connected.store(false, Ordering::Release);
        self.client
            .disconnect()
            .await
            .map_err(|e| MqttError::Connection(e.to_string()))
    }
}
