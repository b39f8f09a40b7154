//! MQTT channel for `$oc` device sessions.
//!
//! Provides the transport boundary the device engine is written against:
//! - `Channel` trait for publish/subscribe/connectivity (mockable in tests)
//! - `MqttChannel` over `rumqttc` with password auth and optional TLS
//! - `MockChannel` for testing without a broker
//! - `InboundEnvelope` for handing received publishes to the dispatcher

pub mod channel;
pub mod config;
pub mod error;
pub mod handler;
pub mod mock;
pub mod tls;

// Re-exports for convenience.
pub use channel::{Channel, MqttChannel, publish_json};
pub use config::{BrokerEndpoint, MqttConfig};
pub use error::{MqttError, MqttResult};
pub use handler::InboundEnvelope;
pub use mock::{MockChannel, PublishedMessage};
pub use rumqttc::QoS;
