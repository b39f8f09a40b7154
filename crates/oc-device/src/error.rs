//! Device session error types.

use thiserror::Error;

use oc_mqtt_channel::MqttError;
use oc_protocol::TopicKind;

/// Errors surfaced by the session and the dispatch engine.
///
/// `Connection` and `Subscription` fail `init`. The per-message kinds
/// (`Decode`, `Publish`, `Uncorrelated`, `MissingQueryResponder`,
/// `UnknownTopic`) only affect the message that raised them.
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("subscription error: {0}")]
    Subscription(String),

    #[error("dropped undecodable {kind} payload on '{topic}': {reason}")]
    Decode {
        kind: TopicKind,
        topic: String,
        reason: String,
    },

    #[error("failed to encode payload for '{topic}': {reason}")]
    Encode { topic: String, reason: String },

    #[error("publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("no property query responder registered")]
    MissingQueryResponder,

    #[error("request on '{0}' carries no correlation token")]
    Uncorrelated(String),

    #[error("unrecognized inbound topic '{0}'")]
    UnknownTopic(String),

    #[error("session is not connected")]
    NotConnected,

    #[error("configuration error: {0}")]
    Config(String),
}

impl DeviceError {
    /// Classify a failed JSON publish to `topic`.
    pub fn from_publish(topic: &str, error: MqttError) -> Self {
        match error {
            MqttError::Serialization(reason) => DeviceError::Encode {
                topic: topic.to_string(),
                reason,
            },
            other => DeviceError::Publish {
                topic: topic.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Convenience alias for device results.
pub type DeviceResult<T> = Result<T, DeviceError>;
