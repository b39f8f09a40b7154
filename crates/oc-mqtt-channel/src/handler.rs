//! Inbound publishes as handed to the dispatcher.

use bytes::Bytes;
use rumqttc::Publish;

/// A received publish: topic plus raw payload. Consumed once by dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEnvelope {
    pub topic: String,
    pub payload: Bytes,
}

impl InboundEnvelope {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

impl From<Publish> for InboundEnvelope {
    fn from(publish: Publish) -> Self {
        Self {
            topic: publish.topic,
            payload: publish.payload,
        }
    }
}
