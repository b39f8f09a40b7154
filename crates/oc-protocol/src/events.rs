//! Decoding of inbound payloads into typed domain events.

use thiserror::Error;

use crate::commands::Command;
use crate::messages::DeviceMessage;
use crate::properties::{PropertiesQueryRequest, PropertiesSetRequest};
use crate::topics::TopicKind;

/// Decoded form of an inbound payload; shape follows the arrival topic.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Message(DeviceMessage),
    Command(Command),
    PropertiesSet(PropertiesSetRequest),
    PropertiesQuery(PropertiesQueryRequest),
}

/// Payload could not be decoded for the topic it arrived on.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{0} is not an inbound topic kind")]
    NotInbound(TopicKind),

    #[error("invalid {kind} payload: {source}")]
    Payload {
        kind: TopicKind,
        #[source]
        source: serde_json::Error,
    },
}

impl DomainEvent {
    /// Decode `payload` into the event shape implied by `kind`.
    pub fn decode(kind: TopicKind, payload: &[u8]) -> Result<Self, DecodeError> {
        let wrap = |source: serde_json::Error| DecodeError::Payload { kind, source };
        match kind {
            TopicKind::MessageDown => serde_json::from_slice(payload)
                .map(DomainEvent::Message)
                .map_err(wrap),
            TopicKind::CommandDown => serde_json::from_slice(payload)
                .map(DomainEvent::Command)
                .map_err(wrap),
            TopicKind::PropertiesSetRequest => serde_json::from_slice(payload)
                .map(DomainEvent::PropertiesSet)
                .map_err(wrap),
            TopicKind::PropertiesQueryRequest => serde_json::from_slice(payload)
                .map(DomainEvent::PropertiesQuery)
                .map_err(wrap),
            other => Err(DecodeError::NotInbound(other)),
        }
    }

    /// Topic kind this event arrives on.
    pub fn kind(&self) -> TopicKind {
        match self {
            DomainEvent::Message(_) => TopicKind::MessageDown,
            DomainEvent::Command(_) => TopicKind::CommandDown,
            DomainEvent::PropertiesSet(_) => TopicKind::PropertiesSetRequest,
            DomainEvent::PropertiesQuery(_) => TopicKind::PropertiesQueryRequest,
        }
    }
}
