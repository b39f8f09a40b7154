//! Inbound request dispatch.
//!
//! Per envelope:
//! 1. classify the topic and decode the payload into a `DomainEvent`
//! 2. run the matching handler chain (or the query responder)
//! 3. build the reply: aggregate verdict → `Acknowledgement`, or the
//!    responder's body unchanged
//! 4. publish it to the reply topic carrying the request's correlation token
//!
//! Messages are one-way and never answered. Chains are not short-circuited:
//! every handler observes every request even after one has rejected it.
//! Envelopes are independent of each other and may be dispatched
//! concurrently from separate tasks.

use std::fmt;
use std::sync::Arc;

use rumqttc::QoS;
use serde::Serialize;
use tokio::sync::Semaphore;

use oc_mqtt_channel::{Channel, InboundEnvelope, publish_json};
use oc_protocol::{Acknowledgement, DeviceMessage, DomainEvent, TopicKind, TopicTable};

use crate::error::{DeviceError, DeviceResult};
use crate::handlers::HandlerRegistry;
use crate::report::ErrorReporter;

/// Delivery assurance for replies to the platform.
pub const REPLY_QOS: QoS = QoS::AtLeastOnce;

/// Delivery assurance for request subscriptions.
pub const SUBSCRIBE_QOS: QoS = QoS::ExactlyOnce;

/// Default cap on dispatch tasks running at once per session.
pub const MAX_IN_FLIGHT: usize = 64;

/// Outcome of a successfully dispatched envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// One-way message delivered to `handlers` message handlers.
    Notified { handlers: usize },
    /// Reply published for a correlated request.
    Replied { kind: TopicKind, topic: String },
}

/// Routes inbound envelopes through a session's handler chains.
///
/// Cheap to clone; every clone shares the same channel, topics, handlers
/// and in-flight limit.
#[derive(Clone)]
pub struct Dispatcher {
    channel: Arc<dyn Channel>,
    topics: Arc<TopicTable>,
    handlers: Arc<HandlerRegistry>,
    reporter: Arc<dyn ErrorReporter>,
    in_flight: Arc<Semaphore>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("device_id", &self.topics.device_id())
            .field("available_slots", &self.in_flight.available_permits())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        channel: Arc<dyn Channel>,
        topics: Arc<TopicTable>,
        handlers: Arc<HandlerRegistry>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            channel,
            topics,
            handlers,
            reporter,
            in_flight: Arc::new(Semaphore::new(MAX_IN_FLIGHT)),
        }
    }

    /// Cap the number of envelopes [`Dispatcher::spawn_handle`] runs at once.
    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.in_flight = Arc::new(Semaphore::new(limit.max(1)));
        self
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    pub fn topics(&self) -> &TopicTable {
        &self.topics
    }

    /// Subscribe to every inbound request topic of this device.
    pub async fn subscribe_inbound(&self) -> DeviceResult<()> {
        for kind in TopicKind::INBOUND {
            let filter = self.topics.get(kind);
            self.channel
                .subscribe(filter, SUBSCRIBE_QOS)
                .await
                .map_err(|e| DeviceError::Subscription(format!("{filter}: {e}")))?;
            tracing::debug!(topic = %filter, "subscribed");
        }
        Ok(())
    }

    /// Dispatch one envelope, logging and reporting any failure.
    ///
    /// Failures never escape: the next envelope is processed normally.
    pub async fn handle(&self, envelope: InboundEnvelope) {
        let topic = envelope.topic.clone();
        match self.dispatch(envelope).await {
            Ok(Dispatched::Replied { kind, topic: reply }) => {
                tracing::debug!(request = %topic, reply = %reply, kind = %kind, "reply published");
            }
            Ok(Dispatched::Notified { handlers }) => {
                tracing::debug!(topic = %topic, handlers, "message delivered");
            }
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "dispatch failed");
                self.reporter.report(&e);
            }
        }
    }

    /// Run [`Dispatcher::handle`] for `envelope` in its own task.
    ///
    /// Waits for a free slot when the in-flight limit is reached, which
    /// holds back the caller (the event loop) under a burst. Envelopes run
    /// concurrently, so their handlers may complete in any order, even for
    /// envelopes from the same subscription.
    pub async fn spawn_handle(&self, envelope: InboundEnvelope) {
        let Ok(slot) = Arc::clone(&self.in_flight).acquire_owned().await else {
            tracing::error!(topic = %envelope.topic, "dispatch limiter closed, dropping envelope");
            return;
        };
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.handle(envelope).await;
            drop(slot);
        });
    }

    /// Dispatch one envelope and return its outcome.
    pub async fn dispatch(&self, envelope: InboundEnvelope) -> DeviceResult<Dispatched> {
        let InboundEnvelope { topic, payload } = envelope;

        let Some(kind) = self.topics.classify(&topic) else {
            return Err(DeviceError::UnknownTopic(topic));
        };

        let event = DomainEvent::decode(kind, &payload).map_err(|e| DeviceError::Decode {
            kind,
            topic: topic.clone(),
            reason: e.to_string(),
        })?;

        match event {
            DomainEvent::Message(message) => Ok(self.notify(&message)),
            DomainEvent::Command(command) => {
                let chain = self.handlers.command_handlers();
                let approved = approve_all(&chain, |h| h.on_command(&command));
                tracing::info!(
                    command = %command.command_name,
                    handlers = chain.len(),
                    approved,
                    "command handled"
                );
                self.reply(kind, &topic, &Acknowledgement::from_verdict(approved))
                    .await
            }
            DomainEvent::PropertiesSet(request) => {
                let chain = self.handlers.properties_set_handlers();
                let approved = approve_all(&chain, |h| h.on_properties_set(&request));
                tracing::info!(
                    services = request.services.len(),
                    handlers = chain.len(),
                    approved,
                    "properties set handled"
                );
                self.reply(kind, &topic, &Acknowledgement::from_verdict(approved))
                    .await
            }
            DomainEvent::PropertiesQuery(request) => {
                let responder = self
                    .handlers
                    .properties_query_handler()
                    .ok_or(DeviceError::MissingQueryResponder)?;
                let body = responder.on_properties_query(&request);
                tracing::info!(
                    service_id = ?request.service_id,
                    services = body.services.len(),
                    "properties query answered"
                );
                self.reply(kind, &topic, &body).await
            }
        }
    }

    fn notify(&self, message: &DeviceMessage) -> Dispatched {
        let chain = self.handlers.message_handlers();
        for handler in &chain {
            handler.on_message(message);
        }
        Dispatched::Notified {
            handlers: chain.len(),
        }
    }

    async fn reply<T: Serialize>(
        &self,
        request_kind: TopicKind,
        request_topic: &str,
        body: &T,
    ) -> DeviceResult<Dispatched> {
        let topic = self
            .topics
            .reply_topic(request_kind, request_topic)
            .ok_or_else(|| DeviceError::Uncorrelated(request_topic.to_string()))?;

        publish_json(self.channel.as_ref(), &topic, body, REPLY_QOS)
            .await
            .map_err(|e| DeviceError::from_publish(&topic, e))?;

        Ok(Dispatched::Replied {
            kind: request_kind,
            topic,
        })
    }
}

/// Logical AND over every handler's verdict, evaluating all of them.
///
/// An empty chain approves.
fn approve_all<H: ?Sized>(chain: &[Arc<H>], mut verdict: impl FnMut(&H) -> bool) -> bool {
    let mut approved = true;
    for handler in chain {
        approved &= verdict(&**handler);
    }
    approved
}
