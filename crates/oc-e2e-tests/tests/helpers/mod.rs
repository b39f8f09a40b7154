//! Shared test harness for E2E integration tests.
//!
//! Wires a real `Session` to a `MockChannel` and plays the platform side:
//! requests are injected as inbound envelopes on the device's topics and
//! replies are read back from the mock.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use oc_device::{Dispatched, Dispatcher, DeviceResult, RecordingReporter, Session};
use oc_mqtt_channel::{InboundEnvelope, MockChannel, MqttConfig, PublishedMessage};
use oc_protocol::{DeviceIdentity, TopicKind};

/// End-to-end harness for one attached device.
pub struct TestHarness {
    pub session: Session,
    pub mqtt: Arc<MockChannel>,
    pub reporter: Arc<RecordingReporter>,
    pub dispatcher: Dispatcher,
}

impl TestHarness {
    /// Device `dev1` with secret `s3cret`, attached to a fresh mock.
    pub async fn new() -> Self {
        Self::for_device("dev1", "s3cret").await
    }

    pub async fn for_device(id: &str, secret: &str) -> Self {
        init_tracing();
        let reporter = Arc::new(RecordingReporter::new());
        let session = Session::new(
            DeviceIdentity::new(id, secret),
            MqttConfig::new("tcp://localhost:1883"),
        )
        .with_reporter(reporter.clone());
        let mqtt = Arc::new(MockChannel::new());
        let dispatcher = session
            .attach(mqtt.clone())
            .await
            .expect("attach to mock channel");

        Self {
            session,
            mqtt,
            reporter,
            dispatcher,
        }
    }

    /// Request topic for `kind` carrying `request_id`.
    pub fn request_topic(&self, kind: TopicKind, request_id: &str) -> String {
        let filter = self.session.topics().get(kind);
        match filter.strip_suffix('#') {
            Some(base) => format!("{base}request_id={request_id}"),
            None => filter.to_string(),
        }
    }

    /// Inject a platform request and run it to completion.
    pub async fn deliver(&self, kind: TopicKind, request_id: &str, payload: &[u8]) {
        let envelope = InboundEnvelope::new(self.request_topic(kind, request_id), payload.to_vec());
        self.dispatcher.handle(envelope).await;
    }

    /// Like `deliver`, but return the outcome instead of reporting it.
    pub async fn dispatch(
        &self,
        kind: TopicKind,
        request_id: &str,
        payload: &[u8],
    ) -> DeviceResult<Dispatched> {
        let envelope = InboundEnvelope::new(self.request_topic(kind, request_id), payload.to_vec());
        self.dispatcher.dispatch(envelope).await
    }

    /// Reply published for `request_id` on the reply topic of `kind`.
    pub fn reply_for(&self, kind: TopicKind, request_id: &str) -> Option<PublishedMessage> {
        let reply_kind = kind.reply_kind()?;
        let topic = format!("{}{request_id}", self.session.topics().get(reply_kind));
        self.mqtt.published_to(&topic).into_iter().last()
    }
}

/// Route `tracing` output to the test writer once per test binary.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "oc_device=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}
