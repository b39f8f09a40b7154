//! Device session: the public entry point.
//!
//! A `Session` owns one device's identity, topic table and handler chains.
//! Several sessions can run side by side in one process without sharing
//! any state.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use oc_mqtt_channel::{Channel, MqttChannel, MqttConfig, QoS, publish_json};
use oc_protocol::{
    Credentials, DeviceIdentity, DeviceMessage, PropertiesReport, TopicKind, TopicTable,
};

use crate::config::DeviceConfig;
use crate::dispatch::Dispatcher;
use crate::error::{DeviceError, DeviceResult};
use crate::handlers::{
    CommandHandler, HandlerRegistry, MessageHandler, PropertiesQueryHandler, PropertiesSetHandler,
};
use crate::mqtt_loop;
use crate::report::{ErrorReporter, NoopReporter};

/// Delivery assurance for device-initiated messages and reports.
pub const UPLINK_QOS: QoS = QoS::ExactlyOnce;

const DRIVER_SHUTDOWN: Duration = Duration::from_secs(2);

pub struct Session {
    identity: DeviceIdentity,
    mqtt: MqttConfig,
    topics: Arc<TopicTable>,
    handlers: Arc<HandlerRegistry>,
    reporter: Arc<dyn ErrorReporter>,
    link: RwLock<Option<Arc<dyn Channel>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub fn new(identity: DeviceIdentity, mqtt: MqttConfig) -> Self {
        let topics = Arc::new(TopicTable::new(identity.id()));
        Self {
            identity,
            mqtt,
            topics,
            handlers: Arc::new(HandlerRegistry::new()),
            reporter: Arc::new(NoopReporter),
            link: RwLock::new(None),
            driver: Mutex::new(None),
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(config.identity(), config.mqtt.clone())
    }

    /// Route per-message failures to `reporter` in addition to the log.
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn device_id(&self) -> &str {
        self.identity.id()
    }

    pub fn topics(&self) -> &TopicTable {
        &self.topics
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Connect to the broker and subscribe to every inbound request topic.
    ///
    /// Credentials are derived from the device secret and the current hour.
    /// Returns once the broker has acknowledged the connection and all
    /// subscriptions; inbound requests are dispatched from then on.
    pub async fn init(&self) -> DeviceResult<()> {
        let credentials = Credentials::issue(&self.identity, Utc::now())
            .map_err(|e| DeviceError::Connection(e.to_string()))?;
        let (channel, mut eventloop) = MqttChannel::new(&self.mqtt, &credentials)
            .map_err(|e| DeviceError::Connection(e.to_string()))?;
        let connected = channel.connection_flag();
        let timeout = Duration::from_secs(self.mqtt.connect_timeout_secs);

        tracing::info!(
            device_id = %self.identity.id(),
            server = %self.mqtt.server,
            client_id = %credentials.client_id,
            "connecting"
        );

        if let Err(e) = mqtt_loop::await_connack(&mut eventloop, timeout).await {
            tracing::error!(device_id = %self.identity.id(), error = %e, "connect failed");
            return Err(e);
        }
        connected.store(true, Ordering::Release);

        let dispatcher = match self.attach(Arc::new(channel)).await {
            Ok(dispatcher) => dispatcher,
            Err(e) => {
                connected.store(false, Ordering::Release);
                return Err(e);
            }
        };

        if let Err(e) = mqtt_loop::confirm_subscriptions(
            &mut eventloop,
            TopicKind::INBOUND.len(),
            timeout,
            &dispatcher,
        )
        .await
        {
            tracing::error!(device_id = %self.identity.id(), error = %e, "subscribe failed");
            self.take_link();
            connected.store(false, Ordering::Release);
            return Err(e);
        }

        let handle = tokio::spawn(mqtt_loop::run(eventloop, dispatcher, connected));
        if let Some(previous) = self.lock_driver().replace(handle) {
            previous.abort();
        }

        tracing::info!(device_id = %self.identity.id(), "session ready");
        Ok(())
    }

    /// Use `channel` as this session's transport.
    ///
    /// Subscribes to the inbound request topics and returns the dispatcher
    /// the caller must feed inbound envelopes into. The channel only
    /// becomes the session's link once every subscription succeeded.
    pub async fn attach(&self, channel: Arc<dyn Channel>) -> DeviceResult<Dispatcher> {
        let dispatcher = Dispatcher::new(
            Arc::clone(&channel),
            Arc::clone(&self.topics),
            Arc::clone(&self.handlers),
            Arc::clone(&self.reporter),
        );
        dispatcher.subscribe_inbound().await?;
        *self.link.write().unwrap_or_else(PoisonError::into_inner) = Some(channel);
        Ok(dispatcher)
    }

    /// Current transport connectivity; false before `init` or `attach`.
    pub fn is_connected(&self) -> bool {
        self.current_link().is_some_and(|c| c.is_connected())
    }

    /// Close the broker session and stop dispatching.
    pub async fn disconnect(&self) -> DeviceResult<()> {
        let link = self.take_link();
        let driver = self.lock_driver().take();

        let closed = match link {
            Some(channel) => channel
                .disconnect()
                .await
                .map_err(|e| DeviceError::Connection(e.to_string())),
            None => Ok(()),
        };
        // The driver exits once it has flushed DISCONNECT.
        if let Some(mut driver) = driver {
            if tokio::time::timeout(DRIVER_SHUTDOWN, &mut driver).await.is_err() {
                driver.abort();
            }
        }
        closed?;
        tracing::info!(device_id = %self.identity.id(), "disconnected");
        Ok(())
    }

    // ── Uplink ────────────────────────────────────────────────

    /// Publish a device message on the message-up topic.
    pub async fn send_message(&self, message: &DeviceMessage) -> DeviceResult<()> {
        self.publish_uplink(TopicKind::MessageUp, message).await
    }

    /// Publish property values on the properties-report topic.
    pub async fn report_properties(&self, report: &PropertiesReport) -> DeviceResult<()> {
        self.publish_uplink(TopicKind::PropertiesUp, report).await
    }

    async fn publish_uplink<T: serde::Serialize>(
        &self,
        kind: TopicKind,
        body: &T,
    ) -> DeviceResult<()> {
        let channel = self.current_link().ok_or(DeviceError::NotConnected)?;
        let topic = self.topics.get(kind);

        publish_json(channel.as_ref(), topic, body, UPLINK_QOS)
            .await
            .map_err(|e| {
                let err = DeviceError::from_publish(topic, e);
                tracing::warn!(device_id = %self.identity.id(), error = %err, "uplink failed");
                err
            })
    }

    // ── Handler registration ──────────────────────────────────

    pub fn add_message_handler(&self, handler: impl MessageHandler + 'static) {
        self.handlers.add_message_handler(handler);
    }

    pub fn add_command_handler(&self, handler: impl CommandHandler + 'static) {
        self.handlers.add_command_handler(handler);
    }

    pub fn add_properties_set_handler(&self, handler: impl PropertiesSetHandler + 'static) {
        self.handlers.add_properties_set_handler(handler);
    }

    /// Install the property query responder; the last one set wins.
    pub fn set_properties_query_handler(&self, handler: impl PropertiesQueryHandler + 'static) {
        self.handlers.set_properties_query_handler(handler);
    }

    // ── Internals ─────────────────────────────────────────────

    fn current_link(&self) -> Option<Arc<dyn Channel>> {
        self.link
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn take_link(&self) -> Option<Arc<dyn Channel>> {
        self.link
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn lock_driver(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(driver) = self.lock_driver().take() {
            driver.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oc_mqtt_channel::MockChannel;
    use oc_protocol::{Command, ServiceProperty};
    use serde_json::json;

    fn session() -> Session {
        Session::new(
            DeviceIdentity::new("dev1", "s3cret"),
            MqttConfig::new("tcp://127.0.0.1:1"),
        )
    }

    #[test]
    fn not_connected_before_init() {
        assert!(!session().is_connected());
    }

    #[tokio::test]
    async fn attach_subscribes_all_inbound_topics() {
        let s = session();
        let mock = Arc::new(MockChannel::new());
        s.attach(mock.clone()).await.unwrap();

        let subs = mock.subscriptions();
        assert_eq!(subs.len(), 4);
        assert!(subs.iter().all(|(_, qos)| *qos == QoS::ExactlyOnce));
        assert!(s.is_connected());
    }

    #[tokio::test]
    async fn failed_subscription_leaves_session_unlinked() {
        let s = session();
        let mock = Arc::new(MockChannel::new());
        mock.fail_subscribes(true);

        let err = s.attach(mock.clone()).await.unwrap_err();
        assert!(matches!(err, DeviceError::Subscription(_)));
        assert!(!s.is_connected());
        assert!(matches!(
            s.send_message(&DeviceMessage::new("x")).await,
            Err(DeviceError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn connectivity_follows_transport() {
        let s = session();
        let mock = Arc::new(MockChannel::new());
        s.attach(mock.clone()).await.unwrap();

        mock.set_connected(false);
        assert!(!s.is_connected());
        mock.set_connected(true);
        assert!(s.is_connected());
    }

    #[tokio::test]
    async fn send_message_publishes_to_message_up() {
        let s = session();
        let mock = Arc::new(MockChannel::new());
        s.attach(mock.clone()).await.unwrap();

        s.send_message(&DeviceMessage::new(json!({"temp": 21})))
            .await
            .unwrap();

        let msg = mock.last_published().unwrap();
        assert_eq!(msg.topic, "$oc/devices/dev1/sys/messages/up");
        assert_eq!(msg.qos, QoS::ExactlyOnce);
        assert_eq!(msg.json(), json!({"content": {"temp": 21}}));
    }

    #[tokio::test]
    async fn report_properties_publishes_to_report_topic() {
        let s = session();
        let mock = Arc::new(MockChannel::new());
        s.attach(mock.clone()).await.unwrap();

        let report = PropertiesReport::new(vec![ServiceProperty::new(
            "Battery",
            json!({"level": 87}),
        )]);
        s.report_properties(&report).await.unwrap();

        let msg = mock.last_published().unwrap();
        assert_eq!(msg.topic, "$oc/devices/dev1/sys/properties/report");
        assert_eq!(
            msg.json(),
            json!({"services": [{"service_id": "Battery", "properties": {"level": 87}}]})
        );
    }

    #[tokio::test]
    async fn uplink_publish_failure_is_returned() {
        let s = session();
        let mock = Arc::new(MockChannel::new());
        s.attach(mock.clone()).await.unwrap();
        mock.fail_publishes(true);

        let err = s
            .report_properties(&PropertiesReport::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::Publish { ref topic, .. } if topic.ends_with("/properties/report")));
    }

    #[tokio::test]
    async fn handlers_registered_after_attach_are_used() {
        let s = session();
        let mock = Arc::new(MockChannel::new());
        let dispatcher = s.attach(mock.clone()).await.unwrap();

        s.add_command_handler(|_: &Command| false);
        dispatcher
            .dispatch(oc_mqtt_channel::InboundEnvelope::new(
                "$oc/devices/dev1/sys/commands/request_id=7",
                br#"{"command_name":"reboot"}"#.to_vec(),
            ))
            .await
            .unwrap();

        assert_eq!(mock.last_published().unwrap().json()["result_desc"], "FAILED");
    }

    #[tokio::test]
    async fn disconnect_clears_link() {
        let s = session();
        let mock = Arc::new(MockChannel::new());
        s.attach(mock.clone()).await.unwrap();

        s.disconnect().await.unwrap();
        assert!(!s.is_connected());
        assert!(!mock.is_connected());
        assert!(matches!(
            s.send_message(&DeviceMessage::new("bye")).await,
            Err(DeviceError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn init_reports_unreachable_broker() {
        let mut mqtt = MqttConfig::new("tcp://127.0.0.1:1");
        mqtt.connect_timeout_secs = 2;
        let s = Session::new(DeviceIdentity::new("dev1", "s3cret"), mqtt);

        let err = s.init().await.unwrap_err();
        assert!(matches!(err, DeviceError::Connection(_)));
        assert!(!s.is_connected());
    }

    #[tokio::test]
    async fn init_rejects_invalid_broker_url() {
        let s = Session::new(
            DeviceIdentity::new("dev1", "s3cret"),
            MqttConfig::new("ftp://broker"),
        );
        assert!(matches!(s.init().await, Err(DeviceError::Connection(_))));
    }

    #[test]
    fn sessions_do_not_share_handlers() {
        let a = session();
        let b = Session::new(
            DeviceIdentity::new("dev2", "other"),
            MqttConfig::new("tcp://localhost"),
        );
        a.add_command_handler(|_: &Command| true);
        assert_eq!(a.handlers.command_handlers().len(), 1);
        assert!(b.handlers.command_handlers().is_empty());
        assert_eq!(b.topics().device_id(), "dev2");
    }
}
