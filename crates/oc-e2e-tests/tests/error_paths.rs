//! End-to-end tests for per-message failures: each is reported and the
//! session keeps serving the next request.

mod helpers;

use helpers::TestHarness;
use oc_device::DeviceError;
use oc_protocol::{Command, PropertiesSetRequest, TopicKind};
use oc_mqtt_channel::InboundEnvelope;

const REBOOT: &[u8] = br#"{"command_name":"reboot","paras":{}}"#;

#[tokio::test]
async fn e2e_malformed_command_does_not_block_next() {
    let harness = TestHarness::new().await;
    harness.session.add_command_handler(|_: &Command| true);

    harness
        .deliver(TopicKind::CommandDown, "bad", b"{\"command_name\":")
        .await;
    assert!(harness.mqtt.published().is_empty());
    assert_eq!(
        harness.reporter.count(|e| matches!(
            e,
            DeviceError::Decode {
                kind: TopicKind::CommandDown,
                ..
            }
        )),
        1
    );

    harness.deliver(TopicKind::CommandDown, "good", REBOOT).await;
    let reply = harness.reply_for(TopicKind::CommandDown, "good").unwrap();
    assert_eq!(reply.json()["result_code"], 0);
    assert!(harness.reply_for(TopicKind::CommandDown, "bad").is_none());
}

#[tokio::test]
async fn e2e_set_request_without_services_is_dropped() {
    let harness = TestHarness::new().await;
    harness
        .session
        .add_properties_set_handler(|_: &PropertiesSetRequest| true);

    harness
        .deliver(TopicKind::PropertiesSetRequest, "s1", b"{}")
        .await;

    assert!(harness.mqtt.published().is_empty());
    assert_eq!(harness.reporter.errors().len(), 1);
}

#[tokio::test]
async fn e2e_query_without_responder_is_not_answered() {
    let harness = TestHarness::new().await;

    harness
        .deliver(TopicKind::PropertiesQueryRequest, "g1", br#"{"service_id":"Light"}"#)
        .await;

    assert!(harness.mqtt.published().is_empty());
    assert!(matches!(
        harness.reporter.errors().as_slice(),
        [DeviceError::MissingQueryResponder]
    ));
}

#[tokio::test]
async fn e2e_reply_publish_failure_is_reported_once() {
    let harness = TestHarness::new().await;
    harness.session.add_command_handler(|_: &Command| true);
    harness.mqtt.fail_publishes(true);

    harness.deliver(TopicKind::CommandDown, "r1", REBOOT).await;

    assert!(harness.mqtt.published().is_empty());
    let errors = harness.reporter.errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        DeviceError::Publish { topic, .. } if topic.ends_with("request_id=r1")
    ));

    harness.mqtt.fail_publishes(false);
    harness.deliver(TopicKind::CommandDown, "r2", REBOOT).await;
    assert!(harness.reply_for(TopicKind::CommandDown, "r2").is_some());
}

#[tokio::test]
async fn e2e_request_without_token_is_not_answered() {
    let harness = TestHarness::new().await;
    harness.session.add_command_handler(|_: &Command| true);

    harness
        .dispatcher
        .handle(InboundEnvelope::new(
            "$oc/devices/dev1/sys/commands/reboot",
            REBOOT.to_vec(),
        ))
        .await;

    assert!(harness.mqtt.published().is_empty());
    assert_eq!(
        harness
            .reporter
            .count(|e| matches!(e, DeviceError::Uncorrelated(_))),
        1
    );
}

#[tokio::test]
async fn e2e_own_replies_are_ignored() {
    let harness = TestHarness::new().await;
    harness.session.add_command_handler(|_: &Command| true);

    // A `commands/#` subscription also matches the device's own replies.
    harness
        .dispatcher
        .handle(InboundEnvelope::new(
            "$oc/devices/dev1/sys/commands/response/request_id=r1",
            br#"{"result_code":0,"result_desc":"SUCCESS"}"#.to_vec(),
        ))
        .await;

    assert!(harness.mqtt.published().is_empty());
    assert_eq!(
        harness
            .reporter
            .count(|e| matches!(e, DeviceError::UnknownTopic(_))),
        1
    );
}

#[tokio::test]
async fn e2e_uplink_after_disconnect_fails() {
    let harness = TestHarness::new().await;
    harness.session.disconnect().await.unwrap();

    assert!(!harness.session.is_connected());
    let err = harness
        .session
        .send_message(&oc_protocol::DeviceMessage::new("late"))
        .await
        .unwrap_err();
    assert!(matches!(err, DeviceError::NotConnected));
}
