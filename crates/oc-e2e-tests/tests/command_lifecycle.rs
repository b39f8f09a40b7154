//! End-to-end tests for platform commands: request in, acknowledgement out.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use helpers::TestHarness;
use oc_device::Dispatched;
use oc_protocol::{Command, TopicKind};
use rumqttc::QoS;
use serde_json::json;

const REBOOT: &[u8] = br#"{"command_name":"reboot","paras":{}}"#;

#[tokio::test]
async fn e2e_reboot_command_acknowledged_on_correlated_topic() {
    let harness = TestHarness::new().await;
    harness
        .session
        .add_command_handler(|c: &Command| c.command_name == "reboot");

    harness.deliver(TopicKind::CommandDown, "_r1", REBOOT).await;

    let published = harness.mqtt.published();
    assert_eq!(published.len(), 1);
    assert_eq!(
        published[0].topic,
        "$oc/devices/dev1/sys/commands/response/request_id=_r1"
    );
    assert_eq!(published[0].qos, QoS::AtLeastOnce);
    assert_eq!(
        published[0].json(),
        json!({"result_code": 0, "result_desc": "SUCCESS"})
    );
    assert!(harness.reporter.is_empty());
}

#[tokio::test]
async fn e2e_command_paras_reach_handler() {
    let harness = TestHarness::new().await;
    harness.session.add_command_handler(|c: &Command| {
        c.command_name == "set_interval" && c.paras["seconds"] == 30
    });

    harness
        .deliver(
            TopicKind::CommandDown,
            "abc",
            br#"{"command_name":"set_interval","service_id":"Config","paras":{"seconds":30}}"#,
        )
        .await;

    let reply = harness.reply_for(TopicKind::CommandDown, "abc").unwrap();
    assert_eq!(reply.json()["result_code"], 0);
}

#[tokio::test]
async fn e2e_mixed_verdicts_fail_command() {
    let harness = TestHarness::new().await;
    for verdict in [true, false, true] {
        harness.session.add_command_handler(move |_: &Command| verdict);
    }

    harness.deliver(TopicKind::CommandDown, "r2", REBOOT).await;

    let reply = harness.reply_for(TopicKind::CommandDown, "r2").unwrap();
    assert_eq!(reply.json(), json!({"result_code": 1, "result_desc": "FAILED"}));
}

#[tokio::test]
async fn e2e_every_handler_runs_after_rejection() {
    let harness = TestHarness::new().await;
    let calls = Arc::new(AtomicUsize::new(0));
    for verdict in [false, true, true] {
        let calls = Arc::clone(&calls);
        harness.session.add_command_handler(move |_: &Command| {
            calls.fetch_add(1, Ordering::SeqCst);
            verdict
        });
    }

    harness.deliver(TopicKind::CommandDown, "r3", REBOOT).await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let reply = harness.reply_for(TopicKind::CommandDown, "r3").unwrap();
    assert_eq!(reply.json()["result_desc"], "FAILED");
}

#[tokio::test]
async fn e2e_no_command_handlers_acknowledges_success() {
    let harness = TestHarness::new().await;

    let outcome = harness
        .dispatch(TopicKind::CommandDown, "r4", REBOOT)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Dispatched::Replied {
            kind: TopicKind::CommandDown,
            topic: "$oc/devices/dev1/sys/commands/response/request_id=r4".into(),
        }
    );
    let reply = harness.reply_for(TopicKind::CommandDown, "r4").unwrap();
    assert_eq!(reply.json()["result_desc"], "SUCCESS");
}

#[tokio::test]
async fn e2e_each_request_answered_on_its_own_token() {
    let harness = TestHarness::new().await;
    harness.session.add_command_handler(|_: &Command| true);

    for id in ["a1", "b2", "c3"] {
        harness.deliver(TopicKind::CommandDown, id, REBOOT).await;
    }

    for id in ["a1", "b2", "c3"] {
        assert!(harness.reply_for(TopicKind::CommandDown, id).is_some());
    }
    assert_eq!(harness.mqtt.published().len(), 3);
}
