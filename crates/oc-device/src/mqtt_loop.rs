//! MQTT event loop driver.
//!
//! `init` drives the loop itself through the connect and subscribe
//! handshakes, then hands it to [`run`], which keeps polling in a
//! background task and spawns one dispatch per incoming publish, up to the
//! dispatcher's in-flight limit.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rumqttc::{
    ConnectReturnCode, ConnectionError, Event, EventLoop, Outgoing, Packet, SubscribeReasonCode,
};

use crate::dispatch::Dispatcher;
use crate::error::{DeviceError, DeviceResult};

/// Pause before polling again after an event loop error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Poll until the broker accepts the connection.
pub async fn await_connack(eventloop: &mut EventLoop, timeout: Duration) -> DeviceResult<()> {
    let handshake = async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    return match ack.code {
                        ConnectReturnCode::Success => Ok(()),
                        code => Err(DeviceError::Connection(format!(
                            "broker refused connection: {code:?}"
                        ))),
                    };
                }
                Ok(_) => {}
                Err(e) => return Err(DeviceError::Connection(e.to_string())),
            }
        }
    };

    tokio::time::timeout(timeout, handshake)
        .await
        .map_err(|_| {
            DeviceError::Connection(format!("no CONNACK within {}s", timeout.as_secs()))
        })?
}

/// Poll until `expected` subscriptions have been acknowledged.
///
/// Publishes that arrive during the handshake are dispatched normally.
pub async fn confirm_subscriptions(
    eventloop: &mut EventLoop,
    expected: usize,
    timeout: Duration,
    dispatcher: &Dispatcher,
) -> DeviceResult<()> {
    let handshake = async {
        let mut acknowledged = 0;
        while acknowledged < expected {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::SubAck(suback))) => {
                    if suback
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure))
                    {
                        return Err(DeviceError::Subscription(format!(
                            "broker rejected subscription (pkid {})",
                            suback.pkid
                        )));
                    }
                    acknowledged += suback.return_codes.len();
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    dispatcher.spawn_handle(publish.into()).await;
                }
                Ok(_) => {}
                Err(e) => return Err(DeviceError::Subscription(e.to_string())),
            }
        }
        Ok(())
    };

    tokio::time::timeout(timeout, handshake)
        .await
        .map_err(|_| {
            DeviceError::Subscription(format!("no SUBACK within {}s", timeout.as_secs()))
        })?
}

/// Drive the event loop until the session disconnects.
///
/// Keeps `connected` in step with the transport. After a reconnect without
/// a persisted broker session the inbound topics are subscribed again.
///
/// Each publish is dispatched in its own task, so replies are not ordered
/// even for requests that arrived on the same subscription. Polling pauses
/// while the dispatcher's in-flight limit is exhausted.
pub async fn run(mut eventloop: EventLoop, dispatcher: Dispatcher, connected: Arc<AtomicBool>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                dispatcher.spawn_handle(publish.into()).await;
            }
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                connected.store(true, Ordering::Release);
                tracing::info!(
                    session_present = ack.session_present,
                    "MQTT reconnected"
                );
                if !ack.session_present {
                    // Subscribing waits on the request queue this loop drains.
                    let dispatcher = dispatcher.clone();
                    tokio::spawn(async move {
                        if let Err(e) = dispatcher.subscribe_inbound().await {
                            tracing::error!(error = %e, "resubscribe failed");
                        }
                    });
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                connected.store(false, Ordering::Release);
                tracing::warn!("broker closed the session");
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                connected.store(false, Ordering::Release);
                tracing::info!("MQTT session closed");
                break;
            }
            Ok(_) => {}
            Err(ConnectionError::RequestsDone) => {
                connected.store(false, Ordering::Release);
                tracing::debug!("MQTT client dropped, stopping event loop");
                break;
            }
            Err(e) => {
                connected.store(false, Ordering::Release);
                tracing::error!(error = %e, "MQTT event loop error, reconnecting in 5s");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
