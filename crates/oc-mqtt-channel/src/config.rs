use serde::Deserialize;
use url::Url;

use crate::error::{MqttError, MqttResult};

/// MQTT connection configuration, loadable from TOML.
///
/// Client id, username and password are not configured here: they are
/// derived from the device identity for every session.
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    /// Broker URL, e.g. `tls://iot-mqtts.cn-north-4.myhuaweicloud.com:8883`.
    /// `tcp://` and `mqtt://` connect plaintext; `tls://`, `ssl://` and
    /// `mqtts://` connect over TLS.
    pub server: String,
    /// Path to a CA certificate (PEM). Default root store when absent.
    #[serde(default)]
    pub ca_cert_path: Option<String>,
    /// Keep-alive interval in seconds.
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u16,
    /// How long `init` waits for the broker to acknowledge connect/subscribe.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Capacity of the client request queue.
    #[serde(default = "default_request_capacity")]
    pub request_channel_capacity: usize,
}

fn default_keepalive() -> u16 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_capacity() -> usize {
    64
}

/// Host, port and transport security resolved from the broker URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

impl MqttConfig {
    /// Config for `server` with every other field at its default.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ca_cert_path: None,
            keepalive_secs: default_keepalive(),
            connect_timeout_secs: default_connect_timeout(),
            request_channel_capacity: default_request_capacity(),
        }
    }

    /// Parse the broker URL into a connectable endpoint.
    pub fn endpoint(&self) -> MqttResult<BrokerEndpoint> {
        let invalid = || MqttError::InvalidBrokerUrl(self.server.clone());
        let url = Url::parse(&self.server).map_err(|_| invalid())?;

        let (use_tls, default_port) = match url.scheme() {
            "tcp" | "mqtt" => (false, 1883),
            "tls" | "ssl" | "mqtts" => (true, 8883),
            _ => return Err(invalid()),
        };
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(invalid)?
            .to_string();

        Ok(BrokerEndpoint {
            host,
            port: url.port().unwrap_or(default_port),
            use_tls,
        })
    }
}
