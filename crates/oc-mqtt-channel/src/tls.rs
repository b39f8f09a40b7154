//! Transport selection for broker connections.
//!
//! TLS sessions authenticate the broker only; the device authenticates
//! with its derived password, so no client certificate is loaded.

use rumqttc::{TlsConfiguration, Transport};

use crate::config::{BrokerEndpoint, MqttConfig};
use crate::error::{MqttError, MqttResult};

/// Build the transport for `endpoint`.
///
/// With a configured CA certificate the broker is verified against it;
/// otherwise the default root store is used.
pub fn load_transport(config: &MqttConfig, endpoint: &BrokerEndpoint) -> MqttResult<Transport> {
    if !endpoint.use_tls {
        return Ok(Transport::Tcp);
    }

    let Some(ca_path) = config.ca_cert_path.as_deref() else {
        return Ok(Transport::tls_with_default_config());
    };

    let ca = std::fs::read(ca_path)
        .map_err(|e| MqttError::Tls(format!("failed to read CA cert '{ca_path}': {e}")))?;

    Ok(Transport::tls_with_config(TlsConfiguration::Simple {
        ca,
        alpn: None,
        client_auth: None,
    }))
}
