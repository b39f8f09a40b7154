//! Device configuration, loadable from TOML.

use std::fmt;

use serde::Deserialize;

use oc_mqtt_channel::MqttConfig;
use oc_protocol::DeviceIdentity;

use crate::error::{DeviceError, DeviceResult};

/// Top-level configuration for one device session.
#[derive(Clone, Deserialize)]
pub struct DeviceConfig {
    /// Device identifier registered with the platform.
    pub device_id: String,
    /// Device secret used to derive the session password.
    pub secret: String,
    /// MQTT connection settings.
    pub mqtt: MqttConfig,
}

impl DeviceConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate config from a TOML string.
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs the platform could never authenticate.
    pub fn validate(&self) -> DeviceResult<()> {
        if self.device_id.trim().is_empty() {
            return Err(DeviceError::Config("device_id must not be empty".into()));
        }
        if self.secret.is_empty() {
            return Err(DeviceError::Config("secret must not be empty".into()));
        }
        self.mqtt
            .endpoint()
            .map_err(|e| DeviceError::Config(e.to_string()))?;
        Ok(())
    }

    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.device_id.clone(), self.secret.clone())
    }
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("device_id", &self.device_id)
            .field("secret", &"<redacted>")
            .field("mqtt", &self.mqtt)
            .finish()
    }
}
