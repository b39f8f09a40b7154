use serde::{Deserialize, Serialize};

/// Command pushed by the platform on the command-down topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Target (sub-)device; absent when addressed to the connected device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_device_id: Option<String>,
    /// Service the command belongs to in the product model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    pub command_name: String,
    /// Command parameters, shape defined by the product model.
    #[serde(default)]
    pub paras: serde_json::Value,
}

impl Command {
    pub fn new(command_name: impl Into<String>, paras: serde_json::Value) -> Self {
        Self {
            object_device_id: None,
            service_id: None,
            command_name: command_name.into(),
            paras,
        }
    }
}
