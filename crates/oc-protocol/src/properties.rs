use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event time format expected by the platform (`yyyyMMdd'T'HHmmss'Z'`).
pub const EVENT_TIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Property values of one service in the product model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceProperty {
    pub service_id: String,
    #[serde(default)]
    pub properties: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<String>,
}

impl ServiceProperty {
    pub fn new(service_id: impl Into<String>, properties: serde_json::Value) -> Self {
        Self {
            service_id: service_id.into(),
            properties,
            event_time: None,
        }
    }

    /// Stamp the property values with the time they were sampled.
    pub fn with_event_time(mut self, at: DateTime<Utc>) -> Self {
        self.event_time = Some(at.format(EVENT_TIME_FORMAT).to_string());
        self
    }
}

/// Property values reported by the device (uplink).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertiesReport {
    pub services: Vec<ServiceProperty>,
}

impl PropertiesReport {
    pub fn new(services: Vec<ServiceProperty>) -> Self {
        Self { services }
    }
}

/// Reply body for a property query; same shape as a report.
pub type PropertiesQueryResponse = PropertiesReport;

/// Platform request to write device properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertiesSetRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_device_id: Option<String>,
    pub services: Vec<ServiceProperty>,
}

/// Platform request to read device properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertiesQueryRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_device_id: Option<String>,
    /// Restricts the query to one service; all services when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
}
