//! MQTT topic builders and parsers for the `$oc` device topic hierarchy.
//!
//! Topic structure:
//! ```text
//! $oc/devices/{device_id}/sys/messages/down
//! $oc/devices/{device_id}/sys/messages/up
//! $oc/devices/{device_id}/sys/commands/#
//! $oc/devices/{device_id}/sys/commands/response/request_id={request_id}
//! $oc/devices/{device_id}/sys/properties/report
//! $oc/devices/{device_id}/sys/properties/set/#
//! $oc/devices/{device_id}/sys/properties/set/response/request_id={request_id}
//! $oc/devices/{device_id}/sys/properties/get/#
//! $oc/devices/{device_id}/sys/properties/get/response/request_id={request_id}
//! ```
//!
//! The platform appends `request_id={request_id}` to every command,
//! property-set and property-get request it sends. The device echoes that
//! token back on the matching response topic.

use std::fmt;

/// Placeholder substituted with the device id in every template.
pub const DEVICE_ID_PLACEHOLDER: &str = "{device_id}";

/// Delimiter preceding the correlation token in request and reply topics.
pub const REQUEST_ID_DELIMITER: &str = "request_id=";

/// Logical topic categories of the device protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    MessageDown,
    CommandDown,
    CommandResponse,
    MessageUp,
    PropertiesUp,
    PropertiesSetRequest,
    PropertiesSetResponse,
    PropertiesQueryRequest,
    PropertiesQueryResponse,
}

impl TopicKind {
    /// Every kind, in table order.
    pub const ALL: [TopicKind; 9] = [
        TopicKind::MessageDown,
        TopicKind::CommandDown,
        TopicKind::CommandResponse,
        TopicKind::MessageUp,
        TopicKind::PropertiesUp,
        TopicKind::PropertiesSetRequest,
        TopicKind::PropertiesSetResponse,
        TopicKind::PropertiesQueryRequest,
        TopicKind::PropertiesQueryResponse,
    ];

    /// Kinds the device subscribes to.
    pub const INBOUND: [TopicKind; 4] = [
        TopicKind::CommandDown,
        TopicKind::MessageDown,
        TopicKind::PropertiesSetRequest,
        TopicKind::PropertiesQueryRequest,
    ];

    /// Platform-defined template with a `{device_id}` placeholder.
    pub fn template(self) -> &'static str {
        match self {
            TopicKind::MessageDown => "$oc/devices/{device_id}/sys/messages/down",
            TopicKind::CommandDown => "$oc/devices/{device_id}/sys/commands/#",
            TopicKind::CommandResponse => {
                "$oc/devices/{device_id}/sys/commands/response/request_id="
            }
            TopicKind::MessageUp => "$oc/devices/{device_id}/sys/messages/up",
            TopicKind::PropertiesUp => "$oc/devices/{device_id}/sys/properties/report",
            TopicKind::PropertiesSetRequest => "$oc/devices/{device_id}/sys/properties/set/#",
            TopicKind::PropertiesSetResponse => {
                "$oc/devices/{device_id}/sys/properties/set/response/request_id="
            }
            TopicKind::PropertiesQueryRequest => "$oc/devices/{device_id}/sys/properties/get/#",
            TopicKind::PropertiesQueryResponse => {
                "$oc/devices/{device_id}/sys/properties/get/response/request_id="
            }
        }
    }

    /// The correlated reply kind for a request kind.
    ///
    /// `MessageDown` is a one-way notification and has no reply.
    pub fn reply_kind(self) -> Option<TopicKind> {
        match self {
            TopicKind::CommandDown => Some(TopicKind::CommandResponse),
            TopicKind::PropertiesSetRequest => Some(TopicKind::PropertiesSetResponse),
            TopicKind::PropertiesQueryRequest => Some(TopicKind::PropertiesQueryResponse),
            _ => None,
        }
    }

    /// Whether the device subscribes to this kind.
    pub fn is_inbound(self) -> bool {
        Self::INBOUND.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TopicKind::MessageDown => "message_down",
            TopicKind::CommandDown => "command_down",
            TopicKind::CommandResponse => "command_response",
            TopicKind::MessageUp => "message_up",
            TopicKind::PropertiesUp => "properties_up",
            TopicKind::PropertiesSetRequest => "properties_set_request",
            TopicKind::PropertiesSetResponse => "properties_set_response",
            TopicKind::PropertiesQueryRequest => "properties_query_request",
            TopicKind::PropertiesQueryResponse => "properties_query_response",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TopicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Topic building ───

/// Substitute `device_id` into the template for `kind`.
pub fn topic(kind: TopicKind, device_id: &str) -> String {
    kind.template().replace(DEVICE_ID_PLACEHOLDER, device_id)
}

/// Extract the correlation token from an inbound request topic.
///
/// Returns everything after the last `request_id=` segment, or an empty
/// string when the topic carries no token.
pub fn correlation_token(topic: &str) -> &str {
    topic
        .rsplit_once(REQUEST_ID_DELIMITER)
        .map(|(_, token)| token)
        .unwrap_or("")
}

// ─── Device-bound table ───

/// Concrete topics for one device, built once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTable {
    device_id: String,
    topics: [String; 9],
}

impl TopicTable {
    pub fn new(device_id: impl Into<String>) -> Self {
        let device_id = device_id.into();
        let topics = TopicKind::ALL.map(|kind| topic(kind, &device_id));
        Self { device_id, topics }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// The concrete topic (or subscription filter) for `kind`.
    pub fn get(&self, kind: TopicKind) -> &str {
        &self.topics[kind.index()]
    }

    /// Reply topic for a request that arrived on `inbound_topic`.
    ///
    /// `None` when `request_kind` has no reply or the inbound topic carries
    /// no correlation token.
    pub fn reply_topic(&self, request_kind: TopicKind, inbound_topic: &str) -> Option<String> {
        let reply_kind = request_kind.reply_kind()?;
        let token = correlation_token(inbound_topic);
        if token.is_empty() {
            return None;
        }
        Some(format!("{}{token}", self.get(reply_kind)))
    }

    /// Map an inbound topic onto the subscription kind it arrived under.
    ///
    /// Topics under a reply prefix are rejected: `commands/#` also matches
    /// `commands/response/...`, which is never a request.
    pub fn classify(&self, topic: &str) -> Option<TopicKind> {
        TopicKind::INBOUND.into_iter().find(|&kind| {
            let filter = self.get(kind);
            let Some(prefix) = filter.strip_suffix('#') else {
                return topic == filter;
            };
            if !topic.starts_with(prefix) {
                return false;
            }
            match kind.reply_kind() {
                Some(reply) => {
                    let reply_prefix = self.get(reply).trim_end_matches(REQUEST_ID_DELIMITER);
                    !topic.starts_with(reply_prefix)
                }
                None => true,
            }
        })
    }
}
