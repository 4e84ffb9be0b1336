//! # Device identity and topic namespace.
//!
//! Topics are namespaced by a stable device identity:
//! `irrigation/v1/<device_id>/<suffix>` for everything the device owns, and
//! `irrigation/v1/<mac>/command` for the inbound command channel — MAC-keyed
//! so the cloud can address a device before its stable id is known to it.
//!
//! Inbound topic strings are parsed **once** into the closed [`TopicKind`]
//! set; downstream dispatch matches exhaustively on the tag.

/// Topic namespace prefix shared by the whole fleet.
pub const TOPIC_PREFIX: &str = "irrigation/v1";

/// Stable identity of this device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Stable device id (typically derived from a hardware unique id).
    pub device_id: String,
    /// Network MAC address, hex, lowercase, no separators.
    pub mac: String,
}

/// Classification of an inbound topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    /// Schedule config update (`<device_id>/update`).
    Config,
    /// Remote command (`<mac>/command`).
    Command,
    /// Anything else; logged and ignored.
    Unknown,
}

impl DeviceIdentity {
    pub fn new(device_id: impl Into<String>, mac: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            mac: mac.into(),
        }
    }

    /// Device-keyed topic: `irrigation/v1/<device_id>/<suffix>`.
    pub fn topic(&self, suffix: &str) -> String {
        format!("{TOPIC_PREFIX}/{}/{suffix}", self.device_id)
    }

    pub fn status_topic(&self) -> String {
        self.topic("status")
    }

    pub fn heartbeat_topic(&self) -> String {
        self.topic("heartbeat")
    }

    pub fn logs_topic(&self) -> String {
        self.topic("logs")
    }

    pub fn config_topic(&self) -> String {
        self.topic("update")
    }

    /// MAC-keyed command topic: `irrigation/v1/<mac>/command`.
    pub fn command_topic(&self) -> String {
        format!("{TOPIC_PREFIX}/{}/command", self.mac)
    }

    /// Parses an inbound topic into the closed tag set.
    pub fn classify(&self, topic: &str) -> TopicKind {
        if topic == self.config_topic() {
            TopicKind::Config
        } else if topic == self.command_topic() {
            TopicKind::Command
        } else {
            TopicKind::Unknown
        }
    }
}
