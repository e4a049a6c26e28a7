//! Side-channel metadata carried by every message.
//!
//! The property bag is typed: each recognized key is a field. Anything a
//! transport or filter adds that has no dedicated field lands in
//! [`MsgProperties::extra_info`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::MessagePtr;

/// Direction/kind tag of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MsgType {
    /// Not yet tagged.
    #[default]
    Invalid,
    /// Received from the socket.
    Received,
    /// Written to the socket.
    Sent,
}

/// Metadata attached to a [`Message`](super::Message).
#[derive(Debug, Clone, Default)]
pub struct MsgProperties {
    /// Direction tag.
    pub msg_type: MsgType,
    /// Milliseconds since the Unix epoch.
    pub timestamp: Option<u64>,
    /// Name of the protocol that produced the message.
    pub protocol_name: String,
    /// Transport-layer view of the frame.
    pub transport_msg: Option<MessagePtr>,
    /// Unmodified frame bytes as a message.
    pub raw_data_msg: Option<MessagePtr>,
    /// Out-of-band extra info rendered as a message.
    pub extra_info_msg: Option<MessagePtr>,
    /// Out-of-band extra info map.
    pub extra_info: Map<String, Value>,
    /// Delay before sending, in milliseconds.
    pub delay: u64,
    /// Display units of `delay`.
    pub delay_units: String,
    /// Interval between repeats, in milliseconds (0 = no repeat).
    pub repeat_duration: u64,
    /// Display units of `repeat_duration`.
    pub repeat_units: String,
    /// Number of sends (0 = infinite when repeating).
    pub repeat_count: u32,
    /// Free-form user comment.
    pub comment: String,
    /// Orchestrator sequence number (0 = not tracked yet).
    pub seq_num: u64,
}

impl MsgProperties {
    /// Copy the properties a send list defines for a message.
    ///
    /// Used when cloning a message for scheduling: delay, repeat settings,
    /// comment and extra info travel with the clone, runtime tags do not.
    pub fn copy_send_settings(&mut self, other: &MsgProperties) {
        self.delay = other.delay;
        self.delay_units = other.delay_units.clone();
        self.repeat_duration = other.repeat_duration;
        self.repeat_units = other.repeat_units.clone();
        self.repeat_count = other.repeat_count;
        self.comment = other.comment.clone();
        self.extra_info = other.extra_info.clone();
        self.extra_info_msg = other.extra_info_msg.clone();
    }

    /// Whether a message sent now must be scheduled again.
    pub fn repeats_again(&self) -> bool {
        self.repeat_duration > 0 && (self.repeat_count == 0 || self.repeat_count > 1)
    }

    /// Merge extra properties into the extra info map.
    ///
    /// Returns `true` if anything changed.
    pub fn merge_extra_info(&mut self, extra: &Map<String, Value>) -> bool {
        let mut changed = false;
        for (key, value) in extra {
            if self.extra_info.get(key) != Some(value) {
                self.extra_info.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_untagged() {
        let props = MsgProperties::default();
        assert_eq!(props.msg_type, MsgType::Invalid);
        assert_eq!(props.seq_num, 0);
        assert!(props.timestamp.is_none());
    }

    #[test]
    fn test_repeats_again() {
        let mut props = MsgProperties::default();
        assert!(!props.repeats_again());

        props.repeat_duration = 50;
        props.repeat_count = 1;
        assert!(!props.repeats_again());

        props.repeat_count = 3;
        assert!(props.repeats_again());

        // 0 means repeat forever
        props.repeat_count = 0;
        assert!(props.repeats_again());

        props.repeat_duration = 0;
        assert!(!props.repeats_again());
    }

    #[test]
    fn test_copy_send_settings_skips_runtime_tags() {
        let mut src = MsgProperties {
            delay: 100,
            delay_units: "ms".to_string(),
            repeat_duration: 2,
            repeat_units: "s".to_string(),
            repeat_count: 5,
            comment: "ping".to_string(),
            seq_num: 42,
            msg_type: MsgType::Sent,
            ..Default::default()
        };
        src.extra_info.insert("k".to_string(), Value::from(1));

        let mut dst = MsgProperties::default();
        dst.copy_send_settings(&src);

        assert_eq!(dst.delay, 100);
        assert_eq!(dst.repeat_units, "s");
        assert_eq!(dst.repeat_count, 5);
        assert_eq!(dst.comment, "ping");
        assert_eq!(dst.extra_info["k"], 1);
        assert_eq!(dst.seq_num, 0);
        assert_eq!(dst.msg_type, MsgType::Invalid);
    }

    #[test]
    fn test_merge_extra_info_reports_change() {
        let mut props = MsgProperties::default();
        let mut extra = Map::new();
        extra.insert("from".to_string(), Value::from("a"));

        assert!(props.merge_extra_info(&extra));
        assert!(!props.merge_extra_info(&extra));
        assert!(!props.merge_extra_info(&Map::new()));
    }
}
