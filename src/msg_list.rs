//! Persisted message lists.
//!
//! Send and receive lists are JSON arrays, one object per message. The
//! payload (without transport framing) is stored as a hex string; `id` is
//! omitted for messages outside the protocol catalog (raw and invalid data).
//!
//! Send list entry:
//!
//! ```json
//! { "id": "1", "data": "002a", "delay": 100, "delay_units": "ms",
//!   "repeat": 1000, "repeat_units": "s", "repeat_count": 5,
//!   "comment": "keep-alive", "extra_info": { "to": "10.0.0.1" } }
//! ```
//!
//! Receive list entry:
//!
//! ```json
//! { "id": "1", "data": "002a", "timestamp": 1700000000000, "type": "received" }
//! ```
//!
//! Loading goes through the protocol catalog. An entry whose `id` is absent
//! or unknown, or whose payload does not decode, comes back as an Invalid
//! message carrying the stored bytes.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::message::{Message, MsgType};
use crate::protocol::Protocol;

#[derive(Debug, Serialize, Deserialize)]
struct SendEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    data: String,
    #[serde(default)]
    delay: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    delay_units: String,
    #[serde(default)]
    repeat: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    repeat_units: String,
    #[serde(default)]
    repeat_count: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    comment: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    extra_info: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RecvEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<u64>,
    #[serde(rename = "type", default = "received")]
    msg_type: MsgType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    comment: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    extra_info: Map<String, Value>,
}

fn received() -> MsgType {
    MsgType::Received
}

fn id_of(msg: &Message) -> Option<String> {
    Some(msg.id_as_string()).filter(|id| !id.is_empty())
}

/// Serialize messages as a send list.
pub fn save_send_list<I>(msgs: I) -> Result<Value>
where
    I: IntoIterator,
    I::Item: AsRef<Message>,
{
    let entries: Vec<SendEntry> = msgs
        .into_iter()
        .map(|msg| {
            let msg = msg.as_ref();
            SendEntry {
                id: id_of(msg),
                data: hex::encode(msg.encode_payload()),
                delay: msg.props.delay,
                delay_units: msg.props.delay_units.clone(),
                repeat: msg.props.repeat_duration,
                repeat_units: msg.props.repeat_units.clone(),
                repeat_count: msg.props.repeat_count,
                comment: msg.props.comment.clone(),
                extra_info: msg.props.extra_info.clone(),
            }
        })
        .collect();
    Ok(serde_json::to_value(entries)?)
}

/// Serialize messages as a receive list.
pub fn save_recv_list<I>(msgs: I) -> Result<Value>
where
    I: IntoIterator,
    I::Item: AsRef<Message>,
{
    let entries: Vec<RecvEntry> = msgs
        .into_iter()
        .map(|msg| {
            let msg = msg.as_ref();
            RecvEntry {
                id: id_of(msg),
                data: hex::encode(msg.encode_payload()),
                timestamp: msg.props.timestamp,
                msg_type: msg.props.msg_type,
                comment: msg.props.comment.clone(),
                extra_info: msg.props.extra_info.clone(),
            }
        })
        .collect();
    Ok(serde_json::to_value(entries)?)
}

/// Rebuild a send list through the protocol catalog.
pub fn load_send_list(protocol: &dyn Protocol, list: &Value) -> Result<Vec<Message>> {
    let entries: Vec<SendEntry> = serde_json::from_value(list.clone())?;
    entries
        .into_iter()
        .map(|entry| {
            let mut msg = build(protocol, entry.id.as_deref(), &entry.data)?;
            msg.props.delay = entry.delay;
            msg.props.delay_units = entry.delay_units;
            msg.props.repeat_duration = entry.repeat;
            msg.props.repeat_units = entry.repeat_units;
            msg.props.repeat_count = entry.repeat_count;
            msg.props.comment = entry.comment;
            msg.props.extra_info = entry.extra_info;
            protocol.update_message(&mut msg);
            Ok(msg)
        })
        .collect()
}

/// Rebuild a receive list through the protocol catalog.
pub fn load_recv_list(protocol: &dyn Protocol, list: &Value) -> Result<Vec<Message>> {
    let entries: Vec<RecvEntry> = serde_json::from_value(list.clone())?;
    entries
        .into_iter()
        .map(|entry| {
            let mut msg = build(protocol, entry.id.as_deref(), &entry.data)?;
            msg.props.timestamp = entry.timestamp;
            msg.props.msg_type = entry.msg_type;
            msg.props.comment = entry.comment;
            msg.props.extra_info = entry.extra_info;
            protocol.update_message(&mut msg);
            Ok(msg)
        })
        .collect()
}

fn build(protocol: &dyn Protocol, id: Option<&str>, data: &str) -> Result<Message> {
    let bytes = hex::decode(data)?;

    if let Some(mut msg) = id.and_then(|id| protocol.create_message(id, 0)) {
        match msg.decode_payload(&bytes) {
            Ok(()) => return Ok(msg),
            Err(e) => tracing::warn!("Stored {} does not decode ({:?})", msg.name(), e),
        }
    } else if let Some(id) = id {
        tracing::warn!("Unknown stored message id {:?}", id);
    }

    Ok(protocol.create_invalid_message(Bytes::from(bytes)))
}
