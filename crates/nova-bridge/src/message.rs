//! JSON message helpers for the bridge protocol.
//!
//! Every message is a JSON object whose `action` field names its kind.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};

pub const PING: &str = "PING";
pub const PONG: &str = "PONG";
pub const SET_PARAM: &str = "SET_PARAM";
pub const PARAM_CHANGED: &str = "PARAM_CHANGED";
pub const LOAD_PLUGIN: &str = "LOAD_PLUGIN";
pub const UNLOAD_PLUGIN: &str = "UNLOAD_PLUGIN";
pub const GET_PARAMS: &str = "GET_PARAMS";
pub const PARAMS: &str = "PARAMS";

/// Slot addressed when a message names none.
pub const DEFAULT_SLOT: &str = "default";

/// The `action` field of a message, if any.
pub fn action_of(message: &Value) -> Option<&str> {
    message.get("action")?.as_str()
}

/// The `slot_id` field of a message, or [`DEFAULT_SLOT`].
pub fn slot_of(message: &Value) -> &str {
    message
        .get("slot_id")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_SLOT)
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

pub fn ping() -> Value {
    json!({ "action": PING, "timestamp": now_millis() })
}

pub fn pong() -> Value {
    json!({ "action": PONG, "timestamp": now_millis() })
}

fn default_slot() -> String {
    DEFAULT_SLOT.to_owned()
}

/// A parameter change for a plugin hosted across the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    /// Plugin instance the parameter belongs to.
    #[serde(default = "default_slot")]
    pub slot_id: String,
    /// Parameter name.
    pub name: String,
    pub value: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl ParameterUpdate {
    pub fn new(slot_id: impl Into<String>, name: impl Into<String>, value: f32) -> Self {
        Self {
            slot_id: slot_id.into(),
            name: name.into(),
            value,
            timestamp: Some(now_millis()),
        }
    }

    /// `SET_PARAM` message.
    pub fn to_message(&self) -> Value {
        self.with_action(SET_PARAM)
    }

    /// The same update under another action, e.g. `PARAM_CHANGED`.
    pub fn with_action(&self, action: &str) -> Value {
        let mut message = json!({
            "action": action,
            "slot_id": self.slot_id,
            "name": self.name,
            "value": self.value,
        });
        if let Some(timestamp) = self.timestamp {
            message["timestamp"] = json!(timestamp);
        }
        message
    }

    /// Parse a `SET_PARAM` or `PARAM_CHANGED` message.
    pub fn from_message(message: &Value) -> Option<Self> {
        match action_of(message)? {
            SET_PARAM | PARAM_CHANGED => serde_json::from_value(message.clone()).ok(),
            _ => None,
        }
    }
}
