//! Native host side of the protocol.
//!
//! Tracks the plugin slots each client has loaded and their parameter values.
//! No plugin binary is loaded here: a slot is a name plus a parameter table,
//! enough for the browser side to drive and read back parameters. Replies go
//! to the requesting client only.

use crate::message::{
    self, GET_PARAMS, LOAD_PLUGIN, PARAMS, PARAM_CHANGED, PING, SET_PARAM, UNLOAD_PLUGIN,
};
use crate::{BridgeListener, BridgeSender, ParameterUpdate};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

const DEFAULT_SAMPLE_RATE: u64 = 44_100;

#[derive(Debug, Clone)]
struct PluginSlot {
    name: String,
    sample_rate: u64,
    parameters: BTreeMap<String, f32>,
}

/// Plugin slots of one connected client.
#[derive(Debug, Default)]
struct ClientSession {
    slots: HashMap<String, PluginSlot>,
}

/// Bridge listener answering plugin host requests.
pub struct PluginHost {
    sender: BridgeSender,
    sessions: Mutex<HashMap<String, ClientSession>>,
}

impl PluginHost {
    pub fn new(sender: BridgeSender) -> Self {
        Self {
            sender,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Clients with an open session.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Slots loaded by `client_id`, sorted.
    pub fn loaded_slots(&self, client_id: &str) -> Vec<String> {
        let sessions = self.sessions.lock();
        let mut slots: Vec<String> = sessions
            .get(client_id)
            .map(|session| session.slots.keys().cloned().collect())
            .unwrap_or_default();
        slots.sort();
        slots
    }

    /// Process one request and return the reply for `client_id`, if any.
    pub fn handle(&self, client_id: &str, message: &Value) -> Option<Value> {
        match message::action_of(message) {
            Some(PING) => Some(message::pong()),
            Some(LOAD_PLUGIN) => Some(self.load_plugin(client_id, message)),
            Some(UNLOAD_PLUGIN) => self.unload_plugin(client_id, message),
            Some(SET_PARAM) => self.set_param(client_id, message),
            Some(GET_PARAMS) => self.get_params(client_id, message),
            Some(other) => {
                tracing::debug!(client = %client_id, action = other, "unhandled action");
                None
            }
            None => {
                tracing::debug!(client = %client_id, "message without action");
                None
            }
        }
    }

    fn load_plugin(&self, client_id: &str, message: &Value) -> Value {
        let slot_id = message::slot_of(message);
        let Some(path) = message
            .get("path")
            .and_then(Value::as_str)
            .filter(|path| !path.is_empty())
        else {
            return json!({
                "action": LOAD_PLUGIN,
                "success": false,
                "error": "Missing plugin path",
                "slot_id": slot_id,
            });
        };

        let name = Path::new(path)
            .file_stem()
            .map_or_else(|| path.to_owned(), |stem| stem.to_string_lossy().into_owned());
        let parameters: BTreeMap<String, f32> = message
            .get("parameters")
            .and_then(Value::as_object)
            .map(|values| {
                values
                    .iter()
                    .filter_map(|(name, value)| Some((name.clone(), value.as_f64()? as f32)))
                    .collect()
            })
            .unwrap_or_default();
        let slot = PluginSlot {
            name,
            sample_rate: message
                .get("sample_rate")
                .and_then(Value::as_u64)
                .unwrap_or(DEFAULT_SAMPLE_RATE),
            parameters,
        };

        let reply = json!({
            "action": LOAD_PLUGIN,
            "success": true,
            "name": slot.name,
            "slot_id": slot_id,
            "parameters": slot.parameters,
        });
        tracing::info!(client = %client_id, slot = slot_id, plugin = %slot.name, sample_rate = slot.sample_rate, "plugin loaded");
        self.sessions
            .lock()
            .entry(client_id.to_owned())
            .or_default()
            .slots
            .insert(slot_id.to_owned(), slot);
        reply
    }

    fn unload_plugin(&self, client_id: &str, message: &Value) -> Option<Value> {
        let slot_id = message::slot_of(message);
        let removed = self
            .sessions
            .lock()
            .get_mut(client_id)
            .and_then(|session| session.slots.remove(slot_id));
        let Some(slot) = removed else {
            tracing::debug!(client = %client_id, slot = slot_id, "unload of empty slot");
            return None;
        };
        tracing::info!(client = %client_id, slot = slot_id, plugin = %slot.name, "plugin unloaded");
        Some(json!({ "action": UNLOAD_PLUGIN, "success": true, "slot_id": slot_id }))
    }

    fn set_param(&self, client_id: &str, message: &Value) -> Option<Value> {
        let Some(update) = ParameterUpdate::from_message(message) else {
            tracing::debug!(client = %client_id, "malformed SET_PARAM");
            return None;
        };
        let mut sessions = self.sessions.lock();
        let Some(slot) = sessions
            .get_mut(client_id)
            .and_then(|session| session.slots.get_mut(&update.slot_id))
        else {
            tracing::debug!(client = %client_id, slot = %update.slot_id, "SET_PARAM for unloaded slot");
            return None;
        };
        slot.parameters.insert(update.name.clone(), update.value);
        tracing::debug!(slot = %update.slot_id, name = %update.name, value = update.value, "parameter changed");
        Some(update.with_action(PARAM_CHANGED))
    }

    fn get_params(&self, client_id: &str, message: &Value) -> Option<Value> {
        let slot_id = message::slot_of(message);
        let sessions = self.sessions.lock();
        let slot = sessions.get(client_id)?.slots.get(slot_id)?;
        Some(json!({ "action": PARAMS, "parameters": slot.parameters, "slot_id": slot_id }))
    }
}

impl BridgeListener for PluginHost {
    fn on_message(&self, client_id: &str, message: &Value) {
        let Some(reply) = self.handle(client_id, message) else {
            return;
        };
        match self.sender.send(client_id, &reply) {
            Ok(true) => {}
            Ok(false) => tracing::debug!(client = %client_id, "client gone before reply"),
            Err(e) => tracing::warn!(client = %client_id, error = %e, "reply failed"),
        }
    }

    fn on_client_connected(&self, client_id: &str) {
        self.sessions
            .lock()
            .insert(client_id.to_owned(), ClientSession::default());
        tracing::info!(client = %client_id, "session opened");
    }

    fn on_client_disconnected(&self, client_id: &str) {
        if let Some(session) = self.sessions.lock().remove(client_id) {
            tracing::info!(client = %client_id, slots = session.slots.len(), "session closed");
        }
    }
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHost")
            .field("sessions", &self.session_count())
            .finish()
    }
}
