//! Parameter target that forwards values to the native plugin host.

use nova_automation::ParameterTarget;
use nova_bridge::{BridgeSender, ParameterUpdate};

/// A plugin parameter living in the out-of-process host.
///
/// Each apply publishes a `SET_PARAM` message for every connected host
/// client. Publishing never touches a socket: the bridge's writer thread
/// delivers the newest value. Throttling happens upstream in the parameter
/// registry.
#[derive(Debug, Clone)]
pub struct BridgedParameter {
    sender: BridgeSender,
    slot_id: String,
    name: String,
    key: String,
}

impl BridgedParameter {
    pub fn new(sender: BridgeSender, slot_id: impl Into<String>, name: impl Into<String>) -> Self {
        let slot_id = slot_id.into();
        let name = name.into();
        Self {
            sender,
            key: format!("{slot_id}/{name}"),
            slot_id,
            name,
        }
    }

    pub fn slot_id(&self) -> &str {
        &self.slot_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ParameterTarget for BridgedParameter {
    fn apply(&self, value: f32) {
        let update = ParameterUpdate::new(self.slot_id.as_str(), self.name.as_str(), value);
        match self.sender.publish(&self.key, &update.to_message()) {
            Ok(false) => tracing::trace!(slot = %self.slot_id, name = %self.name, "no host connected"),
            Ok(true) => {}
            Err(e) => {
                tracing::debug!(slot = %self.slot_id, name = %self.name, error = %e, "bridged update failed")
            }
        }
    }
}
