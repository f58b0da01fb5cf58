use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::{BUS_INTERFACE, PROPERTIES_INTERFACE, member};
use crate::error::ProtocolError;
use crate::value::Value;

/// An asynchronous, unsolicited message emitted by a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Unique name of the emitting connection.
    pub sender: String,
    pub path: String,
    pub interface: String,
    pub member: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<Value>,
}

impl Signal {
    /// Fully qualified name, `interface.member`.
    pub fn name(&self) -> String {
        format!("{}.{}", self.interface, self.member)
    }

    pub fn is(&self, interface: &str, member: &str) -> bool {
        self.interface == interface && self.member == member
    }
}

/// `org.freedesktop.DBus.NameOwnerChanged(name, old_owner, new_owner)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameOwnerChanged {
    pub name: String,
    pub old_owner: String,
    pub new_owner: String,
}

impl NameOwnerChanged {
    pub fn from_signal(signal: &Signal) -> Result<Self, ProtocolError> {
        let name = signal.name();
        if !signal.is(BUS_INTERFACE, member::NAME_OWNER_CHANGED) {
            return Err(ProtocolError::signal(&name, "not a NameOwnerChanged signal"));
        }
        match signal.body.as_slice() {
            [Value::Str(n), Value::Str(old), Value::Str(new)] => Ok(Self {
                name: n.clone(),
                old_owner: old.clone(),
                new_owner: new.clone(),
            }),
            other => Err(ProtocolError::signal(
                &name,
                format!("expected (sss), got {} values", other.len()),
            )),
        }
    }

    /// An empty new owner means the name vanished.
    pub fn is_disappearance(&self) -> bool {
        self.new_owner.is_empty()
    }
}

/// `org.freedesktop.DBus.Properties.PropertiesChanged(interface, changed, invalidated)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertiesChanged {
    pub interface: String,
    pub changed: BTreeMap<String, Value>,
    pub invalidated: Vec<String>,
}

impl PropertiesChanged {
    pub fn from_signal(signal: &Signal) -> Result<Self, ProtocolError> {
        let name = signal.name();
        if !signal.is(PROPERTIES_INTERFACE, member::PROPERTIES_CHANGED) {
            return Err(ProtocolError::signal(&name, "not a PropertiesChanged signal"));
        }
        let [iface, changed, rest @ ..] = signal.body.as_slice() else {
            return Err(ProtocolError::signal(&name, "expected at least 2 values"));
        };
        let interface = iface
            .as_str()
            .ok_or_else(|| ProtocolError::signal(&name, "interface is not a string"))?;
        let changed = changed
            .as_dict()
            .ok_or_else(|| ProtocolError::signal(&name, "changed properties is not a dict"))?;

        // Invalidated list is optional in practice; a mistyped one is dropped.
        let invalidated = rest
            .first()
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            interface: interface.to_string(),
            changed: changed.clone(),
            invalidated,
        })
    }
}
