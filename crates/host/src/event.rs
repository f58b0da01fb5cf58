use serde::Serialize;

/// Something the host observed about a tracked item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostEvent {
    /// A sender registered an item and its properties were pulled.
    ItemRegistered { sender: String, service: String },

    /// The sender disappeared from the bus.
    ItemRemoved { sender: String, service: String },

    /// Fields that changed, in the order they were applied.
    PropertiesUpdated { sender: String, changed: Vec<String> },

    /// The item's menu announced a change (`LayoutUpdated` and friends).
    MenuChanged { sender: String, member: String },
}

impl HostEvent {
    pub fn sender(&self) -> &str {
        match self {
            Self::ItemRegistered { sender, .. }
            | Self::ItemRemoved { sender, .. }
            | Self::PropertiesUpdated { sender, .. }
            | Self::MenuChanged { sender, .. } => sender,
        }
    }
}
