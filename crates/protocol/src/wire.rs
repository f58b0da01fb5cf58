//! Conversions between bus messages and [`Value`].
//!
//! Outgoing data is typed (the exported objects return plain Rust types).
//! Incoming data from other peers is decoded dynamically so malformed or
//! unusual shapes reach the tolerant decoders in [`crate::types`] instead of
//! failing deserialization outright.

use std::collections::{BTreeMap, HashMap};

use zbus::DBusError;
use zbus::message::Type as MessageType;
use zbus::zvariant::{self, ObjectPath, StructureBuilder};

use crate::signals::Signal;
use crate::types::{IconPixmap, ToolTip};
use crate::value::Value;

/// `(iiay)`: one icon pixmap as sent on the bus.
pub type PixmapWire = (i32, i32, Vec<u8>);

/// `(sayss)`: icon name, icon data, title, subtitle.
pub type ToolTipWire = (String, Vec<u8>, String, String);

impl Value {
    /// Decodes any bus value. Variants are unwrapped, narrower integers
    /// widen, and types the protocol never uses fall back to their debug
    /// form as a string.
    pub fn from_zvariant(value: &zvariant::Value<'_>) -> Self {
        use zvariant::Value as Z;

        match value {
            Z::Bool(b) => Self::Bool(*b),
            Z::U8(n) => Self::U32(u32::from(*n)),
            Z::I16(n) => Self::I32(i32::from(*n)),
            Z::U16(n) => Self::U32(u32::from(*n)),
            Z::I32(n) => Self::I32(*n),
            Z::U32(n) => Self::U32(*n),
            Z::I64(n) => Self::I64(*n),
            Z::U64(n) => Self::I64(i64::try_from(*n).unwrap_or(i64::MAX)),
            Z::Str(s) => Self::Str(s.as_str().to_string()),
            Z::Signature(s) => Self::Str(s.as_str().to_string()),
            Z::ObjectPath(p) => Self::ObjectPath(p.as_str().to_string()),
            Z::Value(inner) => Self::from_zvariant(inner),
            Z::Array(array) => {
                if array.element_signature().as_str() == "y" {
                    let bytes = array
                        .iter()
                        .filter_map(|v| match v {
                            Z::U8(b) => Some(*b),
                            _ => None,
                        })
                        .collect();
                    Self::Bytes(bytes)
                } else {
                    Self::Array(array.iter().map(Self::from_zvariant).collect())
                }
            }
            Z::Structure(s) => Self::Struct(s.fields().iter().map(Self::from_zvariant).collect()),
            Z::Dict(dict) => Self::Dict(
                dict.iter()
                    .map(|(k, v)| {
                        let key = match Self::from_zvariant(k) {
                            Self::Str(s) | Self::ObjectPath(s) => s,
                            other => format!("{other:?}"),
                        };
                        (key, Self::from_zvariant(v))
                    })
                    .collect(),
            ),
            other => Self::Str(format!("{other:?}")),
        }
    }

    /// Encodes for the bus. Arrays go out as `av`, dicts as `a{sv}`.
    pub fn to_zvariant(&self) -> zvariant::Value<'static> {
        use zvariant::Value as Z;

        match self {
            Self::Bool(b) => Z::from(*b),
            Self::I32(n) => Z::from(*n),
            Self::U32(n) => Z::from(*n),
            Self::I64(n) => Z::from(*n),
            Self::Str(s) => Z::from(s.clone()),
            Self::ObjectPath(p) => match ObjectPath::try_from(p.clone()) {
                Ok(path) => Z::from(path),
                Err(_) => Z::from(p.clone()),
            },
            Self::Bytes(b) => Z::from(b.clone()),
            Self::Array(items) => {
                Z::from(items.iter().map(Value::to_zvariant).collect::<Vec<_>>())
            }
            Self::Struct(fields) if fields.is_empty() => Z::from(Vec::<Z<'static>>::new()),
            Self::Struct(fields) => fields
                .iter()
                .fold(StructureBuilder::new(), |b, f| b.append_field(f.to_zvariant()))
                .build()
                .into(),
            Self::Dict(map) => Z::from(dict_to_zvariant(map)),
        }
    }
}

/// `a{sv}` body for a property map.
pub fn dict_to_zvariant(map: &BTreeMap<String, Value>) -> HashMap<String, zvariant::Value<'static>> {
    map.iter()
        .map(|(k, v)| (k.clone(), v.to_zvariant()))
        .collect()
}

/// Decodes a `GetAll` reply or the changed map of a `PropertiesChanged`.
pub fn dict_from_zvariant(map: &HashMap<String, zvariant::OwnedValue>) -> BTreeMap<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), Value::from_zvariant(v)))
        .collect()
}

/// Bus error name carried by a failed call, if the peer sent one.
pub fn error_name(error: &zbus::Error) -> Option<String> {
    match error {
        zbus::Error::MethodError(name, _, _) => Some(name.as_str().to_string()),
        zbus::Error::FDO(e) => Some(e.name().as_str().to_string()),
        _ => None,
    }
}

impl ToolTip {
    pub fn to_wire(&self) -> ToolTipWire {
        (
            self.icon_name.clone(),
            self.icon_data.clone(),
            self.title.clone(),
            self.subtitle.clone(),
        )
    }
}

impl IconPixmap {
    pub fn to_wire(&self) -> PixmapWire {
        (self.width, self.height, self.data.clone())
    }

    pub fn list_to_wire(pixmaps: &[IconPixmap]) -> Vec<PixmapWire> {
        pixmaps.iter().map(IconPixmap::to_wire).collect()
    }
}

impl Signal {
    /// Builds a [`Signal`] from a received message. `None` for anything
    /// that is not a signal. A body that cannot be read as a structure
    /// decodes as empty.
    pub fn from_message(message: &zbus::Message) -> Option<Self> {
        if message.message_type() != MessageType::Signal {
            return None;
        }
        let header = message.header();
        let text = |s: Option<&str>| s.unwrap_or_default().to_string();

        let body = message.body();
        let fields = body
            .deserialize::<zvariant::Structure<'_>>()
            .map(|s| s.fields().iter().map(Value::from_zvariant).collect())
            .unwrap_or_default();

        Some(Self {
            sender: text(header.sender().map(|s| s.as_str())),
            path: text(header.path().map(|p| p.as_str())),
            interface: text(header.interface().map(|i| i.as_str())),
            member: text(header.member().map(|m| m.as_str())),
            body: fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_variants_are_unwrapped() {
        let inner = zvariant::Value::from("App");
        let wrapped = zvariant::Value::Value(Box::new(inner));
        assert_eq!(Value::from_zvariant(&wrapped), Value::from("App"));
    }

    #[test]
    fn byte_arrays_decode_as_bytes() {
        let v = zvariant::Value::from(vec![1u8, 2, 3]);
        assert_eq!(Value::from_zvariant(&v), Value::Bytes(vec![1, 2, 3]));

        let empty = zvariant::Value::from(Vec::<u8>::new());
        assert_eq!(Value::from_zvariant(&empty), Value::Bytes(vec![]));
    }

    #[test]
    fn pixmap_list_survives_the_bus_encoding() {
        let pixmaps = vec![IconPixmap {
            width: 1,
            height: 1,
            data: vec![0xFF, 1, 2, 3],
        }];
        let encoded = zvariant::Value::from(IconPixmap::list_to_wire(&pixmaps));
        let decoded = Value::from_zvariant(&encoded);
        assert_eq!(decoded.signature(), "a(iiay)");
        assert_eq!(IconPixmap::list_from_value(&decoded).unwrap(), pixmaps);
    }

    #[test]
    fn tooltip_survives_the_bus_encoding() {
        let tooltip = ToolTip {
            icon_name: "dialog-info".into(),
            icon_data: vec![],
            title: "Tooltip 棒棒嗒".into(),
            subtitle: "World".into(),
        };
        let encoded = zvariant::Value::from(tooltip.to_wire());
        let decoded = Value::from_zvariant(&encoded);
        assert_eq!(ToolTip::from_value(&decoded).unwrap(), tooltip);
    }

    #[test]
    fn outgoing_structs_and_dicts_come_back_equal() {
        let layout = Value::Struct(vec![
            Value::I32(1),
            Value::Dict(BTreeMap::from([
                ("label".to_string(), Value::from("Open")),
                ("visible".to_string(), Value::Bool(true)),
            ])),
            Value::Array(vec![]),
        ]);
        assert_eq!(Value::from_zvariant(&layout.to_zvariant()), layout);
    }
}
