use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::prop;
use crate::error::ProtocolError;
use crate::value::Value;

/// Tooltip shown when hovering the indicator.
///
/// Always replaced and read as a whole; the four fields are never updated
/// independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolTip {
    pub icon_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub icon_data: Vec<u8>,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subtitle: String,
}

impl ToolTip {
    /// A tooltip carrying only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Decodes a `(s ay s s)` structure.
    ///
    /// Icon data sent as a pixmap list instead of raw bytes decodes to empty.
    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let fields = value
            .as_struct()
            .filter(|f| f.len() == 4)
            .ok_or_else(|| {
                ProtocolError::field(
                    prop::TOOLTIP,
                    format!("expected (sayss), got {}", value.signature()),
                )
            })?;

        let text = |v: &Value| v.as_str().unwrap_or_default().to_string();
        let icon_data = match &fields[1] {
            Value::Bytes(b) => b.clone(),
            _ => Vec::new(),
        };

        Ok(Self {
            icon_name: text(&fields[0]),
            icon_data,
            title: text(&fields[2]),
            subtitle: text(&fields[3]),
        })
    }
}

/// One icon image: big-endian ARGB32, row-major.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconPixmap {
    pub width: i32,
    pub height: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<u8>,
}

impl IconPixmap {
    pub fn is_empty(&self) -> bool {
        self.width == 0 && self.height == 0 && self.data.is_empty()
    }

    /// Decodes an `a(iiay)` list.
    ///
    /// Entries with fewer than two fields are skipped. Two-field entries
    /// (height omitted, seen in practice) decode with height 0.
    pub fn list_from_value(value: &Value) -> Result<Vec<Self>, ProtocolError> {
        let entries = value.as_array().ok_or_else(|| {
            ProtocolError::field(
                prop::ICON_PIXMAP,
                format!("expected a(iiay), got {}", value.signature()),
            )
        })?;

        let mut icons = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(fields) = entry.as_struct() else {
                return Err(ProtocolError::field(
                    prop::ICON_PIXMAP,
                    format!("expected (iiay) entry, got {}", entry.signature()),
                ));
            };
            if fields.len() < 2 {
                continue;
            }

            let width = fields[0].as_i32().unwrap_or_default();
            let (height, data) = match fields.len() {
                2 => (0, fields[1].as_bytes().unwrap_or_default().to_vec()),
                _ => {
                    let height = fields[1].as_i32().ok_or_else(|| {
                        ProtocolError::field(prop::ICON_PIXMAP, "height is not an int32")
                    })?;
                    let data = fields[2].as_bytes().ok_or_else(|| {
                        ProtocolError::field(prop::ICON_PIXMAP, "pixel data is not a byte array")
                    })?;
                    (height, data.to_vec())
                }
            };

            icons.push(Self {
                width,
                height,
                data,
            });
        }
        Ok(icons)
    }
}

/// Item category advertised to the shell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    #[default]
    ApplicationStatus,
    Communications,
    SystemServices,
    Hardware,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApplicationStatus => "ApplicationStatus",
            Self::Communications => "Communications",
            Self::SystemServices => "SystemServices",
            Self::Hardware => "Hardware",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ApplicationStatus" => Ok(Self::ApplicationStatus),
            "Communications" => Ok(Self::Communications),
            "SystemServices" => Ok(Self::SystemServices),
            "Hardware" => Ok(Self::Hardware),
            other => Err(ProtocolError::field(
                prop::CATEGORY,
                format!("unknown category {other:?}"),
            )),
        }
    }
}

/// Item status advertised to the shell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Passive,
    #[default]
    Active,
    NeedsAttention,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passive => "Passive",
            Self::Active => "Active",
            Self::NeedsAttention => "NeedsAttention",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Passive" => Ok(Self::Passive),
            "Active" => Ok(Self::Active),
            "NeedsAttention" => Ok(Self::NeedsAttention),
            other => Err(ProtocolError::field(
                prop::STATUS,
                format!("unknown status {other:?}"),
            )),
        }
    }
}

/// Axis of a scroll interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollOrientation {
    Horizontal,
    Vertical,
}

impl ScrollOrientation {
    /// Parses the wire string. Anything but `"horizontal"` is vertical.
    pub fn parse(s: &str) -> Self {
        if s == "horizontal" {
            Self::Horizontal
        } else {
            Self::Vertical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
        }
    }
}

/// Direction delivered to a scroll handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    /// Positive delta scrolls up (vertical) or right (horizontal); zero and
    /// negative deltas scroll down or left.
    pub fn from_delta(delta: i32, orientation: ScrollOrientation) -> Self {
        match (orientation, delta > 0) {
            (ScrollOrientation::Horizontal, true) => Self::Right,
            (ScrollOrientation::Horizontal, false) => Self::Left,
            (ScrollOrientation::Vertical, true) => Self::Up,
            (ScrollOrientation::Vertical, false) => Self::Down,
        }
    }
}
