//! Wire types for the status-notifier protocol.
//!
//! Shared by the application side (item publisher) and the shell side
//! (host tracker):
//! - [`constants`]: bus names, object paths, interfaces, member names
//! - [`Value`]: dynamically decoded bus values, see [`wire`]
//! - [`types`]: tooltip, pixmap, category, status and scroll types
//! - [`signals`]: typed decoders for `NameOwnerChanged` / `PropertiesChanged`
//! - [`properties`]: the observable per-item property store
//! - [`proxy`]: client proxies for the watcher and items

pub mod constants;
pub mod error;
pub mod properties;
pub mod proxy;
pub mod signals;
pub mod testing;
pub mod types;
pub mod value;
pub mod wire;

pub use error::ProtocolError;
pub use properties::{Applied, ItemProperties, ItemSnapshot, PropertyField};
pub use signals::{NameOwnerChanged, PropertiesChanged, Signal};
pub use types::{Category, IconPixmap, ScrollDirection, ScrollOrientation, Status, ToolTip};
pub use value::Value;
pub use wire::{PixmapWire, ToolTipWire};
