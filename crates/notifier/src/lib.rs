//! Application side of a status-notifier tray icon.
//!
//! - [`Publisher`] claims `org.kde.StatusNotifierItem-<pid>-<id>`, exports
//!   the item object and keeps it registered with the watcher
//! - [`DbusMenu`] exports the menu tree at `/StatusNotifierMenu`
//! - [`SniBackend`] ties both to a [`trayline_menu::Indicator`]
//! - [`pixmap_from_bytes`] turns PNG/ICO bytes into an ARGB32 pixmap

mod backend;
mod config;
mod error;
mod icon;
mod menu_export;
mod publisher;

pub use backend::SniBackend;
pub use config::NotifierConfig;
pub use error::NotifierError;
pub use icon::{IconError, pixmap_from_bytes};
pub use menu_export::{DBUSMENU_VERSION, DbusMenu};
pub use publisher::{ClickHandler, Publisher, ScrollHandler};
