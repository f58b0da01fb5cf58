//! Shell side of the status-notifier protocol.
//!
//! [`Host`] owns `org.kde.StatusNotifierWatcher`, accepts item and host
//! registrations, and keeps a [`TrackedItem`] per registering connection:
//!
//! ```text
//! unregistered --RegisterStatusNotifierItem--> registered --owner gone--> removed
//!                                                 |   ^
//!                                                 +---+ PropertiesChanged / New* signals
//! ```
//!
//! Signals are consumed by a single loop in arrival order. What the loop
//! observes is reported as [`HostEvent`]s.

mod config;
mod error;
mod event;
mod host;
mod item;
mod tracker;
mod watcher;

pub use config::{HostConfig, InvalidatedPolicy};
pub use error::HostError;
pub use event::HostEvent;
pub use host::Host;
pub use item::TrackedItem;
