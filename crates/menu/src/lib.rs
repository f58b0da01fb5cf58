//! Menu model for a status-notifier indicator.
//!
//! An [`Indicator`] is one tray icon session. It owns:
//! - an [`IdAllocator`] handing out process-unique entry ids
//! - the [`Registry`], the single source of truth for every live entry
//! - a [`NativeBackend`] that renders the icon and menu
//! - the ready/exit lifecycle, with an execute-once exit guard
//!
//! [`MenuItem`] handles mutate entries from any thread. Each mutation is
//! pushed to the backend before the setter returns. Clicks travel the other
//! way: the backend calls a [`ClickDispatcher`], which offers the click to
//! the entry's [`ClickSlot`] and drops it if nobody is waiting.

mod backend;
mod click;
mod error;
mod id;
mod indicator;
mod item;
mod lifecycle;
mod registry;

#[cfg(test)]
mod testing;

pub use backend::NativeBackend;
pub use click::ClickSlot;
pub use error::MenuError;
pub use id::{IdAllocator, ItemId};
pub use indicator::{ClickDispatcher, Indicator};
pub use item::MenuItem;
pub use lifecycle::ExitGuard;
pub use registry::{ItemCell, MenuItemState, Registry};
