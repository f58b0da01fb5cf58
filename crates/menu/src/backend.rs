//! Capability interface implemented by each native tray surface.

use crate::error::MenuError;
use crate::id::ItemId;
use crate::indicator::ClickDispatcher;
use crate::registry::MenuItemState;

/// The native side of an indicator: whatever renders the icon and menu.
///
/// Calls arrive from any thread, synchronously with the model mutation that
/// caused them. Implementations funnel work onto their own UI thread if the
/// platform requires it.
pub trait NativeBackend: Send + Sync + 'static {
    /// Whether plain menu items carry a check mark slot without asking.
    fn checkable_by_default(&self) -> bool {
        false
    }

    /// Called once when the indicator is built. Backends that receive
    /// clicks keep the dispatcher and call it per click.
    fn attach(&self, dispatcher: ClickDispatcher) {
        let _ = dispatcher;
    }

    fn add_or_update_item(&self, item: &MenuItemState);

    fn remove_item(&self, id: ItemId);

    fn hide_item(&self, id: ItemId);

    fn show_item(&self, id: ItemId);

    /// `parent` is `None` for a separator in the root menu.
    fn add_separator(&self, id: ItemId, parent: Option<ItemId>);

    /// Drops every item and separator.
    fn reset_menu(&self);

    fn set_title(&self, title: &str);

    fn set_tooltip(&self, tooltip: &str);

    /// `icon` is an encoded raster image.
    fn set_icon(&self, icon: &[u8]) -> Result<(), MenuError>;

    /// Tear down the native surface. Called at most once per session.
    fn quit(&self) {}
}
