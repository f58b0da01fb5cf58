use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::MenuError;
use crate::id::ItemId;
use crate::indicator::Session;
use crate::registry::{ItemCell, MenuItemState};

/// Handle to one menu entry.
///
/// Handles are cheap to clone and safe to use from any thread. Every setter
/// updates the shared entry and pushes the new state to the backend before
/// returning. Once the entry is removed, setters are ignored.
#[derive(Clone)]
pub struct MenuItem {
    id: ItemId,
    cell: Arc<ItemCell>,
    session: Arc<Session>,
}

impl MenuItem {
    pub(crate) fn from_parts(id: ItemId, cell: Arc<ItemCell>, session: Arc<Session>) -> Self {
        Self { id, cell, session }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn state(&self) -> MenuItemState {
        self.cell.snapshot()
    }

    pub fn title(&self) -> String {
        self.cell.lock().title.clone()
    }

    pub fn tooltip(&self) -> String {
        self.cell.lock().tooltip.clone()
    }

    pub fn disabled(&self) -> bool {
        self.cell.lock().disabled
    }

    pub fn checked(&self) -> bool {
        self.cell.lock().checked
    }

    pub fn checkable(&self) -> bool {
        self.cell.lock().checkable
    }

    pub fn visible(&self) -> bool {
        self.cell.lock().visible
    }

    pub fn parent(&self) -> Option<ItemId> {
        self.cell.lock().parent
    }

    pub fn is_removed(&self) -> bool {
        self.cell.is_removed()
    }

    /// Waits for the next click on this entry.
    ///
    /// The waiter is registered when this is called, not when the future is
    /// first polled. Clicks arriving while nobody waits are dropped.
    /// Resolves to `false` if the entry is removed first.
    pub fn clicked(&self) -> impl Future<Output = bool> + Send + 'static {
        self.cell.clicks().clicked()
    }

    pub fn set_title(&self, title: &str) {
        self.update("set_title", |s| s.title = title.to_string());
    }

    pub fn set_tooltip(&self, tooltip: &str) {
        self.update("set_tooltip", |s| s.tooltip = tooltip.to_string());
    }

    pub fn enable(&self) {
        self.update("enable", |s| s.disabled = false);
    }

    pub fn disable(&self) {
        self.update("disable", |s| s.disabled = true);
    }

    pub fn check(&self) {
        self.update("check", |s| s.checked = true);
    }

    pub fn uncheck(&self) {
        self.update("uncheck", |s| s.checked = false);
    }

    pub fn show(&self) {
        self.set_visible(true);
    }

    pub fn hide(&self) {
        self.set_visible(false);
    }

    /// Deletes the entry and drops it from the native menu. Children are
    /// left in place.
    pub fn remove(&self) {
        let _state = self.cell.lock();
        if self.cell.is_removed() {
            return;
        }
        self.session.registry.delete(self.id);
        self.cell.mark_removed();
        self.session.backend.remove_item(self.id);
        debug!(id = %self.id, "menu item removed");
    }

    pub fn add_submenu_item(&self, title: &str, tooltip: &str) -> Result<MenuItem, MenuError> {
        self.add_child(title, tooltip, None)
    }

    pub fn add_submenu_checkbox_item(
        &self,
        title: &str,
        tooltip: &str,
        checked: bool,
    ) -> Result<MenuItem, MenuError> {
        self.add_child(title, tooltip, Some(checked))
    }

    /// Adds a separator inside this entry's submenu.
    pub fn add_separator(&self) {
        let _parent = self.cell.lock();
        if self.cell.is_removed() {
            warn!(id = %self.id, "separator parent was removed; ignoring");
            return;
        }
        let id = self.session.ids.next();
        self.session.backend.add_separator(id, Some(self.id));
    }

    fn add_child(
        &self,
        title: &str,
        tooltip: &str,
        checked: Option<bool>,
    ) -> Result<MenuItem, MenuError> {
        // Held across the insert so a concurrent remove cannot orphan the child.
        let _parent = self.cell.lock();
        if self.cell.is_removed() {
            warn!(id = %self.id, title, "submenu parent was removed");
            return Err(MenuError::UnknownItem(self.id));
        }
        Ok(self.session.insert(title, tooltip, Some(self.id), checked))
    }

    fn update(&self, op: &'static str, f: impl FnOnce(&mut MenuItemState)) {
        let mut state = self.cell.lock();
        if self.cell.is_removed() {
            warn!(id = %self.id, op, "menu item was removed; ignoring");
            return;
        }
        f(&mut state);
        self.session.backend.add_or_update_item(&state);
    }

    fn set_visible(&self, visible: bool) {
        let mut state = self.cell.lock();
        if self.cell.is_removed() {
            warn!(id = %self.id, visible, "menu item was removed; ignoring");
            return;
        }
        state.visible = visible;
        if visible {
            self.session.backend.show_item(self.id);
        } else {
            self.session.backend.hide_item(self.id);
        }
    }
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.cell.lock();
        match state.parent {
            None => write!(f, "MenuItem[{}, {:?}]", self.id, state.title),
            Some(parent) => write!(f, "MenuItem[{}, parent {}, {:?}]", self.id, parent, state.title),
        }
    }
}

impl fmt::Debug for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MenuItem")
            .field("state", &*self.cell.lock())
            .field("removed", &self.cell.is_removed())
            .finish()
    }
}
