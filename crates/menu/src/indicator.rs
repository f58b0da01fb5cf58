//! Indicator session: the explicit context every menu operation runs in.

use std::fmt;
use std::sync::{Arc, Weak};

use tracing::{debug, info, warn};

use crate::backend::NativeBackend;
use crate::error::MenuError;
use crate::id::{IdAllocator, ItemId};
use crate::item::MenuItem;
use crate::lifecycle::Lifecycle;
use crate::registry::{ItemCell, MenuItemState, Registry};

pub(crate) struct Session {
    pub(crate) ids: IdAllocator,
    pub(crate) registry: Registry,
    pub(crate) backend: Arc<dyn NativeBackend>,
    lifecycle: Lifecycle,
}

impl Session {
    /// Allocates, registers and pushes a new entry.
    pub(crate) fn insert(
        self: &Arc<Self>,
        title: &str,
        tooltip: &str,
        parent: Option<ItemId>,
        checked: Option<bool>,
    ) -> MenuItem {
        let id = self.ids.next();
        let mut state = MenuItemState::new(id, title, tooltip, parent);
        state.checkable = checked.is_some() || self.backend.checkable_by_default();
        state.checked = checked.unwrap_or(false);

        let cell = Arc::new(ItemCell::new(state));
        {
            let state = cell.lock();
            self.registry.put(id, Arc::clone(&cell));
            self.backend.add_or_update_item(&state);
        }
        debug!(id = %id, title, parent = ?parent, "menu item added");
        MenuItem::from_parts(id, cell, Arc::clone(self))
    }

    fn dispatch_click(&self, id: ItemId) -> bool {
        let Some(cell) = self.registry.get(id) else {
            warn!(id = %id, "no menu item with this id; click dropped");
            return false;
        };
        let delivered = cell.clicks().offer();
        if !delivered {
            debug!(id = %id, "nobody waiting for click; dropped");
        }
        delivered
    }
}

/// Routes clicks from a backend back into its session.
///
/// Holds the session weakly so a backend can keep it without a cycle.
#[derive(Clone, Debug)]
pub struct ClickDispatcher {
    session: Weak<Session>,
}

impl ClickDispatcher {
    /// Offers a click to the entry `id`. Returns whether a consumer took it.
    pub fn dispatch(&self, id: ItemId) -> bool {
        match self.session.upgrade() {
            Some(session) => session.dispatch_click(id),
            None => {
                debug!(id = %id, "indicator is gone; click dropped");
                false
            }
        }
    }
}

/// One tray icon and its menu.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct Indicator {
    session: Arc<Session>,
}

impl Indicator {
    pub fn new(backend: Arc<dyn NativeBackend>) -> Self {
        let session = Arc::new(Session {
            ids: IdAllocator::new(),
            registry: Registry::new(),
            backend,
            lifecycle: Lifecycle::default(),
        });
        session.backend.attach(ClickDispatcher {
            session: Arc::downgrade(&session),
        });
        Self { session }
    }

    pub fn backend(&self) -> &Arc<dyn NativeBackend> {
        &self.session.backend
    }

    pub fn click_dispatcher(&self) -> ClickDispatcher {
        ClickDispatcher {
            session: Arc::downgrade(&self.session),
        }
    }

    /// Adds a root entry. Whether it is checkable follows the backend.
    pub fn add_item(&self, title: &str, tooltip: &str) -> MenuItem {
        self.session.insert(title, tooltip, None, None)
    }

    /// Adds a root entry that always carries a check mark slot.
    pub fn add_checkbox_item(&self, title: &str, tooltip: &str, checked: bool) -> MenuItem {
        self.session.insert(title, tooltip, None, Some(checked))
    }

    pub fn add_separator(&self) {
        let id = self.session.ids.next();
        self.session.backend.add_separator(id, None);
    }

    /// Looks up a live entry.
    pub fn item(&self, id: ItemId) -> Option<MenuItem> {
        self.session
            .registry
            .get(id)
            .map(|cell| MenuItem::from_parts(id, cell, Arc::clone(&self.session)))
    }

    /// Live entries ordered by id.
    pub fn items(&self) -> Vec<MenuItemState> {
        let mut items: Vec<MenuItemState> = self
            .session
            .registry
            .ids()
            .into_iter()
            .filter_map(|id| self.session.registry.get(id))
            .map(|cell| cell.snapshot())
            .collect();
        items.sort_by_key(|s| s.id);
        items
    }

    /// Removes every entry.
    pub fn reset_menu(&self) {
        for cell in self.session.registry.drain() {
            let _state = cell.lock();
            cell.mark_removed();
        }
        self.session.backend.reset_menu();
        debug!("menu reset");
    }

    pub fn set_title(&self, title: &str) {
        self.session.backend.set_title(title);
    }

    pub fn set_tooltip(&self, tooltip: &str) {
        self.session.backend.set_tooltip(tooltip);
    }

    /// Sets the icon from an encoded image (PNG, ICO).
    pub fn set_icon(&self, icon: &[u8]) -> Result<(), MenuError> {
        self.session.backend.set_icon(icon)
    }

    /// Offers a click to entry `id`; unknown ids are logged and dropped.
    pub fn dispatch_click(&self, id: ItemId) -> bool {
        self.session.dispatch_click(id)
    }

    /// Installs the lifecycle callbacks.
    ///
    /// `on_ready` runs on a dedicated thread once [`Indicator::mark_ready`]
    /// is called. `on_exit` runs on the thread that calls
    /// [`Indicator::quit`], at most once per registration.
    pub fn register(
        &self,
        on_ready: impl FnOnce() + Send + 'static,
        on_exit: impl FnOnce() + Send + 'static,
    ) -> Result<(), MenuError> {
        self.session.lifecycle.register(on_ready, on_exit)
    }

    /// Signals that the native surface is up. Returns whether a ready
    /// callback was released.
    pub fn mark_ready(&self) -> bool {
        self.session.lifecycle.mark_ready()
    }

    /// Runs the exit callback and tears down the backend.
    ///
    /// Concurrent and repeated calls are safe; only the first one acts. Every
    /// call returns only after the exit callback and backend teardown have
    /// finished. Calling `quit` from inside the exit callback deadlocks.
    pub fn quit(&self) {
        let session = &self.session;
        session.lifecycle.quit_once(|| {
            info!("indicator quitting");
            session.lifecycle.run_exit();
            session.backend.quit();
        });
    }

    pub fn has_quit(&self) -> bool {
        self.session.lifecycle.has_quit()
    }
}

impl fmt::Debug for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Indicator")
            .field("items", &self.session.registry.len())
            .finish()
    }
}
