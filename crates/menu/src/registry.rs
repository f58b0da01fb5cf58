//! Concurrent map from item id to item state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::click::ClickSlot;
use crate::id::ItemId;

/// Snapshot of one menu entry as pushed to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemState {
    pub id: ItemId,
    pub title: String,
    pub tooltip: String,
    pub disabled: bool,
    pub checked: bool,
    pub checkable: bool,
    pub visible: bool,
    /// Parent entry for submenu nesting, by id.
    pub parent: Option<ItemId>,
}

impl MenuItemState {
    pub fn new(id: ItemId, title: &str, tooltip: &str, parent: Option<ItemId>) -> Self {
        Self {
            id,
            title: title.to_string(),
            tooltip: tooltip.to_string(),
            disabled: false,
            checked: false,
            checkable: false,
            visible: true,
            parent,
        }
    }
}

/// Registry entry: mutable state plus the item's click slot.
#[derive(Debug)]
pub struct ItemCell {
    state: Mutex<MenuItemState>,
    removed: AtomicBool,
    clicks: ClickSlot,
}

impl ItemCell {
    pub fn new(state: MenuItemState) -> Self {
        Self {
            state: Mutex::new(state),
            removed: AtomicBool::new(false),
            clicks: ClickSlot::new(),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, MenuItemState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> MenuItemState {
        self.lock().clone()
    }

    pub fn clicks(&self) -> &ClickSlot {
        &self.clicks
    }

    /// Only read or flipped while holding [`ItemCell::lock`].
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.store(true, Ordering::SeqCst);
        self.clicks.close();
    }
}

/// Iteration order is unspecified.
#[derive(Debug, Default)]
pub struct Registry {
    items: RwLock<HashMap<ItemId, Arc<ItemCell>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces.
    pub fn put(&self, id: ItemId, cell: Arc<ItemCell>) {
        self.write().insert(id, cell);
    }

    pub fn get(&self, id: ItemId) -> Option<Arc<ItemCell>> {
        self.read().get(&id).cloned()
    }

    pub fn delete(&self, id: ItemId) -> Option<Arc<ItemCell>> {
        self.write().remove(&id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.read().keys().copied().collect()
    }

    /// Removes every entry, returning them.
    pub fn drain(&self) -> Vec<Arc<ItemCell>> {
        self.write().drain().map(|(_, cell)| cell).collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ItemId, Arc<ItemCell>>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ItemId, Arc<ItemCell>>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }
}
