//! Recording backend for unit tests.

use std::sync::{Mutex, PoisonError};

use crate::backend::NativeBackend;
use crate::error::MenuError;
use crate::id::ItemId;
use crate::indicator::ClickDispatcher;
use crate::registry::MenuItemState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Update(MenuItemState),
    Remove(ItemId),
    Hide(ItemId),
    Show(ItemId),
    Separator(ItemId, Option<ItemId>),
    Reset,
    Title(String),
    Tooltip(String),
    /// Length of the icon payload.
    Icon(usize),
    Quit,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingBackend {
    pub(crate) checkable: bool,
    pub(crate) calls: Mutex<Vec<Call>>,
    pub(crate) dispatcher: Mutex<Option<ClickDispatcher>>,
}

impl RecordingBackend {
    fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    pub(crate) fn take(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    pub(crate) fn click(&self, id: ItemId) -> bool {
        let dispatcher = self.dispatcher.lock().unwrap().clone();
        dispatcher.is_some_and(|d| d.dispatch(id))
    }
}

impl NativeBackend for RecordingBackend {
    fn checkable_by_default(&self) -> bool {
        self.checkable
    }

    fn attach(&self, dispatcher: ClickDispatcher) {
        *self.dispatcher.lock().unwrap() = Some(dispatcher);
    }

    fn add_or_update_item(&self, item: &MenuItemState) {
        self.record(Call::Update(item.clone()));
    }

    fn remove_item(&self, id: ItemId) {
        self.record(Call::Remove(id));
    }

    fn hide_item(&self, id: ItemId) {
        self.record(Call::Hide(id));
    }

    fn show_item(&self, id: ItemId) {
        self.record(Call::Show(id));
    }

    fn add_separator(&self, id: ItemId, parent: Option<ItemId>) {
        self.record(Call::Separator(id, parent));
    }

    fn reset_menu(&self) {
        self.record(Call::Reset);
    }

    fn set_title(&self, title: &str) {
        self.record(Call::Title(title.to_string()));
    }

    fn set_tooltip(&self, tooltip: &str) {
        self.record(Call::Tooltip(tooltip.to_string()));
    }

    fn set_icon(&self, icon: &[u8]) -> Result<(), MenuError> {
        self.record(Call::Icon(icon.len()));
        Ok(())
    }

    fn quit(&self) {
        self.record(Call::Quit);
    }
}
