//! [`NativeBackend`] that renders an indicator as a status-notifier item.

use std::sync::Arc;

use tracing::debug;
use zbus::Connection;

use trayline_menu::{ClickDispatcher, ItemId, MenuError, MenuItemState, NativeBackend};

use crate::config::NotifierConfig;
use crate::error::NotifierError;
use crate::menu_export::DbusMenu;
use crate::publisher::Publisher;

/// Item publisher plus exported menu, driven by an
/// [`Indicator`](trayline_menu::Indicator).
pub struct SniBackend {
    publisher: Publisher,
    menu: Arc<DbusMenu>,
}

impl SniBackend {
    /// Publishes the item, exports its menu and registers with the watcher.
    pub async fn start(conn: Connection, config: &NotifierConfig) -> Result<Arc<Self>, NotifierError> {
        let publisher = Publisher::bind(conn, config).await?;
        let menu = DbusMenu::export(publisher.connection()).await?;
        publisher.register().await;
        Ok(Arc::new(Self { publisher, menu }))
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn menu(&self) -> &Arc<DbusMenu> {
        &self.menu
    }
}

impl NativeBackend for SniBackend {
    fn attach(&self, dispatcher: ClickDispatcher) {
        self.menu.attach(dispatcher);
    }

    fn add_or_update_item(&self, item: &MenuItemState) {
        self.menu.add_or_update_item(item);
    }

    fn remove_item(&self, id: ItemId) {
        self.menu.remove_item(id);
    }

    fn hide_item(&self, id: ItemId) {
        self.menu.set_visible(id, false);
    }

    fn show_item(&self, id: ItemId) {
        self.menu.set_visible(id, true);
    }

    fn add_separator(&self, id: ItemId, parent: Option<ItemId>) {
        self.menu.add_separator(id, parent);
    }

    fn reset_menu(&self) {
        self.menu.reset();
    }

    fn set_title(&self, title: &str) {
        self.publisher.set_title(title);
    }

    fn set_tooltip(&self, tooltip: &str) {
        self.publisher.set_tooltip_title(tooltip);
    }

    fn set_icon(&self, icon: &[u8]) -> Result<(), MenuError> {
        self.publisher
            .set_icon(icon)
            .map_err(|e| MenuError::Icon(e.to_string()))
    }

    fn quit(&self) {
        debug!(name = %self.publisher.service_name(), "backend quitting");
        self.publisher.shutdown();
    }
}
