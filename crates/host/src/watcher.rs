//! The exported `org.kde.StatusNotifierWatcher` object.

use std::sync::{Arc, Weak};

use zbus::message::Header;
use zbus::{SignalContext, fdo, interface};

use trayline_protocol::constants::PROTOCOL_VERSION;

use crate::tracker::Tracker;

pub(crate) struct WatcherObject {
    tracker: Weak<Tracker>,
}

impl WatcherObject {
    pub(crate) fn new(tracker: &Arc<Tracker>) -> Self {
        Self {
            tracker: Arc::downgrade(tracker),
        }
    }

    fn tracker(&self) -> fdo::Result<Arc<Tracker>> {
        self.tracker
            .upgrade()
            .ok_or_else(|| fdo::Error::Failed("watcher is shutting down".into()))
    }
}

fn sender(header: &Header<'_>) -> fdo::Result<String> {
    header
        .sender()
        .map(|s| s.to_string())
        .ok_or_else(|| fdo::Error::InvalidArgs("call without a sender".into()))
}

#[interface(name = "org.kde.StatusNotifierWatcher")]
impl WatcherObject {
    async fn register_status_notifier_item(
        &self,
        service: String,
        #[zbus(header)] header: Header<'_>,
    ) -> fdo::Result<()> {
        let sender = sender(&header)?;
        self.tracker()?.register_item(&sender, &service).await
    }

    async fn register_status_notifier_host(
        &self,
        service: String,
        #[zbus(header)] header: Header<'_>,
    ) -> fdo::Result<()> {
        let sender = sender(&header)?;
        self.tracker()?.register_host(&sender, &service).await;
        Ok(())
    }

    #[zbus(property)]
    fn registered_status_notifier_items(&self) -> Vec<String> {
        self.tracker
            .upgrade()
            .map(|t| t.registered_services())
            .unwrap_or_default()
    }

    #[zbus(property)]
    fn is_status_notifier_host_registered(&self) -> bool {
        self.tracker.upgrade().is_some_and(|t| t.has_host())
    }

    #[zbus(property)]
    fn protocol_version(&self) -> i32 {
        PROTOCOL_VERSION
    }

    #[zbus(signal)]
    pub(crate) async fn status_notifier_item_registered(
        ctxt: &SignalContext<'_>,
        service: &str,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    pub(crate) async fn status_notifier_item_unregistered(
        ctxt: &SignalContext<'_>,
        service: &str,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    pub(crate) async fn status_notifier_host_registered(ctxt: &SignalContext<'_>) -> zbus::Result<()>;
}
