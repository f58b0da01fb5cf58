use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use zbus::message::Type as MessageType;
use zbus::{Connection, MatchRule, MessageStream, fdo};

use trayline_protocol::constants::{BUS_INTERFACE, BUS_NAME, BUS_PATH, WATCHER_NAME, WATCHER_PATH, member};

use crate::config::HostConfig;
use crate::error::HostError;
use crate::event::HostEvent;
use crate::item::TrackedItem;
use crate::tracker::{self, Tracker};
use crate::watcher::WatcherObject;

/// Shell-side tracker: owns the watcher name and mirrors every registered
/// item's properties.
pub struct Host {
    tracker: Arc<Tracker>,
    events: Mutex<Option<mpsc::Receiver<HostEvent>>>,
    cancel: CancellationToken,
    stopped: AtomicBool,
}

impl Host {
    /// Serves the watcher on `conn`, claims its name and starts the signal
    /// loop. Fails if another watcher already owns the name.
    pub async fn start(conn: Connection, config: HostConfig) -> Result<Self, HostError> {
        // Subscribe before anything can be said to us.
        let stream = MessageStream::from(&conn);
        let dbus = fdo::DBusProxy::new(&conn).await?;
        let owner_changes = MatchRule::builder()
            .msg_type(MessageType::Signal)
            .sender(BUS_NAME)?
            .path(BUS_PATH)?
            .interface(BUS_INTERFACE)?
            .member(member::NAME_OWNER_CHANGED)?
            .build();
        dbus.add_match_rule(owner_changes).await?;

        let (tx, rx) = mpsc::channel(config.event_buffer.max(1));
        let tracker = Arc::new(Tracker::new(conn.clone(), dbus, config, tx));
        conn.object_server()
            .at(WATCHER_PATH, WatcherObject::new(&tracker))
            .await?;
        conn.request_name(WATCHER_NAME).await?;
        tracker.register_self();
        info!(unique = ?conn.unique_name().map(|n| n.as_str()), "watcher started");

        let cancel = CancellationToken::new();
        let (signals, signals_rx) = mpsc::unbounded_channel();
        tokio::spawn(tracker::forward(stream, signals, cancel.clone()));
        tokio::spawn(tracker::run(Arc::clone(&tracker), signals_rx, cancel.clone()));

        Ok(Self {
            tracker,
            events: Mutex::new(Some(rx)),
            cancel,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.tracker.conn
    }

    pub fn config(&self) -> &HostConfig {
        &self.tracker.config
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&self) -> Option<mpsc::Receiver<HostEvent>> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// The item registered by connection `sender`.
    pub fn item(&self, sender: &str) -> Option<Arc<TrackedItem>> {
        self.tracker.item(sender)
    }

    pub fn item_by_service(&self, service: &str) -> Option<Arc<TrackedItem>> {
        self.tracker
            .all_items()
            .into_iter()
            .find(|item| item.service() == service)
    }

    /// Tracked items ordered by sender.
    pub fn items(&self) -> Vec<Arc<TrackedItem>> {
        self.tracker.all_items()
    }

    /// Stops the signal loop, which then releases the watcher name.
    /// Idempotent.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        info!("watcher stopped");
    }

    pub fn is_shut_down(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.shutdown();
    }
}
