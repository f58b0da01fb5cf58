//! Per-sender item tracking and the single signal-processing loop.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use zbus::names::InterfaceName;
use zbus::proxy::CacheProperties;
use zbus::zvariant;
use zbus::{Connection, MatchRule, MessageStream, SignalContext, fdo};

use trayline_protocol::constants::{
    BUS_INTERFACE, BUS_NAME, ITEM_INTERFACE, ITEM_REFRESH_SIGNALS, MENU_INTERFACE, MENU_SIGNALS,
    PROPERTIES_INTERFACE, WATCHER_INTERFACE, WATCHER_NAME, WATCHER_PATH, member,
};
use trayline_protocol::wire::dict_from_zvariant;
use trayline_protocol::{NameOwnerChanged, PropertiesChanged, Signal, Value};

use crate::config::{HostConfig, InvalidatedPolicy};
use crate::event::HostEvent;
use crate::item::TrackedItem;
use crate::watcher::WatcherObject;

const REGISTERED_ITEMS: &str = "RegisteredStatusNotifierItems";

pub(crate) struct Tracker {
    pub(crate) conn: Connection,
    dbus: fdo::DBusProxy<'static>,
    pub(crate) config: HostConfig,
    items: Mutex<HashMap<String, Arc<TrackedItem>>>,
    /// Unique names of registered hosts.
    hosts: Mutex<BTreeSet<String>>,
    events: mpsc::Sender<HostEvent>,
}

impl Tracker {
    pub(crate) fn new(
        conn: Connection,
        dbus: fdo::DBusProxy<'static>,
        config: HostConfig,
        events: mpsc::Sender<HostEvent>,
    ) -> Self {
        Self {
            conn,
            dbus,
            config,
            items: Mutex::new(HashMap::new()),
            hosts: Mutex::new(BTreeSet::new()),
            events,
        }
    }

    fn items(&self) -> MutexGuard<'_, HashMap<String, Arc<TrackedItem>>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hosts(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.hosts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn item(&self, sender: &str) -> Option<Arc<TrackedItem>> {
        self.items().get(sender).cloned()
    }

    /// Tracked items ordered by sender.
    pub(crate) fn all_items(&self) -> Vec<Arc<TrackedItem>> {
        let mut items: Vec<_> = self.items().values().cloned().collect();
        items.sort_by(|a, b| a.sender().cmp(b.sender()));
        items
    }

    pub(crate) fn registered_services(&self) -> Vec<String> {
        self.all_items()
            .iter()
            .map(|item| item.service().to_string())
            .collect()
    }

    pub(crate) fn has_host(&self) -> bool {
        !self.hosts().is_empty()
    }

    fn send(&self, event: HostEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(sender = %event.sender(), "host event buffer full; event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    fn signal_context(&self) -> Option<SignalContext<'_>> {
        SignalContext::new(&self.conn, WATCHER_PATH)
            .inspect_err(|e| debug!("watcher signals unavailable: {e}"))
            .ok()
    }

    /// Announces the new value of one of the watcher's own properties.
    async fn watcher_property_changed(&self, name: &str, value: zvariant::Value<'_>) {
        let Some(ctxt) = self.signal_context() else {
            return;
        };
        let changed = HashMap::from([(name, &value)]);
        if let Err(e) = fdo::Properties::properties_changed(
            &ctxt,
            InterfaceName::from_static_str_unchecked(WATCHER_INTERFACE),
            &changed,
            &[],
        )
        .await
        {
            debug!(property = name, "change not sent: {e}");
        }
    }

    async fn items_changed(&self) {
        let services = self.registered_services();
        self.watcher_property_changed(REGISTERED_ITEMS, zvariant::Value::from(services))
            .await;
    }

    /// `unregistered -> registered`. Idempotent per sender.
    pub(crate) async fn register_item(&self, sender: &str, service: &str) -> fdo::Result<()> {
        let item = {
            let mut items = self.items();
            if items.contains_key(sender) {
                debug!(sender, service, "item already registered, ignoring");
                return Ok(());
            }
            let item = TrackedItem::new(sender, service)
                .map_err(|e| fdo::Error::InvalidArgs(format!("cannot track {service}: {e}")))?;
            let item = Arc::new(item);
            items.insert(sender.to_string(), Arc::clone(&item));
            item
        };
        for rule in item.rules() {
            if let Err(e) = self.dbus.add_match_rule(MatchRule::clone(rule)).await {
                self.items().remove(sender);
                return Err(e);
            }
        }
        info!(sender, service = %item.service(), "item registered");

        self.fetch(&item).await;

        if let Some(ctxt) = self.signal_context()
            && let Err(e) = WatcherObject::status_notifier_item_registered(&ctxt, item.service()).await
        {
            debug!("item registration not announced: {e}");
        }
        self.items_changed().await;
        self.send(HostEvent::ItemRegistered {
            sender: sender.to_string(),
            service: item.service().to_string(),
        });
        Ok(())
    }

    pub(crate) async fn register_host(&self, sender: &str, service: &str) {
        if !self.hosts().insert(sender.to_string()) {
            return;
        }
        info!(sender, service, "host registered");
        if let Some(ctxt) = self.signal_context()
            && let Err(e) = WatcherObject::status_notifier_host_registered(&ctxt).await
        {
            debug!("host registration not announced: {e}");
        }
    }

    /// Records the tracker's own connection as a host.
    pub(crate) fn register_self(&self) {
        if let Some(name) = self.conn.unique_name() {
            self.hosts().insert(name.to_string());
        }
    }

    /// `registered -> removed`.
    async fn remove_item(&self, sender: &str) {
        let Some(item) = self.items().remove(sender) else {
            return;
        };
        for rule in item.rules() {
            if let Err(e) = self.dbus.remove_match_rule(MatchRule::clone(rule)).await {
                debug!(sender, "match rule not removed: {e}");
            }
        }
        info!(sender, service = %item.service(), "item removed");
        if let Some(ctxt) = self.signal_context()
            && let Err(e) =
                WatcherObject::status_notifier_item_unregistered(&ctxt, item.service()).await
        {
            debug!("item removal not announced: {e}");
        }
        self.items_changed().await;
        self.send(HostEvent::ItemRemoved {
            sender: sender.to_string(),
            service: item.service().to_string(),
        });
    }

    /// Releases the watcher name and withdraws the watcher object.
    async fn withdraw(&self) {
        if let Err(e) = self.conn.release_name(WATCHER_NAME).await {
            debug!("watcher name not released: {e}");
        }
        if let Err(e) = self
            .conn
            .object_server()
            .remove::<WatcherObject, _>(WATCHER_PATH)
            .await
        {
            debug!("watcher object not removed: {e}");
        }
    }

    /// Pulls the full property set. A failed pull keeps the previous values.
    async fn fetch(&self, item: &TrackedItem) -> Vec<String> {
        let pull = async {
            let proxy = fdo::PropertiesProxy::builder(&self.conn)
                .destination(item.sender())?
                .path(item.path())?
                .cache_properties(CacheProperties::No)
                .build()
                .await?;
            let props = proxy
                .get_all(Some(InterfaceName::from_static_str_unchecked(ITEM_INTERFACE)).into())
                .await?;
            Ok::<_, zbus::Error>(props)
        };
        let props = match tokio::time::timeout(self.config.fetch_timeout(), pull).await {
            Ok(Ok(props)) => props,
            Ok(Err(e)) => {
                warn!(sender = %item.sender(), "property pull failed: {e}");
                return Vec::new();
            }
            Err(_) => {
                warn!(sender = %item.sender(), "property pull timed out");
                return Vec::new();
            }
        };
        self.merge(item, &dict_from_zvariant(&props))
    }

    fn merge(&self, item: &TrackedItem, props: &BTreeMap<String, Value>) -> Vec<String> {
        let applied = item.properties().apply(props);
        for e in &applied.errors {
            warn!(sender = %item.sender(), "skipping property: {e}");
        }
        applied.changed
    }

    async fn on_signal(&self, signal: Signal) {
        if signal.sender == BUS_NAME && signal.is(BUS_INTERFACE, member::NAME_OWNER_CHANGED) {
            match NameOwnerChanged::from_signal(&signal) {
                Ok(change) if change.is_disappearance() => {
                    self.remove_item(&change.old_owner).await;
                    if self.hosts().remove(&change.old_owner) {
                        debug!(sender = %change.old_owner, "host went away");
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("ignoring signal: {e}"),
            }
            return;
        }

        let Some(item) = self.item(&signal.sender) else {
            trace!(sender = %signal.sender, signal = %signal.name(), "signal from untracked sender");
            return;
        };

        if signal.is(PROPERTIES_INTERFACE, member::PROPERTIES_CHANGED) {
            self.on_properties_changed(&item, &signal).await;
        } else if signal.interface == ITEM_INTERFACE
            && ITEM_REFRESH_SIGNALS.contains(&signal.member.as_str())
        {
            debug!(sender = %signal.sender, signal = %signal.member, "refreshing properties");
            let changed = self.fetch(&item).await;
            self.properties_updated(&item, changed);
        } else if signal.interface == MENU_INTERFACE
            && MENU_SIGNALS.contains(&signal.member.as_str())
        {
            self.send(HostEvent::MenuChanged {
                sender: signal.sender.clone(),
                member: signal.member.clone(),
            });
        }
    }

    async fn on_properties_changed(&self, item: &TrackedItem, signal: &Signal) {
        let change = match PropertiesChanged::from_signal(signal) {
            Ok(change) => change,
            Err(e) => {
                warn!(sender = %signal.sender, "ignoring signal: {e}");
                return;
            }
        };
        if change.interface != ITEM_INTERFACE {
            debug!(sender = %signal.sender, interface = %change.interface, "ignoring foreign properties");
            return;
        }

        let mut changed = self.merge(item, &change.changed);
        if !change.invalidated.is_empty() {
            match self.config.invalidated_policy {
                InvalidatedPolicy::Ignore => {}
                InvalidatedPolicy::Clear => {
                    changed.extend(item.properties().clear(&change.invalidated));
                }
                InvalidatedPolicy::Refetch => changed.extend(self.fetch(item).await),
            }
        }
        self.properties_updated(item, changed);
    }

    fn properties_updated(&self, item: &TrackedItem, changed: Vec<String>) {
        if changed.is_empty() {
            return;
        }
        debug!(sender = %item.sender(), ?changed, "properties updated");
        self.send(HostEvent::PropertiesUpdated {
            sender: item.sender().to_string(),
            changed,
        });
    }
}

/// Moves signals off the connection's message stream so the connection
/// never waits on the tracker, which itself awaits replies.
pub(crate) async fn forward(
    mut stream: MessageStream,
    signals: mpsc::UnboundedSender<Signal>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            message = stream.next() => {
                let message = match message {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        warn!("unreadable message: {e}");
                        continue;
                    }
                    None => break,
                };
                if let Some(signal) = Signal::from_message(&message)
                    && signals.send(signal).is_err()
                {
                    break;
                }
            }
        }
    }
}

/// Consumes signals one at a time, in arrival order. Withdraws the watcher
/// when cancelled.
pub(crate) async fn run(
    tracker: Arc<Tracker>,
    mut signals: mpsc::UnboundedReceiver<Signal>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            signal = signals.recv() => {
                let Some(signal) = signal else {
                    debug!("signal stream ended");
                    break;
                };
                tracker.on_signal(signal).await;
            }
        }
    }
    tracker.withdraw().await;
    debug!("host signal loop stopped");
}
