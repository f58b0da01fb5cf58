//! Application side of the status-notifier protocol.
//!
//! The [`Publisher`] claims the item's well-known name on a bus connection,
//! exports the item object and registers it with the watcher. After that
//! the shell drives everything: it pulls properties with `Get`/`GetAll`
//! and the publisher only emits one `PropertiesChanged` per field that
//! changes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zbus::fdo::{self, NameOwnerChanged};
use zbus::names::InterfaceName;
use zbus::proxy::CacheProperties;
use zbus::zvariant::{self, OwnedObjectPath};
use zbus::{Connection, SignalContext, interface};

use trayline_protocol::constants::{
    ITEM_INTERFACE, ITEM_PATH, MENU_PATH, WATCHER_NAME, item_service_name, member, prop,
};
use trayline_protocol::proxy::StatusNotifierWatcherProxy;
use trayline_protocol::wire::error_name;
use trayline_protocol::{
    Category, IconPixmap, ItemProperties, PixmapWire, ScrollDirection, ScrollOrientation, Status,
    ToolTip, ToolTipWire,
};

use crate::config::NotifierConfig;
use crate::error::NotifierError;
use crate::icon::{IconError, pixmap_from_bytes};

const SERVICE_UNKNOWN: &str = "org.freedesktop.DBus.Error.ServiceUnknown";

/// Handler for the pointer interactions; receives the screen coordinates.
pub type ClickHandler = Arc<dyn Fn(i32, i32) + Send + Sync>;

pub type ScrollHandler = Arc<dyn Fn(ScrollDirection) + Send + Sync>;

#[derive(Default, Clone)]
struct Handlers {
    activate: Option<ClickHandler>,
    secondary_activate: Option<ClickHandler>,
    context_menu: Option<ClickHandler>,
    scroll: Option<ScrollHandler>,
}

/// The exported `org.kde.StatusNotifierItem` object.
struct ItemObject {
    properties: Arc<ItemProperties>,
    handlers: Arc<RwLock<Handlers>>,
}

impl ItemObject {
    fn handlers(&self) -> Handlers {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[interface(name = "org.kde.StatusNotifierItem")]
impl ItemObject {
    fn activate(&self, x: i32, y: i32) -> fdo::Result<()> {
        invoke(member::ACTIVATE, self.handlers().activate.as_ref(), x, y)
    }

    fn context_menu(&self, x: i32, y: i32) -> fdo::Result<()> {
        invoke(member::CONTEXT_MENU, self.handlers().context_menu.as_ref(), x, y)
    }

    fn secondary_activate(&self, x: i32, y: i32) -> fdo::Result<()> {
        let handlers = self.handlers();
        // Middle click falls back to the context menu handler.
        let handler = handlers
            .secondary_activate
            .as_ref()
            .or(handlers.context_menu.as_ref());
        invoke(member::SECONDARY_ACTIVATE, handler, x, y)
    }

    fn scroll(&self, delta: i32, orientation: String) -> fdo::Result<()> {
        let Some(scroll) = self.handlers().scroll else {
            return Err(unsupported(member::SCROLL));
        };
        let direction = ScrollDirection::from_delta(delta, ScrollOrientation::parse(&orientation));
        debug!(delta, ?direction, "scroll");
        scroll(direction);
        Ok(())
    }

    #[zbus(property)]
    fn id(&self) -> String {
        self.properties.id.get()
    }

    #[zbus(property)]
    fn item_is_menu(&self) -> bool {
        self.properties.item_is_menu.get()
    }

    #[zbus(property)]
    fn title(&self) -> String {
        self.properties.title.get()
    }

    #[zbus(property)]
    fn icon_theme_path(&self) -> String {
        self.properties.icon_theme_path.get()
    }

    #[zbus(property)]
    fn icon_pixmap(&self) -> Vec<PixmapWire> {
        self.properties
            .icon_pixmap
            .with(|pixmaps| IconPixmap::list_to_wire(pixmaps))
    }

    #[zbus(property)]
    fn category(&self) -> String {
        self.properties.category.get()
    }

    #[zbus(property)]
    fn status(&self) -> String {
        self.properties.status.get()
    }

    #[zbus(property)]
    fn tool_tip(&self) -> ToolTipWire {
        self.properties.tooltip.with(ToolTip::to_wire)
    }

    #[zbus(property)]
    fn menu(&self) -> fdo::Result<OwnedObjectPath> {
        OwnedObjectPath::try_from(self.properties.menu.get())
            .map_err(|e| fdo::Error::Failed(e.to_string()))
    }
}

fn unsupported(method: &str) -> fdo::Error {
    fdo::Error::UnknownMethod(format!("{method}: no handler set"))
}

fn invoke(method: &str, handler: Option<&ClickHandler>, x: i32, y: i32) -> fdo::Result<()> {
    let handler = handler.ok_or_else(|| unsupported(method))?;
    debug!(method, x, y, "interaction");
    handler(x, y);
    Ok(())
}

/// One property change waiting to be announced.
struct Change {
    property: &'static str,
    value: zvariant::Value<'static>,
}

/// Registers the item's name with the watcher.
#[derive(Clone)]
struct Registrar {
    conn: Connection,
    service_name: String,
    timeout: Duration,
}

impl Registrar {
    async fn register(&self) -> bool {
        let call = async {
            let watcher = StatusNotifierWatcherProxy::builder(&self.conn)
                .cache_properties(CacheProperties::No)
                .build()
                .await?;
            watcher
                .register_status_notifier_item(&self.service_name)
                .await
        };
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(())) => {
                info!(name = %self.service_name, "registered with watcher");
                true
            }
            Ok(Err(e)) if error_name(&e).as_deref() == Some(SERVICE_UNKNOWN) => {
                info!(
                    name = %self.service_name,
                    "no watcher on the bus, registering when one appears"
                );
                false
            }
            Ok(Err(e)) => {
                warn!(name = %self.service_name, "failed to register with watcher: {e}");
                false
            }
            Err(_) => {
                warn!(name = %self.service_name, "watcher did not answer in time");
                false
            }
        }
    }
}

/// Announces property changes in order and re-registers whenever a
/// watcher takes over the watcher name. Withdraws the item on cancel.
async fn run(
    registrar: Registrar,
    mut changes: mpsc::UnboundedReceiver<Change>,
    mut watcher_owner: impl Stream<Item = NameOwnerChanged> + Unpin,
    cancel: CancellationToken,
) {
    let conn = registrar.conn.clone();
    let mut watching = true;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            change = changes.recv() => {
                let Some(change) = change else { break };
                if let Err(e) = emit_change(&conn, &change).await {
                    warn!(property = change.property, "failed to emit change: {e}");
                }
            }

            signal = watcher_owner.next(), if watching => {
                let Some(signal) = signal else {
                    debug!("watcher owner stream ended");
                    watching = false;
                    continue;
                };
                let args = match signal.args() {
                    Ok(args) => args,
                    Err(e) => {
                        warn!("ignoring signal: {e}");
                        continue;
                    }
                };
                match &**args.new_owner() {
                    Some(owner) => {
                        info!(owner = %owner, "watcher appeared");
                        registrar.register().await;
                    }
                    None => info!("watcher went away"),
                }
            }
        }
    }
    withdraw(&conn, &registrar.service_name).await;
}

async fn emit_change(conn: &Connection, change: &Change) -> zbus::Result<()> {
    let ctxt = SignalContext::new(conn, ITEM_PATH)?;
    let changed = HashMap::from([(change.property, &change.value)]);
    fdo::Properties::properties_changed(
        &ctxt,
        InterfaceName::from_static_str_unchecked(ITEM_INTERFACE),
        &changed,
        &[],
    )
    .await
}

async fn withdraw(conn: &Connection, service_name: &str) {
    if let Err(e) = conn.release_name(service_name).await {
        debug!(name = service_name, "name not released: {e}");
    }
    if let Err(e) = conn.object_server().remove::<ItemObject, _>(ITEM_PATH).await {
        debug!("item object not removed: {e}");
    }
    info!(name = service_name, "item withdrawn");
}

/// A published status-notifier item.
pub struct Publisher {
    conn: Connection,
    service_name: String,
    properties: Arc<ItemProperties>,
    handlers: Arc<RwLock<Handlers>>,
    registrar: Registrar,
    changes: mpsc::UnboundedSender<Change>,
    cancel: CancellationToken,
    stopped: AtomicBool,
}

impl Publisher {
    /// Exports the item on `conn` and registers it.
    ///
    /// Failing to claim the item name is fatal. A missing watcher is not:
    /// registration is retried when one appears.
    pub async fn start(conn: Connection, config: &NotifierConfig) -> Result<Self, NotifierError> {
        let publisher = Self::bind(conn, config).await?;
        publisher.register().await;
        Ok(publisher)
    }

    /// Exports the item and claims its name without registering.
    ///
    /// Use this to export more objects on [`Publisher::connection`] before
    /// calling [`Publisher::register`].
    pub async fn bind(conn: Connection, config: &NotifierConfig) -> Result<Self, NotifierError> {
        let service_name = item_service_name(std::process::id(), config.id);

        let properties = Arc::new(ItemProperties::new());
        properties.id.set(service_name.clone());
        properties.title.set(config.title.clone());
        properties.category.set(config.category.as_str().to_string());
        properties.status.set(config.status.as_str().to_string());
        properties.icon_theme_path.set(config.icon_theme_path.clone());
        properties.item_is_menu.set(config.item_is_menu);
        properties.menu.set(MENU_PATH.to_string());

        let handlers = Arc::new(RwLock::new(Handlers::default()));
        let object = ItemObject {
            properties: Arc::clone(&properties),
            handlers: Arc::clone(&handlers),
        };
        conn.object_server().at(ITEM_PATH, object).await?;
        conn.request_name(service_name.as_str()).await?;
        info!(
            name = %service_name,
            unique = ?conn.unique_name().map(|n| n.as_str()),
            "item published"
        );

        let dbus = fdo::DBusProxy::new(&conn).await?;
        let watcher_owner = dbus
            .receive_name_owner_changed_with_args(&[(0, WATCHER_NAME)])
            .await?;

        let registrar = Registrar {
            conn: conn.clone(),
            service_name: service_name.clone(),
            timeout: config.call_timeout(),
        };
        let (changes, changes_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(run(
            registrar.clone(),
            changes_rx,
            watcher_owner,
            cancel.clone(),
        ));

        Ok(Self {
            conn,
            service_name,
            properties,
            handlers,
            registrar,
            changes,
            cancel,
            stopped: AtomicBool::new(false),
        })
    }

    /// Well-known name owned by this item.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn properties(&self) -> &Arc<ItemProperties> {
        &self.properties
    }

    /// Registers with the watcher again. Returns whether it succeeded.
    pub async fn register(&self) -> bool {
        self.registrar.register().await
    }

    pub fn on_activate(&self, f: impl Fn(i32, i32) + Send + Sync + 'static) {
        self.with_handlers(|h| h.activate = Some(Arc::new(f)));
    }

    pub fn on_secondary_activate(&self, f: impl Fn(i32, i32) + Send + Sync + 'static) {
        self.with_handlers(|h| h.secondary_activate = Some(Arc::new(f)));
    }

    pub fn on_context_menu(&self, f: impl Fn(i32, i32) + Send + Sync + 'static) {
        self.with_handlers(|h| h.context_menu = Some(Arc::new(f)));
    }

    pub fn on_scroll(&self, f: impl Fn(ScrollDirection) + Send + Sync + 'static) {
        self.with_handlers(|h| h.scroll = Some(Arc::new(f)));
    }

    fn with_handlers(&self, f: impl FnOnce(&mut Handlers)) {
        f(&mut self.handlers.write().unwrap_or_else(PoisonError::into_inner));
    }

    pub fn set_title(&self, title: &str) {
        self.properties.title.set(title.to_string());
        self.announce(prop::TITLE, zvariant::Value::from(title.to_string()));
    }

    pub fn set_tooltip(&self, tooltip: ToolTip) {
        let wire = tooltip.to_wire();
        self.properties.tooltip.set(tooltip);
        self.announce(prop::TOOLTIP, zvariant::Value::from(wire));
    }

    /// Replaces the tooltip title, keeping its icon and subtitle.
    pub fn set_tooltip_title(&self, title: &str) {
        let mut tooltip = self.properties.tooltip.get();
        tooltip.title = title.to_string();
        self.set_tooltip(tooltip);
    }

    /// Sets the icon from an encoded image. A decode failure leaves the
    /// current icon in place.
    pub fn set_icon(&self, data: &[u8]) -> Result<(), IconError> {
        let pixmap = pixmap_from_bytes(data)?;
        let pixmaps = if pixmap.is_empty() { Vec::new() } else { vec![pixmap] };
        self.set_icon_pixmaps(pixmaps);
        Ok(())
    }

    pub fn set_icon_pixmaps(&self, pixmaps: Vec<IconPixmap>) {
        let wire = IconPixmap::list_to_wire(&pixmaps);
        self.properties.icon_pixmap.set(pixmaps);
        self.announce(prop::ICON_PIXMAP, zvariant::Value::from(wire));
    }

    pub fn set_icon_theme_path(&self, path: &str) {
        self.properties.icon_theme_path.set(path.to_string());
        self.announce(prop::ICON_THEME_PATH, zvariant::Value::from(path.to_string()));
    }

    pub fn set_status(&self, status: Status) {
        self.properties.status.set(status.as_str().to_string());
        self.announce(prop::STATUS, zvariant::Value::from(status.as_str()));
    }

    pub fn set_category(&self, category: Category) {
        self.properties.category.set(category.as_str().to_string());
        self.announce(prop::CATEGORY, zvariant::Value::from(category.as_str()));
    }

    pub fn set_item_is_menu(&self, item_is_menu: bool) {
        self.properties.item_is_menu.set(item_is_menu);
        self.announce(prop::ITEM_IS_MENU, zvariant::Value::from(item_is_menu));
    }

    fn announce(&self, property: &'static str, value: zvariant::Value<'static>) {
        if self.changes.send(Change { property, value }).is_err() {
            debug!(property, "item withdrawn; change not announced");
        }
    }

    /// Stops the background task, which releases the name and removes the
    /// item object. Idempotent.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use trayline_protocol::constants::{PROPERTIES_INTERFACE, WATCHER_PATH, member};
    use trayline_protocol::proxy::StatusNotifierItemProxy;
    use trayline_protocol::testing::PrivateBus;
    use trayline_protocol::{PropertiesChanged, Signal, Value};
    use zbus::message::Header;
    use zbus::names::BusName;
    use zbus::{MatchRule, MessageStream};

    use super::*;

    type Registered = Arc<Mutex<Vec<(String, String)>>>;

    struct FakeWatcher {
        registered: Registered,
    }

    #[interface(name = "org.kde.StatusNotifierWatcher")]
    impl FakeWatcher {
        fn register_status_notifier_item(&self, #[zbus(header)] header: Header<'_>, service: String) {
            let sender = header.sender().map(|s| s.to_string()).unwrap_or_default();
            self.registered.lock().unwrap().push((sender, service));
        }
    }

    async fn start_watcher(bus: &PrivateBus) -> (Connection, Registered) {
        let conn = bus.connect().await.unwrap();
        let registered = Registered::default();
        let watcher = FakeWatcher {
            registered: Arc::clone(&registered),
        };
        conn.object_server().at(WATCHER_PATH, watcher).await.unwrap();
        conn.request_name(WATCHER_NAME).await.unwrap();
        (conn, registered)
    }

    fn config() -> NotifierConfig {
        NotifierConfig {
            title: "App".into(),
            ..NotifierConfig::default()
        }
    }

    async fn publish(bus: &PrivateBus) -> Publisher {
        Publisher::start(bus.connect().await.unwrap(), &config())
            .await
            .unwrap()
    }

    async fn item_proxy<'a>(client: &Connection, publisher: &'a Publisher) -> StatusNotifierItemProxy<'a> {
        StatusNotifierItemProxy::builder(client)
            .destination(publisher.service_name())
            .unwrap()
            .cache_properties(CacheProperties::No)
            .build()
            .await
            .unwrap()
    }

    async fn properties_proxy<'a>(client: &Connection, publisher: &'a Publisher) -> fdo::PropertiesProxy<'a> {
        fdo::PropertiesProxy::builder(client)
            .destination(publisher.service_name())
            .unwrap()
            .path(ITEM_PATH)
            .unwrap()
            .build()
            .await
            .unwrap()
    }

    fn item_interface() -> InterfaceName<'static> {
        InterfaceName::from_static_str_unchecked(ITEM_INTERFACE)
    }

    async fn eventually(mut done: impl FnMut() -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(tokio::time::Instant::now() < deadline, "condition never held");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn start_registers_service_name() {
        let Some(bus) = PrivateBus::start().await else { return };
        let (_conn, registered) = start_watcher(&bus).await;
        let publisher = publish(&bus).await;

        let unique = publisher.connection().unique_name().unwrap().to_string();
        assert_eq!(
            registered.lock().unwrap().clone(),
            vec![(unique, publisher.service_name().to_string())]
        );
        assert!(publisher.service_name().starts_with("org.kde.StatusNotifierItem-"));
        assert!(publisher.service_name().ends_with("-1"));
    }

    #[tokio::test]
    async fn registration_is_deferred_until_watcher_appears() {
        let Some(bus) = PrivateBus::start().await else { return };
        let publisher = publish(&bus).await;

        let (_conn, registered) = start_watcher(&bus).await;
        eventually(|| !registered.lock().unwrap().is_empty()).await;
        assert_eq!(registered.lock().unwrap()[0].1, publisher.service_name());
    }

    #[tokio::test]
    async fn second_publisher_with_same_id_fails() {
        let Some(bus) = PrivateBus::start().await else { return };
        let _first = publish(&bus).await;
        let err = Publisher::start(bus.connect().await.unwrap(), &config())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, NotifierError::Bus(zbus::Error::NameTaken)), "{err}");
    }

    #[tokio::test]
    async fn get_and_get_all_serve_properties() {
        let Some(bus) = PrivateBus::start().await else { return };
        let publisher = publish(&bus).await;
        let client = bus.connect().await.unwrap();
        let props = properties_proxy(&client, &publisher).await;

        let title = props.get(item_interface(), prop::TITLE).await.unwrap();
        assert_eq!(Value::from_zvariant(&title), Value::from("App"));

        let all = props.get_all(Some(item_interface()).into()).await.unwrap();
        assert_eq!(Value::from_zvariant(&all[prop::STATUS]), Value::from("Active"));
        assert_eq!(
            Value::from_zvariant(&all[prop::CATEGORY]),
            Value::from("ApplicationStatus")
        );
        assert_eq!(
            Value::from_zvariant(&all[prop::MENU]),
            Value::ObjectPath(MENU_PATH.into())
        );
        assert_eq!(Value::from_zvariant(&all[prop::TOOLTIP]).signature(), "(sayss)");
        assert_eq!(all.len(), prop::ALL.len());

        let err = props.get(item_interface(), "Bogus").await.unwrap_err();
        assert!(matches!(err, fdo::Error::UnknownProperty(_)), "{err}");

        let other = InterfaceName::from_static_str_unchecked("org.example.Other");
        let err = props.get_all(Some(other).into()).await.unwrap_err();
        assert!(matches!(err, fdo::Error::UnknownInterface(_)), "{err}");
    }

    #[tokio::test]
    async fn interactions_without_handlers_are_unsupported() {
        let Some(bus) = PrivateBus::start().await else { return };
        let publisher = publish(&bus).await;
        let client = bus.connect().await.unwrap();
        let item = item_proxy(&client, &publisher).await;

        let unknown = Some("org.freedesktop.DBus.Error.UnknownMethod".to_string());
        assert_eq!(error_name(&item.activate(0, 0).await.unwrap_err()), unknown);
        assert_eq!(error_name(&item.context_menu(0, 0).await.unwrap_err()), unknown);
        assert_eq!(
            error_name(&item.secondary_activate(0, 0).await.unwrap_err()),
            unknown
        );
    }

    #[tokio::test]
    async fn activate_invokes_handler_with_coordinates() {
        let Some(bus) = PrivateBus::start().await else { return };
        let publisher = publish(&bus).await;
        let client = bus.connect().await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        publisher.on_activate(move |x, y| s.lock().unwrap().push((x, y)));

        item_proxy(&client, &publisher).await.activate(10, 20).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(10, 20)]);

        let wrong_args = client
            .call_method(
                Some(publisher.service_name()),
                ITEM_PATH,
                Some(ITEM_INTERFACE),
                member::ACTIVATE,
                &("x",),
            )
            .await;
        assert!(wrong_args.is_err());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn secondary_activate_falls_back_to_context_menu() {
        let Some(bus) = PrivateBus::start().await else { return };
        let publisher = publish(&bus).await;
        let client = bus.connect().await.unwrap();
        let item = item_proxy(&client, &publisher).await;

        let menu = Arc::new(AtomicUsize::new(0));
        let m = Arc::clone(&menu);
        publisher.on_context_menu(move |_, _| {
            m.fetch_add(1, Ordering::SeqCst);
        });

        item.secondary_activate(1, 2).await.unwrap();
        assert_eq!(menu.load(Ordering::SeqCst), 1);

        let middle = Arc::new(AtomicUsize::new(0));
        let m = Arc::clone(&middle);
        publisher.on_secondary_activate(move |_, _| {
            m.fetch_add(1, Ordering::SeqCst);
        });
        item.secondary_activate(1, 2).await.unwrap();
        assert_eq!(middle.load(Ordering::SeqCst), 1);
        assert_eq!(menu.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn scroll_unsupported_then_right() {
        let Some(bus) = PrivateBus::start().await else { return };
        let publisher = publish(&bus).await;
        let client = bus.connect().await.unwrap();
        let item = item_proxy(&client, &publisher).await;

        let err = item.scroll(5, "horizontal").await.unwrap_err();
        assert_eq!(
            error_name(&err).as_deref(),
            Some("org.freedesktop.DBus.Error.UnknownMethod")
        );

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        publisher.on_scroll(move |dir| s.lock().unwrap().push(dir));

        item.scroll(5, "horizontal").await.unwrap();
        item.scroll(-3, "vertical").await.unwrap();
        item.scroll(2, "Horizontal").await.unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![ScrollDirection::Right, ScrollDirection::Down, ScrollDirection::Up]
        );
    }

    #[tokio::test]
    async fn setters_emit_one_properties_changed_each() {
        let Some(bus) = PrivateBus::start().await else { return };
        let publisher = publish(&bus).await;
        let listener = bus.connect().await.unwrap();
        let rule = MatchRule::builder()
            .msg_type(zbus::message::Type::Signal)
            .sender(publisher.service_name())
            .unwrap()
            .interface(PROPERTIES_INTERFACE)
            .unwrap()
            .build();
        let mut stream = MessageStream::for_match_rule(rule, &listener, None)
            .await
            .unwrap();

        publisher.set_title("App2");
        assert_eq!(publisher.properties().title.get(), "App2");
        publisher.set_tooltip_title("Hello");
        publisher.set_status(Status::NeedsAttention);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let msg = tokio::time::timeout(Duration::from_secs(2), stream.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            let signal = Signal::from_message(&msg).unwrap();
            let change = PropertiesChanged::from_signal(&signal).unwrap();
            assert_eq!(change.interface, ITEM_INTERFACE);
            assert_eq!(change.changed.len(), 1);
            seen.push(change.changed);
        }
        assert_eq!(seen[0][prop::TITLE], Value::from("App2"));
        assert_eq!(
            ToolTip::from_value(&seen[1][prop::TOOLTIP]).unwrap().title,
            "Hello"
        );
        assert_eq!(seen[2][prop::STATUS], Value::from("NeedsAttention"));
    }

    #[tokio::test]
    async fn bad_icon_keeps_previous_pixmap() {
        let Some(bus) = PrivateBus::start().await else { return };
        let publisher = publish(&bus).await;
        publisher.set_icon_pixmaps(vec![IconPixmap {
            width: 1,
            height: 1,
            data: vec![0xFF, 1, 2, 3],
        }]);

        assert!(publisher.set_icon(b"nope").is_err());
        assert_eq!(publisher.properties().icon_pixmap.get().len(), 1);

        publisher.set_icon(&[]).unwrap();
        assert!(publisher.properties().icon_pixmap.get().is_empty());
    }

    #[tokio::test]
    async fn shutdown_releases_name() {
        let Some(bus) = PrivateBus::start().await else { return };
        let publisher = publish(&bus).await;
        let client = bus.connect().await.unwrap();
        let dbus = fdo::DBusProxy::new(&client).await.unwrap();
        let name = BusName::try_from(publisher.service_name().to_string()).unwrap();
        assert!(dbus.name_has_owner(name.clone()).await.unwrap());

        publisher.shutdown();
        publisher.shutdown();
        assert!(publisher.is_shut_down());

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while dbus.name_has_owner(name.clone()).await.unwrap() {
            assert!(tokio::time::Instant::now() < deadline, "name never released");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
