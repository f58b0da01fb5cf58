//! dbusmenu-style export of the indicator menu.
//!
//! Keeps its own copy of the menu tree, fed by the [`NativeBackend`] calls
//! of an [`Indicator`](trayline_menu::Indicator). Every change bumps the
//! layout revision and emits `LayoutUpdated(revision, parent)`. A
//! `clicked` event from the shell goes back through the indicator's
//! [`ClickDispatcher`].
//!
//! [`NativeBackend`]: trayline_menu::NativeBackend

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use zbus::zvariant::{self, OwnedValue, Type};
use zbus::{Connection, SignalContext, fdo, interface};

use trayline_menu::{ClickDispatcher, ItemId, MenuItemState};
use trayline_protocol::Value;
use trayline_protocol::constants::MENU_PATH;
use trayline_protocol::wire::dict_to_zvariant;

/// dbusmenu protocol version reported through the `Version` property.
pub const DBUSMENU_VERSION: u32 = 3;

/// Id of the implicit root node.
const ROOT_ID: i32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Item(MenuItemState),
    Separator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    parent: Option<ItemId>,
    visible: bool,
    kind: NodeKind,
}

/// One node of a `GetLayout` reply with its children.
#[derive(Debug, Clone, PartialEq)]
struct Layout {
    id: i32,
    properties: BTreeMap<String, Value>,
    children: Vec<Layout>,
}

impl Layout {
    fn to_value(&self) -> Value {
        Value::Struct(vec![
            Value::I32(self.id),
            Value::Dict(self.properties.clone()),
            Value::Array(self.children.iter().map(Layout::to_value).collect()),
        ])
    }
}

/// `(ia{sv}av)`; children travel as variants wrapping the same shape.
#[derive(Debug, Serialize, Type)]
struct LayoutWire {
    id: i32,
    properties: HashMap<String, zvariant::Value<'static>>,
    children: Vec<zvariant::Value<'static>>,
}

impl From<&Layout> for LayoutWire {
    fn from(layout: &Layout) -> Self {
        Self {
            id: layout.id,
            properties: dict_to_zvariant(&layout.properties),
            children: layout
                .children
                .iter()
                .map(|child| child.to_value().to_zvariant())
                .collect(),
        }
    }
}

#[derive(Debug, Default)]
struct MenuTree {
    /// Ordered by id, which is creation order.
    nodes: BTreeMap<ItemId, Node>,
    revision: u32,
}

impl MenuTree {
    fn children(&self, parent: Option<ItemId>) -> impl Iterator<Item = (&ItemId, &Node)> {
        self.nodes.iter().filter(move |(_, n)| n.parent == parent)
    }

    fn has_children(&self, id: ItemId) -> bool {
        self.nodes.values().any(|n| n.parent == Some(id))
    }

    fn properties(&self, id: ItemId, node: &Node, filter: &[String]) -> BTreeMap<String, Value> {
        let mut props = BTreeMap::new();
        match &node.kind {
            NodeKind::Separator => {
                props.insert("type".into(), Value::from("separator"));
            }
            NodeKind::Item(state) => {
                props.insert("label".into(), Value::from(state.title.as_str()));
                props.insert("enabled".into(), Value::Bool(!state.disabled));
                if !state.tooltip.is_empty() {
                    props.insert("accessible-desc".into(), Value::from(state.tooltip.as_str()));
                }
                if state.checkable {
                    props.insert("toggle-type".into(), Value::from("checkmark"));
                    props.insert("toggle-state".into(), Value::I32(i32::from(state.checked)));
                }
            }
        }
        props.insert("visible".into(), Value::Bool(node.visible));
        if self.has_children(id) {
            props.insert("children-display".into(), Value::from("submenu"));
        }
        if !filter.is_empty() {
            props.retain(|k, _| filter.contains(k));
        }
        props
    }

    /// Layout of `parent`, descending `depth` levels (negative means
    /// unlimited).
    fn layout(&self, parent: Option<ItemId>, depth: i32, filter: &[String]) -> Layout {
        let (id, properties) = match parent {
            None => {
                let mut props = BTreeMap::new();
                props.insert("children-display".into(), Value::from("submenu"));
                (ROOT_ID, props)
            }
            Some(id) => {
                let props = self
                    .nodes
                    .get(&id)
                    .map(|node| self.properties(id, node, filter))
                    .unwrap_or_default();
                (wire_id(id), props)
            }
        };

        let children = if depth == 0 {
            Vec::new()
        } else {
            self.children(parent)
                .map(|(child, _)| self.layout(Some(*child), depth - 1, filter))
                .collect()
        };

        Layout {
            id,
            properties,
            children,
        }
    }
}

fn wire_id(id: ItemId) -> i32 {
    i32::try_from(id.get()).unwrap_or(i32::MAX)
}

fn parse_id(raw: i32) -> fdo::Result<Option<ItemId>> {
    match raw {
        ROOT_ID => Ok(None),
        n if n > 0 => Ok(Some(ItemId(n.unsigned_abs()))),
        n => Err(fdo::Error::InvalidArgs(format!("invalid menu id {n}"))),
    }
}

/// State shared by the exported object and the [`DbusMenu`] handle.
#[derive(Default)]
struct Shared {
    tree: Mutex<MenuTree>,
    dispatcher: Mutex<Option<ClickDispatcher>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MenuTree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatcher(&self) -> MutexGuard<'_, Option<ClickDispatcher>> {
        self.dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// The `com.canonical.dbusmenu` object served at `/StatusNotifierMenu`.
struct MenuObject {
    shared: Arc<Shared>,
}

#[interface(name = "com.canonical.dbusmenu")]
impl MenuObject {
    fn get_layout(
        &self,
        parent_id: i32,
        recursion_depth: i32,
        property_names: Vec<String>,
    ) -> fdo::Result<(u32, LayoutWire)> {
        let parent = parse_id(parent_id)?;
        let tree = self.shared.lock();
        if let Some(id) = parent
            && !tree.nodes.contains_key(&id)
        {
            return Err(fdo::Error::InvalidArgs(format!("unknown menu id {id}")));
        }
        let layout = tree.layout(parent, recursion_depth, &property_names);
        Ok((tree.revision, LayoutWire::from(&layout)))
    }

    fn event(&self, id: i32, event_id: String, _data: OwnedValue, _timestamp: u32) -> fdo::Result<()> {
        let Some(id) = parse_id(id)? else {
            return Ok(());
        };
        if event_id != "clicked" {
            debug!(id = %id, event = %event_id, "menu event ignored");
            return Ok(());
        }
        let dispatcher = self.shared.dispatcher().clone();
        match dispatcher {
            Some(dispatcher) => {
                dispatcher.dispatch(id);
            }
            None => warn!(id = %id, "menu not attached to an indicator; click dropped"),
        }
        Ok(())
    }

    fn about_to_show(&self, id: i32) -> fdo::Result<bool> {
        parse_id(id)?;
        // The tree is always current; no update needed.
        Ok(false)
    }

    #[zbus(property)]
    fn version(&self) -> u32 {
        DBUSMENU_VERSION
    }

    #[zbus(property)]
    fn text_direction(&self) -> String {
        "ltr".into()
    }

    #[zbus(property)]
    fn status(&self) -> String {
        "normal".into()
    }

    #[zbus(property)]
    fn icon_theme_path(&self) -> Vec<String> {
        Vec::new()
    }

    #[zbus(signal)]
    async fn layout_updated(ctxt: &SignalContext<'_>, revision: u32, parent: i32) -> zbus::Result<()>;
}

/// Emits queued `LayoutUpdated` signals in revision order.
async fn announce(conn: Connection, mut updates: mpsc::UnboundedReceiver<(u32, i32)>) {
    let ctxt = match SignalContext::new(&conn, MENU_PATH) {
        Ok(ctxt) => ctxt,
        Err(e) => {
            warn!("menu updates disabled: {e}");
            return;
        }
    };
    while let Some((revision, parent)) = updates.recv().await {
        if let Err(e) = MenuObject::layout_updated(&ctxt, revision, parent).await {
            debug!(revision, "layout update not sent: {e}");
        }
    }
}

/// Handle to the exported menu.
pub struct DbusMenu {
    shared: Arc<Shared>,
    updates: mpsc::UnboundedSender<(u32, i32)>,
}

impl DbusMenu {
    /// Exports a new, empty menu at `/StatusNotifierMenu` on `conn`.
    pub async fn export(conn: &Connection) -> zbus::Result<Arc<Self>> {
        let shared = Arc::new(Shared::default());
        let object = MenuObject {
            shared: Arc::clone(&shared),
        };
        conn.object_server().at(MENU_PATH, object).await?;

        let (updates, updates_rx) = mpsc::unbounded_channel();
        tokio::spawn(announce(conn.clone(), updates_rx));
        Ok(Arc::new(Self { shared, updates }))
    }

    pub fn revision(&self) -> u32 {
        self.shared.lock().revision
    }

    pub fn attach(&self, dispatcher: ClickDispatcher) {
        *self.shared.dispatcher() = Some(dispatcher);
    }

    /// Applies `f` and announces the new revision for `parent`.
    fn change(&self, parent: Option<ItemId>, f: impl FnOnce(&mut MenuTree)) {
        let mut tree = self.shared.lock();
        f(&mut tree);
        tree.revision = tree.revision.wrapping_add(1);
        // Queued under the tree lock so revisions go out in order.
        let update = (tree.revision, parent.map_or(ROOT_ID, wire_id));
        if self.updates.send(update).is_err() {
            debug!(revision = tree.revision, "menu no longer exported");
        }
    }

    pub fn add_or_update_item(&self, item: &MenuItemState) {
        self.change(item.parent, |tree| {
            tree.nodes.insert(
                item.id,
                Node {
                    parent: item.parent,
                    visible: item.visible,
                    kind: NodeKind::Item(item.clone()),
                },
            );
        });
    }

    pub fn add_separator(&self, id: ItemId, parent: Option<ItemId>) {
        self.change(parent, |tree| {
            tree.nodes.insert(
                id,
                Node {
                    parent,
                    visible: true,
                    kind: NodeKind::Separator,
                },
            );
        });
    }

    pub fn remove_item(&self, id: ItemId) {
        let parent = self.shared.lock().nodes.get(&id).and_then(|n| n.parent);
        self.change(parent, |tree| {
            tree.nodes.remove(&id);
        });
    }

    pub fn set_visible(&self, id: ItemId, visible: bool) {
        let parent = self.shared.lock().nodes.get(&id).and_then(|n| n.parent);
        self.change(parent, |tree| {
            if let Some(node) = tree.nodes.get_mut(&id) {
                node.visible = visible;
                if let NodeKind::Item(state) = &mut node.kind {
                    state.visible = visible;
                }
            }
        });
    }

    pub fn reset(&self) {
        self.change(None, |tree| tree.nodes.clear());
    }
}
