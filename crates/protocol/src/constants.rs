//! Well-known names, object paths, interfaces and member names.

/// Name the bus itself answers to.
pub const BUS_NAME: &str = "org.freedesktop.DBus";
pub const BUS_PATH: &str = "/org/freedesktop/DBus";
pub const BUS_INTERFACE: &str = "org.freedesktop.DBus";

/// Generic property access interface implemented by every exported object.
pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

pub const WATCHER_NAME: &str = "org.kde.StatusNotifierWatcher";
pub const WATCHER_PATH: &str = "/StatusNotifierWatcher";
pub const WATCHER_INTERFACE: &str = "org.kde.StatusNotifierWatcher";

pub const ITEM_INTERFACE: &str = "org.kde.StatusNotifierItem";
pub const ITEM_PATH: &str = "/StatusNotifierItem";

pub const MENU_INTERFACE: &str = "com.canonical.dbusmenu";
pub const MENU_PATH: &str = "/StatusNotifierMenu";

/// Watcher protocol version advertised through `ProtocolVersion`.
pub const PROTOCOL_VERSION: i32 = 0;

/// Method and signal names.
pub mod member {
    // org.freedesktop.DBus
    pub const NAME_OWNER_CHANGED: &str = "NameOwnerChanged";

    // org.freedesktop.DBus.Properties
    pub const GET: &str = "Get";
    pub const PROPERTIES_CHANGED: &str = "PropertiesChanged";

    // org.kde.StatusNotifierWatcher
    pub const HOST_REGISTERED: &str = "StatusNotifierHostRegistered";

    // org.kde.StatusNotifierItem
    pub const ACTIVATE: &str = "Activate";
    pub const SECONDARY_ACTIVATE: &str = "SecondaryActivate";
    pub const CONTEXT_MENU: &str = "ContextMenu";
    pub const SCROLL: &str = "Scroll";
    pub const NEW_TITLE: &str = "NewTitle";
    pub const NEW_ICON: &str = "NewIcon";
    pub const NEW_ATTENTION_ICON: &str = "NewAttentionIcon";
    pub const NEW_OVERLAY_ICON: &str = "NewOverlayIcon";
    pub const NEW_TOOLTIP: &str = "NewToolTip";
    pub const NEW_STATUS: &str = "NewStatus";
    pub const NEW_MENU: &str = "NewMenu";

    // com.canonical.dbusmenu
    pub const GET_LAYOUT: &str = "GetLayout";
    pub const EVENT: &str = "Event";
    pub const ABOUT_TO_SHOW: &str = "AboutToShow";
    pub const LAYOUT_UPDATED: &str = "LayoutUpdated";
    pub const ITEM_ACTIVATION_REQUESTED: &str = "ItemActivationRequested";
    pub const ITEMS_PROPERTIES_UPDATED: &str = "ItemsPropertiesUpdated";
}

/// Property names of `org.kde.StatusNotifierItem`.
pub mod prop {
    pub const ID: &str = "Id";
    pub const ITEM_IS_MENU: &str = "ItemIsMenu";
    pub const TITLE: &str = "Title";
    pub const ICON_THEME_PATH: &str = "IconThemePath";
    pub const ICON_PIXMAP: &str = "IconPixmap";
    pub const CATEGORY: &str = "Category";
    pub const STATUS: &str = "Status";
    pub const TOOLTIP: &str = "ToolTip";
    pub const MENU: &str = "Menu";

    /// All item properties, in the order `GetAll` reports them.
    pub const ALL: &[&str] = &[
        ID,
        ITEM_IS_MENU,
        TITLE,
        ICON_THEME_PATH,
        ICON_PIXMAP,
        CATEGORY,
        STATUS,
        TOOLTIP,
        MENU,
    ];
}

/// Item signals after which a host re-pulls the full property set.
pub const ITEM_REFRESH_SIGNALS: &[&str] = &[
    member::NEW_TITLE,
    member::NEW_ICON,
    member::NEW_ATTENTION_ICON,
    member::NEW_OVERLAY_ICON,
    member::NEW_TOOLTIP,
    member::NEW_STATUS,
    member::NEW_MENU,
];

/// Menu signals a host subscribes to for each item.
pub const MENU_SIGNALS: &[&str] = &[
    member::LAYOUT_UPDATED,
    member::ITEM_ACTIVATION_REQUESTED,
    member::ITEMS_PROPERTIES_UPDATED,
];

/// Well-known name an item publisher owns on the bus.
pub fn item_service_name(pid: u32, id: u32) -> String {
    format!("{ITEM_INTERFACE}-{pid}-{id}")
}
