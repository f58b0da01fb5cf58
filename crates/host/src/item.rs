use std::fmt;

use zbus::message::Type as MessageType;
use zbus::{MatchRule, OwnedMatchRule};

use trayline_protocol::constants::{
    ITEM_INTERFACE, ITEM_PATH, ITEM_REFRESH_SIGNALS, MENU_INTERFACE, MENU_SIGNALS,
    PROPERTIES_INTERFACE, member,
};
use trayline_protocol::{ItemProperties, ItemSnapshot};

/// A registered item, keyed by the unique name of the connection that
/// registered it.
pub struct TrackedItem {
    sender: String,
    service: String,
    path: String,
    properties: ItemProperties,
    rules: Vec<OwnedMatchRule>,
}

impl TrackedItem {
    /// `service` is the registration argument: a bus name, or an object
    /// path on the sender. Fails if either is not a valid bus name or path.
    pub(crate) fn new(sender: &str, service: &str) -> zbus::Result<Self> {
        let (service, path) = if service.starts_with('/') {
            (format!("{sender}{service}"), service.to_string())
        } else {
            (service.to_string(), ITEM_PATH.to_string())
        };
        let rules = subscriptions(sender, &path)?;
        Ok(Self {
            sender: sender.to_string(),
            service,
            path,
            properties: ItemProperties::new(),
            rules,
        })
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Name the item is listed under in `RegisteredStatusNotifierItems`.
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Cached properties; every field notifies its subscribers on change.
    pub fn properties(&self) -> &ItemProperties {
        &self.properties
    }

    pub fn snapshot(&self) -> ItemSnapshot {
        self.properties.snapshot()
    }

    pub(crate) fn rules(&self) -> &[OwnedMatchRule] {
        &self.rules
    }
}

impl fmt::Debug for TrackedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedItem")
            .field("sender", &self.sender)
            .field("service", &self.service)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn signal_rule(
    sender: &str,
    interface: &str,
    member: &str,
    path: Option<&str>,
) -> zbus::Result<OwnedMatchRule> {
    let mut rule = MatchRule::builder()
        .msg_type(MessageType::Signal)
        .sender(sender)?
        .interface(interface)?
        .member(member)?;
    if let Some(path) = path {
        rule = rule.path(path)?;
    }
    Ok(rule.build().into())
}

/// Signals the host follows for one item.
fn subscriptions(sender: &str, path: &str) -> zbus::Result<Vec<OwnedMatchRule>> {
    let mut rules = vec![signal_rule(
        sender,
        PROPERTIES_INTERFACE,
        member::PROPERTIES_CHANGED,
        Some(path),
    )?];
    for signal in ITEM_REFRESH_SIGNALS {
        rules.push(signal_rule(sender, ITEM_INTERFACE, signal, Some(path))?);
    }
    for signal in MENU_SIGNALS {
        rules.push(signal_rule(sender, MENU_INTERFACE, signal, None)?);
    }
    Ok(rules)
}
