//! Observable per-item property store.
//!
//! Both sides of the protocol keep one [`ItemProperties`]: the publisher as
//! the source of truth it serves to `Get`/`GetAll`, the host as its cached
//! copy of a registered item.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::constants::prop;
use crate::error::ProtocolError;
use crate::types::{IconPixmap, ToolTip};
use crate::value::Value;

/// Change notifications buffered per subscriber before it starts lagging.
const CHANGE_BUFFER: usize = 16;

/// A single observable value.
///
/// [`set`](Self::set) stores the value and then offers it once to every
/// current subscriber. Having no subscriber is not an error and never
/// blocks.
pub struct PropertyField<T> {
    value: RwLock<T>,
    changed: broadcast::Sender<T>,
}

impl<T: Clone> PropertyField<T> {
    pub fn new(initial: T) -> Self {
        let (changed, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            value: RwLock::new(initial),
            changed,
        }
    }

    pub fn get(&self) -> T {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reads the value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn set(&self, value: T) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = value.clone();
        // No receiver is fine: notification is fire-and-forget.
        let _ = self.changed.send(value);
    }

    /// Subscribes to values set from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.changed.subscribe()
    }
}

impl<T: Clone + Default> Default for PropertyField<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for PropertyField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertyField").field(&self.get()).finish()
    }
}

/// Plain copy of every item property, read under one lock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSnapshot {
    pub id: String,
    pub item_is_menu: bool,
    pub title: String,
    pub icon_theme_path: String,
    pub icon_pixmap: Vec<IconPixmap>,
    pub category: String,
    pub status: String,
    pub tooltip: ToolTip,
    pub menu: String,
}

/// Result of merging a batch of changed properties.
#[derive(Debug, Default)]
pub struct Applied {
    /// Names of the fields that were updated, in batch order.
    pub changed: Vec<String>,
    /// Fields skipped because their value was malformed.
    pub errors: Vec<ProtocolError>,
}

/// The property set of one status-notifier item.
#[derive(Debug, Default)]
pub struct ItemProperties {
    pub id: PropertyField<String>,
    pub item_is_menu: PropertyField<bool>,
    pub title: PropertyField<String>,
    pub icon_theme_path: PropertyField<String>,
    pub icon_pixmap: PropertyField<Vec<IconPixmap>>,
    pub category: PropertyField<String>,
    pub status: PropertyField<String>,
    pub tooltip: PropertyField<ToolTip>,
    pub menu: PropertyField<String>,
    /// Serializes batch merges against snapshot reads.
    batch: Mutex<()>,
}

impl ItemProperties {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_batch(&self) -> MutexGuard<'_, ()> {
        self.batch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Consistent copy of all fields; never observes half of a batch.
    pub fn snapshot(&self) -> ItemSnapshot {
        let _guard = self.lock_batch();
        ItemSnapshot {
            id: self.id.get(),
            item_is_menu: self.item_is_menu.get(),
            title: self.title.get(),
            icon_theme_path: self.icon_theme_path.get(),
            icon_pixmap: self.icon_pixmap.get(),
            category: self.category.get(),
            status: self.status.get(),
            tooltip: self.tooltip.get(),
            menu: self.menu.get(),
        }
    }

    /// Merges a batch of changed properties as one unit.
    ///
    /// Each known entry updates exactly one field and fires its change
    /// notification. Unknown names are ignored; malformed values are
    /// reported in [`Applied::errors`] and the rest of the batch still
    /// applies.
    pub fn apply(&self, changed: &BTreeMap<String, Value>) -> Applied {
        let _guard = self.lock_batch();
        let mut applied = Applied::default();
        for (name, value) in changed {
            match self.apply_one(name, value) {
                Ok(true) => applied.changed.push(name.clone()),
                Ok(false) => {}
                Err(e) => applied.errors.push(e),
            }
        }
        applied
    }

    fn apply_one(&self, name: &str, value: &Value) -> Result<bool, ProtocolError> {
        let text = |v: &Value| {
            v.as_str().map(str::to_string).ok_or_else(|| {
                ProtocolError::field(name, format!("expected string, got {}", v.signature()))
            })
        };

        match name {
            prop::ID => self.id.set(text(value)?),
            prop::ITEM_IS_MENU => {
                let b = value.as_bool().ok_or_else(|| {
                    ProtocolError::field(name, format!("expected bool, got {}", value.signature()))
                })?;
                self.item_is_menu.set(b);
            }
            prop::TITLE => self.title.set(text(value)?),
            prop::ICON_THEME_PATH => self.icon_theme_path.set(text(value)?),
            prop::ICON_PIXMAP => self.icon_pixmap.set(IconPixmap::list_from_value(value)?),
            prop::CATEGORY => self.category.set(text(value)?),
            prop::STATUS => self.status.set(text(value)?),
            prop::TOOLTIP => self.tooltip.set(ToolTip::from_value(value)?),
            prop::MENU => self.menu.set(text(value)?),
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Resets the named fields to their defaults, notifying each.
    ///
    /// Returns the names that were known and cleared.
    pub fn clear(&self, names: &[String]) -> Vec<String> {
        let _guard = self.lock_batch();
        let mut cleared = Vec::new();
        for name in names {
            let known = match name.as_str() {
                prop::ID => {
                    self.id.set(String::new());
                    true
                }
                prop::ITEM_IS_MENU => {
                    self.item_is_menu.set(false);
                    true
                }
                prop::TITLE => {
                    self.title.set(String::new());
                    true
                }
                prop::ICON_THEME_PATH => {
                    self.icon_theme_path.set(String::new());
                    true
                }
                prop::ICON_PIXMAP => {
                    self.icon_pixmap.set(Vec::new());
                    true
                }
                prop::CATEGORY => {
                    self.category.set(String::new());
                    true
                }
                prop::STATUS => {
                    self.status.set(String::new());
                    true
                }
                prop::TOOLTIP => {
                    self.tooltip.set(ToolTip::default());
                    true
                }
                prop::MENU => {
                    self.menu.set(String::new());
                    true
                }
                _ => false,
            };
            if known {
                cleared.push(name.clone());
            }
        }
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_set_then_get() {
        let field = PropertyField::new(String::from("a"));
        field.set("b".into());
        assert_eq!(field.get(), "b");
    }

    #[test]
    fn field_set_without_listener_does_not_block() {
        let field = PropertyField::new(0u32);
        for i in 0..100 {
            field.set(i);
        }
        assert_eq!(field.get(), 99);
    }

    #[tokio::test]
    async fn field_notifies_once_per_set() {
        let field = PropertyField::new(String::new());
        let mut rx = field.subscribe();
        field.set("one".into());
        field.set("two".into());
        assert_eq!(rx.recv().await.unwrap(), "one");
        assert_eq!(rx.recv().await.unwrap(), "two");
        assert!(rx.try_recv().is_err());
    }

    fn batch(entries: &[(&str, Value)]) -> BTreeMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn apply_updates_known_fields_only() {
        let props = ItemProperties::new();
        let applied = props.apply(&batch(&[
            (prop::TITLE, Value::from("App")),
            (prop::STATUS, Value::from("Active")),
            ("XAyatanaLabel", Value::from("ignored")),
        ]));
        assert_eq!(applied.changed, vec!["Status", "Title"]);
        assert!(applied.errors.is_empty());
        assert_eq!(props.title.get(), "App");
        assert_eq!(props.status.get(), "Active");
    }

    #[test]
    fn apply_skips_malformed_field_and_continues() {
        let props = ItemProperties::new();
        props.title.set("kept".into());
        let applied = props.apply(&batch(&[
            (prop::TITLE, Value::I32(3)),
            (prop::CATEGORY, Value::from("Hardware")),
        ]));
        assert_eq!(applied.errors.len(), 1);
        assert_eq!(applied.changed, vec!["Category"]);
        assert_eq!(props.title.get(), "kept");
        assert_eq!(props.category.get(), "Hardware");
    }

    #[test]
    fn bus_encoded_values_apply_cleanly() {
        use zbus::zvariant;

        let tooltip = ToolTip::titled("hello");
        let pixmaps = vec![IconPixmap {
            width: 1,
            height: 1,
            data: vec![255, 1, 2, 3],
        }];
        let wire = [
            (prop::ID, zvariant::Value::from("app")),
            (prop::ITEM_IS_MENU, zvariant::Value::from(true)),
            (prop::TOOLTIP, zvariant::Value::from(tooltip.to_wire())),
            (prop::ICON_PIXMAP, zvariant::Value::from(IconPixmap::list_to_wire(&pixmaps))),
        ];
        let changed = wire
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from_zvariant(v)))
            .collect();

        let props = ItemProperties::new();
        let applied = props.apply(&changed);
        assert!(applied.errors.is_empty(), "{:?}", applied.errors);
        let snapshot = props.snapshot();
        assert_eq!(snapshot.id, "app");
        assert!(snapshot.item_is_menu);
        assert_eq!(snapshot.tooltip, tooltip);
        assert_eq!(snapshot.icon_pixmap, pixmaps);
    }

    #[test]
    fn clear_resets_known_fields() {
        let props = ItemProperties::new();
        props.title.set("App".into());
        let cleared = props.clear(&["Title".into(), "Bogus".into()]);
        assert_eq!(cleared, vec!["Title"]);
        assert_eq!(props.title.get(), "");
    }
}
