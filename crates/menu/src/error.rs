use crate::id::ItemId;

/// Errors surfaced by menu operations.
#[derive(Debug, thiserror::Error)]
pub enum MenuError {
    #[error("no menu item with id {0}")]
    UnknownItem(ItemId),

    #[error("icon rejected: {0}")]
    Icon(String),

    #[error("failed to start ready thread: {0}")]
    Spawn(#[from] std::io::Error),
}
