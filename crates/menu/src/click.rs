//! Single-slot click notification.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;

/// At-most-once, best-effort click delivery.
///
/// A click is handed to a consumer that is already waiting; with nobody
/// waiting it is dropped. Nothing is queued, so a burst of clicks reaches a
/// consumer that waits once as a single notification.
#[derive(Debug, Default)]
pub struct ClickSlot {
    waiters: Mutex<Waiters>,
}

#[derive(Debug, Default)]
struct Waiters {
    queue: VecDeque<oneshot::Sender<()>>,
    closed: bool,
}

impl ClickSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter now and resolves when a click reaches it.
    ///
    /// Resolves to `false` if the slot is closed first (the item was
    /// removed). Dropping the future withdraws the waiter.
    pub fn clicked(&self) -> impl Future<Output = bool> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        let mut waiters = self.lock();
        if waiters.closed {
            // Dropping the sender resolves the receiver to `false`.
            drop(tx);
        } else {
            waiters.queue.retain(|tx| !tx.is_closed());
            waiters.queue.push_back(tx);
        }
        drop(waiters);
        async move { rx.await.is_ok() }
    }

    /// Offers a click without blocking. Returns whether a waiter took it.
    pub fn offer(&self) -> bool {
        let mut waiters = self.lock();
        while let Some(tx) = waiters.queue.pop_front() {
            if tx.send(()).is_ok() {
                return true;
            }
        }
        false
    }

    /// Number of live waiters.
    pub fn waiting(&self) -> usize {
        let mut waiters = self.lock();
        waiters.queue.retain(|tx| !tx.is_closed());
        waiters.queue.len()
    }

    /// Wakes every waiter with `false`. Later waiters resolve to `false`
    /// immediately.
    pub fn close(&self) {
        let mut waiters = self.lock();
        waiters.closed = true;
        waiters.queue.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Waiters> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
