//! Ready and exit callbacks of an indicator session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Mutex, PoisonError};
use std::thread;

use tracing::debug;

use crate::error::MenuError;

type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Runs a closure at most once until reset.
///
/// Callers that lose the race block until the winner's closure returns, so
/// every caller sees the teardown finished. Calling back into the same guard
/// from inside the closure deadlocks.
#[derive(Debug, Default)]
pub struct ExitGuard {
    done: AtomicBool,
    running: Mutex<()>,
}

impl ExitGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` if no caller has won the guard yet. Returns whether it ran.
    pub fn run_once(&self, f: impl FnOnce()) -> bool {
        let _running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if self
            .done
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        f();
        true
    }

    pub fn has_run(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.done.store(false, Ordering::Release);
    }
}

#[derive(Default)]
pub(crate) struct Lifecycle {
    /// Fires the pending ready callback on its own thread.
    ready: Mutex<Option<mpsc::Sender<()>>>,
    on_exit: Mutex<Option<Callback>>,
    exit: ExitGuard,
    quit: ExitGuard,
}

impl Lifecycle {
    pub(crate) fn register(
        &self,
        on_ready: impl FnOnce() + Send + 'static,
        on_exit: impl FnOnce() + Send + 'static,
    ) -> Result<(), MenuError> {
        let (tx, rx) = mpsc::channel::<()>();
        thread::Builder::new()
            .name("trayline-ready".into())
            .spawn(move || {
                // A dropped sender means the session went away before ready.
                if rx.recv().is_ok() {
                    on_ready();
                }
            })?;

        // Replacing an earlier registration drops its sender, which ends
        // that thread without running its callback.
        *self.ready.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        *self.on_exit.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(on_exit));
        self.exit.reset();
        Ok(())
    }

    /// Returns `false` if no ready callback was pending.
    pub(crate) fn mark_ready(&self) -> bool {
        let tx = self.ready.lock().unwrap_or_else(PoisonError::into_inner).take();
        match tx {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Runs the exit callback unless it already ran since the last register.
    pub(crate) fn run_exit(&self) -> bool {
        self.exit.run_once(|| {
            let callback = self
                .on_exit
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(callback) = callback {
                debug!("running exit callback");
                callback();
            }
        })
    }

    pub(crate) fn quit_once(&self, f: impl FnOnce()) -> bool {
        self.quit.run_once(f)
    }

    pub(crate) fn has_quit(&self) -> bool {
        self.quit.has_run()
    }
}
