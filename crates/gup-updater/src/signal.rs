//! Import completion signaling
//!
//! One `CompletionSignal` is created per submitted task and lives until the
//! task reaches a terminal state. The task loop waits on it with a bounded
//! timeout while the callback listener sets it from its own async task. The
//! set state is level triggered and stays observable until explicitly
//! cleared, because a callback can land before the waiter even starts
//! waiting.
//!
//! The `CompletionRegistry` maps in-flight regions to their signals so the
//! listener can route each callback to the task that submitted it. Entries
//! are registered at submission time and removed when the task settles; a
//! late callback for a region with no entry is dropped instead of waking an
//! unrelated task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

/// Settable, waitable, resettable completion flag for one in-flight import
pub struct CompletionSignal {
    tx: watch::Sender<bool>,
}

impl CompletionSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Mark the import as complete. Idempotent; wakes any waiter and stays
    /// set until cleared.
    pub fn set(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the signal is currently set
    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Reset to unset so a stale set cannot satisfy a later wait
    pub fn clear(&self) {
        self.tx.send_replace(false);
    }

    /// Block until the signal is set or the timeout elapses; returns whether
    /// it was set. Completes immediately when the signal is already set.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        matches!(
            tokio::time::timeout(timeout, rx.wait_for(|set| *set)).await,
            Ok(Ok(_))
        )
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Region-keyed table of in-flight completion signals, shared between the
/// task loop and the callback listener
#[derive(Clone, Default)]
pub struct CompletionRegistry {
    signals: Arc<Mutex<HashMap<String, Arc<CompletionSignal>>>>,
}

impl CompletionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh signal for a region and return the waiter handle. Any
    /// previous entry for the region is discarded.
    pub fn register(&self, region: &str) -> Arc<CompletionSignal> {
        let signal = Arc::new(CompletionSignal::new());
        self.signals
            .lock()
            .unwrap()
            .insert(region.to_string(), Arc::clone(&signal));
        signal
    }

    /// Drop the region's entry once its task has settled
    pub fn remove(&self, region: &str) {
        self.signals.lock().unwrap().remove(region);
    }

    /// Set the region's signal if one is pending; returns whether a signal
    /// was found
    pub fn complete(&self, region: &str) -> bool {
        let signal = {
            let signals = self.signals.lock().unwrap();
            signals.get(region).cloned()
        };
        match signal {
            Some(signal) => {
                signal.set();
                true
            },
            None => false,
        }
    }

    /// Number of in-flight entries
    pub fn len(&self) -> usize {
        self.signals.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.lock().unwrap().is_empty()
    }
}
