//! Topic-keyed publish/subscribe with isolated listener failures.
//!
//! Dispatch is synchronous: [`EventBus::fire`] returns only after every
//! listener registered for the topic has run or failed. Listeners run in
//! registration order against a snapshot of the list taken before dispatch,
//! so registrations made by a listener mid-dispatch take effect on the next
//! `fire`, not the current one.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use crate::error::ListenerError;

type Callback = dyn Fn(&Value) -> Result<(), ListenerError> + Send + Sync;

/// A registered callback.
///
/// Cloning is cheap and keeps identity: [`EventBus::off`] removes the
/// registration whose callback is the same allocation as the handle passed
/// in, regardless of `label`.
#[derive(Clone)]
pub struct Listener {
    label: Arc<str>,
    callback: Arc<Callback>,
}

impl Listener {
    /// Wrap a callback with a label used in failure logs.
    pub fn new<F>(label: &str, callback: F) -> Self
    where
        F: Fn(&Value) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        Self {
            label: Arc::from(label),
            callback: Arc::new(callback),
        }
    }

    /// The label given at construction.
    pub fn label(&self) -> &str {
        &self.label
    }

    fn invoke(&self, payload: &Value) -> Result<(), ListenerError> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.callback)(payload))) {
            Ok(result) => result,
            Err(cause) => {
                let message = cause
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| cause.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_owned());
                Err(ListenerError::Panicked(message))
            }
        }
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.callback, &other.callback)
    }
}

impl Eq for Listener {}

impl core::fmt::Debug for Listener {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Listener").field("label", &self.label).finish_non_exhaustive()
    }
}

/// Outcome counts for a single [`EventBus::fire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    /// Listeners that returned `Ok`.
    pub delivered: usize,
    /// Listeners that returned an error or panicked.
    pub failed: usize,
}

impl DispatchReport {
    /// Total listeners invoked.
    pub const fn invoked(&self) -> usize {
        self.delivered.saturating_add(self.failed)
    }
}

/// Named-topic event bus.
///
/// Safe to share behind an [`Arc`]; registration and dispatch may happen
/// from different threads.
#[derive(Debug, Default)]
pub struct EventBus {
    topics: RwLock<HashMap<String, Vec<Listener>>>,
}

impl EventBus {
    /// Create a bus with no registrations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` under `topic`.
    ///
    /// Registering the same handle twice makes it run twice per `fire`.
    pub fn on(&self, topic: &str, listener: Listener) {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        topics.entry(topic.to_owned()).or_default().push(listener);
    }

    /// Remove the first registration of `listener` under `topic`.
    ///
    /// Returns whether anything was removed. Unknown topics return `false`.
    pub fn off(&self, topic: &str, listener: &Listener) -> bool {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        let Some(listeners) = topics.get_mut(topic) else {
            return false;
        };
        let Some(index) = listeners.iter().position(|l| l == listener) else {
            return false;
        };
        listeners.remove(index);
        if listeners.is_empty() {
            topics.remove(topic);
        }
        true
    }

    /// Deliver `payload` to every listener on `topic`, in registration order.
    ///
    /// A listener that errors or panics is logged and skipped; the rest still
    /// run and nothing propagates to the caller. Unknown topics are a no-op.
    pub fn fire(&self, topic: &str, payload: &Value) -> DispatchReport {
        let snapshot: Vec<Listener> = {
            let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
            match topics.get(topic) {
                Some(listeners) => listeners.clone(),
                None => return DispatchReport::default(),
            }
        };

        let mut report = DispatchReport::default();
        for listener in &snapshot {
            match listener.invoke(payload) {
                Ok(()) => report.delivered = report.delivered.saturating_add(1),
                Err(e) => {
                    report.failed = report.failed.saturating_add(1);
                    tracing::error!(
                        topic = topic,
                        listener = listener.label(),
                        error = %e,
                        "event listener failed"
                    );
                }
            }
        }

        tracing::trace!(
            topic = topic,
            delivered = report.delivered,
            failed = report.failed,
            "event dispatched"
        );
        report
    }

    /// Number of registrations under `topic`.
    pub fn listener_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map_or(0, Vec::len)
    }
}
