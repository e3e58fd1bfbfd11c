//! Action Hooks
//!
//! Named events that other plugins can subscribe to. Handlers run in
//! ascending priority, then in registration order.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

/// Events fired by this plugin
pub mod events {
    pub const ACTIVATED: &str = "smd.activated";
    pub const UNINSTALLED: &str = "smd.uninstalled";
    pub const SETTINGS_UPDATED: &str = "smd.settings_updated";
    pub const MEDIA_PROCESSED: &str = "smd.media_processed";
    pub const PAYMENT_COMPLETED: &str = "smd.payment_completed";
    pub const STATS_TRACKED: &str = "smd.stats_tracked";
}

/// Priority used when the caller has no preference
pub const DEFAULT_PRIORITY: i32 = 10;

/// Hook callback
pub type HookHandler = Arc<dyn Fn(&Value) + Send + Sync>;

struct Registration {
    priority: i32,
    seq: u64,
    handler: HookHandler,
}

#[derive(Default)]
struct Registry {
    actions: HashMap<String, Vec<Registration>>,
    next_seq: u64,
}

/// Action hook registry
#[derive(Default)]
pub struct HookRegistry {
    inner: RwLock<Registry>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a handler to an event
    pub fn add_action<F>(&self, event: &str, priority: i32, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let handlers = inner.actions.entry(event.to_string()).or_default();
        handlers.push(Registration {
            priority,
            seq,
            handler: Arc::new(handler),
        });
        handlers.sort_by_key(|r| (r.priority, r.seq));
    }

    /// Invoke every handler of an event, returning how many ran
    pub fn do_action(&self, event: &str, payload: &Value) -> usize {
        // Snapshot so handlers may register further hooks
        let handlers: Vec<HookHandler> = {
            let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
            match inner.actions.get(event) {
                Some(registrations) => registrations.iter().map(|r| Arc::clone(&r.handler)).collect(),
                None => return 0,
            }
        };

        for handler in &handlers {
            handler(payload);
        }

        tracing::trace!(event, handlers = handlers.len(), "Action dispatched");
        handlers.len()
    }

    pub fn has_action(&self, event: &str) -> bool {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.actions.get(event).is_some_and(|h| !h.is_empty())
    }

    /// Drop every handler of an event, returning how many were removed
    pub fn remove_all(&self, event: &str) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.actions.remove(event).map_or(0, |h| h.len())
    }
}
