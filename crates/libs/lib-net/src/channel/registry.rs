//! Message-type → ordered handler list.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde_json::Value;

/// Subscriber callback; receives the envelope payload.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    next_id: AtomicU64,
    handlers: RwLock<HashMap<String, Vec<(u64, Handler)>>>,
}

impl SubscriberRegistry {
    pub(crate) fn add(&self, message_type: &str, handler: Handler) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .write()
            .entry(message_type.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    pub(crate) fn remove(&self, message_type: &str, id: u64) -> bool {
        let mut handlers = self.handlers.write();
        let Some(list) = handlers.get_mut(message_type) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(message_type);
        }
        removed
    }

    /// Snapshot of handlers for `message_type`, in registration order.
    pub(crate) fn handlers_for(&self, message_type: &str) -> Vec<Handler> {
        self.handlers
            .read()
            .get(message_type)
            .map(|list| list.iter().map(|(_, handler)| handler.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn clear(&self) {
        self.handlers.write().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.read().values().map(Vec::len).sum()
    }
}

/// Capability to remove one handler.
///
/// Dropping the token keeps the handler registered.
#[must_use = "dropping a Subscription leaves no way to unsubscribe the handler"]
#[derive(Debug, Clone)]
pub struct Subscription {
    registry: Weak<SubscriberRegistry>,
    message_type: String,
    id: u64,
}

impl Subscription {
    pub(crate) fn new(registry: &Arc<SubscriberRegistry>, message_type: &str, id: u64) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            message_type: message_type.to_string(),
            id,
        }
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    /// Remove exactly this handler. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.message_type, self.id);
        }
    }
}
