//! Transform-change notification.
//!
//! Whoever owns the map transform embeds a [`TransformObservers`] registry and
//! calls [`TransformObservers::notify`] after every change. Listeners hold a
//! [`Subscription`]; dropping it unregisters the callback.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, Weak,
};

use crate::prelude::HashMap;

type Callback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    callbacks: Mutex<HashMap<u64, Callback>>,
}

/// Registry of transform-change callbacks
#[derive(Default, Clone)]
pub struct TransformObservers {
    registry: Arc<Registry>,
}

impl TransformObservers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback`; it stays registered until the returned handle is dropped.
    pub fn register<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut callbacks) = self.registry.callbacks.lock() {
            callbacks.insert(id, Arc::new(callback));
        }
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Invokes every registered callback. Callbacks run outside the registry lock.
    pub fn notify(&self) {
        let callbacks: Vec<Callback> = match self.registry.callbacks.lock() {
            Ok(callbacks) => callbacks.values().cloned().collect(),
            Err(_) => return,
        };
        for callback in callbacks {
            callback();
        }
    }

    pub fn len(&self) -> usize {
        self.registry
            .callbacks
            .lock()
            .map(|callbacks| callbacks.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle keeping a transform callback registered
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut callbacks) = registry.callbacks.lock() {
                callbacks.remove(&self.id);
            }
        }
    }
}
