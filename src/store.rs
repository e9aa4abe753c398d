//! Block-scoped key-value store shared with kernels.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::message::Message;

/// A shared mapping from string keys to messages.
///
/// Every block carries a store handle; the `kv*` kernels operate on it.
/// [`Block::new`](crate::Block::new) mints a private store, and
/// [`Block::with_store`](crate::Block::with_store) shares one instance
/// across blocks. Operations are linearizable: each takes the store's lock
/// for its whole duration.
#[derive(Clone, Debug, Default)]
pub struct Store {
    inner: Arc<Mutex<BTreeMap<String, Message>>>,
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Store::default()
    }

    /// Insert or replace a value.
    pub fn set(&self, key: impl Into<String>, value: Message) {
        self.lock().insert(key.into(), value);
    }

    /// Look up a value, cloning it out.
    pub fn get(&self, key: &str) -> Option<Message> {
        self.lock().get(key).cloned()
    }

    /// Remove a key. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// A copy of the full contents.
    pub fn dump(&self) -> BTreeMap<String, Message> {
        self.lock().clone()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A poisoned lock still yields the data; kernels must not take the
    // runtime down with them.
    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Message>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
