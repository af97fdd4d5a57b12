//! Concurrent session registry.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::SessionId;
use crate::error::InstanceError;
use crate::Result;

/// Thread-safe map from session ID to live session.
///
/// Values are stored behind `Arc` so a lookup hands out a clone without
/// holding the shard lock; a concurrent `remove` after a successful lookup is
/// fine, callers check the session state afterwards.
pub struct Registry<V> {
    entries: DashMap<SessionId, Arc<V>>,
}

impl<V> Registry<V> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Insert a session under `id`.
    ///
    /// An occupied key is a logic error and is reported without overwriting.
    pub fn register(&self, id: SessionId, value: Arc<V>) -> Result<()> {
        match self.entries.entry(id) {
            Entry::Occupied(_) => Err(InstanceError::SessionExists(id)),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }

    /// Get the session registered under `id`.
    pub fn lookup(&self, id: &SessionId) -> Option<Arc<V>> {
        self.entries.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a session. Removing an unknown ID is a no-op.
    pub fn remove(&self, id: &SessionId) -> Option<Arc<V>> {
        self.entries.remove(id).map(|(_, value)| value)
    }

    /// Check if a session exists.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.entries.contains_key(id)
    }

    /// Get the number of registered sessions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// List all session IDs.
    pub fn ids(&self) -> Vec<SessionId> {
        self.entries.iter().map(|entry| *entry.key()).collect()
    }
}

impl<V> Default for Registry<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry = Registry::new();
        let id = SessionId::new();
        registry.register(id, Arc::new("page")).unwrap();

        assert!(registry.contains(&id));
        assert_eq!(registry.len(), 1);
        assert_eq!(*registry.lookup(&id).unwrap(), "page");
    }

    #[test]
    fn test_duplicate_register_keeps_original() {
        let registry = Registry::new();
        let id = SessionId::new();
        registry.register(id, Arc::new(1)).unwrap();

        let result = registry.register(id, Arc::new(2));
        assert!(matches!(result, Err(InstanceError::SessionExists(dup)) if dup == id));
        assert_eq!(*registry.lookup(&id).unwrap(), 1);
    }

    #[test]
    fn test_lookup_nonexistent() {
        let registry: Registry<u32> = Registry::new();
        assert!(registry.lookup(&SessionId::from_raw(999_999)).is_none());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = Registry::new();
        let id = SessionId::new();
        registry.register(id, Arc::new(())).unwrap();

        assert!(registry.remove(&id).is_some());
        assert!(registry.remove(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lookup_survives_concurrent_remove() {
        let registry = Registry::new();
        let id = SessionId::new();
        registry.register(id, Arc::new(String::from("held"))).unwrap();

        let held = registry.lookup(&id).unwrap();
        registry.remove(&id);
        assert_eq!(held.as_str(), "held");
        assert!(!registry.contains(&id));
    }

    #[test]
    fn test_ids() {
        let registry = Registry::new();
        let a = SessionId::new();
        let b = SessionId::new();
        registry.register(a, Arc::new(())).unwrap();
        registry.register(b, Arc::new(())).unwrap();

        let ids = registry.ids();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a));
        assert!(ids.contains(&b));
    }

    #[test]
    fn test_concurrent_access() {
        use std::thread;

        let registry = Arc::new(Registry::new());
        let mut handles = vec![];

        // Spawn 100 threads that each register a session
        for n in 0..100u32 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                let id = SessionId::new();
                registry.register(id, Arc::new(n)).unwrap();
                id
            }));
        }

        let ids: Vec<SessionId> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 100);
        assert_eq!(registry.len(), 100);
    }
}
