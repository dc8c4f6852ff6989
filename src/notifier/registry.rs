use parking_lot::RwLock;
use std::collections::BTreeSet;

/// Set of active subscriber endpoints, shared between the notifier and
/// whatever registers subscribers.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    endpoints: RwLock<BTreeSet<String>>,
}

impl SubscriberRegistry {
    pub fn new<I>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            endpoints: RwLock::new(endpoints.into_iter().collect()),
        }
    }

    /// Returns false if the endpoint was already registered.
    #[cfg(test)]
    pub fn register(&self, endpoint: impl Into<String>) -> bool {
        self.endpoints.write().insert(endpoint.into())
    }

    pub fn unregister(&self, endpoint: &str) -> bool {
        self.endpoints.write().remove(endpoint)
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }

    /// Snapshot of the current endpoints, so delivery never holds the lock.
    pub fn list(&self) -> Vec<String> {
        self.endpoints.read().iter().cloned().collect()
    }
}
