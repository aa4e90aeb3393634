use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tether_core::DurableStore;
use tether_domain::Result;

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.read().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        self.items.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.items.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get_item("k").await.unwrap(), None);

        store.set_item("k", "v1".into()).await.unwrap();
        store.set_item("k", "v2".into()).await.unwrap();
        assert_eq!(store.get_item("k").await.unwrap().as_deref(), Some("v2"));
        assert_eq!(store.len(), 1);

        store.remove_item("k").await.unwrap();
        store.remove_item("k").await.unwrap();
        assert!(store.is_empty());
    }
}
