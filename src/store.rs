//! Key-value storage behind a trait
//!
//! The API keeps the latest [`crate::pipeline::AnalysisResult`] per subject
//! here. The pipeline itself holds no state between runs.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::error::StoreError;

#[async_trait]
pub trait KeyValueStore<V>: Send + Sync
where
    V: Send + Sync + 'static,
{
    /// Insert or replace, returning the previous value
    async fn put(&self, key: &str, value: V) -> Result<Option<V>, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<V>, StoreError>;

    async fn delete(&self, key: &str) -> Result<Option<V>, StoreError>;

    async fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// Process-local store
#[derive(Debug)]
pub struct InMemoryStore<V> {
    entries: Arc<DashMap<String, V>>,
}

impl<V> InMemoryStore<V> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for InMemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for InMemoryStore<V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

#[async_trait]
impl<V> KeyValueStore<V> for InMemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn put(&self, key: &str, value: V) -> Result<Option<V>, StoreError> {
        Ok(self.entries.insert(key.to_string(), value))
    }

    async fn get(&self, key: &str) -> Result<Option<V>, StoreError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, key: &str) -> Result<Option<V>, StoreError> {
        Ok(self.entries.remove(key).map(|(_, value)| value))
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store: InMemoryStore<u32> = InMemoryStore::new();
        assert_eq!(store.put("a", 1).await.unwrap(), None);
        assert_eq!(store.put("a", 2).await.unwrap(), Some(1));
        assert_eq!(store.get("a").await.unwrap(), Some(2));
        assert_eq!(store.get("missing").await.unwrap(), None);

        assert_eq!(store.delete("a").await.unwrap(), Some(2));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store: InMemoryStore<String> = InMemoryStore::new();
        let other = store.clone();
        store.put("b", "x".into()).await.unwrap();
        other.put("a", "y".into()).await.unwrap();
        assert_eq!(store.keys().await.unwrap(), vec!["a", "b"]);
        assert_eq!(other.len(), 2);
    }

    #[tokio::test]
    async fn test_usable_as_trait_object() {
        let store: Arc<dyn KeyValueStore<u8>> = Arc::new(InMemoryStore::new());
        store.put("k", 9).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(9));
    }
}
