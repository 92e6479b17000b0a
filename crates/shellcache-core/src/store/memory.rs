use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheStorage, CacheStore};
use crate::error::CacheResult;
use crate::models::ResourceEntry;

/// In-memory storage. Clones share the same stores.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    stores: Arc<RwLock<BTreeMap<String, Arc<MemoryStore>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, version: &str) -> CacheResult<Arc<dyn CacheStore>> {
        let mut stores = self.stores.write().await;
        let store: Arc<dyn CacheStore> = stores
            .entry(version.to_string())
            .or_insert_with(|| Arc::new(MemoryStore::new(version)))
            .clone();
        Ok(store)
    }

    async fn versions(&self) -> CacheResult<Vec<String>> {
        Ok(self.stores.read().await.keys().cloned().collect())
    }

    async fn delete(&self, version: &str) -> CacheResult<bool> {
        Ok(self.stores.write().await.remove(version).is_some())
    }
}

pub struct MemoryStore {
    name: String,
    entries: RwLock<BTreeMap<String, ResourceEntry>>,
}

impl MemoryStore {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> CacheResult<Option<ResourceEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, entry: ResourceEntry) -> CacheResult<()> {
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}
