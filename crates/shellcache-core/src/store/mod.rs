//! Versioned cache stores.
//!
//! A `CacheStorage` holds any number of named stores, one per installed
//! version. Each `CacheStore` maps a URL key to a `ResourceEntry`.
//!
//! | Implementation | Persistence | Use |
//! |----------------|-------------|-----|
//! | `DiskStorage` | survives restarts | hosts |
//! | `MemoryStorage` | process lifetime | tests, embedding |

pub mod disk;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CacheResult;
use crate::models::ResourceEntry;

pub use disk::{DiskStorage, DiskStore};
pub use memory::{MemoryStorage, MemoryStore};

/// Container of named cache stores
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open the store for `version`, creating it if needed
    async fn open(&self, version: &str) -> CacheResult<Arc<dyn CacheStore>>;

    /// Names of every stored version, sorted
    async fn versions(&self) -> CacheResult<Vec<String>>;

    /// Delete a version and all its entries. Returns false if it did not exist.
    async fn delete(&self, version: &str) -> CacheResult<bool>;
}

/// One version's entries
#[async_trait]
pub trait CacheStore: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> CacheResult<Option<ResourceEntry>>;

    /// Store an entry, replacing any previous entry for `key` as a whole
    async fn put(&self, key: &str, entry: ResourceEntry) -> CacheResult<()>;

    /// Stored keys, sorted
    async fn keys(&self) -> CacheResult<Vec<String>>;
}
