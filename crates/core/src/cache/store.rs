//! The store contract the caching agent orchestrates.

use super::connection::CacheDb;
use super::generations::Generation;
use super::key::RequestKey;
use crate::Error;
use crate::resource::ResponseSnapshot;

/// Persistent keyed store of cache generations.
///
/// Individual operations are atomic from the caller's point of view; the agent
/// takes no locks of its own around them.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Open a generation, creating it if absent.
    async fn open(&self, name: &str) -> Result<Generation, Error>;

    async fn match_entry(&self, generation: &Generation, key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error>;

    /// Store one entry, overwriting any previous entry for `key`.
    async fn put(&self, generation: &Generation, key: &RequestKey, snapshot: &ResponseSnapshot) -> Result<(), Error>;

    /// Store all entries or none of them.
    async fn put_all(&self, generation: &Generation, entries: &[(RequestKey, ResponseSnapshot)]) -> Result<(), Error>;

    /// Delete a generation with its entries. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    async fn list_generations(&self) -> Result<Vec<String>, Error>;

    async fn count_entries(&self, generation: &Generation) -> Result<u64, Error>;

    async fn has_generation(&self, name: &str) -> Result<bool, Error> {
        Ok(self.list_generations().await?.iter().any(|n| n == name))
    }
}

#[async_trait::async_trait]
impl CacheStore for CacheDb {
    async fn open(&self, name: &str) -> Result<Generation, Error> {
        self.open_generation(name).await
    }

    async fn match_entry(&self, generation: &Generation, key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error> {
        CacheDb::match_entry(self, generation, key).await
    }

    async fn put(&self, generation: &Generation, key: &RequestKey, snapshot: &ResponseSnapshot) -> Result<(), Error> {
        self.put_entry(generation, key, snapshot).await
    }

    async fn put_all(&self, generation: &Generation, entries: &[(RequestKey, ResponseSnapshot)]) -> Result<(), Error> {
        self.put_entries(generation, entries).await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.delete_generation(name).await
    }

    async fn list_generations(&self) -> Result<Vec<String>, Error> {
        self.generation_names().await
    }

    async fn count_entries(&self, generation: &Generation) -> Result<u64, Error> {
        CacheDb::count_entries(self, generation).await
    }

    async fn has_generation(&self, name: &str) -> Result<bool, Error> {
        self.generation_exists(name).await
    }
}
