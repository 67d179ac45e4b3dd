//! Sources of extras waiting to be downloaded.

use async_trait::async_trait;

use crate::error::Result;
use crate::queue::ExtraRequest;
use crate::store::Store;

/// Store hash holding wanted extras, keyed by video id.
pub const WANTED_KEY: &str = "extras:wanted";

/// Provides the extras the extras task should fetch.
#[async_trait]
pub trait WantedSource: Send + Sync {
    async fn wanted(&self) -> Result<Vec<ExtraRequest>>;
}

/// Wanted extras kept as JSON values in a Store hash.
#[derive(Debug, Clone)]
pub struct StoreWantedSource {
    store: Store,
}

impl StoreWantedSource {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Add or replace a wanted extra.
    pub fn add(&self, request: &ExtraRequest) -> Result<()> {
        let encoded = serde_json::to_vec(request)?;
        self.store.hset(WANTED_KEY, &request.youtube_id, &encoded)
    }

    pub fn contains(&self, youtube_id: &str) -> Result<bool> {
        match self.store.hget(WANTED_KEY, youtube_id) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Returns whether the extra was wanted.
    pub fn remove(&self, youtube_id: &str) -> Result<bool> {
        self.store.hdel(WANTED_KEY, youtube_id)
    }
}

#[async_trait]
impl WantedSource for StoreWantedSource {
    async fn wanted(&self) -> Result<Vec<ExtraRequest>> {
        let values = self.store.hvals(WANTED_KEY)?;

        let mut requests = Vec::with_capacity(values.len());
        for value in values {
            match serde_json::from_slice::<ExtraRequest>(&value) {
                Ok(request) => requests.push(request),
                Err(e) => tracing::warn!("Skipping malformed wanted extra: {}", e),
            }
        }

        Ok(requests)
    }
}
