//! Scheduled catalog sync.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::catalog::client::ArrClient;
use crate::catalog::types::{CatalogKind, MediaItem};
use crate::download::{validate_video_id, StoreWantedSource};
use crate::error::Result;
use crate::scheduler::Job;
use crate::store::Store;

/// Mirrors a catalog into the store and optionally wants its trailers.
pub struct CatalogSyncJob {
    client: ArrClient,
    store: Store,
    wanted: Option<StoreWantedSource>,
}

impl CatalogSyncJob {
    pub fn new(client: ArrClient, store: Store) -> Self {
        Self {
            client,
            store,
            wanted: None,
        }
    }

    /// Mark trailers reported by the catalog as wanted after each sync.
    pub fn with_trailers(mut self, wanted: StoreWantedSource) -> Self {
        self.wanted = Some(wanted);
        self
    }

    /// Fetch the library and replace the cached copy.
    ///
    /// Nothing is written when the fetch fails, so the previous cache stays intact.
    pub async fn sync(&self) -> Result<usize> {
        let kind = self.client.kind();
        let items = self.client.fetch_media().await?;

        let mut entries = Vec::with_capacity(items.len());
        for item in &items {
            entries.push((item.id.to_string(), serde_json::to_vec(item)?));
        }

        self.store.hreplace(kind.cache_key(), &entries)?;
        self.store
            .set(kind.last_sync_key(), Utc::now().to_rfc3339().as_bytes())?;

        tracing::info!("{} sync cached {} items", kind, items.len());

        if let Some(wanted) = &self.wanted {
            let added = want_trailers(wanted, kind, &items)?;
            if added > 0 {
                tracing::info!("{} trailers marked as wanted", added);
            }
        }

        Ok(items.len())
    }
}

#[async_trait]
impl Job for CatalogSyncJob {
    async fn run(&self, _cancel: CancellationToken) -> Result<()> {
        self.sync().await.map(|_| ())
    }
}

fn want_trailers(wanted: &StoreWantedSource, kind: CatalogKind, items: &[MediaItem]) -> Result<usize> {
    let mut added = 0;
    for request in items.iter().filter_map(|item| item.trailer_request(kind)) {
        if let Err(e) = validate_video_id(&request.youtube_id) {
            tracing::debug!("Skipping trailer of '{}': {}", request.media_title, e);
            continue;
        }
        if wanted.contains(&request.youtube_id)? {
            continue;
        }
        wanted.add(&request)?;
        added += 1;
    }
    Ok(added)
}

/// Cached library of a catalog, ordered by catalog id as text.
pub fn cached_media(store: &Store, kind: CatalogKind) -> Result<Vec<MediaItem>> {
    let mut items = Vec::new();
    for value in store.hvals(kind.cache_key())? {
        match serde_json::from_slice(&value) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!("Skipping malformed cached {} item: {}", kind, e),
        }
    }
    Ok(items)
}

/// Time of the last successful sync, `None` if it never succeeded.
pub fn last_sync(store: &Store, kind: CatalogKind) -> Result<Option<DateTime<Utc>>> {
    let raw = match store.get(kind.last_sync_key()) {
        Ok(raw) => raw,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(e),
    };

    Ok(DateTime::parse_from_rfc3339(&String::from_utf8_lossy(&raw))
        .ok()
        .map(|t| t.with_timezone(&Utc)))
}
