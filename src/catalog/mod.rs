//! Radarr/Sonarr catalog module.
//!
//! This module provides:
//! - Catalog and media item types
//! - An HTTP client for the *arr v3 API
//! - The scheduled sync job caching each library in the store

pub mod client;
pub mod sync;
pub mod types;

pub use client::ArrClient;
pub use sync::{cached_media, last_sync, CatalogSyncJob};
pub use types::{CatalogKind, MediaItem};
