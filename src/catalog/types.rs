//! Catalog types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::queue::{ExtraRequest, MediaType};

/// Which *arr application a catalog comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    Radarr,
    Sonarr,
}

impl CatalogKind {
    /// API path listing the whole library, relative to the base URL.
    pub fn endpoint(&self) -> &'static str {
        match self {
            CatalogKind::Radarr => "api/v3/movie",
            CatalogKind::Sonarr => "api/v3/series",
        }
    }

    /// Store hash caching the library, keyed by catalog id.
    pub fn cache_key(&self) -> &'static str {
        match self {
            CatalogKind::Radarr => "radarr:media",
            CatalogKind::Sonarr => "sonarr:media",
        }
    }

    /// Store scalar holding the last successful sync time.
    pub fn last_sync_key(&self) -> &'static str {
        match self {
            CatalogKind::Radarr => "radarr:last_sync",
            CatalogKind::Sonarr => "sonarr:last_sync",
        }
    }

    pub fn media_type(&self) -> MediaType {
        match self {
            CatalogKind::Radarr => MediaType::Movie,
            CatalogKind::Sonarr => MediaType::Tv,
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogKind::Radarr => write!(f, "Radarr"),
            CatalogKind::Sonarr => write!(f, "Sonarr"),
        }
    }
}

/// A movie or series as returned by the catalog API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub tmdb_id: Option<i64>,
    #[serde(default)]
    pub tvdb_id: Option<i64>,
    #[serde(default)]
    pub imdb_id: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub monitored: bool,
    /// Only Radarr reports a trailer.
    #[serde(default, rename = "youTubeTrailerId")]
    pub youtube_trailer_id: Option<String>,
}

impl MediaItem {
    /// Folder-style title, e.g. `Heat (1995)`.
    pub fn display_title(&self) -> String {
        match self.year.filter(|y| *y > 0) {
            Some(year) => format!("{} ({})", self.title, year),
            None => self.title.clone(),
        }
    }

    /// Download request for the item's trailer, if it has one.
    pub fn trailer_request(&self, kind: CatalogKind) -> Option<ExtraRequest> {
        let youtube_id = self
            .youtube_trailer_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())?;

        Some(ExtraRequest {
            youtube_id: youtube_id.to_string(),
            media_type: kind.media_type(),
            media_id: self.id,
            media_title: self.display_title(),
            extra_type: "Trailers".to_string(),
            extra_title: format!("{} Trailer", self.title),
        })
    }
}
