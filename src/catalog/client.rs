//! Radarr/Sonarr HTTP client.

use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::catalog::types::{CatalogKind, MediaItem};
use crate::error::{Error, Result};

/// Request timeout for catalog calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for one *arr instance.
#[derive(Debug, Clone)]
pub struct ArrClient {
    client: Client,
    base_url: Url,
    api_key: String,
    kind: CatalogKind,
}

impl ArrClient {
    pub fn new(kind: CatalogKind, base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        // Url::join replaces the last segment unless the path ends with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(concat!("extras-downloader/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Api(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            kind,
        })
    }

    pub fn kind(&self) -> CatalogKind {
        self.kind
    }

    /// Full URL of the library listing.
    pub fn endpoint(&self) -> Result<Url> {
        Ok(self.base_url.join(self.kind.endpoint())?)
    }

    /// Fetch the whole library.
    pub async fn fetch_media(&self) -> Result<Vec<MediaItem>> {
        let url = self.endpoint()?;
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Response status: {}", status);

        if status == 401 || status == 403 {
            return Err(Error::Authentication(format!(
                "{} rejected the API key (HTTP {})",
                self.kind, status
            )));
        }

        let text = response.text().await?;
        if !status.is_success() {
            return Err(Error::Api(format!(
                "{} returned HTTP {}: {}",
                self.kind,
                status,
                text.trim()
            )));
        }

        serde_json::from_str(&text)
            .map_err(|e| Error::Api(format!("Failed to parse {} library: {}", self.kind, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::serve_once;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = ArrClient::new(CatalogKind::Radarr, "http://nas:7878/radarr", "key").unwrap();
        assert_eq!(
            client.endpoint().unwrap().as_str(),
            "http://nas:7878/radarr/api/v3/movie"
        );

        let client = ArrClient::new(CatalogKind::Sonarr, "http://nas:8989/", "key").unwrap();
        assert_eq!(
            client.endpoint().unwrap().as_str(),
            "http://nas:8989/api/v3/series"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = ArrClient::new(CatalogKind::Radarr, "not a url", "key");
        assert!(matches!(result, Err(Error::UrlParse(_))));
    }

    #[tokio::test]
    async fn test_fetch_media_sends_api_key() {
        let (base, server) = serve_once("200 OK", r#"[{"id": 1, "title": "Heat"}]"#).await;
        let client = ArrClient::new(CatalogKind::Radarr, &base, "secret-key").unwrap();

        let items = client.fetch_media().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Heat");

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /api/v3/movie"));
        assert!(request.contains("x-api-key: secret-key"));
    }

    #[tokio::test]
    async fn test_fetch_media_auth_error() {
        let (base, _server) = serve_once("401 Unauthorized", "").await;
        let client = ArrClient::new(CatalogKind::Sonarr, &base, "wrong").unwrap();

        let result = client.fetch_media().await;
        assert!(matches!(result, Err(Error::Authentication(_))));
    }

    #[tokio::test]
    async fn test_fetch_media_server_error() {
        let (base, _server) = serve_once("500 Internal Server Error", "boom").await;
        let client = ArrClient::new(CatalogKind::Radarr, &base, "key").unwrap();

        let err = client.fetch_media().await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
