//! Configuration validation logic.

use std::net::SocketAddr;

use crate::config::loader::{ArrConfig, Config};
use crate::error::{Error, Result};
use crate::scheduler::MAX_INTERVAL_MINUTES;
use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum length for an *arr API key.
const MIN_API_KEY_LENGTH: usize = 20;

static API_KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("API key regex should compile"));

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_listen_addr(&config.general.listen_addr)?;

    if config.radarr.enabled {
        validate_arr("radarr", &config.radarr)?;
    }
    if config.sonarr.enabled {
        validate_arr("sonarr", &config.sonarr)?;
    }

    validate_interval("schedule.radarr_sync_minutes", config.schedule.radarr_sync_minutes)?;
    validate_interval("schedule.sonarr_sync_minutes", config.schedule.sonarr_sync_minutes)?;
    validate_interval("schedule.extras_minutes", config.schedule.extras_minutes)?;

    if config.download.ytdlp_path.as_os_str().is_empty() {
        return Err(Error::MissingConfig("download.ytdlp_path".to_string()));
    }

    if config.download.timeout_minutes == 0 {
        return Err(Error::ConfigValidation {
            field: "download.timeout_minutes".to_string(),
            message: "Download timeout must be at least 1 minute".to_string(),
        });
    }

    if config.download.watch_poll_ms == 0 {
        return Err(Error::ConfigValidation {
            field: "download.watch_poll_ms".to_string(),
            message: "Poll interval must be greater than zero".to_string(),
        });
    }

    Ok(())
}

/// Validate the websocket listen address.
pub fn validate_listen_addr(addr: &str) -> Result<SocketAddr> {
    addr.parse().map_err(|_| Error::ConfigValidation {
        field: "general.listen_addr".to_string(),
        message: format!("'{}' is not a valid socket address (expected host:port)", addr),
    })
}

/// Validate a task interval.
pub fn validate_interval(field: &str, minutes: u64) -> Result<()> {
    if minutes == 0 {
        return Err(Error::ConfigValidation {
            field: field.to_string(),
            message: "Interval must be at least 1 minute".to_string(),
        });
    }

    if minutes > MAX_INTERVAL_MINUTES {
        return Err(Error::ConfigValidation {
            field: field.to_string(),
            message: format!(
                "Interval must be at most {} minutes (got {})",
                MAX_INTERVAL_MINUTES, minutes
            ),
        });
    }

    Ok(())
}

/// Validate an enabled Radarr/Sonarr section.
pub fn validate_arr(section: &str, arr: &ArrConfig) -> Result<()> {
    validate_url(&format!("{}.url", section), &arr.url)?;
    validate_api_key(&format!("{}.api_key", section), &arr.api_key)
}

/// Validate a catalog base URL.
pub fn validate_url(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::MissingConfig(field.to_string()));
    }

    let url = url::Url::parse(value).map_err(|e| Error::ConfigValidation {
        field: field.to_string(),
        message: format!("Invalid URL '{}': {}", value, e),
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(Error::ConfigValidation {
            field: field.to_string(),
            message: format!("URL must use http or https (got '{}')", url.scheme()),
        });
    }

    Ok(())
}

/// Validate an API key.
pub fn validate_api_key(field: &str, key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::MissingConfig(field.to_string()));
    }

    // Check for placeholder values
    let lower = key.to_lowercase();
    if lower.contains("replaceme") || lower.contains("your_api_key") {
        return Err(Error::ConfigValidation {
            field: field.to_string(),
            message: "API key appears to be a placeholder. Copy it from Settings > General."
                .to_string(),
        });
    }

    if key.len() < MIN_API_KEY_LENGTH {
        return Err(Error::ConfigValidation {
            field: field.to_string(),
            message: format!(
                "API key must be at least {} characters (got {})",
                MIN_API_KEY_LENGTH,
                key.len()
            ),
        });
    }

    if !API_KEY_PATTERN.is_match(key) {
        return Err(Error::ConfigValidation {
            field: field.to_string(),
            message: "API key may only contain letters and digits".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn enabled_radarr() -> Config {
        let mut config = Config::default();
        config.radarr.enabled = true;
        config.radarr.api_key = KEY.to_string();
        config
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_enabled_catalog_needs_key() {
        let mut config = enabled_radarr();
        assert!(validate_config(&config).is_ok());

        config.radarr.api_key.clear();
        assert!(matches!(
            validate_config(&config),
            Err(Error::MissingConfig(field)) if field == "radarr.api_key"
        ));
    }

    #[test]
    fn test_api_key_rules() {
        assert!(validate_api_key("k", KEY).is_ok());
        assert!(validate_api_key("k", "replaceme_replaceme_replaceme").is_err());
        assert!(validate_api_key("k", "short").is_err());
        assert!(validate_api_key("k", "0123456789abcdef0123-56789abcdef").is_err());
    }

    #[test]
    fn test_url_rules() {
        assert!(validate_url("u", "http://localhost:7878").is_ok());
        assert!(validate_url("u", "https://nas.local/radarr").is_ok());
        assert!(validate_url("u", "ftp://nas.local").is_err());
        assert!(validate_url("u", "localhost:7878/ not a url").is_err());
        assert!(matches!(validate_url("u", " "), Err(Error::MissingConfig(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = Config::default();
        config.schedule.extras_minutes = 0;
        assert!(matches!(
            validate_config(&config),
            Err(Error::ConfigValidation { field, .. }) if field == "schedule.extras_minutes"
        ));
    }

    #[test]
    fn test_huge_interval_rejected() {
        tokio_test::assert_ok!(validate_interval("i", MAX_INTERVAL_MINUTES));

        let mut config = Config::default();
        config.schedule.radarr_sync_minutes = u64::MAX;
        assert!(matches!(
            validate_config(&config),
            Err(Error::ConfigValidation { field, .. }) if field == "schedule.radarr_sync_minutes"
        ));
    }

    #[test]
    fn test_listen_addr() {
        tokio_test::assert_ok!(validate_listen_addr("0.0.0.0:8765"));
        tokio_test::assert_ok!(validate_listen_addr("[::1]:8765"));
        tokio_test::assert_err!(validate_listen_addr("localhost"));
    }
}
