//! Configuration module for the extras-downloader.
//!
//! This module handles:
//! - Loading configuration from TOML files
//! - Configuration validation

pub mod loader;
pub mod validation;

pub use loader::{ArrConfig, Config, DownloadConfig, GeneralConfig, ScheduleConfig};
pub use validation::{validate_config, validate_listen_addr};
