//! Filesystem module.
//!
//! Provides:
//! - Output directory layout for extras
//! - Filename sanitizing
//! - Atomic state-file writes

pub mod naming;
pub mod paths;

pub use naming::sanitize_path_component;
pub use paths::{extra_output_dir, write_atomic};
