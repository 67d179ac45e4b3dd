//! Output module for console output.
//!
//! Provides colored startup and status lines for the terminal.

pub mod console;

pub use console::{
    print_banner, print_config_summary, print_error, print_info, print_success,
    print_task_summary, print_warning,
};
