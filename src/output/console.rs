//! Console output utilities.

use console::style;

use crate::config::Config;
use crate::scheduler::{RunState, TaskSnapshot};

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", style("INFO").cyan().bold(), message);
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", style("OK").green().bold(), message);
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", style("WARN").yellow().bold(), message);
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", style("ERROR").red().bold(), message);
}

/// Print the application banner.
pub fn print_banner() {
    let banner = r#"
╔═══════════════════════════════════════════════════════╗
║     Extras Downloader                                 ║
║     Trailers and extras for Radarr and Sonarr         ║
╚═══════════════════════════════════════════════════════╝
"#;
    println!("{}", style(banner).cyan());
}

/// Print configuration summary.
pub fn print_config_summary(config: &Config) {
    let catalog = |enabled: bool, url: &str| {
        if enabled {
            url.to_string()
        } else {
            style("disabled").dim().to_string()
        }
    };

    println!();
    println!("{}", style("Configuration:").bold());
    println!("  Data: {}", config.data_dir().display());
    println!("  Extras: {}", config.output_dir().display());
    println!("  Radarr: {}", catalog(config.radarr.enabled, &config.radarr.url));
    println!("  Sonarr: {}", catalog(config.sonarr.enabled, &config.sonarr.url));
    println!("  Live updates: ws://{}", config.general.listen_addr);
    println!();
}

/// Print one line per task with its schedule.
pub fn print_task_summary(tasks: &[TaskSnapshot]) {
    println!("{}", style("Tasks:").bold());
    for task in tasks {
        let status = match task.status {
            RunState::Running => style(task.status.to_string()).green(),
            RunState::Idle => style(task.status.to_string()).dim(),
        };
        let last = task
            .last_execution
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());

        println!(
            "  {:<24} every {:>4} min  last {}  next {}  {}",
            task.label,
            task.interval,
            last,
            task.next_execution.format("%Y-%m-%d %H:%M:%S"),
            status
        );
        if let Some(error) = &task.last_error {
            println!("  {} {}", style("└ last error:").red(), error);
        }
    }
    println!();
}
