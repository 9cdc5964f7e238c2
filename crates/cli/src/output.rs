//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Color a percentage of affected packets
pub fn color_percentage(value: u32) -> String {
    let formatted = format!("{}%", value);
    match value {
        0 => formatted.dimmed().to_string(),
        1..=49 => formatted.yellow().to_string(),
        _ => formatted.red().to_string(),
    }
}

/// Format a bandwidth limit in bytes per second
pub fn format_bandwidth(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes == 0 {
        "unlimited".to_string()
    } else if bytes >= GB {
        format!("{:.2}Gi/s", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2}Mi/s", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2}Ki/s", bytes as f64 / KB as f64)
    } else {
        format!("{}B/s", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bandwidth() {
        assert_eq!(format_bandwidth(0), "unlimited");
        assert_eq!(format_bandwidth(512), "512B/s");
        assert_eq!(format_bandwidth(2048), "2.00Ki/s");
        assert_eq!(format_bandwidth(3 * 1024 * 1024), "3.00Mi/s");
    }
}
