//! Output formatting utilities for the Postwatch CLI.
//!
//! Supports table, JSON, and YAML output formats.

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::*;
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

/// Output format selection.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Render as a formatted table
    #[default]
    Table,
    /// Render as JSON
    Json,
    /// Render as YAML
    Yaml,
}

/// Print a success message to stdout.
pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// Print an error message to stderr.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), msg);
}

/// Print a warning message to stderr.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// Print an informational message to stdout.
pub fn print_info(msg: &str) {
    println!("{} {}", "[INFO]".blue().bold(), msg);
}

/// Render rows as a rounded table.
pub fn render_table<T: Tabled>(items: &[T]) -> String {
    Table::new(items)
        .with(Style::rounded())
        .with(Modify::new(Columns::first()).with(Alignment::left()))
        .to_string()
}

/// Serialize a value in a structured format. `Table` falls back to JSON.
pub fn render_structured<T: Serialize + ?Sized>(item: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table | OutputFormat::Json => {
            serde_json::to_string_pretty(item).context("Failed to serialize to JSON")
        }
        OutputFormat::Yaml => serde_yaml::to_string(item).context("Failed to serialize to YAML"),
    }
}

/// Print a list of items in the requested format.
///
/// For table output, items must implement `Tabled`. For JSON/YAML, items must
/// implement `Serialize`.
pub fn print_list<T: Tabled + Serialize>(items: &[T], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No results found.".dimmed());
            } else {
                println!("{}", render_table(items));
            }
        }
        _ => print_item(items, format)?,
    }
    Ok(())
}

/// Print a single item in the requested format.
pub fn print_item<T: Serialize + ?Sized>(item: &T, format: OutputFormat) -> Result<()> {
    let rendered = render_structured(item, format)?;
    if rendered.ends_with('\n') {
        print!("{}", rendered);
    } else {
        println!("{}", rendered);
    }
    Ok(())
}

/// Print key-value details to the terminal (non-JSON/YAML output).
pub fn print_detail(key: &str, value: &str) {
    println!("  {}: {}", key.cyan(), value);
}

/// Print a section header.
pub fn print_header(title: &str) {
    println!();
    println!("{}", title.bold().underline());
    println!();
}

/// Shorten `text` to at most `max` characters, marking the cut with `...`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Tabled, Serialize)]
    struct Row {
        name: &'static str,
        count: u32,
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 10), "abcdefghij");
        assert_eq!(truncate("abcdefghijk", 10), "abcdefg...");
        assert_eq!(truncate("ééééé", 4), "é...");
    }

    #[test]
    fn test_render_structured() {
        let rows = vec![Row { name: "a", count: 1 }];

        let json = render_structured(&rows, OutputFormat::Json).unwrap();
        assert!(json.contains("\"name\": \"a\""));

        let yaml = render_structured(&rows, OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("name: a"));
    }

    #[test]
    fn test_render_table_has_headers() {
        let table = render_table(&[Row { name: "a", count: 1 }]);
        assert!(table.contains("name"));
        assert!(table.contains("count"));
    }
}
