//! Configuration management commands.
//!
//! Stores CLI configuration in `~/.postwatch/config.toml`.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::output::{self, OutputFormat};

/// Key holding the default API URL.
pub const API_URL_KEY: &str = "api-url";

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., api-url)
        key: String,
        /// Value to set
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Show all configuration
    Show,

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

/// Persistent CLI configuration stored on disk.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

impl CliConfig {
    /// Load from `path`, returning defaults if the file does not exist.
    fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Save to `path`, creating the directory if needed.
    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".postwatch").join("config.toml"))
}

/// Load the `api-url` value from the config file, if set.
pub fn load_api_url() -> Option<String> {
    let path = config_path().ok()?;
    CliConfig::load_from(&path)
        .ok()
        .and_then(|cfg| cfg.values.get(API_URL_KEY).cloned())
}

pub async fn execute(cmd: ConfigCommands, format: OutputFormat) -> Result<()> {
    let path = config_path()?;

    match cmd {
        ConfigCommands::Set { key, value } => {
            let mut cfg = CliConfig::load_from(&path)?;
            cfg.values.insert(key.clone(), value.clone());
            cfg.save_to(&path)?;

            match format {
                OutputFormat::Table => output::print_success(&format!("{} = {}", key, value)),
                _ => output::print_item(&serde_json::json!({ "key": key, "value": value }), format)?,
            }
        }

        ConfigCommands::Get { key } => {
            let cfg = CliConfig::load_from(&path)?;
            let value = cfg
                .values
                .get(&key)
                .with_context(|| format!("Key '{}' not found", key))?;

            match format {
                OutputFormat::Table => println!("{}", value),
                _ => output::print_item(&serde_json::json!({ "key": key, "value": value }), format)?,
            }
        }

        ConfigCommands::Show => {
            let cfg = CliConfig::load_from(&path)?;

            if cfg.values.is_empty() {
                output::print_info("No configuration values set.");
                return Ok(());
            }

            match format {
                OutputFormat::Table => {
                    output::print_header("Configuration");
                    for (k, v) in &cfg.values {
                        output::print_detail(k, v);
                    }
                }
                _ => output::print_item(&cfg.values, format)?,
            }
        }

        ConfigCommands::Reset { force } => {
            if !force {
                output::print_info("This will reset all CLI configuration. Use --force to confirm.");
                return Ok(());
            }

            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }

            output::print_success("Configuration reset to defaults");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = std::env::temp_dir().join(format!("postwatch-cli-missing-{}", std::process::id()));
        let cfg = CliConfig::load_from(&dir.join("config.toml")).unwrap();
        assert!(cfg.values.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("postwatch-cli-save-{}", std::process::id()));
        let path = dir.join("nested").join("config.toml");

        let mut cfg = CliConfig::default();
        cfg.values
            .insert(API_URL_KEY.to_string(), "http://10.0.0.5:8000".to_string());
        cfg.save_to(&path).unwrap();

        let loaded = CliConfig::load_from(&path).unwrap();
        assert_eq!(
            loaded.values.get(API_URL_KEY).map(String::as_str),
            Some("http://10.0.0.5:8000")
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
