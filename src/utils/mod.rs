use anyhow::{Context, Result};
use std::io;
use std::path::Path;

use crate::builders::definition::MODE_FILE_SUFFIX;
use crate::builders::reporter::{HelpReporter, ModeReporter, summarize};
use crate::core::config::{Config, ConfigProvider, SettingsManager};

pub mod paths;

pub fn initialize_settings(settings_path: &Path) -> Result<()> {
    let manager = SettingsManager::new(settings_path);
    manager.initialize()?;
    println!("✓ Initialized mode settings in {}", manager.settings_path().display());
    println!("Put .amf mode files into the directories listed under filter_path");
    Ok(())
}

/// Prints the available modes as a help table, JSON or YAML.
pub fn list_modes(config: &mut Config, format: &str) -> Result<()> {
    let registry = config.filter_modes().context("Failed to load modes")?;

    match format {
        "json" => {
            let content = serde_json::to_string_pretty(&summarize(&registry))
                .context("Failed to serialize to JSON")?;
            println!("{content}");
        }
        "yaml" => {
            let content = serde_yaml::to_string(&summarize(&registry))
                .context("Failed to serialize to YAML")?;
            print!("{content}");
        }
        _ => {
            if registry.is_empty() {
                println!("No modes found along {}", config.search_path()?);
                return Ok(());
            }
            HelpReporter::new()
                .write_mode_help(&registry, &mut io::stdout().lock())
                .context("Failed to write mode list")?;
        }
    }
    Ok(())
}

/// Prints the mode selected for `file`.
pub fn detect_mode(config: &mut Config, file: &str) -> Result<()> {
    match config.set_mode_from_file(file, None)? {
        Some(mode) => {
            println!("{mode}");
            Ok(())
        }
        None => anyhow::bail!("No mode matches {file}"),
    }
}

/// Activates `mode` and prints what it changed.
pub fn activate_mode(config: &mut Config, mode: &str) -> Result<()> {
    config
        .replace("mode", mode)
        .with_context(|| format!("Failed to activate mode {mode}"))?;

    println!("✓ Activated mode {mode}");
    println!("  filters: {}", config.filters().join(", "));
    for (key, value) in config.options() {
        println!("  {key} = {value}");
    }
    Ok(())
}

/// Prints the definition file that provides `mode`.
pub fn locate_mode(config: &Config, mode: &str) -> Result<()> {
    let file_name = format!("{}{MODE_FILE_SUFFIX}", mode.to_lowercase());
    match paths::find_file(config.filter_path(), &file_name) {
        Some(found) => {
            println!("{}", found.path.display());
            Ok(())
        }
        None => anyhow::bail!("No definition for mode {mode} along {}", config.search_path()?),
    }
}

/// Builds the registry and reports the outcome.
pub fn check_modes(config: &mut Config) -> Result<()> {
    let registry = config.filter_modes()?;
    println!(
        "✓ {} modes loaded from {}",
        registry.len(),
        config.search_path()?
    );
    Ok(())
}
