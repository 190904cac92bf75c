//! Filter modes pick the right filters for a file without being told:
//! a mode declares which extensions it covers and, where an extension is
//! ambiguous, what the first bytes of such a file look like. This binary
//! lists the modes found along the search path, tells which one a file
//! belongs to and shows what activating a mode changes.

use anyhow::Result;
use clap::{Parser, Subcommand};
use filter_modes::core::config::{Config, ConfigProvider, SettingsManager};
use filter_modes::{ModeCache, utils};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "filter-modes")]
#[command(version)]
#[command(about = "Select filter modes for files by extension and content")]
struct Cli {
    /// Settings file (TOML)
    #[arg(short, long, default_value = "filter-modes.toml")]
    config: PathBuf,

    /// Directory to search for .amf mode files; replaces the configured path
    #[arg(short = 'p', long = "filter-path")]
    filter_path: Vec<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default settings file
    Init,
    /// List the available modes
    List {
        /// Output format: text, json or yaml
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Print the mode selected for a file
    Detect { file: String },
    /// Activate a mode and print the resulting settings
    Activate { mode: String },
    /// Print the definition file of a mode
    Locate { mode: String },
    /// Load every mode file and report errors
    Check,
}

fn setup_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("filter_modes=debug")
        } else {
            EnvFilter::new("filter_modes=info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let manager = SettingsManager::new(&cli.config);
    let mut config = manager.load_config(ModeCache::global())?;
    if !cli.filter_path.is_empty() {
        config.set_filter_path(cli.filter_path.clone())?;
    }
    tracing::debug!(
        "settings from {}, search path {:?}",
        manager.settings_path().display(),
        config.filter_path()
    );
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    if let Commands::Init = cli.command {
        return utils::initialize_settings(&cli.config);
    }

    let mut config = load_config(&cli)?;
    match &cli.command {
        Commands::Init => Ok(()),
        Commands::List { format } => utils::list_modes(&mut config, format),
        Commands::Detect { file } => utils::detect_mode(&mut config, file),
        Commands::Activate { mode } => utils::activate_mode(&mut config, mode),
        Commands::Locate { mode } => utils::locate_mode(&config, mode),
        Commands::Check => utils::check_modes(&mut config),
    }
}
