use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::builders::magic::MagicSource;
use crate::builders::registry::ModeRegistry;
use crate::builders::storage::ModeCache;
use crate::builders::validator::{DEFAULT_HOST_VERSION, HostVersion};
use crate::core::engine::ModeNotifier;
use crate::core::error::{ModeError, ModeResult};
use crate::utils::paths::{add_possible_dir, join_search_path, split_search_path};

/// Setting holding the list of directories searched for mode files.
pub const FILTER_PATH_KEY: &str = "filter-path";
/// Setting naming the active mode.
pub const MODE_KEY: &str = "mode";
pub const CLEAR_FILTER_KEY: &str = "clear-filter";
pub const ADD_FILTER_KEY: &str = "add-filter";
pub const REMOVE_FILTER_KEY: &str = "rem-filter";

/// Modes may activate other modes through `option mode ...`; this bounds the
/// chain.
const MAX_ACTIVATION_DEPTH: usize = 8;

/// The live configuration modes are activated into.
///
/// Apart from the filter chain, the search path and the selected mode, every
/// key is stored as a plain string. Updating the search path or the mode
/// notifies the attached [`ModeNotifier`], if any.
#[derive(Debug, Clone, Default)]
pub struct Config {
    filter_path: Vec<String>,
    mode: Option<String>,
    filters: Vec<String>,
    options: BTreeMap<String, String>,
    modes: Option<ModeNotifier>,
    activation_depth: usize,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches mode support. Until this is called, setting `mode` only
    /// records the name.
    pub fn attach_modes(&mut self, notifier: ModeNotifier) {
        self.modes = Some(notifier);
    }

    /// Attaches mode support backed by `cache` and the default host version.
    pub fn attach_mode_cache(&mut self, cache: Arc<ModeCache>) {
        self.attach_modes(ModeNotifier::new(cache, Arc::new(HostVersion::default())));
    }

    pub fn mode_notifier(&self) -> Option<&ModeNotifier> {
        self.modes.as_ref()
    }

    pub fn filter_path(&self) -> &[String] {
        &self.filter_path
    }

    /// The search path as a single string, the key registries are cached by.
    pub fn search_path(&self) -> ModeResult<String> {
        join_search_path(&self.filter_path)
    }

    pub fn mode(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    /// The active filter chain, in order.
    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// Reads any setting back as a string.
    pub fn retrieve(&self, key: &str) -> Option<String> {
        match key {
            FILTER_PATH_KEY => self.search_path().ok(),
            MODE_KEY => self.mode.clone(),
            _ => self.options.get(key).cloned(),
        }
    }

    /// Sets `key` to `value`.
    ///
    /// `clear-filter`, `add-filter` and `rem-filter` edit the filter chain.
    /// `filter-path` replaces the search path and drops the mode registry.
    /// `mode` selects a mode and, with mode support attached, activates it;
    /// if activation fails the previous mode is kept. Settings already
    /// applied by a partially activated mode are not rolled back.
    pub fn replace(&mut self, key: &str, value: &str) -> ModeResult<()> {
        match key {
            CLEAR_FILTER_KEY => self.filters.clear(),
            ADD_FILTER_KEY => {
                if !self.filters.iter().any(|f| f == value) {
                    self.filters.push(value.to_string());
                }
            }
            REMOVE_FILTER_KEY => self.filters.retain(|f| f != value),
            FILTER_PATH_KEY => {
                let dirs = split_search_path(value)
                    .into_iter()
                    .map(|dir| dir.to_string_lossy().into_owned())
                    .collect();
                self.set_filter_path(dirs)?;
            }
            MODE_KEY => {
                let previous = self.mode.replace(value.to_string());
                if self.modes.is_some()
                    && let Err(e) = self.activate(value)
                {
                    self.mode = previous;
                    return Err(e);
                }
            }
            _ => {
                self.options.insert(key.to_string(), value.to_string());
            }
        }
        Ok(())
    }

    /// Replaces the search path directories.
    pub fn set_filter_path(&mut self, dirs: Vec<String>) -> ModeResult<()> {
        let old = self.search_path()?;
        self.filter_path = dirs;
        let new = self.search_path()?;
        if let Some(modes) = self.modes.as_mut() {
            modes.search_path_updated(&old, &new);
        }
        Ok(())
    }

    /// Appends one directory to the search path.
    pub fn add_filter_path(&mut self, dir: impl Into<String>) -> ModeResult<()> {
        let mut dirs = self.filter_path.clone();
        dirs.push(dir.into());
        self.set_filter_path(dirs)
    }

    /// The registry for the current search path.
    pub fn filter_modes(&mut self) -> ModeResult<Arc<ModeRegistry>> {
        let search_path = self.search_path()?;
        let modes = self.modes.get_or_insert_with(ModeNotifier::with_defaults);
        modes.filter_modes(&search_path)
    }

    /// Applies the expansions of mode `name`: the filter chain is cleared,
    /// then each declared key/value pair is set in file order.
    pub fn activate(&mut self, name: &str) -> ModeResult<()> {
        let registry = self.filter_modes()?;
        let mode = registry
            .get(name)
            .ok_or_else(|| ModeError::UnknownMode(name.to_string()))?;

        if self.activation_depth >= MAX_ACTIVATION_DEPTH {
            return Err(ModeError::ActivationTooDeep {
                mode: mode.name().to_string(),
            });
        }

        debug!("activating mode {}", mode.name());
        self.activation_depth += 1;
        let result = self.replace(CLEAR_FILTER_KEY, "").and_then(|()| {
            mode.expansions().iter().try_for_each(|expansion| {
                self.replace(&expansion.key, &expansion.value)
                    .map_err(|e| e.in_file(mode.file()))
            })
        });
        self.activation_depth -= 1;
        result
    }

    /// Selects the mode for `file_name` and, on a match, sets `mode` to it.
    ///
    /// Returns the name of the selected mode.
    pub fn set_mode_from_file(
        &mut self,
        file_name: &str,
        input: Option<&mut (dyn MagicSource + '_)>,
    ) -> ModeResult<Option<String>> {
        let registry = self.filter_modes()?;
        let Some(mode) = registry.select(file_name, input) else {
            debug!("no mode claims {file_name}");
            return Ok(None);
        };
        let name = mode.name().to_string();
        self.replace(MODE_KEY, &name)?;
        Ok(Some(name))
    }
}

/// The on-disk settings a [`Config`] is created from.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ModeSettings {
    /// Directories searched for `.amf` files. Relative entries are taken
    /// relative to the settings file.
    pub filter_path: Vec<String>,
    /// Engine version mode files are checked against.
    pub host_version: String,
    /// Mode to activate right away.
    pub mode: Option<String>,
    /// Additional plain settings.
    pub options: BTreeMap<String, String>,
}

impl Default for ModeSettings {
    fn default() -> Self {
        Self {
            filter_path: vec!["modes".to_string()],
            host_version: DEFAULT_HOST_VERSION.to_string(),
            mode: None,
            options: BTreeMap::new(),
        }
    }
}

impl ModeSettings {
    /// Builds a configuration with mode support attached to `cache`.
    ///
    /// # Arguments
    /// * `base_dir`: Directory relative `filter_path` entries are resolved
    ///   against, normally the one holding the settings file.
    /// * `cache`: The registry cache the configuration should share.
    pub fn into_config(self, base_dir: &Path, cache: Arc<ModeCache>) -> Result<Config> {
        let host = HostVersion::new(&self.host_version)
            .with_context(|| format!("Invalid host version {}", self.host_version))?;

        let mut config = Config::new();
        config.attach_modes(ModeNotifier::new(cache, Arc::new(host)));

        let base = base_dir.to_string_lossy();
        let dirs = self
            .filter_path
            .iter()
            .map(|dir| add_possible_dir(&base, dir))
            .collect();
        config.set_filter_path(dirs)?;

        for (key, value) in &self.options {
            config
                .replace(key, value)
                .with_context(|| format!("Failed to apply setting {key}"))?;
        }
        if let Some(mode) = &self.mode {
            config
                .replace(MODE_KEY, mode)
                .with_context(|| format!("Failed to activate mode {mode}"))?;
        }
        Ok(config)
    }
}

/// Reads and writes [`ModeSettings`] as TOML.
pub trait ConfigProvider {
    fn load_settings(&self) -> Result<ModeSettings>;
    fn save_settings(&self, settings: &ModeSettings) -> Result<()>;
    fn settings_path(&self) -> &Path;
}

pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    pub fn new(settings_path: impl Into<PathBuf>) -> Self {
        Self {
            settings_path: settings_path.into(),
        }
    }

    /// Writes default settings unless the file already exists.
    pub fn initialize(&self) -> Result<()> {
        if self.settings_path.exists() {
            return Ok(());
        }
        self.save_settings(&ModeSettings::default())
    }

    /// Directory relative paths in the settings are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        match self.settings_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Loads the settings and turns them into a live configuration.
    pub fn load_config(&self, cache: Arc<ModeCache>) -> Result<Config> {
        self.load_settings()?.into_config(&self.base_dir(), cache)
    }
}

impl ConfigProvider for SettingsManager {
    fn load_settings(&self) -> Result<ModeSettings> {
        if !self.settings_path.exists() {
            return Ok(ModeSettings::default());
        }

        let content =
            fs::read_to_string(&self.settings_path).context("Failed to read settings file")?;

        toml::from_str(&content).context("Failed to parse settings file")
    }

    fn save_settings(&self, settings: &ModeSettings) -> Result<()> {
        let content = toml::to_string_pretty(settings).context("Failed to serialize settings")?;

        fs::write(&self.settings_path, content).context("Failed to write settings file")?;

        Ok(())
    }

    fn settings_path(&self) -> &Path {
        &self.settings_path
    }
}
