use std::fs::File;
use std::path::Path;
use tracing::debug;

use crate::builders::definition::{
    DefinitionParser, MODE_FILE_SUFFIX, ModeDefinition, ModeFileParser, candidate_extensions,
    mode_name_from_path,
};
use crate::builders::magic::MagicSource;
use crate::builders::validator::VersionCheck;
use crate::core::error::ModeResult;
use crate::utils::paths::{PathBrowser, split_search_path};

/// The modes discovered along one search path, in discovery order.
#[derive(Debug)]
pub struct ModeRegistry {
    key: String,
    modes: Vec<ModeDefinition>,
}

impl ModeRegistry {
    /// Reads every `.amf` file along `search_path` with the standard parser.
    pub fn build(search_path: &str, version: &dyn VersionCheck) -> ModeResult<Self> {
        Self::build_with(search_path, &ModeFileParser::new(version))
    }

    /// Reads every `.amf` file along `search_path` with `parser`.
    ///
    /// When the same mode name appears in several directories the first
    /// directory on the path wins and later files are ignored. Any parse
    /// error aborts the whole build.
    pub fn build_with(search_path: &str, parser: &dyn DefinitionParser) -> ModeResult<Self> {
        let mut modes: Vec<ModeDefinition> = Vec::new();

        for path in PathBrowser::new(split_search_path(search_path), MODE_FILE_SUFFIX) {
            let Some(name) = mode_name_from_path(&path) else {
                continue;
            };
            if modes.iter().any(|mode| mode.name() == name) {
                debug!("mode {name} already registered, ignoring {}", path.display());
                continue;
            }
            modes.push(parser.parse_file(&path)?);
        }

        debug!("registered {} modes from {search_path:?}", modes.len());
        Ok(Self {
            key: search_path.to_string(),
            modes,
        })
    }

    /// The search path this registry was built from.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn modes(&self) -> &[ModeDefinition] {
        &self.modes
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// Looks a mode up by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&ModeDefinition> {
        let name = name.to_lowercase();
        self.modes.iter().find(|mode| mode.name() == name)
    }

    /// `(name, description)` pairs for help output.
    pub fn descriptions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.modes.iter().map(|mode| (mode.name(), mode.description()))
    }

    /// Picks the first mode that claims `file_name`.
    ///
    /// Without an `input` the file is opened here for content probes and
    /// closed again before returning. If it cannot be opened, signatures are
    /// judged on their extension alone. Names without a `.` never match and
    /// the file is not touched.
    pub fn select(
        &self,
        file_name: &str,
        input: Option<&mut (dyn MagicSource + '_)>,
    ) -> Option<&ModeDefinition> {
        let candidates = candidate_extensions(file_name);
        if candidates.is_empty() {
            return None;
        }

        match input {
            Some(input) => self.select_with(&candidates, Some(input)),
            None => {
                let mut file = File::open(Path::new(file_name))
                    .map_err(|e| debug!("cannot open {file_name} for magic probes: {e}"))
                    .ok();
                self.select_with(
                    &candidates,
                    file.as_mut().map(|file| file as &mut dyn MagicSource),
                )
            }
        }
    }

    fn select_with(
        &self,
        candidates: &[String],
        mut input: Option<&mut (dyn MagicSource + '_)>,
    ) -> Option<&ModeDefinition> {
        self.modes
            .iter()
            .find(|mode| mode.lock_file_to_mode(candidates, input.as_deref_mut()))
    }
}
