use serde::Serialize;
use std::io::{self, Write};

use crate::builders::registry::ModeRegistry;

/// Total width of the help listing.
const HELP_WIDTH: usize = 74;
/// Column descriptions start in and continuation lines are indented to.
const HELP_MARGIN: usize = 13;

const HELP_HEADER: &str = "\n\n[Filter Modes] preconfigured combinations of filters optimized for files of
               a specific type. A mode is selected with the `--mode`
               parameter. This happens implicitly if the file type can be
               identified from the extension of the file name.
         Note: If the file type can not be identified uniquely by the
               file extension, the file content is tested in addition to
               ensure proper mode selection.\n\n";

/// A mode as shown in machine-readable listings.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ModeSummary {
    pub name: String,
    pub description: String,
}

/// Collects the `(name, description)` pairs of a registry.
pub fn summarize(registry: &ModeRegistry) -> Vec<ModeSummary> {
    registry
        .descriptions()
        .map(|(name, description)| ModeSummary {
            name: name.to_string(),
            description: description.to_string(),
        })
        .collect()
}

/// The `ModeReporter` trait renders the available modes for people.
pub trait ModeReporter {
    fn write_mode_help(&self, registry: &ModeRegistry, out: &mut dyn Write) -> io::Result<()>;
}

/// Prints the mode table used by `--help` style output: each mode name in a
/// ten character column followed by its word-wrapped description.
pub struct HelpReporter;

impl HelpReporter {
    pub fn new() -> Self {
        Self
    }

    /// Formats one table row, wrapping the description at [`HELP_WIDTH`].
    fn format_mode(&self, name: &str, description: &str) -> String {
        let mut row = format!("  {name:<10} ");
        let mut used = row.chars().count().max(HELP_MARGIN);
        let mut rest: Vec<char> = description.chars().collect();

        while rest.len() > HELP_WIDTH.saturating_sub(used) {
            let limit = HELP_WIDTH.saturating_sub(used).max(1);
            let mut cut = limit;
            while cut > 0 && !rest[cut - 1].is_whitespace() {
                cut -= 1;
            }
            if cut == 0 {
                cut = limit;
            }

            let chunk: String = rest[..cut].iter().collect();
            row.push_str(chunk.trim_end());
            row.push('\n');
            row.push_str(&" ".repeat(HELP_MARGIN));

            rest.drain(..cut);
            if rest.first().is_some_and(|c| c.is_whitespace()) {
                rest.remove(0);
            }
            used = HELP_MARGIN;
        }
        row.extend(rest);
        row.push('\n');
        row
    }
}

impl Default for HelpReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeReporter for HelpReporter {
    fn write_mode_help(&self, registry: &ModeRegistry, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(HELP_HEADER.as_bytes())?;
        for (name, description) in registry.descriptions() {
            out.write_all(self.format_mode(name, description).as_bytes())?;
        }
        Ok(())
    }
}
