use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::builders::magic::{self, MagicMatcher, MagicSignature, MagicSource};
use crate::builders::reader::{KeyValue, KeyValueReader, split_option};
use crate::builders::tokenizer::{ExtensionOp, MagicLine};
use crate::builders::validator::VersionCheck;
use crate::core::error::{ModeError, ModeResult};

/// Suffix of mode definition files.
pub const MODE_FILE_SUFFIX: &str = ".amf";

/// Keys that end the header block of a mode file.
const DESCRIPTION_KEYS: [&str; 3] = ["des", "desc", "description"];

/// One configuration key/value pair applied when a mode is activated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub key: String,
    pub value: String,
}

impl Expansion {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A named processing profile read from a `.amf` file.
///
/// Definitions are assembled by [`ModeFileParser`] and never change once
/// they are placed in a registry.
#[derive(Debug, Clone)]
pub struct ModeDefinition {
    name: String,
    description: String,
    file: PathBuf,
    signatures: Vec<MagicSignature>,
    expansions: Vec<Expansion>,
}

impl ModeDefinition {
    pub fn new(name: &str, file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_lowercase(),
            description: String::new(),
            file: file.into(),
            signatures: Vec::new(),
            expansions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The definition file this mode was read from.
    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn signatures(&self) -> &[MagicSignature] {
        &self.signatures
    }

    pub fn expansions(&self) -> &[Expansion] {
        &self.expansions
    }

    /// Adds `extension` to the signature written exactly as `magic`,
    /// creating that signature if this is its first extension.
    ///
    /// Returns `false` if the extension was already present.
    pub fn add_extension(&mut self, extension: &str, magic: &str) -> ModeResult<bool> {
        let key = signature_key(magic);
        if let Some(signature) = self.signatures.iter_mut().find(|s| s.magic() == key) {
            return Ok(signature.add_extension(extension));
        }
        let mut signature = MagicSignature::new(magic, &self.name)?;
        signature.add_extension(extension);
        self.signatures.push(signature);
        Ok(true)
    }

    /// Removes `extension` from the signature written exactly as `magic`.
    ///
    /// Removing from a signature that does not exist is not an error, but the
    /// signature text must still be well formed.
    pub fn remove_extension(&mut self, extension: &str, magic: &str) -> ModeResult<bool> {
        let key = signature_key(magic);
        if let Some(signature) = self.signatures.iter_mut().find(|s| s.magic() == key) {
            return Ok(signature.remove_extension(extension));
        }
        magic::test_magic(None, magic, &self.name)?;
        Ok(false)
    }

    /// Decides whether `file_name` belongs to this mode.
    ///
    /// Candidate suffixes are tried shortest first; within a suffix the
    /// signatures are tried in the order they were declared. A signature whose
    /// probe fails is skipped.
    pub fn lock_file_to_mode(
        &self,
        candidates: &[String],
        mut input: Option<&mut (dyn MagicSource + '_)>,
    ) -> bool {
        for extension in candidates {
            for signature in &self.signatures {
                match signature.matches_file(input.as_deref_mut(), extension) {
                    Ok(true) => return true,
                    Ok(false) => {}
                    Err(e) => debug!("mode {}: ignoring signature {signature}: {e}", self.name),
                }
            }
        }
        false
    }
}

fn signature_key(magic: &str) -> &str {
    if magic::is_extension_only(magic) {
        ""
    } else {
        magic
    }
}

/// Candidate extensions of `file_name`, shortest first and case-folded.
///
/// `report.tar.gz` yields `gz` and then `tar.gz`. Only the last path
/// component is considered.
pub fn candidate_extensions(file_name: &str) -> Vec<String> {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(file_name);

    base.char_indices()
        .rev()
        .filter(|(_, c)| *c == '.')
        .map(|(i, _)| base[i + 1..].to_lowercase())
        .collect()
}

/// The mode name a definition file declares through its base name:
/// `/usr/lib/modes/HTML.amf` names the mode `html`.
pub fn mode_name_from_path(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let stem = file_name.strip_suffix(MODE_FILE_SUFFIX)?;
    if stem.is_empty() {
        return None;
    }
    Some(stem.to_lowercase())
}

/// The `DefinitionParser` trait turns one mode definition file into a
/// [`ModeDefinition`].
pub trait DefinitionParser {
    /// Parses the file at `path`. The mode name is derived from the file's
    /// base name and must match the file's `mode` line.
    fn parse_file(&self, path: &Path) -> ModeResult<ModeDefinition>;
}

/// Parser for the `.amf` mode file format.
///
/// A mode file starts with a `mode <name>` line followed by the version line,
/// then any number of `magic` lines closed by a description line, and finally
/// `filter` and `option` lines:
///
/// ```text
/// mode        html
/// aspell      >=0.60.1
/// magic       /0:256:^[ \t]*<[Hh][Tt][Mm][Ll]/htm/html
/// description mode for checking HTML documents
/// filter      html
/// option      add-html-skip script
/// ```
pub struct ModeFileParser<'a> {
    version: &'a dyn VersionCheck,
}

impl<'a> ModeFileParser<'a> {
    pub fn new(version: &'a dyn VersionCheck) -> Self {
        Self { version }
    }

    /// Parses an already opened definition for the mode `name`.
    pub fn parse_reader<R: BufRead>(
        &self,
        mut reader: KeyValueReader<R>,
        name: &str,
    ) -> ModeResult<ModeDefinition> {
        let path = reader.path().to_path_buf();
        let at = |e: ModeError, line: usize| e.at_line(&path, line.max(1));
        let name = name.to_lowercase();

        // mode <name>
        match reader.next_pair()? {
            Some(pair)
                if pair.key.eq_ignore_ascii_case("mode") && pair.value.to_lowercase() == name => {}
            other => {
                let line = other.map_or(reader.line(), |pair| pair.line);
                return Err(at(ModeError::MalformedMode { expected: name }, line));
            }
        }

        // <version key> <requirement>
        let version_key = self.version.key();
        match reader.next_pair()? {
            Some(pair)
                if pair.key.eq_ignore_ascii_case(version_key) && !pair.value.is_empty() =>
            {
                self.version.check(&pair.value).map_err(|e| at(e, pair.line))?;
            }
            other => {
                let line = other.map_or(reader.line(), |pair| pair.line);
                return Err(at(
                    ModeError::MissingVersionRequirement {
                        key: version_key.to_string(),
                    },
                    line,
                ));
            }
        }

        let mut mode = ModeDefinition::new(&name, &path);

        while let Some(pair) = reader.next_pair()? {
            let key = pair.key.to_lowercase();
            if DESCRIPTION_KEYS.contains(&key.as_str()) {
                mode.description = pair.value;
                break;
            }
            if key != "magic" {
                return Err(at(ModeError::UnexpectedKey { key }, pair.line));
            }
            apply_magic_line(&mut mode, &pair).map_err(|e| at(e, pair.line))?;
        }

        while let Some(pair) = reader.next_pair()? {
            let expansion = expansion_for(&pair).map_err(|e| at(e, pair.line))?;
            mode.expansions.push(expansion);
        }

        Ok(mode)
    }
}

impl DefinitionParser for ModeFileParser<'_> {
    fn parse_file(&self, path: &Path) -> ModeResult<ModeDefinition> {
        let name = mode_name_from_path(path).ok_or_else(|| {
            ModeError::MalformedMode {
                expected: path.display().to_string(),
            }
            .in_file(path)
        })?;
        let file = File::open(path).map_err(|source| ModeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_reader(KeyValueReader::new(BufReader::new(file), path), &name)
    }
}

fn apply_magic_line(mode: &mut ModeDefinition, pair: &KeyValue) -> ModeResult<()> {
    let line = MagicLine::parse(&pair.value)?;
    for token in &line.tokens {
        match token.op {
            ExtensionOp::Add => mode.add_extension(&token.extension, &line.signature)?,
            ExtensionOp::Remove => mode.remove_extension(&token.extension, &line.signature)?,
        };
    }
    Ok(())
}

fn expansion_for(pair: &KeyValue) -> ModeResult<Expansion> {
    let key = pair.key.to_lowercase();
    match key.as_str() {
        "filter" => Ok(Expansion::new("add-filter", pair.value.to_lowercase())),
        "option" => {
            let (key, value) = split_option(&pair.value);
            if key.is_empty() {
                return Err(ModeError::EmptyOptionKey);
            }
            Ok(Expansion::new(key, value))
        }
        _ => Err(ModeError::UnknownModeKey { key }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::validator::HostVersion;
    use std::io::Cursor;

    fn parse(name: &str, text: &str) -> ModeResult<ModeDefinition> {
        let host = HostVersion::default();
        let reader =
            KeyValueReader::new(Cursor::new(text.to_string()), format!("/modes/{name}.amf"));
        ModeFileParser::new(&host).parse_reader(reader, name)
    }

    #[test]
    fn test_full_definition() {
        let mode = parse(
            "html",
            "MODE HTML\naspell >=0.60\nmagic /0:256:^<html/htm/html\nmagic //xhtml\n\
             description HTML documents\nfilter HTML\noption add-html-skip script\n",
        )
        .unwrap();
        assert_eq!(mode.name(), "html");
        assert_eq!(mode.description(), "HTML documents");
        assert_eq!(mode.signatures().len(), 2);
        assert_eq!(mode.signatures()[0].extensions(), ["htm", "html"]);
        assert!(mode.signatures()[1].is_extension_only());
        assert_eq!(
            mode.expansions(),
            [
                Expansion::new("add-filter", "html"),
                Expansion::new("add-html-skip", "script"),
            ]
        );
    }

    #[test]
    fn test_mode_line_must_match_file_name() {
        let err = parse("html", "mode sgml\naspell 0.60\n").unwrap_err();
        assert!(matches!(err.kind(), ModeError::MalformedMode { .. }));
        assert_eq!(err.line(), Some(1));

        let err = parse("html", "").unwrap_err();
        assert!(matches!(err.kind(), ModeError::MalformedMode { .. }));
    }

    #[test]
    fn test_version_line() {
        let err = parse("text", "mode text\nfilter url\n").unwrap_err();
        assert!(matches!(err.kind(), ModeError::MissingVersionRequirement { .. }));
        assert_eq!(err.line(), Some(2));

        let err = parse("text", "mode text\naspell >=9.0\n").unwrap_err();
        assert!(matches!(err.kind(), ModeError::IncompatibleModeVersion { .. }));
    }

    #[test]
    fn test_expansion_keys_before_description_are_rejected() {
        let err = parse("text", "mode text\naspell 0.60\nfilter url\n").unwrap_err();
        assert!(matches!(err.kind(), ModeError::UnexpectedKey { key } if key == "filter"));
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_unknown_key_after_description() {
        let err = parse("text", "mode text\naspell 0.60\ndesc plain\nmagic //txt\n").unwrap_err();
        assert!(matches!(err.kind(), ModeError::UnknownModeKey { key } if key == "magic"));
        assert_eq!(err.line(), Some(4));
    }

    #[test]
    fn test_remove_and_duplicate_add() {
        let mode = parse(
            "text",
            "mode text\naspell 0.60\nmagic //txt/txt/md\nmagic //-md/-rst\ndesc plain\n",
        )
        .unwrap();
        assert_eq!(mode.signatures().len(), 1);
        assert_eq!(mode.signatures()[0].extensions(), ["txt"]);
    }

    #[test]
    fn test_remove_validates_signature() {
        let err = parse("text", "mode text\naspell 0.60\nmagic /0:4:(/-txt\n").unwrap_err();
        assert!(matches!(err.kind(), ModeError::BadPattern { .. }));
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_empty_option_key() {
        let err = parse("text", "mode text\naspell 0.60\ndesc d\noption\n").unwrap_err();
        assert!(matches!(err.kind(), ModeError::EmptyOptionKey));
    }

    #[test]
    fn test_candidate_extensions_shortest_first() {
        assert_eq!(candidate_extensions("a.b.c.txt"), ["txt", "c.txt", "b.c.txt"]);
        assert_eq!(candidate_extensions("/srv/x.d/Report.TAR.GZ"), ["gz", "tar.gz"]);
        assert!(candidate_extensions("Makefile").is_empty());
    }

    #[test]
    fn test_mode_name_from_path() {
        assert_eq!(mode_name_from_path(Path::new("/m/CSharp.amf")).as_deref(), Some("csharp"));
        assert_eq!(mode_name_from_path(Path::new("/m/notes.txt")), None);
        assert_eq!(mode_name_from_path(Path::new("/m/.amf")), None);
    }

    #[test]
    fn test_lock_file_skips_failing_probe() {
        let mut mode = ModeDefinition::new("sh", "/m/sh.amf");
        mode.add_extension("sh", "0:16:^#!.*sh").unwrap();
        mode.add_extension("sh", "").unwrap();

        let mut script = Cursor::new(b"#!/bin/bash\n".to_vec());
        assert!(mode.lock_file_to_mode(&["sh".to_string()], Some(&mut script)));

        // Content does not match the first signature; the extension-only one does.
        let mut other = Cursor::new(b"echo hi\n".to_vec());
        assert!(mode.lock_file_to_mode(&["sh".to_string()], Some(&mut other)));
        assert!(!mode.lock_file_to_mode(&["bash".to_string()], Some(&mut other)));
    }
}
