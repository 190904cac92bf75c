use regex::bytes::{Regex, RegexBuilder};
use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use tracing::debug;

use crate::core::error::{ModeError, ModeResult};

/// Anything a magic signature can be probed against: an open file, or an
/// in-memory cursor in tests.
pub trait MagicSource: Read + Seek {}

impl<T: Read + Seek> MagicSource for T {}

/// The spellings of an extension-only signature inside a `magic` line.
const EXTENSION_ONLY: [&str; 3] = ["", "<nomagic>", "<empty>"];

/// Returns `true` if the signature text declares no content check at all.
pub fn is_extension_only(magic: &str) -> bool {
    EXTENSION_ONLY.contains(&magic)
}

/// Window probed by a signature written as a bare pattern, without
/// `offset:length:`.
pub const DEFAULT_MAGIC_WINDOW: usize = 256;

/// A compiled `offset:length:pattern` content check.
///
/// The pattern is matched against at most `length` bytes read from `offset`.
/// Matching is unanchored, multi-line, case-sensitive and byte oriented, so
/// `\x89` matches the raw byte `0x89` rather than its UTF-8 encoding. A
/// signature without any `:` is a bare pattern probed over the first
/// [`DEFAULT_MAGIC_WINDOW`] bytes.
#[derive(Debug, Clone)]
pub struct MagicProbe {
    offset: u64,
    length: usize,
    pattern: Regex,
}

impl MagicProbe {
    /// Parses and compiles a magic signature.
    ///
    /// Fields are checked in the order they are written: the offset first,
    /// then the presence of a pattern, then the window length and finally
    /// that the pattern compiles.
    pub fn parse(magic: &str, mode: &str) -> ModeResult<Self> {
        let Some((offset_text, rest)) = magic.split_once(':') else {
            return Ok(Self {
                offset: 0,
                length: DEFAULT_MAGIC_WINDOW,
                pattern: compile(magic, magic, mode)?,
            });
        };
        let offset = parse_field(offset_text).ok_or_else(|| ModeError::InvalidOffset {
            magic: magic.to_string(),
        })?;

        let (length_text, pattern) = rest.split_once(':').unwrap_or((rest, ""));
        if pattern.is_empty() {
            return Err(ModeError::MissingPattern {
                mode: mode.to_string(),
                magic: magic.to_string(),
            });
        }
        let length = parse_field(length_text)
            .filter(|length| *length > 0)
            .and_then(|length| usize::try_from(length).ok())
            .ok_or_else(|| ModeError::InvalidRange {
                mode: mode.to_string(),
                magic: magic.to_string(),
            })?;

        Ok(Self {
            offset,
            length,
            pattern: compile(pattern, magic, mode)?,
        })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Probes `input` and restores its read position afterwards, whatever the
    /// outcome. I/O failures are reported as a non-match.
    pub fn probe(&self, input: &mut dyn MagicSource) -> bool {
        let start = match input.stream_position() {
            Ok(position) => position,
            Err(e) => {
                debug!("cannot determine read position before magic probe: {e}");
                return false;
            }
        };

        let matched = self.probe_window(input);

        if let Err(e) = input.seek(SeekFrom::Start(start)) {
            debug!("cannot restore read position after magic probe: {e}");
        }
        matched
    }

    fn probe_window(&self, input: &mut dyn MagicSource) -> bool {
        if input.seek(SeekFrom::Start(self.offset)).is_err() {
            return false;
        }

        // Grows with what is actually read; `length` may be far larger than
        // the file.
        let mut window = Vec::new();
        let mut limited = Read::take(&mut *input, self.length as u64);
        if let Err(e) = limited.read_to_end(&mut window) {
            debug!("magic probe read failed: {e}");
            return false;
        }
        if window.is_empty() {
            return false;
        }
        self.pattern.is_match(&window)
    }
}

fn compile(pattern: &str, magic: &str, mode: &str) -> ModeResult<Regex> {
    RegexBuilder::new(pattern)
        .multi_line(true)
        .unicode(false)
        .build()
        .map_err(|e| ModeError::BadPattern {
            mode: mode.to_string(),
            magic: magic.to_string(),
            reason: e.to_string(),
        })
}

/// A non-negative decimal field with nothing trailing it.
fn parse_field(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Validates `magic` and, when `input` is given, probes it.
///
/// Without an input this only checks that the signature is well formed and
/// returns `true`; nothing is read. Extension-only signatures always match.
pub fn test_magic(
    input: Option<&mut (dyn MagicSource + '_)>,
    magic: &str,
    mode: &str,
) -> ModeResult<bool> {
    if is_extension_only(magic) {
        return Ok(true);
    }
    let probe = MagicProbe::parse(magic, mode)?;
    Ok(match input {
        Some(input) => probe.probe(input),
        None => true,
    })
}

/// The `MagicMatcher` trait decides whether a file with a given candidate
/// extension belongs to a signature.
pub trait MagicMatcher {
    /// Checks the extension set and then, unless the signature is
    /// extension-only, the file content.
    ///
    /// # Arguments
    /// * `input`: The open file, or `None` when only the extension can be
    ///   judged (the probe then runs in validation-only mode).
    /// * `extension`: A case-folded candidate suffix of the file name.
    ///
    /// # Returns
    /// `Ok(true)` on a match. Errors are reserved for malformed signatures.
    fn matches_file(
        &self,
        input: Option<&mut (dyn MagicSource + '_)>,
        extension: &str,
    ) -> ModeResult<bool>;
}

/// One magic signature of a mode together with the extensions it applies to.
#[derive(Debug, Clone)]
pub struct MagicSignature {
    magic: String,
    mode: String,
    probe: Option<MagicProbe>,
    extensions: Vec<String>,
}

impl MagicSignature {
    /// Creates an empty signature, compiling `magic` unless it is one of the
    /// extension-only spellings.
    pub fn new(magic: &str, mode: &str) -> ModeResult<Self> {
        let (magic, probe) = if is_extension_only(magic) {
            (String::new(), None)
        } else {
            (magic.to_string(), Some(MagicProbe::parse(magic, mode)?))
        };
        Ok(Self {
            magic,
            mode: mode.to_string(),
            probe,
            extensions: Vec::new(),
        })
    }

    /// The signature text as written in the mode file, unescaped. Empty for
    /// extension-only signatures.
    pub fn magic(&self) -> &str {
        &self.magic
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn is_extension_only(&self) -> bool {
        self.probe.is_none()
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn has_extension(&self, extension: &str) -> bool {
        self.extensions.iter().any(|e| e == extension)
    }

    /// Adds `extension`; returns `false` if it was already present.
    pub fn add_extension(&mut self, extension: &str) -> bool {
        if self.has_extension(extension) {
            return false;
        }
        self.extensions.push(extension.to_string());
        true
    }

    /// Removes `extension`; returns `false` if it was not present.
    pub fn remove_extension(&mut self, extension: &str) -> bool {
        let before = self.extensions.len();
        self.extensions.retain(|e| e != extension);
        before != self.extensions.len()
    }
}

impl MagicMatcher for MagicSignature {
    fn matches_file(
        &self,
        input: Option<&mut (dyn MagicSource + '_)>,
        extension: &str,
    ) -> ModeResult<bool> {
        if !self.has_extension(extension) {
            return Ok(false);
        }
        Ok(match (&self.probe, input) {
            (None, _) => true,
            (Some(probe), Some(input)) => probe.probe(input),
            (Some(_), None) => true,
        })
    }
}

impl fmt::Display for MagicSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.magic, self.extensions.join("/"))
    }
}
