use std::path::PathBuf;
use thiserror::Error;

pub type ModeResult<T> = Result<T, ModeError>;

/// Everything that can go wrong while building a mode registry, probing a file
/// or activating a mode.
///
/// Parse failures are wrapped in [`ModeError::AtLine`] so the caller always
/// learns which definition file and which line were at fault.
#[derive(Debug, Error)]
pub enum ModeError {
    #[error("{path}:{line}: {source}")]
    AtLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: Box<ModeError>,
    },

    #[error("{path}: {source}")]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<ModeError>,
    },

    #[error("expected \"mode {expected}\" as the first line of the mode file")]
    MalformedMode { expected: String },

    #[error("mode files must state a compatible version with the \"{key}\" key")]
    MissingVersionRequirement { key: String },

    #[error("incompatible mode version requirement \"{requirement}\": {reason}")]
    IncompatibleModeVersion { requirement: String, reason: String },

    #[error("unexpected key \"{key}\", expected one of magic/des/desc/description")]
    UnexpectedKey { key: String },

    #[error("unknown mode key \"{key}\", expected filter or option")]
    UnknownModeKey { key: String },

    #[error("magic line does not contain a /signature/ expression")]
    MissingMagicExpression,

    #[error("empty file extension at character {offset}")]
    EmptyExtension { offset: usize },

    #[error("option line is missing its key")]
    EmptyOptionKey,

    #[error("bad magic pattern \"{magic}\" in mode \"{mode}\": {reason}")]
    BadPattern {
        mode: String,
        magic: String,
        reason: String,
    },

    #[error("magic \"{magic}\" in mode \"{mode}\" has no pattern")]
    MissingPattern { mode: String, magic: String },

    #[error("invalid magic offset in \"{magic}\"")]
    InvalidOffset { magic: String },

    #[error("invalid magic range in \"{magic}\" for mode \"{mode}\"")]
    InvalidRange { mode: String, magic: String },

    #[error("unknown mode \"{0}\"")]
    UnknownMode(String),

    #[error("mode \"{mode}\" activates other modes too deeply")]
    ActivationTooDeep { mode: String },

    #[error("invalid search path: {0}")]
    InvalidSearchPath(String),

    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ModeError {
    /// Attach the definition file and line number a parse error came from.
    pub fn at_line(self, path: impl Into<PathBuf>, line: usize) -> Self {
        ModeError::AtLine {
            path: path.into(),
            line,
            source: Box::new(self),
        }
    }

    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        ModeError::InFile {
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with file and line annotations peeled off.
    pub fn kind(&self) -> &ModeError {
        match self {
            ModeError::AtLine { source, .. } | ModeError::InFile { source, .. } => source.kind(),
            other => other,
        }
    }

    /// The 1-based line number for parse errors.
    pub fn line(&self) -> Option<usize> {
        match self {
            ModeError::AtLine { line, .. } => Some(*line),
            ModeError::InFile { source, .. } => source.line(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_peels_location_wrappers() {
        let err = ModeError::EmptyExtension { offset: 4 }.at_line("/m/text.amf", 7);
        assert!(matches!(err.kind(), ModeError::EmptyExtension { offset: 4 }));
        assert_eq!(err.line(), Some(7));
        assert_eq!(
            err.to_string(),
            "/m/text.amf:7: empty file extension at character 4"
        );
    }
}
