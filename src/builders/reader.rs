use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::core::error::{ModeError, ModeResult};

/// One `key value` line of a mode definition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
    /// 1-based physical line number.
    pub line: usize,
}

/// Reads `key value` pairs from a line-oriented text source.
///
/// Blank lines and `#` comments are skipped. A `#` preceded by a backslash
/// does not start a comment, and the backslash is left in place so later
/// stages can decide how to unescape the value.
pub struct KeyValueReader<R> {
    input: R,
    path: PathBuf,
    line: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> KeyValueReader<R> {
    pub fn new(input: R, path: impl Into<PathBuf>) -> Self {
        Self {
            input,
            path: path.into(),
            line: 0,
            buf: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Line number of the last physical line read.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Returns the next pair, or `None` at end of input.
    ///
    /// Lines are not required to be UTF-8; invalid sequences are replaced so
    /// that a Latin-1 comment does not make the whole file unreadable.
    pub fn next_pair(&mut self) -> ModeResult<Option<KeyValue>> {
        loop {
            self.buf.clear();
            let read = self.input.read_until(b'\n', &mut self.buf).map_err(|source| {
                ModeError::Io {
                    path: self.path.clone(),
                    source,
                }
                .at_line(&self.path, self.line + 1)
            })?;
            if read == 0 {
                return Ok(None);
            }
            self.line += 1;

            let text = String::from_utf8_lossy(&self.buf);
            let content = strip_comment(&text).trim();
            if content.is_empty() {
                continue;
            }

            let (key, value) = match content.find(char::is_whitespace) {
                Some(split) => (&content[..split], content[split..].trim_start()),
                None => (content, ""),
            };
            return Ok(Some(KeyValue {
                key: key.to_string(),
                value: value.to_string(),
                line: self.line,
            }));
        }
    }
}

fn strip_comment(line: &str) -> &str {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            '\\' => escaped = !escaped,
            '#' if !escaped => return &line[..i],
            _ => escaped = false,
        }
    }
    line
}

/// Split an `option` value into its own key and value.
pub fn split_option(value: &str) -> (String, String) {
    let value = value.trim();
    match value.find(char::is_whitespace) {
        Some(split) => (
            value[..split].to_string(),
            value[split..].trim_start().to_string(),
        ),
        None => (value.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn pairs(text: &str) -> Vec<KeyValue> {
        let mut reader = KeyValueReader::new(Cursor::new(text.to_string()), "test.amf");
        let mut out = Vec::new();
        while let Some(pair) = reader.next_pair().unwrap() {
            out.push(pair);
        }
        out
    }

    #[test]
    fn test_skips_blank_lines_and_comments() {
        let found = pairs("# header\n\nmode text\n   \nfilter url # trailing\n");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].key, "mode");
        assert_eq!(found[0].value, "text");
        assert_eq!(found[0].line, 3);
        assert_eq!(found[1].value, "url");
        assert_eq!(found[1].line, 5);
    }

    #[test]
    fn test_escaped_hash_is_kept() {
        let found = pairs("magic /0:2:^\\#!/sh\n");
        assert_eq!(found[0].value, "/0:2:^\\#!/sh");
    }

    #[test]
    fn test_key_without_value() {
        let found = pairs("description\n");
        assert_eq!(found[0].key, "description");
        assert_eq!(found[0].value, "");
    }

    #[test]
    fn test_latin1_bytes_do_not_stop_reading() {
        let text = b"# Copyright Hinterm\xfcller\nmode text\ndesc Stra\xdfe\n".to_vec();
        let mut reader = KeyValueReader::new(Cursor::new(text), "text.amf");
        let mode = reader.next_pair().unwrap().unwrap();
        assert_eq!((mode.key.as_str(), mode.value.as_str(), mode.line), ("mode", "text", 2));
        let desc = reader.next_pair().unwrap().unwrap();
        assert_eq!(desc.value, "Stra\u{fffd}e");
        assert!(reader.next_pair().unwrap().is_none());
    }

    struct FailingRead;

    impl Read for FailingRead {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk gone"))
        }
    }

    #[test]
    fn test_read_error_carries_line() {
        let input = Cursor::new(b"mode text\n".to_vec()).chain(FailingRead);
        let mut reader = KeyValueReader::new(std::io::BufReader::new(input), "text.amf");
        assert_eq!(reader.next_pair().unwrap().unwrap().line, 1);

        let err = reader.next_pair().unwrap_err();
        assert!(matches!(err.kind(), ModeError::Io { .. }));
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_split_option() {
        assert_eq!(
            split_option("html-check-comments  false"),
            ("html-check-comments".to_string(), "false".to_string())
        );
        assert_eq!(split_option("lone"), ("lone".to_string(), String::new()));
    }
}
