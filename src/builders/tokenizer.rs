//! Tokenizer for the value of a `magic` line.
//!
//! The value has the shape `/<signature>/<ext>[/<ext>...]`. Inside the
//! signature a backslash escapes the following character, so `\/` does not
//! end it; `\/` and `\#` are unescaped to `/` and `#` once the signature is
//! cut out, every other escape is left for the regex engine. Each extension
//! token may carry a `+` (add, the default) or `-` (remove) prefix.

use crate::core::error::{ModeError, ModeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionOp {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionToken {
    pub op: ExtensionOp,
    /// Case-folded extension name.
    pub extension: String,
    /// Character offset of the name within the original value.
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicLine {
    /// The unescaped signature text; empty for extension-only lines.
    pub signature: String,
    pub tokens: Vec<ExtensionToken>,
}

impl MagicLine {
    pub fn parse(value: &str) -> ModeResult<Self> {
        let bytes = value.as_bytes();
        let open = value.find('/').ok_or(ModeError::MissingMagicExpression)?;
        let start = open + 1;
        if start >= bytes.len() {
            return Err(ModeError::MissingMagicExpression);
        }

        let mut end = start;
        let mut escaped = false;
        while end < bytes.len() && (escaped || bytes[end] != b'/') {
            escaped = bytes[end] == b'\\' && !escaped;
            end += 1;
        }
        let signature = unescape(&value[start..end]);

        let mut tokens = Vec::new();
        while end < bytes.len() {
            let token_start = end + 1;
            let token_end = value[token_start..]
                .find('/')
                .map_or(bytes.len(), |i| token_start + i);
            if token_end == token_start {
                return Err(ModeError::EmptyExtension {
                    offset: token_start,
                });
            }

            let (op, name_start) = match bytes[token_start] {
                b'+' => (ExtensionOp::Add, token_start + 1),
                b'-' => (ExtensionOp::Remove, token_start + 1),
                _ => (ExtensionOp::Add, token_start),
            };
            if name_start == token_end {
                return Err(ModeError::EmptyExtension { offset: name_start });
            }

            tokens.push(ExtensionToken {
                op,
                extension: value[name_start..token_end].to_lowercase(),
                offset: name_start,
            });
            end = token_end;
        }

        if tokens.is_empty() {
            return Err(ModeError::EmptyExtension {
                offset: value.len(),
            });
        }
        Ok(Self { signature, tokens })
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(&next) = chars.peek()
            && (next == '/' || next == '#')
        {
            continue;
        }
        out.push(c);
    }
    out
}
