// This file is the module declaration file for the `builders` module.
// It declares and makes public all the sub-modules within the `src/builders`
// directory. Together they turn `.amf` files on disk into mode registries
// and decide which mode a file belongs to.

// `reader` module:
// Reads `key value` pairs from mode files, skipping blank lines and `#`
// comments and keeping track of line numbers for error messages.
pub mod reader;

// `tokenizer` module:
// Splits the value of a `magic` line into its signature and the list of
// `+ext` / `-ext` tokens, applying the `\/` and `\#` escape rules.
pub mod tokenizer;

// `magic` module:
// Defines `MagicSignature` and the `MagicMatcher` trait, and probes open
// files at a byte offset against a compiled pattern without moving their
// read position.
pub mod magic;

// `validator` module:
// Holds the `VersionCheck` trait used to reject mode files written for an
// incompatible engine version.
pub mod validator;

// `definition` module:
// The `ModeDefinition` type and the `.amf` parser that builds it, plus the
// file-name helpers used for extension matching.
pub mod definition;

// `registry` module:
// Collects the modes found along a search path and selects the mode that
// applies to a given file.
pub mod registry;

// `storage` module:
// The process-wide cache of registries keyed by search path.
pub mod storage;

// `reporter` module:
// Renders the list of available modes for help output.
pub mod reporter;
