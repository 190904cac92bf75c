//! File-type detection through declarative filter modes.
//!
//! Modes are described by small `.amf` files found along a search path. Each
//! one names a mode, lists the file extensions it applies to (optionally
//! guarded by a content signature, the "magic") and the configuration it
//! applies when activated:
//!
//! ```text
//! mode        png
//! aspell      >=0.60
//! magic       /0:8:^\x89PNG/png
//! description PNG images
//! filter      png
//! ```
//!
//! [`ModeRegistry`] reads all definitions along one search path,
//! [`ModeCache`] shares registries between configurations, and [`Config`]
//! applies a mode's settings when it is selected, either by name or from a
//! file name with [`Config::set_mode_from_file`].

pub mod builders;
pub mod core;
pub mod utils;

pub use builders::definition::{Expansion, ModeDefinition, ModeFileParser};
pub use builders::magic::{MagicMatcher, MagicSignature, MagicSource, test_magic};
pub use builders::registry::ModeRegistry;
pub use builders::storage::ModeCache;
pub use builders::validator::{HostVersion, VersionCheck};
pub use crate::core::config::{Config, ModeSettings, SettingsManager};
pub use crate::core::engine::ModeNotifier;
pub use crate::core::error::{ModeError, ModeResult};

#[cfg(test)]
mod tests;
