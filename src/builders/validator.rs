use semver::{Version, VersionReq};
use std::fmt;

use crate::core::error::{ModeError, ModeResult};

/// The engine version mode files are checked against unless the host says
/// otherwise.
pub const DEFAULT_HOST_VERSION: &str = "0.60.8";

/// Key of the second line of every mode file.
pub const VERSION_KEY: &str = "aspell";

/// The `VersionCheck` trait decides whether a mode file written for some
/// engine version can be loaded by the host.
///
/// Hosts embedding the engine can supply their own implementation to pin a
/// different version or relax the check entirely.
pub trait VersionCheck: fmt::Debug + Send + Sync {
    /// The key the version requirement is stated under.
    fn key(&self) -> &str {
        VERSION_KEY
    }

    /// Validates a requirement such as `>=0.60` against the host.
    ///
    /// # Returns
    /// `Ok(())` if compatible, otherwise `IncompatibleModeVersion` describing
    /// why not.
    fn check(&self, requirement: &str) -> ModeResult<()>;
}

/// A `VersionCheck` backed by a concrete semantic version.
#[derive(Debug, Clone)]
pub struct HostVersion {
    version: Version,
}

impl HostVersion {
    pub fn new(version: &str) -> ModeResult<Self> {
        let version = Version::parse(&complete_version(version)).map_err(|e| {
            ModeError::IncompatibleModeVersion {
                requirement: version.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self { version })
    }

    pub fn version(&self) -> &Version {
        &self.version
    }
}

impl Default for HostVersion {
    fn default() -> Self {
        Self {
            version: Version::new(0, 60, 8),
        }
    }
}

impl VersionCheck for HostVersion {
    fn check(&self, requirement: &str) -> ModeResult<()> {
        let incompatible = |reason: String| ModeError::IncompatibleModeVersion {
            requirement: requirement.to_string(),
            reason,
        };

        // A bare version is a minimum, not a caret requirement.
        let trimmed = requirement.trim();
        let normalized = if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
            format!(">={trimmed}")
        } else {
            trimmed.to_string()
        };

        let req = VersionReq::parse(&normalized).map_err(|e| incompatible(e.to_string()))?;
        if req.matches(&self.version) {
            Ok(())
        } else {
            Err(incompatible(format!("host version is {}", self.version)))
        }
    }
}

/// Pads `0.60` to `0.60.0` so partial versions parse.
fn complete_version(version: &str) -> String {
    let version = version.trim();
    match version.matches('.').count() {
        0 => format!("{version}.0.0"),
        1 => format!("{version}.0"),
        _ => version.to_string(),
    }
}
