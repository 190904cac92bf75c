use std::sync::Arc;
use tracing::debug;

use crate::builders::registry::ModeRegistry;
use crate::builders::storage::ModeCache;
use crate::builders::validator::{HostVersion, VersionCheck};
use crate::core::error::ModeResult;

/// The mode hook a [`Config`](crate::core::config::Config) carries once mode
/// support is attached.
///
/// It keeps the configuration's own reference to the registry for the current
/// search path. Cloning a configuration clones this hook, so both copies share
/// the registry they already hold; invalidation through one copy only changes
/// what later lookups see.
#[derive(Debug, Clone)]
pub struct ModeNotifier {
    cache: Arc<ModeCache>,
    version: Arc<dyn VersionCheck>,
    registry: Option<Arc<ModeRegistry>>,
}

impl ModeNotifier {
    pub fn new(cache: Arc<ModeCache>, version: Arc<dyn VersionCheck>) -> Self {
        Self {
            cache,
            version,
            registry: None,
        }
    }

    /// Mode support backed by the process-wide cache and the default host
    /// version.
    pub fn with_defaults() -> Self {
        Self::new(ModeCache::global(), Arc::new(HostVersion::default()))
    }

    pub fn cache(&self) -> &Arc<ModeCache> {
        &self.cache
    }

    pub fn version(&self) -> &dyn VersionCheck {
        self.version.as_ref()
    }

    /// Whether a registry is currently held.
    pub fn is_loaded(&self) -> bool {
        self.registry.is_some()
    }

    /// The registry for `search_path`, fetched from the cache or built on
    /// first use.
    pub fn filter_modes(&mut self, search_path: &str) -> ModeResult<Arc<ModeRegistry>> {
        if let Some(registry) = &self.registry {
            return Ok(Arc::clone(registry));
        }
        let registry = self.cache.get_or_build(search_path, self.version.as_ref())?;
        self.registry = Some(Arc::clone(&registry));
        Ok(registry)
    }

    /// Called when the search path changes from `old` to `new`. The held
    /// registry is dropped and neither path's registry is reused, so the next
    /// lookup reads the directories again.
    pub fn search_path_updated(&mut self, old: &str, new: &str) {
        let held = self.registry.take();
        let mut stale = vec![old, new];
        if let Some(registry) = &held {
            stale.push(registry.key());
        }
        for key in stale {
            self.cache.invalidate(key);
        }
        debug!("search path changed from {old:?} to {new:?}, mode registry dropped");
    }
}
