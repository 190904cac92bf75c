use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::debug;

use crate::builders::registry::ModeRegistry;
use crate::builders::validator::VersionCheck;
use crate::core::error::ModeResult;

static GLOBAL_CACHE: OnceLock<Arc<ModeCache>> = OnceLock::new();

/// Shared mode registries keyed by search-path string.
///
/// A registry is built on the first request for its key and then handed out
/// as a shared reference. It stays cached until [`ModeCache::invalidate`] is
/// called for its key, even when nobody else holds it anymore. Invalidation
/// only affects later lookups; registries already handed out stay valid for
/// their holders.
#[derive(Debug, Default)]
pub struct ModeCache {
    entries: Mutex<HashMap<String, Arc<ModeRegistry>>>,
}

impl ModeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    pub fn global() -> Arc<ModeCache> {
        GLOBAL_CACHE.get_or_init(|| Arc::new(ModeCache::new())).clone()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Arc<ModeRegistry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the registry for `search_path`, building it if needed.
    ///
    /// A failed build leaves nothing behind in the cache.
    pub fn get_or_build(
        &self,
        search_path: &str,
        version: &dyn VersionCheck,
    ) -> ModeResult<Arc<ModeRegistry>> {
        let mut entries = self.entries();
        if let Some(registry) = entries.get(search_path) {
            debug!("mode registry cache hit for {search_path:?}");
            return Ok(Arc::clone(registry));
        }

        let registry = Arc::new(ModeRegistry::build(search_path, version)?);
        entries.insert(search_path.to_string(), Arc::clone(&registry));
        Ok(registry)
    }

    /// Drops the cached registry for `search_path`. Returns `true` if there
    /// was one.
    pub fn invalidate(&self, search_path: &str) -> bool {
        let removed = self.entries().remove(search_path).is_some();
        if removed {
            debug!("invalidated mode registry for {search_path:?}");
        }
        removed
    }

    pub fn contains(&self, search_path: &str) -> bool {
        self.entries().contains_key(search_path)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
