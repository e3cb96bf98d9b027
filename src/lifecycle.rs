//! Which extracted files are still in use.
//!
//! Tracks outstanding requests per logical name and holds exactly one cache
//! reference on the backing file while a name has any. Only back-references
//! are kept here; the cache owns its entries.

use embedlib_cache::{ContentCache, Sweep};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Tracked {
    /// `None` for forced libraries, which live outside the cache.
    cache_path: Option<PathBuf>,
    outstanding: usize,
}

pub(crate) struct Lifecycle {
    cache: Arc<ContentCache>,
    tracked: Mutex<HashMap<String, Tracked>>,
}

impl Lifecycle {
    pub(crate) fn new(cache: Arc<ContentCache>) -> Self {
        Self { cache, tracked: Mutex::new(HashMap::new()) }
    }

    pub(crate) fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Record a successful request for `name`.
    ///
    /// `fresh` is whether the caller just materialized `cache_path` and so
    /// already holds a cache reference for it.
    pub(crate) fn acquire(&self, name: &str, cache_path: Option<&Path>, fresh: bool) {
        let mut tracked = self.lock();
        let entry = tracked
            .entry(name.to_string())
            .or_insert_with(|| Tracked { cache_path: cache_path.map(Path::to_path_buf), outstanding: 0 });
        entry.outstanding += 1;
        let reactivated = entry.outstanding == 1;
        if let Some(path) = &entry.cache_path {
            match (reactivated, fresh) {
                (true, false) => {
                    self.cache.retain(path);
                },
                (false, true) => {
                    self.cache.release(path);
                },
                _ => {},
            }
        }
        tracing::debug!(name, outstanding = entry.outstanding, "Acquired library");
    }

    /// Record a release of `name`. Returns `false` if nothing was outstanding.
    pub(crate) fn release(&self, name: &str) -> bool {
        let mut tracked = self.lock();
        let Some(entry) = tracked.get_mut(name).filter(|entry| entry.outstanding > 0) else {
            tracing::debug!(name, "Release of a library that isn't held");
            return false;
        };
        entry.outstanding -= 1;
        if entry.outstanding == 0
            && let Some(path) = &entry.cache_path
        {
            self.cache.release(path);
        }
        tracing::debug!(name, outstanding = entry.outstanding, "Released library");
        true
    }

    /// Outstanding requests for `name`.
    pub(crate) fn outstanding(&self, name: &str) -> usize {
        self.lock().get(name).map_or(0, |entry| entry.outstanding)
    }

    /// Best-effort deletion of every extracted file nobody holds.
    pub(crate) fn sweep(&self) -> Sweep {
        let sweep = self.cache.sweep();
        for (path, reason) in &sweep.failed {
            tracing::warn!(path = %path.display(), %reason, "Leaving extracted library behind");
        }
        sweep
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Tracked>> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
