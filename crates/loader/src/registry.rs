use crate::error::{ErrorKind, Result};
use crate::{Handle, Loader, SystemLoader};
use exn::Exn;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::instrument;

/// What happened when a library was loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Loaded(Handle),
    /// The loader's diagnostic.
    Failed(String),
}

/// The memoized result of loading one logical library. Immutable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedLibrary {
    name: String,
    path: PathBuf,
    outcome: Outcome,
}

impl LoadedLibrary {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The file that was handed to the loader.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// The handle, or the memoized failure raised afresh.
    pub fn handle(&self) -> Result<Handle> {
        match &self.outcome {
            Outcome::Loaded(handle) => Ok(handle.clone()),
            Outcome::Failed(reason) => {
                exn::bail!(ErrorKind::Load { name: self.name.clone(), reason: reason.clone() })
            },
        }
    }
}

type Slot = Arc<Mutex<Option<Arc<LoadedLibrary>>>>;

/// Loads each logical library at most once.
///
/// Every name gets its own slot. The first caller for a name locates the
/// file and loads it while holding that slot's lock; everybody else blocks
/// on the slot and then sees the same [`LoadedLibrary`]. Looking up a slot
/// only briefly takes the registry-wide lock, so unrelated names load in
/// parallel.
pub struct Registry {
    loader: Arc<dyn Loader>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Arc::new(SystemLoader))
    }
}

impl Registry {
    pub fn new(loader: Arc<dyn Loader>) -> Self {
        Self { loader, slots: Mutex::new(HashMap::new()) }
    }

    /// Return the memoized outcome for `name`, loading it first if needed.
    ///
    /// `locate` produces the file to load and only runs for the first
    /// caller. Its errors are returned as-is and *not* memoized: nothing
    /// was handed to the loader, so a later call tries again. Load failures
    /// on the other hand are permanent; use [`LoadedLibrary::handle`] to turn
    /// one into an error.
    #[instrument(skip(self, locate))]
    pub fn get_or_load<E>(
        &self,
        name: &str,
        locate: impl FnOnce() -> std::result::Result<PathBuf, Exn<E>>,
    ) -> std::result::Result<Arc<LoadedLibrary>, Exn<E>>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let slot = self.slot(name);
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(loaded) = guard.as_ref() {
            tracing::debug!("Library already loaded");
            return Ok(Arc::clone(loaded));
        }

        let path = locate()?;
        let outcome = match self.loader.open(&path) {
            Ok(handle) => {
                tracing::info!(path = %path.display(), "Loaded library");
                Outcome::Loaded(handle)
            },
            Err(reason) => {
                tracing::error!(path = %path.display(), %reason, "Failed to load library");
                Outcome::Failed(reason)
            },
        };
        let loaded = Arc::new(LoadedLibrary { name: name.to_string(), path, outcome });
        *guard = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    /// The memoized outcome for `name`, without loading anything.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<LoadedLibrary>> {
        let slot = self.lock().get(name).cloned()?;
        let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    /// Names with a memoized outcome, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let slots: Vec<(String, Slot)> = self.lock().iter().map(|(k, v)| (k.clone(), Arc::clone(v))).collect();
        let mut names: Vec<String> = slots
            .into_iter()
            .filter(|(_, slot)| slot.lock().unwrap_or_else(PoisonError::into_inner).is_some())
            .map(|(name, _)| name)
            .collect();
        names.sort();
        names
    }

    fn slot(&self, name: &str) -> Slot {
        Arc::clone(self.lock().entry(name.to_string()).or_default())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
