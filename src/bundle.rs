use crate::error::{ErrorKind, Result};
use crate::lifecycle::Lifecycle;
use embedlib_bundle::{Manifest, SourceHandle};
use embedlib_cache::error::ErrorKind as CacheErrorKind;
use embedlib_cache::{Materialized, Sweep};
use embedlib_loader::error::ErrorKind as LoaderErrorKind;
use embedlib_loader::{Handle, Registry};
use embedlib_platform::error::ErrorKind as PlatformErrorKind;
use embedlib_platform::{Locator, Platform, ResourcePath, validate_name};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::instrument;

/// A set of bundled native libraries, and everything this process has done
/// with them.
///
/// Meant to live for the whole process, typically in a `static`:
///
/// ```no_run
/// use embedlib::{Bundle, DirectorySource};
/// use std::sync::{Arc, LazyLock};
///
/// static NATIVES: LazyLock<Bundle> = LazyLock::new(|| {
///     let source = DirectorySource::new("natives", "/opt/app/resources").expect("resources are installed");
///     Bundle::builder(Arc::new(source)).build()
/// });
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let _guard = NATIVES.shutdown_guard();
/// let _handle = NATIVES.request_library("example").map_err(|e| (*e).to_string())?;
/// # Ok(())
/// # }
/// ```
///
/// Every logical name is extracted and loaded at most once per `Bundle`,
/// however many threads ask for it; the outcome (success or failure) is
/// remembered and handed out again.
pub struct Bundle {
    pub(crate) source: SourceHandle,
    pub(crate) locator: Locator,
    pub(crate) raw_platform: Option<(String, String)>,
    pub(crate) platform: OnceLock<std::result::Result<Platform, PlatformErrorKind>>,
    pub(crate) manifest: OnceLock<Option<Manifest>>,
    pub(crate) forced: BTreeMap<String, PathBuf>,
    pub(crate) registry: Registry,
    pub(crate) lifecycle: Lifecycle,
}

impl Bundle {
    /// The platform libraries are resolved for. Resolved on first use and
    /// cached, failure included.
    pub fn platform(&self) -> Result<Platform> {
        let resolved = self.platform.get_or_init(|| {
            let resolved = match &self.raw_platform {
                Some((os, arch)) => Platform::resolve(os, arch),
                None => Platform::current(),
            };
            resolved.map_err(|err| (*err).clone())
        });
        resolved.clone().map_err(|kind| {
            let raised = ErrorKind::from(&kind);
            exn::Exn::from(kind).raise(raised)
        })
    }

    /// Where `name` lives inside the bundle for this platform. The resource
    /// isn't required to exist.
    pub fn locate(&self, name: &str) -> Result<ResourcePath> {
        Self::validate(name)?;
        let platform = self.platform()?;
        self.locator.locate(name, &platform).map_err(|err| err.raise(ErrorKind::InvalidName(name.to_string())))
    }

    /// Resolve, extract and load `name`, returning its handle.
    ///
    /// Bundled dependencies listed in the platform manifest are requested
    /// first. Repeated calls return the same handle (or the same load
    /// failure) without touching the bundle, the cache or the loader again.
    /// Each successful call should be paired with a
    /// [`release_library`](Self::release_library).
    #[instrument(skip(self))]
    pub fn request_library(&self, name: &str) -> Result<Handle> {
        Self::validate(name)?;
        if let Some(path) = self.forced.get(name) {
            return self.request_forced(name, path);
        }
        let platform = self.platform()?;

        let dependencies = self.manifest(&platform)?.map(|m| m.dependencies(name).to_vec()).unwrap_or_default();
        for (i, dependency) in dependencies.iter().enumerate() {
            if let Err(err) = self.request_library(dependency) {
                for acquired in dependencies[..i].iter().rev() {
                    self.release_library(acquired);
                }
                return Err(err);
            }
        }

        match self.request_bundled(name, &platform) {
            Ok(handle) => Ok(handle),
            Err(err) => {
                for acquired in dependencies.iter().rev() {
                    self.release_library(acquired);
                }
                Err(err)
            },
        }
    }

    /// Request every bundled library the platform manifest lists, in
    /// dependency order, and return them in that order.
    ///
    /// Without a manifest nothing is known about the bundle's contents, and
    /// nothing is loaded. On failure, everything requested so far is
    /// released again. Each returned name should eventually be passed to
    /// [`release_library`](Self::release_library).
    #[instrument(skip(self))]
    pub fn request_all(&self) -> Result<Vec<(String, Handle)>> {
        let platform = self.platform()?;
        let Some(manifest) = self.manifest(&platform)? else {
            tracing::debug!("No bundle manifest; nothing to load");
            return Ok(Vec::new());
        };
        let names: Vec<String> = manifest.load_order().into_iter().map(str::to_string).collect();
        let mut loaded: Vec<(String, Handle)> = Vec::with_capacity(names.len());
        for name in names {
            match self.request_library(&name) {
                Ok(handle) => loaded.push((name, handle)),
                Err(err) => {
                    for (acquired, _) in loaded.iter().rev() {
                        self.release_library(acquired);
                    }
                    return Err(err);
                },
            }
        }
        Ok(loaded)
    }

    fn request_bundled(&self, name: &str, platform: &Platform) -> Result<Handle> {
        let mut fresh = None;
        let loaded = self.registry.get_or_load(name, || {
            let materialized = self.extract_for(name, platform)?;
            fresh = Some(materialized.path.clone());
            Ok::<_, crate::error::Error>(materialized.path)
        })?;
        match loaded.handle() {
            Ok(handle) => {
                self.lifecycle.acquire(name, Some(loaded.path()), fresh.is_some());
                Ok(handle)
            },
            Err(err) => {
                // Nobody will ever release a library that failed to load.
                if let Some(path) = &fresh {
                    self.lifecycle.cache().release(path);
                }
                Err(Self::load_error(name, err))
            },
        }
    }

    fn request_forced(&self, name: &str, path: &Path) -> Result<Handle> {
        tracing::debug!(path = %path.display(), "Using forced library path");
        let loaded = self.registry.get_or_load(name, || Ok::<_, crate::error::Error>(path.to_path_buf()))?;
        let handle = loaded.handle().map_err(|err| Self::load_error(name, err))?;
        self.lifecycle.acquire(name, None, false);
        Ok(handle)
    }

    /// Give back one request for `name`, and for its bundled dependencies.
    ///
    /// The library stays loaded; its extracted file only becomes eligible
    /// for deletion at the next [`shutdown`](Self::shutdown). Returns
    /// `false` if `name` wasn't held.
    #[instrument(skip(self))]
    pub fn release_library(&self, name: &str) -> bool {
        if !self.lifecycle.release(name) {
            return false;
        }
        if !self.forced.contains_key(name)
            && let Some(Some(manifest)) = self.manifest.get()
        {
            for dependency in manifest.dependencies(name).iter().rev() {
                self.release_library(dependency);
            }
        }
        true
    }

    /// Every resource the bundle ships for this platform, sorted.
    pub fn resources(&self) -> Result<Vec<String>> {
        let platform = self.platform()?;
        self.source.list(&self.locator.platform_dir(&platform)).map_err(|err| {
            let name = self.source.name().to_string();
            err.raise(ErrorKind::Source(name))
        })
    }

    /// Extract `name` into the cache without loading it.
    ///
    /// The file keeps a cache reference, so [`shutdown`](Self::shutdown)
    /// leaves it in place.
    #[instrument(skip(self))]
    pub fn extract(&self, name: &str) -> Result<Materialized> {
        Self::validate(name)?;
        let platform = self.platform()?;
        self.extract_for(name, &platform)
    }

    /// Best-effort deletion of extracted files nothing holds any more.
    ///
    /// Never fails: files that can't be deleted (e.g. still mapped by
    /// another process on Windows) are logged and listed in the result.
    /// Loaded libraries stay loaded.
    #[instrument(skip(self))]
    pub fn shutdown(&self) -> Sweep {
        let sweep = self.lifecycle.sweep();
        tracing::info!(
            removed = sweep.removed.len(),
            retained = sweep.retained.len(),
            failed = sweep.failed.len(),
            "Cleaned up extracted libraries"
        );
        sweep
    }

    /// Run [`shutdown`](Self::shutdown) when the returned guard is dropped,
    /// e.g. at the end of `main`.
    #[must_use = "shutdown runs when the guard is dropped"]
    pub fn shutdown_guard(&self) -> ShutdownGuard<'_> {
        ShutdownGuard { bundle: self }
    }

    /// Outstanding requests for `name`.
    #[must_use]
    pub fn outstanding(&self, name: &str) -> usize {
        self.lifecycle.outstanding(name)
    }

    /// Logical names that have been loaded (or failed to), sorted.
    #[must_use]
    pub fn loaded(&self) -> Vec<String> {
        self.registry.names()
    }

    #[must_use]
    pub fn cache_root(&self) -> &Path {
        self.lifecycle.cache().root()
    }

    #[must_use]
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    fn extract_for(&self, name: &str, platform: &Platform) -> Result<Materialized> {
        let resource = self
            .locator
            .locate(name, platform)
            .map_err(|err| err.raise(ErrorKind::InvalidName(name.to_string())))?;
        self.lifecycle.cache().materialize(self.source.as_ref(), &resource).map_err(|err| {
            let kind = match &*err {
                CacheErrorKind::NotFound(_) => ErrorKind::ResourceNotFound {
                    name: name.to_string(),
                    platform: platform.token(),
                    path: resource.to_string(),
                },
                _ => ErrorKind::ExtractionIo { name: name.to_string(), platform: platform.token() },
            };
            err.raise(kind)
        })
    }

    /// The platform manifest, read from the bundle on first use.
    fn manifest(&self, platform: &Platform) -> Result<Option<&Manifest>> {
        if let Some(manifest) = self.manifest.get() {
            return Ok(manifest.as_ref());
        }
        let path = self.locator.manifest(platform);
        let loaded = Manifest::load(self.source.as_ref(), &path).map_err(|err| {
            let reason = (*err).to_string();
            err.raise(ErrorKind::Manifest(reason))
        })?;
        Ok(self.manifest.get_or_init(|| loaded).as_ref())
    }

    fn load_error(name: &str, err: embedlib_loader::error::Error) -> crate::error::Error {
        let reason = match &*err {
            LoaderErrorKind::Load { reason, .. } => reason.clone(),
            other => other.to_string(),
        };
        err.raise(ErrorKind::Load { name: name.to_string(), reason })
    }

    fn validate(name: &str) -> Result<()> {
        validate_name(name).map_err(|err| err.raise(ErrorKind::InvalidName(name.to_string())))
    }
}

/// Cleans up a [`Bundle`] on drop. See [`Bundle::shutdown_guard`].
pub struct ShutdownGuard<'a> {
    bundle: &'a Bundle,
}

impl Drop for ShutdownGuard<'_> {
    fn drop(&mut self) {
        let sweep = self.bundle.shutdown();
        if !sweep.is_clean() {
            tracing::warn!(failed = sweep.failed.len(), "Some extracted libraries were left behind");
        }
    }
}
