use crate::Bundle;
use crate::error::{ErrorKind, Result};
use crate::lifecycle::Lifecycle;
use embedlib_bundle::SourceHandle;
use embedlib_cache::{ContentCache, Verification};
use embedlib_config::Config;
use embedlib_loader::{Loader, Registry, SystemLoader};
use embedlib_platform::Locator;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

/// Configures a [`Bundle`]. Nothing is read, resolved or created until the
/// first library is requested.
pub struct BundleBuilder {
    source: SourceHandle,
    locator: Locator,
    cache_root: Option<PathBuf>,
    verification: Verification,
    forced: BTreeMap<String, PathBuf>,
    loader: Option<Arc<dyn Loader>>,
    raw_platform: Option<(String, String)>,
}

impl Bundle {
    pub fn builder(source: SourceHandle) -> BundleBuilder {
        BundleBuilder {
            source,
            locator: Locator::default(),
            cache_root: None,
            verification: Verification::default(),
            forced: BTreeMap::new(),
            loader: None,
            raw_platform: None,
        }
    }

    /// A bundle configured from `config`.
    pub fn from_config(source: SourceHandle, config: &Config) -> Result<Self> {
        Ok(Self::builder(source).config(config)?.build())
    }
}

impl BundleBuilder {
    /// Apply every setting from a loaded [`Config`].
    pub fn config(mut self, config: &Config) -> Result<Self> {
        self.locator = config.locator().map_err(|err| err.raise(ErrorKind::Config))?;
        self.cache_root = Some(config.cache_root());
        self.verification = config.verification;
        self.forced.extend(config.forced.iter().map(|(name, path)| (name.clone(), path.clone())));
        Ok(self)
    }

    #[must_use]
    pub fn locator(mut self, locator: Locator) -> Self {
        self.locator = locator;
        self
    }

    /// Extract into `root` instead of the default cache directory.
    #[must_use]
    pub fn cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(root.into());
        self
    }

    #[must_use]
    pub fn verification(mut self, verification: Verification) -> Self {
        self.verification = verification;
        self
    }

    /// Load `name` straight from `path`, skipping platform resolution and
    /// extraction.
    #[must_use]
    pub fn force(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.forced.insert(name.into(), path.into());
        self
    }

    /// Replace the platform dynamic loader.
    #[must_use]
    pub fn loader(mut self, loader: Arc<dyn Loader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Resolve libraries for these raw OS/architecture strings instead of
    /// the host's. They go through the same alias tables, and an unknown
    /// pair fails on the first request.
    #[must_use]
    pub fn raw_platform(mut self, os: impl Into<String>, arch: impl Into<String>) -> Self {
        self.raw_platform = Some((os.into(), arch.into()));
        self
    }

    pub fn build(self) -> Bundle {
        let cache_root = self.cache_root.unwrap_or_else(|| Config::default().cache_root());
        tracing::debug!(
            source = self.source.name(),
            namespace = self.locator.namespace(),
            cache_root = %cache_root.display(),
            verification = %self.verification,
            "Configured bundle"
        );
        let cache = Arc::new(ContentCache::new(cache_root, self.verification));
        let loader = self.loader.unwrap_or_else(|| Arc::new(SystemLoader));
        Bundle {
            source: self.source,
            locator: self.locator,
            raw_platform: self.raw_platform,
            platform: OnceLock::new(),
            manifest: OnceLock::new(),
            forced: self.forced,
            registry: Registry::new(loader),
            lifecycle: Lifecycle::new(cache),
        }
    }
}
