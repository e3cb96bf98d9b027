//! Layered configuration.
//!
//! Lowest priority first:
//!
//! 1. Built-in defaults.
//! 2. A config file: TOML, YAML or JSON, picked by extension. Defaults to
//!    `embedlib.toml` in the platform config directory, which is optional.
//! 3. Environment variables prefixed with `EMBEDLIB_`. Nested keys are
//!    separated with `__`, e.g. `EMBEDLIB_FORCED__EXAMPLE=/opt/libexample.so`.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use embedlib_cache::Verification;
use embedlib_platform::{DEFAULT_NAMESPACE, Locator, validate_name};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "EMBEDLIB_";
pub const CONFIG_FILENAME: &str = "embedlib.toml";
const APPLICATION: &str = "embedlib";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Where extracted libraries go. See [`Config::cache_root`].
    pub cache_root: Option<PathBuf>,
    /// Top-level resource directory inside the bundle.
    pub namespace: String,
    pub verification: Verification,
    /// Logical name to a file loaded as-is, skipping the bundle entirely.
    pub forced: BTreeMap<String, PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_root: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            verification: Verification::default(),
            forced: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load from the default config file (if it exists) and the environment.
    pub fn load() -> Result<Self> {
        let mut figment = Self::defaults();
        if let Some(path) = Self::default_file() {
            tracing::debug!(path = %path.display(), exists = path.is_file(), "Default config file");
            figment = figment.merge(Toml::file(path));
        }
        Self::extract(figment.merge(Self::env()))
    }

    /// Load from an explicit config file, which must exist, and the
    /// environment.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            exn::bail!(ErrorKind::FileNotFound(path.to_path_buf()));
        }
        let figment = Self::defaults();
        let figment = match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("toml") => figment.merge(Toml::file(path)),
            Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
        };
        Self::extract(figment.merge(Self::env()))
    }

    /// Extract and validate a config from any figment, for embedding into a
    /// larger application's configuration.
    pub fn extract(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().map_err(|e| ErrorKind::Extract(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The built-in defaults as a figment provider chain.
    #[must_use]
    pub fn defaults() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
    }

    fn env() -> Env {
        Env::prefixed(ENV_PREFIX).split("__")
    }

    /// `embedlib.toml` in the platform config directory, if the platform has
    /// one.
    #[must_use]
    pub fn default_file() -> Option<PathBuf> {
        ProjectDirs::from("", "", APPLICATION).map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
    }

    /// The configured cache root, or the platform cache directory, or a
    /// directory under the system temp directory as a last resort.
    #[must_use]
    pub fn cache_root(&self) -> PathBuf {
        self.cache_root
            .clone()
            .or_else(|| ProjectDirs::from("", "", APPLICATION).map(|dirs| dirs.cache_dir().to_path_buf()))
            .unwrap_or_else(|| std::env::temp_dir().join(APPLICATION))
    }

    /// A locator for the configured namespace.
    pub fn locator(&self) -> Result<Locator> {
        Locator::new(self.namespace.clone()).map_err(|err| {
            let reason = (*err).to_string();
            err.raise(ErrorKind::InvalidValue { key: "namespace".to_string(), reason })
        })
    }

    fn validate(&self) -> Result<()> {
        self.locator()?;
        for (name, path) in &self.forced {
            validate_name(name).map_err(|err| {
                let reason = (*err).to_string();
                err.raise(ErrorKind::InvalidValue { key: format!("forced.{name}"), reason })
            })?;
            if path.as_os_str().is_empty() {
                exn::bail!(ErrorKind::InvalidValue { key: format!("forced.{name}"), reason: "empty path".to_string() });
            }
        }
        if let Some(root) = &self.cache_root
            && root.as_os_str().is_empty()
        {
            exn::bail!(ErrorKind::InvalidValue { key: "cache_root".to_string(), reason: "empty path".to_string() });
        }
        Ok(())
    }
}
