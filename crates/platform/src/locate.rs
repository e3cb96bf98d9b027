//! Bundled resource path conventions.
//!
//! Resources are laid out as `<namespace>/<os>-<arch>/<filename>` where the
//! filename follows the OS convention for shared libraries. This layout is a
//! compatibility contract with already-published bundles; don't change it.
//!
//! Nothing in here touches the filesystem. A computed path that doesn't exist
//! only becomes an error when somebody tries to read it.

use crate::Platform;
use crate::error::{ErrorKind, Result};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "native";
/// Per-platform manifest filename, next to the libraries it describes.
pub const MANIFEST_FILENAME: &str = "bundle.toml";

/// A `/`-separated path inside the bundled resource namespace.
///
/// Always relative, never contains `.`/`..` components.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourcePath(String);

impl ResourcePath {
    /// Wrap an arbitrary resource path, rejecting anything that isn't a
    /// plain relative `/`-separated path.
    pub fn new(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let valid = !path.is_empty()
            && path.split('/').all(|segment| !matches!(segment, "" | "." | "..") && !segment.contains(['\\', '\0']));
        if !valid {
            exn::bail!(ErrorKind::InvalidName(path));
        }
        Ok(Self(path))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The final path component.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Everything before the final path component.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(parent, _)| parent)
    }
}

impl AsRef<str> for ResourcePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for ResourcePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// Maps logical library names to their location inside a bundle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Locator {
    namespace: String,
}

impl Default for Locator {
    fn default() -> Self {
        Self { namespace: DEFAULT_NAMESPACE.to_string() }
    }
}

impl Locator {
    /// Create a locator for a custom namespace, e.g. `"com/example/natives"`.
    ///
    /// The namespace must not be empty, start or end with `/`, or contain
    /// empty, `.` or `..` segments.
    pub fn new(namespace: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let valid = !namespace.is_empty()
            && namespace.split('/').all(|segment| !matches!(segment, "" | "." | "..") && !segment.contains(['\\', '\0']));
        if !valid {
            exn::bail!(ErrorKind::InvalidNamespace(namespace));
        }
        Ok(Self { namespace })
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Directory holding every library for one platform.
    #[must_use]
    pub fn platform_dir(&self, platform: &Platform) -> String {
        format!("{}/{}", self.namespace, platform.token())
    }

    /// Compute the resource path of `name` for `platform`.
    pub fn locate(&self, name: &str, platform: &Platform) -> Result<ResourcePath> {
        validate_name(name)?;
        Ok(self.file(platform, &platform.library_filename(name)))
    }

    /// Path of the optional per-platform manifest.
    #[must_use]
    pub fn manifest(&self, platform: &Platform) -> ResourcePath {
        self.file(platform, MANIFEST_FILENAME)
    }

    fn file(&self, platform: &Platform, filename: &str) -> ResourcePath {
        ResourcePath(format!("{}/{}", self.platform_dir(platform), filename))
    }
}

/// Check that a logical library name can be safely turned into a filename.
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.trim().is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0']);
    if !valid {
        exn::bail!(ErrorKind::InvalidName(name.to_string()));
    }
    Ok(())
}
