//! Resource source trait and implementations.
//!
//! A [`ResourceSource`] is wherever the bundled native libraries live before
//! they're extracted: compiled into the binary ([`Embedded`]), a directory on
//! disk ([`DirectorySource`]), or an in-memory map for tests.
//!
//! All paths are [`ResourcePath`]s, so they've already been validated as
//! plain relative `/`-separated paths by the time a source sees them.

mod directory;
mod embedded;
#[cfg(feature = "mock")]
mod mock;

pub use self::directory::DirectorySource;
pub use self::embedded::Embedded;
#[cfg(feature = "mock")]
pub use self::mock::MockSource;
use crate::error::Result;
use embedlib_platform::ResourcePath;
use std::borrow::Cow;

/// Read-only access to bundled resources.
///
/// Sources are synchronous: they're consulted once per library per process,
/// from whatever thread happens to request it first.
///
/// # Examples
///
/// ```
/// use embedlib_bundle::{ResourceSource, error::Result};
/// use embedlib_platform::ResourcePath;
///
/// fn size_of(source: &dyn ResourceSource, path: &ResourcePath) -> Result<usize> {
///     if !source.exists(path) {
///         return Ok(0);
///     }
///     Ok(source.read(path)?.len())
/// }
/// ```
pub trait ResourceSource: Send + Sync {
    /// Name of the source, used for logging only.
    fn name(&self) -> &str;

    /// Check if a resource exists.
    fn exists(&self, path: &ResourcePath) -> bool;

    /// Read the full contents of a resource.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the
    /// resource does not exist. Embedded sources hand out borrowed data, so
    /// nothing is copied until the bytes are written to disk.
    fn read(&self, path: &ResourcePath) -> Result<Cow<'static, [u8]>>;

    /// List every resource path under `prefix` (component-wise), sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Component-wise prefix match, so `native/linux` doesn't match
/// `native/linux-x86_64/libz.so`.
pub(crate) fn has_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_matches('/');
    prefix.is_empty()
        || path == prefix
        || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}
