//! Resources read from a directory on the local filesystem.
//!
//! Handy during development (point it at the packaging output instead of
//! rebuilding the binary) and for bundles shipped next to an executable.

use crate::error::{ErrorKind, Result};
use crate::source::{ResourceSource, has_prefix};
use embedlib_platform::ResourcePath;
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory-backed resource source.
///
/// All resource paths are relative to the configured root directory.
///
/// # Examples
///
/// ```no_run
/// use embedlib_bundle::DirectorySource;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let source = DirectorySource::new("packaging", "/opt/app/resources")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct DirectorySource {
    name: String,
    root: PathBuf,
}

impl DirectorySource {
    /// Create a new directory source.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRoot`](ErrorKind::InvalidRoot) if `root` doesn't
    /// exist or isn't a directory. Unlike a cache root, a resource root is
    /// never created: an empty bundle is a packaging error.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            exn::bail!(ErrorKind::InvalidRoot(root));
        }
        Ok(Self { name: name.into(), root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the filesystem path for a resource path.
    fn absolute_path(&self, path: &ResourcePath) -> PathBuf {
        path.as_str().split('/').fold(self.root.clone(), |acc, segment| acc.join(segment))
    }

    fn map_io_error(e: std::io::Error, path: &ResourcePath) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_string()),
            _ => ErrorKind::Io(e),
        }
    }

    fn relative(&self, absolute: &Path) -> Option<String> {
        let relative = absolute.strip_prefix(&self.root).ok()?;
        let segments: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
        Some(segments?.join("/"))
    }
}

impl ResourceSource for DirectorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self, path: &ResourcePath) -> bool {
        self.absolute_path(path).is_file()
    }

    fn read(&self, path: &ResourcePath) -> Result<Cow<'static, [u8]>> {
        let data = fs::read(self.absolute_path(path)).map_err(|e| Self::map_io_error(e, path))?;
        Ok(Cow::Owned(data))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut found = Vec::new();
        let mut stack = vec![self.root.clone()];
        while let Some(current) = stack.pop() {
            let entries = match fs::read_dir(&current) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => exn::bail!(ErrorKind::Io(e)),
            };
            for entry in entries {
                let entry = entry.map_err(ErrorKind::Io)?;
                let file_type = entry.file_type().map_err(ErrorKind::Io)?;
                let path = entry.path();
                if file_type.is_dir() {
                    stack.push(path);
                } else if file_type.is_file()
                    && let Some(relative) = self.relative(&path)
                    && has_prefix(&relative, prefix)
                {
                    found.push(relative);
                }
                // Note: silently drop symlinks and non-UTF-8 names; neither
                // can be addressed through a ResourcePath.
            }
        }
        found.sort();
        Ok(found)
    }
}
