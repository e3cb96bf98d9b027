//! In-memory resource source for testing.

use crate::error::{ErrorKind, Result};
use crate::source::{ResourceSource, has_prefix};
use embedlib_platform::ResourcePath;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory resource source for testing.
///
/// Keeps a count of successful and failed reads so tests can assert that a
/// code path never touched the bundle at all.
///
/// # Examples
///
/// ```
/// use embedlib_bundle::{MockSource, ResourceSource};
/// use embedlib_platform::ResourcePath;
///
/// let source = MockSource::with_files([
///     ("native/linux-x86_64/libexample.so", b"ELF..."),
/// ]);
/// let path = ResourcePath::new("native/linux-x86_64/libexample.so").unwrap();
/// assert!(source.exists(&path));
/// assert_eq!(source.reads(), 0);
/// ```
pub struct MockSource {
    name: String,
    files: BTreeMap<String, Vec<u8>>,
    reads: AtomicUsize,
}

impl MockSource {
    /// Create a mock source pre-populated with files.
    ///
    /// Panics if any path is not a valid [`ResourcePath`]. If test setup is
    /// wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<String>, impl AsRef<[u8]>)>) -> Self {
        let files = files
            .into_iter()
            .map(|(path, data)| {
                let path = path.into();
                let Ok(validated) = ResourcePath::new(path.clone()) else {
                    panic!("MockSource::with_files: invalid path {path}");
                };
                (validated.as_str().to_string(), data.as_ref().to_vec())
            })
            .collect();
        Self { name: "mock".to_string(), files, reads: AtomicUsize::new(0) }
    }

    /// Change the name of the mock source.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of [`read`](ResourceSource::read) calls so far, successful or not.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Default for MockSource {
    fn default() -> Self {
        let files: [(&str, &[u8]); 0] = [];
        Self::with_files(files)
    }
}

impl ResourceSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self, path: &ResourcePath) -> bool {
        self.files.contains_key(path.as_str())
    }

    fn read(&self, path: &ResourcePath) -> Result<Cow<'static, [u8]>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.files.get(path.as_str()) {
            Some(data) => Ok(Cow::Owned(data.clone())),
            None => exn::bail!(ErrorKind::NotFound(path.to_string())),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self.files.keys().filter(|p| has_prefix(p, prefix)).cloned().collect())
    }
}
