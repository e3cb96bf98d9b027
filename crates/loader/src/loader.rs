//! The dynamic-loading primitive.

use crate::Handle;
use libloading::Library;
use std::path::Path;

/// Opens a shared library file.
///
/// Implementations report failure as the loader's own diagnostic text; the
/// registry attaches the logical name and memoizes it.
pub trait Loader: Send + Sync {
    fn open(&self, path: &Path) -> Result<Handle, String>;
}

/// The platform dynamic loader (`dlopen`/`LoadLibraryW`) via `libloading`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemLoader;

impl Loader for SystemLoader {
    fn open(&self, path: &Path) -> Result<Handle, String> {
        // SAFETY: running the library's initialisers is the whole point of
        // loading it; the bundle is trusted the same way the binary is.
        let library = unsafe { Library::new(path) }.map_err(|e| e.to_string())?;
        Ok(Handle::from_library(path, library))
    }
}

#[cfg(feature = "mock")]
pub use self::mock::MockLoader;

#[cfg(feature = "mock")]
mod mock {
    use super::Loader;
    use crate::Handle;
    use std::collections::BTreeSet;
    use std::path::{Path, PathBuf};
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;

    /// Loader for testing that never touches the platform loader.
    ///
    /// Records every path it's asked to open. Opening succeeds if the file
    /// exists and its filename wasn't marked as failing.
    ///
    /// # Examples
    ///
    /// ```
    /// use embedlib_loader::{Loader, MockLoader};
    /// use std::path::Path;
    ///
    /// let loader = MockLoader::default().failing("libbroken.so");
    /// assert!(loader.open(Path::new("/nonexistent/libz.so")).is_err());
    /// assert_eq!(loader.opens(), 1);
    /// ```
    #[derive(Debug, Default)]
    pub struct MockLoader {
        failing: BTreeSet<String>,
        delay: Option<Duration>,
        opened: Mutex<Vec<PathBuf>>,
    }

    impl MockLoader {
        /// Make every open of a file with this name fail.
        #[must_use]
        pub fn failing(mut self, file_name: impl Into<String>) -> Self {
            self.failing.insert(file_name.into());
            self
        }

        /// Sleep inside every open, to widen race windows in tests.
        #[must_use]
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Number of [`open`](Loader::open) calls so far, successful or not.
        pub fn opens(&self) -> usize {
            self.opened.lock().unwrap_or_else(PoisonError::into_inner).len()
        }

        /// Every path passed to [`open`](Loader::open), in call order.
        pub fn opened(&self) -> Vec<PathBuf> {
            self.opened.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }
    }

    impl Loader for MockLoader {
        fn open(&self, path: &Path) -> Result<Handle, String> {
            self.opened.lock().unwrap_or_else(PoisonError::into_inner).push(path.to_path_buf());
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            let file_name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            if self.failing.contains(&*file_name) {
                return Err(format!("{}: invalid ELF header", path.display()));
            }
            if !path.is_file() {
                return Err(format!("{}: cannot open shared object file: No such file or directory", path.display()));
            }
            Ok(Handle::detached(path))
        }
    }
}
